//! Deviation evaluation: one reading against one set of bounds.
//!
//! Pure and total. A metric is skipped (never an error) when the reading
//! lacks it, its value is not numeric, or it has no bound at all.

use tracing::debug;

use crate::models::{Bounds, Deviation, Direction, Metric, SensorReading};
use crate::store::attrs;

// ---

/// Compare every known metric of `reading` against `bounds`.
///
/// Bounds are inclusive: a value equal to a bound is in range. The result
/// follows [`Metric::ALL`] order; an empty vector means "in range".
pub fn find_deviations(reading: &SensorReading, bounds: &Bounds) -> Vec<Deviation> {
    // ---
    let mut deviations = Vec::new();

    for metric in Metric::ALL {
        let Some(raw) = reading.value(metric) else {
            continue;
        };

        let Some(actual) = attrs::to_f64(raw) else {
            debug!(
                plot_id = %reading.plot_id,
                %metric,
                value = ?raw,
                "Non-numeric metric value, skipping"
            );
            continue;
        };

        let range = bounds.get(metric);
        if range.is_open() {
            continue;
        }

        if let Some(deviation) = check(metric, actual, range.lower, range.upper) {
            deviations.push(deviation);
        }
    }

    deviations
}

fn check(metric: Metric, actual: f64, lower: Option<f64>, upper: Option<f64>) -> Option<Deviation> {
    // ---
    let direction = match (lower, upper) {
        (Some(lower), _) if actual < lower => Direction::Below,
        (_, Some(upper)) if actual > upper => Direction::Above,
        _ => return None,
    };

    Some(Deviation {
        metric,
        actual,
        lower_bound: lower,
        upper_bound: upper,
        direction,
    })
}
