//! Domain models for the monitoring backend.
//!
//! Stored entities are parsed out of attribute maps with fixed alias lists;
//! ephemeral ones ([`Deviation`], [`Alert`]) never touch the table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::keys;
use crate::store::attrs::{self, first_bool, first_f64, first_string};
use crate::store::{AttributeValue, Item};

// ---

/// Sensor metrics that can carry thresholds, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    Humidity,
    Light,
    Irrigation,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::Light,
        Metric::Irrigation,
    ];

    /// Attribute name of the reading value.
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Light => "light",
            Metric::Irrigation => "irrigation",
        }
    }

    /// Primary names of the lower and upper bound fields.
    pub fn bound_fields(self) -> (&'static str, &'static str) {
        match self {
            Metric::Temperature => ("MinTemperature", "MaxTemperature"),
            Metric::Humidity => ("MinHumidity", "MaxHumidity"),
            Metric::Light => ("MinLight", "MaxLight"),
            Metric::Irrigation => ("MinIrrigation", "MaxIrrigation"),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower/upper bound pair of one metric; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricBounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl MetricBounds {
    pub fn is_open(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

/// Bounds of every metric, read from a thresholds or species record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bounds {
    pub temperature: MetricBounds,
    pub humidity: MetricBounds,
    pub light: MetricBounds,
    pub irrigation: MetricBounds,
}

impl Bounds {
    /// Read bounds with first-present lookup over `MinTemperature` and its
    /// lowercase alias `mintemperature` (and likewise for every field).
    pub fn from_item(item: &Item) -> Self {
        // ---
        let read = |metric: Metric| {
            let (lower, upper) = metric.bound_fields();
            let (lower_alias, upper_alias) = (lower.to_lowercase(), upper.to_lowercase());
            MetricBounds {
                lower: first_f64(item, &[lower, lower_alias.as_str()]),
                upper: first_f64(item, &[upper, upper_alias.as_str()]),
            }
        };

        Self {
            temperature: read(Metric::Temperature),
            humidity: read(Metric::Humidity),
            light: read(Metric::Light),
            irrigation: read(Metric::Irrigation),
        }
    }

    pub fn get(&self, metric: Metric) -> MetricBounds {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Light => self.light,
            Metric::Irrigation => self.irrigation,
        }
    }

    pub fn set(&mut self, metric: Metric, bounds: MetricBounds) {
        match metric {
            Metric::Temperature => self.temperature = bounds,
            Metric::Humidity => self.humidity = bounds,
            Metric::Light => self.light = bounds,
            Metric::Irrigation => self.irrigation = bounds,
        }
    }

    /// Write the bound fields into `item` under their primary names.
    /// Open bounds are stored as `NULL` so stale values get cleared.
    pub fn write_into(&self, item: &mut Item) {
        // ---
        for metric in Metric::ALL {
            let (lower_field, upper_field) = metric.bound_fields();
            let bounds = self.get(metric);
            item.insert(lower_field.to_string(), optional_number(bounds.lower));
            item.insert(upper_field.to_string(), optional_number(bounds.upper));
        }
    }
}

fn optional_number(value: Option<f64>) -> AttributeValue {
    value.map_or(AttributeValue::Null(true), attrs::n)
}

// ---

/// Attribute holding the enabled flag of a thresholds record.
pub const THRESHOLDS_ENABLED_ATTR: &str = "umbral_enabled";
const ENABLED_ALIASES: &[&str] = &[THRESHOLDS_ENABLED_ATTR, "enabled"];

const FACILITY_ALIASES: &[&str] = &["facility_id", "FacilityId"];
const SPECIES_ALIASES: &[&str] = &["species_id", "SpeciesId"];
const BUSINESS_ALIASES: &[&str] = &["BusinessId", "business_id"];

/// Per-plot thresholds record (`PLOT#<id>` / `THRESHOLDS`).
#[derive(Debug, Clone, PartialEq)]
pub struct PlotThresholds {
    pub plot_id: String,
    pub enabled: bool,
    pub bounds: Bounds,
    pub facility_id: Option<String>,
    pub species_id: Option<String>,
    pub business_id: Option<String>,
}

impl PlotThresholds {
    /// Default record for a plot without a species profile: disabled, open.
    pub fn disabled(plot_id: impl Into<String>) -> Self {
        Self {
            plot_id: plot_id.into(),
            enabled: false,
            bounds: Bounds::default(),
            facility_id: None,
            species_id: None,
            business_id: None,
        }
    }

    /// Parse a stored record. A missing enabled flag means disabled.
    pub fn from_item(plot_id: &str, item: &Item) -> Self {
        // ---
        Self {
            plot_id: plot_id.to_string(),
            enabled: first_bool(item, ENABLED_ALIASES).unwrap_or(false),
            bounds: Bounds::from_item(item),
            facility_id: first_string(item, FACILITY_ALIASES),
            species_id: first_string(item, SPECIES_ALIASES),
            business_id: first_string(item, BUSINESS_ALIASES),
        }
    }

    pub fn to_item(&self) -> Item {
        // ---
        let mut item = Item::from([
            (keys::PK.to_string(), attrs::s(keys::plot_pk(&self.plot_id))),
            (keys::SK.to_string(), attrs::s(keys::THRESHOLDS_SK)),
            ("plot_id".to_string(), attrs::s(&self.plot_id)),
            (
                THRESHOLDS_ENABLED_ATTR.to_string(),
                AttributeValue::Bool(self.enabled),
            ),
        ]);
        self.bounds.write_into(&mut item);

        let optional = [
            ("facility_id", &self.facility_id),
            ("species_id", &self.species_id),
            ("business_id", &self.business_id),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                item.insert(name.to_string(), attrs::s(value));
            }
        }
        item
    }
}

// ---

/// A sensor reading written by ingestion (`PLOT#<id>` / `STATE#<ts>`).
///
/// Metric values stay in `item`; the evaluator reads them with the same
/// tolerance for odd encodings as the bound fields.
#[derive(Debug, Clone)]
pub struct SensorReading {
    pub plot_id: String,
    pub timestamp: Option<String>,
    pub species_id: Option<String>,
    pub facility_id: Option<String>,
    pub business_id: Option<String>,
    pub plot_name: Option<String>,
    /// Facility id carried by the facility index key, if any.
    pub index_facility_id: Option<String>,
    pub item: Item,
}

impl SensorReading {
    /// Parse a stored item; `None` unless it is a `PLOT#`/`STATE#` record.
    pub fn from_item(item: Item) -> Option<Self> {
        // ---
        let pk = attrs::key_string(&item, keys::PK)?;
        let sk = attrs::key_string(&item, keys::SK)?;
        let plot_id = keys::strip_entity(pk, keys::PLOT_PREFIX)?.to_string();
        if !sk.starts_with(keys::STATE_PREFIX) {
            return None;
        }

        let timestamp = first_string(&item, &["Timestamp"])
            .or_else(|| Some(keys::key_suffix(sk).to_string()).filter(|t| !t.is_empty()));

        let index_facility_id = attrs::key_string(&item, keys::GSI_PK)
            .and_then(|gsi| keys::strip_entity(gsi, keys::FACILITY_PREFIX))
            .filter(|id| *id != keys::UNKNOWN_ID)
            .map(str::to_string);

        Some(Self {
            plot_id,
            timestamp,
            species_id: first_string(&item, &["SpeciesId", "species_id"]),
            facility_id: first_string(&item, &["FacilityId", "facility_id"]),
            business_id: first_string(&item, BUSINESS_ALIASES),
            plot_name: first_string(&item, &["PlotName", "plot_name"]),
            index_facility_id,
            item,
        })
    }

    /// Raw stored value of `metric`, if the reading carries it.
    pub fn value(&self, metric: Metric) -> Option<&AttributeValue> {
        self.item.get(metric.as_str())
    }
}

// ---

/// Side of the range a value fell out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Below,
    Above,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Below => f.write_str("below"),
            Direction::Above => f.write_str("above"),
        }
    }
}

/// One metric found outside its bounds during one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deviation {
    pub metric: Metric,
    pub actual: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub direction: Direction,
}

impl Deviation {
    /// Distance to the violated bound, always non-negative.
    pub fn magnitude(&self) -> f64 {
        // ---
        match self.direction {
            Direction::Below => self.lower_bound.map_or(0.0, |lower| lower - self.actual),
            Direction::Above => self.upper_bound.map_or(0.0, |upper| self.actual - upper),
        }
    }
}

/// Formatted alert ready for the notification topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub plot_id: String,
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::attrs::{n, s};

    #[test]
    fn thresholds_round_trip_through_item() {
        // ---
        let mut thresholds = PlotThresholds::disabled("p-1");
        thresholds.enabled = true;
        thresholds.facility_id = Some("f-1".into());
        thresholds.bounds.temperature = MetricBounds {
            lower: Some(15.0),
            upper: Some(30.0),
        };

        let parsed = PlotThresholds::from_item("p-1", &thresholds.to_item());
        assert_eq!(parsed, thresholds);
    }

    #[test]
    fn thresholds_without_flag_are_disabled() {
        let item = Item::from([("MaxTemperature".to_string(), n(30.0))]);
        let parsed = PlotThresholds::from_item("p-1", &item);
        assert!(!parsed.enabled);
        assert_eq!(parsed.bounds.temperature.upper, Some(30.0));
    }

    #[test]
    fn lowercase_bound_aliases_are_read() {
        let item = Item::from([("minhumidity".to_string(), s("40"))]);
        assert_eq!(Bounds::from_item(&item).humidity.lower, Some(40.0));
    }

    #[test]
    fn reading_parses_only_plot_state_items() {
        // ---
        let state = Item::from([
            ("pk".to_string(), s("PLOT#p-9")),
            ("sk".to_string(), s("STATE#2025-05-01T10:00:00Z")),
            ("GSI_PK".to_string(), s("FACILITY#UNKNOWN")),
        ]);
        let reading = SensorReading::from_item(state).unwrap();
        assert_eq!(reading.plot_id, "p-9");
        assert_eq!(reading.timestamp.as_deref(), Some("2025-05-01T10:00:00Z"));
        assert_eq!(reading.index_facility_id, None);

        let event = Item::from([
            ("pk".to_string(), s("PLOT#p-9")),
            ("sk".to_string(), s("EVENT#2025-05-01T10:00:00Z")),
        ]);
        assert!(SensorReading::from_item(event).is_none());
    }

    #[test]
    fn magnitude_is_distance_to_violated_bound() {
        // ---
        let above = Deviation {
            metric: Metric::Temperature,
            actual: 35.0,
            lower_bound: Some(15.0),
            upper_bound: Some(30.0),
            direction: Direction::Above,
        };
        assert_eq!(above.magnitude(), 5.0);

        let below = Deviation {
            direction: Direction::Below,
            actual: 10.0,
            ..above
        };
        assert_eq!(below.magnitude(), 5.0);
    }
}
