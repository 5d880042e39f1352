//! Alert formatting and publishing.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{error, info};

use crate::keys;
use crate::models::{Alert, Deviation, Direction};
use crate::notify::AlertTopic;

// ---

/// Everything needed to render one alert.
#[derive(Debug, Clone)]
pub struct AlertContext<'a> {
    pub plot_id: &'a str,
    pub plot_name: Option<&'a str>,
    pub species_id: Option<&'a str>,
    pub facility_name: &'a str,
    pub timestamp: Option<&'a str>,
    pub deviations: &'a [Deviation],
    pub recipients: &'a [String],
}

/// Display name and unit of a metric.
pub fn metric_label(metric: &str) -> (String, &'static str) {
    // ---
    match metric {
        "temperature" => ("Temperature".to_string(), "°C"),
        "humidity" => ("Humidity".to_string(), "%"),
        "light" => ("Light".to_string(), "lux"),
        "soil_moisture" => ("Soil Moisture".to_string(), "%"),
        other => (capitalize(other), ""),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `Plot <first 8 chars>` when the plot has no name.
pub fn plot_display(plot_id: &str, plot_name: Option<&str>) -> String {
    match plot_name.filter(|n| !n.trim().is_empty()) {
        Some(name) => name.to_string(),
        None => format!("Plot {}", keys::short_id(plot_id)),
    }
}

/// Human-readable allowed range of a deviation.
pub fn range_description(lower: Option<f64>, upper: Option<f64>, unit: &str) -> String {
    // ---
    match (lower, upper) {
        (Some(lower), Some(upper)) => format!("{lower:.1} - {upper:.1}{unit}"),
        (Some(lower), None) => format!(">= {lower:.1}{unit}"),
        (None, Some(upper)) => format!("<= {upper:.1}{unit}"),
        (None, None) => "undefined".to_string(),
    }
}

/// One bullet block of the alert body.
fn deviation_lines(deviation: &Deviation) -> [String; 2] {
    // ---
    let (name, unit) = metric_label(deviation.metric.as_str());
    let excess = match deviation.direction {
        Direction::Above => "above maximum",
        Direction::Below => "below minimum",
    };

    [
        format!(
            "  - {name}: {:.1}{unit} ({:.1}{unit} {excess})",
            deviation.actual,
            deviation.magnitude()
        ),
        format!(
            "    Allowed range: {}",
            range_description(deviation.lower_bound, deviation.upper_bound, unit)
        ),
    ]
}

/// Render subject and body.
pub fn format_alert(brand: &str, ctx: &AlertContext<'_>) -> Alert {
    // ---
    let plot = plot_display(ctx.plot_id, ctx.plot_name);
    let subject = format!("[{brand} Alert] {plot} - Values Out of Range");

    let timestamp = ctx
        .timestamp
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

    let mut lines = vec![
        "ALERT: Environmental Values Out of Tolerance Range".to_string(),
        String::new(),
        format!("Facility: {}", ctx.facility_name),
        format!("Plot: {plot}"),
        format!("Species: {}", ctx.species_id.unwrap_or("Unknown")),
        format!("Timestamp: {timestamp}"),
        String::new(),
        "Metrics Outside Tolerance:".to_string(),
        String::new(),
    ];

    for deviation in ctx.deviations {
        lines.extend(deviation_lines(deviation));
        lines.push(String::new());
    }

    lines.push("---".to_string());
    lines.push(format!(
        "This is an automated alert from the {brand} monitoring system."
    ));

    Alert {
        plot_id: ctx.plot_id.to_string(),
        subject,
        body: lines.join("\n"),
        recipients: ctx.recipients.to_vec(),
    }
}

/// Formats alerts and hands them to the topic, fire-and-forget.
#[derive(Clone)]
pub struct AlertPublisher {
    topic: Option<Arc<dyn AlertTopic>>,
    brand: String,
}

impl AlertPublisher {
    pub fn new(topic: Option<Arc<dyn AlertTopic>>, brand: impl Into<String>) -> Self {
        Self {
            topic,
            brand: brand.into(),
        }
    }

    /// Publish an alert. Never fails: a missing topic or a publish error is
    /// logged and the alert dropped. Returns whether the topic accepted it.
    pub async fn publish(&self, ctx: &AlertContext<'_>) -> bool {
        // ---
        let Some(topic) = &self.topic else {
            error!("ALERTS_TOPIC_ARN is required to publish alerts");
            return false;
        };

        let alert = format_alert(&self.brand, ctx);
        match topic.publish(&alert).await {
            Ok(()) => {
                info!(
                    plot_id = %ctx.plot_id,
                    recipients = alert.recipients.len(),
                    "Alert published"
                );
                true
            }
            Err(e) => {
                error!(plot_id = %ctx.plot_id, error = %e, "Failed to publish alert");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Metric;

    fn deviation(
        metric: Metric,
        actual: f64,
        lower: Option<f64>,
        upper: Option<f64>,
        direction: Direction,
    ) -> Deviation {
        Deviation {
            metric,
            actual,
            lower_bound: lower,
            upper_bound: upper,
            direction,
        }
    }

    #[test]
    fn labels_known_and_unknown_metrics() {
        // ---
        assert_eq!(metric_label("temperature"), ("Temperature".to_string(), "°C"));
        assert_eq!(metric_label("soil_moisture"), ("Soil Moisture".to_string(), "%"));
        assert_eq!(metric_label("irrigation"), ("Irrigation".to_string(), ""));
    }

    #[test]
    fn range_descriptions() {
        // ---
        assert_eq!(range_description(Some(15.0), Some(30.0), "°C"), "15.0 - 30.0°C");
        assert_eq!(range_description(Some(15.0), None, "%"), ">= 15.0%");
        assert_eq!(range_description(None, Some(30.0), "lux"), "<= 30.0lux");
        assert_eq!(range_description(None, None, "%"), "undefined");
    }

    #[test]
    fn plot_display_prefers_name() {
        assert_eq!(plot_display("abcdefghijkl", Some("Tomatoes")), "Tomatoes");
        assert_eq!(plot_display("abcdefghijkl", None), "Plot abcdefgh");
        assert_eq!(plot_display("abcdefghijkl", Some(" ")), "Plot abcdefgh");
    }

    #[test]
    fn formats_subject_and_body() {
        // ---
        let deviations = vec![
            deviation(Metric::Temperature, 35.0, Some(15.0), Some(30.0), Direction::Above),
            deviation(Metric::Humidity, 20.0, Some(40.0), None, Direction::Below),
        ];
        let recipients = vec!["ops@farm.io".to_string()];
        let ctx = AlertContext {
            plot_id: "p-123456789",
            plot_name: Some("Greenhouse A"),
            species_id: None,
            facility_name: "North Farm",
            timestamp: Some("2025-06-01T12:00:00Z"),
            deviations: &deviations,
            recipients: &recipients,
        };

        let alert = format_alert("MERIDA", &ctx);
        assert_eq!(alert.subject, "[MERIDA Alert] Greenhouse A - Values Out of Range");
        assert_eq!(alert.recipients, recipients);

        let expected = "\
ALERT: Environmental Values Out of Tolerance Range

Facility: North Farm
Plot: Greenhouse A
Species: Unknown
Timestamp: 2025-06-01T12:00:00Z

Metrics Outside Tolerance:

  - Temperature: 35.0°C (5.0°C above maximum)
    Allowed range: 15.0 - 30.0°C

  - Humidity: 20.0% (20.0% below minimum)
    Allowed range: >= 40.0%

---
This is an automated alert from the MERIDA monitoring system.";
        assert_eq!(alert.body, expected);
    }

    #[tokio::test]
    async fn missing_topic_is_a_logged_no_op() {
        // ---
        let publisher = AlertPublisher::new(None, "MERIDA");
        let ctx = AlertContext {
            plot_id: "p-1",
            plot_name: None,
            species_id: None,
            facility_name: "Unknown Facility",
            timestamp: None,
            deviations: &[],
            recipients: &[],
        };
        assert!(!publisher.publish(&ctx).await);
    }
}
