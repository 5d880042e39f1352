//! Stream-driven alert evaluation.
//!
//! For every inserted plot state: load the plot's thresholds, evaluate the
//! reading, resolve the facility and its responsibles, publish one alert.
//! Records are processed one by one; a failing record never aborts the
//! batch.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::evaluator::find_deviations;
use super::publisher::{AlertContext, AlertPublisher};
use super::recipients::fetch_responsible_emails;
use super::resolution::{facility_display_name, fetch_plot_thresholds, resolve_facility};
use crate::models::{Deviation, SensorReading};
use crate::store::{Item, ItemStore};
use crate::stream::{ChangeKind, ChangeRecord};

// ---

/// What happened to one stream record.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Not an inserted plot state; not counted as processed.
    Skipped,
    /// The plot has no thresholds record.
    NoThresholds,
    /// Thresholds exist but are disabled.
    Disabled,
    InRange,
    /// Deviations found but nobody to notify.
    NoRecipients { deviations: Vec<Deviation> },
    /// An alert was handed to the publisher; `published` is false when the
    /// topic is missing or rejected it.
    Alerted {
        deviations: Vec<Deviation>,
        recipients: Vec<String>,
        published: bool,
    },
}

impl Outcome {
    pub fn is_processed(&self) -> bool {
        !matches!(self, Outcome::Skipped)
    }
}

/// Lambda response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub processed_records: usize,
}

/// Process-lifetime context of the alert Lambda.
#[derive(Clone)]
pub struct AlertProcessor {
    store: Arc<dyn ItemStore>,
    publisher: AlertPublisher,
}

impl AlertProcessor {
    pub fn new(store: Arc<dyn ItemStore>, publisher: AlertPublisher) -> Self {
        Self { store, publisher }
    }

    /// Process a batch of stream records sequentially.
    pub async fn handle_batch(&self, records: Vec<ChangeRecord>) -> BatchSummary {
        // ---
        info!("Received {} DynamoDB stream records", records.len());

        let mut processed = 0;
        for record in records {
            if record.kind != ChangeKind::Insert {
                continue;
            }
            let Some(image) = record.new_image else {
                debug!("Record without NewImage, skipping");
                continue;
            };

            if self.process_item(image).await.is_processed() {
                processed += 1;
            }
        }

        BatchSummary {
            status_code: 200,
            processed_records: processed,
        }
    }

    /// Evaluate one stored item.
    pub async fn process_item(&self, item: Item) -> Outcome {
        // ---
        let Some(reading) = SensorReading::from_item(item) else {
            debug!("Item is not a plot state event, skipping");
            return Outcome::Skipped;
        };
        self.process_reading(&reading).await
    }

    pub async fn process_reading(&self, reading: &SensorReading) -> Outcome {
        // ---
        let store = self.store.as_ref();
        let plot_id = reading.plot_id.as_str();

        let Some(thresholds) = fetch_plot_thresholds(store, plot_id).await else {
            info!(plot_id, "No thresholds configured, skipping alert evaluation");
            return Outcome::NoThresholds;
        };

        if !thresholds.enabled {
            info!(plot_id, "Thresholds disabled, skipping alert evaluation");
            return Outcome::Disabled;
        }

        let deviations = find_deviations(reading, &thresholds.bounds);
        if deviations.is_empty() {
            info!(plot_id, timestamp = ?reading.timestamp, "Measurements within acceptable range");
            return Outcome::InRange;
        }

        let facility = resolve_facility(store, reading, Some(&thresholds)).await;
        let facility_id = facility.facility_id();
        let business_id = reading
            .business_id
            .as_deref()
            .or(thresholds.business_id.as_deref());

        let recipients = fetch_responsible_emails(store, business_id, facility_id).await;
        if recipients.is_empty() {
            warn!(
                plot_id,
                ?facility_id,
                ?business_id,
                "No responsible emails found; skipping SNS notification"
            );
            return Outcome::NoRecipients { deviations };
        }

        let facility_name = facility_display_name(store, facility_id).await;
        let species_id = thresholds
            .species_id
            .as_deref()
            .or(reading.species_id.as_deref());

        let ctx = AlertContext {
            plot_id,
            plot_name: reading.plot_name.as_deref(),
            species_id,
            facility_name: &facility_name,
            timestamp: reading.timestamp.as_deref(),
            deviations: &deviations,
            recipients: &recipients,
        };
        let published = self.publisher.publish(&ctx).await;

        Outcome::Alerted {
            deviations,
            recipients,
            published,
        }
    }
}
