//! Ingestion of IoT messages into the single table.
//!
//! Devices publish either sensor states or irrigation events for a plot.
//! Both end up under `PLOT#<id>`; the sort key prefix tells them apart
//! (`STATE#`, `EVENT#`, `DATA#` for anything unrecognized). Readings also
//! get a facility index key so they can be listed per facility.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::keys::{self, GSI_PK, GSI_SK, PK, SK};
use crate::store::attrs::{self, first_string, json_to_attr};
use crate::store::{AttrFilter, Item, ItemStore, ScanFilter};

// ---

/// Payload fields that become metadata attributes, with their stored names.
/// Later entries win when a message carries both spellings.
const METADATA_FIELDS: [(&str, &str); 8] = [
    ("SpeciesId", "SpeciesId"),
    ("species_id", "SpeciesId"),
    ("FacilityId", "FacilityId"),
    ("facility_id", "FacilityId"),
    ("BusinessId", "BusinessId"),
    ("business_id", "BusinessId"),
    ("PlotName", "PlotName"),
    ("plot_name", "PlotName"),
];

/// Routing fields never copied into event items.
const ROUTING_FIELDS: [&str; 6] = [
    "plot_id",
    "timestamp",
    "facility_id",
    "species_id",
    "business_id",
    "plot_name",
];

/// Kind of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    State,
    Event,
    Other(String),
}

/// Classify a message: irrigation fields imply an event, otherwise an
/// explicit `type` decides, otherwise it is a state.
pub fn classify(payload: &Map<String, Value>) -> MessageKind {
    // ---
    if ["event_type", "duration", "water_amount"]
        .iter()
        .any(|k| payload.contains_key(*k))
    {
        return MessageKind::Event;
    }

    match payload.get("type") {
        Some(Value::String(t)) if t == "state" => MessageKind::State,
        Some(Value::String(t)) if t == "event" => MessageKind::Event,
        Some(other) => MessageKind::Other(scalar_text(other)),
        None => MessageKind::State,
    }
}

/// Renamed event fields.
fn event_field_name(key: &str) -> &str {
    match key {
        "event_type" => "EventType",
        "duration" => "Duration",
        "water_amount" => "WaterAmount",
        "type" => "IrrigationType",
        other => other,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Plot id of a message; `UNKNOWN` when absent.
pub fn extract_plot_id(payload: &Map<String, Value>) -> String {
    payload
        .get("plot_id")
        .filter(|v| !is_blank(v))
        .map(scalar_text)
        .unwrap_or_else(|| keys::UNKNOWN_ID.to_string())
}

/// Facts about a plot used to complete messages lacking them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlotMetadata {
    pub facility_id: Option<String>,
    pub species: Option<String>,
    pub name: Option<String>,
}

impl PlotMetadata {
    pub fn from_item(item: &Item) -> Self {
        Self {
            facility_id: first_string(item, &["facility_id"]),
            species: first_string(item, &["species"]),
            name: first_string(item, &["name"]),
        }
    }
}

/// Fill missing facility, species and plot name from plot metadata.
fn complete_payload(payload: &mut Map<String, Value>, metadata: &PlotMetadata) {
    // ---
    if let Some(facility_id) = &metadata.facility_id {
        payload.insert("facility_id".into(), Value::String(facility_id.clone()));
    }
    if let Some(species) = &metadata.species {
        if !payload.contains_key("species_id") {
            payload.insert("species_id".into(), Value::String(species.clone()));
        }
    }
    if let Some(name) = &metadata.name {
        if !payload.contains_key("plot_name") {
            payload.insert("plot_name".into(), Value::String(name.clone()));
        }
    }
}

pub fn needs_metadata(payload: &Map<String, Value>) -> bool {
    payload.get("facility_id").map_or(true, is_blank)
}

/// Build the stored item for one message.
///
/// `metadata` completes the message when it lacks a facility id.
pub fn format_item(
    payload: &Map<String, Value>,
    plot_id: &str,
    metadata: Option<&PlotMetadata>,
    now: DateTime<Utc>,
) -> Item {
    // ---
    let mut payload = payload.clone();
    if needs_metadata(&payload) {
        if let Some(metadata) = metadata {
            complete_payload(&mut payload, metadata);
        }
    }

    let timestamp = payload
        .get("timestamp")
        .filter(|v| !is_blank(v))
        .map(scalar_text)
        .unwrap_or_else(|| {
            let generated = now.to_rfc3339_opts(SecondsFormat::Micros, true);
            debug!(timestamp = %generated, "Generated automatic timestamp");
            generated
        });

    let mut item = Item::from([
        (PK.to_string(), attrs::s(keys::plot_pk(plot_id))),
        ("Timestamp".to_string(), attrs::s(&timestamp)),
        (GSI_SK.to_string(), attrs::s(format!("{}{timestamp}", keys::TIMESTAMP_PREFIX))),
    ]);

    for (source, target) in METADATA_FIELDS {
        if let Some(value) = payload.get(source).filter(|v| !is_blank(v)) {
            item.insert(target.to_string(), json_to_attr(value));
        }
    }

    item.insert("plot_id".to_string(), attrs::s(plot_id));
    item.insert("PlotId".to_string(), attrs::s(plot_id));

    let facility_id = first_string(&item, &["FacilityId"]);
    let gsi_pk = keys::facility_pk(facility_id.as_deref().unwrap_or(keys::UNKNOWN_ID));
    item.insert(GSI_PK.to_string(), attrs::s(gsi_pk));

    match classify(&payload) {
        MessageKind::State => {
            item.insert(SK.to_string(), attrs::s(keys::state_sk(&timestamp)));
            if let Some(Value::Object(sensor_data)) = payload.get("sensor_data") {
                for (key, value) in sensor_data {
                    if key == PK || key == SK {
                        continue;
                    }
                    item.insert(key.clone(), json_to_attr(value));
                }
            }
        }
        MessageKind::Event => {
            item.insert(SK.to_string(), attrs::s(keys::event_sk(&timestamp)));
            for (key, value) in &payload {
                if ROUTING_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                item.insert(event_field_name(key).to_string(), json_to_attr(value));
            }
        }
        MessageKind::Other(kind) => {
            warn!(kind = %kind, "Unknown message type");
            item.insert(
                SK.to_string(),
                attrs::s(format!("{}{timestamp}", keys::DATA_PREFIX)),
            );
        }
    }

    item
}

/// Lambda response of the IoT handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON document encoded as a string.
    pub body: String,
}

/// Process-lifetime context of the IoT Lambda.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn ItemStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Look up plot metadata by id: type index first, then a scan.
    pub async fn plot_metadata(&self, plot_id: &str) -> Option<PlotMetadata> {
        // ---
        let filter = AttrFilter::eq("plot_id", plot_id);

        match self.store.query_type_index("PLOT", Some(&filter), Some(1)).await {
            Ok(items) if !items.is_empty() => {
                let metadata = PlotMetadata::from_item(&items[0]);
                debug!(plot_id, ?metadata, "Found metadata via type index");
                return Some(metadata);
            }
            Ok(_) => debug!(plot_id, "Type index returned no results, trying scan"),
            Err(e) => error!(plot_id, error = %e, "Type index query failed, trying scan"),
        }

        let scan = ScanFilter {
            attr: Some(filter),
            ..ScanFilter::default()
        };
        match self.store.scan(&scan).await {
            Ok(items) => {
                let found = items
                    .iter()
                    .find(|item| first_string(item, &[keys::TYPE_ATTR]).as_deref() == Some("PLOT"))
                    .map(PlotMetadata::from_item);
                if found.is_none() {
                    warn!(plot_id, "No metadata found for plot");
                }
                found
            }
            Err(e) => {
                error!(plot_id, error = %e, "Error fetching plot metadata");
                None
            }
        }
    }

    /// Store one inbound message.
    pub async fn handle(&self, payload: Value) -> IngestResponse {
        // ---
        let payload = match payload {
            Value::Object(map) => map,
            other => {
                warn!(payload = %other, "Message is not a JSON object");
                Map::new()
            }
        };

        let plot_id = extract_plot_id(&payload);
        if plot_id == keys::UNKNOWN_ID {
            warn!("Could not extract plot_id, using UNKNOWN");
        }

        let metadata = if needs_metadata(&payload) {
            debug!(%plot_id, "facility_id not in payload, fetching plot metadata");
            self.plot_metadata(&plot_id).await
        } else {
            None
        };

        let item = format_item(&payload, &plot_id, metadata.as_ref(), Utc::now());
        let pk = attrs::key_string(&item, PK).unwrap_or_default().to_string();
        let sk = attrs::key_string(&item, SK).unwrap_or_default().to_string();

        match self.store.put_item(item).await {
            Ok(()) => {
                info!(%pk, %sk, "Saved item to DynamoDB");
                IngestResponse {
                    status_code: 200,
                    body: json!({"message": "Data saved successfully", "pk": pk, "sk": sk})
                        .to_string(),
                }
            }
            Err(e) => {
                error!(%pk, %sk, error = %e, "Error processing message");
                IngestResponse {
                    status_code: 500,
                    body: json!({"error": e.to_string()}).to_string(),
                }
            }
        }
    }
}
