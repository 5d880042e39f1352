//! End-to-end alert evaluation against the in-memory store.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{
    memory_store, seed_facility, seed_plot, seed_responsibles, state_item,
    temperature_thresholds, RecordingTopic,
};
use merida_backend::alerts::{AlertProcessor, AlertPublisher, Outcome};
use merida_backend::ingest::Ingestor;
use merida_backend::keys;
use merida_backend::models::Direction;
use merida_backend::store::{ItemStore, KeyQuery, MemoryStore};
use merida_backend::stream::{ChangeKind, ChangeRecord};

// ---

fn processor(store: Arc<MemoryStore>, topic: Arc<RecordingTopic>) -> AlertProcessor {
    AlertProcessor::new(store, AlertPublisher::new(Some(topic), "MERIDA"))
}

#[tokio::test]
async fn out_of_range_reading_publishes_one_alert() {
    // ---
    let store = memory_store();
    let topic = Arc::new(RecordingTopic::default());

    seed_facility(store.as_ref(), "f-1", "North Farm").await;
    seed_responsibles(store.as_ref(), "f-1", &["ops@farm.io"]).await;
    store
        .put_item(temperature_thresholds("p-1", true).to_item())
        .await
        .unwrap();

    let processor = processor(store.clone(), topic.clone());
    let record = ChangeRecord::insert(state_item(
        "p-1",
        "2025-06-01T12:00:00Z",
        35.0,
        Some("f-1"),
    ));
    let summary = processor.handle_batch(vec![record]).await;

    assert_eq!(summary.status_code, 200);
    assert_eq!(summary.processed_records, 1);

    let published = topic.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].recipients, vec!["ops@farm.io".to_string()]);
    assert_eq!(published[0].subject, "[MERIDA Alert] Plot p-1 - Values Out of Range");
    assert!(published[0].body.contains("Facility: North Farm"));
    assert!(published[0].body.contains("Temperature: 35.0°C (5.0°C above maximum)"));
}

#[tokio::test]
async fn deviation_details_are_reported() {
    // ---
    let store = memory_store();
    let topic = Arc::new(RecordingTopic::default());
    seed_responsibles(store.as_ref(), "f-1", &["ops@farm.io"]).await;
    store
        .put_item(temperature_thresholds("p-1", true).to_item())
        .await
        .unwrap();

    let outcome = processor(store, topic)
        .process_item(state_item("p-1", "t1", 10.0, Some("f-1")))
        .await;

    let Outcome::Alerted { deviations, published, .. } = outcome else {
        panic!("expected an alert, got {outcome:?}");
    };
    assert!(published);
    assert_eq!(deviations.len(), 1);
    assert_eq!(deviations[0].direction, Direction::Below);
    assert_eq!(deviations[0].magnitude(), 5.0);
}

#[tokio::test]
async fn disabled_thresholds_publish_nothing() {
    // ---
    let store = memory_store();
    let topic = Arc::new(RecordingTopic::default());
    seed_responsibles(store.as_ref(), "f-1", &["ops@farm.io"]).await;
    store
        .put_item(temperature_thresholds("p-1", false).to_item())
        .await
        .unwrap();

    let processor = processor(store, topic.clone());
    let outcome = processor
        .process_item(state_item("p-1", "t1", 35.0, Some("f-1")))
        .await;

    assert_eq!(outcome, Outcome::Disabled);
    assert!(topic.published().is_empty());
}

#[tokio::test]
async fn missing_thresholds_count_as_processed() {
    // ---
    let store = memory_store();
    let topic = Arc::new(RecordingTopic::default());
    let processor = processor(store, topic.clone());

    let record = ChangeRecord::insert(state_item("p-404", "t1", 35.0, None));
    let summary = processor.handle_batch(vec![record]).await;

    assert_eq!(summary.processed_records, 1);
    assert!(topic.published().is_empty());
}

#[tokio::test]
async fn non_insert_and_non_state_records_are_skipped() {
    // ---
    let store = memory_store();
    let topic = Arc::new(RecordingTopic::default());
    let processor = processor(store, topic.clone());

    let mut modify = ChangeRecord::insert(state_item("p-1", "t1", 35.0, None));
    modify.kind = ChangeKind::Modify;

    let mut event = state_item("p-1", "t2", 35.0, None);
    event.insert(keys::SK.to_string(), merida_backend::store::attrs::s("EVENT#t2"));

    let summary = processor
        .handle_batch(vec![modify, ChangeRecord::insert(event)])
        .await;
    assert_eq!(summary.processed_records, 0);
    assert!(topic.published().is_empty());
}

#[tokio::test]
async fn reprocessing_the_same_reading_gives_the_same_alert() {
    // ---
    let store = memory_store();
    let topic = Arc::new(RecordingTopic::default());
    seed_responsibles(store.as_ref(), "f-1", &["ops@farm.io"]).await;
    store
        .put_item(temperature_thresholds("p-1", true).to_item())
        .await
        .unwrap();

    let processor = processor(store, topic.clone());
    let item = state_item("p-1", "2025-06-01T12:00:00Z", 35.0, Some("f-1"));
    processor.process_item(item.clone()).await;
    processor.process_item(item).await;

    let published = topic.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0], published[1]);
}

#[tokio::test]
async fn facility_falls_back_to_plot_metadata() {
    // ---
    let store = memory_store();
    let topic = Arc::new(RecordingTopic::default());
    seed_plot(store.as_ref(), "f-7", "p-1", "Basil").await;
    seed_responsibles(store.as_ref(), "f-7", &["grower@farm.io"]).await;
    store
        .put_item(temperature_thresholds("p-1", true).to_item())
        .await
        .unwrap();

    let processor = processor(store, topic.clone());
    processor
        .process_item(state_item("p-1", "t1", 31.0, None))
        .await;

    let published = topic.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].recipients, vec!["grower@farm.io".to_string()]);
    assert!(published[0].body.contains("Facility: Facility f-7"));
}

#[tokio::test]
async fn no_recipients_skips_publishing() {
    // ---
    let store = memory_store();
    let topic = Arc::new(RecordingTopic::default());
    store
        .put_item(temperature_thresholds("p-1", true).to_item())
        .await
        .unwrap();

    let outcome = processor(store, topic.clone())
        .process_item(state_item("p-1", "t1", 35.0, Some("f-1")))
        .await;

    assert!(matches!(outcome, Outcome::NoRecipients { .. }));
    assert!(outcome.is_processed());
    assert!(topic.published().is_empty());
}

#[tokio::test]
async fn publish_failure_still_counts_as_processed() {
    // ---
    let store = memory_store();
    let topic = Arc::new(RecordingTopic::failing());
    seed_responsibles(store.as_ref(), "f-1", &["ops@farm.io"]).await;
    store
        .put_item(temperature_thresholds("p-1", true).to_item())
        .await
        .unwrap();

    let summary = processor(store, topic)
        .handle_batch(vec![ChangeRecord::insert(state_item("p-1", "t1", 35.0, Some("f-1")))])
        .await;
    assert_eq!(summary.processed_records, 1);
}

#[tokio::test]
async fn ingested_state_flows_into_an_alert() {
    // ---
    let store = memory_store();
    let topic = Arc::new(RecordingTopic::default());
    seed_plot(store.as_ref(), "f-1", "p-1", "Greenhouse A").await;
    seed_responsibles(store.as_ref(), "f-1", &["ops@farm.io"]).await;
    store
        .put_item(temperature_thresholds("p-1", true).to_item())
        .await
        .unwrap();

    let ingestor = Ingestor::new(store.clone());
    let response = ingestor
        .handle(json!({
            "plot_id": "p-1",
            "timestamp": "2025-06-01T12:00:00Z",
            "sensor_data": {"temperature": 34.2, "humidity": 55}
        }))
        .await;
    assert_eq!(response.status_code, 200);

    let stored = store
        .query(&KeyQuery::partition("PLOT#p-1").begins_with("STATE#"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);

    processor(store, topic.clone())
        .handle_batch(vec![ChangeRecord::insert(stored[0].clone())])
        .await;

    let published = topic.published();
    assert_eq!(published.len(), 1);
    assert_eq!(
        published[0].subject,
        "[MERIDA Alert] Greenhouse A - Values Out of Range"
    );
}
