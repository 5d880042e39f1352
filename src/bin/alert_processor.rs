//! Lambda triggered by the table's stream: evaluates every inserted plot
//! state against the plot's thresholds and publishes alerts.
//!
//! # Environment Variables
//! - `DYNAMO_TABLE_NAME` (**required**)
//! - `ALERTS_TOPIC_ARN` (optional) – without it alerts are logged, not sent
//! - `ALERT_BRAND` (optional) – subject/body brand (default: `MERIDA`)
use std::sync::Arc;

use aws_lambda_events::event::dynamodb::Event;
use dotenvy::dotenv;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::{info, warn};

use merida_backend::alerts::{AlertProcessor, AlertPublisher, BatchSummary};
use merida_backend::notify::{AlertTopic, SnsTopic};
use merida_backend::store::{DynamoStore, ItemStore};
use merida_backend::stream::ChangeRecord;
use merida_backend::{config, telemetry};

// ---

#[tokio::main]
async fn main() -> Result<(), Error> {
    // ---
    dotenv().ok();
    telemetry::init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let store: Arc<dyn ItemStore> = Arc::new(DynamoStore::from_config(&cfg).await);
    let topic: Option<Arc<dyn AlertTopic>> = match SnsTopic::from_config(&cfg).await {
        Some(topic) => Some(Arc::new(topic)),
        None => {
            warn!("ALERTS_TOPIC_ARN not set; alerts will not be published");
            None
        }
    };

    let processor = AlertProcessor::new(store, AlertPublisher::new(topic, cfg.alert_brand.clone()));

    run(service_fn(|event: LambdaEvent<Event>| handler(&processor, event))).await
}

async fn handler(
    processor: &AlertProcessor,
    event: LambdaEvent<Event>,
) -> Result<BatchSummary, Error> {
    // ---
    let records: Vec<ChangeRecord> = event
        .payload
        .records
        .into_iter()
        .map(ChangeRecord::from)
        .collect();

    let summary = processor.handle_batch(records).await;
    info!(
        processed = summary.processed_records,
        "Alert batch processing complete"
    );
    Ok(summary)
}
