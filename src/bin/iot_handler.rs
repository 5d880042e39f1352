//! Lambda invoked by the IoT rule with one device message per call.
//!
//! # Environment Variables
//! - `DYNAMO_TABLE_NAME` (**required**)
//! - `AWS_ENDPOINT_URL` (optional)
use std::sync::Arc;

use dotenvy::dotenv;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::debug;

use merida_backend::ingest::{IngestResponse, Ingestor};
use merida_backend::store::{DynamoStore, ItemStore};
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
    let ingestor = Ingestor::new(store);

    run(service_fn(|event: LambdaEvent<Value>| handler(&ingestor, event))).await
}

async fn handler(ingestor: &Ingestor, event: LambdaEvent<Value>) -> Result<IngestResponse, Error> {
    // ---
    debug!(request_id = %event.context.request_id, "Received IoT message");
    Ok(ingestor.handle(event.payload).await)
}
