//! Lambda triggered by responsibles changes: subscribes added emails to the
//! alerts topic and unsubscribes removed ones.
//!
//! # Environment Variables
//! - `DYNAMO_TABLE_NAME` (**required**)
//! - `ALERTS_TOPIC_ARN` (**required** for any effect; without it every
//!   record is logged and skipped)
use std::sync::Arc;

use aws_lambda_events::event::dynamodb::Event;
use dotenvy::dotenv;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::{error, info};

use merida_backend::notify::{SnsTopic, SubscriptionTopic};
use merida_backend::stream::ChangeRecord;
use merida_backend::subscriptions::SubscriptionSync;
use merida_backend::{config, telemetry};

// ---

#[tokio::main]
async fn main() -> Result<(), Error> {
    // ---
    dotenv().ok();
    telemetry::init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let topic: Option<Arc<dyn SubscriptionTopic>> = match SnsTopic::from_config(&cfg).await {
        Some(topic) => Some(Arc::new(topic)),
        None => {
            error!("ALERTS_TOPIC_ARN not set; subscriptions will not be synced");
            None
        }
    };
    let sync = SubscriptionSync::new(topic);

    run(service_fn(|event: LambdaEvent<Event>| handler(&sync, event))).await
}

async fn handler(sync: &SubscriptionSync, event: LambdaEvent<Event>) -> Result<(), Error> {
    // ---
    let records: Vec<ChangeRecord> = event
        .payload
        .records
        .into_iter()
        .map(ChangeRecord::from)
        .collect();

    let report = sync.handle_batch(records).await;
    info!(
        subscribed = report.subscribed,
        unsubscribed = report.unsubscribed,
        pending = report.pending,
        missing = report.missing,
        failed = report.failed,
        "Responsible sync complete"
    );
    Ok(())
}
