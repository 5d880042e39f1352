//! Entry point of the MERIDA HTTP API.
//!
//! Startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Building the DynamoDB client from that configuration
//! - Creating the table if it does not exist
//! - Mounting all API routes via the `routes` gateway
//! - Binding the axum server on `HTTP_PORT`
//!
//! # Environment Variables
//! - `DYNAMO_TABLE_NAME` (**required**) – single table holding every entity
//! - `AWS_ENDPOINT_URL` (optional) – LocalStack or other endpoint override
//! - `FRONTEND_ORIGIN` (optional) – comma-separated CORS origins, or `*`
//! - `HTTP_PORT` (optional) – listen port (default: 8080)
//! - `HISTORY_LIMIT` (optional) – default `limit` of history queries
//! - `MERIDA_LOG_LEVEL` / `MERIDA_SPAN_EVENTS` (optional) – tracing setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;

use merida_backend::store::{DynamoStore, ItemStore};
use merida_backend::{config, routes, telemetry};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    telemetry::init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let dynamo = DynamoStore::from_config(&cfg).await;
    dynamo.ensure_table().await?;
    let store: Arc<dyn ItemStore> = Arc::new(dynamo);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));

    // Build app from routes gateway
    let app: Router = routes::router(store, cfg);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
