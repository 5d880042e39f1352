//! Backend of the MERIDA agricultural monitoring system.
//!
//! One library shared by four binaries:
//! - `merida-api`: axum CRUD API over facilities, plots and species
//! - `iot-handler`: writes device messages into the table ([`ingest`])
//! - `alert-processor`: evaluates new readings against plot thresholds
//!   ([`alerts`])
//! - `responsible-sync`: mirrors responsibles lists onto topic
//!   subscriptions ([`subscriptions`])
//!
//! Storage sits behind [`store::ItemStore`] and notifications behind the
//! [`notify`] traits, so every flow runs against in-memory doubles in tests.

pub mod alerts;
pub mod config;
pub mod ingest;
pub mod keys;
pub mod models;
pub mod notify;
pub mod routes;
pub mod store;
pub mod stream;
pub mod subscriptions;
pub mod telemetry;

pub use config::Config;
