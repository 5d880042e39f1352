//! HTTP API gateway.
//!
//! Each sibling module exports a subrouter over [`AppState`]; this module
//! merges them, applies the CORS policy and attaches the state so `main.rs`
//! only sees [`router`].

use std::sync::Arc;

use axum::Router;

use crate::store::ItemStore;
use crate::Config;

mod cors;
mod error;
mod facilities;
mod health;
mod plots;
mod species;

pub use error::{ApiError, ApiResult};

/// State shared by every handler.
pub type AppState = (Arc<dyn ItemStore>, Config);

// ---

pub fn router(store: Arc<dyn ItemStore>, config: Config) -> Router {
    // ---
    let cors = cors::cors_layer(&config.frontend_origins);

    Router::new()
        .merge(facilities::router())
        .merge(plots::router())
        .merge(species::router())
        .merge(health::router())
        .layer(cors)
        .with_state((store, config))
}
