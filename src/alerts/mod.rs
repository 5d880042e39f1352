//! Threshold alerting.
//!
//! - `evaluator`: reading × bounds → deviations (pure)
//! - `resolution`: thresholds lookup and facility fallback chain
//! - `recipients`: facility responsibles
//! - `publisher`: message formatting and topic hand-off
//! - `processor`: per-record orchestration for the stream Lambda

pub mod evaluator;
pub mod processor;
pub mod publisher;
pub mod recipients;
pub mod resolution;

pub use evaluator::find_deviations;
pub use processor::{AlertProcessor, BatchSummary, Outcome};
pub use publisher::{format_alert, AlertContext, AlertPublisher};
pub use recipients::{fetch_responsible_emails, normalize_emails};
pub use resolution::{resolve_facility, FacilityResolution, FacilitySource};
