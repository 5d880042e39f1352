//! Notification topic gateway.
//!
//! Alerts fan out through one SNS topic whose email subscriptions mirror the
//! facility responsibles. Two seams:
//! - [`AlertTopic`]: publish a formatted alert
//! - [`SubscriptionTopic`]: manage the topic's email subscriptions

use async_trait::async_trait;

use crate::models::Alert;

mod sns;

pub use sns::SnsTopic;

// ---

pub type Result<T> = std::result::Result<T, TopicError>;

#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    // ---
    #[error("SNS {operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    #[error("invalid message attribute: {0}")]
    InvalidAttribute(String),
}

/// Destination of formatted alerts.
#[async_trait]
pub trait AlertTopic: Send + Sync {
    async fn publish(&self, alert: &Alert) -> Result<()>;
}

/// One subscription as listed by the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSubscription {
    pub protocol: String,
    pub endpoint: String,
    /// `PendingConfirmation` until the recipient confirms.
    pub subscription_arn: String,
}

/// One page of a subscription listing.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPage {
    pub subscriptions: Vec<TopicSubscription>,
    pub next_token: Option<String>,
}

/// Subscription management on the alerts topic.
#[async_trait]
pub trait SubscriptionTopic: Send + Sync {
    /// Subscribe an email endpoint. Repeating it for a subscribed address is
    /// harmless upstream.
    async fn subscribe_email(&self, email: &str) -> Result<()>;

    async fn list_subscriptions(&self, next_token: Option<String>) -> Result<SubscriptionPage>;

    async fn unsubscribe(&self, subscription_arn: &str) -> Result<()>;
}
