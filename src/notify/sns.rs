//! AWS SNS implementation of the topic traits.

use async_trait::async_trait;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::types::MessageAttributeValue;
use aws_sdk_sns::Client as SnsClient;
use tracing::debug;

use super::{
    AlertTopic, Result, SubscriptionPage, SubscriptionTopic, TopicError, TopicSubscription,
};
use crate::models::Alert;
use crate::Config;

/// SNS caps subjects at 100 characters.
const MAX_SUBJECT_CHARS: usize = 100;

/// Message attribute carrying the facility-scoped recipient list.
const RECIPIENTS_ATTR: &str = "recipients";

#[derive(Clone)]
pub struct SnsTopic {
    client: SnsClient,
    topic_arn: String,
}

fn backend_error(operation: &'static str, err: impl std::error::Error) -> TopicError {
    TopicError::Backend {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

impl SnsTopic {
    pub fn new(client: SnsClient, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }

    /// Build the topic from configuration; `None` when no ARN is configured.
    pub async fn from_config(config: &Config) -> Option<Self> {
        // ---
        let topic_arn = config.alerts_topic_arn.clone()?;
        let sdk_config = config.aws_sdk_config().await;
        Some(Self::new(SnsClient::new(&sdk_config), topic_arn))
    }
}

#[async_trait]
impl AlertTopic for SnsTopic {
    async fn publish(&self, alert: &Alert) -> Result<()> {
        // ---
        let subject: String = alert.subject.chars().take(MAX_SUBJECT_CHARS).collect();
        let recipients = serde_json::to_string(&alert.recipients)
            .map_err(|e| TopicError::InvalidAttribute(e.to_string()))?;
        let recipients = MessageAttributeValue::builder()
            .data_type("String.Array")
            .string_value(recipients)
            .build()
            .map_err(|e| TopicError::InvalidAttribute(e.to_string()))?;

        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(&alert.body)
            .message_attributes(RECIPIENTS_ATTR, recipients)
            .send()
            .await
            .map_err(|e| backend_error("publish", e))?;

        debug!(message_id = ?output.message_id(), plot_id = %alert.plot_id, "SNS publish ok");
        Ok(())
    }
}

#[async_trait]
impl SubscriptionTopic for SnsTopic {
    async fn subscribe_email(&self, email: &str) -> Result<()> {
        // ---
        self.client
            .subscribe()
            .topic_arn(&self.topic_arn)
            .protocol("email")
            .endpoint(email)
            .send()
            .await
            .map_err(|e| backend_error("subscribe", e))?;
        Ok(())
    }

    async fn list_subscriptions(&self, next_token: Option<String>) -> Result<SubscriptionPage> {
        // ---
        let output = self
            .client
            .list_subscriptions_by_topic()
            .topic_arn(&self.topic_arn)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| backend_error("list_subscriptions_by_topic", e))?;

        let subscriptions = output
            .subscriptions
            .unwrap_or_default()
            .into_iter()
            .map(|s| TopicSubscription {
                protocol: s.protocol.unwrap_or_default(),
                endpoint: s.endpoint.unwrap_or_default(),
                subscription_arn: s.subscription_arn.unwrap_or_default(),
            })
            .collect();

        Ok(SubscriptionPage {
            subscriptions,
            next_token: output.next_token,
        })
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> Result<()> {
        // ---
        self.client
            .unsubscribe()
            .subscription_arn(subscription_arn)
            .send()
            .await
            .map_err(|e| backend_error("unsubscribe", e))?;
        Ok(())
    }
}
