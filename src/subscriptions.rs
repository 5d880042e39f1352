//! Keeps the alerts topic's email subscriptions in line with the stored
//! responsibles lists.
//!
//! Each stream record is diffed on its own: addresses only in the new image
//! are subscribed, addresses only in the old image are unsubscribed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::keys::{self, PK, SK};
use crate::notify::SubscriptionTopic;
use crate::store::attrs::{key_string, string_entries};
use crate::store::Item;
use crate::stream::ChangeRecord;

/// Attribute names that may hold responsible emails, in lookup order.
pub const RESPONSIBLE_ATTRIBUTES: [&str; 6] = [
    "responsibles",
    "Responsibles",
    "users",
    "Users",
    "emails",
    "Emails",
];

const PENDING_CONFIRMATION: &str = "pendingconfirmation";

// ---

/// Lowercased email set of a stream image.
pub fn extract_emails(image: Option<&Item>) -> BTreeSet<String> {
    // ---
    let Some(image) = image else {
        return BTreeSet::new();
    };

    // First attribute with a usable shape wins
    RESPONSIBLE_ATTRIBUTES
        .iter()
        .filter_map(|name| image.get(*name))
        .find_map(string_entries)
        .unwrap_or_default()
        .into_iter()
        .map(|email| email.to_lowercase())
        .collect()
}

/// Addresses to subscribe and to unsubscribe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDelta {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl SubscriptionDelta {
    pub fn between(new: &BTreeSet<String>, old: &BTreeSet<String>) -> Self {
        Self {
            to_add: new.difference(old).cloned().collect(),
            to_remove: old.difference(new).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Counters of one sync pass, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub subscribed: usize,
    pub unsubscribed: usize,
    pub pending: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Process-lifetime context of the sync Lambda.
#[derive(Clone)]
pub struct SubscriptionSync {
    topic: Option<Arc<dyn SubscriptionTopic>>,
}

impl SubscriptionSync {
    pub fn new(topic: Option<Arc<dyn SubscriptionTopic>>) -> Self {
        Self { topic }
    }

    /// Sync every record of a batch.
    pub async fn handle_batch(&self, records: Vec<ChangeRecord>) -> SyncReport {
        // ---
        info!("Received {} stream records", records.len());

        let mut total = SyncReport::default();
        for record in records {
            let report = self.handle_record(&record).await;
            total.subscribed += report.subscribed;
            total.unsubscribed += report.unsubscribed;
            total.pending += report.pending;
            total.missing += report.missing;
            total.failed += report.failed;
        }
        total
    }

    pub async fn handle_record(&self, record: &ChangeRecord) -> SyncReport {
        // ---
        let (Some(pk), Some(sk)) = (key_string(&record.keys, PK), key_string(&record.keys, SK))
        else {
            debug!(kind = ?record.kind, "Record without pk/sk, skipping");
            return SyncReport::default();
        };

        let new_emails = extract_emails(record.new_image.as_ref());
        let old_emails = extract_emails(record.old_image.as_ref());

        info!(
            kind = ?record.kind,
            owner = keys::key_suffix(pk),
            facility = keys::key_suffix(sk),
            new = ?new_emails,
            old = ?old_emails,
            "Processing responsibles change"
        );

        self.sync(&SubscriptionDelta::between(&new_emails, &old_emails))
            .await
    }

    /// Apply a delta to the topic.
    pub async fn sync(&self, delta: &SubscriptionDelta) -> SyncReport {
        // ---
        let mut report = SyncReport::default();
        if delta.is_empty() {
            return report;
        }

        let Some(topic) = &self.topic else {
            error!("ALERTS_TOPIC_ARN is required to sync subscriptions");
            return report;
        };

        if !delta.to_add.is_empty() {
            info!(emails = ?delta.to_add, "Adding subscriptions");
        }
        for email in &delta.to_add {
            match topic.subscribe_email(email).await {
                Ok(()) => report.subscribed += 1,
                Err(e) => {
                    error!(%email, error = %e, "Failed to subscribe");
                    report.failed += 1;
                }
            }
        }

        if delta.to_remove.is_empty() {
            return report;
        }

        info!(emails = ?delta.to_remove, "Removing subscriptions");
        let existing = match list_email_subscriptions(topic.as_ref()).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(error = %e, "Failed to list topic subscriptions");
                report.failed += delta.to_remove.len();
                return report;
            }
        };

        for email in &delta.to_remove {
            let Some(arn) = existing.get(&email.to_lowercase()) else {
                debug!(%email, "Subscription not found; skipping removal");
                report.missing += 1;
                continue;
            };

            if arn.to_lowercase() == PENDING_CONFIRMATION {
                info!(%email, "Subscription still pending confirmation; cannot remove");
                report.pending += 1;
                continue;
            }

            match topic.unsubscribe(arn).await {
                Ok(()) => report.unsubscribed += 1,
                Err(e) => {
                    error!(%email, error = %e, "Failed to unsubscribe");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Map lowercased email endpoint → subscription ARN, over every page.
async fn list_email_subscriptions(
    topic: &dyn SubscriptionTopic,
) -> crate::notify::Result<HashMap<String, String>> {
    // ---
    let mut subscriptions = HashMap::new();
    let mut next_token = None;

    loop {
        let page = topic.list_subscriptions(next_token).await?;
        for sub in page.subscriptions {
            if sub.protocol != "email" || sub.endpoint.is_empty() {
                continue;
            }
            subscriptions.insert(sub.endpoint.to_lowercase(), sub.subscription_arn);
        }

        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }

    Ok(subscriptions)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::attrs::s;
    use crate::store::AttributeValue;

    #[test]
    fn extracts_from_first_matching_attribute() {
        // ---
        let image = Item::from([
            ("Users".to_string(), s("ignored@x.com")),
            ("responsibles".to_string(), AttributeValue::L(vec![s(" A@X.com "), s("")])),
        ]);
        let emails = extract_emails(Some(&image));
        assert_eq!(emails, BTreeSet::from(["a@x.com".to_string()]));

        let csv = Item::from([("emails".to_string(), s("b@x.com, C@x.com ,"))]);
        assert_eq!(extract_emails(Some(&csv)).len(), 2);
        assert!(extract_emails(None).is_empty());
    }

    #[test]
    fn delta_is_a_set_difference() {
        // ---
        let new = BTreeSet::from(["a".to_string(), "b".to_string()]);
        let old = BTreeSet::from(["b".to_string(), "c".to_string()]);
        let delta = SubscriptionDelta::between(&new, &old);
        assert_eq!(delta.to_add, BTreeSet::from(["a".to_string()]));
        assert_eq!(delta.to_remove, BTreeSet::from(["c".to_string()]));
        assert!(SubscriptionDelta::between(&new, &new).is_empty());
    }

    #[tokio::test]
    async fn missing_topic_changes_nothing() {
        // ---
        let sync = SubscriptionSync::new(None);
        let delta = SubscriptionDelta {
            to_add: BTreeSet::from(["a@x.com".to_string()]),
            to_remove: BTreeSet::new(),
        };
        assert_eq!(sync.sync(&delta).await, SyncReport::default());
    }
}
