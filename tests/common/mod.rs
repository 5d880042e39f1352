//! Test doubles and fixtures shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use merida_backend::alerts::recipients::responsibles_item;
use merida_backend::keys;
use merida_backend::models::{Alert, Bounds, MetricBounds, PlotThresholds};
use merida_backend::notify::{
    self, AlertTopic, SubscriptionPage, SubscriptionTopic, TopicError, TopicSubscription,
};
use merida_backend::store::attrs::{n, s};
use merida_backend::store::{
    self, AttrFilter, Item, ItemStore, KeyQuery, MemoryStore, ScanFilter, StoreError,
};

// ---

/// Topic double recording every call.
#[derive(Default)]
pub struct RecordingTopic {
    pub published: Mutex<Vec<Alert>>,
    pub subscribed: Mutex<Vec<String>>,
    pub unsubscribed: Mutex<Vec<String>>,
    /// Listed subscriptions, served two per page.
    pub existing: Mutex<Vec<TopicSubscription>>,
    pub fail_publish: bool,
}

impl RecordingTopic {
    pub fn failing() -> Self {
        Self {
            fail_publish: true,
            ..Self::default()
        }
    }

    pub fn with_subscriptions(subscriptions: Vec<TopicSubscription>) -> Self {
        Self {
            existing: Mutex::new(subscriptions),
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<Alert> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().clone()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertTopic for RecordingTopic {
    async fn publish(&self, alert: &Alert) -> notify::Result<()> {
        if self.fail_publish {
            return Err(TopicError::Backend {
                operation: "Publish",
                message: "simulated outage".into(),
            });
        }
        self.published.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

#[async_trait]
impl SubscriptionTopic for RecordingTopic {
    async fn subscribe_email(&self, email: &str) -> notify::Result<()> {
        self.subscribed.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn list_subscriptions(
        &self,
        next_token: Option<String>,
    ) -> notify::Result<SubscriptionPage> {
        // ---
        let existing = self.existing.lock().unwrap();
        let start: usize = next_token.map_or(0, |t| t.parse().unwrap());
        let end = (start + 2).min(existing.len());

        Ok(SubscriptionPage {
            subscriptions: existing[start..end].to_vec(),
            next_token: (end < existing.len()).then(|| end.to_string()),
        })
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> notify::Result<()> {
        self.unsubscribed.lock().unwrap().push(subscription_arn.to_string());
        Ok(())
    }
}

pub fn email_subscription(endpoint: &str, arn: &str) -> TopicSubscription {
    TopicSubscription {
        protocol: "email".into(),
        endpoint: endpoint.into(),
        subscription_arn: arn.into(),
    }
}

// ---

/// Store double whose every operation fails like an unreachable table.
pub struct FailingStore;

pub const STORE_OUTAGE: &str = "simulated outage";

fn outage(operation: &'static str) -> StoreError {
    StoreError::Backend {
        operation,
        message: STORE_OUTAGE.into(),
    }
}

#[async_trait]
impl ItemStore for FailingStore {
    async fn get_item(&self, _pk: &str, _sk: &str) -> store::Result<Option<Item>> {
        Err(outage("get_item"))
    }

    async fn put_item(&self, _item: Item) -> store::Result<()> {
        Err(outage("put_item"))
    }

    async fn delete_item(&self, _pk: &str, _sk: &str) -> store::Result<()> {
        Err(outage("delete_item"))
    }

    async fn query(&self, _query: &KeyQuery) -> store::Result<Vec<Item>> {
        Err(outage("query"))
    }

    async fn query_type_index(
        &self,
        _type_name: &str,
        _filter: Option<&AttrFilter>,
        _limit: Option<usize>,
    ) -> store::Result<Vec<Item>> {
        Err(outage("query_type_index"))
    }

    async fn scan(&self, _filter: &ScanFilter) -> store::Result<Vec<Item>> {
        Err(outage("scan"))
    }
}

// ---

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Thresholds with temperature bounded to 15..30.
pub fn temperature_thresholds(plot_id: &str, enabled: bool) -> PlotThresholds {
    let mut thresholds = PlotThresholds::disabled(plot_id);
    thresholds.enabled = enabled;
    thresholds.bounds = Bounds {
        temperature: MetricBounds {
            lower: Some(15.0),
            upper: Some(30.0),
        },
        ..Bounds::default()
    };
    thresholds
}

pub async fn seed_facility(store: &dyn ItemStore, facility_id: &str, name: &str) {
    let item = Item::from([
        (keys::PK.to_string(), s(keys::facility_pk(facility_id))),
        (keys::SK.to_string(), s(keys::METADATA_SK)),
        ("facility_id".to_string(), s(facility_id)),
        ("name".to_string(), s(name)),
        (keys::TYPE_ATTR.to_string(), s("FACILITY")),
    ]);
    store.put_item(item).await.unwrap();
}

pub async fn seed_responsibles(store: &dyn ItemStore, facility_id: &str, emails: &[&str]) {
    let emails: Vec<String> = emails.iter().map(|e| e.to_string()).collect();
    store
        .put_item(responsibles_item(facility_id, &emails))
        .await
        .unwrap();
}

pub async fn seed_plot(store: &dyn ItemStore, facility_id: &str, plot_id: &str, name: &str) {
    let item = Item::from([
        (keys::PK.to_string(), s(keys::facility_pk(facility_id))),
        (keys::SK.to_string(), s(keys::plot_sk(plot_id))),
        ("plot_id".to_string(), s(plot_id)),
        ("facility_id".to_string(), s(facility_id)),
        ("name".to_string(), s(name)),
        (keys::TYPE_ATTR.to_string(), s("PLOT")),
    ]);
    store.put_item(item).await.unwrap();
}

/// A stored plot state with a temperature value.
pub fn state_item(
    plot_id: &str,
    timestamp: &str,
    temperature: f64,
    facility_id: Option<&str>,
) -> Item {
    // ---
    let mut item = Item::from([
        (keys::PK.to_string(), s(keys::plot_pk(plot_id))),
        (keys::SK.to_string(), s(keys::state_sk(timestamp))),
        ("Timestamp".to_string(), s(timestamp)),
        ("temperature".to_string(), n(temperature)),
    ]);
    if let Some(facility_id) = facility_id {
        item.insert("FacilityId".to_string(), s(facility_id));
    }
    item
}
