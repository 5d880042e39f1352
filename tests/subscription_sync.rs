//! Responsibles → topic subscription synchronization.

mod common;

use std::sync::Arc;

use common::{email_subscription, RecordingTopic};
use merida_backend::store::attrs::s;
use merida_backend::store::{AttributeValue, Item};
use merida_backend::stream::{ChangeKind, ChangeRecord};
use merida_backend::subscriptions::{SubscriptionSync, SyncReport};

// ---

fn keys() -> Item {
    Item::from([
        ("pk".to_string(), s("BUSINESS#b-1")),
        ("sk".to_string(), s("FACILITY#f-1")),
    ])
}

fn image(emails: &[&str]) -> Item {
    Item::from([(
        "responsibles".to_string(),
        AttributeValue::L(emails.iter().map(|e| s(*e)).collect()),
    )])
}

fn modify(new: &[&str], old: &[&str]) -> ChangeRecord {
    ChangeRecord {
        kind: ChangeKind::Modify,
        keys: keys(),
        new_image: Some(image(new)),
        old_image: Some(image(old)),
    }
}

#[tokio::test]
async fn additions_are_subscribed() {
    // ---
    let topic = Arc::new(RecordingTopic::default());
    let sync = SubscriptionSync::new(Some(topic.clone()));

    let record = ChangeRecord {
        kind: ChangeKind::Insert,
        keys: keys(),
        new_image: Some(image(&["Ops@Farm.io", "grower@farm.io"])),
        old_image: None,
    };
    let report = sync.handle_batch(vec![record]).await;

    assert_eq!(report.subscribed, 2);
    assert_eq!(topic.subscribed(), vec!["grower@farm.io", "ops@farm.io"]);
    assert!(topic.unsubscribed().is_empty());
}

#[tokio::test]
async fn removals_unsubscribe_confirmed_and_skip_pending() {
    // ---
    let topic = Arc::new(RecordingTopic::with_subscriptions(vec![
        email_subscription("keep@farm.io", "arn:keep"),
        email_subscription("Gone@Farm.io", "arn:gone"),
        email_subscription("pending@farm.io", "PendingConfirmation"),
    ]));
    let sync = SubscriptionSync::new(Some(topic.clone()));

    let report = sync
        .handle_record(&modify(
            &["keep@farm.io"],
            &["keep@farm.io", "gone@farm.io", "pending@farm.io", "never@farm.io"],
        ))
        .await;

    assert_eq!(
        report,
        SyncReport {
            subscribed: 0,
            unsubscribed: 1,
            pending: 1,
            missing: 1,
            failed: 0,
        }
    );
    assert_eq!(topic.unsubscribed(), vec!["arn:gone"]);
}

#[tokio::test]
async fn unchanged_lists_touch_nothing() {
    // ---
    let topic = Arc::new(RecordingTopic::default());
    let sync = SubscriptionSync::new(Some(topic.clone()));

    let report = sync
        .handle_record(&modify(&["a@farm.io"], &["A@farm.io"]))
        .await;

    assert_eq!(report, SyncReport::default());
    assert!(topic.subscribed().is_empty());
}

#[tokio::test]
async fn records_without_keys_are_skipped() {
    // ---
    let topic = Arc::new(RecordingTopic::default());
    let sync = SubscriptionSync::new(Some(topic.clone()));

    let mut record = modify(&["a@farm.io"], &[]);
    record.keys = Item::new();

    assert_eq!(sync.handle_record(&record).await, SyncReport::default());
    assert!(topic.subscribed().is_empty());
}
