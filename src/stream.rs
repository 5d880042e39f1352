//! DynamoDB stream records, decoupled from the Lambda event types.
//!
//! Handlers convert each incoming [`EventRecord`] into a [`ChangeRecord`]
//! whose images are plain SDK attribute maps, so the processing code (and
//! its tests) never deal with the wire representation.

use aws_lambda_events::event::dynamodb::EventRecord;

use crate::store::Item;

// ---

/// Kind of change carried by a stream record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
    Other(String),
}

impl ChangeKind {
    pub fn parse(event_name: &str) -> Self {
        match event_name {
            "INSERT" => ChangeKind::Insert,
            "MODIFY" => ChangeKind::Modify,
            "REMOVE" => ChangeKind::Remove,
            other => ChangeKind::Other(other.to_string()),
        }
    }
}

/// One change to the table.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub keys: Item,
    pub new_image: Option<Item>,
    pub old_image: Option<Item>,
}

impl ChangeRecord {
    pub fn insert(new_image: Item) -> Self {
        Self {
            kind: ChangeKind::Insert,
            keys: Item::new(),
            new_image: Some(new_image),
            old_image: None,
        }
    }
}

fn non_empty(image: Item) -> Option<Item> {
    (!image.is_empty()).then_some(image)
}

impl From<EventRecord> for ChangeRecord {
    fn from(record: EventRecord) -> Self {
        // ---
        let change = record.change;
        Self {
            kind: ChangeKind::parse(&record.event_name),
            keys: change.keys.into(),
            new_image: non_empty(change.new_image.into()),
            old_image: non_empty(change.old_image.into()),
        }
    }
}
