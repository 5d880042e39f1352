//! Key-value store gateway.
//!
//! The whole backend talks to one DynamoDB table through the [`ItemStore`]
//! trait. Items are plain SDK attribute maps, so stream images, SDK
//! responses and test fixtures share one representation. Two
//! implementations exist:
//! - [`DynamoStore`]: the real table
//! - [`MemoryStore`]: an in-process map used by tests and local runs
//!
//! Guarantees assumed from the backend: read-after-write on the primary key,
//! eventual consistency on secondary indexes.

use std::collections::HashMap;

use async_trait::async_trait;

pub use aws_sdk_dynamodb::types::AttributeValue;

pub mod attrs;
mod dynamo;
mod memory;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

// ---

/// One table item: attribute name → typed value.
pub type Item = HashMap<String, AttributeValue>;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    // ---
    #[error("DynamoDB {operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    #[error("item is missing key attribute `{0}`")]
    MissingKey(&'static str),
}

/// Sort-key condition of a partition query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortCondition {
    // ---
    Any,
    BeginsWith(String),
    /// Inclusive on both ends.
    Between(String, String),
}

/// Query on the primary key: one partition, optional sort-key condition.
#[derive(Debug, Clone)]
pub struct KeyQuery {
    // ---
    pub pk: String,
    pub sort: SortCondition,
    /// Newest (highest sort key) first when set.
    pub descending: bool,
    pub limit: Option<usize>,
}

impl KeyQuery {
    pub fn partition(pk: impl Into<String>) -> Self {
        // ---
        Self {
            pk: pk.into(),
            sort: SortCondition::Any,
            descending: false,
            limit: None,
        }
    }

    pub fn begins_with(mut self, prefix: impl Into<String>) -> Self {
        self.sort = SortCondition::BeginsWith(prefix.into());
        self
    }

    pub fn between(mut self, low: impl Into<String>, high: impl Into<String>) -> Self {
        self.sort = SortCondition::Between(low.into(), high.into());
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// String equality filter on a non-key attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrFilter {
    pub name: String,
    pub value: String,
}

impl AttrFilter {
    pub fn eq(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        matches!(item.get(&self.name), Some(AttributeValue::S(v)) if *v == self.value)
    }
}

/// Filter for full-table scans.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    // ---
    pub pk_prefix: Option<String>,
    pub sk_equals: Option<String>,
    pub attr: Option<AttrFilter>,
}

impl ScanFilter {
    pub fn matches(&self, item: &Item) -> bool {
        // ---
        let pk = attrs::key_string(item, crate::keys::PK);
        let sk = attrs::key_string(item, crate::keys::SK);

        self.pk_prefix
            .as_deref()
            .map_or(true, |p| pk.is_some_and(|pk| pk.starts_with(p)))
            && self
                .sk_equals
                .as_deref()
                .map_or(true, |s| sk.is_some_and(|sk| sk == s))
            && self.attr.as_ref().map_or(true, |f| f.matches(item))
    }
}

/// Storage operations consumed by handlers and routes.
#[async_trait]
pub trait ItemStore: Send + Sync {
    // ---
    /// Exact lookup on the composite primary key.
    async fn get_item(&self, pk: &str, sk: &str) -> Result<Option<Item>>;

    /// Insert or replace the item addressed by its `pk`/`sk` attributes.
    async fn put_item(&self, item: Item) -> Result<()>;

    async fn delete_item(&self, pk: &str, sk: &str) -> Result<()>;

    /// Query one partition, following pagination until `limit` is reached.
    async fn query(&self, query: &KeyQuery) -> Result<Vec<Item>>;

    /// Query the type index, optionally filtering on one attribute.
    ///
    /// `limit` bounds the number of *matching* items returned.
    async fn query_type_index(
        &self,
        type_name: &str,
        filter: Option<&AttrFilter>,
        limit: Option<usize>,
    ) -> Result<Vec<Item>>;

    /// Full-table scan. Only used where no index serves the access pattern.
    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<Item>>;
}
