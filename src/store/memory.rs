//! In-process implementation of [`ItemStore`].
//!
//! Keeps items in a `BTreeMap` ordered by `(pk, sk)`, which gives the same
//! sort-key ordering a DynamoDB partition query returns.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    attrs, AttrFilter, AttributeValue, Item, ItemStore, KeyQuery, Result, ScanFilter,
    SortCondition, StoreError,
};
use crate::keys::{PK, SK, TYPE_ATTR};

#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<(String, String), Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_matches(condition: &SortCondition, sk: &str) -> bool {
    // ---
    match condition {
        SortCondition::Any => true,
        SortCondition::BeginsWith(prefix) => sk.starts_with(prefix.as_str()),
        SortCondition::Between(low, high) => sk >= low.as_str() && sk <= high.as_str(),
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn get_item(&self, pk: &str, sk: &str) -> Result<Option<Item>> {
        let items = self.items.read().await;
        Ok(items.get(&(pk.to_string(), sk.to_string())).cloned())
    }

    async fn put_item(&self, item: Item) -> Result<()> {
        // ---
        let pk = attrs::key_string(&item, PK)
            .ok_or(StoreError::MissingKey(PK))?
            .to_string();
        let sk = attrs::key_string(&item, SK)
            .ok_or(StoreError::MissingKey(SK))?
            .to_string();

        self.items.write().await.insert((pk, sk), item);
        Ok(())
    }

    async fn delete_item(&self, pk: &str, sk: &str) -> Result<()> {
        self.items
            .write()
            .await
            .remove(&(pk.to_string(), sk.to_string()));
        Ok(())
    }

    async fn query(&self, query: &KeyQuery) -> Result<Vec<Item>> {
        // ---
        let items = self.items.read().await;
        let mut matched: Vec<Item> = items
            .iter()
            .filter(|((pk, sk), _)| *pk == query.pk && sort_matches(&query.sort, sk))
            .map(|(_, item)| item.clone())
            .collect();

        if query.descending {
            matched.reverse();
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn query_type_index(
        &self,
        type_name: &str,
        filter: Option<&AttrFilter>,
        limit: Option<usize>,
    ) -> Result<Vec<Item>> {
        // ---
        let items = self.items.read().await;
        let matched = items
            .values()
            .filter(|item| {
                matches!(item.get(TYPE_ATTR), Some(AttributeValue::S(t)) if t == type_name)
            })
            .filter(|item| filter.map_or(true, |f| f.matches(item)))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matched)
    }

    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<Item>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }
}
