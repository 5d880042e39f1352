//! DynamoDB implementation of [`ItemStore`].
//!
//! Table schema (single table):
//! - `pk`: entity partition, e.g. `PLOT#<id>` (String)
//! - `sk`: entity sort key, e.g. `STATE#<iso-timestamp>` (String)
//! - `GSI_TypeIndex`: partitioned on `type`
//!
//! [`DynamoStore::ensure_table`] creates that schema on startup when the
//! table is absent.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::client::Waiters;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use tracing::{debug, info};

use super::{
    AttrFilter, AttributeValue, Item, ItemStore, KeyQuery, Result, ScanFilter, SortCondition,
    StoreError,
};
use crate::keys::{PK, SK, TYPE_ATTR, TYPE_INDEX};
use crate::Config;

/// DynamoDB-backed store for every entity of the backend.
#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
    table_name: String,
}

fn backend_error(operation: &'static str, err: impl std::error::Error) -> StoreError {
    StoreError::Backend {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

impl DynamoStore {
    /// Wrap an existing client.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Build a client from the process configuration.
    pub async fn from_config(config: &Config) -> Self {
        // ---
        let sdk_config = config.aws_sdk_config().await;
        let client = Client::new(&sdk_config);
        info!(table = %config.table_name, "Connected to DynamoDB");
        Self::new(client, config.table_name.clone())
    }

    /// Create the table if it does not exist yet; returns whether it was
    /// created. Safe to call on every startup.
    pub async fn ensure_table(&self) -> Result<bool> {
        // ---
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => {
                info!(table = %self.table_name, "Table already exists");
                return Ok(false);
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) => {}
            Err(e) => return Err(backend_error("describe_table", e)),
        }

        info!(table = %self.table_name, "Creating table");
        let schema = TableSchema::build()?;
        self.client
            .create_table()
            .table_name(&self.table_name)
            .set_key_schema(Some(schema.key_schema))
            .set_attribute_definitions(Some(schema.attributes))
            .global_secondary_indexes(schema.type_index)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| backend_error("create_table", e))?;

        self.client
            .wait_until_table_exists()
            .table_name(&self.table_name)
            .wait(TABLE_ACTIVE_TIMEOUT)
            .await
            .map_err(|e| backend_error("wait_until_table_exists", e))?;

        info!(table = %self.table_name, "Table created");
        Ok(true)
    }

    fn key(pk: &str, sk: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (PK.to_string(), AttributeValue::S(pk.to_string())),
            (SK.to_string(), AttributeValue::S(sk.to_string())),
        ])
    }
}

#[async_trait]
impl ItemStore for DynamoStore {
    async fn get_item(&self, pk: &str, sk: &str) -> Result<Option<Item>> {
        // ---
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(pk, sk)))
            .send()
            .await
            .map_err(|e| backend_error("get_item", e))?;

        debug!(pk, sk, found = output.item.is_some(), "get_item");
        Ok(output.item)
    }

    async fn put_item(&self, item: Item) -> Result<()> {
        // ---
        if !item.contains_key(PK) {
            return Err(StoreError::MissingKey(PK));
        }
        if !item.contains_key(SK) {
            return Err(StoreError::MissingKey(SK));
        }

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| backend_error("put_item", e))?;

        Ok(())
    }

    async fn delete_item(&self, pk: &str, sk: &str) -> Result<()> {
        // ---
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(pk, sk)))
            .send()
            .await
            .map_err(|e| backend_error("delete_item", e))?;

        debug!(pk, sk, "delete_item");
        Ok(())
    }

    async fn query(&self, query: &KeyQuery) -> Result<Vec<Item>> {
        // ---
        if query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut names = HashMap::from([("#pk".to_string(), PK.to_string())]);
        let mut values = HashMap::from([(":pk".to_string(), AttributeValue::S(query.pk.clone()))]);

        let key_condition = match &query.sort {
            SortCondition::Any => "#pk = :pk".to_string(),
            SortCondition::BeginsWith(prefix) => {
                names.insert("#sk".into(), SK.into());
                values.insert(":prefix".into(), AttributeValue::S(prefix.clone()));
                "#pk = :pk AND begins_with(#sk, :prefix)".to_string()
            }
            SortCondition::Between(low, high) => {
                names.insert("#sk".into(), SK.into());
                values.insert(":low".into(), AttributeValue::S(low.clone()));
                values.insert(":high".into(), AttributeValue::S(high.clone()));
                "#pk = :pk AND #sk BETWEEN :low AND :high".to_string()
            }
        };

        let mut items = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression(&key_condition)
                .set_expression_attribute_names(Some(names.clone()))
                .set_expression_attribute_values(Some(values.clone()))
                .scan_index_forward(!query.descending)
                .set_exclusive_start_key(start_key.take());

            if let Some(limit) = query.limit {
                let remaining = limit.saturating_sub(items.len());
                request = request.limit(i32::try_from(remaining).unwrap_or(i32::MAX));
            }

            let output = request.send().await.map_err(|e| backend_error("query", e))?;
            items.extend(output.items.unwrap_or_default());

            let reached_limit = query.limit.is_some_and(|limit| items.len() >= limit);
            match output.last_evaluated_key {
                Some(key) if !reached_limit => start_key = Some(key),
                _ => break,
            }
        }

        if let Some(limit) = query.limit {
            items.truncate(limit);
        }
        debug!(pk = %query.pk, count = items.len(), "query");
        Ok(items)
    }

    async fn query_type_index(
        &self,
        type_name: &str,
        filter: Option<&AttrFilter>,
        limit: Option<usize>,
    ) -> Result<Vec<Item>> {
        // ---
        let mut names = HashMap::from([("#type".to_string(), TYPE_ATTR.to_string())]);
        let mut values = HashMap::from([(
            ":type".to_string(),
            AttributeValue::S(type_name.to_string()),
        )]);
        let filter_expression = filter.map(|f| {
            names.insert("#filter".into(), f.name.clone());
            values.insert(":filter".into(), AttributeValue::S(f.value.clone()));
            "#filter = :filter".to_string()
        });

        // No `Limit` on the request: DynamoDB applies it before the filter.
        let mut items = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(TYPE_INDEX)
                .key_condition_expression("#type = :type")
                .set_filter_expression(filter_expression.clone())
                .set_expression_attribute_names(Some(names.clone()))
                .set_expression_attribute_values(Some(values.clone()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| backend_error("query_type_index", e))?;

            items.extend(output.items.unwrap_or_default());

            let reached_limit = limit.is_some_and(|limit| items.len() >= limit);
            match output.last_evaluated_key {
                Some(key) if !reached_limit => start_key = Some(key),
                _ => break,
            }
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        debug!(type_name, count = items.len(), "query_type_index");
        Ok(items)
    }

    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<Item>> {
        // ---
        let mut clauses = Vec::new();
        let mut names = HashMap::new();
        let mut values = HashMap::new();

        if let Some(prefix) = &filter.pk_prefix {
            names.insert("#pk".to_string(), PK.to_string());
            values.insert(":pk_prefix".to_string(), AttributeValue::S(prefix.clone()));
            clauses.push("begins_with(#pk, :pk_prefix)");
        }
        if let Some(sk) = &filter.sk_equals {
            names.insert("#sk".to_string(), SK.to_string());
            values.insert(":sk".to_string(), AttributeValue::S(sk.clone()));
            clauses.push("#sk = :sk");
        }
        if let Some(attr) = &filter.attr {
            names.insert("#attr".to_string(), attr.name.clone());
            values.insert(":attr".to_string(), AttributeValue::S(attr.value.clone()));
            clauses.push("#attr = :attr");
        }

        let filter_expression = (!clauses.is_empty()).then(|| clauses.join(" AND "));
        let names = (!names.is_empty()).then_some(names);
        let values = (!values.is_empty()).then_some(values);

        let mut items = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_filter_expression(filter_expression.clone())
                .set_expression_attribute_names(names.clone())
                .set_expression_attribute_values(values.clone())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| backend_error("scan", e))?;

            items.extend(output.items.unwrap_or_default());

            match output.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        debug!(count = items.len(), "scan");
        Ok(items)
    }
}
