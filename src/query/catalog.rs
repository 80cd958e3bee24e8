//! Distinct value lookups with an explicitly invalidated cache

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::bridge::{QueryBridge, Value};
use super::builder::SelectQuery;
use crate::error::Result;
use crate::nlp::{CanonicalLists, Slot, TableKind};

type CacheKey = (TableKind, String, Vec<(String, String)>);

/// Slots whose canonical spellings come from the data store
const ENTITY_SLOTS: [Slot; 4] = [Slot::School, Slot::Major, Slot::District, Slot::Classy];

/// Browses the distinct values stored per table and column.
///
/// Results are cached by (table, column, filters) until [`invalidate`]
/// or [`invalidate_table`] is called.
///
/// [`invalidate`]: ValueCatalog::invalidate
/// [`invalidate_table`]: ValueCatalog::invalidate_table
pub struct ValueCatalog {
    bridge: Arc<dyn QueryBridge>,
    cache: RwLock<HashMap<CacheKey, Vec<String>>>,
}

impl ValueCatalog {
    pub fn new(bridge: Arc<dyn QueryBridge>) -> Self {
        Self {
            bridge,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Sorted distinct values of `column`, narrowed by equality filters.
    ///
    /// `None` when the table has no such column.
    pub async fn distinct(
        &self,
        table: TableKind,
        column: &str,
        filters: &[(&str, &str)],
    ) -> Result<Option<Vec<String>>> {
        if !table.has_column(column) {
            return Ok(None);
        }

        let key: CacheKey = (
            table,
            column.to_string(),
            filters
                .iter()
                .map(|(c, v)| (c.to_string(), v.to_string()))
                .collect(),
        );
        if let Some(values) = self.cache.read().await.get(&key) {
            return Ok(Some(values.clone()));
        }

        let mut query = SelectQuery::new(table).distinct().column(column)?;
        for (name, value) in filters {
            query = query.filter(name, *value)?;
        }
        query = query.order_by(column)?;

        let rows = self.bridge.execute(&query).await?;
        let mut values: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter(|value| !value.is_null())
            .map(Value::to_string)
            .filter(|value| !value.is_empty())
            .collect();
        values.sort();
        values.dedup();

        tracing::debug!(table = %table, column, count = values.len(), "distinct values loaded");
        self.cache.write().await.insert(key, values.clone());
        Ok(Some(values))
    }

    /// Canonical spellings of the entity slots stored in `table`
    pub async fn canonical_lists(&self, table: TableKind) -> Result<CanonicalLists> {
        let mut lists = CanonicalLists::new();
        for slot in ENTITY_SLOTS {
            if let Some(values) = self.distinct(table, slot.name(), &[]).await? {
                lists.insert(slot, values);
            }
        }
        Ok(lists)
    }

    /// Drops every cached list
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }

    /// Drops the cached lists of one table
    pub async fn invalidate_table(&self, table: TableKind) {
        self.cache.write().await.retain(|(t, _, _), _| *t != table);
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }
}
