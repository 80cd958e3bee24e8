//! SQLite query bridge
//!
//! Executes [`SelectQuery`] values through a sqlx pool, binding every filter
//! value as a parameter.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use std::sync::Arc;

use super::bridge::{QueryBridge, Row, Value};
use super::builder::SelectQuery;
use crate::error::{Error, Result};

/// [`QueryBridge`] backed by a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteBridge {
    pool: Arc<SqlitePool>,
}

impl SqliteBridge {
    /// Opens a pool for `url` (`sqlite:path` or `sqlite::memory:`)
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = url.contains(":memory:");
        // Every in-memory connection is a separate database
        let mut options = SqlitePoolOptions::new().max_connections(if in_memory {
            1
        } else {
            max_connections.max(1)
        });
        if in_memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }

        let pool = options
            .connect(url)
            .await
            .map_err(|e| Error::Query(format!("failed to connect to {}: {}", url, e)))?;

        tracing::info!("connected to data store {}", url);
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn convert_row(row: &SqliteRow) -> Result<Row> {
        let mut converted = Row::new();
        for (idx, column) in row.columns().iter().enumerate() {
            converted.push(column.name(), Self::extract_value(row, idx)?);
        }
        Ok(converted)
    }

    /// Extract value by its storage class
    fn extract_value(row: &SqliteRow, idx: usize) -> Result<Value> {
        let value_ref = row
            .try_get_raw(idx)
            .map_err(|e| Error::Query(format!("Failed to get value at index {}: {}", idx, e)))?;

        if value_ref.is_null() {
            return Ok(Value::Null);
        }

        let type_name = value_ref.type_info().name().to_string();
        match type_name.as_str() {
            "INTEGER" => {
                let val: i64 = row
                    .try_get(idx)
                    .map_err(|e| Error::Query(format!("Failed to get INTEGER: {}", e)))?;
                Ok(Value::Int(val))
            }
            "REAL" => {
                let val: f64 = row
                    .try_get(idx)
                    .map_err(|e| Error::Query(format!("Failed to get REAL: {}", e)))?;
                Ok(Value::Float(val))
            }
            "TEXT" => {
                let val: String = row
                    .try_get(idx)
                    .map_err(|e| Error::Query(format!("Failed to get TEXT: {}", e)))?;
                Ok(Value::String(val))
            }
            other => {
                tracing::debug!("unsupported column type {} at index {}", other, idx);
                Ok(Value::Null)
            }
        }
    }
}

#[async_trait]
impl QueryBridge for SqliteBridge {
    async fn execute(&self, query: &SelectQuery) -> Result<Vec<Row>> {
        let sql = query.sql();
        let params = query.params();
        tracing::debug!(sql = %sql, params = params.len(), "executing query");

        let mut statement = sqlx::query(&sql);
        for param in &params {
            statement = match param {
                Value::Null => statement.bind(None::<i64>),
                Value::Int(i) => statement.bind(*i),
                Value::Float(f) => statement.bind(*f),
                Value::String(s) => statement.bind(s.clone()),
            };
        }

        let rows = statement.fetch_all(&*self.pool).await?;
        rows.iter().map(Self::convert_row).collect()
    }
}
