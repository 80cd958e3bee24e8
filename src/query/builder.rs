//! Parametrized SELECT synthesis
//!
//! Values are never spliced into the SQL text; every filter becomes a `?`
//! placeholder with its value carried in [`SelectQuery::params`]. Table names
//! come only from [`TableKind`] and column names must be plain identifiers.

use std::fmt;

use super::bridge::Value;
use crate::error::{Error, Result};
use crate::nlp::{SlotSet, TableKind};
use crate::template::Template;

/// Whether `name` is an ASCII identifier (`[A-Za-z_][A-Za-z0-9_]*`)
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn check_identifier(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::Query(format!("invalid column name: {}", name)))
    }
}

/// Single-table SELECT with equality filters
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: TableKind,
    columns: Vec<String>,
    filters: Vec<(String, Value)>,
    distinct: bool,
    order_by: Option<String>,
}

impl SelectQuery {
    pub fn new(table: TableKind) -> Self {
        Self {
            table,
            columns: Vec::new(),
            filters: Vec::new(),
            distinct: false,
            order_by: None,
        }
    }

    /// Adds a selected column; duplicates are ignored
    pub fn column(mut self, name: &str) -> Result<Self> {
        check_identifier(name)?;
        if !self.columns.iter().any(|c| c == name) {
            self.columns.push(name.to_string());
        }
        Ok(self)
    }

    /// Adds a `column = ?` clause, ANDed with the others
    pub fn filter(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        check_identifier(name)?;
        self.filters.push((name.to_string(), value.into()));
        Ok(self)
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by(mut self, name: &str) -> Result<Self> {
        check_identifier(name)?;
        self.order_by = Some(name.to_string());
        Ok(self)
    }

    pub fn table(&self) -> TableKind {
        self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Filtered column names, in clause order
    pub fn filter_columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.filters.iter().map(|(name, _)| name.as_str())
    }

    /// SQL text with `?` placeholders
    pub fn sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let columns: Vec<String> = self.columns.iter().map(|c| quote_identifier(c)).collect();
            sql.push_str(&columns.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(self.table.table_name());

        if !self.filters.is_empty() {
            let clauses: Vec<String> = self
                .filters
                .iter()
                .map(|(name, _)| format!("{} = ?", quote_identifier(name)))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some(order) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(&quote_identifier(order));
        }
        sql
    }

    /// Bound values, in placeholder order
    pub fn params(&self) -> Vec<Value> {
        self.filters.iter().map(|(_, value)| value.clone()).collect()
    }

    /// Target fields of `template` that `table` does not store
    pub fn missing_targets<'a>(template: &'a Template, table: TableKind) -> Vec<&'a str> {
        template
            .target_names()
            .filter(|name| !table.has_column(name))
            .collect()
    }

    /// Query answering `template` for a normalized slot set.
    ///
    /// Selects the template's condition columns followed by its target
    /// columns, with one equality filter per known condition slot. Condition
    /// columns the table does not have are left out; every target must be a
    /// column of the table.
    pub fn for_template(template: &Template, normalized: &SlotSet) -> Result<Self> {
        let table = TableKind::from_table_name(&normalized.table).ok_or_else(|| {
            Error::Query(format!("no data table for '{}'", normalized.table))
        })?;
        let missing = Self::missing_targets(template, table);
        if !missing.is_empty() {
            return Err(Error::Query(format!(
                "table {} has no column {}",
                table,
                missing.join(", ")
            )));
        }
        let mut query = SelectQuery::new(table);

        let condition_slots = template
            .condition_fields
            .iter()
            .filter_map(|field| field.slot())
            .filter(|slot| slot.is_column());

        let mut filters = Vec::new();
        for slot in condition_slots {
            if !table.has_column(slot.name()) {
                tracing::debug!(table = %table, column = slot.name(), "column not in table");
                continue;
            }
            query = query.column(slot.name())?;
            if normalized.is_known(slot) {
                filters.push((slot, normalized.get(slot).to_string()));
            }
        }

        for name in template.target_names() {
            query = query.column(name)?;
        }

        for (slot, value) in filters {
            query = query.filter(slot.name(), value)?;
        }

        Ok(query)
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql())?;
        if !self.filters.is_empty() {
            let params: Vec<String> = self.filters.iter().map(|(_, v)| v.to_string()).collect();
            write!(f, " -- [{}]", params.join(", "))?;
        }
        Ok(())
    }
}
