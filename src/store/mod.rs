pub mod remote;
pub mod schema;
pub mod sqlite;

use crate::config::{Config, StoreBackend};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Tasks,
    TaskBreakdowns,
    BrainDumps,
    Achievements,
    Streaks,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Tasks => "tasks",
            Table::TaskBreakdowns => "taskBreakdowns",
            Table::BrainDumps => "brainDumps",
            Table::Achievements => "achievements",
            Table::Streaks => "streaks",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Equality predicates joined with AND, plus an optional ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order: Option<Order>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }
}

/// The hosted-table data API. Records travel as JSON objects keyed by the
/// remote column names.
pub trait TableStore: Send + Sync {
    fn backend(&self) -> &'static str;

    fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>>;

    fn insert(&self, table: Table, record: &Value) -> Result<Value>;

    fn update(&self, table: Table, patch: &Value, filters: &Query) -> Result<Vec<Value>>;

    fn delete(&self, table: Table, filters: &Query) -> Result<()>;
}

pub fn open(config: &Config) -> Result<Arc<dyn TableStore>> {
    let store: Arc<dyn TableStore> = match config.store {
        StoreBackend::Remote => Arc::new(remote::RemoteStore::from_config(config)?),
        StoreBackend::Sqlite => Arc::new(sqlite::SqliteStore::open(&config.db_path)?),
    };

    Ok(store)
}

pub fn select_rows<T: DeserializeOwned>(
    store: &dyn TableStore,
    table: Table,
    query: &Query,
) -> Result<Vec<T>> {
    store
        .select(table, query)?
        .into_iter()
        .map(|record| decode(table, record))
        .collect()
}

pub fn insert_row<R: Serialize, T: DeserializeOwned>(
    store: &dyn TableStore,
    table: Table,
    record: &R,
) -> Result<T> {
    let payload = serde_json::to_value(record)
        .with_context(|| format!("Failed to serialize {} record", table.name()))?;
    decode(table, store.insert(table, &payload)?)
}

pub fn update_rows<P: Serialize, T: DeserializeOwned>(
    store: &dyn TableStore,
    table: Table,
    patch: &P,
    filters: &Query,
) -> Result<Vec<T>> {
    let payload = serde_json::to_value(patch)
        .with_context(|| format!("Failed to serialize {} patch", table.name()))?;

    store
        .update(table, &payload, filters)?
        .into_iter()
        .map(|record| decode(table, record))
        .collect()
}

fn decode<T: DeserializeOwned>(table: Table, record: Value) -> Result<T> {
    serde_json::from_value(record.clone())
        .with_context(|| format!("Failed to decode {} record: {record}", table.name()))
}
