/*!
Domain data sources.

Each [`DataType`] registers one [`DataSource`] providing fetch/count/delete
over the underlying domain table, keyed in a [`SourceRegistry`]. New data
types plug in through registration; the engines never dispatch on the type
themselves.
*/

use crate::model::{DataType, DateRange};
use crate::{RetainError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One domain row as the engine sees it: a creation timestamp plus an opaque
/// JSON payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Fetch/count/delete strategy over one domain table.
#[async_trait]
pub trait DataSource: Send + Sync + std::fmt::Debug {
    /// The data type this source serves.
    fn data_type(&self) -> DataType;

    /// Name of the underlying table, recorded on archive/deletion rows.
    fn table(&self) -> &str;

    /// All row payloads whose creation time falls within the range.
    async fn fetch(&self, range: &DateRange) -> Result<Vec<serde_json::Value>>;

    /// Number of rows within the range.
    async fn count(&self, range: &DateRange) -> Result<u64>;

    /// Permanently delete rows within the range, returning how many went.
    async fn delete(&self, range: &DateRange) -> Result<u64>;
}

/// Registry mapping each data type to its source strategy.
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<DataType, Arc<dyn DataSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, replacing any previous one for the same type.
    pub fn register(&mut self, source: Arc<dyn DataSource>) {
        self.sources.insert(source.data_type(), source);
    }

    /// Look up the source for a data type.
    pub fn get(&self, data_type: DataType) -> Result<Arc<dyn DataSource>> {
        self.sources.get(&data_type).cloned().ok_or_else(|| {
            RetainError::validation(format!("no data source registered for {data_type}"))
        })
    }

    /// Data types with a registered source.
    pub fn registered(&self) -> Vec<DataType> {
        self.sources.keys().copied().collect()
    }
}

/// In-memory data source for tests and the CLI demo state.
#[derive(Debug)]
pub struct MemoryDataSource {
    data_type: DataType,
    table: String,
    rows: Mutex<Vec<SourceRow>>,
}

impl MemoryDataSource {
    pub fn new(data_type: DataType, table: impl Into<String>) -> Self {
        Self {
            data_type,
            table: table.into(),
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn from_rows(data_type: DataType, table: impl Into<String>, rows: Vec<SourceRow>) -> Self {
        Self {
            data_type,
            table: table.into(),
            rows: Mutex::new(rows),
        }
    }

    pub fn push(&self, created_at: DateTime<Utc>, payload: serde_json::Value) {
        self.rows.lock().unwrap().push(SourceRow {
            created_at,
            payload,
        });
    }

    /// Snapshot of all rows, for state export.
    pub fn rows(&self) -> Vec<SourceRow> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn fetch(&self, range: &DateRange) -> Result<Vec<serde_json::Value>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| range.contains(r.created_at))
            .map(|r| r.payload.clone())
            .collect())
    }

    async fn count(&self, range: &DateRange) -> Result<u64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| range.contains(r.created_at))
            .count() as u64)
    }

    async fn delete(&self, range: &DateRange) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !range.contains(r.created_at));
        Ok((before - rows.len()) as u64)
    }
}
