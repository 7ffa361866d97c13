//! Reading store: the narrow repository interface between the query planner
//! and persistence.
//!
//! Two implementations exist:
//! - [`PgReadingStore`] – PostgreSQL via an `sqlx` connection pool
//! - [`InMemoryReadingStore`] – process-local, for tests and local development
//!
//! Both must agree on the semantics documented on [`ReadingStore`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AggregateRow, DateRange, LatestRow, MetricType, NewReading, Statistic};

mod memory;
mod postgres;
#[cfg(test)]
mod unavailable;

pub use memory::InMemoryReadingStore;
pub use postgres::PgReadingStore;
#[cfg(test)]
pub(crate) use unavailable::UnavailableStore;

// ---

/// Failures raised by a store. Never retried here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row that does not decode into the domain model.
    #[error("corrupt row: column {column} holds {value:?}")]
    Corrupt { column: &'static str, value: String },
}

/// Store handle shared by all request handlers.
pub type SharedStore = Arc<dyn ReadingStore>;

/// Append-only persistence of readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist a new reading and return its assigned, strictly increasing id.
    async fn insert_reading(&self, reading: &NewReading) -> Result<i64, StoreError>;

    /// For each requested `(sensor_id, metric_type)` pair that has data, the
    /// reading with the greatest `ingested_at`, ties going to the highest id.
    /// Pairs without data are absent.
    async fn latest_per_key(
        &self,
        sensor_ids: &[i64],
        metrics: &[MetricType],
    ) -> Result<Vec<LatestRow>, StoreError>;

    /// `statistic` over the values of each requested pair whose `timestamp`
    /// falls inside `range`. Pairs without matching rows are absent.
    async fn aggregate_per_key(
        &self,
        sensor_ids: &[i64],
        metrics: &[MetricType],
        statistic: Statistic,
        range: DateRange,
    ) -> Result<Vec<AggregateRow>, StoreError>;

    /// Every sensor id present in the store, ascending.
    async fn distinct_sensor_ids(&self) -> Result<Vec<i64>, StoreError>;
}
