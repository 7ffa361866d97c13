//! A store whose every call fails, for exercising the storage-error paths.

use async_trait::async_trait;

use super::{ReadingStore, StoreError};
use crate::models::{AggregateRow, DateRange, LatestRow, MetricType, NewReading, Statistic};

// ---

/// Behaves like a database whose pool never hands out a connection.
#[derive(Debug, Default)]
pub struct UnavailableStore;

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl ReadingStore for UnavailableStore {
    async fn insert_reading(&self, _reading: &NewReading) -> Result<i64, StoreError> {
        Err(unavailable())
    }

    async fn latest_per_key(
        &self,
        _sensor_ids: &[i64],
        _metrics: &[MetricType],
    ) -> Result<Vec<LatestRow>, StoreError> {
        Err(unavailable())
    }

    async fn aggregate_per_key(
        &self,
        _sensor_ids: &[i64],
        _metrics: &[MetricType],
        _statistic: Statistic,
        _range: DateRange,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        Err(unavailable())
    }

    async fn distinct_sensor_ids(&self) -> Result<Vec<i64>, StoreError> {
        Err(unavailable())
    }
}
