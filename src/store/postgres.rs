use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{ReadingStore, StoreError};
use crate::models::{AggregateRow, DateRange, LatestRow, MetricType, NewReading, Statistic};

// ---

/// PostgreSQL-backed store. Each call checks a connection out of the pool and
/// returns it when the call completes, on success or error.
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn metric_names(metrics: &[MetricType]) -> Vec<String> {
    metrics.iter().map(|m| m.as_str().to_owned()).collect()
}

fn decode_metric(raw: String) -> Result<MetricType, StoreError> {
    raw.parse::<MetricType>().map_err(|_| StoreError::Corrupt {
        column: "metric_type",
        value: raw,
    })
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert_reading(&self, reading: &NewReading) -> Result<i64, StoreError> {
        // ---
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO readings (sensor_id, metric_type, value, observed_at, ingested_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(reading.sensor_id)
        .bind(reading.metric_type.as_str())
        .bind(reading.value)
        .bind(reading.timestamp)
        .bind(reading.ingested_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn latest_per_key(
        &self,
        sensor_ids: &[i64],
        metrics: &[MetricType],
    ) -> Result<Vec<LatestRow>, StoreError> {
        // ---
        let rows: Vec<(i64, i64, String, f64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT DISTINCT ON (sensor_id, metric_type)
                id, sensor_id, metric_type, value, ingested_at
            FROM readings
            WHERE sensor_id   = ANY($1)
              AND metric_type = ANY($2)
            ORDER BY sensor_id, metric_type, ingested_at DESC, id DESC
            "#,
        )
        .bind(sensor_ids)
        .bind(metric_names(metrics))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, sensor_id, metric_type, value, ingested_at)| {
                Ok(LatestRow {
                    id,
                    sensor_id,
                    metric_type: decode_metric(metric_type)?,
                    value,
                    ingested_at,
                })
            })
            .collect()
    }

    async fn aggregate_per_key(
        &self,
        sensor_ids: &[i64],
        metrics: &[MetricType],
        statistic: Statistic,
        range: DateRange,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        // ---
        let (lower, upper) = range.window();

        // The function name comes from a closed enum, never from the request.
        let sql = format!(
            r#"
            SELECT sensor_id, metric_type, {func}(value)::DOUBLE PRECISION AS value
            FROM readings
            WHERE sensor_id   = ANY($1)
              AND metric_type = ANY($2)
              AND observed_at >= $3
              AND observed_at <  $4
            GROUP BY sensor_id, metric_type
            ORDER BY sensor_id, metric_type
            "#,
            func = statistic.sql_function()
        );

        let rows: Vec<(i64, String, f64)> = sqlx::query_as(&sql)
            .bind(sensor_ids)
            .bind(metric_names(metrics))
            .bind(lower)
            .bind(upper)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(sensor_id, metric_type, value)| {
                Ok(AggregateRow {
                    sensor_id,
                    metric_type: decode_metric(metric_type)?,
                    value,
                })
            })
            .collect()
    }

    async fn distinct_sensor_ids(&self) -> Result<Vec<i64>, StoreError> {
        // ---
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT DISTINCT sensor_id FROM readings ORDER BY sensor_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
