use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ReadingStore, StoreError};
use crate::models::{
    AggregateRow, DateRange, LatestRow, MetricType, NewReading, Reading, Statistic,
};

// ---

/// Process-local store with the same semantics as the PostgreSQL store.
/// Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryReadingStore {
    rows: RwLock<Vec<Reading>>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn insert_reading(&self, reading: &NewReading) -> Result<i64, StoreError> {
        // ---
        let mut rows = self.rows.write().await;
        let id = rows.last().map_or(1, |last| last.id + 1);
        rows.push(Reading {
            id,
            sensor_id: reading.sensor_id,
            metric_type: reading.metric_type,
            value: reading.value,
            timestamp: reading.timestamp,
            ingested_at: reading.ingested_at,
        });
        Ok(id)
    }

    async fn latest_per_key(
        &self,
        sensor_ids: &[i64],
        metrics: &[MetricType],
    ) -> Result<Vec<LatestRow>, StoreError> {
        // ---
        let rows = self.rows.read().await;
        let mut latest: HashMap<(i64, MetricType), &Reading> = HashMap::new();

        for row in rows
            .iter()
            .filter(|r| sensor_ids.contains(&r.sensor_id) && metrics.contains(&r.metric_type))
        {
            latest
                .entry((row.sensor_id, row.metric_type))
                .and_modify(|best| {
                    if (row.ingested_at, row.id) > (best.ingested_at, best.id) {
                        *best = row;
                    }
                })
                .or_insert(row);
        }

        Ok(cross_product(sensor_ids, metrics)
            .filter_map(|key| latest.get(&key))
            .map(|r| LatestRow {
                id: r.id,
                sensor_id: r.sensor_id,
                metric_type: r.metric_type,
                value: r.value,
                ingested_at: r.ingested_at,
            })
            .collect())
    }

    async fn aggregate_per_key(
        &self,
        sensor_ids: &[i64],
        metrics: &[MetricType],
        statistic: Statistic,
        range: DateRange,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        // ---
        let rows = self.rows.read().await;
        let mut groups: HashMap<(i64, MetricType), Vec<f64>> = HashMap::new();

        for row in rows.iter().filter(|r| {
            sensor_ids.contains(&r.sensor_id)
                && metrics.contains(&r.metric_type)
                && range.contains(r.timestamp)
        }) {
            groups
                .entry((row.sensor_id, row.metric_type))
                .or_default()
                .push(row.value);
        }

        Ok(cross_product(sensor_ids, metrics)
            .filter_map(|key| {
                let value = statistic.apply(groups.get(&key)?)?;
                Some(AggregateRow {
                    sensor_id: key.0,
                    metric_type: key.1,
                    value,
                })
            })
            .collect())
    }

    async fn distinct_sensor_ids(&self) -> Result<Vec<i64>, StoreError> {
        let rows = self.rows.read().await;
        let ids: BTreeSet<i64> = rows.iter().map(|r| r.sensor_id).collect();
        Ok(ids.into_iter().collect())
    }
}

fn cross_product<'a>(
    sensor_ids: &'a [i64],
    metrics: &'a [MetricType],
) -> impl Iterator<Item = (i64, MetricType)> + 'a {
    sensor_ids
        .iter()
        .flat_map(move |&sensor| metrics.iter().map(move |&metric| (sensor, metric)))
}
