//! Query planner and response shaper.
//!
//! A [`ValidatedQuery`] is resolved to a concrete sensor list, dispatched to
//! either the latest or aggregate store capability, and the flat rows are
//! reshaped into `sensor_id -> metric_type -> value`. Entries appear in request
//! order: sensors first, then metrics within each sensor.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::models::MetricType;
use crate::store::{ReadingStore, StoreError};
use crate::validation::{QueryMode, SensorSelection, ValidatedQuery};

// ---

/// Value reported for one sensor/metric pair.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Aggregate mode: the bare number.
    Aggregate(f64),
    /// Latest mode: the value and when it was received.
    Latest {
        value: f64,
        ingested_at: DateTime<Utc>,
    },
}

impl MetricValue {
    #[cfg(test)]
    pub fn value(&self) -> f64 {
        match self {
            MetricValue::Aggregate(value) | MetricValue::Latest { value, .. } => *value,
        }
    }
}

/// Nested result map that keeps insertion order when serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorResults {
    entries: Vec<(i64, Vec<(MetricType, MetricValue)>)>,
}

impl SensorResults {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of sensors with at least one value.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn get(&self, sensor_id: i64, metric: MetricType) -> Option<&MetricValue> {
        self.entries
            .iter()
            .find(|(id, _)| *id == sensor_id)?
            .1
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, value)| value)
    }

    #[cfg(test)]
    pub fn sensor_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }
}

struct MetricMap<'a>(&'a [(MetricType, MetricValue)]);

impl Serialize for MetricMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (metric, value) in self.0 {
            map.serialize_entry(metric.as_str(), value)?;
        }
        map.end()
    }
}

impl Serialize for SensorResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (sensor_id, metrics) in &self.entries {
            map.serialize_entry(&sensor_id.to_string(), &MetricMap(metrics))?;
        }
        map.end()
    }
}

/// Top-level query response.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct QueryResponse {
    /// `"latest"` or the aggregate function name.
    pub statistic: &'static str,
    pub results: SensorResults,
}

// ---

/// Execute a validated query against the store.
pub async fn run_query(
    store: &dyn ReadingStore,
    query: &ValidatedQuery,
) -> Result<QueryResponse, StoreError> {
    // ---
    let sensor_ids = match &query.sensors {
        SensorSelection::All => store.distinct_sensor_ids().await?,
        SensorSelection::Ids(ids) => ids.clone(),
    };
    debug!(
        sensors = sensor_ids.len(),
        metrics = query.metrics.len(),
        mode = query.mode.label(),
        "Planning query"
    );

    let values: HashMap<(i64, MetricType), MetricValue> =
        if sensor_ids.is_empty() || query.metrics.is_empty() {
            HashMap::new()
        } else {
            match query.mode {
                QueryMode::Latest => store
                    .latest_per_key(&sensor_ids, &query.metrics)
                    .await?
                    .into_iter()
                    .map(|row| {
                        let value = MetricValue::Latest {
                            value: row.value,
                            ingested_at: row.ingested_at,
                        };
                        ((row.sensor_id, row.metric_type), value)
                    })
                    .collect(),
                QueryMode::Aggregate { statistic, range } => store
                    .aggregate_per_key(&sensor_ids, &query.metrics, statistic, range)
                    .await?
                    .into_iter()
                    .map(|row| {
                        (
                            (row.sensor_id, row.metric_type),
                            MetricValue::Aggregate(row.value),
                        )
                    })
                    .collect(),
            }
        };

    Ok(QueryResponse {
        statistic: query.mode.label(),
        results: shape(&sensor_ids, &query.metrics, values),
    })
}

/// Arrange keyed values in request order, dropping empty pairs and sensors.
fn shape(
    sensor_ids: &[i64],
    metrics: &[MetricType],
    mut values: HashMap<(i64, MetricType), MetricValue>,
) -> SensorResults {
    // ---
    let entries = sensor_ids
        .iter()
        .filter_map(|&sensor_id| {
            let found: Vec<_> = metrics
                .iter()
                .filter_map(|&metric| {
                    values
                        .remove(&(sensor_id, metric))
                        .map(|value| (metric, value))
                })
                .collect();
            (!found.is_empty()).then_some((sensor_id, found))
        })
        .collect();

    SensorResults { entries }
}
