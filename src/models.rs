//! Domain models for weather sensor metrics.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

// ---

/// A string that does not name a variant of one of the closed enumerations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} {value:?}, expected one of: {expected}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// The closed set of metrics a sensor may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricType {
    Temperature,
    Humidity,
    WindSpeed,
    Pressure,
}

impl MetricType {
    /// Wire and column representation.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Temperature => "temperature",
            MetricType::Humidity => "humidity",
            MetricType::WindSpeed => "wind_speed",
            MetricType::Pressure => "pressure",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s {
            "temperature" => Ok(Self::Temperature),
            "humidity" => Ok(Self::Humidity),
            "wind_speed" => Ok(Self::WindSpeed),
            "pressure" => Ok(Self::Pressure),
            other => Err(UnknownVariant {
                kind: "metric_type",
                value: other.to_owned(),
                expected: "temperature, humidity, wind_speed, pressure",
            }),
        }
    }
}

/// Aggregate functions available in aggregate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Min,
    Max,
    Avg,
    Sum,
}

impl Statistic {
    pub fn as_str(self) -> &'static str {
        match self {
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Avg => "avg",
            Statistic::Sum => "sum",
        }
    }

    /// SQL aggregate function name. Never built from caller input.
    pub fn sql_function(self) -> &'static str {
        match self {
            Statistic::Min => "MIN",
            Statistic::Max => "MAX",
            Statistic::Avg => "AVG",
            Statistic::Sum => "SUM",
        }
    }

    /// Apply the statistic to a group of values; `None` for an empty group.
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        // ---
        if values.is_empty() {
            return None;
        }
        let folded = match self {
            Statistic::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Statistic::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Statistic::Sum => values.iter().sum(),
            Statistic::Avg => values.iter().sum::<f64>() / values.len() as f64,
        };
        Some(folded)
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s {
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "avg" => Ok(Self::Avg),
            "sum" => Ok(Self::Sum),
            other => Err(UnknownVariant {
                kind: "statistic",
                value: other.to_owned(),
                expected: "min, max, avg, sum",
            }),
        }
    }
}

/// One stored observation. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    // ---
    pub id: i64,
    pub sensor_id: i64,
    pub metric_type: MetricType,
    pub value: f64,
    /// Caller-supplied observation time, no timezone attached.
    pub timestamp: NaiveDateTime,
    /// Server-assigned time of receipt.
    pub ingested_at: DateTime<Utc>,
}

/// A reading that has passed validation but has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub sensor_id: i64,
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: NaiveDateTime,
    pub ingested_at: DateTime<Utc>,
}

/// Inclusive calendar-day range used by aggregate queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Widest span accepted, measured from `start`.
    pub const MAX_SPAN: Months = Months::new(1);

    /// Half-open instant window `[start 00:00, end + 1 day 00:00)` covering
    /// every moment of both boundary days.
    pub fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        // ---
        let lower = self.start.and_time(chrono::NaiveTime::MIN);
        let upper = self
            .end
            .succ_opt()
            .map(|next| next.and_time(chrono::NaiveTime::MIN))
            .unwrap_or(NaiveDateTime::MAX);
        (lower, upper)
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let (lower, upper) = self.window();
        ts >= lower && ts < upper
    }
}

/// Most recently ingested reading for one `(sensor_id, metric_type)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestRow {
    pub id: i64,
    pub sensor_id: i64,
    pub metric_type: MetricType,
    pub value: f64,
    pub ingested_at: DateTime<Utc>,
}

/// Aggregate value for one `(sensor_id, metric_type)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub sensor_id: i64,
    pub metric_type: MetricType,
    pub value: f64,
}
