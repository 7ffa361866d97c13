//! Validation of inbound ingest payloads and query parameters.
//!
//! Everything here is pure: each entry point either returns typed, validated
//! values or a [`ValidationError`] naming the offending field. No store access
//! happens until validation has succeeded.

use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{DateRange, MetricType, Statistic};

// ---

/// Calendar years every store backend can hold.
const SUPPORTED_YEARS: RangeInclusive<i32> = 1..=9999;

/// A request rejected before reaching storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Raw ingest body. Fields stay untyped so every mistake can be reported
/// against the field that caused it.
#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    pub sensor_id: Option<Value>,
    pub metric_type: Option<Value>,
    pub value: Option<Value>,
    pub timestamp: Option<Value>,
}

/// A validated ingest payload. `timestamp` is `None` when the caller omitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingInput {
    pub sensor_id: i64,
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: Option<NaiveDateTime>,
}

/// Raw query-string parameters for `GET /query`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    pub sensors: Option<String>,
    pub metrics: Option<String>,
    pub statistic: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Which sensors a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorSelection {
    /// Every sensor present in the store at query time.
    All,
    /// Explicit IDs, deduplicated, in request order.
    Ids(Vec<i64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Latest,
    Aggregate {
        statistic: Statistic,
        range: DateRange,
    },
}

impl QueryMode {
    /// Value reported in the response's `statistic` field.
    pub fn label(&self) -> &'static str {
        match self {
            QueryMode::Latest => "latest",
            QueryMode::Aggregate { statistic, .. } => statistic.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    pub sensors: SensorSelection,
    /// Deduplicated, in request order.
    pub metrics: Vec<MetricType>,
    pub mode: QueryMode,
}

// ---

/// Validate an ingest body.
pub fn validate_ingest(req: &IngestRequest) -> Result<ReadingInput, ValidationError> {
    // ---
    let sensor_id = match &req.sensor_id {
        None | Some(Value::Null) => return Err(ValidationError::new("sensor_id", "is required")),
        Some(raw) => raw
            .as_i64()
            .filter(|id| *id > 0)
            .ok_or_else(|| ValidationError::new("sensor_id", "must be a positive integer"))?,
    };

    let metric_type = match &req.metric_type {
        None | Some(Value::Null) => {
            return Err(ValidationError::new("metric_type", "is required"))
        }
        Some(Value::String(s)) => s
            .parse::<MetricType>()
            .map_err(|e| ValidationError::new("metric_type", e.to_string()))?,
        Some(_) => return Err(ValidationError::new("metric_type", "must be a string")),
    };

    let value = match &req.value {
        None | Some(Value::Null) => return Err(ValidationError::new("value", "is required")),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ValidationError::new("value", "must be a finite number"))?,
        Some(_) => return Err(ValidationError::new("value", "must be a finite number")),
    };

    let timestamp = match &req.timestamp {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(parse_timestamp(s).ok_or_else(|| {
            ValidationError::new(
                "timestamp",
                format!("{s:?} is not a valid ISO 8601 date-time"),
            )
        })?),
        Some(_) => {
            return Err(ValidationError::new(
                "timestamp",
                "must be an ISO 8601 date-time string",
            ))
        }
    };

    Ok(ReadingInput {
        sensor_id,
        metric_type,
        value,
        timestamp,
    })
}

/// Parse an observation time. Offsets are normalised to UTC; naive values are
/// kept as given.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    // ---
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        })
        .filter(|ts| SUPPORTED_YEARS.contains(&ts.year()))
}

/// Validate query parameters and select the query mode.
pub fn validate_query(params: &QueryParams) -> Result<ValidatedQuery, ValidationError> {
    // ---
    let sensors = parse_sensors(params.sensors.as_deref().unwrap_or("all"))?;
    let metrics = parse_metrics(params.metrics.as_deref().unwrap_or(""))?;

    let start = non_blank(&params.start_date);
    let end = non_blank(&params.end_date);

    let mode = match (start, end) {
        // Statistic is ignored without a date range.
        (None, None) => QueryMode::Latest,
        (Some(_), None) => {
            return Err(ValidationError::new(
                "end_date",
                "is required when start_date is given",
            ))
        }
        (None, Some(_)) => {
            return Err(ValidationError::new(
                "start_date",
                "is required when end_date is given",
            ))
        }
        (Some(start), Some(end)) => {
            let range = parse_range(start, end)?;
            let statistic = match non_blank(&params.statistic) {
                None => {
                    return Err(ValidationError::new(
                        "statistic",
                        "is required when a date range is given (one of min, max, avg, sum)",
                    ))
                }
                Some(raw) => raw
                    .parse::<Statistic>()
                    .map_err(|e| ValidationError::new("statistic", e.to_string()))?,
            };
            QueryMode::Aggregate { statistic, range }
        }
    };

    Ok(ValidatedQuery {
        sensors,
        metrics,
        mode,
    })
}

fn non_blank(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_sensors(raw: &str) -> Result<SensorSelection, ValidationError> {
    // ---
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("all") {
        return Ok(SensorSelection::All);
    }

    let mut ids = Vec::new();
    for entry in raw.split(',').map(str::trim) {
        if entry.is_empty() {
            return Err(ValidationError::new(
                "sensors",
                "must be 'all' or a comma-separated list of positive integers",
            ));
        }
        let id = entry
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                ValidationError::new(
                    "sensors",
                    format!("{entry:?} is not a positive integer sensor id"),
                )
            })?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(SensorSelection::Ids(ids))
}

fn parse_metrics(raw: &str) -> Result<Vec<MetricType>, ValidationError> {
    // ---
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::new(
            "metrics",
            "at least one metric must be specified",
        ));
    }

    let mut metrics = Vec::new();
    for entry in raw.split(',').map(str::trim) {
        if entry.is_empty() {
            return Err(ValidationError::new("metrics", "contains an empty entry"));
        }
        let metric = entry
            .parse::<MetricType>()
            .map_err(|e| ValidationError::new("metrics", e.to_string()))?;
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }
    Ok(metrics)
}

fn parse_range(start: &str, end: &str) -> Result<DateRange, ValidationError> {
    // ---
    let start = parse_date("start_date", start)?;
    let end = parse_date("end_date", end)?;

    if start > end {
        return Err(ValidationError::new(
            "start_date",
            "must not be after end_date",
        ));
    }

    let limit = start.checked_add_months(DateRange::MAX_SPAN);
    if limit.map_or(true, |limit| end > limit) {
        return Err(ValidationError::new(
            "end_date",
            "date range must span between 1 day and 1 month",
        ));
    }

    Ok(DateRange { start, end })
}

fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, ValidationError> {
    // ---
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ValidationError::new(field, format!("{raw:?} is not a date, use YYYY-MM-DD")))?;

    if !SUPPORTED_YEARS.contains(&date.year()) {
        return Err(ValidationError::new(
            field,
            format!("year {} is outside 1..=9999", date.year()),
        ));
    }
    Ok(date)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn ingest(body: Value) -> Result<ReadingInput, ValidationError> {
        let req: IngestRequest = serde_json::from_value(body).unwrap();
        validate_ingest(&req)
    }

    fn query(pairs: &[(&str, &str)]) -> Result<ValidatedQuery, ValidationError> {
        // ---
        let mut params = QueryParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "sensors" => params.sensors = value,
                "metrics" => params.metrics = value,
                "statistic" => params.statistic = value,
                "start_date" => params.start_date = value,
                "end_date" => params.end_date = value,
                other => panic!("unknown param {other}"),
            }
        }
        validate_query(&params)
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    // --- ingest

    #[test]
    fn test_ingest_valid_payload() {
        // ---
        let input = ingest(json!({
            "sensor_id": 1,
            "metric_type": "temperature",
            "value": 22.5,
            "timestamp": "2024-01-15T08:00:00"
        }))
        .unwrap();

        assert_eq!(input.sensor_id, 1);
        assert_eq!(input.metric_type, MetricType::Temperature);
        assert_eq!(input.value, 22.5);
        assert_eq!(
            input.timestamp,
            Some(date("2024-01-15").and_hms_opt(8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_ingest_timestamp_is_optional() {
        let input = ingest(json!({"sensor_id": 3, "metric_type": "pressure", "value": -5})).unwrap();
        assert_eq!(input.timestamp, None);
        assert_eq!(input.value, -5.0);
    }

    #[test]
    fn test_ingest_timestamp_formats() {
        // ---
        let expected = date("2024-01-15").and_hms_opt(8, 0, 0).unwrap();
        for raw in [
            "2024-01-15T08:00",
            "2024-01-15T08:00:00.000",
            "2024-01-15 08:00:00",
            "2024-01-15T08:00:00Z",
            "2024-01-15T10:00:00+02:00",
        ] {
            let input = ingest(json!({
                "sensor_id": 1, "metric_type": "humidity", "value": 1.0, "timestamp": raw
            }))
            .unwrap();
            assert_eq!(input.timestamp, Some(expected), "format {raw}");
        }
    }

    #[test]
    fn test_ingest_rejects_bad_sensor_id() {
        // ---
        for bad in [json!(-1), json!(0), json!(1.5), json!("invalid"), json!(true)] {
            let err = ingest(json!({"sensor_id": bad, "metric_type": "temperature", "value": 1.0}))
                .unwrap_err();
            assert_eq!(err.field, "sensor_id");
        }

        let err = ingest(json!({"metric_type": "temperature", "value": 1.0})).unwrap_err();
        assert_eq!(err.field, "sensor_id");
        assert_eq!(err.reason, "is required");
    }

    #[test]
    fn test_ingest_rejects_unknown_metric() {
        // ---
        let err = ingest(json!({"sensor_id": 1, "metric_type": "rainfall", "value": 1.0}))
            .unwrap_err();
        assert_eq!(err.field, "metric_type");

        let err = ingest(json!({"sensor_id": 1, "metric_type": "", "value": 1.0})).unwrap_err();
        assert_eq!(err.field, "metric_type");
    }

    #[test]
    fn test_ingest_accepts_every_metric() {
        for metric in [
            MetricType::Temperature,
            MetricType::Humidity,
            MetricType::WindSpeed,
            MetricType::Pressure,
        ] {
            let input =
                ingest(json!({"sensor_id": 1, "metric_type": metric.as_str(), "value": 1.0}));
            assert_eq!(input.unwrap().metric_type, metric);
        }
    }

    #[test]
    fn test_ingest_rejects_bad_value() {
        // ---
        for bad in [json!("hot"), json!(null), json!([1.0])] {
            let err = ingest(json!({"sensor_id": 1, "metric_type": "temperature", "value": bad}))
                .unwrap_err();
            assert_eq!(err.field, "value");
        }
    }

    #[test]
    fn test_ingest_rejects_bad_timestamp() {
        // ---
        for bad in [
            json!("yesterday"),
            json!("2024-13-01T00:00:00"),
            json!(12345),
            json!("0000-06-01T00:00:00"),
            json!("-5000-01-01T00:00:00"),
        ] {
            let err = ingest(json!({
                "sensor_id": 1, "metric_type": "temperature", "value": 1.0, "timestamp": bad
            }))
            .unwrap_err();
            assert_eq!(err.field, "timestamp");
        }
    }

    // --- query

    #[test]
    fn test_query_latest_mode_without_dates() {
        // ---
        let q = query(&[("sensors", "1,2"), ("metrics", "temperature,humidity")]).unwrap();
        assert_eq!(q.sensors, SensorSelection::Ids(vec![1, 2]));
        assert_eq!(q.metrics, vec![MetricType::Temperature, MetricType::Humidity]);
        assert_eq!(q.mode, QueryMode::Latest);
        assert_eq!(q.mode.label(), "latest");
    }

    #[test]
    fn test_query_statistic_ignored_without_dates() {
        // ---
        let q = query(&[("sensors", "1"), ("metrics", "temperature"), ("statistic", "avg")]).unwrap();
        assert_eq!(q.mode, QueryMode::Latest);

        // Not even checked for validity
        let q = query(&[("metrics", "temperature"), ("statistic", "median")]).unwrap();
        assert_eq!(q.mode, QueryMode::Latest);
    }

    #[test]
    fn test_query_sensors_default_to_all() {
        // ---
        let q = query(&[("metrics", "pressure")]).unwrap();
        assert_eq!(q.sensors, SensorSelection::All);

        let q = query(&[("sensors", " ALL "), ("metrics", "pressure")]).unwrap();
        assert_eq!(q.sensors, SensorSelection::All);
    }

    #[test]
    fn test_query_deduplicates_preserving_order() {
        // ---
        let q = query(&[("sensors", "5, 1,5"), ("metrics", "humidity,temperature,humidity")])
            .unwrap();
        assert_eq!(q.sensors, SensorSelection::Ids(vec![5, 1]));
        assert_eq!(q.metrics, vec![MetricType::Humidity, MetricType::Temperature]);
    }

    #[test]
    fn test_query_rejects_bad_sensors() {
        // ---
        for bad in ["abc", "1,,2", "1,", "0", "-4", ""] {
            let err = query(&[("sensors", bad), ("metrics", "temperature")]).unwrap_err();
            assert_eq!(err.field, "sensors", "input {bad:?}");
        }
    }

    #[test]
    fn test_query_rejects_bad_metrics() {
        // ---
        let err = query(&[("sensors", "1")]).unwrap_err();
        assert_eq!(err.field, "metrics");

        for bad in ["", "temperature,", "rainfall"] {
            let err = query(&[("sensors", "1"), ("metrics", bad)]).unwrap_err();
            assert_eq!(err.field, "metrics", "input {bad:?}");
        }
    }

    #[test]
    fn test_query_aggregate_mode() {
        // ---
        let q = query(&[
            ("sensors", "1"),
            ("metrics", "temperature"),
            ("statistic", "avg"),
            ("start_date", "2024-01-15"),
            ("end_date", "2024-01-15"),
        ])
        .unwrap();

        assert_eq!(
            q.mode,
            QueryMode::Aggregate {
                statistic: Statistic::Avg,
                range: DateRange {
                    start: date("2024-01-15"),
                    end: date("2024-01-15"),
                },
            }
        );
        assert_eq!(q.mode.label(), "avg");
    }

    #[test]
    fn test_query_requires_both_dates() {
        // ---
        let err = query(&[
            ("metrics", "temperature"),
            ("statistic", "avg"),
            ("start_date", "2024-01-15"),
        ])
        .unwrap_err();
        assert_eq!(err.field, "end_date");

        let err = query(&[
            ("metrics", "temperature"),
            ("statistic", "avg"),
            ("end_date", "2024-01-15"),
        ])
        .unwrap_err();
        assert_eq!(err.field, "start_date");
    }

    #[test]
    fn test_query_requires_statistic_with_dates() {
        // ---
        let err = query(&[
            ("metrics", "temperature"),
            ("start_date", "2024-01-15"),
            ("end_date", "2024-01-16"),
        ])
        .unwrap_err();
        assert_eq!(err.field, "statistic");

        let err = query(&[
            ("metrics", "temperature"),
            ("statistic", "median"),
            ("start_date", "2024-01-15"),
            ("end_date", "2024-01-16"),
        ])
        .unwrap_err();
        assert_eq!(err.field, "statistic");
    }

    #[test]
    fn test_query_rejects_bad_dates() {
        // ---
        let base = [("metrics", "temperature"), ("statistic", "max")];

        let err = query(&[base[0], base[1], ("start_date", "15/01/2024"), ("end_date", "2024-01-16")])
            .unwrap_err();
        assert_eq!(err.field, "start_date");

        let err = query(&[base[0], base[1], ("start_date", "2024-01-16"), ("end_date", "2024-01-15")])
            .unwrap_err();
        assert_eq!(err.field, "start_date");
    }

    #[test]
    fn test_query_rejects_years_outside_storable_range() {
        // ---
        let base = [("metrics", "temperature"), ("statistic", "avg")];

        let err = query(&[base[0], base[1], ("start_date", "0000-01-01"), ("end_date", "0000-01-02")])
            .unwrap_err();
        assert_eq!(err.field, "start_date");
        assert!(err.reason.contains("outside 1..=9999"));

        let err = query(&[base[0], base[1], ("start_date", "-5000-01-01"), ("end_date", "2024-01-02")])
            .unwrap_err();
        assert_eq!(err.field, "start_date");

        let ok = query(&[base[0], base[1], ("start_date", "9999-12-01"), ("end_date", "9999-12-31")]);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_query_range_limited_to_one_month() {
        // ---
        let base = [("metrics", "temperature"), ("statistic", "sum")];

        let ok = query(&[base[0], base[1], ("start_date", "2024-01-01"), ("end_date", "2024-02-01")]);
        assert!(ok.is_ok());

        let err = query(&[base[0], base[1], ("start_date", "2024-01-01"), ("end_date", "2024-02-02")])
            .unwrap_err();
        assert_eq!(err.field, "end_date");
        assert!(err.reason.contains("1 day and 1 month"));
    }
}
