//! Database schema management for `weather-metrics`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the database schema (idempotent).
///
/// Creates the append-only `readings` table plus one index per query mode.
/// Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // `observed_at` holds the caller-supplied `timestamp`
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id           BIGSERIAL        PRIMARY KEY,
            sensor_id    BIGINT           NOT NULL CHECK (sensor_id > 0),
            metric_type  TEXT             NOT NULL CHECK (
                metric_type IN ('temperature', 'humidity', 'wind_speed', 'pressure')
            ),
            value        DOUBLE PRECISION NOT NULL,
            observed_at  TIMESTAMP        NOT NULL,
            ingested_at  TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Latest mode: DISTINCT ON (sensor_id, metric_type) ORDER BY ingested_at DESC, id DESC
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_latest
            ON readings (sensor_id, metric_type, ingested_at DESC, id DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Aggregate mode: range scan on observed_at per key
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_observed
            ON readings (sensor_id, metric_type, observed_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
