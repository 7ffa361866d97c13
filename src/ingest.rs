//! Ingest operation: stamp a validated reading with its receipt time and
//! append it to the store.

use chrono::Utc;
use tracing::debug;

use crate::models::NewReading;
use crate::store::{ReadingStore, StoreError};
use crate::validation::ReadingInput;

// ---

/// Persist one reading and return its id.
///
/// `ingested_at` is always the server clock at the time of the call. A missing
/// observation `timestamp` falls back to the same instant.
pub async fn ingest(store: &dyn ReadingStore, input: ReadingInput) -> Result<i64, StoreError> {
    // ---
    let ingested_at = Utc::now();
    let reading = NewReading {
        sensor_id: input.sensor_id,
        metric_type: input.metric_type,
        value: input.value,
        timestamp: input.timestamp.unwrap_or_else(|| ingested_at.naive_utc()),
        ingested_at,
    };

    let id = store.insert_reading(&reading).await?;
    debug!(
        id,
        sensor_id = reading.sensor_id,
        metric_type = %reading.metric_type,
        "Stored reading"
    );
    Ok(id)
}
