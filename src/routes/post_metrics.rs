use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::{ingest, validate_ingest, AppError, IngestRequest, SharedStore};

// ---

pub fn router() -> Router<SharedStore> {
    // ---
    Router::new().route("/metrics", post(handler))
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    message: &'static str,
    id: i64,
}

/// Handle `POST /metrics`: validate one reading, store it, return its id.
async fn handler(
    State(store): State<SharedStore>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    // ---
    info!("POST /metrics - Ingesting reading");

    let Json(request) = payload?;
    let input = validate_ingest(&request)?;
    let sensor_id = input.sensor_id;

    let id = ingest(store.as_ref(), input)
        .await
        .map_err(AppError::storage("failed to ingest metric"))?;

    info!(id, sensor_id, "POST /metrics - Stored");
    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            message: "Metric ingested successfully",
            id,
        }),
    ))
}
