use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{debug, info};

use crate::{run_query, validate_query, AppError, QueryParams, QueryResponse, SharedStore};

// ---

pub fn router() -> Router<SharedStore> {
    // ---
    Router::new().route("/query", get(handler))
}

/// Handle `GET /query`: latest values, or an aggregate over a date range.
async fn handler(
    State(store): State<SharedStore>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    // ---
    let Query(params) = params?;
    info!("GET /query - {:?}", params);

    let query = validate_query(&params)?;
    debug!("GET /query - Validated: {:?}", query);

    let response = run_query(store.as_ref(), &query)
        .await
        .map_err(AppError::storage("failed to query metrics"))?;

    if response.results.is_empty() {
        debug!("GET /query - No readings matched");
    }
    info!(
        "GET /query - Returning {} sensor(s), statistic={}",
        response.results.len(),
        response.statistic
    );
    Ok(Json(response))
}
