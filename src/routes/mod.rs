use axum::Router;

use crate::SharedStore;

mod get_query;
mod health;
mod post_metrics;

// ---

pub fn router(store: SharedStore) -> Router {
    // ---
    Router::new()
        .merge(post_metrics::router())
        .merge(get_query::router())
        .merge(health::router())
        .with_state(store)
}
