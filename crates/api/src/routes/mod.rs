pub mod health;
pub mod query;

use axum::Router;

use crate::middleware::limit::body_limit_layer;
use crate::state::AppState;

/// Assemble the full router with all route groups.
pub fn build_router(state: AppState) -> Router {
    let limit = body_limit_layer(state.config().max_query_bytes);
    Router::new()
        .merge(health::routes())
        .merge(query::routes().layer(limit))
        .with_state(state)
}
