use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};

/// Browsers may call the read and render endpoints from any origin.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
