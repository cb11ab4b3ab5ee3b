use tower_http::limit::RequestBodyLimitLayer;

/// Room for the JSON envelope and escapes around a query of `max_query_bytes`.
const ENVELOPE_BYTES: usize = 4096;

/// Reject request bodies far beyond the query size limit before they are
/// buffered. Exact query size is checked by the handlers.
pub fn body_limit_layer(max_query_bytes: usize) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(max_query_bytes.saturating_mul(2).saturating_add(ENVELOPE_BYTES))
}
