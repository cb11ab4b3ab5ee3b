pub mod cors;
pub mod limit;
pub mod request_tracing;
