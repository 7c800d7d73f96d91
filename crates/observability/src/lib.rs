//! Observability bootstrap (tracing/logging).

pub mod tracing;

pub use tracing::init;
