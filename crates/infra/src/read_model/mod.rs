//! Read model storage abstractions.

pub mod kv;

pub use kv::{InMemoryReadStore, ReadModelStore};
