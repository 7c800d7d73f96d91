//! `tenderdesk-stores` — per-location store ledgers.
//!
//! A store (domain term: a named physical/logical location, not the storage
//! layer) holds an ordered list of item quantities. Stores are looked up or
//! created lazily by name during award reconciliation.

pub mod store;

pub use store::{AdjustItem, OpenStore, Store, StoreCommand, StoreEvent, StoreId, StoreItem};
