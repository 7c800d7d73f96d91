//! Read-model projections (CQRS read side).
//!
//! Each projection folds committed event envelopes into a queryable view and
//! tracks a per-stream cursor so duplicate deliveries are skipped (the bus is
//! at-least-once). Read models are disposable: `rebuild_from_scratch` replays
//! the full history.

use std::sync::Arc;

pub mod bids;
pub mod catalog;
pub mod stores;
pub mod tenders;

pub use bids::{BidLedgerProjection, BidReadModel};
pub use catalog::{CatalogProjection, ProductReadModel};
pub use stores::{StoreLedgerProjection, StoreReadModel};
pub use tenders::{TenderBoardProjection, TenderReadModel};

use crate::read_model::InMemoryReadStore;
use tenderdesk_catalog::ProductId;
use tenderdesk_stores::StoreId;
use tenderdesk_tendering::{BidId, TenderId};

/// In-memory projection wirings used by the procurement service and tests.
pub type InMemoryTenderBoard =
    TenderBoardProjection<Arc<InMemoryReadStore<TenderId, TenderReadModel>>>;
pub type InMemoryBidLedger = BidLedgerProjection<Arc<InMemoryReadStore<BidId, BidReadModel>>>;
pub type InMemoryCatalog = CatalogProjection<Arc<InMemoryReadStore<ProductId, ProductReadModel>>>;
pub type InMemoryStoreLedger =
    StoreLedgerProjection<Arc<InMemoryReadStore<StoreId, StoreReadModel>>>;
