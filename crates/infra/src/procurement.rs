//! Procurement service: the cross-aggregate orchestration layer.
//!
//! Tender and bid aggregates are pure and single-stream; everything that has
//! to see more than one of them at once lives here:
//!
//! - bid submission (tender must still be active, lines must quote real
//!   tender items)
//! - closing a tender (resolve every pending bid, then close)
//! - the award protocol (validate → reject siblings → accept winner →
//!   reconcile inventory → award the tender)
//!
//! The award and close paths serialize on a per-tender mutex, and the final
//! tender transition is committed through the event store's conditional
//! append. Either guard alone prevents a double award; together a racing
//! caller loses with a conflict or an invalid-transition error, never with a
//! second set of inventory deltas.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::Value as JsonValue;

use tenderdesk_catalog::{Product, ProductCommand, ProductId, RegisterProduct};
use tenderdesk_core::{AdminId, AggregateId};
use tenderdesk_events::{EventBus, EventEnvelope};
use tenderdesk_tendering::{
    AcceptBid, AwardTender, Bid, BidCommand, BidId, BidLine, BidStatus, CloseTender, ContactInfo,
    OpenTender, RejectBid, SubmitBid, Tender, TenderCommand, TenderId, TenderItem, TenderStatus,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{
    BidReadModel, InMemoryBidLedger, InMemoryCatalog, InMemoryStoreLedger, InMemoryTenderBoard,
    ProductReadModel, StoreReadModel, TenderReadModel,
};
use crate::read_model::InMemoryReadStore;
use crate::reconcile::{AwardItem, InventoryReconciler, ReconciliationReport};

/// Fields of a tender to be opened (ids and timestamps are assigned here).
#[derive(Debug, Clone)]
pub struct NewTender {
    pub title: String,
    pub description: String,
    pub items: Vec<TenderItem>,
    pub store_name: String,
    pub deadline: Option<chrono::DateTime<Utc>>,
    pub created_by: AdminId,
}

/// Result of a completed award.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardOutcome {
    pub tender_id: TenderId,
    pub winning_bid_id: BidId,
    /// Item names that could not be matched to a catalog product; the award
    /// completed regardless and these are surfaced as a warning.
    pub unresolved_items: Vec<String>,
}

pub struct ProcurementService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    tenders: Arc<InMemoryTenderBoard>,
    bids: Arc<InMemoryBidLedger>,
    catalog: Arc<InMemoryCatalog>,
    stores: Arc<InMemoryStoreLedger>,
    reconciler: InventoryReconciler<S, B>,
    tender_locks: Mutex<HashMap<TenderId, Arc<Mutex<()>>>>,
}

impl<S, B> ProcurementService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        let dispatcher = Arc::new(CommandDispatcher::new(store, bus));
        let tenders = Arc::new(InMemoryTenderBoard::new(Arc::new(InMemoryReadStore::new())));
        let bids = Arc::new(InMemoryBidLedger::new(Arc::new(InMemoryReadStore::new())));
        let catalog = Arc::new(InMemoryCatalog::new(Arc::new(InMemoryReadStore::new())));
        let stores = Arc::new(InMemoryStoreLedger::new(Arc::new(InMemoryReadStore::new())));
        let reconciler =
            InventoryReconciler::new(dispatcher.clone(), catalog.clone(), stores.clone());

        Self {
            dispatcher,
            tenders,
            bids,
            catalog,
            stores,
            reconciler,
            tender_locks: Mutex::new(HashMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // Tender lifecycle
    // ------------------------------------------------------------------

    pub fn open_tender(&self, new_tender: NewTender) -> Result<TenderReadModel, DispatchError> {
        let agg = AggregateId::new();
        let tender_id = TenderId::new(agg);

        self.dispatch_applied::<Tender>(
            agg,
            "tendering.tender",
            TenderCommand::OpenTender(OpenTender {
                tender_id,
                title: new_tender.title,
                description: new_tender.description,
                items: new_tender.items,
                store_name: new_tender.store_name,
                deadline: new_tender.deadline,
                created_by: new_tender.created_by,
                occurred_at: Utc::now(),
            }),
            |id| Tender::empty(TenderId::new(id)),
        )?;

        self.tenders.get(&tender_id).ok_or(DispatchError::NotFound)
    }

    pub fn get_tender(&self, tender_id: TenderId) -> Option<TenderReadModel> {
        self.tenders.get(&tender_id)
    }

    pub fn list_tenders(&self) -> Vec<TenderReadModel> {
        self.tenders.list()
    }

    /// Close a tender: no pending bid may survive the transition, so every
    /// bid is resolved (rejected) before the close is committed.
    pub fn close_tender(&self, tender_id: TenderId) -> Result<TenderReadModel, DispatchError> {
        let lock = self.tender_lock(tender_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let tender = self.tenders.get(&tender_id).ok_or(DispatchError::NotFound)?;
        if tender.status != TenderStatus::Active {
            return Err(DispatchError::InvalidTransition(format!(
                "only active tenders can be closed (status: {})",
                tender.status.as_str()
            )));
        }

        self.reject_all_except(tender_id, None)?;

        self.dispatch_applied::<Tender>(
            tender_id.0,
            "tendering.tender",
            TenderCommand::CloseTender(CloseTender {
                tender_id,
                occurred_at: Utc::now(),
            }),
            |id| Tender::empty(TenderId::new(id)),
        )?;

        self.tenders.get(&tender_id).ok_or(DispatchError::NotFound)
    }

    // ------------------------------------------------------------------
    // Bids
    // ------------------------------------------------------------------

    /// Public, unauthenticated submission. The tender must still be active
    /// and every quoted line must reference one of its items, exactly once.
    pub fn submit_bid(
        &self,
        tender_id: TenderId,
        lines: Vec<BidLine>,
        note: Option<String>,
        contact: ContactInfo,
    ) -> Result<BidReadModel, DispatchError> {
        let tender = self.tenders.get(&tender_id).ok_or(DispatchError::NotFound)?;
        if tender.status != TenderStatus::Active {
            return Err(DispatchError::InvalidTransition(
                "cannot bid on a tender that is not active".to_string(),
            ));
        }

        for (i, line) in lines.iter().enumerate() {
            if !tender.items.iter().any(|item| item.name == line.item_name) {
                return Err(DispatchError::Validation(format!(
                    "bid line '{}' does not match any tender item",
                    line.item_name
                )));
            }
            if lines[..i].iter().any(|prev| prev.item_name == line.item_name) {
                return Err(DispatchError::Validation(format!(
                    "duplicate bid line for item '{}'",
                    line.item_name
                )));
            }
        }

        let agg = AggregateId::new();
        let bid_id = BidId::new(agg);

        self.dispatch_applied::<Bid>(
            agg,
            "tendering.bid",
            BidCommand::SubmitBid(SubmitBid {
                bid_id,
                tender_id,
                lines,
                note,
                contact,
                occurred_at: Utc::now(),
            }),
            |id| Bid::empty(BidId::new(id)),
        )?;

        self.bids.get(&bid_id).ok_or(DispatchError::NotFound)
    }

    pub fn get_bid(&self, bid_id: BidId) -> Option<BidReadModel> {
        self.bids.get(&bid_id)
    }

    /// Bids for a tender, newest first.
    pub fn list_bids(&self, tender_id: TenderId) -> Vec<BidReadModel> {
        self.bids.list_by_tender(tender_id)
    }

    /// Admin status override. Only `accepted`/`rejected` are legal targets;
    /// accepting checks that no sibling already holds the award.
    pub fn set_bid_status(
        &self,
        bid_id: BidId,
        status: BidStatus,
    ) -> Result<BidReadModel, DispatchError> {
        let bid = self.bids.get(&bid_id).ok_or(DispatchError::NotFound)?;

        match status {
            BidStatus::Pending => {
                return Err(DispatchError::Validation(
                    "status must be 'accepted' or 'rejected'".to_string(),
                ));
            }
            BidStatus::Accepted => {
                let sibling_accepted = self
                    .bids
                    .list_by_tender(bid.tender_id)
                    .into_iter()
                    .any(|b| b.bid_id != bid_id && b.status == BidStatus::Accepted);
                if sibling_accepted {
                    return Err(DispatchError::Concurrency(
                        "another bid is already accepted for this tender".to_string(),
                    ));
                }
                self.dispatch_applied::<Bid>(
                    bid_id.0,
                    "tendering.bid",
                    BidCommand::AcceptBid(AcceptBid {
                        bid_id,
                        occurred_at: Utc::now(),
                    }),
                    |id| Bid::empty(BidId::new(id)),
                )?;
            }
            BidStatus::Rejected => {
                self.dispatch_applied::<Bid>(
                    bid_id.0,
                    "tendering.bid",
                    BidCommand::RejectBid(RejectBid {
                        bid_id,
                        occurred_at: Utc::now(),
                    }),
                    |id| Bid::empty(BidId::new(id)),
                )?;
            }
        }

        self.bids.get(&bid_id).ok_or(DispatchError::NotFound)
    }

    /// Reject every bid of the tender except `keep` (all of them when `keep`
    /// is `None`). Already-rejected bids are left untouched, which makes the
    /// operation idempotent: a second pass emits nothing.
    pub fn reject_all_except(
        &self,
        tender_id: TenderId,
        keep: Option<BidId>,
    ) -> Result<(), DispatchError> {
        for bid in self.bids.list_by_tender(tender_id) {
            if Some(bid.bid_id) == keep || bid.status == BidStatus::Rejected {
                continue;
            }
            self.dispatch_applied::<Bid>(
                bid.bid_id.0,
                "tendering.bid",
                BidCommand::RejectBid(RejectBid {
                    bid_id: bid.bid_id,
                    occurred_at: Utc::now(),
                }),
                |id| Bid::empty(BidId::new(id)),
            )?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Award protocol
    // ------------------------------------------------------------------

    /// Execute the award protocol. Steps run strictly in order; bid state
    /// changes land before inventory effects, and the tender transition is
    /// committed last, so an interrupted run leaves the tender active and the
    /// whole call safely retryable.
    pub fn award_tender(
        &self,
        tender_id: TenderId,
        winning_bid_id: BidId,
        items: &[AwardItem],
    ) -> Result<AwardOutcome, DispatchError> {
        let lock = self.tender_lock(tender_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // 1) Validate against current state; nothing has side effects yet.
        let tender = self.tenders.get(&tender_id).ok_or(DispatchError::NotFound)?;
        if tender.status != TenderStatus::Active {
            return Err(DispatchError::InvalidTransition(format!(
                "only active tenders can be awarded (status: {})",
                tender.status.as_str()
            )));
        }
        let bid = self
            .bids
            .get(&winning_bid_id)
            .ok_or(DispatchError::NotFound)?;
        if bid.tender_id != tender_id {
            return Err(DispatchError::Validation(
                "bid does not belong to this tender".to_string(),
            ));
        }
        if items.is_empty() {
            return Err(DispatchError::Validation(
                "award requires at least one item".to_string(),
            ));
        }
        for item in items {
            if item.quantity < 1 {
                return Err(DispatchError::Validation(
                    "award item quantity must be at least 1".to_string(),
                ));
            }
            if !tender.items.iter().any(|t| t.name == item.name) {
                return Err(DispatchError::Validation(format!(
                    "award item '{}' is not part of the tender",
                    item.name
                )));
            }
        }

        // 2) Resolve every competing bid before any financial effect.
        self.reject_all_except(tender_id, Some(winning_bid_id))?;

        // 3) Mark the winner (no-op when retrying an interrupted award).
        self.dispatch_applied::<Bid>(
            winning_bid_id.0,
            "tendering.bid",
            BidCommand::AcceptBid(AcceptBid {
                bid_id: winning_bid_id,
                occurred_at: Utc::now(),
            }),
            |id| Bid::empty(BidId::new(id)),
        )?;

        // 4) Fold awarded quantities back into catalog + store.
        let report: ReconciliationReport = self
            .reconciler
            .reconcile_award(items, &tender.store_name)?;

        // 5) Terminal tender transition, conditional on the stream version.
        self.dispatch_applied::<Tender>(
            tender_id.0,
            "tendering.tender",
            TenderCommand::AwardTender(AwardTender {
                tender_id,
                winning_bid_id,
                occurred_at: Utc::now(),
            }),
            |id| Tender::empty(TenderId::new(id)),
        )?;

        if !report.unresolved.is_empty() {
            tracing::warn!(
                tender = %tender_id,
                unresolved = ?report.unresolved,
                "award completed with unresolved catalog items"
            );
        }

        Ok(AwardOutcome {
            tender_id,
            winning_bid_id,
            unresolved_items: report.unresolved,
        })
    }

    // ------------------------------------------------------------------
    // Catalog & stores (collaborator surfaces)
    // ------------------------------------------------------------------

    pub fn register_product(
        &self,
        name: &str,
        initial_stock: i64,
    ) -> Result<ProductReadModel, DispatchError> {
        if self.catalog.find_by_name(name).is_some() {
            return Err(DispatchError::Concurrency(format!(
                "product '{name}' already exists"
            )));
        }

        let agg = AggregateId::new();
        let product_id = ProductId::new(agg);

        self.dispatch_applied::<Product>(
            agg,
            "catalog.product",
            ProductCommand::RegisterProduct(RegisterProduct {
                product_id,
                name: name.to_string(),
                initial_stock,
                occurred_at: Utc::now(),
            }),
            |id| Product::empty(ProductId::new(id)),
        )?;

        self.catalog.get(&product_id).ok_or(DispatchError::NotFound)
    }

    pub fn find_product(&self, name: &str) -> Option<ProductReadModel> {
        self.catalog.find_by_name(name)
    }

    pub fn list_products(&self) -> Vec<ProductReadModel> {
        self.catalog.list()
    }

    pub fn find_store(&self, name: &str) -> Option<StoreReadModel> {
        self.stores.find_by_name(name)
    }

    pub fn list_stores(&self) -> Vec<StoreReadModel> {
        self.stores.list()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn tender_lock(&self, tender_id: TenderId) -> Arc<Mutex<()>> {
        let mut locks = self
            .tender_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(tender_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Dispatch a command and immediately fold the committed events into the
    /// read models, so each protocol step reads its own writes. The bus still
    /// receives every envelope for out-of-band consumers; projections
    /// deduplicate by cursor.
    fn dispatch_applied<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: tenderdesk_core::Aggregate<Error = tenderdesk_core::DomainError>,
        A::Event: tenderdesk_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        let committed =
            self.dispatcher
                .dispatch::<A>(aggregate_id, aggregate_type, command, make_aggregate)?;
        self.apply_committed(&committed);
        Ok(committed)
    }

    fn apply_committed(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let envelope = stored.to_envelope();
            if let Err(e) = self.tenders.apply_envelope(&envelope) {
                tracing::warn!("tender projection apply failed: {e}");
            }
            if let Err(e) = self.bids.apply_envelope(&envelope) {
                tracing::warn!("bid projection apply failed: {e}");
            }
            if let Err(e) = self.catalog.apply_envelope(&envelope) {
                tracing::warn!("catalog projection apply failed: {e}");
            }
            if let Err(e) = self.stores.apply_envelope(&envelope) {
                tracing::warn!("store projection apply failed: {e}");
            }
        }
    }
}
