//! Inventory reconciliation for awarded tenders.
//!
//! Awarding a tender **returns** the procured quantities into stock: the
//! central catalog's product stock and the destination store's item ledger
//! both receive the awarded quantities as additive deltas.
//!
//! Partial-failure policy: an item with no exact-name product match is
//! skipped and reported, never failing the batch — tender/bid state integrity
//! matters more than exhaustive catalog matching. Store lines, by contrast,
//! are always written (an unknown line is appended).

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::Value as JsonValue;

use tenderdesk_catalog::{AdjustStock, Product, ProductCommand, ProductId};
use tenderdesk_core::AggregateId;
use tenderdesk_events::{EventBus, EventEnvelope};
use tenderdesk_stores::{AdjustItem, OpenStore, Store, StoreCommand, StoreId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{InMemoryCatalog, InMemoryStoreLedger};

/// One awarded quantity to fold back into inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardItem {
    pub name: String,
    pub quantity: i64,
}

/// Outcome of a reconciliation pass.
///
/// `unresolved` lists item names with no matching catalog product; the award
/// itself still completes and the caller surfaces these as a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub unresolved: Vec<String>,
}

/// Bounded retries for delta appends that lose an optimistic-concurrency race.
const MAX_DELTA_ATTEMPTS: usize = 3;

/// Applies award quantities to the catalog and a named store.
pub struct InventoryReconciler<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    catalog: Arc<InMemoryCatalog>,
    stores: Arc<InMemoryStoreLedger>,
    /// Serializes lazy store creation so one name maps to one store.
    store_admission: Mutex<()>,
}

impl<S, B> InventoryReconciler<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        catalog: Arc<InMemoryCatalog>,
        stores: Arc<InMemoryStoreLedger>,
    ) -> Self {
        Self {
            dispatcher,
            catalog,
            stores,
            store_admission: Mutex::new(()),
        }
    }

    /// Apply an award's quantities to the catalog and the named store.
    ///
    /// Product deltas are additive and conditional on the stream version, so
    /// concurrent awards touching the same product cannot lose updates; a
    /// lost race is retried against the re-read stream.
    pub fn reconcile_award(
        &self,
        items: &[AwardItem],
        store_name: &str,
    ) -> Result<ReconciliationReport, DispatchError> {
        let mut unresolved = Vec::new();

        for item in items {
            match self.catalog.find_by_name(&item.name) {
                Some(product) => {
                    self.adjust_product(product.product_id, item.quantity)?;
                }
                None => {
                    tracing::warn!(item = %item.name, "no catalog product for awarded item; skipping");
                    unresolved.push(item.name.clone());
                }
            }
        }

        let store_id = self.find_or_create_store(store_name)?;
        for item in items {
            self.adjust_store_item(store_id, &item.name, item.quantity)?;
        }

        Ok(ReconciliationReport { unresolved })
    }

    fn adjust_product(&self, product_id: ProductId, quantity: i64) -> Result<(), DispatchError> {
        let committed = self.with_retry(|| {
            self.dispatcher.dispatch::<Product>(
                product_id.0,
                "catalog.product",
                ProductCommand::AdjustStock(AdjustStock {
                    product_id,
                    delta: quantity,
                    occurred_at: Utc::now(),
                }),
                |id| Product::empty(ProductId::new(id)),
            )
        })?;
        self.apply(&committed);
        Ok(())
    }

    fn find_or_create_store(&self, store_name: &str) -> Result<StoreId, DispatchError> {
        let _admission = self
            .store_admission
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = self.stores.find_by_name(store_name) {
            return Ok(existing.store_id);
        }

        let store_id = StoreId::new(AggregateId::new());
        let committed = self.dispatcher.dispatch::<Store>(
            store_id.0,
            "stores.store",
            StoreCommand::OpenStore(OpenStore {
                store_id,
                name: store_name.to_string(),
                occurred_at: Utc::now(),
            }),
            |id| Store::empty(StoreId::new(id)),
        )?;
        self.apply(&committed);

        Ok(store_id)
    }

    fn adjust_store_item(
        &self,
        store_id: StoreId,
        item_name: &str,
        quantity: i64,
    ) -> Result<(), DispatchError> {
        let committed = self.with_retry(|| {
            self.dispatcher.dispatch::<Store>(
                store_id.0,
                "stores.store",
                StoreCommand::AdjustItem(AdjustItem {
                    store_id,
                    item_name: item_name.to_string(),
                    delta: quantity,
                    occurred_at: Utc::now(),
                }),
                |id| Store::empty(StoreId::new(id)),
            )
        })?;
        self.apply(&committed);
        Ok(())
    }

    /// Retry an optimistic append a bounded number of times. Each attempt
    /// re-reads the stream inside `dispatch`, so losing a race only means the
    /// delta is re-decided against fresher state.
    fn with_retry(
        &self,
        mut attempt: impl FnMut() -> Result<Vec<StoredEvent>, DispatchError>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let mut tries = 0;
        loop {
            match attempt() {
                Err(DispatchError::Concurrency(msg)) if tries + 1 < MAX_DELTA_ATTEMPTS => {
                    tries += 1;
                    tracing::debug!(tries, %msg, "delta append lost a race; retrying");
                }
                other => return other,
            }
        }
    }

    /// Fold committed events into the inventory read models immediately so
    /// the next step in the same protocol reads its own writes.
    fn apply(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let envelope = stored.to_envelope();
            if let Err(e) = self.catalog.apply_envelope(&envelope) {
                tracing::warn!("catalog projection apply failed: {e}");
            }
            if let Err(e) = self.stores.apply_envelope(&envelope) {
                tracing::warn!("store projection apply failed: {e}");
            }
        }
    }
}
