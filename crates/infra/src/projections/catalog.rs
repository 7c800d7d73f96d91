use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use tenderdesk_catalog::{ProductEvent, ProductId};
use tenderdesk_core::AggregateId;
use tenderdesk_events::EventEnvelope;

use crate::read_model::ReadModelStore;

/// Queryable product read model (the catalog).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub name: String,
    pub stock: i64,
}

#[derive(Debug, Error)]
pub enum CatalogProjectionError {
    #[error("failed to deserialize product event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Catalog projection with an exact-name index.
///
/// Reconciliation resolves products by name, so the projection maintains a
/// `name → ProductId` index alongside the keyed store.
#[derive(Debug)]
pub struct CatalogProjection<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    store: S,
    by_name: RwLock<HashMap<String, ProductId>>,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> CatalogProjection<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            by_name: RwLock::new(HashMap::new()),
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors.get(&aggregate_id).unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, sequence_number);
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(product_id)
    }

    /// Exact name match, as reconciliation requires.
    pub fn find_by_name(&self, name: &str) -> Option<ProductReadModel> {
        let id = *self.by_name.read().ok()?.get(name)?;
        self.store.get(&id)
    }

    pub fn list(&self) -> Vec<ProductReadModel> {
        let mut products = self.store.list();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CatalogProjectionError> {
        if envelope.aggregate_type() != "catalog.product" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.cursor(aggregate_id);
        if seq == 0 {
            return Err(CatalogProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(CatalogProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CatalogProjectionError::Deserialize(e.to_string()))?;

        let product_id = match &ev {
            ProductEvent::ProductRegistered(e) => e.product_id,
            ProductEvent::StockAdjusted(e) => e.product_id,
        };
        if product_id.0 != aggregate_id {
            return Err(CatalogProjectionError::StreamMismatch(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ProductEvent::ProductRegistered(e) => {
                self.store.upsert(
                    e.product_id,
                    ProductReadModel {
                        product_id: e.product_id,
                        name: e.name.clone(),
                        stock: e.initial_stock,
                    },
                );
                if let Ok(mut by_name) = self.by_name.write() {
                    by_name.insert(e.name, e.product_id);
                }
            }
            ProductEvent::StockAdjusted(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    rm.stock += e.delta;
                    self.store.upsert(e.product_id, rm);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), CatalogProjectionError> {
        self.store.clear();
        if let Ok(mut by_name) = self.by_name.write() {
            by_name.clear();
        }
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
