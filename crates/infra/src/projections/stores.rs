use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use tenderdesk_core::AggregateId;
use tenderdesk_events::EventEnvelope;
use tenderdesk_stores::{StoreEvent, StoreId, StoreItem};

use crate::read_model::ReadModelStore;

/// Queryable store read model (a location's item ledger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReadModel {
    pub store_id: StoreId,
    pub name: String,
    pub items: Vec<StoreItem>,
}

#[derive(Debug, Error)]
pub enum StoreProjectionError {
    #[error("failed to deserialize store event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Store ledger projection with an exact-name index for lazy lookup/creation.
#[derive(Debug)]
pub struct StoreLedgerProjection<S>
where
    S: ReadModelStore<StoreId, StoreReadModel>,
{
    store: S,
    by_name: RwLock<HashMap<String, StoreId>>,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> StoreLedgerProjection<S>
where
    S: ReadModelStore<StoreId, StoreReadModel>,
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

    pub fn get(&self, store_id: &StoreId) -> Option<StoreReadModel> {
        self.store.get(store_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<StoreReadModel> {
        let id = *self.by_name.read().ok()?.get(name)?;
        self.store.get(&id)
    }

    pub fn list(&self) -> Vec<StoreReadModel> {
        let mut stores = self.store.list();
        stores.sort_by(|a, b| a.name.cmp(&b.name));
        stores
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StoreProjectionError> {
        if envelope.aggregate_type() != "stores.store" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.cursor(aggregate_id);
        if seq == 0 {
            return Err(StoreProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(StoreProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: StoreEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StoreProjectionError::Deserialize(e.to_string()))?;

        let store_id = match &ev {
            StoreEvent::StoreOpened(e) => e.store_id,
            StoreEvent::StoreItemAdjusted(e) => e.store_id,
        };
        if store_id.0 != aggregate_id {
            return Err(StoreProjectionError::StreamMismatch(
                "event store_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            StoreEvent::StoreOpened(e) => {
                self.store.upsert(
                    e.store_id,
                    StoreReadModel {
                        store_id: e.store_id,
                        name: e.name.clone(),
                        items: Vec::new(),
                    },
                );
                if let Ok(mut by_name) = self.by_name.write() {
                    by_name.insert(e.name, e.store_id);
                }
            }
            StoreEvent::StoreItemAdjusted(e) => {
                if let Some(mut rm) = self.store.get(&e.store_id) {
                    match rm.items.iter_mut().find(|i| i.name == e.item_name) {
                        Some(item) => item.quantity += e.delta,
                        None => rm.items.push(StoreItem {
                            name: e.item_name,
                            quantity: e.delta,
                        }),
                    }
                    self.store.upsert(e.store_id, rm);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), StoreProjectionError> {
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
