use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use tenderdesk_core::{AdminId, AggregateId};
use tenderdesk_events::EventEnvelope;
use tenderdesk_tendering::{BidId, TenderEvent, TenderId, TenderItem, TenderStatus};

use crate::read_model::ReadModelStore;

/// Queryable tender read model (the tender board).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenderReadModel {
    pub tender_id: TenderId,
    pub title: String,
    pub description: String,
    pub items: Vec<TenderItem>,
    pub store_name: String,
    pub status: TenderStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub created_by: AdminId,
    pub opened_at: DateTime<Utc>,
    pub winning_bid_id: Option<BidId>,
}

#[derive(Debug, Error)]
pub enum TenderProjectionError {
    #[error("failed to deserialize tender event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug)]
pub struct TenderBoardProjection<S>
where
    S: ReadModelStore<TenderId, TenderReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> TenderBoardProjection<S>
where
    S: ReadModelStore<TenderId, TenderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
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

    pub fn get(&self, tender_id: &TenderId) -> Option<TenderReadModel> {
        self.store.get(tender_id)
    }

    /// All tenders, newest first.
    pub fn list(&self) -> Vec<TenderReadModel> {
        let mut tenders = self.store.list();
        tenders.sort_by(|a, b| {
            (b.opened_at, *b.tender_id.0.as_uuid()).cmp(&(a.opened_at, *a.tender_id.0.as_uuid()))
        });
        tenders
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), TenderProjectionError> {
        if envelope.aggregate_type() != "tendering.tender" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.cursor(aggregate_id);
        if seq == 0 {
            return Err(TenderProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate delivery; already folded in.
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(TenderProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: TenderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| TenderProjectionError::Deserialize(e.to_string()))?;

        let tender_id = match &ev {
            TenderEvent::TenderOpened(e) => e.tender_id,
            TenderEvent::TenderClosed(e) => e.tender_id,
            TenderEvent::TenderAwarded(e) => e.tender_id,
        };
        if tender_id.0 != aggregate_id {
            return Err(TenderProjectionError::StreamMismatch(
                "event tender_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            TenderEvent::TenderOpened(e) => {
                self.store.upsert(
                    e.tender_id,
                    TenderReadModel {
                        tender_id: e.tender_id,
                        title: e.title,
                        description: e.description,
                        items: e.items,
                        store_name: e.store_name,
                        status: TenderStatus::Active,
                        deadline: e.deadline,
                        created_by: e.created_by,
                        opened_at: e.occurred_at,
                        winning_bid_id: None,
                    },
                );
            }
            TenderEvent::TenderClosed(e) => {
                if let Some(mut rm) = self.store.get(&e.tender_id) {
                    rm.status = TenderStatus::Closed;
                    self.store.upsert(e.tender_id, rm);
                }
            }
            TenderEvent::TenderAwarded(e) => {
                if let Some(mut rm) = self.store.get(&e.tender_id) {
                    rm.status = TenderStatus::Awarded;
                    rm.winning_bid_id = Some(e.winning_bid_id);
                    self.store.upsert(e.tender_id, rm);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), TenderProjectionError> {
        self.store.clear();
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
