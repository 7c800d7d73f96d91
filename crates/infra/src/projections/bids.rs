use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use tenderdesk_core::AggregateId;
use tenderdesk_events::EventEnvelope;
use tenderdesk_tendering::{BidEvent, BidId, BidLine, BidStatus, ContactInfo, TenderId};

use crate::read_model::ReadModelStore;

/// Queryable bid read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidReadModel {
    pub bid_id: BidId,
    pub tender_id: TenderId,
    pub contact: ContactInfo,
    pub lines: Vec<BidLine>,
    pub note: Option<String>,
    pub status: BidStatus,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum BidProjectionError {
    #[error("failed to deserialize bid event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug)]
pub struct BidLedgerProjection<S>
where
    S: ReadModelStore<BidId, BidReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> BidLedgerProjection<S>
where
    S: ReadModelStore<BidId, BidReadModel>,
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

    pub fn get(&self, bid_id: &BidId) -> Option<BidReadModel> {
        self.store.get(bid_id)
    }

    /// Bids for one tender, newest submission first.
    pub fn list_by_tender(&self, tender_id: TenderId) -> Vec<BidReadModel> {
        let mut bids: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|b| b.tender_id == tender_id)
            .collect();
        bids.sort_by(|a, b| {
            (b.submitted_at, *b.bid_id.0.as_uuid()).cmp(&(a.submitted_at, *a.bid_id.0.as_uuid()))
        });
        bids
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), BidProjectionError> {
        if envelope.aggregate_type() != "tendering.bid" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.cursor(aggregate_id);
        if seq == 0 {
            return Err(BidProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(BidProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: BidEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| BidProjectionError::Deserialize(e.to_string()))?;

        let bid_id = match &ev {
            BidEvent::BidSubmitted(e) => e.bid_id,
            BidEvent::BidAccepted(e) => e.bid_id,
            BidEvent::BidRejected(e) => e.bid_id,
        };
        if bid_id.0 != aggregate_id {
            return Err(BidProjectionError::StreamMismatch(
                "event bid_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            BidEvent::BidSubmitted(e) => {
                self.store.upsert(
                    e.bid_id,
                    BidReadModel {
                        bid_id: e.bid_id,
                        tender_id: e.tender_id,
                        contact: e.contact,
                        lines: e.lines,
                        note: e.note,
                        status: BidStatus::Pending,
                        submitted_at: e.occurred_at,
                    },
                );
            }
            BidEvent::BidAccepted(e) => {
                // A status event for an unseen bid is dropped; a rebuild
                // replays the full stream and restores it.
                if let Some(mut rm) = self.store.get(&e.bid_id) {
                    rm.status = BidStatus::Accepted;
                    self.store.upsert(e.bid_id, rm);
                }
            }
            BidEvent::BidRejected(e) => {
                if let Some(mut rm) = self.store.get(&e.bid_id) {
                    rm.status = BidStatus::Rejected;
                    self.store.upsert(e.bid_id, rm);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), BidProjectionError> {
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
