use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenderdesk_core::{Aggregate, AggregateId, AggregateRoot, AdminId, DomainError, ValueObject};
use tenderdesk_events::Event;

use crate::bid::BidId;

/// Tender identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenderId(pub AggregateId);

impl TenderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TenderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Measurement unit of a tender item (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Kg,
    Piece,
    Meter,
    Liter,
    Box,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::Piece => "piece",
            Unit::Meter => "meter",
            Unit::Liter => "liter",
            Unit::Box => "box",
        }
    }
}

impl core::str::FromStr for Unit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kg" => Ok(Unit::Kg),
            "piece" => Ok(Unit::Piece),
            "meter" => Ok(Unit::Meter),
            "liter" => Ok(Unit::Liter),
            "box" => Ok(Unit::Box),
            other => Err(DomainError::validation(format!(
                "unit must be one of: kg, piece, meter, liter, box (got '{other}')"
            ))),
        }
    }
}

/// A requested material line on a tender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderItem {
    pub name: String,
    pub quantity: i64,
    pub unit: Unit,
}

impl ValueObject for TenderItem {}

/// Tender status lifecycle.
///
/// `Closed` and `Awarded` are terminal; there is no way back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenderStatus {
    Active,
    Closed,
    Awarded,
}

impl TenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenderStatus::Active => "active",
            TenderStatus::Closed => "closed",
            TenderStatus::Awarded => "awarded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TenderStatus::Closed | TenderStatus::Awarded)
    }
}

/// Aggregate root: Tender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tender {
    id: TenderId,
    title: String,
    description: String,
    items: Vec<TenderItem>,
    store_name: String,
    status: TenderStatus,
    deadline: Option<DateTime<Utc>>,
    created_by: Option<AdminId>,
    winning_bid_id: Option<BidId>,
    version: u64,
    created: bool,
}

impl Tender {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TenderId) -> Self {
        Self {
            id,
            title: String::new(),
            description: String::new(),
            items: Vec::new(),
            store_name: String::new(),
            status: TenderStatus::Active,
            deadline: None,
            created_by: None,
            winning_bid_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TenderId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The item sequence is fixed at opening time; no command mutates it.
    pub fn items(&self) -> &[TenderItem] {
        &self.items
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn status(&self) -> TenderStatus {
        self.status
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn created_by(&self) -> Option<AdminId> {
        self.created_by
    }

    pub fn winning_bid_id(&self) -> Option<BidId> {
        self.winning_bid_id
    }

    /// Whether the tender still accepts bids and award/close decisions.
    pub fn is_open(&self) -> bool {
        self.created && self.status == TenderStatus::Active
    }
}

impl AggregateRoot for Tender {
    type Id = TenderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenTender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTender {
    pub tender_id: TenderId,
    pub title: String,
    pub description: String,
    pub items: Vec<TenderItem>,
    pub store_name: String,
    pub deadline: Option<DateTime<Utc>>,
    pub created_by: AdminId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseTender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTender {
    pub tender_id: TenderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AwardTender.
///
/// Only records the decision on the tender itself; sibling-bid rejection and
/// inventory reconciliation are driven by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardTender {
    pub tender_id: TenderId,
    pub winning_bid_id: BidId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenderCommand {
    OpenTender(OpenTender),
    CloseTender(CloseTender),
    AwardTender(AwardTender),
}

/// Event: TenderOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderOpened {
    pub tender_id: TenderId,
    pub title: String,
    pub description: String,
    pub items: Vec<TenderItem>,
    pub store_name: String,
    pub deadline: Option<DateTime<Utc>>,
    pub created_by: AdminId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TenderClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderClosed {
    pub tender_id: TenderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TenderAwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderAwarded {
    pub tender_id: TenderId,
    pub winning_bid_id: BidId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenderEvent {
    TenderOpened(TenderOpened),
    TenderClosed(TenderClosed),
    TenderAwarded(TenderAwarded),
}

impl Event for TenderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TenderEvent::TenderOpened(_) => "tendering.tender.opened",
            TenderEvent::TenderClosed(_) => "tendering.tender.closed",
            TenderEvent::TenderAwarded(_) => "tendering.tender.awarded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TenderEvent::TenderOpened(e) => e.occurred_at,
            TenderEvent::TenderClosed(e) => e.occurred_at,
            TenderEvent::TenderAwarded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Tender {
    type Command = TenderCommand;
    type Event = TenderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TenderEvent::TenderOpened(e) => {
                self.id = e.tender_id;
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.items = e.items.clone();
                self.store_name = e.store_name.clone();
                self.status = TenderStatus::Active;
                self.deadline = e.deadline;
                self.created_by = Some(e.created_by);
                self.winning_bid_id = None;
                self.created = true;
            }
            TenderEvent::TenderClosed(_) => {
                self.status = TenderStatus::Closed;
            }
            TenderEvent::TenderAwarded(e) => {
                self.status = TenderStatus::Awarded;
                self.winning_bid_id = Some(e.winning_bid_id);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TenderCommand::OpenTender(cmd) => self.handle_open(cmd),
            TenderCommand::CloseTender(cmd) => self.handle_close(cmd),
            TenderCommand::AwardTender(cmd) => self.handle_award(cmd),
        }
    }
}

impl Tender {
    fn ensure_tender_id(&self, tender_id: TenderId) -> Result<(), DomainError> {
        if self.id != tender_id {
            return Err(DomainError::validation("tender_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenTender) -> Result<Vec<TenderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("tender already exists"));
        }

        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("description cannot be empty"));
        }
        if cmd.store_name.trim().is_empty() {
            return Err(DomainError::validation("store name cannot be empty"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::validation("tender requires at least one item"));
        }
        for item in &cmd.items {
            if item.name.trim().is_empty() {
                return Err(DomainError::validation("item name cannot be empty"));
            }
            if item.quantity < 1 {
                return Err(DomainError::validation("item quantity must be at least 1"));
            }
        }

        Ok(vec![TenderEvent::TenderOpened(TenderOpened {
            tender_id: cmd.tender_id,
            title: cmd.title.clone(),
            description: cmd.description.clone(),
            items: cmd.items.clone(),
            store_name: cmd.store_name.clone(),
            deadline: cmd.deadline,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseTender) -> Result<Vec<TenderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tender_id(cmd.tender_id)?;

        if self.status != TenderStatus::Active {
            return Err(DomainError::invalid_transition(format!(
                "only active tenders can be closed (status: {})",
                self.status.as_str()
            )));
        }

        Ok(vec![TenderEvent::TenderClosed(TenderClosed {
            tender_id: cmd.tender_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_award(&self, cmd: &AwardTender) -> Result<Vec<TenderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tender_id(cmd.tender_id)?;

        if self.status != TenderStatus::Active {
            return Err(DomainError::invalid_transition(format!(
                "only active tenders can be awarded (status: {})",
                self.status.as_str()
            )));
        }

        Ok(vec![TenderEvent::TenderAwarded(TenderAwarded {
            tender_id: cmd.tender_id,
            winning_bid_id: cmd.winning_bid_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tender_id() -> TenderId {
        TenderId::new(AggregateId::new())
    }

    fn test_admin_id() -> AdminId {
        AdminId::new()
    }

    fn test_bid_id() -> BidId {
        BidId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn mcb_items() -> Vec<TenderItem> {
        vec![TenderItem {
            name: "MCB".to_string(),
            quantity: 10,
            unit: Unit::Piece,
        }]
    }

    fn open_cmd(tender_id: TenderId) -> OpenTender {
        OpenTender {
            tender_id,
            title: "Switchgear procurement".to_string(),
            description: "Breakers for the north substation".to_string(),
            items: mcb_items(),
            store_name: "Warehouse-1".to_string(),
            deadline: None,
            created_by: test_admin_id(),
            occurred_at: test_time(),
        }
    }

    fn opened(tender_id: TenderId) -> Tender {
        let mut tender = Tender::empty(tender_id);
        let events = tender
            .handle(&TenderCommand::OpenTender(open_cmd(tender_id)))
            .unwrap();
        tender.apply(&events[0]);
        tender
    }

    #[test]
    fn open_tender_emits_tender_opened_event() {
        let tender_id = test_tender_id();
        let tender = Tender::empty(tender_id);
        let cmd = open_cmd(tender_id);

        let events = tender
            .handle(&TenderCommand::OpenTender(cmd.clone()))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            TenderEvent::TenderOpened(e) => {
                assert_eq!(e.tender_id, tender_id);
                assert_eq!(e.title, cmd.title);
                assert_eq!(e.items, cmd.items);
                assert_eq!(e.store_name, "Warehouse-1");
            }
            _ => panic!("Expected TenderOpened event"),
        }
    }

    #[test]
    fn open_tender_starts_active() {
        let tender = opened(test_tender_id());
        assert_eq!(tender.status(), TenderStatus::Active);
        assert!(tender.is_open());
    }

    #[test]
    fn open_tender_rejects_empty_title() {
        let tender_id = test_tender_id();
        let tender = Tender::empty(tender_id);
        let mut cmd = open_cmd(tender_id);
        cmd.title = "   ".to_string();

        let err = tender.handle(&TenderCommand::OpenTender(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn open_tender_rejects_empty_store_name() {
        let tender_id = test_tender_id();
        let tender = Tender::empty(tender_id);
        let mut cmd = open_cmd(tender_id);
        cmd.store_name = String::new();

        let err = tender.handle(&TenderCommand::OpenTender(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn open_tender_rejects_empty_items() {
        let tender_id = test_tender_id();
        let tender = Tender::empty(tender_id);
        let mut cmd = open_cmd(tender_id);
        cmd.items = vec![];

        let err = tender.handle(&TenderCommand::OpenTender(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn open_tender_rejects_non_positive_quantity() {
        let tender_id = test_tender_id();
        let tender = Tender::empty(tender_id);
        let mut cmd = open_cmd(tender_id);
        cmd.items[0].quantity = 0;

        let err = tender.handle(&TenderCommand::OpenTender(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn close_moves_status_to_closed() {
        let tender_id = test_tender_id();
        let mut tender = opened(tender_id);

        let events = tender
            .handle(&TenderCommand::CloseTender(CloseTender {
                tender_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        tender.apply(&events[0]);

        assert_eq!(tender.status(), TenderStatus::Closed);
        assert!(tender.status().is_terminal());
    }

    #[test]
    fn award_moves_status_to_awarded_and_records_winner() {
        let tender_id = test_tender_id();
        let mut tender = opened(tender_id);
        let winner = test_bid_id();

        let events = tender
            .handle(&TenderCommand::AwardTender(AwardTender {
                tender_id,
                winning_bid_id: winner,
                occurred_at: test_time(),
            }))
            .unwrap();
        tender.apply(&events[0]);

        assert_eq!(tender.status(), TenderStatus::Awarded);
        assert_eq!(tender.winning_bid_id(), Some(winner));
    }

    #[test]
    fn cannot_close_a_closed_tender() {
        let tender_id = test_tender_id();
        let mut tender = opened(tender_id);

        let close = TenderCommand::CloseTender(CloseTender {
            tender_id,
            occurred_at: test_time(),
        });
        let events = tender.handle(&close).unwrap();
        tender.apply(&events[0]);

        let err = tender.handle(&close).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cannot_award_a_closed_tender() {
        let tender_id = test_tender_id();
        let mut tender = opened(tender_id);

        let events = tender
            .handle(&TenderCommand::CloseTender(CloseTender {
                tender_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        tender.apply(&events[0]);

        let err = tender
            .handle(&TenderCommand::AwardTender(AwardTender {
                tender_id,
                winning_bid_id: test_bid_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cannot_close_an_awarded_tender() {
        let tender_id = test_tender_id();
        let mut tender = opened(tender_id);

        let events = tender
            .handle(&TenderCommand::AwardTender(AwardTender {
                tender_id,
                winning_bid_id: test_bid_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        tender.apply(&events[0]);

        let err = tender
            .handle(&TenderCommand::CloseTender(CloseTender {
                tender_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn close_on_missing_tender_is_not_found() {
        let tender_id = test_tender_id();
        let tender = Tender::empty(tender_id);

        let err = tender
            .handle(&TenderCommand::CloseTender(CloseTender {
                tender_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn unit_parses_the_closed_set_only() {
        for (s, u) in [
            ("kg", Unit::Kg),
            ("piece", Unit::Piece),
            ("meter", Unit::Meter),
            ("liter", Unit::Liter),
            ("box", Unit::Box),
        ] {
            assert_eq!(s.parse::<Unit>().unwrap(), u);
            assert_eq!(u.as_str(), s);
        }
        assert!("tonne".parse::<Unit>().is_err());
        assert!("".parse::<Unit>().is_err());
    }

    #[test]
    fn version_increments_on_apply() {
        let tender_id = test_tender_id();
        let mut tender = opened(tender_id);
        assert_eq!(tender.version(), 1);

        let events = tender
            .handle(&TenderCommand::CloseTender(CloseTender {
                tender_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        tender.apply(&events[0]);
        assert_eq!(tender.version(), 2);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: once terminal, no command ever moves the status again.
            #[test]
            fn terminal_states_never_transition(close_first in any::<bool>()) {
                let tender_id = test_tender_id();
                let mut tender = opened(tender_id);

                let terminal_event = if close_first {
                    tender.handle(&TenderCommand::CloseTender(CloseTender {
                        tender_id,
                        occurred_at: test_time(),
                    })).unwrap()
                } else {
                    tender.handle(&TenderCommand::AwardTender(AwardTender {
                        tender_id,
                        winning_bid_id: test_bid_id(),
                        occurred_at: test_time(),
                    })).unwrap()
                };
                tender.apply(&terminal_event[0]);
                let frozen = tender.status();
                prop_assert!(frozen.is_terminal());

                let close = TenderCommand::CloseTender(CloseTender {
                    tender_id,
                    occurred_at: test_time(),
                });
                let award = TenderCommand::AwardTender(AwardTender {
                    tender_id,
                    winning_bid_id: test_bid_id(),
                    occurred_at: test_time(),
                });
                prop_assert!(tender.handle(&close).is_err());
                prop_assert!(tender.handle(&award).is_err());
                prop_assert_eq!(tender.status(), frozen);
            }

            /// Property: handle is deterministic and never mutates state.
            #[test]
            fn handle_is_pure(
                title in "[A-Za-z][A-Za-z0-9 ]{0,40}",
                quantity in 1i64..10_000,
            ) {
                let tender_id = test_tender_id();
                let tender = Tender::empty(tender_id);
                let mut cmd = open_cmd(tender_id);
                cmd.title = title;
                cmd.items[0].quantity = quantity;

                let before = tender.clone();
                let first = tender.handle(&TenderCommand::OpenTender(cmd.clone()));
                let second = tender.handle(&TenderCommand::OpenTender(cmd));

                prop_assert_eq!(&tender, &before);
                prop_assert_eq!(first.unwrap(), second.unwrap());
            }
        }
    }
}
