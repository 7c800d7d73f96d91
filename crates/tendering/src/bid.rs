use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenderdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ValueObject};
use tenderdesk_events::Event;

use crate::tender::TenderId;

/// Bid identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BidId(pub AggregateId);

impl BidId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BidId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Bidder contact card. Submitted unauthenticated, so every field is
/// format-checked here rather than trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl ValueObject for ContactInfo {}

impl ContactInfo {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("contact name cannot be empty"));
        }
        if !is_valid_email(&self.email) {
            return Err(DomainError::validation("invalid email format"));
        }
        if !is_valid_phone(&self.phone) {
            return Err(DomainError::validation(
                "invalid phone number format (expected 10 digits)",
            ));
        }
        Ok(())
    }
}

/// Lightweight email shape check: `local@domain.tld`, no whitespace, no
/// second `@`, with a non-empty label on each side of the last dot.
fn is_valid_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Exactly ten ASCII digits.
fn is_valid_phone(s: &str) -> bool {
    s.len() == 10 && s.bytes().all(|b| b.is_ascii_digit())
}

/// A quoted price for one tender item.
///
/// `price` is in the smallest currency unit; the unsigned representation makes
/// negative quotes unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidLine {
    pub item_name: String,
    pub price: u64,
}

impl ValueObject for BidLine {}

/// Bid status lifecycle.
///
/// Rejection is a soft state, not erasure; bids are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Pending => "pending",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
        }
    }
}

/// Aggregate root: Bid.
///
/// A bid references its tender; it never owns it. Whether the tender is still
/// accepting bids is checked at the service boundary, which can see both
/// aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    id: BidId,
    tender_id: Option<TenderId>,
    contact: Option<ContactInfo>,
    lines: Vec<BidLine>,
    note: Option<String>,
    status: BidStatus,
    version: u64,
    created: bool,
}

impl Bid {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: BidId) -> Self {
        Self {
            id,
            tender_id: None,
            contact: None,
            lines: Vec::new(),
            note: None,
            status: BidStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BidId {
        self.id
    }

    pub fn tender_id(&self) -> Option<TenderId> {
        self.tender_id
    }

    pub fn contact(&self) -> Option<&ContactInfo> {
        self.contact.as_ref()
    }

    pub fn lines(&self) -> &[BidLine] {
        &self.lines
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn status(&self) -> BidStatus {
        self.status
    }
}

impl AggregateRoot for Bid {
    type Id = BidId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitBid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitBid {
    pub bid_id: BidId,
    pub tender_id: TenderId,
    pub lines: Vec<BidLine>,
    pub note: Option<String>,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AcceptBid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptBid {
    pub bid_id: BidId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectBid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectBid {
    pub bid_id: BidId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidCommand {
    SubmitBid(SubmitBid),
    AcceptBid(AcceptBid),
    RejectBid(RejectBid),
}

/// Event: BidSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidSubmitted {
    pub bid_id: BidId,
    pub tender_id: TenderId,
    pub lines: Vec<BidLine>,
    pub note: Option<String>,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BidAccepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidAccepted {
    pub bid_id: BidId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BidRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidRejected {
    pub bid_id: BidId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidEvent {
    BidSubmitted(BidSubmitted),
    BidAccepted(BidAccepted),
    BidRejected(BidRejected),
}

impl Event for BidEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BidEvent::BidSubmitted(_) => "tendering.bid.submitted",
            BidEvent::BidAccepted(_) => "tendering.bid.accepted",
            BidEvent::BidRejected(_) => "tendering.bid.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BidEvent::BidSubmitted(e) => e.occurred_at,
            BidEvent::BidAccepted(e) => e.occurred_at,
            BidEvent::BidRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Bid {
    type Command = BidCommand;
    type Event = BidEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BidEvent::BidSubmitted(e) => {
                self.id = e.bid_id;
                self.tender_id = Some(e.tender_id);
                self.contact = Some(e.contact.clone());
                self.lines = e.lines.clone();
                self.note = e.note.clone();
                self.status = BidStatus::Pending;
                self.created = true;
            }
            BidEvent::BidAccepted(_) => {
                self.status = BidStatus::Accepted;
            }
            BidEvent::BidRejected(_) => {
                self.status = BidStatus::Rejected;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BidCommand::SubmitBid(cmd) => self.handle_submit(cmd),
            BidCommand::AcceptBid(cmd) => self.handle_accept(cmd),
            BidCommand::RejectBid(cmd) => self.handle_reject(cmd),
        }
    }
}

impl Bid {
    fn ensure_bid_id(&self, bid_id: BidId) -> Result<(), DomainError> {
        if self.id != bid_id {
            return Err(DomainError::validation("bid_id mismatch"));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitBid) -> Result<Vec<BidEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("bid already exists"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("bid requires at least one line"));
        }
        for line in &cmd.lines {
            if line.item_name.trim().is_empty() {
                return Err(DomainError::validation("bid line item name cannot be empty"));
            }
        }
        cmd.contact.validate()?;

        Ok(vec![BidEvent::BidSubmitted(BidSubmitted {
            bid_id: cmd.bid_id,
            tender_id: cmd.tender_id,
            lines: cmd.lines.clone(),
            note: cmd.note.clone(),
            contact: cmd.contact.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_accept(&self, cmd: &AcceptBid) -> Result<Vec<BidEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_bid_id(cmd.bid_id)?;

        // Idempotent-by-overwrite: re-setting the current status is a no-op.
        if self.status == BidStatus::Accepted {
            return Ok(vec![]);
        }

        Ok(vec![BidEvent::BidAccepted(BidAccepted {
            bid_id: cmd.bid_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectBid) -> Result<Vec<BidEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_bid_id(cmd.bid_id)?;

        if self.status == BidStatus::Rejected {
            return Ok(vec![]);
        }

        Ok(vec![BidEvent::BidRejected(BidRejected {
            bid_id: cmd.bid_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bid_id() -> BidId {
        BidId::new(AggregateId::new())
    }

    fn test_tender_id() -> TenderId {
        TenderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn acme_contact() -> ContactInfo {
        ContactInfo {
            name: "Acme".to_string(),
            email: "a@x.com".to_string(),
            phone: "9876543210".to_string(),
        }
    }

    fn submit_cmd(bid_id: BidId, tender_id: TenderId) -> SubmitBid {
        SubmitBid {
            bid_id,
            tender_id,
            lines: vec![BidLine {
                item_name: "MCB".to_string(),
                price: 9950,
            }],
            note: Some("Delivery within two weeks".to_string()),
            contact: acme_contact(),
            occurred_at: test_time(),
        }
    }

    fn submitted(bid_id: BidId, tender_id: TenderId) -> Bid {
        let mut bid = Bid::empty(bid_id);
        let events = bid
            .handle(&BidCommand::SubmitBid(submit_cmd(bid_id, tender_id)))
            .unwrap();
        bid.apply(&events[0]);
        bid
    }

    #[test]
    fn submit_bid_emits_bid_submitted_and_starts_pending() {
        let bid_id = test_bid_id();
        let tender_id = test_tender_id();
        let bid = Bid::empty(bid_id);
        let cmd = submit_cmd(bid_id, tender_id);

        let events = bid.handle(&BidCommand::SubmitBid(cmd.clone())).unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            BidEvent::BidSubmitted(e) => {
                assert_eq!(e.bid_id, bid_id);
                assert_eq!(e.tender_id, tender_id);
                assert_eq!(e.lines, cmd.lines);
                assert_eq!(e.contact, cmd.contact);
                assert_eq!(e.note, cmd.note);
            }
            _ => panic!("Expected BidSubmitted event"),
        }

        let bid = submitted(bid_id, tender_id);
        assert_eq!(bid.status(), BidStatus::Pending);
    }

    #[test]
    fn submit_bid_rejects_empty_lines() {
        let bid_id = test_bid_id();
        let bid = Bid::empty(bid_id);
        let mut cmd = submit_cmd(bid_id, test_tender_id());
        cmd.lines = vec![];

        let err = bid.handle(&BidCommand::SubmitBid(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn submit_bid_rejects_bad_email() {
        let bid_id = test_bid_id();
        let bid = Bid::empty(bid_id);

        for email in ["not-an-email", "a@b", "a b@c.com", "@c.com", "a@@c.com", "a@c."] {
            let mut cmd = submit_cmd(bid_id, test_tender_id());
            cmd.contact.email = email.to_string();
            let err = bid.handle(&BidCommand::SubmitBid(cmd)).unwrap_err();
            assert!(
                matches!(err, DomainError::Validation(_)),
                "email '{email}' should be rejected"
            );
        }
    }

    #[test]
    fn submit_bid_rejects_bad_phone() {
        let bid_id = test_bid_id();
        let bid = Bid::empty(bid_id);

        for phone in ["12345", "98765432101", "98765abc10", ""] {
            let mut cmd = submit_cmd(bid_id, test_tender_id());
            cmd.contact.phone = phone.to_string();
            let err = bid.handle(&BidCommand::SubmitBid(cmd)).unwrap_err();
            assert!(
                matches!(err, DomainError::Validation(_)),
                "phone '{phone}' should be rejected"
            );
        }
    }

    #[test]
    fn submit_bid_rejects_missing_contact_name() {
        let bid_id = test_bid_id();
        let bid = Bid::empty(bid_id);
        let mut cmd = submit_cmd(bid_id, test_tender_id());
        cmd.contact.name = "  ".to_string();

        let err = bid.handle(&BidCommand::SubmitBid(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn accept_moves_status_to_accepted() {
        let bid_id = test_bid_id();
        let mut bid = submitted(bid_id, test_tender_id());

        let events = bid
            .handle(&BidCommand::AcceptBid(AcceptBid {
                bid_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        bid.apply(&events[0]);
        assert_eq!(bid.status(), BidStatus::Accepted);
    }

    #[test]
    fn re_accepting_an_accepted_bid_is_a_no_op() {
        let bid_id = test_bid_id();
        let mut bid = submitted(bid_id, test_tender_id());

        let accept = BidCommand::AcceptBid(AcceptBid {
            bid_id,
            occurred_at: test_time(),
        });
        let events = bid.handle(&accept).unwrap();
        bid.apply(&events[0]);
        let version = bid.version();

        let events = bid.handle(&accept).unwrap();
        assert!(events.is_empty());
        assert_eq!(bid.version(), version);
    }

    #[test]
    fn re_rejecting_a_rejected_bid_is_a_no_op() {
        let bid_id = test_bid_id();
        let mut bid = submitted(bid_id, test_tender_id());

        let reject = BidCommand::RejectBid(RejectBid {
            bid_id,
            occurred_at: test_time(),
        });
        let events = bid.handle(&reject).unwrap();
        bid.apply(&events[0]);

        let events = bid.handle(&reject).unwrap();
        assert!(events.is_empty());
        assert_eq!(bid.status(), BidStatus::Rejected);
    }

    #[test]
    fn status_can_be_overwritten_between_accepted_and_rejected() {
        let bid_id = test_bid_id();
        let mut bid = submitted(bid_id, test_tender_id());

        let events = bid
            .handle(&BidCommand::RejectBid(RejectBid {
                bid_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        bid.apply(&events[0]);
        assert_eq!(bid.status(), BidStatus::Rejected);

        let events = bid
            .handle(&BidCommand::AcceptBid(AcceptBid {
                bid_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        bid.apply(&events[0]);
        assert_eq!(bid.status(), BidStatus::Accepted);
    }

    #[test]
    fn accept_on_missing_bid_is_not_found() {
        let bid_id = test_bid_id();
        let bid = Bid::empty(bid_id);

        let err = bid
            .handle(&BidCommand::AcceptBid(AcceptBid {
                bid_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: well-formed addresses pass, whitespace anywhere fails.
            #[test]
            fn email_validator_accepts_simple_shapes(
                local in "[a-z0-9._%+-]{1,16}",
                host in "[a-z0-9-]{1,16}",
                tld in "[a-z]{2,6}",
            ) {
                let email = format!("{local}@{host}.{tld}");
                let leading_space = format!(" {email}");
                let missing_tld = format!("{local}@{host}");
                prop_assert!(is_valid_email(&email));
                prop_assert!(!is_valid_email(&leading_space));
                prop_assert!(!is_valid_email(&missing_tld));
            }

            /// Property: the phone validator accepts exactly ten digits.
            #[test]
            fn phone_validator_requires_exactly_ten_digits(digits in "[0-9]{1,14}") {
                prop_assert_eq!(is_valid_phone(&digits), digits.len() == 10);
            }

            /// Property: submitting and replaying the event preserves the bid's fields.
            #[test]
            fn submitted_bid_round_trips(
                item in "[A-Za-z][A-Za-z0-9-]{0,20}",
                price in 0u64..10_000_000,
            ) {
                let bid_id = test_bid_id();
                let tender_id = test_tender_id();
                let mut cmd = submit_cmd(bid_id, tender_id);
                cmd.lines = vec![BidLine { item_name: item.clone(), price }];

                let mut bid = Bid::empty(bid_id);
                let events = bid.handle(&BidCommand::SubmitBid(cmd)).unwrap();
                bid.apply(&events[0]);

                prop_assert_eq!(bid.tender_id(), Some(tender_id));
                prop_assert_eq!(bid.lines().len(), 1);
                prop_assert_eq!(&bid.lines()[0].item_name, &item);
                prop_assert_eq!(bid.lines()[0].price, price);
                prop_assert_eq!(bid.status(), BidStatus::Pending);
            }
        }
    }
}
