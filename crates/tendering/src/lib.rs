//! `tenderdesk-tendering` — tender and bid write models.
//!
//! A tender is a published request for material items, open for bidding while
//! `active`. Bids reference their tender but live in their own streams; the
//! cross-aggregate award protocol is orchestrated in the infrastructure layer.

pub mod bid;
pub mod tender;

pub use bid::{
    AcceptBid, Bid, BidCommand, BidEvent, BidId, BidLine, BidStatus, ContactInfo, RejectBid,
    SubmitBid,
};
pub use tender::{
    AwardTender, CloseTender, OpenTender, Tender, TenderCommand, TenderEvent, TenderId,
    TenderItem, TenderStatus, Unit,
};
