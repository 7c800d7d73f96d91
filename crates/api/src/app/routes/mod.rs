pub mod bids;
pub mod catalog;
pub mod stores;
pub mod tenders;
