//! `tenderdesk-catalog` — the central product catalog aggregate.
//!
//! The catalog is a collaborator of the tendering core: awards reconcile
//! procured quantities back into product stock by exact name match.

pub mod product;

pub use product::{
    AdjustStock, Product, ProductCommand, ProductEvent, ProductId, RegisterProduct,
};
