//! Request DTOs and read-model → JSON mapping.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use tenderdesk_infra::projections::{
    BidReadModel, ProductReadModel, StoreReadModel, TenderReadModel,
};

#[derive(Debug, Deserialize)]
pub struct TenderItemRequest {
    pub name: String,
    pub quantity: i64,
    pub unit: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTenderRequest {
    pub title: String,
    pub description: String,
    pub items: Vec<TenderItemRequest>,
    pub store: String,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct BidLineRequest {
    pub item: String,
    /// Quoted price in the smallest currency unit.
    pub price: u64,
}

#[derive(Debug, Deserialize)]
pub struct ContactInfoRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBidRequest {
    pub lines: Vec<BidLineRequest>,
    pub note: Option<String>,
    pub contact_info: ContactInfoRequest,
}

#[derive(Debug, Deserialize)]
pub struct AwardItemRequest {
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct AwardTenderRequest {
    pub winning_bid_id: String,
    pub items: Vec<AwardItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct SetBidStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectAllBidsRequest {
    pub tender_id: String,
    pub keep_bid_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    pub name: String,
    pub stock: i64,
}

pub fn tender_to_json(rm: TenderReadModel) -> serde_json::Value {
    json!({
        "id": rm.tender_id.to_string(),
        "title": rm.title,
        "description": rm.description,
        "items": rm.items.iter().map(|i| json!({
            "name": i.name,
            "quantity": i.quantity,
            "unit": i.unit.as_str(),
        })).collect::<Vec<_>>(),
        "store": rm.store_name,
        "status": rm.status.as_str(),
        "deadline": rm.deadline,
        "created_by": rm.created_by.to_string(),
        "opened_at": rm.opened_at,
        "winning_bid_id": rm.winning_bid_id.map(|id| id.to_string()),
    })
}

pub fn bid_to_json(rm: BidReadModel) -> serde_json::Value {
    json!({
        "id": rm.bid_id.to_string(),
        "tender_id": rm.tender_id.to_string(),
        "contact_info": {
            "name": rm.contact.name,
            "email": rm.contact.email,
            "phone": rm.contact.phone,
        },
        "lines": rm.lines.iter().map(|l| json!({
            "item": l.item_name,
            "price": l.price,
        })).collect::<Vec<_>>(),
        "note": rm.note,
        "status": rm.status.as_str(),
        "submitted_at": rm.submitted_at,
    })
}

pub fn product_to_json(rm: ProductReadModel) -> serde_json::Value {
    json!({
        "id": rm.product_id.to_string(),
        "name": rm.name,
        "stock": rm.stock,
    })
}

pub fn store_to_json(rm: StoreReadModel) -> serde_json::Value {
    json!({
        "id": rm.store_id.to_string(),
        "name": rm.name,
        "items": rm.items.iter().map(|i| json!({
            "name": i.name,
            "quantity": i.quantity,
        })).collect::<Vec<_>>(),
    })
}
