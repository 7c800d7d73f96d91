use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use tenderdesk_core::AggregateId;
use tenderdesk_tendering::{BidId, BidLine, ContactInfo, TenderId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Public, unauthenticated bid submission.
pub async fn submit_bid(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SubmitBidRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tender id"),
    };
    let tender_id = TenderId::new(agg);

    let lines = body
        .lines
        .into_iter()
        .map(|l| BidLine {
            item_name: l.item,
            price: l.price,
        })
        .collect();
    let contact = ContactInfo {
        name: body.contact_info.name,
        email: body.contact_info.email,
        phone: body.contact_info.phone,
    };

    match services
        .procurement
        .submit_bid(tender_id, lines, body.note, contact)
    {
        Ok(rm) => (StatusCode::CREATED, Json(dto::bid_to_json(rm))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_bids(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tender id"),
    };

    let items = services
        .procurement
        .list_bids(TenderId::new(agg))
        .into_iter()
        .map(dto::bid_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn set_bid_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetBidStatusRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid bid id"),
    };

    let status = match errors::parse_bid_status(&body.status) {
        Ok(s) => s,
        Err(response) => return response,
    };

    match services.procurement.set_bid_status(BidId::new(agg), status) {
        Ok(rm) => (StatusCode::OK, Json(dto::bid_to_json(rm))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Reject every bid of a tender except an optional keeper.
pub async fn reject_all(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RejectAllBidsRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match body.tender_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tender id"),
    };
    let tender_id = TenderId::new(agg);

    let keep = match body.keep_bid_id {
        Some(raw) => match raw.parse::<AggregateId>() {
            Ok(v) => Some(BidId::new(v)),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid bid id");
            }
        },
        None => None,
    };

    match services.procurement.reject_all_except(tender_id, keep) {
        Ok(()) => {
            let items = services
                .procurement
                .list_bids(tender_id)
                .into_iter()
                .map(dto::bid_to_json)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
