use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use tenderdesk_core::AggregateId;
use tenderdesk_infra::procurement::NewTender;
use tenderdesk_infra::reconcile::AwardItem;
use tenderdesk_tendering::{BidId, TenderId, TenderItem};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::AdminContext;

pub async fn create_tender(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<AdminContext>,
    Json(body): Json<dto::CreateTenderRequest>,
) -> axum::response::Response {
    let mut items = Vec::with_capacity(body.items.len());
    for item in body.items {
        let unit = match errors::parse_unit(&item.unit) {
            Ok(u) => u,
            Err(response) => return response,
        };
        items.push(TenderItem {
            name: item.name,
            quantity: item.quantity,
            unit,
        });
    }

    let tender = match services.procurement.open_tender(NewTender {
        title: body.title,
        description: body.description,
        items,
        store_name: body.store,
        deadline: body.deadline,
        created_by: admin.admin_id(),
    }) {
        Ok(rm) => rm,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (StatusCode::CREATED, Json(dto::tender_to_json(tender))).into_response()
}

pub async fn list_tenders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items = services
        .procurement
        .list_tenders()
        .into_iter()
        .map(dto::tender_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_tender(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tender id"),
    };

    match services.procurement.get_tender(TenderId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::tender_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "tender not found"),
    }
}

pub async fn close_tender(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tender id"),
    };

    match services.procurement.close_tender(TenderId::new(agg)) {
        Ok(rm) => (StatusCode::OK, Json(dto::tender_to_json(rm))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn award_tender(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AwardTenderRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tender id"),
    };
    let tender_id = TenderId::new(agg);

    let bid_agg: AggregateId = match body.winning_bid_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid bid id"),
    };
    let winning_bid_id = BidId::new(bid_agg);

    let items: Vec<AwardItem> = body
        .items
        .into_iter()
        .map(|i| AwardItem {
            name: i.name,
            quantity: i.quantity,
        })
        .collect();

    let outcome = match services
        .procurement
        .award_tender(tender_id, winning_bid_id, &items)
    {
        Ok(outcome) => outcome,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let tender = match services.procurement.get_tender(tender_id) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "tender not found"),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "tender": dto::tender_to_json(tender),
            "winning_bid_id": outcome.winning_bid_id.to_string(),
            "unresolved_items": outcome.unresolved_items,
        })),
    )
        .into_response()
}
