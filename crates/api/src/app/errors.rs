use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tenderdesk_infra::command_dispatcher::DispatchError;
use tenderdesk_tendering::{BidStatus, Unit};

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::InvalidTransition(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", msg)
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_unit(s: &str) -> Result<Unit, axum::response::Response> {
    s.parse::<Unit>().map_err(|e| {
        json_error(StatusCode::BAD_REQUEST, "invalid_unit", e.to_string())
    })
}

pub fn parse_bid_status(s: &str) -> Result<BidStatus, axum::response::Response> {
    match s {
        "accepted" => Ok(BidStatus::Accepted),
        "rejected" => Ok(BidStatus::Rejected),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_status",
            "status must be one of: accepted, rejected",
        )),
    }
}
