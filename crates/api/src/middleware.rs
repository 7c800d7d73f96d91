use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use tenderdesk_core::AdminId;

use crate::context::AdminContext;

/// Require an authenticated admin identity on the request.
///
/// The external auth collaborator terminates authentication upstream and
/// forwards the admin's opaque id in `x-admin-id`; admin routes only insist
/// the header is present and well-formed.
pub async fn admin_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let admin_id = extract_admin_id(req.headers())?;

    req.extensions_mut().insert(AdminContext::new(admin_id));

    Ok(next.run(req).await)
}

fn extract_admin_id(headers: &HeaderMap) -> Result<AdminId, StatusCode> {
    let header = headers.get("x-admin-id").ok_or(StatusCode::UNAUTHORIZED)?;

    let value = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    value
        .trim()
        .parse::<AdminId>()
        .map_err(|_| StatusCode::UNAUTHORIZED)
}
