use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::admin::AdminState;
use crate::auth::BEARER_PREFIX;

/// Rejects requests without the configured admin bearer key.
///
/// The key is read from the current snapshot, so a reload can rotate it.
pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let snapshot = state.gateway.controller().current();
    let expected = snapshot.config.admin.api_key.as_bytes();

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX));

    match presented {
        Some(key) if bool::from(key.as_bytes().ct_eq(expected)) => {
            drop(snapshot);
            Ok(next.run(request).await)
        }
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
