//! Operator identity middleware.
//!
//! Authentication happens upstream. The identity provider forwards the
//! signed-in doctor as `X-Operator-Id` (and optionally `X-Operator-Name`);
//! this layer turns those headers into an `OperatorContext`.

use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::OperatorContext;

pub const OPERATOR_ID_HEADER: &str = "X-Operator-Id";
pub const OPERATOR_NAME_HEADER: &str = "X-Operator-Name";

/// Require an operator identity on every request.
pub async fn require_operator(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_operator_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_operator_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let operator = operator_from_headers(req.headers()).ok_or(ApiError::Unauthorized)?;
    req.extensions_mut().insert(operator);
    Ok(next.run(req).await)
}

fn operator_from_headers(headers: &HeaderMap) -> Option<OperatorContext> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    };

    Some(OperatorContext {
        operator_id: header(OPERATOR_ID_HEADER)?,
        operator_name: header(OPERATOR_NAME_HEADER),
    })
}
