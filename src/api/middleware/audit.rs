//! Access logging middleware.
//!
//! Logs every API request with operator, method, path, status and
//! latency. Runs innermost, after the operator layer has injected
//! `OperatorContext`.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::OperatorContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let operator = req
        .extensions()
        .get::<OperatorContext>()
        .map(|o| o.operator_id.clone())
        .unwrap_or_else(|| "anonymous".into());
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        tracing::warn!(%operator, %method, %path, status, elapsed_ms, "API request failed");
    } else {
        tracing::info!(%operator, %method, %path, status, elapsed_ms, "API request");
    }

    response
}
