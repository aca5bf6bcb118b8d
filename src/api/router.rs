//! API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. `Cache-Control: no-store` on every response
//! 2. Operator identity → 3. Access log

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Everything except `/api/health` requires an operator identity.
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route(
            "/profile",
            get(endpoints::profile::get).put(endpoints::profile::update),
        )
        .route(
            "/patients",
            post(endpoints::patients::register).get(endpoints::patients::search),
        )
        .route("/patients/:id", get(endpoints::patients::detail))
        .route(
            "/draft",
            get(endpoints::drafts::get).delete(endpoints::drafts::discard),
        )
        .route("/draft/actions", post(endpoints::drafts::apply))
        .route("/draft/preview", get(endpoints::drafts::preview))
        .route("/draft/submit", post(endpoints::drafts::submit))
        .route("/prescriptions", get(endpoints::prescriptions::list))
        .route("/prescriptions/:id", get(endpoints::prescriptions::detail))
        .route(
            "/prescriptions/:id/preview",
            get(endpoints::prescriptions::preview),
        )
        .route(
            "/prescriptions/:id/document",
            get(endpoints::prescriptions::document),
        )
        .route(
            "/appointments",
            post(endpoints::appointments::book).get(endpoints::appointments::list),
        )
        .route(
            "/appointments/:id/status",
            post(endpoints::appointments::set_status),
        )
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::operator::require_operator));

    let open = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::audit::log_access));

    Router::new()
        .nest("/api", protected)
        .nest("/api", open)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::core_state::tests::test_state;

    fn test_app() -> (Router, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(test_state(tmp.path()));
        (api_router(core), tmp)
    }

    fn make_request(method: &str, uri: &str, operator: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(op) = operator {
            builder = builder
                .header("X-Operator-Id", op)
                .header("X-Operator-Name", "Anil Mehta");
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register_patient(app: &Router, phone: &str) -> String {
        let response = send(
            app,
            make_request(
                "POST",
                "/api/patients",
                Some("doc-1"),
                Some(json!({"name": "Asha Rao", "age": 34, "gender": "F", "phone": phone})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["id"].as_str().unwrap().to_string()
    }

    async fn act(app: &Router, action: Value) -> Value {
        let response = send(app, make_request("POST", "/api/draft/actions", Some("doc-1"), Some(action))).await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await
    }

    #[tokio::test]
    async fn health_is_open_and_not_cached() {
        let (app, _tmp) = test_app();
        let response = send(&app, make_request("GET", "/api/health", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["delivery_enabled"], false);
    }

    #[tokio::test]
    async fn operator_header_required() {
        let (app, _tmp) = test_app();
        let response = send(&app, make_request("GET", "/api/draft", None, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (app, _tmp) = test_app();
        let response = send(&app, make_request("GET", "/api/nonexistent", Some("doc-1"), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wizard_to_submitted_prescription() {
        let (app, _tmp) = test_app();
        let patient_id = register_patient(&app, "98765 43210").await;

        act(&app, json!({"type": "set_patient", "patient_id": patient_id})).await;
        let added = act(
            &app,
            json!({"type": "add_symptom", "name": "Cough", "frequency": "Often", "severity": "Mild", "duration": "3 days"}),
        )
        .await;
        assert_eq!(added["effect"]["kind"], "added");
        assert_eq!(added["ready"], false);
        act(
            &app,
            json!({"type": "add_medicine", "name": "Paracetamol", "dosage": "500mg", "route": "Oral",
                   "times_per_day": "3", "duration_days": "5", "timing": "After Food"}),
        )
        .await;
        let ready = act(
            &app,
            json!({"type": "set_vitals", "vitals": {"temperature": "99.1F", "blood_pressure": "120/80", "pulse": "78"}}),
        )
        .await;
        assert_eq!(ready["ready"], true);

        let response = send(&app, make_request("GET", "/api/draft/preview", Some("doc-1"), None)).await;
        let preview = json_body(response).await;
        assert_eq!(preview["patient"], "Asha Rao (34, F)");
        assert_eq!(preview["medicines"]["rows"][0][1], "Paracetamol");

        let response = send(
            &app,
            make_request("POST", "/api/draft/submit", Some("doc-1"), Some(json!({"deliver": true}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let outcome = json_body(response).await;
        let rx_id = outcome["record"]["prescription_id"].as_str().unwrap().to_string();
        assert!(outcome["record"]["storage_id"].is_string());
        // No relay configured.
        assert_eq!(outcome["delivery"]["status"], "skipped");

        let draft = json_body(send(&app, make_request("GET", "/api/draft", Some("doc-1"), None)).await).await;
        assert!(draft["draft"]["patient_id"].is_null());
        assert_eq!(draft["draft"]["symptoms"].as_array().unwrap().len(), 0);

        let uri = format!("/api/prescriptions?patient_id={patient_id}");
        let history = json_body(send(&app, make_request("GET", &uri, Some("doc-1"), None)).await).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["prescription_id"], rx_id.as_str());

        let uri = format!("/api/prescriptions/{rx_id}/document");
        let response = send(&app, make_request("GET", &uri, Some("doc-1"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Content-Type").unwrap(), "application/pdf");
        let pdf = to_bytes(response.into_body(), 10 * 1024 * 1024).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));

        let uri = format!("/api/prescriptions/{rx_id}/preview");
        let preview = json_body(send(&app, make_request("GET", &uri, Some("doc-1"), None)).await).await;
        assert_eq!(preview["symptoms"]["rows"][0][1], "Cough");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn draft_reads_do_not_wait_for_delivery() {
        use std::time::{Duration, Instant};

        use crate::core_state::tests::test_state_with_relay;
        use crate::delivery::{MessageRelay, MockRelay};

        let tmp = tempfile::tempdir().unwrap();
        let delay = Duration::from_secs(3);
        let relay = Arc::new(MockRelay::new().with_delay(delay));
        let core = Arc::new(test_state_with_relay(tmp.path(), Some(relay.clone() as Arc<dyn MessageRelay>)));
        let app = api_router(core);

        let patient_id = register_patient(&app, "98765 43210").await;
        act(&app, json!({"type": "set_patient", "patient_id": patient_id})).await;
        act(&app, json!({"type": "add_symptom", "name": "Cough", "frequency": "Often", "severity": "Mild", "duration": "3 days"})).await;
        act(
            &app,
            json!({"type": "add_medicine", "name": "Paracetamol", "dosage": "500mg", "route": "Oral",
                   "times_per_day": "3", "duration_days": "5", "timing": "After Food"}),
        )
        .await;
        act(&app, json!({"type": "set_vitals", "vitals": {"temperature": "99.1F", "blood_pressure": "120/80", "pulse": "78"}})).await;

        let started = Instant::now();
        let submit_app = app.clone();
        let submit = tokio::spawn(async move {
            let request =
                make_request("POST", "/api/draft/submit", Some("doc-1"), Some(json!({"deliver": true})));
            json_body(send(&submit_app, request).await).await
        });

        // The draft is cleared as soon as the record is saved, long before
        // the relay answers.
        loop {
            let read = tokio::time::timeout(
                Duration::from_millis(500),
                send(&app, make_request("GET", "/api/draft", Some("doc-1"), None)),
            )
            .await
            .expect("draft read blocked behind submission");
            let view = json_body(read).await;
            if view["draft"]["patient_id"].is_null() {
                break;
            }
            assert!(started.elapsed() < delay, "draft never cleared before delivery finished");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(started.elapsed() < delay);
        assert!(relay.sent().is_empty());

        let outcome = submit.await.unwrap();
        assert_eq!(outcome["delivery"]["status"], "sent");
        assert!(started.elapsed() >= delay);
        assert_eq!(relay.sent()[0].0, "919876543210");
    }

    #[tokio::test]
    async fn submit_without_vitals_is_rejected_and_draft_kept() {
        let (app, _tmp) = test_app();
        let patient_id = register_patient(&app, "98765 43210").await;
        act(&app, json!({"type": "set_patient", "patient_id": patient_id})).await;
        act(&app, json!({"type": "set_vitals", "vitals": {"temperature": "98.6F", "blood_pressure": "", "pulse": "72"}})).await;

        let response = send(
            &app,
            make_request("POST", "/api/draft/submit", Some("doc-1"), Some(json!({}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert_eq!(json["error"]["message"], "Missing mandatory vitals: blood_pressure");

        let draft = json_body(send(&app, make_request("GET", "/api/draft", Some("doc-1"), None)).await).await;
        assert_eq!(draft["draft"]["patient_id"], patient_id.as_str());
    }

    #[tokio::test]
    async fn unknown_prescription_is_404() {
        let (app, _tmp) = test_app();
        let response = send(&app, make_request("GET", "/api/prescriptions/RX-NOPE", Some("doc-1"), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_update_changes_footer() {
        let (app, _tmp) = test_app();
        let before = json_body(send(&app, make_request("GET", "/api/profile", Some("doc-1"), None)).await).await;
        assert!(before["profile"].is_null());
        assert_eq!(before["footer"], "Dr. Attending Physician | Not specified | Reg. No: Not specified");

        let response = send(
            &app,
            make_request(
                "PUT",
                "/api/profile",
                Some("doc-1"),
                Some(json!({"name": "Anil Mehta", "specialty": "General Physician", "license_number": "KMC-12345"})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let after = json_body(send(&app, make_request("GET", "/api/profile", Some("doc-1"), None)).await).await;
        assert_eq!(after["footer"], "Dr. Anil Mehta | General Physician | Reg. No: KMC-12345");
    }

    #[tokio::test]
    async fn appointment_booking_and_status() {
        let (app, _tmp) = test_app();
        let patient_id = register_patient(&app, "98765 43210").await;

        let response = send(
            &app,
            make_request(
                "POST",
                "/api/appointments",
                Some("doc-1"),
                Some(json!({"patient_id": patient_id, "scheduled_for": "2026-03-10T09:30:00", "reason": "Follow-up"})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        let uri = format!("/api/appointments/{id}/status");
        let response = send(&app, make_request("POST", &uri, Some("doc-1"), Some(json!({"status": "Completed"})))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, make_request("POST", &uri, Some("doc-1"), Some(json!({"status": "lost"})))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let done = json_body(
            send(&app, make_request("GET", "/api/appointments?status=completed", Some("doc-1"), None)).await,
        )
        .await;
        assert_eq!(done.as_array().unwrap().len(), 1);

        let theirs = json_body(send(&app, make_request("GET", "/api/appointments", Some("doc-2"), None)).await).await;
        assert!(theirs.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn patient_search_and_blank_name() {
        let (app, _tmp) = test_app();
        register_patient(&app, "98765 43210").await;

        let found = json_body(send(&app, make_request("GET", "/api/patients?q=asha", Some("doc-1"), None)).await).await;
        assert_eq!(found.as_array().unwrap().len(), 1);

        let response = send(
            &app,
            make_request("POST", "/api/patients", Some("doc-1"), Some(json!({"name": "  "}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
