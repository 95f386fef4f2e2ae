//! Router-level tests driving handlers through `tower::ServiceExt::oneshot`
//! without binding a real socket.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sentinel_core::Sentinel;
use sentinel_server::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn root_and_health_report_operational() {
    let state = AppState::new(Sentinel::for_tests());
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["remediation"]["detail"], "simulated orchestrator");
}

#[tokio::test]
async fn webhook_processes_event_and_read_api_finds_it() {
    let state = AppState::new(Sentinel::for_tests());
    let app = build_router(state);

    let event = json!({
        "priority": "Critical",
        "output": "bash -i reverse shell via nc -e /bin/sh",
        "rule": "shell",
        "output_fields": {"k8s.pod.name": "evil-pod"}
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/falco/webhook")
        .header("content-type", "application/json")
        .body(Body::from(event.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "processed");
    let threat_id = body["threat_id"].as_str().unwrap().to_string();
    assert_eq!(body["severity"], "high");
    assert_eq!(body["action"], "terminate_pod");

    let request = Request::builder()
        .uri(format!("/api/v1/threats/{threat_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .uri("/api/v1/threats?severity=high")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/threats/{threat_id}/resolve"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "resolved");
}

#[tokio::test]
async fn unknown_threat_id_is_404() {
    let state = AppState::new(Sentinel::for_tests());
    let app = build_router(state);

    let request = Request::builder()
        .uri(format!("/api/v1/threats/{}", sentinel_model::Id::new()))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_envelope_webhook_reports_null_threat() {
    let state = AppState::new(Sentinel::for_tests());
    let app = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/falco/webhook")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["threat"], Value::Null);
}

#[tokio::test]
async fn explain_unknown_threat_is_404() {
    let state = AppState::new(Sentinel::for_tests());
    let app = build_router(state);

    let request = Request::builder()
        .uri(format!("/api/v1/explain/{}", sentinel_model::Id::new()))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
