//! In-process scenario tests for the command dispatcher, admin surface,
//! and canary rollout controller endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use dp_breaker::{BreakerConfig, CircuitBreaker};
use dp_canary::{CanaryController, CanaryThresholds};
use dp_daemon::{routes, state::AppState};
use dp_policy::PolicyEngine;
use dp_repository::Repository;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn make_router() -> axum::Router {
    let engine = PolicyEngine::new(Repository::new(), CircuitBreaker::new(BreakerConfig::default()));
    let canary = CanaryController::new(CanaryThresholds::default());
    routes::build_router(Arc::new(AppState::new(engine, canary)))
}

async fn call(router: axum::Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp.into_body().collect().await.expect("body collect failed").to_bytes();
    (status, body)
}

fn parse_json(b: Bytes) -> Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let router = make_router();
    let (status, body) = call(router, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "dp-daemon");
}

// ---------------------------------------------------------------------------
// Command dispatcher: ack
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acking_a_command_removes_it_from_pending_and_is_idempotent() {
    let router = make_router();
    call(
        router.clone(),
        post_json("/event", json!({"serial_number": "SN1", "event_type": "dpc.enrolled"})),
    )
    .await;

    let (_, body) = call(router.clone(), get("/commands/SN1")).await;
    let commands = parse_json(body)["commands"].as_array().unwrap().clone();
    let command_id = commands[0]["id"].as_str().unwrap().to_string();

    let (status, body) = call(router.clone(), post_json(&format!("/commands/{command_id}/ack"), Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["status"], "ok");

    let (_, body) = call(router.clone(), get("/commands/SN1")).await;
    assert!(parse_json(body)["commands"].as_array().unwrap().is_empty());

    // idempotent: acking again still succeeds.
    let (status, _) = call(router, post_json(&format!("/commands/{command_id}/ack"), Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn acking_unknown_command_returns_404() {
    let router = make_router();
    let unknown_id = "00000000-0000-0000-0000-000000000000";
    let (status, _) = call(router, post_json(&format!("/commands/{unknown_id}/ack"), Value::Null)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Admin: delete device
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_device_removes_state_audit_and_commands() {
    let router = make_router();
    call(
        router.clone(),
        post_json("/event", json!({"serial_number": "SN1", "event_type": "dpc.enrolled"})),
    )
    .await;

    let (status, body) = call(router.clone(), delete("/device/SN1")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["removed_audit_records"], 1);
    assert_eq!(json["removed_commands"], 1);

    let (status, _) = call(router.clone(), get("/policy/SN1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(router, delete("/device/SN1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Admin: list devices
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_devices_reports_total_and_sorted_serials() {
    let router = make_router();
    for serial in ["SNB", "SNA"] {
        call(
            router.clone(),
            post_json("/event", json!({"serial_number": serial, "event_type": "dpc.enrolled"})),
        )
        .await;
    }

    let (status, body) = call(router, get("/devices")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["total"], 2);
    assert_eq!(json["devices"][0]["serial"], "SNA");
    assert_eq!(json["devices"][1]["serial"], "SNB");
}

// ---------------------------------------------------------------------------
// Schema validation: serial number
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_serial_number_is_rejected_with_422() {
    let router = make_router();
    let (status, _) = call(
        router,
        post_json("/event", json!({"serial_number": "", "event_type": "dpc.enrolled"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Canary rollout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn canary_start_then_healthy_evaluate_promotes_one_stage() {
    let router = make_router();

    let (status, body) = call(router.clone(), post_json("/admin/canary/start", json!({"version": "2.0.0"}))).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["stage"], "CANARY");
    assert!(json["active"].as_bool().unwrap());

    let (status, body) = call(
        router.clone(),
        post_json("/admin/canary/evaluate", json!({"error_rate": 0.0, "heartbeat_loss_rate": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["status"], "promoted");

    let (_, body) = call(router, get("/admin/canary/status")).await;
    assert_eq!(parse_json(body)["stage"], "STAGED");
}

#[tokio::test]
async fn canary_rollback_on_high_error_rate() {
    let router = make_router();
    call(router.clone(), post_json("/admin/canary/start", json!({"version": "2.0.0"}))).await;

    let (status, body) = call(
        router.clone(),
        post_json("/admin/canary/evaluate", json!({"error_rate": 0.05, "heartbeat_loss_rate": 0.01})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["status"], "rolled_back");
    assert!(json["reason"].as_str().unwrap().contains("error rate"));

    let (_, body) = call(router, get("/admin/canary/status")).await;
    assert!(!parse_json(body)["active"].as_bool().unwrap());
}
