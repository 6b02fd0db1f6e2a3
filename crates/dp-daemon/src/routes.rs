//! Axum router and all HTTP handlers for dp-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use dp_canary::EvaluationResult;
use dp_policy::{ApplyOutcome, EngineError};
use dp_schemas::{validate_serial, EventPayload};
use uuid::Uuid;

use crate::api_types::{
    AckResponse, AuditResponse, CanaryEvaluateRequest, CanaryEvaluateResponse,
    CanaryStartRequest, CircuitOpenResponse, CommandsResponse, DeleteDeviceResponse,
    DeviceSummary, DevicesResponse, EmergencyUnlockQuery, EmergencyUnlockResponse, EventResponse,
    HealthResponse, InvalidTransitionResponse, NotFoundResponse, SchemaViolationResponse,
};
use crate::state::AppState;

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/event", post(post_event))
        .route("/policy/:serial", get(get_policy))
        .route("/commands/:serial", get(get_commands))
        .route("/commands/:id/ack", post(ack_command))
        .route("/audit/:serial", get(get_audit))
        .route("/device/:serial", delete(delete_device))
        .route("/devices", get(list_devices))
        .route("/admin/emergency-unlock", post(emergency_unlock))
        .route("/admin/canary/start", post(canary_start))
        .route("/admin/canary/evaluate", post(canary_evaluate))
        .route("/admin/canary/status", get(canary_status))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /event
// ---------------------------------------------------------------------------

pub(crate) async fn post_event(
    State(st): State<Arc<AppState>>,
    Json(payload): Json<EventPayload>,
) -> Response {
    if let Err(violation) = validate_serial(&payload.serial_number) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(SchemaViolationResponse {
                error: violation.to_string(),
            }),
        )
            .into_response();
    }

    match st.engine.apply_event(&payload) {
        Ok(ApplyOutcome::Transitioned {
            serial_number,
            from_state,
            to_state,
            event,
        }) => (
            StatusCode::OK,
            Json(EventResponse::Transitioned {
                serial_number,
                from_state,
                to_state,
                event,
            }),
        )
            .into_response(),
        Ok(ApplyOutcome::Duplicate { transaction_id }) => (
            StatusCode::OK,
            Json(EventResponse::Duplicate {
                transaction_id,
                message: "transaction already processed".to_string(),
            }),
        )
            .into_response(),
        Err(EngineError::InvalidTransition { from, .. }) => (
            StatusCode::CONFLICT,
            Json(InvalidTransitionResponse {
                error: "event is not valid for the device's current state".to_string(),
                from_state: from,
            }),
        )
            .into_response(),
        Err(EngineError::CircuitOpen) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(CircuitOpenResponse {
                error: "circuit breaker open: lock rate exceeded, retry later".to_string(),
            }),
        )
            .into_response(),
        Err(EngineError::NotFound) => unreachable!("apply_event never returns NotFound"),
    }
}

// ---------------------------------------------------------------------------
// GET /policy/:serial
// ---------------------------------------------------------------------------

pub(crate) async fn get_policy(
    State(st): State<Arc<AppState>>,
    Path(serial): Path<String>,
) -> Response {
    match st.engine.get_policy(&serial) {
        Ok(policy) => (StatusCode::OK, Json(policy)).into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(NotFoundResponse {
                error: format!("no recorded state for device {serial}"),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /commands/:serial
// ---------------------------------------------------------------------------

pub(crate) async fn get_commands(
    State(st): State<Arc<AppState>>,
    Path(serial): Path<String>,
) -> impl IntoResponse {
    let commands = st.engine.pending_commands(&serial);
    (
        StatusCode::OK,
        Json(CommandsResponse { serial, commands }),
    )
}

// ---------------------------------------------------------------------------
// POST /commands/:id/ack
// ---------------------------------------------------------------------------

pub(crate) async fn ack_command(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match st.engine.ack_command(id) {
        Ok((serial, command)) => (
            StatusCode::OK,
            Json(AckResponse {
                status: "ok",
                command_id: id,
                serial,
                command,
            }),
        )
            .into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(NotFoundResponse {
                error: format!("unknown command id {id}"),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /audit/:serial
// ---------------------------------------------------------------------------

pub(crate) async fn get_audit(
    State(st): State<Arc<AppState>>,
    Path(serial): Path<String>,
) -> impl IntoResponse {
    let records = st.engine.get_audit(&serial);
    (StatusCode::OK, Json(AuditResponse { serial, records }))
}

// ---------------------------------------------------------------------------
// DELETE /device/:serial
// ---------------------------------------------------------------------------

pub(crate) async fn delete_device(
    State(st): State<Arc<AppState>>,
    Path(serial): Path<String>,
) -> Response {
    match st.engine.delete_device(&serial) {
        Ok((removed_audit_records, removed_commands)) => (
            StatusCode::OK,
            Json(DeleteDeviceResponse {
                status: "ok",
                serial,
                removed_audit_records,
                removed_commands,
            }),
        )
            .into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(NotFoundResponse {
                error: format!("unknown device {serial}"),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /devices
// ---------------------------------------------------------------------------

pub(crate) async fn list_devices(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let devices: Vec<DeviceSummary> = st
        .engine
        .list_devices()
        .into_iter()
        .map(|(serial, state)| DeviceSummary { serial, state })
        .collect();
    let total = devices.len();
    (StatusCode::OK, Json(DevicesResponse { devices, total }))
}

// ---------------------------------------------------------------------------
// POST /admin/emergency-unlock
// ---------------------------------------------------------------------------

pub(crate) async fn emergency_unlock(
    State(st): State<Arc<AppState>>,
    Query(query): Query<EmergencyUnlockQuery>,
) -> impl IntoResponse {
    let reason = query.reason.unwrap_or_else(|| "unspecified".to_string());
    let result = st.engine.emergency_unlock(&reason);
    (
        StatusCode::OK,
        Json(EmergencyUnlockResponse {
            status: "ok",
            unlocked_count: result.unlocked_count,
            unlocked_devices: result.unlocked_devices,
            reason: result.reason,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /admin/canary/start
// ---------------------------------------------------------------------------

pub(crate) async fn canary_start(
    State(st): State<Arc<AppState>>,
    Json(body): Json<CanaryStartRequest>,
) -> impl IntoResponse {
    let snapshot = st.canary.lock().unwrap().start_rollout(body.version);
    (StatusCode::OK, Json(snapshot))
}

// ---------------------------------------------------------------------------
// POST /admin/canary/evaluate
// ---------------------------------------------------------------------------

pub(crate) async fn canary_evaluate(
    State(st): State<Arc<AppState>>,
    Json(body): Json<CanaryEvaluateRequest>,
) -> impl IntoResponse {
    let result = st
        .canary
        .lock()
        .unwrap()
        .evaluate_and_advance(body.error_rate, body.heartbeat_loss_rate);

    let response = match result {
        EvaluationResult::NoActiveRollout => CanaryEvaluateResponse::NoActiveRollout,
        EvaluationResult::RolledBack { reason } => CanaryEvaluateResponse::RolledBack { reason },
        EvaluationResult::Promoted { stage, percent } => {
            CanaryEvaluateResponse::Promoted { stage, percent }
        }
        EvaluationResult::GaComplete => CanaryEvaluateResponse::GaComplete,
    };

    (StatusCode::OK, Json(response))
}

// ---------------------------------------------------------------------------
// GET /admin/canary/status
// ---------------------------------------------------------------------------

pub(crate) async fn canary_status(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = st.canary.lock().unwrap().current_status();
    (StatusCode::OK, Json(snapshot))
}
