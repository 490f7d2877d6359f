use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use warden_core::correlation::{Lookup, RecordOutcome};
use warden_core::hub::Admission;
use warden_core::error::WardenError;
use warden_core::types::{ActionParams, ActionType, Decision, DecisionKind, DecisionWire, NewAction};

use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Enqueue
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RequestBody {
    pub id: Option<String>,
    pub action_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confidence: f64,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub params: Option<ActionParams>,
}

impl RequestBody {
    fn into_action(self) -> Result<(NewAction, Option<String>), AppError> {
        let action_type: ActionType = self.action_type.parse()?;
        let mut action = NewAction::new(action_type, self.description, self.confidence);
        match (self.x, self.y) {
            (Some(x), Some(y)) => action = action.with_target(x, y),
            (None, None) => {}
            (x, y) => {
                return Err(WardenError::InvalidTarget(format!(
                    "x and y must be sent together (x: {x:?}, y: {y:?})"
                ))
                .into())
            }
        }
        if let Some(params) = self.params {
            action = action.with_params(params);
        }
        Ok((action, self.id))
    }
}

/// POST /permission/request: submit an action for approval.
///
/// Skip-listed types and requests made while the override window is open are
/// answered immediately and never appear in the pending list.
pub async fn request_permission(
    State(app): State<AppState>,
    Json(body): Json<RequestBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (action, id) = body.into_action()?;
    let admission = app.hub.admit(action, id)?;
    let id = match &admission {
        Admission::Queued(id) => Some(id.clone()),
        Admission::AutoSkip | Admission::AutoAllow => None,
    };
    Ok(Json(serde_json::json!({
        "id": id,
        "status": admission.status(),
    })))
}

// ---------------------------------------------------------------------------
// Pending
// ---------------------------------------------------------------------------

/// GET /permission/pending: undecided requests, oldest first.
pub async fn list_pending(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let pending = app.hub.list_pending();
    Ok(Json(serde_json::to_value(pending)?))
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ResultBody {
    pub id: String,
    pub decision: String,
    pub edit_payload: Option<ActionParams>,
}

/// POST /permission/result: record a decision. A repeat decision for the
/// same id is accepted and ignored.
pub async fn post_result(
    State(app): State<AppState>,
    Json(body): Json<ResultBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let kind: DecisionKind = body.decision.parse()?;
    let decision = Decision::from_parts(kind, body.edit_payload)?;
    let (stored, duplicate) = match app.hub.record(&body.id, decision.clone())? {
        RecordOutcome::Recorded => (decision, false),
        RecordOutcome::AlreadyDecided(existing) => (existing, true),
    };
    Ok(Json(serde_json::json!({
        "status": "ok",
        "id": body.id,
        "decision": stored.kind().as_str(),
        "duplicate": duplicate,
    })))
}

/// GET /permission/result/{id}: current decision without consuming it.
pub async fn get_result(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body = match app.hub.lookup(&id) {
        Lookup::Pending => serde_json::json!({ "id": id, "decision": "pending" }),
        Lookup::NotFound => serde_json::json!({ "id": id, "decision": "not_found" }),
        Lookup::Decided(decision) => {
            let wire = DecisionWire::from(decision);
            let mut v = serde_json::to_value(wire)?;
            v["id"] = serde_json::Value::String(id);
            v
        }
    };
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct FinishBody {
    pub id: String,
}

/// POST /permission/finish: withdraw a request whose requester stopped
/// waiting. A decision that landed first is returned; otherwise `stop`.
/// Later decisions for the id are rejected as unknown.
pub async fn finish_request(
    State(app): State<AppState>,
    Json(body): Json<FinishBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let decision = match app.hub.finish(&body.id) {
        Some(decision) => decision,
        None => {
            tracing::info!(id = %body.id, "request withdrawn undecided");
            Decision::Stop
        }
    };
    let mut v = serde_json::to_value(DecisionWire::from(decision))?;
    v["id"] = serde_json::Value::String(body.id);
    Ok(Json(v))
}

// ---------------------------------------------------------------------------
// Override window
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct AllowAllBody {
    pub duration_minutes: u64,
}

/// POST /permission/set_allow_all: open the override window; 0 revokes.
pub async fn set_allow_all(
    State(app): State<AppState>,
    Json(body): Json<AllowAllBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = app.hub.set_allow_all(body.duration_minutes);
    Ok(Json(serde_json::json!({
        "status": "ok",
        "active": status.active,
        "expires_at": status.expires_at,
        "duration_minutes": body.duration_minutes,
        "time_remaining_seconds": status.time_remaining_seconds,
    })))
}

/// GET /permission/allow_all_status
pub async fn allow_all_status(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::to_value(app.hub.allow_all_status())?))
}

// ---------------------------------------------------------------------------
// Skip set
// ---------------------------------------------------------------------------

/// GET /permission/skip_types
pub async fn get_skip_types(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::json!({ "skip_types": app.hub.skip_types() })))
}

#[derive(Deserialize)]
pub struct SkipBody {
    pub action_type: String,
    pub skip: bool,
}

/// POST /permission/skip_types: add or remove one action type.
pub async fn set_skip_type(
    State(app): State<AppState>,
    Json(body): Json<SkipBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let action_type: ActionType = body.action_type.parse()?;
    let changed = app.hub.set_skip(action_type, body.skip);
    Ok(Json(serde_json::json!({
        "status": "ok",
        "changed": changed,
        "skip_types": app.hub.skip_types(),
    })))
}
