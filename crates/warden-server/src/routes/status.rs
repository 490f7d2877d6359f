use axum::{extract::State, Json};

use crate::error::AppError;
use crate::state::AppState;

/// GET /: liveness plus a summary for the approver's status line.
pub async fn get_status(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::json!({
        "status": "running",
        "pending": app.hub.pending_count(),
        "allow_all_active": app.hub.allow_all_status().active,
    })))
}
