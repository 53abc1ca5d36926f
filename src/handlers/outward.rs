use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

use crate::{auth::Actor, error::AppResult, services::outward::OutwardRequest, AppState};

// ── POST /api/outward ─────────────────────────────────────────────────────────

pub async fn outward(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<OutwardRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let grant = actor.issue_grant()?;
    let outcome = state.outward.outward(&grant, &payload).await?;
    Ok((StatusCode::OK, Json(json!({ "data": outcome }))))
}
