use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::Actor,
    error::AppResult,
    models::{CreateBulkIssueRequest, DecideRequest},
    AppState,
};

pub async fn list_requests(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let requests = state.bulk_requests.list(&actor).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "data": requests, "count": requests.len() })),
    ))
}

pub async fn create_request(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateBulkIssueRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let request = state.bulk_requests.create(&actor, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": request,
            "expected_total": request.expected_total(),
        })),
    ))
}

pub async fn decide_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecideRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let grant = actor.admin_grant()?;
    let request = state.bulk_requests.decide(&grant, id, payload.status).await?;
    Ok((StatusCode::OK, Json(json!({ "data": request }))))
}

pub async fn delete_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let grant = actor.admin_grant()?;
    state.bulk_requests.delete(&grant, id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Bulk issue request deleted", "id": id })),
    ))
}
