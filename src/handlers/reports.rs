use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{auth::Actor, error::AppResult, AppState};

pub async fn low_stock(
    State(state): State<AppState>,
    _actor: Actor,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let items = state.reports.low_stock().await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "data": items, "count": items.len() })),
    ))
}

pub async fn under_repair(
    State(state): State<AppState>,
    _actor: Actor,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let boards = state.reports.under_repair().await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "data": boards, "count": boards.len() })),
    ))
}

pub async fn serial_history(
    State(state): State<AppState>,
    _actor: Actor,
    Path(serial): Path<String>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let history = state.reports.serial_history(&serial).await?;
    Ok((StatusCode::OK, Json(json!({ "data": history }))))
}

pub async fn serial_numbers(
    State(state): State<AppState>,
    _actor: Actor,
    Path(category_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let listing = state.reports.serial_numbers(category_id).await?;
    Ok((StatusCode::OK, Json(json!({ "data": listing }))))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    _actor: Actor,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let stats = state.reports.dashboard().await?;
    Ok((StatusCode::OK, Json(json!({ "data": stats }))))
}
