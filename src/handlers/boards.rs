use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::Actor,
    error::AppResult,
    models::{BoardSearch, CreateBoard, PreviewRequest, UpdateBoard},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct BoardListParams {
    pub category_id: Option<Uuid>,
}

pub async fn list_boards(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<BoardListParams>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let boards = state.catalog.list_boards(params.category_id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "data": boards, "count": boards.len() })),
    ))
}

pub async fn create_board(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateBoard>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let board = state.catalog.create_board(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": board }))))
}

pub async fn get_board(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let board = state.catalog.get_board(id).await?;
    Ok((StatusCode::OK, Json(json!({ "data": board }))))
}

pub async fn update_board(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBoard>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let board = state.catalog.update_board(&actor, id, payload).await?;
    Ok((StatusCode::OK, Json(json!({ "data": board }))))
}

pub async fn delete_board(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let grant = actor.admin_grant()?;
    state.catalog.delete_board(&grant, id).await?;
    Ok((StatusCode::OK, Json(json!({ "message": "Board deleted", "id": id }))))
}

pub async fn search_boards(
    State(state): State<AppState>,
    _actor: Actor,
    Query(search): Query<BoardSearch>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let boards = state.catalog.search_boards(&search).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "data": boards, "count": boards.len() })),
    ))
}

pub async fn preview(
    State(state): State<AppState>,
    _actor: Actor,
    Json(request): Json<PreviewRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let preview = state.catalog.preview(&request).await?;
    Ok((StatusCode::OK, Json(json!({ "data": preview }))))
}
