use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{auth::Actor, error::AppResult, models::CreateCategory, AppState};

pub async fn list_categories(
    State(state): State<AppState>,
    _actor: Actor,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let categories = state.catalog.list_categories().await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "data": categories, "count": categories.len() })),
    ))
}

pub async fn create_category(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateCategory>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let category = state.catalog.create_category(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": category }))))
}

pub async fn get_category(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let category = state.catalog.get_category(id).await?;
    Ok((StatusCode::OK, Json(json!({ "data": category }))))
}

pub async fn update_category(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCategory>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let category = state.catalog.update_category(id, payload).await?;
    Ok((StatusCode::OK, Json(json!({ "data": category }))))
}

pub async fn delete_category(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let grant = actor.admin_grant()?;
    state.catalog.delete_category(&grant, id).await?;
    Ok((StatusCode::OK, Json(json!({ "message": "Category deleted", "id": id }))))
}
