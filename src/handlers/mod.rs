pub mod boards;
pub mod bulk_requests;
pub mod categories;
pub mod issue_requests;
pub mod outward;
pub mod reports;

use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{auth::Actor, error::AppResult, seed, AppState};

pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok", "service": "board-inventory" })))
}

// ── POST /api/seed ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SeedParams {
    pub categories: Option<usize>,
    pub boards_per_category: Option<usize>,
}

pub async fn seed_data(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<SeedParams>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let grant = actor.admin_grant()?;
    let categories = params.categories.unwrap_or(3).min(50);
    let boards_per_category = params.boards_per_category.unwrap_or(10).min(500);

    let start = Instant::now();
    let summary = seed::seed_inventory(
        state.store.as_ref(),
        categories,
        boards_per_category,
        grant.email(),
    )
    .await?;
    let elapsed = start.elapsed();

    info!(
        categories = summary.categories.len(),
        boards = summary.boards_created,
        seed_ms = elapsed.as_millis(),
        "Seeding complete"
    );

    Ok((
        StatusCode::OK,
        Json(json!({
            "data": summary,
            "seed_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}
