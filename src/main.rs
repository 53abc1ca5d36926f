use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

mod allocation;
mod auth;
mod config;
mod error;
mod handlers;
mod models;
mod seed;
mod services;
mod store;

use crate::config::Config;
use crate::services::{
    BulkRequestService, CatalogService, IssueRequestService, OutwardService, ReportService,
};
use crate::store::{InventoryStore, MemoryStore, PgStore};

/// Shared application state; every field is a cheap handle over the same store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InventoryStore>,
    pub catalog: CatalogService,
    pub issue_requests: IssueRequestService,
    pub bulk_requests: BulkRequestService,
    pub outward: OutwardService,
    pub reports: ReportService,
}

impl AppState {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        let issue_requests = IssueRequestService::new(store.clone());
        let bulk_requests = BulkRequestService::new(store.clone());
        Self {
            catalog: CatalogService::new(store.clone()),
            outward: OutwardService::new(store.clone(), issue_requests.clone(), bulk_requests.clone()),
            reports: ReportService::new(store.clone()),
            issue_requests,
            bulk_requests,
            store,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,board_inventory=debug")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;

    info!("Board Inventory Service starting");

    let store: Arc<dyn InventoryStore> = match &config.database_url {
        Some(url) => {
            info!("Connecting to PostgreSQL...");
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await?;
            info!("Database connection pool established.");

            info!("Running migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Migrations complete.");

            Arc::new(PgStore::new(pool))
        }
        None => {
            info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let app = build_router(AppState::new(store));

    let addr = format!("{}:{}", config.host, config.port);
    info!("Listening on http://{}", addr);
    info!("Quick-start: POST http://{}/api/seed?categories=3&boards_per_category=10", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        // ── Health ──────────────────────────────────────────────────────────
        .route("/health", get(handlers::health))

        // ── Categories ──────────────────────────────────────────────────────
        .route(
            "/api/categories",
            get(handlers::categories::list_categories).post(handlers::categories::create_category),
        )
        .route(
            "/api/categories/:id",
            get(handlers::categories::get_category)
                .put(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )

        // ── Boards ──────────────────────────────────────────────────────────
        .route(
            "/api/boards",
            get(handlers::boards::list_boards).post(handlers::boards::create_board),
        )
        .route("/api/boards/search", get(handlers::boards::search_boards))
        .route("/api/boards/preview", post(handlers::boards::preview))
        .route(
            "/api/boards/:id",
            get(handlers::boards::get_board)
                .put(handlers::boards::update_board)
                .delete(handlers::boards::delete_board),
        )

        // ── Issue requests ──────────────────────────────────────────────────
        .route(
            "/api/issue-requests",
            get(handlers::issue_requests::list_requests)
                .post(handlers::issue_requests::create_request),
        )
        .route(
            "/api/issue-requests/:id",
            put(handlers::issue_requests::decide_request)
                .delete(handlers::issue_requests::delete_request),
        )

        // ── Bulk issue requests ─────────────────────────────────────────────
        .route(
            "/api/bulk-issue-requests",
            get(handlers::bulk_requests::list_requests)
                .post(handlers::bulk_requests::create_request),
        )
        .route(
            "/api/bulk-issue-requests/:id",
            put(handlers::bulk_requests::decide_request)
                .delete(handlers::bulk_requests::delete_request),
        )

        // ── Outward ─────────────────────────────────────────────────────────
        .route("/api/outward", post(handlers::outward::outward))

        // ── Reports ─────────────────────────────────────────────────────────
        .route("/api/reports/low-stock", get(handlers::reports::low_stock))
        .route("/api/reports/under-repair", get(handlers::reports::under_repair))
        .route(
            "/api/reports/serial-history/:serial",
            get(handlers::reports::serial_history),
        )
        .route(
            "/api/reports/serial-numbers/:category_id",
            get(handlers::reports::serial_numbers),
        )
        .route("/api/dashboard/stats", get(handlers::reports::dashboard_stats))

        // ── Seed ────────────────────────────────────────────────────────────
        .route("/api/seed", post(handlers::seed_data))

        // ── Middleware ──────────────────────────────────────────────────────
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
