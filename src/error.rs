use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

/// One category entry that could not be satisfied while creating a bulk request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntryFailure {
    pub category_id: Uuid,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    // ── Allocation / lifecycle ──────────────────────────────────────────────
    #[error("Category {0} not found")]
    CategoryNotFound(Uuid),

    #[error("Board {serial_number} is not available")]
    BoardUnavailable { serial_number: String },

    #[error(
        "Not enough boards available in category {category_id}. \
         Requested: {requested}, Available: {available}"
    )]
    InsufficientStock {
        category_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Invalid request: {0}")]
    InvalidRequestShape(String),

    #[error("Request {0} is not approved")]
    NotApprovedYet(Uuid),

    #[error("Request cannot move from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Bulk request failed for {} categor(y/ies)", failures.len())]
    BulkCreationFailed { failures: Vec<EntryFailure> },

    #[error("Request {0} is already being issued")]
    IssuanceInProgress(Uuid),

    // ── Identity ────────────────────────────────────────────────────────────
    #[error("Missing caller identity")]
    Unauthenticated,

    #[error("Permission denied: {0}")]
    Unauthorized(String),

    // ── Catalog ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    NotFound(String),

    #[error("Category name '{0}' already exists")]
    CategoryNameTaken(String),

    #[error("Serial number '{0}' already exists in this category")]
    DuplicateSerial(String),

    #[error("Category {0} still has boards")]
    CategoryInUse(Uuid),

    #[error("{0}")]
    BadRequest(String),

    // ── Infrastructure ──────────────────────────────────────────────────────
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::CategoryNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BoardUnavailable { .. }
            | AppError::InsufficientStock { .. }
            | AppError::InvalidRequestShape(_)
            | AppError::NotApprovedYet(_)
            | AppError::BulkCreationFailed { .. }
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTransition { .. }
            | AppError::IssuanceInProgress(_)
            | AppError::CategoryNameTaken(_)
            | AppError::DuplicateSerial(_)
            | AppError::CategoryInUse(_) => StatusCode::CONFLICT,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Database(_) => {
                tracing::error!(error = %self, "Internal server error");
                json!({ "error": "An unexpected error occurred" })
            }
            AppError::BulkCreationFailed { failures } => json!({
                "error": self.to_string(),
                "failed_categories": failures,
            }),
            AppError::InsufficientStock {
                category_id,
                requested,
                available,
            } => json!({
                "error": self.to_string(),
                "category_id": category_id,
                "requested": requested,
                "available": available,
            }),
            AppError::BoardUnavailable { serial_number } => json!({
                "error": self.to_string(),
                "serial_number": serial_number,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
