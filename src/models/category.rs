use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A board type (part number). Every `Board` belongs to exactly one category.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub manufacturer: String,
    pub version: String,
    pub lead_time_days: i32,
    /// Low-stock threshold, compared against the available count.
    pub minimum_stock_quantity: i32,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

// ── Request payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    pub description: Option<String>,
    pub manufacturer: String,
    pub version: String,
    #[serde(default)]
    pub lead_time_days: i32,
    #[serde(default)]
    pub minimum_stock_quantity: i32,
}

impl CreateCategory {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("name must not be empty".to_string()));
        }
        if self.lead_time_days < 0 {
            return Err(AppError::BadRequest("lead_time_days must be >= 0".to_string()));
        }
        if self.minimum_stock_quantity < 0 {
            return Err(AppError::BadRequest(
                "minimum_stock_quantity must be >= 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn into_category(self, created_by: &str) -> Category {
        Category {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            description: self.description,
            manufacturer: self.manufacturer,
            version: self.version,
            lead_time_days: self.lead_time_days,
            minimum_stock_quantity: self.minimum_stock_quantity,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        }
    }
}
