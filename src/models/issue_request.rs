use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Issued,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Issued => "issued",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// `pending → approved → issued`, `pending → rejected`.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::Approved, RequestStatus::Issued)
        )
    }

    pub fn ensure_transition(self, next: RequestStatus) -> AppResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for one board of a category, optionally a specific serial.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IssueRequest {
    pub id: Uuid,
    pub category_id: Uuid,
    /// `None` means "any available board"; back-filled on issuance.
    pub serial_number: Option<String>,
    pub requested_by: String,
    pub issued_to: String,
    pub project_number: String,
    pub comments: Option<String>,
    pub status: RequestStatus,
    pub approved_by: Option<String>,
    pub approved_date_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ── Request payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateIssueRequest {
    pub category_id: Uuid,
    pub serial_number: Option<String>,
    pub issued_to: String,
    pub project_number: String,
    pub comments: Option<String>,
}

impl CreateIssueRequest {
    /// Blank serials are treated as "any available board".
    pub fn requested_serial(&self) -> Option<&str> {
        self.serial_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Admin decision on a pending request (single or bulk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecideRequest {
    pub status: Decision,
}
