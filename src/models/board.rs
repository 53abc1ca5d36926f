use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::allocation::availability::{self, CONDITION_NEW};
use crate::error::{AppError, AppResult};

/// Physical whereabouts of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "board_location")]
pub enum BoardLocation {
    #[serde(rename = "In stock")]
    #[sqlx(rename = "In stock")]
    InStock,
    #[serde(rename = "Issued for machine")]
    #[sqlx(rename = "Issued for machine")]
    IssuedForMachine,
    #[serde(rename = "Repairing")]
    #[sqlx(rename = "Repairing")]
    Repairing,
    #[serde(rename = "Issued for spares")]
    #[sqlx(rename = "Issued for spares")]
    IssuedForSpares,
    #[serde(rename = "At customer site")]
    #[sqlx(rename = "At customer site")]
    AtCustomerSite,
}

impl BoardLocation {
    pub const ALL: [BoardLocation; 5] = [
        BoardLocation::InStock,
        BoardLocation::IssuedForMachine,
        BoardLocation::Repairing,
        BoardLocation::IssuedForSpares,
        BoardLocation::AtCustomerSite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoardLocation::InStock => "In stock",
            BoardLocation::IssuedForMachine => "Issued for machine",
            BoardLocation::Repairing => "Repairing",
            BoardLocation::IssuedForSpares => "Issued for spares",
            BoardLocation::AtCustomerSite => "At customer site",
        }
    }
}

impl fmt::Display for BoardLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single serialised board. `(category_id, serial_number)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Board {
    pub id: Uuid,
    pub category_id: Uuid,
    pub serial_number: String,
    pub location: BoardLocation,
    /// Free-form; `New`, `Repaired`, `Needs repair` and `Scrap` are the usual values.
    pub condition: String,
    pub issued_by: Option<String>,
    pub issued_to: Option<String>,
    pub qc_by: Option<String>,
    pub project_number: Option<String>,
    pub comments: Option<String>,
    pub inward_date_time: DateTime<Utc>,
    pub issued_date_time: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Board {
    pub fn is_available(&self) -> bool {
        availability::is_available(self.location, &self.condition)
    }

    /// Apply every `Some` field of `patch` in place.
    pub fn apply(&mut self, patch: &BoardPatch) {
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(condition) = &patch.condition {
            self.condition = condition.clone();
        }
        if let Some(issued_by) = &patch.issued_by {
            self.issued_by = Some(issued_by.clone());
        }
        if let Some(issued_to) = &patch.issued_to {
            self.issued_to = Some(issued_to.clone());
        }
        if let Some(project_number) = &patch.project_number {
            self.project_number = Some(project_number.clone());
        }
        if let Some(comments) = &patch.comments {
            self.comments = Some(comments.clone());
        }
        if let Some(at) = patch.issued_date_time {
            self.issued_date_time = Some(at);
        }
    }
}

/// Field changes applied to a board; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardPatch {
    pub location: Option<BoardLocation>,
    pub condition: Option<String>,
    pub issued_by: Option<String>,
    pub issued_to: Option<String>,
    pub project_number: Option<String>,
    pub comments: Option<String>,
    pub issued_date_time: Option<DateTime<Utc>>,
}

/// Who receives a board when it is claimed by an issuance.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueTarget {
    pub issued_by: String,
    pub issued_to: String,
    pub project_number: String,
    pub comments: String,
}

impl IssueTarget {
    /// The claim mutation: move to `Issued for machine` and stamp the recipient.
    pub fn claim_patch(&self) -> BoardPatch {
        BoardPatch {
            location: Some(BoardLocation::IssuedForMachine),
            condition: None,
            issued_by: Some(self.issued_by.clone()),
            issued_to: Some(self.issued_to.clone()),
            project_number: Some(self.project_number.clone()),
            comments: Some(self.comments.clone()),
            issued_date_time: Some(Utc::now()),
        }
    }
}

// ── Request payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBoard {
    pub category_id: Uuid,
    pub serial_number: String,
    pub location: Option<BoardLocation>,
    pub condition: Option<String>,
    pub qc_by: Option<String>,
    pub comments: Option<String>,
}

impl CreateBoard {
    pub fn into_board(self, created_by: &str) -> AppResult<Board> {
        let serial_number = self.serial_number.trim().to_string();
        if serial_number.is_empty() {
            return Err(AppError::BadRequest(
                "serial_number must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Board {
            id: Uuid::new_v4(),
            category_id: self.category_id,
            serial_number,
            location: self.location.unwrap_or(BoardLocation::InStock),
            condition: self.condition.unwrap_or_else(|| CONDITION_NEW.to_string()),
            issued_by: None,
            issued_to: None,
            qc_by: self.qc_by,
            project_number: None,
            comments: self.comments,
            inward_date_time: now,
            issued_date_time: None,
            created_by: created_by.to_string(),
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBoard {
    pub location: Option<BoardLocation>,
    pub condition: Option<String>,
    pub issued_to: Option<String>,
    pub project_number: Option<String>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardSearch {
    pub query: Option<String>,
    pub category_id: Option<Uuid>,
    pub location: Option<BoardLocation>,
    pub condition: Option<String>,
}

impl BoardSearch {
    pub fn matches(&self, board: &Board) -> bool {
        if self.category_id.is_some_and(|id| id != board.category_id) {
            return false;
        }
        if self.location.is_some_and(|loc| loc != board.location) {
            return false;
        }
        if self.condition.as_deref().is_some_and(|c| c != board.condition) {
            return false;
        }
        match self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            None => true,
            Some(q) => {
                let needle = q.to_lowercase();
                let hit = |field: Option<&str>| {
                    field.is_some_and(|v| v.to_lowercase().contains(&needle))
                };
                hit(Some(&board.serial_number))
                    || hit(board.issued_to.as_deref())
                    || hit(board.project_number.as_deref())
                    || hit(board.comments.as_deref())
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRequest {
    pub category_id: Uuid,
    pub quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(serial: &str) -> Board {
        CreateBoard {
            category_id: Uuid::new_v4(),
            serial_number: serial.to_string(),
            location: None,
            condition: None,
            qc_by: None,
            comments: Some("inward batch 7".to_string()),
        }
        .into_board("store@example.com")
        .unwrap()
    }

    #[test]
    fn new_board_defaults_to_in_stock_new() {
        let b = board("SN-001");
        assert_eq!(b.location, BoardLocation::InStock);
        assert_eq!(b.condition, "New");
        assert!(b.is_available());
    }

    #[test]
    fn blank_serial_is_rejected() {
        let err = CreateBoard {
            category_id: Uuid::new_v4(),
            serial_number: "  ".to_string(),
            location: None,
            condition: None,
            qc_by: None,
            comments: None,
        }
        .into_board("x");
        assert!(err.is_err());
    }

    #[test]
    fn location_serializes_with_display_names() {
        let json = serde_json::to_string(&BoardLocation::IssuedForMachine).unwrap();
        assert_eq!(json, "\"Issued for machine\"");
        let back: BoardLocation = serde_json::from_str("\"At customer site\"").unwrap();
        assert_eq!(back, BoardLocation::AtCustomerSite);
    }

    #[test]
    fn claim_patch_moves_board_out_of_stock() {
        let mut b = board("SN-002");
        let target = IssueTarget {
            issued_by: "admin@example.com".to_string(),
            issued_to: "line-3@example.com".to_string(),
            project_number: "PRJ-9".to_string(),
            comments: String::new(),
        };
        b.apply(&target.claim_patch());
        assert_eq!(b.location, BoardLocation::IssuedForMachine);
        assert_eq!(b.issued_to.as_deref(), Some("line-3@example.com"));
        assert!(b.issued_date_time.is_some());
        assert!(!b.is_available());
    }

    #[test]
    fn search_is_case_insensitive_over_text_fields() {
        let b = board("AbC-123");
        let search = BoardSearch { query: Some("abc".to_string()), ..Default::default() };
        assert!(search.matches(&b));
        let by_comment = BoardSearch { query: Some("BATCH".to_string()), ..Default::default() };
        assert!(by_comment.matches(&b));
        let miss = BoardSearch { query: Some("zzz".to_string()), ..Default::default() };
        assert!(!miss.matches(&b));
    }

    #[test]
    fn search_filters_by_location() {
        let b = board("SN-003");
        let search = BoardSearch { location: Some(BoardLocation::Repairing), ..Default::default() };
        assert!(!search.matches(&b));
    }
}
