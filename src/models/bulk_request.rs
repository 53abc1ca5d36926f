use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Hard limits on a single bulk request.
pub const MAX_CATEGORIES_PER_REQUEST: usize = 5;
pub const MAX_BOARDS_PER_CATEGORY: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bulk_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BulkRequestStatus {
    Pending,
    Approved,
    Rejected,
    Issued,
    PartiallyIssued,
}

impl BulkRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkRequestStatus::Pending => "pending",
            BulkRequestStatus::Approved => "approved",
            BulkRequestStatus::Rejected => "rejected",
            BulkRequestStatus::Issued => "issued",
            BulkRequestStatus::PartiallyIssued => "partially_issued",
        }
    }

    /// Roll-up after an issuance pass. Zero progress leaves the request approved.
    pub fn after_issuance(issued: usize, expected_total: usize) -> BulkRequestStatus {
        if issued > 0 && issued >= expected_total {
            BulkRequestStatus::Issued
        } else if issued > 0 {
            BulkRequestStatus::PartiallyIssued
        } else {
            BulkRequestStatus::Approved
        }
    }
}

impl fmt::Display for BulkRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored element of a bulk request.
///
/// Quantity entries carry no boards until issuance concretizes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BoardRequest {
    Serial {
        category_id: Uuid,
        serial_number: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
    },
    Quantity {
        category_id: Uuid,
        quantity: u32,
    },
}

impl BoardRequest {
    pub fn category_id(&self) -> Uuid {
        match self {
            BoardRequest::Serial { category_id, .. } | BoardRequest::Quantity { category_id, .. } => {
                *category_id
            }
        }
    }

    /// How many boards this element accounts for in `expected_total`.
    pub fn expected_count(&self) -> usize {
        match self {
            BoardRequest::Serial { .. } => 1,
            BoardRequest::Quantity { quantity, .. } => *quantity as usize,
        }
    }

    pub fn serial_number(&self) -> Option<&str> {
        match self {
            BoardRequest::Serial { serial_number, .. } => Some(serial_number),
            BoardRequest::Quantity { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkIssueRequest {
    pub id: Uuid,
    pub boards: Vec<BoardRequest>,
    pub requested_by: String,
    pub issued_to: String,
    pub project_number: String,
    pub comments: Option<String>,
    pub status: BulkRequestStatus,
    pub approved_by: Option<String>,
    pub approved_date_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BulkIssueRequest {
    pub fn expected_total(&self) -> usize {
        self.boards.iter().map(BoardRequest::expected_count).sum()
    }

    /// Whether any element names this exact board.
    pub fn references(&self, category_id: Uuid, serial: &str) -> bool {
        self.boards
            .iter()
            .any(|b| b.category_id() == category_id && b.serial_number() == Some(serial))
    }
}

// ── Request payloads ─────────────────────────────────────────────────────────

/// One category entry as submitted by the client: exactly one of
/// `quantity` / `serial_numbers` must be present.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryBoardRequest {
    pub category_id: Uuid,
    pub quantity: Option<u32>,
    pub serial_numbers: Option<Vec<String>>,
}

/// A validated category entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySpec {
    Quantity(u32),
    Serials(Vec<String>),
}

impl CategoryBoardRequest {
    /// Pure shape validation; runs before any store access.
    pub fn to_spec(&self) -> AppResult<EntrySpec> {
        let serials: Vec<String> = self
            .serial_numbers
            .iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        match (self.quantity, serials.is_empty()) {
            (Some(_), false) => Err(AppError::InvalidRequestShape(format!(
                "category {}: cannot specify both quantity and serial_numbers",
                self.category_id
            ))),
            (None, true) => Err(AppError::InvalidRequestShape(format!(
                "category {}: must specify either quantity or serial_numbers",
                self.category_id
            ))),
            (Some(q), true) => {
                if q == 0 || q > MAX_BOARDS_PER_CATEGORY {
                    return Err(AppError::InvalidRequestShape(format!(
                        "category {}: quantity must be between 1 and {}",
                        self.category_id, MAX_BOARDS_PER_CATEGORY
                    )));
                }
                Ok(EntrySpec::Quantity(q))
            }
            (None, false) => {
                if serials.len() > MAX_BOARDS_PER_CATEGORY as usize {
                    return Err(AppError::InvalidRequestShape(format!(
                        "category {}: at most {} serial numbers per category",
                        self.category_id, MAX_BOARDS_PER_CATEGORY
                    )));
                }
                Ok(EntrySpec::Serials(serials))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBulkIssueRequest {
    pub categories: Vec<CategoryBoardRequest>,
    pub issued_to: String,
    pub project_number: String,
    pub comments: Option<String>,
}

impl CreateBulkIssueRequest {
    /// Validates every entry's shape and the request-wide limits.
    pub fn validated_entries(&self) -> AppResult<Vec<(Uuid, EntrySpec)>> {
        if self.categories.is_empty() || self.categories.len() > MAX_CATEGORIES_PER_REQUEST {
            return Err(AppError::InvalidRequestShape(format!(
                "a bulk request must name between 1 and {} categories",
                MAX_CATEGORIES_PER_REQUEST
            )));
        }

        let mut seen: HashSet<(Uuid, String)> = HashSet::new();
        let mut entries = Vec::with_capacity(self.categories.len());
        for entry in &self.categories {
            let spec = entry.to_spec()?;
            if let EntrySpec::Serials(serials) = &spec {
                for serial in serials {
                    if !seen.insert((entry.category_id, serial.clone())) {
                        return Err(AppError::InvalidRequestShape(format!(
                            "serial number '{}' requested more than once",
                            serial
                        )));
                    }
                }
            }
            entries.push((entry.category_id, spec));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(quantity: Option<u32>, serials: Option<Vec<&str>>) -> CategoryBoardRequest {
        CategoryBoardRequest {
            category_id: Uuid::new_v4(),
            quantity,
            serial_numbers: serials.map(|v| v.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn both_quantity_and_serials_is_invalid() {
        let err = entry(Some(2), Some(vec!["A"])).to_spec().unwrap_err();
        assert!(matches!(err, AppError::InvalidRequestShape(_)));
    }

    #[test]
    fn neither_quantity_nor_serials_is_invalid() {
        assert!(entry(None, None).to_spec().is_err());
        assert!(entry(None, Some(vec![])).to_spec().is_err());
        assert!(entry(None, Some(vec!["  "])).to_spec().is_err());
    }

    #[test]
    fn quantity_bounds() {
        assert!(entry(Some(0), None).to_spec().is_err());
        assert!(entry(Some(51), None).to_spec().is_err());
        assert_eq!(entry(Some(50), None).to_spec().unwrap(), EntrySpec::Quantity(50));
    }

    #[test]
    fn serials_are_trimmed() {
        let spec = entry(None, Some(vec![" SN-1 ", "SN-2"])).to_spec().unwrap();
        assert_eq!(spec, EntrySpec::Serials(vec!["SN-1".into(), "SN-2".into()]));
    }

    #[test]
    fn too_many_categories_is_invalid() {
        let req = CreateBulkIssueRequest {
            categories: (0..6).map(|_| entry(Some(1), None)).collect(),
            issued_to: "t".into(),
            project_number: "p".into(),
            comments: None,
        };
        assert!(req.validated_entries().is_err());
    }

    #[test]
    fn duplicate_serial_in_one_request_is_invalid() {
        let cat = Uuid::new_v4();
        let req = CreateBulkIssueRequest {
            categories: vec![CategoryBoardRequest {
                category_id: cat,
                quantity: None,
                serial_numbers: Some(vec!["SN-1".into(), "SN-1".into()]),
            }],
            issued_to: "t".into(),
            project_number: "p".into(),
            comments: None,
        };
        assert!(matches!(
            req.validated_entries(),
            Err(AppError::InvalidRequestShape(_))
        ));
    }

    #[test]
    fn status_roll_up() {
        assert_eq!(BulkRequestStatus::after_issuance(5, 5), BulkRequestStatus::Issued);
        assert_eq!(BulkRequestStatus::after_issuance(3, 5), BulkRequestStatus::PartiallyIssued);
        assert_eq!(BulkRequestStatus::after_issuance(0, 5), BulkRequestStatus::Approved);
    }

    #[test]
    fn expected_total_counts_quantities_and_serials() {
        let cat = Uuid::new_v4();
        let req = BulkIssueRequest {
            id: Uuid::new_v4(),
            boards: vec![
                BoardRequest::Quantity { category_id: cat, quantity: 3 },
                BoardRequest::Serial { category_id: cat, serial_number: "X".into(), condition: None },
                BoardRequest::Serial { category_id: cat, serial_number: "Y".into(), condition: None },
            ],
            requested_by: "u".into(),
            issued_to: "t".into(),
            project_number: "p".into(),
            comments: None,
            status: BulkRequestStatus::Pending,
            approved_by: None,
            approved_date_time: None,
            created_at: Utc::now(),
        };
        assert_eq!(req.expected_total(), 5);
        assert!(req.references(cat, "Y"));
        assert!(!req.references(cat, "Z"));
        assert!(!req.references(Uuid::new_v4(), "Y"));
    }

    #[test]
    fn board_request_json_is_tagged_by_mode() {
        let cat = Uuid::nil();
        let json = serde_json::to_value(BoardRequest::Quantity { category_id: cat, quantity: 2 }).unwrap();
        assert_eq!(json["mode"], "quantity");
        assert_eq!(json["quantity"], 2);
    }
}
