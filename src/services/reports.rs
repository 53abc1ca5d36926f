use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::allocation::availability::{CONDITION_REPAIRED, CONDITION_SCRAP};
use crate::allocation::Allocator;
use crate::error::AppResult;
use crate::models::*;
use crate::store::{BoardFilter, InventoryStore};

#[derive(Debug, Clone, Serialize)]
pub struct LowStockItem {
    pub category_id: Uuid,
    pub category_name: String,
    pub current_stock: u32,
    pub minimum_stock_quantity: i32,
    pub shortage_quantity: u32,
    pub lead_time_days: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SerialHistory {
    pub serial_number: String,
    pub boards: Vec<BoardHistory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardHistory {
    pub board: Board,
    pub category_name: Option<String>,
    pub issue_requests: Vec<IssueRequest>,
    pub bulk_requests: Vec<BulkIssueRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SerialEntry {
    pub serial_number: String,
    pub condition: String,
    pub location: BoardLocation,
}

#[derive(Debug, Clone, Serialize)]
pub struct SerialNumbers {
    pub category_id: Uuid,
    pub category_name: String,
    pub total: usize,
    pub boards: Vec<SerialEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_categories: usize,
    pub total_boards: i64,
    pub available_boards: i64,
    pub issued_boards: i64,
    pub repaired_boards: i64,
    pub scrap_boards: i64,
    pub pending_requests: i64,
}

/// Read-only reports. Stock figures use the same availability count as the
/// allocator.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn InventoryStore>,
    allocator: Allocator,
}

impl ReportService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            allocator: Allocator::new(store.clone()),
            store,
        }
    }

    pub async fn low_stock(&self) -> AppResult<Vec<LowStockItem>> {
        let mut items = Vec::new();
        for category in self.store.list_categories().await? {
            let current = self.allocator.available_count(category.id).await?;
            let minimum = u32::try_from(category.minimum_stock_quantity).unwrap_or(0);
            if current < minimum {
                items.push(LowStockItem {
                    category_id: category.id,
                    category_name: category.name,
                    current_stock: current,
                    minimum_stock_quantity: category.minimum_stock_quantity,
                    shortage_quantity: minimum - current,
                    lead_time_days: category.lead_time_days,
                });
            }
        }
        Ok(items)
    }

    pub async fn under_repair(&self) -> AppResult<Vec<Board>> {
        self.store.list_boards(None, &BoardFilter::UnderRepair).await
    }

    pub async fn serial_history(&self, serial_number: &str) -> AppResult<SerialHistory> {
        let boards = self.store.find_boards_by_serial(serial_number).await?;
        let issue_requests = self.store.list_issue_requests(None).await?;
        let bulk_requests = self.store.list_bulk_requests().await?;

        let mut history = Vec::with_capacity(boards.len());
        for board in boards {
            let category_name = self
                .store
                .get_category(board.category_id)
                .await?
                .map(|c| c.name);
            let singles = issue_requests
                .iter()
                .filter(|r| {
                    r.category_id == board.category_id
                        && r.serial_number.as_deref() == Some(board.serial_number.as_str())
                })
                .cloned()
                .collect();
            let bulks = bulk_requests
                .iter()
                .filter(|r| r.references(board.category_id, &board.serial_number))
                .cloned()
                .collect();
            history.push(BoardHistory {
                board,
                category_name,
                issue_requests: singles,
                bulk_requests: bulks,
            });
        }

        Ok(SerialHistory {
            serial_number: serial_number.to_string(),
            boards: history,
        })
    }

    pub async fn serial_numbers(&self, category_id: Uuid) -> AppResult<SerialNumbers> {
        let category = self.allocator.require_category(category_id).await?;
        let mut boards: Vec<SerialEntry> = self
            .store
            .list_boards(Some(category_id), &BoardFilter::Any)
            .await?
            .into_iter()
            .map(|b| SerialEntry {
                serial_number: b.serial_number,
                condition: b.condition,
                location: b.location,
            })
            .collect();
        boards.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));

        Ok(SerialNumbers {
            category_id,
            category_name: category.name,
            total: boards.len(),
            boards,
        })
    }

    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let count = |filter: BoardFilter| {
            let store = self.store.clone();
            async move { store.count_boards(None, &filter).await }
        };

        let pending_bulk = self
            .store
            .list_bulk_requests()
            .await?
            .iter()
            .filter(|r| r.status == BulkRequestStatus::Pending)
            .count() as i64;

        Ok(DashboardStats {
            total_categories: self.store.list_categories().await?.len(),
            total_boards: count(BoardFilter::Any).await?,
            available_boards: count(BoardFilter::Available).await?,
            issued_boards: count(BoardFilter::NotInStock).await?,
            repaired_boards: count(BoardFilter::Condition(CONDITION_REPAIRED.to_string())).await?,
            scrap_boards: count(BoardFilter::Condition(CONDITION_SCRAP.to_string())).await?,
            pending_requests: self.store.count_issue_requests(RequestStatus::Pending).await? + pending_bulk,
        })
    }
}
