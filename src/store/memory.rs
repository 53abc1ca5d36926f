use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BoardFilter, InventoryStore};
use crate::error::{AppError, AppResult};
use crate::models::{
    Board, BoardPatch, BulkIssueRequest, BulkRequestStatus, Category, IssueRequest, RequestStatus,
};

/// In-process store.
///
/// Every table is an `IndexMap`, so iteration order is insertion order and
/// `list_boards` is naturally first-created-first. Rows are removed with
/// `shift_remove` to keep that order intact. All compare-and-set writes happen
/// under the write lock, which makes them atomic with respect to each other.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    categories: IndexMap<Uuid, Category>,
    boards: IndexMap<Uuid, Board>,
    issue_requests: IndexMap<Uuid, IssueRequest>,
    bulk_requests: IndexMap<Uuid, BulkIssueRequest>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    // ── Categories ──────────────────────────────────────────────────────────

    async fn insert_category(&self, category: &Category) -> AppResult<()> {
        let mut t = self.tables.write().await;
        if t.categories.values().any(|c| c.name == category.name) {
            return Err(AppError::CategoryNameTaken(category.name.clone()));
        }
        t.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> AppResult<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        Ok(self.tables.read().await.categories.values().cloned().collect())
    }

    async fn update_category(&self, category: &Category) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        if t
            .categories
            .values()
            .any(|c| c.id != category.id && c.name == category.name)
        {
            return Err(AppError::CategoryNameTaken(category.name.clone()));
        }
        match t.categories.get_mut(&category.id) {
            Some(existing) => {
                *existing = category.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_category(&self, id: Uuid) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        if t.boards.values().any(|b| b.category_id == id) {
            return Err(AppError::CategoryInUse(id));
        }
        let removed = t.categories.shift_remove(&id).is_some();
        if removed {
            t.issue_requests.retain(|_, r| r.category_id != id);
        }
        Ok(removed)
    }

    // ── Boards ──────────────────────────────────────────────────────────────

    async fn insert_board(&self, board: &Board) -> AppResult<()> {
        let mut t = self.tables.write().await;
        if !t.categories.contains_key(&board.category_id) {
            return Err(AppError::CategoryNotFound(board.category_id));
        }
        if t
            .boards
            .values()
            .any(|b| b.category_id == board.category_id && b.serial_number == board.serial_number)
        {
            return Err(AppError::DuplicateSerial(board.serial_number.clone()));
        }
        t.boards.insert(board.id, board.clone());
        Ok(())
    }

    async fn get_board(&self, id: Uuid) -> AppResult<Option<Board>> {
        Ok(self.tables.read().await.boards.get(&id).cloned())
    }

    async fn find_board(&self, category_id: Uuid, serial_number: &str) -> AppResult<Option<Board>> {
        Ok(self
            .tables
            .read()
            .await
            .boards
            .values()
            .find(|b| b.category_id == category_id && b.serial_number == serial_number)
            .cloned())
    }

    async fn find_boards_by_serial(&self, serial_number: &str) -> AppResult<Vec<Board>> {
        Ok(self
            .tables
            .read()
            .await
            .boards
            .values()
            .filter(|b| b.serial_number == serial_number)
            .cloned()
            .collect())
    }

    async fn list_boards(&self, category_id: Option<Uuid>, filter: &BoardFilter) -> AppResult<Vec<Board>> {
        Ok(self
            .tables
            .read()
            .await
            .boards
            .values()
            .filter(|b| category_id.map_or(true, |id| b.category_id == id) && filter.matches(b))
            .cloned()
            .collect())
    }

    async fn count_boards(&self, category_id: Option<Uuid>, filter: &BoardFilter) -> AppResult<i64> {
        let count = self
            .tables
            .read()
            .await
            .boards
            .values()
            .filter(|b| category_id.map_or(true, |id| b.category_id == id) && filter.matches(b))
            .count();
        Ok(count as i64)
    }

    async fn update_board_if(
        &self,
        id: Uuid,
        expected: &BoardFilter,
        patch: &BoardPatch,
    ) -> AppResult<Option<Board>> {
        let mut t = self.tables.write().await;
        match t.boards.get_mut(&id) {
            Some(board) if expected.matches(board) => {
                board.apply(patch);
                Ok(Some(board.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_board(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.tables.write().await.boards.shift_remove(&id).is_some())
    }

    // ── Issue requests ──────────────────────────────────────────────────────

    async fn insert_issue_request(&self, request: &IssueRequest) -> AppResult<()> {
        self.tables
            .write()
            .await
            .issue_requests
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn get_issue_request(&self, id: Uuid) -> AppResult<Option<IssueRequest>> {
        Ok(self.tables.read().await.issue_requests.get(&id).cloned())
    }

    async fn list_issue_requests(&self, requested_by: Option<&str>) -> AppResult<Vec<IssueRequest>> {
        Ok(self
            .tables
            .read()
            .await
            .issue_requests
            .values()
            .filter(|r| requested_by.map_or(true, |who| r.requested_by == who))
            .cloned()
            .collect())
    }

    async fn count_issue_requests(&self, status: RequestStatus) -> AppResult<i64> {
        let count = self
            .tables
            .read()
            .await
            .issue_requests
            .values()
            .filter(|r| r.status == status)
            .count();
        Ok(count as i64)
    }

    async fn update_issue_request_if(
        &self,
        expected: RequestStatus,
        request: &IssueRequest,
    ) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        match t.issue_requests.get_mut(&request.id) {
            Some(stored) if stored.status == expected => {
                *stored = request.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_issue_request(&self, id: Uuid) -> AppResult<bool> {
        Ok(self
            .tables
            .write()
            .await
            .issue_requests
            .shift_remove(&id)
            .is_some())
    }

    // ── Bulk issue requests ─────────────────────────────────────────────────

    async fn insert_bulk_request(&self, request: &BulkIssueRequest) -> AppResult<()> {
        self.tables
            .write()
            .await
            .bulk_requests
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn get_bulk_request(&self, id: Uuid) -> AppResult<Option<BulkIssueRequest>> {
        Ok(self.tables.read().await.bulk_requests.get(&id).cloned())
    }

    async fn list_bulk_requests(&self) -> AppResult<Vec<BulkIssueRequest>> {
        Ok(self.tables.read().await.bulk_requests.values().cloned().collect())
    }

    async fn update_bulk_request_if(
        &self,
        expected: BulkRequestStatus,
        request: &BulkIssueRequest,
    ) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        match t.bulk_requests.get_mut(&request.id) {
            Some(stored) if stored.status == expected => {
                *stored = request.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_bulk_request(&self, id: Uuid) -> AppResult<bool> {
        Ok(self
            .tables
            .write()
            .await
            .bulk_requests
            .shift_remove(&id)
            .is_some())
    }
}
