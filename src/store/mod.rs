//! Persistence seam.
//!
//! Services and the allocator only talk to `dyn InventoryStore`. Two
//! implementations exist: `MemoryStore` (insertion-ordered maps behind a
//! `RwLock`) and `PgStore` (PostgreSQL via sqlx).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::allocation::availability::{CONDITION_REPAIRED, CONDITION_UNDER_REPAIR};
use crate::error::AppResult;
use crate::models::{
    Board, BoardLocation, BoardPatch, BulkIssueRequest, BulkRequestStatus, Category, IssueRequest,
    RequestStatus,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Board predicates understood by every store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardFilter {
    Any,
    /// The availability rule; see `allocation::availability`.
    Available,
    /// `Under repair`, or sitting in `Repairing` without being `Repaired` yet.
    UnderRepair,
    NotInStock,
    Condition(String),
}

impl BoardFilter {
    pub fn matches(&self, board: &Board) -> bool {
        match self {
            BoardFilter::Any => true,
            BoardFilter::Available => board.is_available(),
            BoardFilter::UnderRepair => {
                board.condition == CONDITION_UNDER_REPAIR
                    || (board.location == BoardLocation::Repairing
                        && board.condition != CONDITION_REPAIRED)
            }
            BoardFilter::NotInStock => board.location != BoardLocation::InStock,
            BoardFilter::Condition(c) => board.condition == *c,
        }
    }
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    // ── Categories ──────────────────────────────────────────────────────────

    /// Fails with `CategoryNameTaken` when the name is already used.
    async fn insert_category(&self, category: &Category) -> AppResult<()>;
    async fn get_category(&self, id: Uuid) -> AppResult<Option<Category>>;
    async fn list_categories(&self) -> AppResult<Vec<Category>>;
    /// Returns `false` when the category does not exist.
    async fn update_category(&self, category: &Category) -> AppResult<bool>;
    /// Fails with `CategoryInUse` while boards reference the category.
    async fn delete_category(&self, id: Uuid) -> AppResult<bool>;

    // ── Boards ──────────────────────────────────────────────────────────────

    /// Fails with `DuplicateSerial` when `(category_id, serial_number)` exists.
    async fn insert_board(&self, board: &Board) -> AppResult<()>;
    async fn get_board(&self, id: Uuid) -> AppResult<Option<Board>>;
    async fn find_board(&self, category_id: Uuid, serial_number: &str) -> AppResult<Option<Board>>;
    async fn find_boards_by_serial(&self, serial_number: &str) -> AppResult<Vec<Board>>;
    /// Boards matching `filter`, oldest first.
    async fn list_boards(&self, category_id: Option<Uuid>, filter: &BoardFilter) -> AppResult<Vec<Board>>;
    async fn count_boards(&self, category_id: Option<Uuid>, filter: &BoardFilter) -> AppResult<i64>;
    /// Compare-and-set: applies `patch` only if the board still satisfies
    /// `expected` at the moment of the write. `None` means nothing was updated.
    async fn update_board_if(
        &self,
        id: Uuid,
        expected: &BoardFilter,
        patch: &BoardPatch,
    ) -> AppResult<Option<Board>>;
    async fn delete_board(&self, id: Uuid) -> AppResult<bool>;

    // ── Issue requests ──────────────────────────────────────────────────────

    async fn insert_issue_request(&self, request: &IssueRequest) -> AppResult<()>;
    async fn get_issue_request(&self, id: Uuid) -> AppResult<Option<IssueRequest>>;
    async fn list_issue_requests(&self, requested_by: Option<&str>) -> AppResult<Vec<IssueRequest>>;
    async fn count_issue_requests(&self, status: RequestStatus) -> AppResult<i64>;
    /// Writes `request` only if the stored status is still `expected`.
    async fn update_issue_request_if(
        &self,
        expected: RequestStatus,
        request: &IssueRequest,
    ) -> AppResult<bool>;
    async fn delete_issue_request(&self, id: Uuid) -> AppResult<bool>;

    // ── Bulk issue requests ─────────────────────────────────────────────────

    async fn insert_bulk_request(&self, request: &BulkIssueRequest) -> AppResult<()>;
    async fn get_bulk_request(&self, id: Uuid) -> AppResult<Option<BulkIssueRequest>>;
    async fn list_bulk_requests(&self) -> AppResult<Vec<BulkIssueRequest>>;
    /// Writes `request` only if the stored status is still `expected`.
    async fn update_bulk_request_if(
        &self,
        expected: BulkRequestStatus,
        request: &BulkIssueRequest,
    ) -> AppResult<bool>;
    async fn delete_bulk_request(&self, id: Uuid) -> AppResult<bool>;
}

