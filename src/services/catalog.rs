use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::allocation::{Allocator, Preview};
use crate::auth::{Actor, AdminGrant};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::store::{BoardFilter, InventoryStore};

/// Categories and boards.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn InventoryStore>,
    allocator: Allocator,
}

impl CatalogService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            allocator: Allocator::new(store.clone()),
            store,
        }
    }

    // ── Categories ──────────────────────────────────────────────────────────

    pub async fn create_category(&self, actor: &Actor, payload: CreateCategory) -> AppResult<Category> {
        payload.validate()?;
        let category = payload.into_category(&actor.email);
        self.store.insert_category(&category).await?;
        info!(id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.store.list_categories().await
    }

    pub async fn get_category(&self, id: Uuid) -> AppResult<Category> {
        self.allocator.require_category(id).await
    }

    /// Replaces the editable fields; `created_by`/`created_at` are kept.
    pub async fn update_category(&self, id: Uuid, payload: CreateCategory) -> AppResult<Category> {
        payload.validate()?;
        let existing = self.get_category(id).await?;
        let updated = Category {
            id: existing.id,
            created_by: existing.created_by,
            created_at: existing.created_at,
            ..payload.into_category("")
        };
        if !self.store.update_category(&updated).await? {
            return Err(AppError::CategoryNotFound(id));
        }
        info!(id = %id, "Category updated");
        Ok(updated)
    }

    pub async fn delete_category(&self, grant: &AdminGrant, id: Uuid) -> AppResult<()> {
        if !self.store.delete_category(id).await? {
            return Err(AppError::CategoryNotFound(id));
        }
        info!(id = %id, by = grant.email(), "Category deleted");
        Ok(())
    }

    // ── Boards ──────────────────────────────────────────────────────────────

    pub async fn create_board(&self, actor: &Actor, payload: CreateBoard) -> AppResult<Board> {
        self.allocator.require_category(payload.category_id).await?;
        let board = payload.into_board(&actor.email)?;
        self.store.insert_board(&board).await?;
        info!(
            id = %board.id,
            serial = %board.serial_number,
            category_id = %board.category_id,
            "Board inwarded"
        );
        Ok(board)
    }

    pub async fn list_boards(&self, category_id: Option<Uuid>) -> AppResult<Vec<Board>> {
        self.store.list_boards(category_id, &BoardFilter::Any).await
    }

    pub async fn get_board(&self, id: Uuid) -> AppResult<Board> {
        self.store
            .get_board(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Board {} not found", id)))
    }

    /// Partial update. Moving a board anywhere but `In stock` stamps who did
    /// it and when.
    pub async fn update_board(&self, actor: &Actor, id: Uuid, payload: UpdateBoard) -> AppResult<Board> {
        let leaving_stock = payload
            .location
            .is_some_and(|loc| loc != BoardLocation::InStock);

        let patch = BoardPatch {
            location: payload.location,
            condition: payload.condition,
            issued_by: leaving_stock.then(|| actor.email.clone()),
            issued_to: payload.issued_to,
            project_number: payload.project_number,
            comments: payload.comments,
            issued_date_time: leaving_stock.then(Utc::now),
        };

        let board = self
            .store
            .update_board_if(id, &BoardFilter::Any, &patch)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Board {} not found", id)))?;
        info!(id = %id, location = %board.location, condition = %board.condition, "Board updated");
        Ok(board)
    }

    pub async fn delete_board(&self, grant: &AdminGrant, id: Uuid) -> AppResult<()> {
        if !self.store.delete_board(id).await? {
            return Err(AppError::NotFound(format!("Board {} not found", id)));
        }
        info!(id = %id, by = grant.email(), "Board deleted");
        Ok(())
    }

    pub async fn search_boards(&self, search: &BoardSearch) -> AppResult<Vec<Board>> {
        let boards = self.store.list_boards(search.category_id, &BoardFilter::Any).await?;
        Ok(boards.into_iter().filter(|b| search.matches(b)).collect())
    }

    pub async fn preview(&self, request: &PreviewRequest) -> AppResult<Preview> {
        self.allocator.preview(request.category_id, request.quantity).await
    }
}
