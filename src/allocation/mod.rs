//! Board allocation.
//!
//! Two category-scoped modes: serial mode validates an explicit list of serial
//! numbers, quantity mode counts (and, at issuance, claims) the oldest
//! available boards. Every claim goes through the store's conditional update,
//! so a board that stopped being available between the read and the write is
//! skipped rather than double-issued.

pub mod availability;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Board, Category, IssueTarget};
use crate::store::{BoardFilter, InventoryStore};

/// First-in-first-out selection shown to the UI. Nothing is reserved.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub category_id: Uuid,
    pub selected_boards: Vec<Board>,
    pub total_available: u32,
}

#[derive(Clone)]
pub struct Allocator {
    store: Arc<dyn InventoryStore>,
}

impl Allocator {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    pub async fn require_category(&self, category_id: Uuid) -> AppResult<Category> {
        self.store
            .get_category(category_id)
            .await?
            .ok_or(AppError::CategoryNotFound(category_id))
    }

    /// Number of boards in the category that satisfy the availability rule.
    pub async fn available_count(&self, category_id: Uuid) -> AppResult<u32> {
        let count = self
            .store
            .count_boards(Some(category_id), &BoardFilter::Available)
            .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Serial mode, check only. All-or-nothing: the first serial that is
    /// missing from the category or not available fails the whole call.
    pub async fn check_serials(&self, category_id: Uuid, serials: &[String]) -> AppResult<Vec<Board>> {
        self.require_category(category_id).await?;

        let mut boards = Vec::with_capacity(serials.len());
        for serial in serials {
            match self.store.find_board(category_id, serial).await? {
                Some(board) if board.is_available() => boards.push(board),
                _ => {
                    return Err(AppError::BoardUnavailable {
                        serial_number: serial.clone(),
                    })
                }
            }
        }
        Ok(boards)
    }

    /// Quantity mode, check only. Returns the available count on success.
    pub async fn check_quantity(&self, category_id: Uuid, quantity: u32) -> AppResult<u32> {
        self.require_category(category_id).await?;

        let available = self.available_count(category_id).await?;
        if available < quantity {
            return Err(AppError::InsufficientStock {
                category_id,
                requested: quantity,
                available,
            });
        }
        Ok(available)
    }

    pub async fn preview(&self, category_id: Uuid, quantity: u32) -> AppResult<Preview> {
        if quantity == 0 {
            return Err(AppError::InvalidRequestShape(
                "quantity must be at least 1".to_string(),
            ));
        }
        self.require_category(category_id).await?;

        let mut available = self
            .store
            .list_boards(Some(category_id), &BoardFilter::Available)
            .await?;
        let total_available = u32::try_from(available.len()).unwrap_or(u32::MAX);
        if total_available < quantity {
            return Err(AppError::InsufficientStock {
                category_id,
                requested: quantity,
                available: total_available,
            });
        }
        available.truncate(quantity as usize);

        Ok(Preview {
            category_id,
            selected_boards: available,
            total_available,
        })
    }

    /// Claims one specific board. Fails with `BoardUnavailable` if the board
    /// does not exist in the category or lost the conditional update.
    pub async fn claim_serial(
        &self,
        category_id: Uuid,
        serial_number: &str,
        target: &IssueTarget,
    ) -> AppResult<Board> {
        let unavailable = || AppError::BoardUnavailable {
            serial_number: serial_number.to_string(),
        };

        let board = self
            .store
            .find_board(category_id, serial_number)
            .await?
            .ok_or_else(unavailable)?;

        self.store
            .update_board_if(board.id, &BoardFilter::Available, &target.claim_patch())
            .await?
            .ok_or_else(unavailable)
    }

    /// Claims up to `quantity` boards, oldest first. Candidates that were
    /// taken concurrently are skipped and the next one is tried. May return
    /// fewer boards than asked for; the caller decides whether that is fatal.
    pub async fn claim_quantity(
        &self,
        category_id: Uuid,
        quantity: u32,
        target: &IssueTarget,
    ) -> AppResult<Vec<Board>> {
        let wanted = quantity as usize;
        let candidates = self
            .store
            .list_boards(Some(category_id), &BoardFilter::Available)
            .await?;

        let patch = target.claim_patch();
        let mut claimed = Vec::with_capacity(wanted);
        for candidate in candidates {
            if claimed.len() == wanted {
                break;
            }
            match self
                .store
                .update_board_if(candidate.id, &BoardFilter::Available, &patch)
                .await?
            {
                Some(board) => claimed.push(board),
                None => debug!(
                    board_id = %candidate.id,
                    serial = %candidate.serial_number,
                    "Board taken concurrently, trying next candidate"
                ),
            }
        }

        if claimed.len() < wanted {
            warn!(
                category_id = %category_id,
                requested = wanted,
                claimed = claimed.len(),
                "Quantity allocation short"
            );
        }
        Ok(claimed)
    }

    /// Claims exactly one board of the category, oldest first.
    pub async fn claim_any(&self, category_id: Uuid, target: &IssueTarget) -> AppResult<Board> {
        let mut claimed = self.claim_quantity(category_id, 1, target).await?;
        match claimed.pop() {
            Some(board) => Ok(board),
            None => Err(AppError::InsufficientStock {
                category_id,
                requested: 1,
                available: self.available_count(category_id).await?,
            }),
        }
    }

    /// Direct outward of a board by id.
    pub async fn claim_board(&self, board_id: Uuid, target: &IssueTarget) -> AppResult<Board> {
        let board = self
            .store
            .get_board(board_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Board {} not found", board_id)))?;

        self.store
            .update_board_if(board.id, &BoardFilter::Available, &target.claim_patch())
            .await?
            .ok_or(AppError::BoardUnavailable {
                serial_number: board.serial_number,
            })
    }
}
