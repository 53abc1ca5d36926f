use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{InFlight, OutwardOverrides};
use crate::allocation::Allocator;
use crate::auth::{Actor, AdminGrant, IssueGrant};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::store::InventoryStore;

/// Single-board request lifecycle: `pending → approved → issued`,
/// `pending → rejected`.
#[derive(Clone)]
pub struct IssueRequestService {
    store: Arc<dyn InventoryStore>,
    allocator: Allocator,
    in_flight: InFlight,
}

impl IssueRequestService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            allocator: Allocator::new(store.clone()),
            store,
            in_flight: InFlight::default(),
        }
    }

    /// A named serial is validated up front; nothing is stored if it is not
    /// available.
    pub async fn create(&self, actor: &Actor, payload: CreateIssueRequest) -> AppResult<IssueRequest> {
        let serial_number = payload.requested_serial().map(str::to_string);
        match &serial_number {
            Some(serial) => {
                self.allocator
                    .check_serials(payload.category_id, std::slice::from_ref(serial))
                    .await?;
            }
            None => {
                self.allocator.require_category(payload.category_id).await?;
            }
        }

        let request = IssueRequest {
            id: Uuid::new_v4(),
            category_id: payload.category_id,
            serial_number,
            requested_by: actor.email.clone(),
            issued_to: payload.issued_to,
            project_number: payload.project_number,
            comments: payload.comments,
            status: RequestStatus::Pending,
            approved_by: None,
            approved_date_time: None,
            created_at: Utc::now(),
        };
        self.store.insert_issue_request(&request).await?;
        info!(id = %request.id, category_id = %request.category_id, "Issue request created");
        Ok(request)
    }

    /// Admins see every request, everyone else only their own.
    pub async fn list(&self, actor: &Actor) -> AppResult<Vec<IssueRequest>> {
        let owner = (!actor.is_admin()).then_some(actor.email.as_str());
        self.store.list_issue_requests(owner).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<IssueRequest> {
        self.store
            .get_issue_request(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Issue request {} not found", id)))
    }

    pub async fn decide(&self, grant: &AdminGrant, id: Uuid, decision: Decision) -> AppResult<IssueRequest> {
        let current = self.get(id).await?;
        let next = match decision {
            Decision::Approved => RequestStatus::Approved,
            Decision::Rejected => RequestStatus::Rejected,
        };
        current.status.ensure_transition(next)?;

        let updated = IssueRequest {
            status: next,
            approved_by: Some(grant.email().to_string()),
            approved_date_time: Some(Utc::now()),
            ..current.clone()
        };
        if !self.store.update_issue_request_if(current.status, &updated).await? {
            // Lost against a concurrent decision; report against what is stored now.
            let now = self.get(id).await?;
            return Err(AppError::InvalidTransition {
                from: now.status.to_string(),
                to: next.to_string(),
            });
        }
        info!(id = %id, status = %next, by = grant.email(), "Issue request decided");
        Ok(updated)
    }

    /// Issues the request's board. The request row is moved to `issued` first
    /// and acts as the lock; a failed claim moves it back to `approved`.
    pub async fn issue(
        &self,
        grant: &IssueGrant,
        id: Uuid,
        overrides: &OutwardOverrides,
    ) -> AppResult<(IssueRequest, Board)> {
        let _guard = self
            .in_flight
            .acquire(id)
            .ok_or(AppError::IssuanceInProgress(id))?;

        let approved = self.get(id).await?;
        if approved.status != RequestStatus::Approved {
            return Err(AppError::NotApprovedYet(id));
        }

        let locked = IssueRequest {
            status: RequestStatus::Issued,
            ..approved.clone()
        };
        if !self
            .store
            .update_issue_request_if(RequestStatus::Approved, &locked)
            .await?
        {
            return Err(AppError::IssuanceInProgress(id));
        }

        let target = IssueTarget {
            issued_by: grant.email().to_string(),
            issued_to: overrides
                .issued_to
                .clone()
                .unwrap_or_else(|| approved.issued_to.clone()),
            project_number: overrides
                .project_number
                .clone()
                .unwrap_or_else(|| approved.project_number.clone()),
            comments: overrides
                .comments
                .clone()
                .or_else(|| approved.comments.clone())
                .unwrap_or_default(),
        };

        let claimed = match &approved.serial_number {
            Some(serial) => {
                self.allocator
                    .claim_serial(approved.category_id, serial, &target)
                    .await
            }
            None => self.allocator.claim_any(approved.category_id, &target).await,
        };

        let board = match claimed {
            Ok(board) => board,
            Err(e) => {
                warn!(id = %id, error = %e, "Issuance failed, request returned to approved");
                self.write_if(RequestStatus::Issued, &approved).await?;
                return Err(e);
            }
        };

        let issued = IssueRequest {
            serial_number: Some(board.serial_number.clone()),
            ..locked
        };
        self.write_if(RequestStatus::Issued, &issued).await?;

        info!(id = %id, serial = %board.serial_number, by = grant.email(), "Issue request issued");
        Ok((issued, board))
    }

    /// Conditional write whose loss is logged rather than raised.
    async fn write_if(&self, expected: RequestStatus, request: &IssueRequest) -> AppResult<bool> {
        let written = self.store.update_issue_request_if(expected, request).await?;
        if !written {
            warn!(
                id = %request.id,
                expected = %expected,
                status = %request.status,
                "Issue request changed during issuance; write skipped"
            );
        }
        Ok(written)
    }

    pub async fn delete(&self, grant: &AdminGrant, id: Uuid) -> AppResult<()> {
        if !self.store.delete_issue_request(id).await? {
            return Err(AppError::NotFound(format!("Issue request {} not found", id)));
        }
        info!(id = %id, by = grant.email(), "Issue request deleted");
        Ok(())
    }
}
