use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{BulkIssueReport, BulkRequestService, IssueRequestService, OutwardOverrides};
use crate::allocation::Allocator;
use crate::auth::IssueGrant;
use crate::error::{AppError, AppResult};
use crate::models::{Board, IssueRequest, IssueTarget};
use crate::store::InventoryStore;

/// `POST /api/outward` payload: exactly one of `request_id` / `board_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct OutwardRequest {
    pub request_id: Option<Uuid>,
    pub board_id: Option<Uuid>,
    #[serde(flatten)]
    pub overrides: OutwardOverrides,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutwardOutcome {
    IssueRequest { request: IssueRequest, board: Board },
    BulkRequest(BulkIssueReport),
    Board { board: Board },
}

/// Routes an outward action to the single or bulk lifecycle, or claims a
/// board directly.
#[derive(Clone)]
pub struct OutwardService {
    store: Arc<dyn InventoryStore>,
    allocator: Allocator,
    issue_requests: IssueRequestService,
    bulk_requests: BulkRequestService,
}

impl OutwardService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        issue_requests: IssueRequestService,
        bulk_requests: BulkRequestService,
    ) -> Self {
        Self {
            allocator: Allocator::new(store.clone()),
            store,
            issue_requests,
            bulk_requests,
        }
    }

    pub async fn outward(&self, grant: &IssueGrant, payload: &OutwardRequest) -> AppResult<OutwardOutcome> {
        match (payload.request_id, payload.board_id) {
            (Some(request_id), None) => {
                if self.store.get_issue_request(request_id).await?.is_some() {
                    let (request, board) = self
                        .issue_requests
                        .issue(grant, request_id, &payload.overrides)
                        .await?;
                    return Ok(OutwardOutcome::IssueRequest { request, board });
                }
                let report = self
                    .bulk_requests
                    .issue(grant, request_id, &payload.overrides)
                    .await?;
                Ok(OutwardOutcome::BulkRequest(report))
            }
            (None, Some(board_id)) => {
                let issued_to = payload
                    .overrides
                    .issued_to
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        AppError::InvalidRequestShape(
                            "issued_to is required for a direct outward".to_string(),
                        )
                    })?;
                let target = IssueTarget {
                    issued_by: grant.email().to_string(),
                    issued_to: issued_to.to_string(),
                    project_number: payload.overrides.project_number.clone().unwrap_or_default(),
                    comments: payload.overrides.comments.clone().unwrap_or_default(),
                };
                let board = self.allocator.claim_board(board_id, &target).await?;
                info!(id = %board.id, serial = %board.serial_number, to = %issued_to, "Board outwarded");
                Ok(OutwardOutcome::Board { board })
            }
            _ => Err(AppError::InvalidRequestShape(
                "specify exactly one of request_id or board_id".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoardLocation, CreateIssueRequest, Decision};
    use crate::services::fixtures::{self, admin, user};
    use crate::store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, OutwardService, IssueRequestService) {
        let store = Arc::new(MemoryStore::new());
        let issue_requests = IssueRequestService::new(store.clone());
        let bulk_requests = BulkRequestService::new(store.clone());
        let svc = OutwardService::new(store.clone(), issue_requests.clone(), bulk_requests);
        (store, svc, issue_requests)
    }

    fn direct(board_id: Uuid, issued_to: Option<&str>) -> OutwardRequest {
        OutwardRequest {
            request_id: None,
            board_id: Some(board_id),
            overrides: OutwardOverrides {
                issued_to: issued_to.map(String::from),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn direct_outward_claims_once() {
        let (store, svc, _) = setup();
        let cat = fixtures::category(&store, "A", 0).await;
        let b = fixtures::board(&store, &cat, "A-1", BoardLocation::InStock, "New").await;
        let grant = admin().issue_grant().unwrap();

        let outcome = svc.outward(&grant, &direct(b.id, Some("bench-3"))).await.unwrap();
        let OutwardOutcome::Board { board } = outcome else {
            panic!("expected direct board outcome");
        };
        assert_eq!(board.issued_to.as_deref(), Some("bench-3"));

        let err = svc.outward(&grant, &direct(b.id, Some("bench-4"))).await.unwrap_err();
        assert!(matches!(err, AppError::BoardUnavailable { .. }));
    }

    #[tokio::test]
    async fn direct_outward_requires_recipient() {
        let (store, svc, _) = setup();
        let cat = fixtures::category(&store, "A", 0).await;
        let b = fixtures::board(&store, &cat, "A-1", BoardLocation::InStock, "New").await;
        let grant = admin().issue_grant().unwrap();

        let err = svc.outward(&grant, &direct(b.id, None)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequestShape(_)));
    }

    #[tokio::test]
    async fn request_id_routes_to_single_lifecycle() {
        let (store, svc, issue_requests) = setup();
        let cat = fixtures::category(&store, "A", 0).await;
        fixtures::board(&store, &cat, "A-1", BoardLocation::InStock, "New").await;
        let req = issue_requests
            .create(
                &user(),
                CreateIssueRequest {
                    category_id: cat.id,
                    serial_number: None,
                    issued_to: "line-9".to_string(),
                    project_number: "P".to_string(),
                    comments: None,
                },
            )
            .await
            .unwrap();
        issue_requests
            .decide(&admin().admin_grant().unwrap(), req.id, Decision::Approved)
            .await
            .unwrap();

        let outcome = svc
            .outward(
                &admin().issue_grant().unwrap(),
                &OutwardRequest {
                    request_id: Some(req.id),
                    board_id: None,
                    overrides: OutwardOverrides::default(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, OutwardOutcome::IssueRequest { .. }));
    }

    #[tokio::test]
    async fn unknown_request_id_is_not_found() {
        let (_, svc, _) = setup();
        let err = svc
            .outward(
                &admin().issue_grant().unwrap(),
                &OutwardRequest {
                    request_id: Some(Uuid::new_v4()),
                    board_id: None,
                    overrides: OutwardOverrides::default(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
