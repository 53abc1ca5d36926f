use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{InFlight, OutwardOverrides};
use crate::allocation::Allocator;
use crate::auth::{Actor, AdminGrant, IssueGrant};
use crate::error::{AppError, AppResult, EntryFailure};
use crate::models::*;
use crate::store::InventoryStore;

/// A board (or part of a quantity) that could not be issued.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedBoard {
    pub category_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkIssueReport {
    pub request: BulkIssueRequest,
    pub issued_boards: Vec<Board>,
    pub failed_boards: Vec<FailedBoard>,
}

/// Multi-category requests. Creation is atomic; issuance is best-effort.
#[derive(Clone)]
pub struct BulkRequestService {
    store: Arc<dyn InventoryStore>,
    allocator: Allocator,
    in_flight: InFlight,
}

impl BulkRequestService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            allocator: Allocator::new(store.clone()),
            store,
            in_flight: InFlight::default(),
        }
    }

    /// Validates every entry against current stock and persists the request
    /// only if all of them pass. Serial entries are stored concretely,
    /// quantity entries as bare counts.
    pub async fn create(&self, actor: &Actor, payload: CreateBulkIssueRequest) -> AppResult<BulkIssueRequest> {
        let entries = payload.validated_entries()?;

        let mut failures: Vec<EntryFailure> = Vec::new();
        let mut boards: Vec<BoardRequest> = Vec::new();
        let mut demand: HashMap<Uuid, u32> = HashMap::new();

        for (category_id, spec) in &entries {
            let outcome = match spec {
                EntrySpec::Serials(serials) => self
                    .allocator
                    .check_serials(*category_id, serials)
                    .await
                    .map(|found| {
                        found
                            .into_iter()
                            .map(|board| BoardRequest::Serial {
                                category_id: *category_id,
                                serial_number: board.serial_number,
                                condition: Some(board.condition),
                            })
                            .collect::<Vec<_>>()
                    }),
                EntrySpec::Quantity(quantity) => self
                    .allocator
                    .check_quantity(*category_id, *quantity)
                    .await
                    .map(|_| {
                        vec![BoardRequest::Quantity {
                            category_id: *category_id,
                            quantity: *quantity,
                        }]
                    }),
            };

            match outcome {
                Ok(elements) => {
                    let count: usize = elements.iter().map(BoardRequest::expected_count).sum();
                    *demand.entry(*category_id).or_default() += count as u32;
                    boards.extend(elements);
                }
                Err(e @ AppError::Database(_)) => return Err(e),
                Err(e) => failures.push(EntryFailure {
                    category_id: *category_id,
                    error: e.to_string(),
                }),
            }
        }

        // Entries for the same category draw on the same stock.
        for (category_id, requested) in &demand {
            if failures.iter().any(|f| f.category_id == *category_id) {
                continue;
            }
            let available = self.allocator.available_count(*category_id).await?;
            if available < *requested {
                failures.push(EntryFailure {
                    category_id: *category_id,
                    error: AppError::InsufficientStock {
                        category_id: *category_id,
                        requested: *requested,
                        available,
                    }
                    .to_string(),
                });
            }
        }

        if !failures.is_empty() {
            warn!(failed = failures.len(), requested_by = %actor.email, "Bulk request rejected");
            return Err(AppError::BulkCreationFailed { failures });
        }

        let request = BulkIssueRequest {
            id: Uuid::new_v4(),
            boards,
            requested_by: actor.email.clone(),
            issued_to: payload.issued_to,
            project_number: payload.project_number,
            comments: payload.comments,
            status: BulkRequestStatus::Pending,
            approved_by: None,
            approved_date_time: None,
            created_at: Utc::now(),
        };
        self.store.insert_bulk_request(&request).await?;
        info!(
            id = %request.id,
            categories = entries.len(),
            expected = request.expected_total(),
            "Bulk issue request created"
        );
        Ok(request)
    }

    /// Admins see every request, everyone else only their own.
    pub async fn list(&self, actor: &Actor) -> AppResult<Vec<BulkIssueRequest>> {
        let all = self.store.list_bulk_requests().await?;
        if actor.is_admin() {
            return Ok(all);
        }
        Ok(all
            .into_iter()
            .filter(|r| r.requested_by == actor.email)
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<BulkIssueRequest> {
        self.store
            .get_bulk_request(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bulk issue request {} not found", id)))
    }

    pub async fn decide(&self, grant: &AdminGrant, id: Uuid, decision: Decision) -> AppResult<BulkIssueRequest> {
        let current = self.get(id).await?;
        let next = match decision {
            Decision::Approved => BulkRequestStatus::Approved,
            Decision::Rejected => BulkRequestStatus::Rejected,
        };
        let refused = |from: BulkRequestStatus| AppError::InvalidTransition {
            from: from.to_string(),
            to: next.to_string(),
        };
        if current.status != BulkRequestStatus::Pending {
            return Err(refused(current.status));
        }

        let updated = BulkIssueRequest {
            status: next,
            approved_by: Some(grant.email().to_string()),
            approved_date_time: Some(Utc::now()),
            ..current
        };
        if !self
            .store
            .update_bulk_request_if(BulkRequestStatus::Pending, &updated)
            .await?
        {
            let now = self.get(id).await?;
            return Err(refused(now.status));
        }
        info!(id = %id, status = %next, by = grant.email(), "Bulk issue request decided");
        Ok(updated)
    }

    /// Allocates every element of an approved request. Per-element failures
    /// are collected, not raised. Quantity elements are concretized into
    /// serial elements for the boards actually claimed; any shortfall stays
    /// behind as a smaller quantity element.
    ///
    /// The request row is moved to `issued` before any board is touched and
    /// acts as the lock across processes. Named serials are claimed before
    /// quantity elements so a quantity never takes a board the same request
    /// asks for by serial.
    pub async fn issue(
        &self,
        grant: &IssueGrant,
        id: Uuid,
        overrides: &OutwardOverrides,
    ) -> AppResult<BulkIssueReport> {
        let _guard = self
            .in_flight
            .acquire(id)
            .ok_or(AppError::IssuanceInProgress(id))?;

        let request = self.get(id).await?;
        if request.status != BulkRequestStatus::Approved {
            return Err(AppError::NotApprovedYet(id));
        }
        self.lock_for_issuance(&request).await?;

        let target = IssueTarget {
            issued_by: grant.email().to_string(),
            issued_to: overrides
                .issued_to
                .clone()
                .unwrap_or_else(|| request.issued_to.clone()),
            project_number: overrides
                .project_number
                .clone()
                .unwrap_or_else(|| request.project_number.clone()),
            comments: overrides
                .comments
                .clone()
                .or_else(|| request.comments.clone())
                .unwrap_or_default(),
        };

        // Rewritten elements, kept in the request's original order.
        let mut slots: Vec<Vec<BoardRequest>> = vec![Vec::new(); request.boards.len()];
        let mut issued_boards: Vec<Board> = Vec::new();
        let mut failed_boards: Vec<FailedBoard> = Vec::new();

        for (slot, element) in request.boards.iter().enumerate() {
            let BoardRequest::Serial { category_id, serial_number, .. } = element else {
                continue;
            };
            match self.allocator.claim_serial(*category_id, serial_number, &target).await {
                Ok(board) => issued_boards.push(board),
                Err(e) => {
                    warn!(id = %id, serial = %serial_number, error = %e, "Bulk element not issued");
                    failed_boards.push(FailedBoard {
                        category_id: *category_id,
                        serial_number: Some(serial_number.clone()),
                        quantity: None,
                        error: e.to_string(),
                    });
                }
            }
            slots[slot].push(element.clone());
        }

        for (slot, element) in request.boards.iter().enumerate() {
            let BoardRequest::Quantity { category_id, quantity } = element else {
                continue;
            };
            let claimed = match self.allocator.claim_quantity(*category_id, *quantity, &target).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    warn!(id = %id, category_id = %category_id, error = %e, "Bulk element not issued");
                    failed_boards.push(FailedBoard {
                        category_id: *category_id,
                        serial_number: None,
                        quantity: Some(*quantity),
                        error: e.to_string(),
                    });
                    slots[slot].push(element.clone());
                    continue;
                }
            };

            let found = u32::try_from(claimed.len()).unwrap_or(u32::MAX);
            for board in &claimed {
                slots[slot].push(BoardRequest::Serial {
                    category_id: *category_id,
                    serial_number: board.serial_number.clone(),
                    condition: Some(board.condition.clone()),
                });
            }
            if found < *quantity {
                let missing = quantity - found;
                failed_boards.push(FailedBoard {
                    category_id: *category_id,
                    serial_number: None,
                    quantity: Some(missing),
                    error: AppError::InsufficientStock {
                        category_id: *category_id,
                        requested: *quantity,
                        available: found,
                    }
                    .to_string(),
                });
                slots[slot].push(BoardRequest::Quantity {
                    category_id: *category_id,
                    quantity: missing,
                });
            }
            issued_boards.extend(claimed);
        }

        let status = BulkRequestStatus::after_issuance(issued_boards.len(), request.expected_total());
        let request = if status == BulkRequestStatus::Approved {
            self.release(&request).await;
            request
        } else {
            let updated = BulkIssueRequest {
                boards: slots.into_iter().flatten().collect(),
                status,
                ..request
            };
            if !self
                .store
                .update_bulk_request_if(BulkRequestStatus::Issued, &updated)
                .await?
            {
                warn!(id = %id, "Bulk request changed during issuance; status not recorded");
            }
            updated
        };

        info!(
            id = %id,
            status = %request.status,
            issued = issued_boards.len(),
            failed = failed_boards.len(),
            "Bulk issuance finished"
        );
        Ok(BulkIssueReport {
            request,
            issued_boards,
            failed_boards,
        })
    }

    /// Moves an approved request to `issued` with its elements untouched.
    /// Fails with `IssuanceInProgress` if the stored row is no longer approved.
    async fn lock_for_issuance(&self, request: &BulkIssueRequest) -> AppResult<()> {
        let locked = BulkIssueRequest {
            status: BulkRequestStatus::Issued,
            ..request.clone()
        };
        if !self
            .store
            .update_bulk_request_if(BulkRequestStatus::Approved, &locked)
            .await?
        {
            return Err(AppError::IssuanceInProgress(request.id));
        }
        Ok(())
    }

    /// Puts a locked request back to its approved state.
    async fn release(&self, approved: &BulkIssueRequest) {
        match self
            .store
            .update_bulk_request_if(BulkRequestStatus::Issued, approved)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(id = %approved.id, "Bulk request changed while locked; not returned to approved"),
            Err(e) => warn!(id = %approved.id, error = %e, "Failed to return bulk request to approved"),
        }
    }

    pub async fn delete(&self, grant: &AdminGrant, id: Uuid) -> AppResult<()> {
        if !self.store.delete_bulk_request(id).await? {
            return Err(AppError::NotFound(format!("Bulk issue request {} not found", id)));
        }
        info!(id = %id, by = grant.email(), "Bulk issue request deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{self, admin, user};
    use crate::store::{BoardFilter, MemoryStore};

    fn setup() -> (Arc<MemoryStore>, BulkRequestService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), BulkRequestService::new(store))
    }

    fn by_quantity(category_id: Uuid, quantity: u32) -> CategoryBoardRequest {
        CategoryBoardRequest {
            category_id,
            quantity: Some(quantity),
            serial_numbers: None,
        }
    }

    fn by_serials(category_id: Uuid, serials: &[&str]) -> CategoryBoardRequest {
        CategoryBoardRequest {
            category_id,
            quantity: None,
            serial_numbers: Some(serials.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn payload(categories: Vec<CategoryBoardRequest>) -> CreateBulkIssueRequest {
        CreateBulkIssueRequest {
            categories,
            issued_to: "line-4@example.com".to_string(),
            project_number: "PRJ-77".to_string(),
            comments: None,
        }
    }

    async fn approved(svc: &BulkRequestService, categories: Vec<CategoryBoardRequest>) -> BulkIssueRequest {
        let req = svc.create(&user(), payload(categories)).await.unwrap();
        let grant = admin().admin_grant().unwrap();
        svc.decide(&grant, req.id, Decision::Approved).await.unwrap()
    }

    fn issuer() -> IssueGrant {
        admin().issue_grant().unwrap()
    }

    #[tokio::test]
    async fn one_bad_entry_persists_nothing() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        let b = fixtures::category(&store, "B", 0).await;
        for i in 0..3 {
            fixtures::board(&store, &a, &format!("A-{i}"), BoardLocation::InStock, "New").await;
        }
        fixtures::board(&store, &b, "X", BoardLocation::IssuedForMachine, "New").await;

        let err = svc
            .create(&user(), payload(vec![by_quantity(a.id, 3), by_serials(b.id, &["X"])]))
            .await
            .unwrap_err();

        match err {
            AppError::BulkCreationFailed { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].category_id, b.id);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.list_bulk_requests().await.unwrap().is_empty());
        assert_eq!(store.count_boards(Some(a.id), &BoardFilter::Available).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn every_failing_entry_is_reported() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        let missing = Uuid::new_v4();

        let err = svc
            .create(&user(), payload(vec![by_quantity(a.id, 1), by_quantity(missing, 1)]))
            .await
            .unwrap_err();
        let AppError::BulkCreationFailed { failures } = err else {
            panic!("expected BulkCreationFailed");
        };
        let ids: Vec<Uuid> = failures.iter().map(|f| f.category_id).collect();
        assert_eq!(ids, vec![a.id, missing]);
    }

    #[tokio::test]
    async fn repeated_category_entries_share_stock() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        for i in 0..3 {
            fixtures::board(&store, &a, &format!("A-{i}"), BoardLocation::InStock, "New").await;
        }

        let err = svc
            .create(&user(), payload(vec![by_quantity(a.id, 2), by_serials(a.id, &["A-0", "A-1"])]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BulkCreationFailed { .. }));
    }

    #[tokio::test]
    async fn creation_stores_serials_concretely_and_quantities_bare() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        let b = fixtures::category(&store, "B", 0).await;
        fixtures::board(&store, &a, "A-1", BoardLocation::InStock, "Repaired").await;
        fixtures::board(&store, &b, "B-1", BoardLocation::InStock, "New").await;
        fixtures::board(&store, &b, "B-2", BoardLocation::InStock, "New").await;

        let req = svc
            .create(&user(), payload(vec![by_serials(a.id, &["A-1"]), by_quantity(b.id, 2)]))
            .await
            .unwrap();

        assert_eq!(req.status, BulkRequestStatus::Pending);
        assert_eq!(
            req.boards,
            vec![
                BoardRequest::Serial {
                    category_id: a.id,
                    serial_number: "A-1".to_string(),
                    condition: Some("Repaired".to_string()),
                },
                BoardRequest::Quantity { category_id: b.id, quantity: 2 },
            ]
        );
        assert_eq!(req.expected_total(), 3);
        // Quantity entries reserve nothing.
        assert_eq!(store.count_boards(Some(b.id), &BoardFilter::Available).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn pending_request_cannot_be_issued() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        fixtures::board(&store, &a, "A-1", BoardLocation::InStock, "New").await;
        let req = svc.create(&user(), payload(vec![by_quantity(a.id, 1)])).await.unwrap();

        let err = svc.issue(&issuer(), req.id, &OutwardOverrides::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotApprovedYet(_)));
    }

    #[tokio::test]
    async fn full_issuance_rolls_up_to_issued() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        let b = fixtures::category(&store, "B", 0).await;
        fixtures::board(&store, &a, "A-1", BoardLocation::InStock, "New").await;
        fixtures::board(&store, &b, "B-1", BoardLocation::InStock, "New").await;
        fixtures::board(&store, &b, "B-2", BoardLocation::Repairing, "Repaired").await;
        let req = approved(&svc, vec![by_serials(a.id, &["A-1"]), by_quantity(b.id, 2)]).await;

        let report = svc.issue(&issuer(), req.id, &OutwardOverrides::default()).await.unwrap();

        assert_eq!(report.request.status, BulkRequestStatus::Issued);
        assert_eq!(report.issued_boards.len(), 3);
        assert!(report.failed_boards.is_empty());
        assert!(report.request.boards.iter().all(|e| e.serial_number().is_some()));
        assert!(report.request.references(b.id, "B-2"));
        for board in &report.issued_boards {
            assert_eq!(board.location, BoardLocation::IssuedForMachine);
            assert_eq!(board.issued_to.as_deref(), Some("line-4@example.com"));
            assert_eq!(board.project_number.as_deref(), Some("PRJ-77"));
        }
        assert_eq!(svc.get(req.id).await.unwrap().status, BulkRequestStatus::Issued);
    }

    #[tokio::test]
    async fn shortfall_at_issuance_is_partial() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        let boards: Vec<Board> = {
            let mut v = Vec::new();
            for i in 1..=5 {
                v.push(fixtures::board(&store, &a, &format!("A-{i}"), BoardLocation::InStock, "New").await);
            }
            v
        };
        let req = approved(&svc, vec![by_quantity(a.id, 5)]).await;

        // Two boards leave stock between approval and issuance.
        let grant = issuer();
        let allocator = Allocator::new(store.clone());
        let direct = IssueTarget {
            issued_by: grant.email().to_string(),
            issued_to: "elsewhere".to_string(),
            project_number: "OTHER".to_string(),
            comments: String::new(),
        };
        allocator.claim_board(boards[0].id, &direct).await.unwrap();
        allocator.claim_board(boards[3].id, &direct).await.unwrap();

        let report = svc.issue(&grant, req.id, &OutwardOverrides::default()).await.unwrap();

        assert_eq!(report.request.status, BulkRequestStatus::PartiallyIssued);
        let serials: Vec<_> = report.issued_boards.iter().map(|b| b.serial_number.as_str()).collect();
        assert_eq!(serials, vec!["A-2", "A-3", "A-5"]);
        assert_eq!(report.failed_boards.len(), 1);
        assert_eq!(report.failed_boards[0].quantity, Some(2));
        assert_eq!(report.request.expected_total(), 5);
        assert!(report.request.boards.contains(&BoardRequest::Quantity { category_id: a.id, quantity: 2 }));
    }

    #[tokio::test]
    async fn zero_progress_stays_approved() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        let b = fixtures::board(&store, &a, "A-1", BoardLocation::InStock, "New").await;
        let req = approved(&svc, vec![by_serials(a.id, &["A-1"])]).await;

        Allocator::new(store.clone())
            .claim_board(
                b.id,
                &IssueTarget {
                    issued_by: "x".to_string(),
                    issued_to: "y".to_string(),
                    project_number: "z".to_string(),
                    comments: String::new(),
                },
            )
            .await
            .unwrap();

        let report = svc.issue(&issuer(), req.id, &OutwardOverrides::default()).await.unwrap();
        assert_eq!(report.request.status, BulkRequestStatus::Approved);
        assert!(report.issued_boards.is_empty());
        assert_eq!(report.failed_boards[0].serial_number.as_deref(), Some("A-1"));
        assert_eq!(svc.get(req.id).await.unwrap().status, BulkRequestStatus::Approved);
    }

    #[tokio::test]
    async fn issued_request_cannot_be_issued_again() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        fixtures::board(&store, &a, "A-1", BoardLocation::InStock, "New").await;
        let req = approved(&svc, vec![by_quantity(a.id, 1)]).await;

        svc.issue(&issuer(), req.id, &OutwardOverrides::default()).await.unwrap();
        let err = svc.issue(&issuer(), req.id, &OutwardOverrides::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotApprovedYet(_)));
    }

    #[tokio::test]
    async fn quantity_leaves_serials_named_by_the_same_request() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        fixtures::board(&store, &a, "A-0", BoardLocation::InStock, "New").await;
        fixtures::board(&store, &a, "A-1", BoardLocation::InStock, "New").await;
        let req = approved(&svc, vec![by_quantity(a.id, 1), by_serials(a.id, &["A-0"])]).await;

        let report = svc.issue(&issuer(), req.id, &OutwardOverrides::default()).await.unwrap();

        assert_eq!(report.request.status, BulkRequestStatus::Issued);
        assert!(report.failed_boards.is_empty());
        let mut serials: Vec<_> = report.issued_boards.iter().map(|b| b.serial_number.as_str()).collect();
        serials.sort();
        assert_eq!(serials, vec!["A-0", "A-1"]);
        // Concretized elements keep the request's order.
        let stored: Vec<_> = report.request.boards.iter().filter_map(BoardRequest::serial_number).collect();
        assert_eq!(stored, vec!["A-1", "A-0"]);
    }

    #[tokio::test]
    async fn stale_approved_snapshot_cannot_lock() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        for i in 0..4 {
            fixtures::board(&store, &a, &format!("A-{i}"), BoardLocation::InStock, "New").await;
        }
        let req = approved(&svc, vec![by_quantity(a.id, 2)]).await;
        let stale = svc.get(req.id).await.unwrap();

        // A second instance with its own in-process guard issues first.
        let other = BulkRequestService::new(store.clone());
        other.issue(&issuer(), req.id, &OutwardOverrides::default()).await.unwrap();

        let err = svc.lock_for_issuance(&stale).await.unwrap_err();
        assert!(matches!(err, AppError::IssuanceInProgress(_)));
        assert_eq!(store.count_boards(Some(a.id), &BoardFilter::Available).await.unwrap(), 2);
        assert_eq!(svc.get(req.id).await.unwrap().status, BulkRequestStatus::Issued);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn two_instances_issue_a_request_once() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        for i in 0..40 {
            fixtures::board(&store, &a, &format!("A-{i}"), BoardLocation::InStock, "New").await;
        }
        let id = approved(&svc, vec![by_quantity(a.id, 20)]).await.id;

        let (s1, s2) = (svc.clone(), BulkRequestService::new(store.clone()));
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { s1.issue(&issuer(), id, &OutwardOverrides::default()).await }),
            tokio::spawn(async move { s2.issue(&issuer(), id, &OutwardOverrides::default()).await }),
        );
        let results = [r1.unwrap(), r2.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in &results {
            if let Err(e) = result {
                assert!(matches!(e, AppError::IssuanceInProgress(_) | AppError::NotApprovedYet(_)));
            }
        }
        assert_eq!(store.count_boards(Some(a.id), &BoardFilter::Available).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn zero_progress_releases_the_lock() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        let req = approved_without_stock(&store, &svc, a.id).await;

        let report = svc.issue(&issuer(), req.id, &OutwardOverrides::default()).await.unwrap();
        assert_eq!(report.request.status, BulkRequestStatus::Approved);
        assert!(svc.lock_for_issuance(&svc.get(req.id).await.unwrap()).await.is_ok());
    }

    async fn approved_without_stock(store: &Arc<MemoryStore>, svc: &BulkRequestService, category_id: Uuid) -> BulkIssueRequest {
        let request = BulkIssueRequest {
            id: Uuid::new_v4(),
            boards: vec![BoardRequest::Quantity { category_id, quantity: 1 }],
            requested_by: "tech@example.com".to_string(),
            issued_to: "line-4@example.com".to_string(),
            project_number: "PRJ-77".to_string(),
            comments: None,
            status: BulkRequestStatus::Pending,
            approved_by: None,
            approved_date_time: None,
            created_at: Utc::now(),
        };
        store.insert_bulk_request(&request).await.unwrap();
        let grant = admin().admin_grant().unwrap();
        svc.decide(&grant, request.id, Decision::Approved).await.unwrap()
    }

    #[tokio::test]
    async fn approve_twice_is_invalid_transition() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        fixtures::board(&store, &a, "A-1", BoardLocation::InStock, "New").await;
        let req = approved(&svc, vec![by_quantity(a.id, 1)]).await;
        assert_eq!(req.approved_by.as_deref(), Some("admin@example.com"));

        let grant = admin().admin_grant().unwrap();
        let err = svc.decide(&grant, req.id, Decision::Rejected).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_bulk_issuance_never_double_allocates() {
        let (store, svc) = setup();
        let a = fixtures::category(&store, "A", 0).await;
        fixtures::board(&store, &a, "A-1", BoardLocation::InStock, "New").await;
        let first = approved(&svc, vec![by_quantity(a.id, 1)]).await;
        let second = approved(&svc, vec![by_quantity(a.id, 1)]).await;

        let (s1, s2) = (svc.clone(), svc.clone());
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { s1.issue(&issuer(), first.id, &OutwardOverrides::default()).await }),
            tokio::spawn(async move { s2.issue(&issuer(), second.id, &OutwardOverrides::default()).await }),
        );
        let reports = [r1.unwrap().unwrap(), r2.unwrap().unwrap()];

        let issued: usize = reports.iter().map(|r| r.issued_boards.len()).sum();
        assert_eq!(issued, 1);
        let statuses: Vec<_> = reports.iter().map(|r| r.request.status).collect();
        assert!(statuses.contains(&BulkRequestStatus::Issued));
        assert!(statuses.contains(&BulkRequestStatus::Approved));
    }
}
