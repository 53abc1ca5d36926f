pub mod bulk_requests;
pub mod catalog;
pub mod issue_requests;
pub mod outward;
pub mod reports;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use uuid::Uuid;

pub use bulk_requests::{BulkIssueReport, BulkRequestService};
pub use catalog::CatalogService;
pub use issue_requests::IssueRequestService;
pub use outward::OutwardService;
pub use reports::ReportService;

/// Per-call overrides for the recipient fields written onto issued boards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutwardOverrides {
    pub issued_to: Option<String>,
    pub project_number: Option<String>,
    pub comments: Option<String>,
}

/// Request ids currently being issued by this process.
#[derive(Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlight {
    /// `None` if another caller already holds `id`.
    pub fn acquire(&self, id: Uuid) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if ids.insert(id) {
            Some(InFlightGuard {
                ids: self.ids.clone(),
                id,
            })
        } else {
            None
        }
    }
}

pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.remove(&self.id);
    }
}
