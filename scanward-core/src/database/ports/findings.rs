use async_trait::async_trait;

use super::PageRequest;
use crate::domain::{Finding, FindingId, NewFinding, ScanId};
use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FindingRepository: Send + Sync {
    /// Concrete adapter behind the port, for diagnostics.
    fn backend(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Record a finding. Rejects with `CoreError::Validation` when the check
    /// and the scan belong to different providers, with
    /// `CoreError::Conflict` when the `(scan, check)` pair already exists and
    /// with `CoreError::NotFound` when either parent is missing.
    async fn create(&self, finding: NewFinding) -> Result<Finding>;

    async fn get(&self, scan_id: ScanId, id: FindingId) -> Result<Option<Finding>>;

    /// Findings of a scan, newest first.
    async fn list_for_scan(&self, scan_id: ScanId, page: PageRequest) -> Result<Vec<Finding>>;

    async fn count_for_scan(&self, scan_id: ScanId) -> Result<u64>;

    async fn all_for_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>>;

    /// Update the only client-editable field.
    async fn update_comment(
        &self,
        scan_id: ScanId,
        id: FindingId,
        comment: Option<String>,
    ) -> Result<Finding>;
}
