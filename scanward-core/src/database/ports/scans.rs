use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PageRequest;
use crate::domain::{
    NewScan, Scan, ScanCompletion, ScanDetailsUpdate, ScanId, ScanSummary,
};
use crate::error::Result;

#[async_trait]
pub trait ScanRepository: Send + Sync {
    /// Concrete adapter behind the port, for diagnostics.
    fn backend(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Insert a scan in `pending` state. A missing provider yields
    /// `CoreError::NotFound`; a duplicate name within the provider yields
    /// `CoreError::Conflict`.
    async fn create(&self, scan: NewScan) -> Result<Scan>;

    async fn get(&self, id: ScanId) -> Result<Option<Scan>>;

    /// Scans ordered newest first.
    async fn list(&self, page: PageRequest) -> Result<Vec<Scan>>;

    async fn count(&self) -> Result<u64>;

    /// Apply client-editable changes (`name`, `comment`). The provider is
    /// never touched.
    async fn update_details(&self, id: ScanId, update: ScanDetailsUpdate) -> Result<Scan>;

    /// Move a scan to `in_progress` and stamp `started_at`. Used by the runner
    /// only; the write is visible to readers immediately.
    async fn mark_started(&self, id: ScanId, started_at: DateTime<Utc>) -> Result<Scan>;

    /// Persist the terminal status, failure reason and `finished_at` together.
    async fn mark_finished(&self, id: ScanId, completion: ScanCompletion) -> Result<Scan>;

    async fn delete(&self, id: ScanId) -> Result<bool>;

    /// Aggregation view: derived counters and verdict computed from the
    /// current rows. `Ok(None)` when the scan does not exist.
    async fn summary(&self, id: ScanId) -> Result<Option<ScanSummary>>;
}
