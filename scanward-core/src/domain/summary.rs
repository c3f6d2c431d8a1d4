//! Read-time aggregation over a scan's provider checks and its findings.
//!
//! Nothing here is stored: counters and the overall verdict are recomputed
//! from the current rows on every read, so callers must not cache a summary
//! across writes.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ids::ScanId, scan::ScanStatus};

/// Raw counts as produced by a storage adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    /// Distinct checks defined for the scan's provider.
    pub checks_total: i64,
    /// Distinct findings recorded for the scan.
    pub checks_executed: i64,
    pub checks_success: i64,
    pub checks_failed: i64,
}

/// Derived per-scan counters plus the overall success verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub checks_total: i64,
    pub checks_executed: i64,
    pub checks_pending: i64,
    pub checks_success: i64,
    pub checks_failed: i64,
    /// `None` until the scan is completed.
    pub success: Option<bool>,
}

impl ScanSummary {
    pub fn from_counts(scan_id: ScanId, status: ScanStatus, counts: ScanCounts) -> Self {
        let checks_pending = counts.checks_total - counts.checks_executed;
        if checks_pending < 0 {
            warn!(
                scan_id = %scan_id,
                checks_total = counts.checks_total,
                checks_executed = counts.checks_executed,
                "scan has more findings than its provider has checks"
            );
        }

        Self {
            checks_total: counts.checks_total,
            checks_executed: counts.checks_executed,
            checks_pending,
            checks_success: counts.checks_success,
            checks_failed: counts.checks_failed,
            success: verdict(status, counts),
        }
    }
}

/// `None` unless completed; `false` when completed without findings;
/// otherwise every finding must have succeeded.
pub fn verdict(status: ScanStatus, counts: ScanCounts) -> Option<bool> {
    if status != ScanStatus::Completed {
        return None;
    }
    if counts.checks_executed == 0 {
        return Some(false);
    }
    Some(counts.checks_failed == 0)
}
