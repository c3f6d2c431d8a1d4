pub mod check;
pub mod finding;
pub mod ids;
pub mod names;
pub mod provider;
pub mod scan;
pub mod summary;

pub use check::Check;
pub use finding::{Finding, NewFinding, ensure_same_provider};
pub use ids::{CheckId, FindingId, ProviderId, ScanId};
pub use provider::{Provider, ProviderWithTotals};
pub use scan::{
    CHECKS_INCOMPLETE_REASON, NO_CHECKS_REASON, NewScan, Scan, ScanCompletion,
    ScanDetailsUpdate, ScanStatus,
};
pub use summary::{ScanCounts, ScanSummary};
