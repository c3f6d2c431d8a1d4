use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CheckId, FindingId, ProviderId, ScanId};
use crate::error::{CoreError, Result};

/// Recorded pass/fail outcome of one check within one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub scan_id: ScanId,
    pub check_id: CheckId,
    pub success: bool,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFinding {
    pub scan_id: ScanId,
    pub check_id: CheckId,
    pub success: bool,
    pub comment: Option<String>,
}

/// A finding may only link a scan and a check of the same provider.
pub fn ensure_same_provider(
    scan_provider: ProviderId,
    check_provider: ProviderId,
) -> Result<()> {
    if scan_provider != check_provider {
        return Err(CoreError::Validation(
            "`scan.provider` and `check.provider` must be the same".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_providers_are_a_validation_error() {
        let provider = ProviderId::new();
        assert!(ensure_same_provider(provider, provider).is_ok());

        let err = ensure_same_provider(provider, ProviderId::new()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
