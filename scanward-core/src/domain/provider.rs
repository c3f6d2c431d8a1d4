use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ProviderId;

/// A cloud/service vendor namespace under which checks and scans are scoped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Provider row plus the number of checks defined for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderWithTotals {
    pub provider: Provider,
    pub checks_total: i64,
}
