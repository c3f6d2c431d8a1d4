use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CheckId, ProviderId};

/// A named rule definition belonging to a provider. Checks carry no
/// execution logic; the runner only references them from findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub id: CheckId,
    pub provider_id: ProviderId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
