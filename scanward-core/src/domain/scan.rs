use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ids::{ProviderId, ScanId};
use crate::error::CoreError;

pub const NO_CHECKS_REASON: &str = "no checks found for provider";
pub const CHECKS_INCOMPLETE_REASON: &str = "some checks could not be completed";

/// Scan lifecycle. `Pending` → `InProgress` → `Completed` | `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ScanStatus {
    pub const ALL: [ScanStatus; 4] = [
        ScanStatus::Pending,
        ScanStatus::InProgress,
        ScanStatus::Completed,
        ScanStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::InProgress => "in_progress",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    /// Re-entering `InProgress` is allowed so a redelivered job can restart
    /// a run that crashed midway.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        match (self, next) {
            (ScanStatus::Pending, ScanStatus::InProgress) => true,
            (ScanStatus::InProgress, ScanStatus::InProgress) => true,
            (ScanStatus::InProgress, ScanStatus::Completed | ScanStatus::Failed) => true,
            _ => false,
        }
    }

    /// States from which `next` may be entered.
    pub fn predecessors(next: ScanStatus) -> impl Iterator<Item = ScanStatus> {
        Self::ALL
            .into_iter()
            .filter(move |from| from.can_transition_to(next))
    }

    /// `Conflict` unless the move from `self` to `next` is allowed.
    pub fn ensure_transition(&self, next: ScanStatus) -> Result<(), CoreError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "scan cannot move from {self} to {next}"
            )))
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "in_progress" => Ok(ScanStatus::InProgress),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            other => Err(CoreError::Internal(format!("unknown scan status '{other}'"))),
        }
    }
}

/// One execution run of all checks of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    pub id: ScanId,
    pub provider_id: ProviderId,
    pub status: ScanStatus,
    pub failed_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub name: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewScan {
    pub provider_id: ProviderId,
    pub name: String,
    pub comment: Option<String>,
}

/// Client-editable scan fields. `None` leaves the stored value untouched;
/// `comment: Some(None)` clears the comment.
#[derive(Debug, Clone, Default)]
pub struct ScanDetailsUpdate {
    pub name: Option<String>,
    pub comment: Option<Option<String>>,
}

/// Final write of a run: status, reason and finish time persisted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCompletion {
    pub status: ScanStatus,
    pub failed_reason: Option<String>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in [
            ScanStatus::Pending,
            ScanStatus::InProgress,
            ScanStatus::Completed,
            ScanStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ScanStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.as_str().to_string())
            );
        }
        assert!("running".parse::<ScanStatus>().is_err());
    }

    #[test]
    fn terminal_states_have_no_way_out() {
        for terminal in [ScanStatus::Completed, ScanStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in [
                ScanStatus::Pending,
                ScanStatus::InProgress,
                ScanStatus::Completed,
                ScanStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn predecessors_follow_the_transition_table() {
        let into_progress: Vec<_> = ScanStatus::predecessors(ScanStatus::InProgress).collect();
        assert_eq!(into_progress, [ScanStatus::Pending, ScanStatus::InProgress]);
        assert_eq!(ScanStatus::predecessors(ScanStatus::Pending).count(), 0);

        let err = ScanStatus::Completed
            .ensure_transition(ScanStatus::InProgress)
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn pending_only_moves_to_in_progress() {
        assert!(ScanStatus::Pending.can_transition_to(ScanStatus::InProgress));
        assert!(!ScanStatus::Pending.can_transition_to(ScanStatus::Completed));
        assert!(!ScanStatus::Pending.can_transition_to(ScanStatus::Failed));
    }
}
