//! Transport DTOs shared by the HTTP layer and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::routes::{fill, v1};
use crate::database::PageRequest;
use crate::domain::{
    Check, CheckId, Finding, FindingId, ProviderId, ProviderWithTotals, Scan, ScanId,
    ScanStatus, ScanSummary,
};

/// Limit/offset page in the `{count, next, previous, results}` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// `base` is the collection path the links point back to.
    pub fn new(base: &str, page: PageRequest, count: u64, results: Vec<T>) -> Self {
        let limit = u64::from(page.limit);
        let next = page
            .offset
            .checked_add(limit)
            .filter(|next| *next < count)
            .map(|next| format!("{base}?limit={limit}&offset={next}"));
        let previous = (page.offset > 0).then(|| {
            if page.offset <= limit {
                format!("{base}?limit={limit}")
            } else {
                format!("{base}?limit={limit}&offset={}", page.offset - limit)
            }
        });

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Query string of list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

impl PageQuery {
    pub fn resolve(&self, default_limit: u32) -> PageRequest {
        PageRequest::new(
            self.limit.unwrap_or(default_limit),
            self.offset.unwrap_or(0),
        )
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateScanRequest {
    pub provider_id: Option<ProviderId>,
    pub name: Option<String>,
    pub comment: Option<String>,
}

/// `provider_id` is accepted and ignored; a scan's provider never changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScanRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub comment: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<ProviderId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFindingRequest {
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub comment: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub id: ProviderId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub checks_total: i64,
    pub url: String,
    pub checks_url: String,
}

impl From<ProviderWithTotals> for ProviderResponse {
    fn from(value: ProviderWithTotals) -> Self {
        let id = value.provider.id;
        Self {
            id,
            created_at: value.provider.created_at,
            updated_at: value.provider.updated_at,
            name: value.provider.name,
            checks_total: value.checks_total,
            url: fill(v1::providers::ITEM, &[("id", id.to_string())]),
            checks_url: fill(
                v1::providers::checks::COLLECTION,
                &[("provider_id", id.to_string())],
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub id: CheckId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub provider_id: ProviderId,
    pub name: String,
    pub url: String,
    pub provider_url: String,
}

impl From<Check> for CheckResponse {
    fn from(check: Check) -> Self {
        Self {
            url: fill(
                v1::providers::checks::ITEM,
                &[
                    ("provider_id", check.provider_id.to_string()),
                    ("id", check.id.to_string()),
                ],
            ),
            provider_url: fill(
                v1::providers::ITEM,
                &[("id", check.provider_id.to_string())],
            ),
            id: check.id,
            created_at: check.created_at,
            updated_at: check.updated_at,
            provider_id: check.provider_id,
            name: check.name,
        }
    }
}

/// Scan plus its read-time counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub id: ScanId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub provider_id: ProviderId,
    pub status: ScanStatus,
    pub failed_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub name: String,
    pub comment: Option<String>,
    pub checks_total: i64,
    pub checks_executed: i64,
    pub checks_pending: i64,
    pub checks_success: i64,
    pub checks_failed: i64,
    pub success: Option<bool>,
    pub url: String,
    pub status_url: String,
    pub findings_url: String,
}

impl ScanResponse {
    pub fn new(scan: Scan, summary: ScanSummary) -> Self {
        let id = scan.id.to_string();
        Self {
            url: fill(v1::scans::ITEM, &[("id", id.clone())]),
            status_url: fill(v1::scans::STATUS, &[("id", id.clone())]),
            findings_url: fill(v1::scans::findings::COLLECTION, &[("scan_id", id)]),
            id: scan.id,
            created_at: scan.created_at,
            updated_at: scan.updated_at,
            provider_id: scan.provider_id,
            status: scan.status,
            failed_reason: scan.failed_reason,
            started_at: scan.started_at,
            finished_at: scan.finished_at,
            name: scan.name,
            comment: scan.comment,
            checks_total: summary.checks_total,
            checks_executed: summary.checks_executed,
            checks_pending: summary.checks_pending,
            checks_success: summary.checks_success,
            checks_failed: summary.checks_failed,
            success: summary.success,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatusResponse {
    pub status: ScanStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingResponse {
    pub id: FindingId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scan_id: ScanId,
    pub check_id: CheckId,
    pub success: bool,
    pub comment: Option<String>,
    pub url: String,
    pub scan_url: String,
}

impl From<Finding> for FindingResponse {
    fn from(finding: Finding) -> Self {
        Self {
            url: fill(
                v1::scans::findings::ITEM,
                &[
                    ("scan_id", finding.scan_id.to_string()),
                    ("id", finding.id.to_string()),
                ],
            ),
            scan_url: fill(v1::scans::ITEM, &[("id", finding.scan_id.to_string())]),
            id: finding.id,
            created_at: finding.created_at,
            updated_at: finding.updated_at,
            scan_id: finding.scan_id,
            check_id: finding.check_id,
            success: finding.success,
            comment: finding.comment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_links_walk_the_collection() {
        let base = v1::scans::COLLECTION;

        let first: Page<()> = Page::new(base, PageRequest::new(10, 0), 25, vec![]);
        assert_eq!(first.next.as_deref(), Some("/api/v1/scans?limit=10&offset=10"));
        assert_eq!(first.previous, None);

        let second: Page<()> = Page::new(base, PageRequest::new(10, 10), 25, vec![]);
        assert_eq!(second.next.as_deref(), Some("/api/v1/scans?limit=10&offset=20"));
        assert_eq!(second.previous.as_deref(), Some("/api/v1/scans?limit=10"));

        let last: Page<()> = Page::new(base, PageRequest::new(10, 20), 25, vec![]);
        assert_eq!(last.next, None);
        assert_eq!(last.previous.as_deref(), Some("/api/v1/scans?limit=10&offset=10"));
    }

    #[test]
    fn offset_past_the_end_has_no_next_link() {
        let page: Page<()> = Page::new(
            v1::providers::COLLECTION,
            PageRequest::new(10, u64::MAX),
            3,
            vec![],
        );
        assert_eq!(page.next, None);
        assert_eq!(
            page.previous,
            Some(format!("/api/v1/providers?limit=10&offset={}", u64::MAX - 10))
        );
    }

    #[test]
    fn scan_update_tells_null_from_absent() {
        let absent: UpdateScanRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(absent.comment, None);

        let cleared: UpdateScanRequest = serde_json::from_str(r#"{"comment":null}"#).unwrap();
        assert_eq!(cleared.comment, Some(None));

        let set: UpdateFindingRequest = serde_json::from_str(r#"{"comment":"ok"}"#).unwrap();
        assert_eq!(set.comment, Some(Some("ok".to_string())));
    }

    #[test]
    fn health_status_is_lowercase() {
        let body = serde_json::to_value(HealthResponse {
            status: HealthStatus::Unhealthy,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"status": "unhealthy"}));
    }
}
