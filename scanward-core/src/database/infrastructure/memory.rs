//! In-process adapter implementing every repository port over shared maps.
//!
//! Mirrors the PostgreSQL schema rules: name uniqueness per scope, the
//! `(scan, check)` finding pair, cascading deletes and the finding provider
//! check. Used when no database is configured and throughout the test suites.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::database::ports::{
    CheckRepository, FindingRepository, PageRequest, ProviderRepository, ScanRepository,
};
use crate::domain::{
    Check, CheckId, Finding, FindingId, NewFinding, NewScan, Provider, ProviderId,
    ProviderWithTotals, Scan, ScanCompletion, ScanCounts, ScanDetailsUpdate, ScanId,
    ScanStatus, ScanSummary, ensure_same_provider,
};
use crate::error::{CoreError, Result};

#[derive(Debug, Default)]
struct MemoryState {
    providers: BTreeMap<ProviderId, Provider>,
    checks: BTreeMap<CheckId, Check>,
    scans: BTreeMap<ScanId, Scan>,
    findings: BTreeMap<FindingId, Finding>,
}

impl MemoryState {
    fn checks_total(&self, provider_id: ProviderId) -> i64 {
        self.checks
            .values()
            .filter(|c| c.provider_id == provider_id)
            .count() as i64
    }

    fn with_totals(&self, provider: &Provider) -> ProviderWithTotals {
        ProviderWithTotals {
            provider: provider.clone(),
            checks_total: self.checks_total(provider.id),
        }
    }

    fn provider_name(&self, id: ProviderId) -> &str {
        self.providers
            .get(&id)
            .map(|p| p.name.as_str())
            .unwrap_or_default()
    }

    fn remove_scan_cascade(&mut self, scan_id: ScanId) -> bool {
        let removed = self.scans.remove(&scan_id).is_some();
        if removed {
            self.findings.retain(|_, f| f.scan_id != scan_id);
        }
        removed
    }

    fn remove_check_cascade(&mut self, check_id: CheckId) -> bool {
        let removed = self.checks.remove(&check_id).is_some();
        if removed {
            self.findings.retain(|_, f| f.check_id != check_id);
        }
        removed
    }
}

/// Shared in-memory store. Cloning hands out another handle to the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, uuid::Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn conflict(message: impl Into<String>) -> CoreError {
    CoreError::Conflict(message.into())
}

#[async_trait]
impl ProviderRepository for MemoryStore {
    async fn create(&self, name: &str) -> Result<Provider> {
        let mut state = self.state.write().await;
        if state.providers.values().any(|p| p.name == name) {
            return Err(conflict(format!("provider named '{name}' already exists")));
        }

        let now = Utc::now();
        let provider = Provider {
            id: ProviderId::new(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.providers.insert(provider.id, provider.clone());
        Ok(provider)
    }

    async fn get(&self, id: ProviderId) -> Result<Option<ProviderWithTotals>> {
        let state = self.state.read().await;
        Ok(state.providers.get(&id).map(|p| state.with_totals(p)))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Provider>> {
        let state = self.state.read().await;
        Ok(state.providers.values().find(|p| p.name == name).cloned())
    }

    async fn list(&self, page: PageRequest) -> Result<Vec<ProviderWithTotals>> {
        let state = self.state.read().await;
        let mut providers: Vec<&Provider> = state.providers.values().collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page.window(providers.into_iter().map(|p| state.with_totals(p))))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.state.read().await.providers.len() as u64)
    }

    async fn rename(&self, id: ProviderId, name: &str) -> Result<Provider> {
        let mut state = self.state.write().await;
        if state.providers.values().any(|p| p.name == name && p.id != id) {
            return Err(conflict(format!("provider named '{name}' already exists")));
        }

        let provider = state
            .providers
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("provider", id))?;
        provider.name = name.to_string();
        provider.updated_at = Utc::now();
        Ok(provider.clone())
    }

    async fn delete(&self, id: ProviderId) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.providers.remove(&id).is_none() {
            return Ok(false);
        }

        let scan_ids: Vec<ScanId> = state
            .scans
            .values()
            .filter(|s| s.provider_id == id)
            .map(|s| s.id)
            .collect();
        for scan_id in scan_ids {
            state.remove_scan_cascade(scan_id);
        }

        let check_ids: Vec<CheckId> = state
            .checks
            .values()
            .filter(|c| c.provider_id == id)
            .map(|c| c.id)
            .collect();
        for check_id in check_ids {
            state.remove_check_cascade(check_id);
        }
        Ok(true)
    }
}

#[async_trait]
impl CheckRepository for MemoryStore {
    async fn create(&self, provider_id: ProviderId, name: &str) -> Result<Check> {
        let mut state = self.state.write().await;
        if !state.providers.contains_key(&provider_id) {
            return Err(CoreError::not_found("provider", provider_id));
        }
        if state
            .checks
            .values()
            .any(|c| c.provider_id == provider_id && c.name == name)
        {
            return Err(conflict(format!(
                "check named '{name}' already exists for provider {provider_id}"
            )));
        }

        let now = Utc::now();
        let check = Check {
            id: CheckId::new(),
            provider_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.checks.insert(check.id, check.clone());
        Ok(check)
    }

    async fn get(&self, provider_id: ProviderId, id: CheckId) -> Result<Option<Check>> {
        let state = self.state.read().await;
        Ok(state
            .checks
            .get(&id)
            .filter(|c| c.provider_id == provider_id)
            .cloned())
    }

    async fn list_for_provider(
        &self,
        provider_id: ProviderId,
        page: PageRequest,
    ) -> Result<Vec<Check>> {
        let state = self.state.read().await;
        let mut checks: Vec<Check> = state
            .checks
            .values()
            .filter(|c| c.provider_id == provider_id)
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page.window(checks.into_iter()))
    }

    async fn count_for_provider(&self, provider_id: ProviderId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.checks_total(provider_id) as u64)
    }

    async fn all_for_provider(&self, provider_id: ProviderId) -> Result<Vec<Check>> {
        let state = self.state.read().await;
        let mut checks: Vec<Check> = state
            .checks
            .values()
            .filter(|c| c.provider_id == provider_id)
            .cloned()
            .collect();
        checks.sort_by(|a, b| {
            state
                .provider_name(a.provider_id)
                .cmp(state.provider_name(b.provider_id))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(checks)
    }

    async fn rename(&self, provider_id: ProviderId, id: CheckId, name: &str) -> Result<Check> {
        let mut state = self.state.write().await;
        if state
            .checks
            .values()
            .any(|c| c.provider_id == provider_id && c.name == name && c.id != id)
        {
            return Err(conflict(format!(
                "check named '{name}' already exists for provider {provider_id}"
            )));
        }

        let check = state
            .checks
            .get_mut(&id)
            .filter(|c| c.provider_id == provider_id)
            .ok_or_else(|| CoreError::not_found("check", id))?;
        check.name = name.to_string();
        check.updated_at = Utc::now();
        Ok(check.clone())
    }

    async fn delete(&self, provider_id: ProviderId, id: CheckId) -> Result<bool> {
        let mut state = self.state.write().await;
        let owned = state
            .checks
            .get(&id)
            .is_some_and(|c| c.provider_id == provider_id);
        Ok(owned && state.remove_check_cascade(id))
    }
}

#[async_trait]
impl ScanRepository for MemoryStore {
    async fn create(&self, scan: NewScan) -> Result<Scan> {
        let mut state = self.state.write().await;
        if !state.providers.contains_key(&scan.provider_id) {
            return Err(CoreError::not_found("provider", scan.provider_id));
        }
        if state
            .scans
            .values()
            .any(|s| s.provider_id == scan.provider_id && s.name == scan.name)
        {
            return Err(conflict(format!(
                "scan named '{}' already exists for provider {}",
                scan.name, scan.provider_id
            )));
        }

        let now = Utc::now();
        let record = Scan {
            id: ScanId::new(),
            provider_id: scan.provider_id,
            status: ScanStatus::Pending,
            failed_reason: None,
            started_at: None,
            finished_at: None,
            name: scan.name,
            comment: scan.comment,
            created_at: now,
            updated_at: now,
        };
        state.scans.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: ScanId) -> Result<Option<Scan>> {
        Ok(self.state.read().await.scans.get(&id).cloned())
    }

    async fn list(&self, page: PageRequest) -> Result<Vec<Scan>> {
        let state = self.state.read().await;
        let mut scans: Vec<Scan> = state.scans.values().cloned().collect();
        newest_first(&mut scans, |s| (s.created_at, s.id.as_uuid()));
        Ok(page.window(scans.into_iter()))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.state.read().await.scans.len() as u64)
    }

    async fn update_details(&self, id: ScanId, update: ScanDetailsUpdate) -> Result<Scan> {
        let mut state = self.state.write().await;
        let provider_id = state
            .scans
            .get(&id)
            .map(|s| s.provider_id)
            .ok_or_else(|| CoreError::not_found("scan", id))?;

        if let Some(name) = update.name.as_deref()
            && state
                .scans
                .values()
                .any(|s| s.provider_id == provider_id && s.name == name && s.id != id)
        {
            return Err(conflict(format!(
                "scan named '{name}' already exists for provider {provider_id}"
            )));
        }

        let scan = state
            .scans
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("scan", id))?;
        if let Some(name) = update.name {
            scan.name = name;
        }
        if let Some(comment) = update.comment {
            scan.comment = comment;
        }
        scan.updated_at = Utc::now();
        Ok(scan.clone())
    }

    async fn mark_started(&self, id: ScanId, started_at: DateTime<Utc>) -> Result<Scan> {
        let mut state = self.state.write().await;
        let scan = state
            .scans
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("scan", id))?;
        scan.status.ensure_transition(ScanStatus::InProgress)?;
        scan.status = ScanStatus::InProgress;
        scan.started_at = Some(started_at);
        scan.updated_at = started_at;
        Ok(scan.clone())
    }

    async fn mark_finished(&self, id: ScanId, completion: ScanCompletion) -> Result<Scan> {
        let mut state = self.state.write().await;
        let scan = state
            .scans
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("scan", id))?;
        scan.status.ensure_transition(completion.status)?;
        scan.status = completion.status;
        scan.failed_reason = completion.failed_reason;
        scan.finished_at = Some(completion.finished_at);
        scan.updated_at = completion.finished_at;
        Ok(scan.clone())
    }

    async fn delete(&self, id: ScanId) -> Result<bool> {
        Ok(self.state.write().await.remove_scan_cascade(id))
    }

    async fn summary(&self, id: ScanId) -> Result<Option<ScanSummary>> {
        let state = self.state.read().await;
        let Some(scan) = state.scans.get(&id) else {
            return Ok(None);
        };

        let mut counts = ScanCounts {
            checks_total: state.checks_total(scan.provider_id),
            ..ScanCounts::default()
        };
        for finding in state.findings.values().filter(|f| f.scan_id == id) {
            counts.checks_executed += 1;
            if finding.success {
                counts.checks_success += 1;
            } else {
                counts.checks_failed += 1;
            }
        }

        Ok(Some(ScanSummary::from_counts(id, scan.status, counts)))
    }
}

#[async_trait]
impl FindingRepository for MemoryStore {
    async fn create(&self, finding: NewFinding) -> Result<Finding> {
        let mut state = self.state.write().await;
        let scan_provider = state
            .scans
            .get(&finding.scan_id)
            .map(|s| s.provider_id)
            .ok_or_else(|| CoreError::not_found("scan", finding.scan_id))?;
        let check_provider = state
            .checks
            .get(&finding.check_id)
            .map(|c| c.provider_id)
            .ok_or_else(|| CoreError::not_found("check", finding.check_id))?;

        ensure_same_provider(scan_provider, check_provider)?;

        if state
            .findings
            .values()
            .any(|f| f.scan_id == finding.scan_id && f.check_id == finding.check_id)
        {
            return Err(conflict(format!(
                "finding for check {} already recorded on scan {}",
                finding.check_id, finding.scan_id
            )));
        }

        let now = Utc::now();
        let record = Finding {
            id: FindingId::new(),
            scan_id: finding.scan_id,
            check_id: finding.check_id,
            success: finding.success,
            comment: finding.comment,
            created_at: now,
            updated_at: now,
        };
        state.findings.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, scan_id: ScanId, id: FindingId) -> Result<Option<Finding>> {
        let state = self.state.read().await;
        Ok(state
            .findings
            .get(&id)
            .filter(|f| f.scan_id == scan_id)
            .cloned())
    }

    async fn list_for_scan(&self, scan_id: ScanId, page: PageRequest) -> Result<Vec<Finding>> {
        let state = self.state.read().await;
        let mut findings: Vec<Finding> = state
            .findings
            .values()
            .filter(|f| f.scan_id == scan_id)
            .cloned()
            .collect();
        newest_first(&mut findings, |f| (f.created_at, f.id.as_uuid()));
        Ok(page.window(findings.into_iter()))
    }

    async fn count_for_scan(&self, scan_id: ScanId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.findings.values().filter(|f| f.scan_id == scan_id).count() as u64)
    }

    async fn all_for_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>> {
        let state = self.state.read().await;
        Ok(state
            .findings
            .values()
            .filter(|f| f.scan_id == scan_id)
            .cloned()
            .collect())
    }

    async fn update_comment(
        &self,
        scan_id: ScanId,
        id: FindingId,
        comment: Option<String>,
    ) -> Result<Finding> {
        let mut state = self.state.write().await;
        let finding = state
            .findings
            .get_mut(&id)
            .filter(|f| f.scan_id == scan_id)
            .ok_or_else(|| CoreError::not_found("finding", id))?;
        finding.comment = comment;
        finding.updated_at = Utc::now();
        Ok(finding.clone())
    }
}
