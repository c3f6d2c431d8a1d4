use std::fmt;
use std::sync::Arc;

use crate::database::ports::{
    CheckRepository, FindingRepository, ProviderRepository, ScanRepository,
};
use crate::database::{MemoryStore, PostgresDatabase};
use crate::error::{CoreError, Result};

/// Aggregates the repository ports used by the runner and the HTTP layer.
#[derive(Clone)]
pub struct AppUnitOfWork {
    pub providers: Arc<dyn ProviderRepository>,
    pub checks: Arc<dyn CheckRepository>,
    pub scans: Arc<dyn ScanRepository>,
    pub findings: Arc<dyn FindingRepository>,
}

impl fmt::Debug for AppUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppUnitOfWork")
            .field("providers", &self.providers.backend())
            .field("checks", &self.checks.backend())
            .field("scans", &self.scans.backend())
            .field("findings", &self.findings.backend())
            .finish()
    }
}

impl AppUnitOfWork {
    pub fn from_postgres(db: &PostgresDatabase) -> Self {
        Self {
            providers: Arc::new(db.providers().clone()),
            checks: Arc::new(db.checks().clone()),
            scans: Arc::new(db.scans().clone()),
            findings: Arc::new(db.findings().clone()),
        }
    }

    /// Every port backed by the same shared in-memory store.
    pub fn in_memory(store: &MemoryStore) -> Self {
        Self {
            providers: Arc::new(store.clone()),
            checks: Arc::new(store.clone()),
            scans: Arc::new(store.clone()),
            findings: Arc::new(store.clone()),
        }
    }
}

#[derive(Default)]
pub struct AppUnitOfWorkBuilder {
    providers: Option<Arc<dyn ProviderRepository>>,
    checks: Option<Arc<dyn CheckRepository>>,
    scans: Option<Arc<dyn ScanRepository>>,
    findings: Option<Arc<dyn FindingRepository>>,
}

impl fmt::Debug for AppUnitOfWorkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppUnitOfWorkBuilder")
            .field("providers", &self.providers.is_some())
            .field("checks", &self.checks.is_some())
            .field("scans", &self.scans.is_some())
            .field("findings", &self.findings.is_some())
            .finish()
    }
}

impl AppUnitOfWorkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_providers(mut self, repo: Arc<dyn ProviderRepository>) -> Self {
        self.providers = Some(repo);
        self
    }

    pub fn with_checks(mut self, repo: Arc<dyn CheckRepository>) -> Self {
        self.checks = Some(repo);
        self
    }

    pub fn with_scans(mut self, repo: Arc<dyn ScanRepository>) -> Self {
        self.scans = Some(repo);
        self
    }

    pub fn with_findings(mut self, repo: Arc<dyn FindingRepository>) -> Self {
        self.findings = Some(repo);
        self
    }

    pub fn build(self) -> Result<AppUnitOfWork> {
        fn missing(name: &str) -> CoreError {
            CoreError::Internal(format!("AppUnitOfWork missing {name} repository"))
        }

        Ok(AppUnitOfWork {
            providers: self.providers.ok_or_else(|| missing("providers"))?,
            checks: self.checks.ok_or_else(|| missing("checks"))?,
            scans: self.scans.ok_or_else(|| missing("scans"))?,
            findings: self.findings.ok_or_else(|| missing("findings"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_every_repository() {
        let store = MemoryStore::new();
        let err = AppUnitOfWorkBuilder::new()
            .with_providers(Arc::new(store.clone()))
            .with_checks(Arc::new(store.clone()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("scans"));

        let uow = AppUnitOfWorkBuilder::new()
            .with_providers(Arc::new(store.clone()))
            .with_checks(Arc::new(store.clone()))
            .with_scans(Arc::new(store.clone()))
            .with_findings(Arc::new(store))
            .build()
            .unwrap();
        let debug = format!("{uow:?}");
        assert!(debug.contains("MemoryStore"));
        assert!(!debug.contains("dyn "));
    }
}
