//! Development fixtures: providers and their checks loaded from JSON.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::AppUnitOfWork;
use crate::database::PageRequest;
use crate::domain::names::{CHECK_NAME_MAX_LEN, PROVIDER_NAME_MAX_LEN, normalize_name};
use crate::error::Result;

const BUNDLED: &str = include_str!("../fixtures/initial_data.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedData {
    pub providers: Vec<SeedProvider>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedProvider {
    pub name: String,
    #[serde(default)]
    pub checks: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub providers_created: usize,
    pub checks_created: usize,
}

impl SeedData {
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Insert every provider and check of `data` that does not exist yet.
pub async fn load(uow: &AppUnitOfWork, data: &SeedData) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for entry in &data.providers {
        let name = normalize_name("provider name", &entry.name, PROVIDER_NAME_MAX_LEN)?;
        let provider = match uow.providers.find_by_name(&name).await? {
            Some(existing) => existing,
            None => {
                report.providers_created += 1;
                uow.providers.create(&name).await?
            }
        };

        let existing = uow.checks.all_for_provider(provider.id).await?;
        for check in &entry.checks {
            let check = normalize_name("check name", check, CHECK_NAME_MAX_LEN)?;
            if existing.iter().any(|c| c.name == check) {
                continue;
            }
            uow.checks.create(provider.id, &check).await?;
            report.checks_created += 1;
        }
    }

    info!(
        providers_created = report.providers_created,
        checks_created = report.checks_created,
        "seed data loaded"
    );
    Ok(report)
}

/// Delete every provider; checks, scans and findings go with them.
pub async fn flush(uow: &AppUnitOfWork) -> Result<u64> {
    let providers = uow.providers.list(PageRequest::unbounded()).await?;
    let mut removed = 0;
    for entry in providers {
        if uow.providers.delete(entry.provider.id).await? {
            removed += 1;
        }
    }
    info!(removed, "flushed providers");
    Ok(removed)
}
