use async_trait::async_trait;

use super::PageRequest;
use crate::domain::{Provider, ProviderId, ProviderWithTotals};
use crate::error::Result;

#[async_trait]
pub trait ProviderRepository: Send + Sync {
    /// Concrete adapter behind the port, for diagnostics.
    fn backend(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Insert a provider. Duplicate names yield `CoreError::Conflict`.
    async fn create(&self, name: &str) -> Result<Provider>;

    async fn get(&self, id: ProviderId) -> Result<Option<ProviderWithTotals>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Provider>>;

    /// Providers ordered by name, each with its `checks_total`.
    async fn list(&self, page: PageRequest) -> Result<Vec<ProviderWithTotals>>;

    async fn count(&self) -> Result<u64>;

    /// Rename a provider, refreshing `updated_at`. Missing rows yield
    /// `CoreError::NotFound`.
    async fn rename(&self, id: ProviderId, name: &str) -> Result<Provider>;

    /// Delete a provider together with its checks, scans and findings.
    /// Returns whether a row was removed.
    async fn delete(&self, id: ProviderId) -> Result<bool>;
}
