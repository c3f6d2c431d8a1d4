use async_trait::async_trait;

use super::PageRequest;
use crate::domain::{Check, CheckId, ProviderId};
use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckRepository: Send + Sync {
    /// Concrete adapter behind the port, for diagnostics.
    fn backend(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Insert a check under `provider_id`. A missing provider yields
    /// `CoreError::NotFound`; a duplicate name within the provider yields
    /// `CoreError::Conflict`.
    async fn create(&self, provider_id: ProviderId, name: &str) -> Result<Check>;

    /// Fetch a check scoped to its provider.
    async fn get(&self, provider_id: ProviderId, id: CheckId) -> Result<Option<Check>>;

    async fn list_for_provider(
        &self,
        provider_id: ProviderId,
        page: PageRequest,
    ) -> Result<Vec<Check>>;

    async fn count_for_provider(&self, provider_id: ProviderId) -> Result<u64>;

    /// Every check of a provider in the runner's stable order
    /// (provider name, then check name).
    async fn all_for_provider(&self, provider_id: ProviderId) -> Result<Vec<Check>>;

    async fn rename(&self, provider_id: ProviderId, id: CheckId, name: &str) -> Result<Check>;

    async fn delete(&self, provider_id: ProviderId, id: CheckId) -> Result<bool>;
}
