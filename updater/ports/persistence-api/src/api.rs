use anyhow::Result;
use async_trait::async_trait;

use domain_model::Versions;

/// Durable copy of the version registry. Documents are always read and written whole.
#[async_trait]
pub trait VersionRepository: Send + Sync + 'static {
    /// Returns `None` when no durable copy exists yet.
    async fn load(&self) -> Result<Option<Versions>>;
    /// Replaces the durable copy. Must never leave a partially written document behind.
    async fn save(&self, versions: &Versions) -> Result<()>;
}
