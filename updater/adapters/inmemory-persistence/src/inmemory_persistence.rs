use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use domain_model::Versions;
use updater_persistence_api::VersionRepository;

/// Keeps the document in process memory. Clones share the same document.
#[derive(Default, Clone)]
pub struct InMemoryPersistence {
    versions: Arc<Mutex<Option<Versions>>>,
}

#[async_trait]
impl VersionRepository for InMemoryPersistence {
    async fn load(&self) -> Result<Option<Versions>> {
        Ok(self.versions.lock()
            .await
            .clone())
    }

    async fn save(&self, versions: &Versions) -> Result<()> {
        self.versions.lock()
            .await
            .replace(versions.clone());
        Ok(())
    }
}
