use std::collections::BTreeMap;
use std::panic;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::RwLock;
use tracing::{debug, info};

use domain_model::Versions;
use updater_core_api::RegistryError;
use updater_persistence_api::VersionRepository;

/// Plugin name -> latest version, mirrored to a durable repository.
///
/// Reads are served from memory. An upsert holds the write lock across both the in-memory
/// update and the durable write, so the two copies never disagree once the call returns.
/// The update runs in its own task and completes even if the caller stops waiting.
pub struct VersionRegistry<R: VersionRepository> {
    repository: Arc<R>,
    versions: Arc<RwLock<BTreeMap<String, String>>>,
}

impl<R: VersionRepository> VersionRegistry<R> {
    /// Loads the durable copy, creating an empty one first if there is none.
    pub async fn load(repository: R) -> Result<Self> {
        let versions = match repository.load().await.context("Error during versions loading")? {
            Some(versions) => {
                info!("Loaded {} plugin versions", versions.versions.len());
                versions
            }
            None => {
                let versions = Versions::default();
                repository.save(&versions)
                    .await
                    .context("Error during empty versions creation")?;
                info!("Created empty versions registry");
                versions
            }
        };
        Ok(Self {
            repository: Arc::new(repository),
            versions: Arc::new(RwLock::new(versions.versions)),
        })
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        self.versions.read()
            .await
            .get(name)
            .cloned()
    }

    pub async fn list(&self) -> BTreeMap<String, String> {
        self.versions.read()
            .await
            .clone()
    }

    pub async fn upsert(&self, name: &str, version: &str) -> Result<(), RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidName);
        }
        let repository = Arc::clone(&self.repository);
        let versions = Arc::clone(&self.versions);
        let (name, version) = (name.to_string(), version.to_string());
        let update = tokio::spawn(async move {
            let mut versions = versions.write().await;
            let mut updated = versions.clone();
            let previous = updated.insert(name.clone(), version.clone());
            let document = Versions::new(updated);
            repository.save(&document)
                .await
                .with_context(|| format!("Error during saving version '{version}' of plugin '{name}'"))?;
            *versions = document.versions;
            debug!("Plugin '{name}' version: {previous:?} -> '{version}'");
            Ok::<_, anyhow::Error>(())
        });
        match update.await {
            Ok(result) => result.map_err(RegistryError::from),
            Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            Err(err) => Err(anyhow!("Version update was cancelled: {err}").into()),
        }
    }
}
