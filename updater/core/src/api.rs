use std::collections::BTreeMap;
use std::panic;
use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{info, warn};

use domain_model::PluginDescriptor;
use updater_core_api::{RegistryApi, RegistryError};
use updater_persistence_api::VersionRepository;

use crate::extractor::MetadataExtractor;
use crate::registry::VersionRegistry;

pub struct Registry<R: VersionRepository> {
    extractor: MetadataExtractor,
    versions: VersionRegistry<R>,
}

impl<R: VersionRepository> Registry<R> {
    pub fn new(extractor: MetadataExtractor, versions: VersionRegistry<R>) -> Self {
        Self {
            extractor,
            versions,
        }
    }
}

#[async_trait]
impl<R: VersionRepository> RegistryApi for Registry<R> {
    async fn get_versions(&self) -> BTreeMap<String, String> {
        self.versions.list().await
    }

    async fn get_version(&self, name: &str) -> Option<String> {
        self.versions.get(name).await
    }

    async fn add_plugin(&self, archive: &Path) -> Result<PluginDescriptor, RegistryError> {
        let extractor = self.extractor.clone();
        let path = archive.to_path_buf();
        let extracted = match tokio::task::spawn_blocking(move || extractor.extract(&path)).await {
            Ok(extracted) => extracted,
            Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            Err(err) => return Err(anyhow!("Extraction of '{}' was cancelled: {err}", archive.display()).into()),
        };
        let descriptor = extracted.map_err(|reason| {
            warn!("Rejected upload '{}': {reason}", archive.display());
            reason
        })?;

        info!("plugin name: {}", descriptor.name);
        info!("plugin version: {}", descriptor.version);
        self.versions.upsert(&descriptor.name, &descriptor.version).await?;
        Ok(descriptor)
    }
}
