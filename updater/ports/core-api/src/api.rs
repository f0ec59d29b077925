use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use domain_model::{PluginDescriptor, RejectionReason};

#[async_trait]
pub trait RegistryApi: Send + Sync + 'static {
    async fn get_versions(&self) -> BTreeMap<String, String>;
    async fn get_version(&self, name: &str) -> Option<String>;
    /// Extracts the descriptor from a fully written archive and records its version.
    async fn add_plugin(&self, archive: &Path) -> Result<PluginDescriptor, RegistryError>;
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{0}")]
    Rejected(RejectionReason),
    #[error("Plugin name must not be empty")]
    InvalidName,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<RejectionReason> for RegistryError {
    fn from(value: RejectionReason) -> Self {
        Self::Rejected(value)
    }
}
