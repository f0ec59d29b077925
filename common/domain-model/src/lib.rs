use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Plugin metadata recovered from an uploaded archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
}

impl PluginDescriptor {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

/// Why an uploaded archive was refused. Checked in declaration order.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("Uploaded archive is empty")]
    ArchiveEmpty,
    #[error("Uploaded file is not a .jar archive")]
    NotAnArchive,
    #[error("Archive contains neither plugin.yml nor bungee.yml")]
    MetadataMissing,
    #[error("Plugin descriptor is missing a valid name or version")]
    MalformedDescriptor,
}

impl RejectionReason {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Durable registry document: plugin name -> latest version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versions {
    #[serde(default)]
    pub versions: BTreeMap<String, String>,
}

impl Versions {
    pub fn new(versions: BTreeMap<String, String>) -> Self {
        Self { versions }
    }
}
