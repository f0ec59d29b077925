use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use domain_model::Versions;
use updater_persistence_api::VersionRepository;

/// Stores the registry as one pretty-printed JSON document.
///
/// Saves go to a sibling `<file>.tmp` which is flushed to disk and then renamed over the
/// target, so a crash leaves either the old or the new document, never a torn one.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut file_name = self.path.file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("versions"));
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }

    async fn write_temp(&self, temp_path: &Path, content: &[u8]) -> Result<()> {
        let mut file = fs::File::create(temp_path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl VersionRepository for JsonFilePersistence {
    async fn load(&self) -> Result<Option<Versions>> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err)
                .with_context(|| format!("Cannot read versions file '{}'", self.path.display())),
        };
        let versions = serde_json::from_slice(&content)
            .with_context(|| format!("Versions file '{}' is corrupted", self.path.display()))?;
        Ok(Some(versions))
    }

    async fn save(&self, versions: &Versions) -> Result<()> {
        let content = serde_json::to_vec_pretty(versions)?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
        }

        let temp_path = self.temp_path();
        if let Err(err) = self.write_temp(&temp_path, &content).await {
            if let Err(cleanup_err) = fs::remove_file(&temp_path).await {
                warn!("Cannot remove '{}': {cleanup_err}", temp_path.display());
            }
            return Err(err).with_context(|| format!("Cannot write '{}'", temp_path.display()));
        }
        fs::rename(&temp_path, &self.path)
            .await
            .with_context(|| format!("Cannot replace versions file '{}'", self.path.display()))?;
        debug!("Saved {} plugin versions to '{}'", versions.versions.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::tempdir;

    use super::*;

    fn versions(entries: &[(&str, &str)]) -> Versions {
        Versions::new(entries.iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect::<BTreeMap<_, _>>())
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("version.json"));

        assert_eq!(persistence.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_and_reload_in_fresh_instance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("uploads").join("version.json");
        let expected = versions(&[("EssentialsX", "2.19.0"), ("LuckPerms", "5.4.102")]);

        JsonFilePersistence::new(&path).save(&expected).await.unwrap();
        let loaded = JsonFilePersistence::new(&path).load().await.unwrap();

        assert_eq!(loaded, Some(expected));
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("version.json"));
        persistence.save(&versions(&[("EssentialsX", "2.19.0")])).await.unwrap();
        persistence.save(&versions(&[("EssentialsX", "2.19.1")])).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![OsString::from("version.json")]);
        assert!(!persistence.temp_path().exists());
    }

    #[tokio::test]
    async fn test_unknown_fields_are_dropped_on_rewrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("version.json");
        std::fs::write(&path, r#"{"versions": {"EssentialsX": "2.19.0"}, "generated_by": "v2"}"#).unwrap();
        let persistence = JsonFilePersistence::new(&path);

        let mut loaded = persistence.load().await.unwrap().unwrap();
        loaded.versions.insert("LuckPerms".to_string(), "5.4".to_string());
        persistence.save(&loaded).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("generated_by"));
        assert_eq!(persistence.load().await.unwrap(), Some(loaded));
    }

    #[tokio::test]
    async fn test_corrupted_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("version.json");
        std::fs::write(&path, "{\"versions\": {").unwrap();

        assert!(JsonFilePersistence::new(&path).load().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("version.json");
        let persistence = JsonFilePersistence::new(&path);
        let previous = versions(&[("EssentialsX", "2.19.0")]);
        persistence.save(&previous).await.unwrap();
        // a directory squatting on the temp path makes the temp write fail
        std::fs::create_dir(persistence.temp_path()).unwrap();

        assert!(persistence.save(&versions(&[("EssentialsX", "2.19.1")])).await.is_err());
        assert_eq!(persistence.load().await.unwrap(), Some(previous));
    }
}
