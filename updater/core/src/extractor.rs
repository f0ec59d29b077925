use std::fs;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use tracing::{debug, trace};
use zip::ZipArchive;

use domain_model::{PluginDescriptor, RejectionReason};

pub const PRIMARY_DESCRIPTOR: &str = "plugin.yml";
pub const FALLBACK_DESCRIPTOR: &str = "bungee.yml";
/// Upper bound on the decompressed descriptor; anything larger is rejected as malformed.
pub const MAX_DESCRIPTOR_BYTES: u64 = 1024 * 1024;

const DEFAULT_EXTENSION: &str = "jar";

/// Reads plugin metadata out of an uploaded archive without executing anything in it.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    extensions: Vec<String>,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(&[DEFAULT_EXTENSION.to_string()])
    }
}

impl MetadataExtractor {
    /// `extensions` gates on the file name before the archive is opened; empty disables the gate.
    pub fn new(extensions: &[String]) -> Self {
        let extensions = extensions.iter()
            .map(|extension| extension.trim_start_matches('.').to_lowercase())
            .filter(|extension| !extension.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn extract(&self, archive: &Path) -> Result<PluginDescriptor, RejectionReason> {
        let size = fs::metadata(archive)
            .ok()
            .filter(|metadata| metadata.is_file())
            .map(|metadata| metadata.len())
            .unwrap_or_default();
        if size == 0 {
            return Err(RejectionReason::ArchiveEmpty);
        }
        if !self.has_archive_extension(archive) {
            debug!("Rejected '{}': unexpected file extension", archive.display());
            return Err(RejectionReason::NotAnArchive);
        }

        let file = File::open(archive).map_err(|err| {
            debug!("Rejected '{}': {err}", archive.display());
            RejectionReason::NotAnArchive
        })?;
        let mut zip = ZipArchive::new(file).map_err(|err| {
            debug!("Rejected '{}': {err}", archive.display());
            RejectionReason::NotAnArchive
        })?;

        let entry_name = [PRIMARY_DESCRIPTOR, FALLBACK_DESCRIPTOR].into_iter()
            .find(|name| zip.index_for_name(name).is_some())
            .ok_or(RejectionReason::MetadataMissing)?;
        trace!("Reading descriptor '{entry_name}' from '{}'", archive.display());

        let mut content = Vec::new();
        zip.by_name(entry_name)
            .map_err(|err| err.to_string())
            .and_then(|entry| {
                entry.take(MAX_DESCRIPTOR_BYTES + 1)
                    .read_to_end(&mut content)
                    .map_err(|err| err.to_string())
            })
            .map_err(|err| {
                debug!("Unreadable descriptor '{entry_name}' in '{}': {err}", archive.display());
                RejectionReason::MalformedDescriptor
            })?;
        if content.len() as u64 > MAX_DESCRIPTOR_BYTES {
            debug!("Descriptor '{entry_name}' in '{}' exceeds {MAX_DESCRIPTOR_BYTES} bytes", archive.display());
            return Err(RejectionReason::MalformedDescriptor);
        }

        parse_descriptor(&content)
    }

    fn has_archive_extension(&self, archive: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        archive.extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| self.extensions.contains(&extension.to_lowercase()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(default, deserialize_with = "de_scalar_lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "de_scalar_lenient")]
    version: Option<String>,
}

// `version: 1.0` is a float to YAML but a version string to plugin authors
fn de_scalar_lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(value) => Some(value),
        Value::Number(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        _ => None,
    })
}

fn parse_descriptor(content: &[u8]) -> Result<PluginDescriptor, RejectionReason> {
    let raw: RawDescriptor = serde_yaml::from_slice(content).map_err(|err| {
        debug!("Descriptor is not valid YAML: {err}");
        RejectionReason::MalformedDescriptor
    })?;
    let name = raw.name.as_deref().map(str::trim).unwrap_or_default();
    let version = raw.version.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() || version.is_empty() {
        return Err(RejectionReason::MalformedDescriptor);
    }
    Ok(PluginDescriptor::new(name, version))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use tempfile::{tempdir, TempDir};
    use zip::write::SimpleFileOptions;

    use super::*;

    const ESSENTIALS: &str = "name: EssentialsX\nversion: 2.19.0\nmain: com.earth2me.essentials.Essentials\n";

    fn write_jar(dir: &TempDir, file_name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.path().join(file_name);
        let file = File::create(&path).expect("create jar");
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default())
                .expect("start jar entry");
            writer.write_all(content.as_bytes())
                .expect("write jar entry");
        }
        writer.finish().expect("finish jar");
        path
    }

    #[test]
    fn test_extract_primary_descriptor() {
        let dir = tempdir().unwrap();
        let jar = write_jar(&dir, "essentials.jar", &[
            ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
            ("plugin.yml", ESSENTIALS),
        ]);

        let descriptor = MetadataExtractor::default().extract(&jar).unwrap();
        assert_eq!(descriptor, PluginDescriptor::new("EssentialsX", "2.19.0"));
    }

    #[test]
    fn test_extract_fallback_descriptor() {
        let dir = tempdir().unwrap();
        let jar = write_jar(&dir, "proxy.jar", &[("bungee.yml", "name: ProxyTools\nversion: '4.2'\n")]);

        let descriptor = MetadataExtractor::default().extract(&jar).unwrap();
        assert_eq!(descriptor, PluginDescriptor::new("ProxyTools", "4.2"));
    }

    #[test]
    fn test_primary_descriptor_wins() {
        let dir = tempdir().unwrap();
        let jar = write_jar(&dir, "both.jar", &[
            ("bungee.yml", "name: Fallback\nversion: 0.1\n"),
            ("plugin.yml", "name: Primary\nversion: 1.1\n"),
        ]);

        let descriptor = MetadataExtractor::default().extract(&jar).unwrap();
        assert_eq!(descriptor.name, "Primary");
    }

    #[test]
    fn test_missing_file_is_empty_archive() {
        let dir = tempdir().unwrap();
        let result = MetadataExtractor::default().extract(&dir.path().join("absent.jar"));
        assert_eq!(result, Err(RejectionReason::ArchiveEmpty));
    }

    #[test]
    fn test_zero_length_file_is_empty_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.jar");
        File::create(&path).unwrap();

        let result = MetadataExtractor::default().extract(&path);
        assert_eq!(result, Err(RejectionReason::ArchiveEmpty));
    }

    #[test]
    fn test_wrong_extension_is_not_an_archive() {
        let dir = tempdir().unwrap();
        let zip = write_jar(&dir, "essentials.zip", &[("plugin.yml", ESSENTIALS)]);

        let result = MetadataExtractor::default().extract(&zip);
        assert_eq!(result, Err(RejectionReason::NotAnArchive));
    }

    #[test]
    fn test_non_zip_content_is_not_an_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.jar");
        fs::write(&path, "name: EssentialsX\nversion: 2.19.0\n").unwrap();

        let result = MetadataExtractor::default().extract(&path);
        assert_eq!(result, Err(RejectionReason::NotAnArchive));
    }

    #[test]
    fn test_extension_gate_can_be_disabled() {
        let dir = tempdir().unwrap();
        let zip = write_jar(&dir, "essentials.zip", &[("plugin.yml", ESSENTIALS)]);

        let descriptor = MetadataExtractor::new(&[]).extract(&zip).unwrap();
        assert_eq!(descriptor.version, "2.19.0");
    }

    #[test]
    fn test_extension_gate_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let jar = write_jar(&dir, "Essentials.JAR", &[("plugin.yml", ESSENTIALS)]);

        let descriptor = MetadataExtractor::new(&[".jar".to_string()]).extract(&jar).unwrap();
        assert_eq!(descriptor.name, "EssentialsX");
    }

    #[test]
    fn test_missing_descriptor() {
        let dir = tempdir().unwrap();
        let jar = write_jar(&dir, "library.jar", &[
            ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
            ("config/plugin.yml", ESSENTIALS),
        ]);

        let result = MetadataExtractor::default().extract(&jar);
        assert_eq!(result, Err(RejectionReason::MetadataMissing));
    }

    #[test]
    fn test_descriptor_without_version_is_malformed() {
        let dir = tempdir().unwrap();
        let jar = write_jar(&dir, "broken.jar", &[("plugin.yml", "name: Broken\nmain: a.b.C\n")]);

        let result = MetadataExtractor::default().extract(&jar);
        assert_eq!(result, Err(RejectionReason::MalformedDescriptor));
    }

    #[test]
    fn test_blank_name_is_malformed() {
        let dir = tempdir().unwrap();
        let jar = write_jar(&dir, "blank.jar", &[("plugin.yml", "name: '  '\nversion: 1.0.0\n")]);

        let result = MetadataExtractor::default().extract(&jar);
        assert_eq!(result, Err(RejectionReason::MalformedDescriptor));
    }

    #[test]
    fn test_invalid_yaml_is_malformed() {
        let dir = tempdir().unwrap();
        let jar = write_jar(&dir, "garbage.jar", &[("plugin.yml", "name: [unclosed\nversion: :\n")]);

        let result = MetadataExtractor::default().extract(&jar);
        assert_eq!(result, Err(RejectionReason::MalformedDescriptor));
    }

    #[test]
    fn test_oversized_descriptor_is_malformed() {
        let dir = tempdir().unwrap();
        let padding = "# padding\n".repeat(MAX_DESCRIPTOR_BYTES as usize / 10 + 1);
        let descriptor = format!("{ESSENTIALS}{padding}");
        let jar = write_jar(&dir, "bomb.jar", &[("plugin.yml", descriptor.as_str())]);

        let result = MetadataExtractor::default().extract(&jar);
        assert_eq!(result, Err(RejectionReason::MalformedDescriptor));
    }

    #[test]
    fn test_numeric_version_is_accepted() {
        let dir = tempdir().unwrap();
        let jar = write_jar(&dir, "numeric.jar", &[("plugin.yml", "name: Numeric\nversion: 1.5\nauthors: [someone]\n")]);

        let descriptor = MetadataExtractor::default().extract(&jar).unwrap();
        assert_eq!(descriptor.version, "1.5");
    }

    #[test]
    fn test_extract_leaves_archive_in_place() {
        let dir = tempdir().unwrap();
        let jar = write_jar(&dir, "essentials.jar", &[("plugin.yml", ESSENTIALS)]);
        let before = fs::read(&jar).unwrap();

        MetadataExtractor::default().extract(&jar).unwrap();
        assert_eq!(fs::read(&jar).unwrap(), before);
    }
}
