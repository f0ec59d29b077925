use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use updater_config::CONFIG;
use updater_core::{MetadataExtractor, Registry, VersionRegistry};
use updater_json_file_persistence::JsonFilePersistence;
use updater_rest_api_server::{Credentials, ServerSettings};

pub async fn run() -> Result<()> {
    info!("▶ {} running...", CONFIG.application.name);

    let persistence = JsonFilePersistence::new(&CONFIG.storage.versions_file);
    let versions = VersionRegistry::load(persistence).await?;
    let extractor = MetadataExtractor::new(&CONFIG.archive.extensions);
    let registry = Registry::new(extractor, versions);
    updater_rest_api_server::run(server_settings(), registry).await
}

fn server_settings() -> ServerSettings {
    ServerSettings {
        port: CONFIG.application.port,
        credentials: Credentials::new(&CONFIG.auth.username, &CONFIG.auth.password),
        public_dir: PathBuf::from(&CONFIG.web.public_dir),
        temp_dir: CONFIG.storage.temp_dir.as_ref().map(PathBuf::from),
        max_upload_bytes: CONFIG.web.max_upload_bytes,
    }
}
