use std::collections::HashMap;

use config::{Environment, File, FileFormat};
use once_cell::sync::Lazy;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub logging: Logging,
    pub application: Application,
    pub storage: Storage,
    pub archive: Archive,
    pub auth: Auth,
    pub web: Web,
}

#[derive(Deserialize)]
pub struct Application {
    pub name: String,
    pub port: u16,
}

#[derive(Deserialize)]
pub struct Storage {
    pub versions_file: String,
    pub temp_dir: Option<String>,
}

#[derive(Deserialize)]
pub struct Archive {
    pub extensions: Vec<String>,
}

#[derive(Deserialize)]
pub struct Auth {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct Web {
    pub public_dir: String,
    pub max_upload_bytes: usize,
}

#[derive(Deserialize)]
pub struct Logging {
    level: String,
    crates: HashMap<String, String>,
}

impl Logging {
    pub fn levels(&self) -> String {
        let crate_levels = self.crates.iter().map(|(lib, loglevel)| format!("{lib}={loglevel}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{},{crate_levels}", self.level)
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::load);

impl Config {
    fn load() -> Self {
        config::Config::builder()
            .add_source(File::from_str(include_str!("../config.yml"), FileFormat::Yaml))
            // optional operator override next to the binary
            .add_source(File::with_name("config.yml")
                .format(FileFormat::Yaml)
                .required(false))
            .add_source(Environment::with_prefix("APP")
                .try_parsing(true)
                .prefix_separator("_")
                .separator("__"))
            .add_source(Environment::with_prefix("UPDATER")
                .try_parsing(true)
                .prefix_separator("_")
                .separator("__"))
            .build()
            .expect("Error during config creation")
            .try_deserialize()
            .expect("Error during config deserialization")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_levels() {
        let logging = Logging {
            level: "INFO".to_string(),
            crates: HashMap::from([("updater_core".to_string(), "DEBUG".to_string())]),
        };
        assert_eq!(logging.levels(), "INFO,updater_core=DEBUG");
    }

    #[test]
    fn test_embedded_config_is_complete() {
        let config: Config = config::Config::builder()
            .add_source(File::from_str(include_str!("../config.yml"), FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.application.port, 8080);
        assert_eq!(config.storage.versions_file, "uploads/version.json");
        assert!(config.storage.temp_dir.is_none());
        assert_eq!(config.archive.extensions, vec!["jar".to_string()]);
        assert_eq!(config.web.public_dir, "public");
    }
}
