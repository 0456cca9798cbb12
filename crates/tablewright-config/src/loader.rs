use std::path::Path;

use serde::de::DeserializeOwned;
use tablewright_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// Environment variable overriding `database.url`.
pub const DATABASE_URL_ENV: &str = "TABLEWRIGHT_DATABASE_URL";

const DEFAULT_CONFIG_FILE: &str = "tablewright.yml";

/// Loads `AppConfig` from disk and layers environment overrides on top.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the configuration file at `path`, or `./tablewright.yml` when no
    /// path is given. Only the implicit default may be absent.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        // A missing .env file is the common case.
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => read_document(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    read_document(default_path)?
                } else {
                    debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                    AppConfig::default()
                }
            }
        };

        apply_overrides(&mut config, std::env::var(DATABASE_URL_ENV).ok());
        Ok(config)
    }
}

fn apply_overrides(config: &mut AppConfig, database_url: Option<String>) {
    if let Some(url) = database_url.filter(|u| !u.trim().is_empty()) {
        info!("database url taken from {DATABASE_URL_ENV}");
        config.database.url = Some(url);
    }
}

/// Deserialize a YAML, TOML or JSON document, chosen by file extension.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("YAML parse error in {}: {e}", path.display()))),
        "toml" => toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display()))),
        "json" => serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("JSON parse error in {}: {e}", path.display()))),
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}
