use super::models::FolioConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CONFIG_PATH_ENV: &str = "FOLIO_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "conf/folio.toml";

/// Resolve the config file location, honoring `FOLIO_CONFIG_PATH`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> FolioConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded config");
            data
        }
        Err(err) => {
            warn!(path = %path.display(), "Falling back to default config: {err}");
            return FolioConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            FolioConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<FolioConfig, toml::de::Error> {
    toml::from_str::<FolioConfig>(contents).map(FolioConfig::clamped)
}
