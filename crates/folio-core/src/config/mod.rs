//! Configuration loading for the reader driver.
//!
//! Settings are read from `conf/folio.toml` (or `FOLIO_CONFIG_PATH`). Any
//! missing or invalid entries fall back to defaults so a reader surface can
//! always mount.

mod defaults;
mod io;
mod models;

pub use io::{CONFIG_PATH_ENV, config_path, load_config, parse_config};
pub use models::{FolioConfig, LogLevel, LoggingConfig, StorageConfig, SurfaceConfig, SyncConfig};
