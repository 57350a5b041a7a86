//! Configuration file and data folder resolution
//!
//! Priority order for both lookups:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML `root_folder` value (root folder only)
//! 4. Platform default via `dirs` (fallback)

use crate::{Error, Result};
use std::path::PathBuf;
use tracing::debug;

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "CUEDECK_CONFIG";

/// Environment variable naming the data (root) folder
pub const ROOT_FOLDER_ENV_VAR: &str = "CUEDECK_ROOT";

const APP_DIR: &str = "cuedeck";

/// Locate the TOML config file
///
/// Returns `Ok(None)` when no explicit path was given and the platform
/// default does not exist; callers then run with built-in defaults. An
/// explicit path (CLI or env) that does not exist is an error.
pub fn resolve_config_path(cli_arg: Option<&str>) -> Result<Option<PathBuf>> {
    let explicit = cli_arg
        .map(PathBuf::from)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));

    if let Some(path) = explicit {
        if path.exists() {
            debug!("Using config file {:?}", path);
            return Ok(Some(path));
        }
        return Err(Error::Config(format!("Config file not found: {:?}", path)));
    }

    Ok(default_config_file().filter(|p| p.exists()))
}

/// Resolve the data folder holding the cue database, media and speech cache
pub fn resolve_root_folder(cli_arg: Option<&str>, config_value: Option<&str>) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        return PathBuf::from(path);
    }
    if let Some(path) = config_value {
        return PathBuf::from(path);
    }
    default_root_folder()
}

/// Platform config file path (`~/.config/cuedeck/config.toml` on Linux)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// OS-dependent default data folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/cuedeck"))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("./cuedeck_data"))
    }
}
