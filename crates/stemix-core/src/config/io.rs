//! YAML configuration I/O
//!
//! Loading never fails: a missing or broken file yields the type's defaults
//! so the application always starts. Saving reports errors to the caller.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load configuration from a YAML file
///
/// Returns `T::default()` when the file is missing, unreadable or does not
/// parse; the latter two are logged as warnings.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("No config at {:?}, using defaults", path);
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("Failed to read config {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("Failed to parse config {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("Saved config to {:?}", path);
    Ok(())
}
