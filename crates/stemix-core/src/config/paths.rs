//! Standard locations for stemix files

use std::path::{Path, PathBuf};

/// Directory name under the platform config directory
pub const APP_DIR_NAME: &str = "stemix";

/// Directory name of the audio cache
pub const CACHE_DIR_NAME: &str = "StemixCache";

/// Get the default cache directory for converted files and separated stems
///
/// - Windows: `%APPDATA%\StemixCache`
/// - macOS: `~/Library/Application Support/StemixCache`
/// - elsewhere: `~/.cache/StemixCache` (honours `XDG_CACHE_HOME`)
///
/// The directory is not created here; see [`ensure_dir`].
pub fn default_cache_dir() -> PathBuf {
    let base = if cfg!(any(target_os = "windows", target_os = "macos")) {
        dirs::data_dir()
    } else {
        dirs::cache_dir()
    };
    base.unwrap_or_else(|| PathBuf::from("."))
        .join(CACHE_DIR_NAME)
}

/// Get the default config file path
///
/// Returns: `<config_dir>/stemix/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("config.yaml")
}

/// Create a directory (and parents) if absent, returning its path
pub fn ensure_dir(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_dir_name() {
        assert!(default_cache_dir().ends_with(CACHE_DIR_NAME));
    }

    #[test]
    fn test_config_path_layout() {
        let path = default_config_path();
        assert!(path.ends_with("stemix/config.yaml"));
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b");

        assert_eq!(ensure_dir(&target).unwrap(), target);
        assert!(target.is_dir());
        assert!(ensure_dir(&target).is_ok());
    }
}
