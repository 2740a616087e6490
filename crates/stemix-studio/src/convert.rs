//! Input normalisation for the separation tools
//!
//! Demucs and spleeter only read WAV and MP3. Those files are copied into the
//! cache directory as-is; anything else is decoded and written to the cache
//! as `<stem>.wav`. Both steps are skipped when the cached file already
//! exists, so the cache is keyed by file name.

use std::path::{Path, PathBuf};

use stemix_core::audio_file::{read_audio, write_wav, AudioFileError};
use thiserror::Error;

/// Extensions the separation tools accept directly
pub const PASSTHROUGH_EXTENSIONS: &[&str] = &["wav", "mp3"];

/// Errors from preparing an input file
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Input has no file name: {0:?}")]
    NoFileName(PathBuf),

    #[error("Failed to copy {from:?} to {to:?}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create cache directory {path:?}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Audio(#[from] AudioFileError),
}

fn is_passthrough(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| PASSTHROUGH_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Path the cached copy of `source` lives at
pub fn cached_path(source: &Path, cache_dir: &Path) -> Result<PathBuf, ConvertError> {
    if is_passthrough(source) {
        let name = source
            .file_name()
            .ok_or_else(|| ConvertError::NoFileName(source.to_path_buf()))?;
        Ok(cache_dir.join(name))
    } else {
        let stem = source
            .file_stem()
            .ok_or_else(|| ConvertError::NoFileName(source.to_path_buf()))?;
        let mut name = stem.to_os_string();
        name.push(".wav");
        Ok(cache_dir.join(name))
    }
}

/// Make `source` available in a tool-readable format inside `cache_dir`
///
/// Returns the cached path.
pub fn prepare_input(source: &Path, cache_dir: &Path) -> Result<PathBuf, ConvertError> {
    std::fs::create_dir_all(cache_dir).map_err(|e| ConvertError::CacheDir {
        path: cache_dir.to_path_buf(),
        source: e,
    })?;

    let target = cached_path(source, cache_dir)?;
    if target.exists() {
        log::debug!("Using cached input {:?}", target);
        return Ok(target);
    }

    if is_passthrough(source) {
        std::fs::copy(source, &target).map_err(|e| ConvertError::Copy {
            from: source.to_path_buf(),
            to: target.clone(),
            source: e,
        })?;
        log::info!("Cached {:?} as {:?}", source, target);
    } else {
        log::info!("Converting {:?} to WAV", source);
        let (buffer, sample_rate) = read_audio(source)?;
        write_wav(&target, &buffer, sample_rate)?;
    }
    Ok(target)
}
