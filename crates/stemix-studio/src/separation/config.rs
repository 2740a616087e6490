//! Separation configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// External tool used to split a mix into stems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeparationMethod {
    #[default]
    Demucs,
    Spleeter,
}

impl SeparationMethod {
    /// All methods (for help output)
    pub const ALL: [SeparationMethod; 2] = [SeparationMethod::Demucs, SeparationMethod::Spleeter];

    /// Lowercase name as typed on the console
    pub fn name(&self) -> &'static str {
        match self {
            Self::Demucs => "demucs",
            Self::Spleeter => "spleeter",
        }
    }

    /// Parse a method name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Cache subdirectory the tool writes into
    pub fn output_dir_name(&self) -> &'static str {
        match self {
            Self::Demucs => "Demucs_Output",
            Self::Spleeter => "Spleeter_Output",
        }
    }

    /// Folder holding the stems of `base_name` under `output_root`
    ///
    /// Demucs nests its results under the model name, spleeter does not.
    pub fn stem_dir(&self, output_root: &Path, base_name: &str) -> PathBuf {
        match self {
            Self::Demucs => output_root.join("htdemucs").join(base_name),
            Self::Spleeter => output_root.join(base_name),
        }
    }
}

impl std::fmt::Display for SeparationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for stem separation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Method used when a split command names none
    pub default_method: SeparationMethod,
    /// Demucs executable (looked up on PATH when relative)
    pub demucs_program: PathBuf,
    /// Spleeter executable
    pub spleeter_program: PathBuf,
    /// Spleeter model descriptor
    pub spleeter_model: String,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            default_method: SeparationMethod::Demucs,
            demucs_program: PathBuf::from("demucs"),
            spleeter_program: PathBuf::from("spleeter"),
            spleeter_model: "spleeter:4stems".to_string(),
        }
    }
}
