//! Shared configuration utilities
//!
//! - Generic YAML config loading/saving with fallback to defaults
//! - Standard locations for the config file and the audio cache
//!
//! ```ignore
//! use stemix_core::config::{load_config, save_config, default_config_path};
//!
//! let config: StudioConfig = load_config(&default_config_path());
//! save_config(&config, &default_config_path())?;
//! ```

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_cache_dir, default_config_path, ensure_dir, APP_DIR_NAME, CACHE_DIR_NAME};
