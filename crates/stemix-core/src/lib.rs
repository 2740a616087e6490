//! Stemix Core - multi-track playback, effect chains and mixdown

pub mod audio;
pub mod audio_file;
pub mod config;
pub mod effect;
pub mod engine;
pub mod export;
pub mod types;

pub use types::*;
