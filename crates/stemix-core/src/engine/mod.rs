//! Playback engine
//!
//! - [`Track`]: raw audio, effect chain and one output stream
//! - [`TrackVoice`]: the atomics and rendered buffer the audio callback reads
//! - [`TrackFleet`]: the fixed set of tracks plus the global transport

mod fleet;
pub mod gc;
mod track;
mod voice;

pub use fleet::{TrackFleet, TransportStatus, SEEK_SLIDER_MAX};
pub use track::{Track, TrackError, TrackResult, DEFAULT_VOLUME, NO_FILE_LABEL};
pub use voice::{Resampled, SoloGroup, TrackVoice};
