//! Audio output backends
//!
//! Every playing track owns one output stream; the OS or sound server mixes
//! the streams. A backend only has to open a stream that repeatedly pulls
//! frames from a [`TrackVoice`](crate::engine::TrackVoice):
//!
//! - [`CpalBackend`]: real device output through CPAL
//! - [`NullBackend`]: headless; streams either never pull (tests drive
//!   `produce_frames`) or pull from a timer thread (`--no-audio`)
//!
//! A backend first negotiates the stream format. When the device rate
//! differs from the track's, the track converts its rendered audio with
//! [`resample`] before the stream opens. Stream handles stop their
//! callback when dropped.

mod backend;
mod cpal_backend;
mod error;
mod resample;

pub use backend::{AudioBackend, NullBackend, OutputStream, StreamFormat};
pub use cpal_backend::{CpalBackend, DEFAULT_BUFFER_SIZE};
pub use error::{AudioError, AudioResult};
pub use resample::resample;
