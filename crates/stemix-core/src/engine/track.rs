//! Track engine - one track's audio, effect chain and playback
//!
//! A [`Track`] owns the raw decoded audio and the effect chain on the control
//! thread. Every chain change renders the raw audio again and publishes the
//! result to the track's [`TrackVoice`], which the output stream reads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use basedrop::Shared;
use thiserror::Error;

use super::voice::{Resampled, SoloGroup, TrackVoice};
use crate::audio::{resample, AudioBackend, AudioError, OutputStream};
use crate::audio_file::{read_audio, AudioFileError};
use crate::effect::{render, ChainError, EffectChain, EffectKind, SlotId};
use crate::types::{format_time, AudioBuffer, TrackId};

/// Label shown for a track with nothing loaded
pub const NO_FILE_LABEL: &str = "No file loaded";

/// Default track volume (slider midpoint)
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Errors from track operations
#[derive(Error, Debug)]
pub enum TrackError {
    /// Audio file could not be read
    #[error(transparent)]
    File(#[from] AudioFileError),

    /// Effect chain edit rejected
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Output stream could not be opened
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// No such track in the fleet
    #[error("No track {0}")]
    UnknownTrack(usize),

    /// Operation needs loaded audio
    #[error("No audio loaded")]
    NoAudio,
}

/// Result type for track operations
pub type TrackResult<T> = Result<T, TrackError>;

/// One track of the mixing console
pub struct Track {
    id: TrackId,
    raw: Option<AudioBuffer>,
    sample_rate: Option<u32>,
    source: Option<PathBuf>,
    chain: EffectChain,
    voice: Arc<TrackVoice>,
    stream: Option<Box<dyn OutputStream>>,
    /// Bumped on every render
    generation: u64,
    /// Stream rate and render generation of the published resampled copy
    resampled_for: Option<(u32, u64)>,
    default_volume: f32,
}

impl Track {
    /// Create an empty track belonging to a solo group
    pub fn new(id: TrackId, solo: Arc<SoloGroup>, default_volume: f32) -> Self {
        Self {
            id,
            raw: None,
            sample_rate: None,
            source: None,
            chain: EffectChain::new(),
            voice: Arc::new(TrackVoice::new(id.0, solo, default_volume)),
            stream: None,
            generation: 0,
            resampled_for: None,
            default_volume,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Shared real-time state (for output streams)
    pub fn voice(&self) -> &Arc<TrackVoice> {
        &self.voice
    }

    // ─────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────

    /// Decode a file and make it this track's raw audio
    ///
    /// On error the track is left untouched.
    pub fn load_audio(&mut self, path: &Path) -> TrackResult<()> {
        let (buffer, sample_rate) = read_audio(path)?;
        self.load_buffer(buffer, sample_rate, Some(path.to_path_buf()));
        Ok(())
    }

    /// Replace the raw audio with an in-memory buffer
    ///
    /// Stops the track's stream, rewinds to 0 and renders the current chain.
    pub fn load_buffer(&mut self, buffer: AudioBuffer, sample_rate: u32, source: Option<PathBuf>) {
        self.stop();
        log::info!(
            "{}: loaded {} frames, {}ch @ {}Hz{}",
            self.id,
            buffer.frames(),
            buffer.channels(),
            sample_rate,
            source
                .as_ref()
                .map(|p| format!(" from {:?}", p))
                .unwrap_or_default()
        );
        self.raw = Some(buffer);
        self.sample_rate = Some(sample_rate);
        self.source = source;
        self.rerender();
        self.voice.set_position(0);
    }

    /// Check if audio is loaded
    pub fn has_audio(&self) -> bool {
        self.raw.is_some()
    }

    /// Raw (pre-effect) audio
    pub fn raw(&self) -> Option<&AudioBuffer> {
        self.raw.as_ref()
    }

    /// Rendered (post-effect) audio as seen by the output stream
    pub fn rendered(&self) -> Shared<Option<AudioBuffer>> {
        self.voice.buffer()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Path the audio was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Effect chain
    // ─────────────────────────────────────────────────────────────────────

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    /// Replace the whole chain and render
    pub fn set_chain(&mut self, chain: EffectChain) {
        self.chain = chain;
        self.rerender();
    }

    /// Append a pass-through slot
    pub fn add_effect_slot(&mut self) -> SlotId {
        let id = self.chain.add_slot();
        self.rerender();
        id
    }

    /// Change a slot's effect kind (parameters reset to defaults)
    pub fn set_effect(&mut self, slot: SlotId, kind: EffectKind) -> TrackResult<()> {
        self.chain.set_kind(slot, kind)?;
        self.rerender();
        Ok(())
    }

    /// Set a slot parameter from a slider position in [0, 1]
    ///
    /// Returns the parameter value in its own unit.
    pub fn set_effect_param(&mut self, slot: SlotId, name: &str, normalized: f32) -> TrackResult<f32> {
        let value = self.chain.set_param_normalized(slot, name, normalized)?;
        self.rerender();
        Ok(value)
    }

    /// Lock a slot against edits (audio unchanged)
    pub fn lock_slot(&mut self, slot: SlotId) -> TrackResult<()> {
        self.chain.lock(slot)?;
        Ok(())
    }

    /// Unlock a slot (audio unchanged)
    pub fn unlock_slot(&mut self, slot: SlotId) -> TrackResult<()> {
        self.chain.unlock(slot)?;
        Ok(())
    }

    /// Remove a slot and render
    pub fn remove_slot(&mut self, slot: SlotId) -> TrackResult<()> {
        self.chain.remove(slot)?;
        self.rerender();
        Ok(())
    }

    /// Render the raw audio through the chain and publish the result
    ///
    /// With no raw audio the rendered buffer is cleared. While a stream runs
    /// at another rate the resampled copy is refreshed too.
    fn rerender(&mut self) {
        let rendered = match (&self.raw, self.sample_rate) {
            (Some(raw), Some(sample_rate)) => Some(render(raw, &self.chain, sample_rate)),
            _ => None,
        };
        self.voice.set_buffer(rendered);
        self.generation += 1;

        match self.stream.as_ref().map(|s| s.format().sample_rate) {
            Some(stream_rate) => {
                if let Err(e) = self.sync_resampled(stream_rate) {
                    log::error!("{}: {}", self.id, e);
                    self.clear_resampled();
                }
            }
            None => self.clear_resampled(),
        }
    }

    /// Make the voice's resampled copy match `stream_rate`
    ///
    /// At the native rate the copy is dropped. An up-to-date copy is kept,
    /// so stopping and restarting does not convert again.
    fn sync_resampled(&mut self, stream_rate: u32) -> TrackResult<()> {
        let Some(sample_rate) = self.sample_rate else {
            return Ok(());
        };
        if stream_rate == sample_rate {
            self.clear_resampled();
            return Ok(());
        }
        if self.resampled_for == Some((stream_rate, self.generation)) {
            return Ok(());
        }

        let rendered = self.voice.buffer();
        let Some(buffer) = Option::as_ref(&*rendered) else {
            return Ok(());
        };
        let converted = resample(buffer, sample_rate, stream_rate)?;
        self.voice.set_resampled(Some(Resampled::new(
            converted,
            buffer.frames() as u64,
            sample_rate,
            stream_rate,
        )));
        self.resampled_for = Some((stream_rate, self.generation));
        log::info!(
            "{}: output runs at {}Hz, resampled from {}Hz",
            self.id,
            stream_rate,
            sample_rate
        );
        Ok(())
    }

    fn clear_resampled(&mut self) {
        if self.resampled_for.take().is_some() {
            self.voice.set_resampled(None);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mixer controls
    // ─────────────────────────────────────────────────────────────────────

    pub fn volume(&self) -> f32 {
        self.voice.volume()
    }

    /// Set the volume (clamped to [0, 1])
    pub fn set_volume(&mut self, volume: f32) {
        self.voice.set_volume(volume);
    }

    pub fn is_muted(&self) -> bool {
        self.voice.is_muted()
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.voice.set_muted(muted);
    }

    pub fn is_soloed(&self) -> bool {
        self.voice.is_soloed()
    }

    pub fn set_soloed(&mut self, soloed: bool) {
        self.voice.set_soloed(soloed);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Playback
    // ─────────────────────────────────────────────────────────────────────

    /// Playhead in frames
    pub fn position(&self) -> u64 {
        self.voice.position()
    }

    /// Move the playhead (clamped to the rendered length)
    pub fn set_position(&mut self, frames: u64) {
        self.voice.set_position(frames);
    }

    /// Rendered length in frames (0 when empty)
    pub fn length(&self) -> u64 {
        self.voice.length()
    }

    /// Whether the playhead sits at the end of loaded audio
    pub fn at_end(&self) -> bool {
        self.has_audio() && self.position() >= self.length()
    }

    /// Rendered duration in seconds
    pub fn duration(&self) -> f64 {
        match self.sample_rate {
            Some(sr) if sr > 0 => self.length() as f64 / sr as f64,
            _ => 0.0,
        }
    }

    /// Elapsed playback time in seconds, capped at the duration
    pub fn elapsed(&self) -> f64 {
        match self.sample_rate {
            Some(sr) if sr > 0 => (self.position() as f64 / sr as f64).min(self.duration()),
            _ => 0.0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.voice.is_playing()
    }

    /// Produce the next `frames` frames as the output stream would
    pub fn produce_frames(&self, frames: usize) -> AudioBuffer {
        self.voice.produce_frames(frames)
    }

    /// Start this track's output stream
    ///
    /// Does nothing when no audio is loaded or the stream is already open.
    /// If the device runs at another rate, the rendered audio is resampled
    /// to it first; positions keep counting track frames.
    pub fn play(&mut self, backend: &dyn AudioBackend) -> TrackResult<()> {
        let (Some(sample_rate), Some(channels)) = (self.sample_rate, self.voice.channels()) else {
            return Ok(());
        };
        if self.stream.is_some() {
            return Ok(());
        }

        let format = backend.negotiate(sample_rate, channels)?;
        self.sync_resampled(format.sample_rate)?;

        self.voice.set_playing(true);
        match backend.open_stream(self.voice.clone(), format) {
            Ok(stream) => {
                self.stream = Some(stream);
                Ok(())
            }
            Err(e) => {
                self.voice.set_playing(false);
                Err(e.into())
            }
        }
    }

    /// Stop and release the output stream; the playhead is kept
    pub fn stop(&mut self) {
        self.voice.set_playing(false);
        // Dropping the stream joins its callback
        self.stream = None;
    }

    /// Back to the freshly created state
    pub fn reset(&mut self) {
        self.stop();
        self.raw = None;
        self.sample_rate = None;
        self.source = None;
        self.chain.clear();
        self.voice.set_buffer(None);
        self.clear_resampled();
        self.voice.set_position(0);
        self.voice.set_volume(self.default_volume);
        self.voice.set_muted(false);
        self.voice.set_soloed(false);
        log::debug!("{}: reset", self.id);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Display
    // ─────────────────────────────────────────────────────────────────────

    /// File stem with the first letter capitalised, or [`NO_FILE_LABEL`]
    pub fn display_name(&self) -> String {
        let Some(stem) = self
            .source
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
        else {
            return if self.has_audio() {
                format!("Track {}", self.id.display_number())
            } else {
                NO_FILE_LABEL.to_string()
            };
        };
        let mut chars = stem.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => stem,
        }
    }

    /// `MM:SS / MM:SS` for this track
    pub fn time_display(&self) -> String {
        format!("{} / {}", format_time(self.elapsed()), format_time(self.duration()))
    }
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("sample_rate", &self.sample_rate)
            .field("chain", &self.chain.len())
            .field("voice", &self.voice)
            .finish()
    }
}
