//! Common types for stemix
//!
//! This module contains the fundamental audio types used throughout stemix,
//! including the interleaved multi-channel buffer every track, effect and
//! exporter works on.

use std::ops::{Index, IndexMut};

/// Number of tracks in the mixing console (one per separated stem)
pub const NUM_TRACKS: usize = 4;

/// Number of stems produced by a separation job (Vocals, Drums, Bass, Other)
pub const NUM_STEMS: usize = 4;

/// Channel count used for silence when a track has no audio loaded
pub const DEFAULT_CHANNELS: usize = 2;

/// Audio sample type (32-bit float for processing and export)
pub type Sample = f32;

/// Stem identifiers, in the order separation jobs return them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Stem {
    Vocals = 0,
    Drums = 1,
    Bass = 2,
    Other = 3,
}

impl Stem {
    /// Get all stems in order
    pub const ALL: [Stem; NUM_STEMS] = [Stem::Vocals, Stem::Drums, Stem::Bass, Stem::Other];

    /// Get the name of this stem
    pub fn name(&self) -> &'static str {
        match self {
            Stem::Vocals => "Vocals",
            Stem::Drums => "Drums",
            Stem::Bass => "Bass",
            Stem::Other => "Other",
        }
    }

    /// File name the separation tools write this stem to
    pub fn file_name(&self) -> &'static str {
        match self {
            Stem::Vocals => "vocals.wav",
            Stem::Drums => "drums.wav",
            Stem::Bass => "bass.wav",
            Stem::Other => "other.wav",
        }
    }
}

/// A buffer of interleaved multi-channel audio
///
/// Samples are stored frame by frame: `[f0c0, f0c1, ..., f1c0, f1c1, ...]`.
/// The channel count is fixed at construction and is always at least one.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: usize,
    samples: Vec<Sample>,
}

impl AudioBuffer {
    /// Create an empty buffer with the given channel count
    pub fn new(channels: usize) -> Self {
        assert!(channels > 0, "AudioBuffer needs at least one channel");
        Self {
            channels,
            samples: Vec::new(),
        }
    }

    /// Create a buffer filled with `frames` frames of silence
    pub fn silence(frames: usize, channels: usize) -> Self {
        assert!(channels > 0, "AudioBuffer needs at least one channel");
        Self {
            channels,
            samples: vec![0.0; frames * channels],
        }
    }

    /// Create a buffer from interleaved samples
    pub fn from_interleaved(samples: Vec<Sample>, channels: usize) -> Self {
        assert!(channels > 0, "AudioBuffer needs at least one channel");
        assert!(
            samples.len() % channels == 0,
            "Interleaved buffer length must be a multiple of the channel count"
        );
        Self { channels, samples }
    }

    /// Create a buffer from one slice per channel
    pub fn from_channels(channels: &[&[Sample]]) -> Self {
        assert!(!channels.is_empty(), "AudioBuffer needs at least one channel");
        let frames = channels[0].len();
        assert!(
            channels.iter().all(|c| c.len() == frames),
            "Channel lengths must match"
        );
        let mut samples = Vec::with_capacity(frames * channels.len());
        for frame in 0..frames {
            for channel in channels {
                samples.push(channel[frame]);
            }
        }
        Self {
            channels: channels.len(),
            samples,
        }
    }

    /// Number of channels per frame
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames in the buffer
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds at the given sample rate
    pub fn duration_seconds(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / sample_rate as f64
    }

    /// Read one sample
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> Sample {
        self.samples[frame * self.channels + channel]
    }

    /// Get one frame as a slice of `channels` samples
    #[inline]
    pub fn frame(&self, frame: usize) -> &[Sample] {
        let start = frame * self.channels;
        &self.samples[start..start + self.channels]
    }

    /// Get one frame as a mutable slice
    #[inline]
    pub fn frame_mut(&mut self, frame: usize) -> &mut [Sample] {
        let start = frame * self.channels;
        &mut self.samples[start..start + self.channels]
    }

    /// Iterate over frames
    pub fn frames_iter(&self) -> impl Iterator<Item = &[Sample]> {
        self.samples.chunks_exact(self.channels)
    }

    /// Iterate mutably over frames
    pub fn frames_iter_mut(&mut self) -> impl Iterator<Item = &mut [Sample]> {
        self.samples.chunks_exact_mut(self.channels)
    }

    /// Interleaved view of all samples
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        &self.samples
    }

    /// Mutable interleaved view of all samples
    #[inline]
    pub fn as_interleaved_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    /// Copy the samples out as one vector per channel
    pub fn to_channels(&self) -> Vec<Vec<Sample>> {
        (0..self.channels)
            .map(|c| self.samples.iter().skip(c).step_by(self.channels).copied().collect())
            .collect()
    }

    /// Resize to `frames` frames, zero-padding when growing
    pub fn resize_frames(&mut self, frames: usize) {
        self.samples.resize(frames * self.channels, 0.0);
    }

    /// Fill the buffer with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(0.0);
    }

    /// Scale all samples by a factor
    pub fn scale(&mut self, factor: Sample) {
        for sample in &mut self.samples {
            *sample *= factor;
        }
    }

    /// Add `other * gain` into this buffer, zero-padding the shorter of the two
    ///
    /// Channel `c` of this buffer takes channel `c % other.channels()`, so a
    /// mono source lands on every output channel.
    pub fn mix_in(&mut self, other: &AudioBuffer, gain: Sample) {
        if other.frames() > self.frames() {
            self.resize_frames(other.frames());
        }
        let src_channels = other.channels;
        for (dst, src) in self.frames_iter_mut().zip(other.frames_iter()) {
            for (c, sample) in dst.iter_mut().enumerate() {
                *sample += src[c % src_channels] * gain;
            }
        }
    }

    /// Get the peak absolute sample value in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.abs()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for AudioBuffer {
    type Output = Sample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for AudioBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNELS)
    }
}

/// Track identifier (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub usize);

impl TrackId {
    /// Get the track number (1-based, for display)
    pub fn display_number(&self) -> usize {
        self.0 + 1
    }

    /// Build a track ID from a 1-based display number
    pub fn from_display_number(number: usize) -> Option<Self> {
        number.checked_sub(1).map(TrackId)
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Track {}", self.display_number())
    }
}

/// Playback state of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

/// Format seconds as `MM:SS`
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
