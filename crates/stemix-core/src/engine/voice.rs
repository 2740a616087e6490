//! Real-time-visible track state
//!
//! A [`TrackVoice`] is shared between the control thread and the track's
//! audio callback. The callback only reads atomics and takes a reference to
//! the current rendered buffer, so it never waits on the control thread:
//!
//! ```text
//! control thread                         audio callback
//! ──────────────                         ──────────────
//! render() ──► SharedCell::set ───────►  SharedCell::get  (old or new, never mixed)
//! set_volume / mute / seek ──► atomics ► fill(): copy window, scale, gate, advance
//! ```
//!
//! When the stream runs at another rate than the track, the callback reads
//! a [`Resampled`] copy instead and converts its stream cursor back to a
//! playhead in track frames, so positions always count track frames.
//!
//! All atomics use `Ordering::Relaxed`; the buffer hand-off goes through
//! `basedrop::SharedCell`, which publishes the new allocation atomically.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::{Shared, SharedCell};

use super::gc::gc_handle;
use crate::types::{AudioBuffer, DEFAULT_CHANNELS};

/// Solo flags for a whole fleet of tracks
///
/// Audibility is computed from every flag on every callback, never cached.
#[derive(Debug)]
pub struct SoloGroup {
    flags: Vec<AtomicBool>,
}

impl SoloGroup {
    /// Create a group of `count` unsoloed tracks
    pub fn new(count: usize) -> Self {
        Self {
            flags: (0..count).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Set one track's solo flag (out-of-range indices are ignored)
    pub fn set(&self, index: usize, soloed: bool) {
        if let Some(flag) = self.flags.get(index) {
            flag.store(soloed, Ordering::Relaxed);
        }
    }

    /// Check one track's solo flag
    #[inline]
    pub fn is_soloed(&self, index: usize) -> bool {
        self.flags
            .get(index)
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Check if any track is soloed
    #[inline]
    pub fn any(&self) -> bool {
        self.flags.iter().any(|f| f.load(Ordering::Relaxed))
    }

    /// Audibility rule: not muted, and either nobody is soloed or this track is
    #[inline]
    pub fn is_audible(&self, index: usize, muted: bool) -> bool {
        !muted && (!self.any() || self.is_soloed(index))
    }

    /// Clear every solo flag
    pub fn clear(&self) {
        for flag in &self.flags {
            flag.store(false, Ordering::Relaxed);
        }
    }
}

/// Rendered audio converted to an output stream's rate
#[derive(Debug, Clone)]
pub struct Resampled {
    buffer: AudioBuffer,
    /// Length of the rendered buffer this copy was made from
    source_frames: u64,
    source_rate: u32,
    stream_rate: u32,
}

impl Resampled {
    pub fn new(buffer: AudioBuffer, source_frames: u64, source_rate: u32, stream_rate: u32) -> Self {
        Self {
            buffer,
            source_frames,
            source_rate: source_rate.max(1),
            stream_rate: stream_rate.max(1),
        }
    }

    pub fn stream_rate(&self) -> u32 {
        self.stream_rate
    }

    fn frames(&self) -> u64 {
        self.buffer.frames() as u64
    }

    /// Stream frame for a playhead in track frames (rounded)
    fn to_stream(&self, position: u64) -> u64 {
        let scaled = position as u128 * self.stream_rate as u128;
        ((scaled + self.source_rate as u128 / 2) / self.source_rate as u128) as u64
    }

    /// Playhead in track frames for a stream frame (rounded down)
    fn to_source(&self, cursor: u64) -> u64 {
        (cursor as u128 * self.source_rate as u128 / self.stream_rate as u128) as u64
    }
}

/// `cursor_anchor` value when the stream cursor must be derived again
const UNSYNCED: u64 = u64::MAX;

/// The part of a track the audio callback reads
pub struct TrackVoice {
    index: usize,
    buffer: SharedCell<Option<AudioBuffer>>,
    resampled: SharedCell<Option<Resampled>>,
    /// Playhead in frames into the rendered buffer
    position: AtomicU64,
    /// Read position in the resampled buffer (callback only)
    stream_cursor: AtomicU64,
    /// Playhead value `stream_cursor` corresponds to
    cursor_anchor: AtomicU64,
    /// Volume as `f32` bits
    volume: AtomicU32,
    muted: AtomicBool,
    playing: AtomicBool,
    solo: Arc<SoloGroup>,
}

impl TrackVoice {
    /// Create an empty voice for track `index` within `solo`
    pub fn new(index: usize, solo: Arc<SoloGroup>, volume: f32) -> Self {
        Self {
            index,
            buffer: SharedCell::new(Shared::new(&gc_handle(), None)),
            resampled: SharedCell::new(Shared::new(&gc_handle(), None)),
            position: AtomicU64::new(0),
            stream_cursor: AtomicU64::new(0),
            cursor_anchor: AtomicU64::new(UNSYNCED),
            volume: AtomicU32::new(volume.clamp(0.0, 1.0).to_bits()),
            muted: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            solo,
        }
    }

    /// Track index (0-based)
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current rendered buffer
    pub fn buffer(&self) -> Shared<Option<AudioBuffer>> {
        self.buffer.get()
    }

    /// Publish a new rendered buffer (or none)
    ///
    /// The playhead is clamped to the new length so it never points past
    /// the end.
    pub fn set_buffer(&self, buffer: Option<AudioBuffer>) {
        let len = buffer.as_ref().map(|b| b.frames()).unwrap_or(0) as u64;
        self.buffer.set(Shared::new(&gc_handle(), buffer));
        let pos = self.position.load(Ordering::Relaxed);
        if pos > len {
            self.position.store(len, Ordering::Relaxed);
        }
    }

    /// Publish a copy of the rendered buffer at the stream rate
    ///
    /// `None` makes the callback read the rendered buffer directly. A copy
    /// whose `source_frames` no longer matches the rendered length is
    /// ignored until it is replaced.
    pub fn set_resampled(&self, resampled: Option<Resampled>) {
        self.resampled.set(Shared::new(&gc_handle(), resampled));
        self.cursor_anchor.store(UNSYNCED, Ordering::Relaxed);
    }

    /// Rate of the published resampled copy, if any
    pub fn resampled_rate(&self) -> Option<u32> {
        let shared = self.resampled.get();
        Option::as_ref(&*shared).map(|r| r.stream_rate)
    }

    /// Length of the rendered buffer in frames (0 when empty)
    pub fn length(&self) -> u64 {
        let shared = self.buffer.get();
        let buffer: &Option<AudioBuffer> = &shared;
        buffer.as_ref().map(|b| b.frames() as u64).unwrap_or(0)
    }

    /// Channel count of the rendered buffer
    pub fn channels(&self) -> Option<usize> {
        let shared = self.buffer.get();
        let buffer: &Option<AudioBuffer> = &shared;
        buffer.as_ref().map(|b| b.channels())
    }

    /// Playhead position in frames
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Move the playhead, clamped to the rendered length
    pub fn set_position(&self, frames: u64) {
        let clamped = frames.min(self.length());
        self.position.store(clamped, Ordering::Relaxed);
    }

    /// Volume in [0, 1]
    #[inline]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Set the volume, clamped to [0, 1]
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_soloed(&self) -> bool {
        self.solo.is_soloed(self.index)
    }

    pub fn set_soloed(&self, soloed: bool) {
        self.solo.set(self.index, soloed);
    }

    /// Whether the track is audible under the fleet-wide mute/solo rule
    #[inline]
    pub fn is_audible(&self) -> bool {
        self.solo.is_audible(self.index, self.is_muted())
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }

    /// Fill an interleaved output slice and advance the playhead
    ///
    /// This is the audio-callback entry point. It does not allocate, lock or
    /// fail. `out` holds `out.len() / out_channels` frames; output channel
    /// `c` takes source channel `c % source_channels`. Frames past the end
    /// of the buffer, and everything when no buffer is loaded or the track
    /// is gated by mute/solo, are silence. The playhead advances by the
    /// number of track frames covered, independent of gating.
    pub fn fill(&self, out: &mut [f32], out_channels: usize) {
        out.fill(0.0);
        if out_channels == 0 {
            return;
        }

        let shared = self.buffer.get();
        let Some(buffer) = Option::as_ref(&*shared) else {
            return;
        };
        let resampled = self.resampled.get();

        let frames = out.len() / out_channels;
        let len = buffer.frames() as u64;
        let pos = self.position.load(Ordering::Relaxed).min(len);

        // (source, first frame, frames to copy, next playhead, next cursor)
        let (source, start, available, next_pos, next_cursor) = match Option::as_ref(&*resampled) {
            Some(r) if r.source_frames == len => {
                let cursor = if self.cursor_anchor.load(Ordering::Relaxed) == pos {
                    self.stream_cursor.load(Ordering::Relaxed)
                } else {
                    r.to_stream(pos)
                }
                .min(r.frames());
                let available = ((r.frames() - cursor) as usize).min(frames);
                let end = cursor + available as u64;
                let next_pos = if end >= r.frames() {
                    len
                } else {
                    r.to_source(end).min(len)
                };
                (&r.buffer, cursor as usize, available, next_pos, Some(end))
            }
            _ => {
                let available = ((len - pos) as usize).min(frames);
                (buffer, pos as usize, available, pos + available as u64, None)
            }
        };

        if self.is_audible() {
            let volume = self.volume();
            let src_channels = source.channels();
            for (i, frame) in out.chunks_exact_mut(out_channels).take(available).enumerate() {
                let src = source.frame(start + i);
                for (c, sample) in frame.iter_mut().enumerate() {
                    *sample = src[c % src_channels] * volume;
                }
            }
        }

        // A concurrent seek wins over this advance
        let advanced = self
            .position
            .compare_exchange(pos, next_pos, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok();
        if let (true, Some(cursor)) = (advanced, next_cursor) {
            self.stream_cursor.store(cursor, Ordering::Relaxed);
            self.cursor_anchor.store(next_pos, Ordering::Relaxed);
        }
    }

    /// Produce exactly `frames` frames in the buffer's own channel layout
    ///
    /// Allocating convenience over [`TrackVoice::fill`] for offline callers
    /// and tests. An empty track yields stereo silence.
    pub fn produce_frames(&self, frames: usize) -> AudioBuffer {
        let channels = self.channels().unwrap_or(DEFAULT_CHANNELS);
        let mut out = AudioBuffer::silence(frames, channels);
        self.fill(out.as_interleaved_mut(), channels);
        out
    }
}

impl std::fmt::Debug for TrackVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackVoice")
            .field("index", &self.index)
            .field("position", &self.position())
            .field("length", &self.length())
            .field("volume", &self.volume())
            .field("muted", &self.is_muted())
            .field("playing", &self.is_playing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, channels: usize) -> AudioBuffer {
        let samples = (0..frames * channels).map(|i| (i / channels) as f32 + 1.0).collect();
        AudioBuffer::from_interleaved(samples, channels)
    }

    fn voice_with(buffer: AudioBuffer) -> TrackVoice {
        let voice = TrackVoice::new(0, Arc::new(SoloGroup::new(1)), 1.0);
        voice.set_buffer(Some(buffer));
        voice
    }

    #[test]
    fn test_empty_voice_is_silent() {
        let voice = TrackVoice::new(0, Arc::new(SoloGroup::new(1)), 1.0);
        let out = voice.produce_frames(64);

        assert_eq!(out.frames(), 64);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(voice.position(), 0);
    }

    #[test]
    fn test_window_copy_and_advance() {
        let voice = voice_with(ramp(10, 2));
        let out = voice.produce_frames(4);

        assert_eq!(out.frame(0), &[1.0, 1.0]);
        assert_eq!(out.frame(3), &[4.0, 4.0]);
        assert_eq!(voice.position(), 4);
    }

    #[test]
    fn test_tail_zero_padded_and_position_clamped() {
        let voice = voice_with(ramp(10, 1));
        voice.set_position(8);

        let out = voice.produce_frames(5);
        assert_eq!(out.frames(), 5);
        assert_eq!(out.as_interleaved(), &[9.0, 10.0, 0.0, 0.0, 0.0]);
        assert_eq!(voice.position(), 10);

        let out = voice.produce_frames(5);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(voice.position(), 10);
    }

    #[test]
    fn test_volume_and_mute() {
        let voice = voice_with(ramp(4, 1));
        voice.set_volume(0.5);
        let out = voice.produce_frames(2);
        assert_eq!(out.as_interleaved(), &[0.5, 1.0]);

        voice.set_muted(true);
        let out = voice.produce_frames(2);
        assert_eq!(out.peak(), 0.0);
        // Muted tracks keep moving
        assert_eq!(voice.position(), 4);
    }

    #[test]
    fn test_volume_clamped() {
        let voice = TrackVoice::new(0, Arc::new(SoloGroup::new(1)), 3.0);
        assert_eq!(voice.volume(), 1.0);
        voice.set_volume(-1.0);
        assert_eq!(voice.volume(), 0.0);
    }

    #[test]
    fn test_solo_group_rule() {
        let group = SoloGroup::new(3);
        assert!(group.is_audible(1, false));
        assert!(!group.is_audible(1, true));

        group.set(0, true);
        assert!(group.is_audible(0, false));
        assert!(!group.is_audible(1, false));
        // Mute wins over solo
        assert!(!group.is_audible(0, true));

        group.clear();
        assert!(group.is_audible(2, false));
    }

    #[test]
    fn test_channel_mapping_mono_to_stereo() {
        let voice = voice_with(ramp(4, 1));
        let mut out = vec![0.0f32; 4];
        voice.fill(&mut out, 2);

        assert_eq!(out, vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_resampled_playback_counts_track_frames() {
        // 100 track frames at 100 Hz played on a 200 Hz stream
        let voice = voice_with(ramp(100, 1));
        let stream = AudioBuffer::from_interleaved((0..200).map(|i| i as f32).collect(), 1);
        voice.set_resampled(Some(Resampled::new(stream, 100, 100, 200)));
        assert_eq!(voice.resampled_rate(), Some(200));

        let out = voice.produce_frames(50);
        assert_eq!(out.frame(0), &[0.0]);
        assert_eq!(out.frame(49), &[49.0]);
        assert_eq!(voice.position(), 25);

        // Odd block sizes do not drift: the cursor carries over between calls
        for _ in 0..10 {
            voice.produce_frames(15);
        }
        assert_eq!(voice.position(), 100);
        let out = voice.produce_frames(15);
        assert_eq!(out.frame(0), &[0.0]);
        assert_eq!(out.frame(14), &[0.0]);
    }

    #[test]
    fn test_resampled_cursor_follows_seek() {
        let voice = voice_with(ramp(100, 1));
        let stream = AudioBuffer::from_interleaved((0..200).map(|i| i as f32).collect(), 1);
        voice.set_resampled(Some(Resampled::new(stream, 100, 100, 200)));

        voice.produce_frames(10);
        voice.set_position(60);
        let out = voice.produce_frames(4);

        assert_eq!(out.as_interleaved(), &[120.0, 121.0, 122.0, 123.0]);
        assert_eq!(voice.position(), 62);
    }

    #[test]
    fn test_stale_resampled_copy_ignored() {
        let voice = voice_with(ramp(10, 1));
        let stream = AudioBuffer::silence(40, 1);
        // Made from a 20-frame render, not the current 10-frame one
        voice.set_resampled(Some(Resampled::new(stream, 20, 100, 200)));

        let out = voice.produce_frames(4);
        assert_eq!(out.as_interleaved(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(voice.position(), 4);
    }

    #[test]
    fn test_shorter_buffer_clamps_position() {
        let voice = voice_with(ramp(100, 1));
        voice.set_position(80);

        voice.set_buffer(Some(ramp(50, 1)));
        assert_eq!(voice.position(), 50);

        voice.set_buffer(None);
        assert_eq!(voice.position(), 0);
        assert_eq!(voice.length(), 0);
    }
}
