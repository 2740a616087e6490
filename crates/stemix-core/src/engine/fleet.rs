//! Transport - global play/stop/seek across the fixed pool of tracks
//!
//! [`TrackFleet`] owns every [`Track`] and the output backend. Cross-track
//! questions (solo, global position, collective end of playback) are
//! answered here rather than through any global state.
//!
//! ```text
//!            start()                      poll(): max(pos) >= max(len)
//!  Stopped ───────────► Playing ──────────────────────────────┐
//!     ▲                   │  stop() (positions kept)          │ (positions reset to 0)
//!     └───────────────────┴───────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;

use super::track::{Track, TrackError, TrackResult, DEFAULT_VOLUME};
use super::voice::SoloGroup;
use crate::audio::AudioBackend;
use crate::types::{format_time, PlayState, TrackId, NUM_TRACKS};

/// Resolution of the seek slider
pub const SEEK_SLIDER_MAX: u32 = 1000;

/// Snapshot of the transport for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportStatus {
    pub state: PlayState,
    /// Furthest playhead across tracks, in frames
    pub position: u64,
    /// Longest rendered length across tracks, in frames
    pub length: u64,
    /// Sample rate of the longest track
    pub sample_rate: Option<u32>,
    /// True when this poll stopped playback because every track ended
    pub reached_end: bool,
}

impl TransportStatus {
    /// Elapsed seconds at the global sample rate
    pub fn elapsed(&self) -> f64 {
        match self.sample_rate {
            Some(sr) if sr > 0 => self.position as f64 / sr as f64,
            _ => 0.0,
        }
    }

    /// Total seconds at the global sample rate
    pub fn total(&self) -> f64 {
        match self.sample_rate {
            Some(sr) if sr > 0 => self.length as f64 / sr as f64,
            _ => 0.0,
        }
    }

    /// Seek bar position in [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        (self.position as f64 / self.length as f64).clamp(0.0, 1.0)
    }

    /// Seek bar position on the 0..=1000 slider
    pub fn slider_value(&self) -> u32 {
        (self.fraction() * SEEK_SLIDER_MAX as f64).round() as u32
    }

    /// `MM:SS / MM:SS`
    pub fn time_display(&self) -> String {
        format!("{} / {}", format_time(self.elapsed()), format_time(self.total()))
    }
}

/// Fixed, ordered pool of tracks with a shared transport
pub struct TrackFleet {
    tracks: Vec<Track>,
    solo: Arc<SoloGroup>,
    backend: Box<dyn AudioBackend>,
    state: PlayState,
}

impl TrackFleet {
    /// Create the standard four-track fleet
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self::with_tracks(backend, NUM_TRACKS, DEFAULT_VOLUME)
    }

    /// Create a fleet of `count` empty tracks
    pub fn with_tracks(backend: Box<dyn AudioBackend>, count: usize, default_volume: f32) -> Self {
        let solo = Arc::new(SoloGroup::new(count));
        let tracks = (0..count)
            .map(|i| Track::new(TrackId(i), solo.clone(), default_volume))
            .collect();
        log::info!("Created {} tracks on the {} backend", count, backend.name());
        Self {
            tracks,
            solo,
            backend,
            state: PlayState::Stopped,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track(&self, id: TrackId) -> TrackResult<&Track> {
        self.tracks.get(id.0).ok_or(TrackError::UnknownTrack(id.0))
    }

    pub fn track_mut(&mut self, id: TrackId) -> TrackResult<&mut Track> {
        self.tracks
            .get_mut(id.0)
            .ok_or(TrackError::UnknownTrack(id.0))
    }

    /// Fleet-wide solo flags
    pub fn solo_group(&self) -> &Arc<SoloGroup> {
        &self.solo
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Load a file into a track; a playing transport keeps playing it
    pub fn load_audio(&mut self, id: TrackId, path: &Path) -> TrackResult<()> {
        let playing = self.is_playing();
        let track = self.tracks.get_mut(id.0).ok_or(TrackError::UnknownTrack(id.0))?;
        track.load_audio(path)?;
        if playing {
            track.play(self.backend.as_ref())?;
        }
        Ok(())
    }

    /// Furthest playhead across tracks
    pub fn global_position(&self) -> u64 {
        self.tracks.iter().map(|t| t.position()).max().unwrap_or(0)
    }

    /// Longest rendered length across tracks
    pub fn global_length(&self) -> u64 {
        self.tracks.iter().map(|t| t.length()).max().unwrap_or(0)
    }

    /// Sample rate of the longest track (first on ties)
    pub fn global_sample_rate(&self) -> Option<u32> {
        let mut best: Option<&Track> = None;
        for track in self.tracks.iter().filter(|t| t.has_audio()) {
            if best.map(|b| track.length() > b.length()).unwrap_or(true) {
                best = Some(track);
            }
        }
        best.and_then(|t| t.sample_rate())
    }

    fn status(&self, reached_end: bool) -> TransportStatus {
        TransportStatus {
            state: self.state,
            position: self.global_position(),
            length: self.global_length(),
            sample_rate: self.global_sample_rate(),
            reached_end,
        }
    }

    /// Start playback of every loaded track
    ///
    /// Tracks already at their end are rewound first. If any stream fails
    /// to open, every track is stopped again and the error returned.
    pub fn start(&mut self) -> TrackResult<()> {
        if self.is_playing() {
            return Ok(());
        }
        if !self.tracks.iter().any(|t| t.has_audio()) {
            return Err(TrackError::NoAudio);
        }

        for track in &mut self.tracks {
            if track.at_end() {
                track.set_position(0);
            }
        }
        self.play_all()?;
        self.state = PlayState::Playing;
        log::info!("Transport started");
        Ok(())
    }

    fn play_all(&mut self) -> TrackResult<()> {
        let backend = self.backend.as_ref();
        for i in 0..self.tracks.len() {
            if let Err(e) = self.tracks[i].play(backend) {
                log::error!("{}: failed to start playback: {}", self.tracks[i].id(), e);
                for track in &mut self.tracks {
                    track.stop();
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop every track, keeping positions for resume
    pub fn stop(&mut self) {
        for track in &mut self.tracks {
            track.stop();
        }
        if self.is_playing() {
            log::info!("Transport stopped at frame {}", self.global_position());
        }
        self.state = PlayState::Stopped;
    }

    /// Move every playhead to `fraction` of the global length
    ///
    /// Each track is clamped to its own length. A playing transport is
    /// stopped for the move and resumed afterwards without rewinding
    /// tracks that land at their end.
    pub fn seek(&mut self, fraction: f64) -> TrackResult<()> {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let target = (fraction * self.global_length() as f64).round() as u64;
        let resume = self.is_playing();

        if resume {
            for track in &mut self.tracks {
                track.stop();
            }
        }
        for track in &mut self.tracks {
            track.set_position(target);
        }
        log::debug!("Seek to {:.3} (frame {})", fraction, target);

        if resume {
            if let Err(e) = self.play_all() {
                self.state = PlayState::Stopped;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Periodic tick: detect collective end of playback and report status
    ///
    /// When playing and the furthest playhead has reached the longest
    /// length, every track is stopped and rewound to 0.
    pub fn poll(&mut self) -> TransportStatus {
        if !self.is_playing() {
            return self.status(false);
        }

        let length = self.global_length();
        if self.global_position() >= length {
            for track in &mut self.tracks {
                track.stop();
                track.set_position(0);
            }
            self.state = PlayState::Stopped;
            log::info!("Playback finished");
            return self.status(true);
        }

        self.status(false)
    }

    /// Stop the transport and reset every track
    pub fn reset(&mut self) {
        self.stop();
        for track in &mut self.tracks {
            track.reset();
        }
        self.solo.clear();
        log::info!("All tracks reset");
    }
}

impl Drop for TrackFleet {
    fn drop(&mut self) {
        // Streams must go before the backend that created them
        for track in &mut self.tracks {
            track.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullBackend;
    use crate::types::AudioBuffer;

    fn fleet() -> (TrackFleet, NullBackend) {
        let backend = NullBackend::new();
        (TrackFleet::new(Box::new(backend.clone())), backend)
    }

    fn ones(frames: usize) -> AudioBuffer {
        AudioBuffer::from_interleaved(vec![1.0; frames * 2], 2)
    }

    /// Pull frames from every track the way the device streams would
    fn run(fleet: &TrackFleet, frames: usize) {
        for track in fleet.tracks() {
            if track.is_playing() {
                track.produce_frames(frames);
            }
        }
    }

    #[test]
    fn test_start_requires_audio() {
        let (mut f, _) = fleet();
        assert!(matches!(f.start(), Err(TrackError::NoAudio)));
        assert_eq!(f.state(), PlayState::Stopped);
    }

    #[test]
    fn test_start_stop_keeps_positions() {
        let (mut f, backend) = fleet();
        f.track_mut(TrackId(0)).unwrap().load_buffer(ones(100), 44100, None);
        f.track_mut(TrackId(1)).unwrap().load_buffer(ones(200), 44100, None);

        f.start().unwrap();
        assert!(f.is_playing());
        assert_eq!(backend.active_streams(), 2);

        run(&f, 30);
        f.stop();
        assert_eq!(backend.active_streams(), 0);
        assert_eq!(f.global_position(), 30);

        f.start().unwrap();
        assert_eq!(f.global_position(), 30);
    }

    #[test]
    fn test_auto_stop_at_longest_track() {
        let (mut f, _) = fleet();
        f.track_mut(TrackId(0)).unwrap().load_buffer(ones(100), 44100, None);
        f.track_mut(TrackId(1)).unwrap().load_buffer(ones(200), 44100, None);
        f.start().unwrap();

        // Shorter track ends, longer keeps the transport going
        run(&f, 150);
        let status = f.poll();
        assert!(!status.reached_end);
        assert_eq!(f.track(TrackId(0)).unwrap().position(), 100);
        assert_eq!(f.track(TrackId(1)).unwrap().position(), 150);

        run(&f, 49);
        assert!(!f.poll().reached_end);

        run(&f, 1);
        let status = f.poll();
        assert!(status.reached_end);
        assert_eq!(status.state, PlayState::Stopped);
        assert_eq!(f.track(TrackId(0)).unwrap().position(), 0);
        assert_eq!(f.track(TrackId(1)).unwrap().position(), 0);
        assert_eq!(status.time_display(), "00:00 / 00:00");
    }

    #[test]
    fn test_clocked_headless_playback_auto_stops() {
        let backend = NullBackend::clocked(100);
        let mut f = TrackFleet::new(Box::new(backend.clone()));
        f.track_mut(TrackId(0)).unwrap().load_buffer(ones(441), 44100, None);
        f.track_mut(TrackId(1)).unwrap().load_buffer(ones(882), 44100, None);
        f.start().unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        let mut status = f.poll();
        while !status.reached_end && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
            status = f.poll();
        }

        assert!(status.reached_end);
        assert_eq!(status.state, PlayState::Stopped);
        assert_eq!(backend.active_streams(), 0);
    }

    #[test]
    fn test_restart_after_single_track_end_rewinds_it() {
        let (mut f, _) = fleet();
        f.track_mut(TrackId(0)).unwrap().load_buffer(ones(100), 44100, None);
        f.track_mut(TrackId(1)).unwrap().load_buffer(ones(200), 44100, None);
        f.start().unwrap();
        run(&f, 120);
        f.stop();

        f.start().unwrap();
        assert_eq!(f.track(TrackId(0)).unwrap().position(), 0);
        assert_eq!(f.track(TrackId(1)).unwrap().position(), 120);
    }

    #[test]
    fn test_seek_half_while_stopped() {
        let (mut f, _) = fleet();
        f.track_mut(TrackId(0)).unwrap().load_buffer(ones(100), 44100, None);
        f.track_mut(TrackId(1)).unwrap().load_buffer(ones(201), 44100, None);

        f.seek(0.5).unwrap();

        // round(0.5 * 201) = 101, clamped to 100 on the short track
        assert_eq!(f.track(TrackId(0)).unwrap().position(), 100);
        assert_eq!(f.track(TrackId(1)).unwrap().position(), 101);
        assert_eq!(f.track(TrackId(2)).unwrap().position(), 0);
        assert!(!f.is_playing());
    }

    #[test]
    fn test_seek_while_playing_resumes() {
        let (mut f, backend) = fleet();
        f.track_mut(TrackId(0)).unwrap().load_buffer(ones(1000), 44100, None);
        f.start().unwrap();
        run(&f, 10);

        f.seek(0.25).unwrap();

        assert!(f.is_playing());
        assert!(f.track(TrackId(0)).unwrap().is_playing());
        assert_eq!(backend.active_streams(), 1);
        assert_eq!(f.global_position(), 250);

        run(&f, 10);
        assert_eq!(f.global_position(), 260);
    }

    #[test]
    fn test_seek_to_end_while_playing_stops_on_poll() {
        let (mut f, _) = fleet();
        f.track_mut(TrackId(0)).unwrap().load_buffer(ones(500), 44100, None);
        f.start().unwrap();

        f.seek(1.0).unwrap();
        assert!(f.is_playing());
        assert_eq!(f.global_position(), 500);

        assert!(f.poll().reached_end);
        assert_eq!(f.global_position(), 0);
    }

    #[test]
    fn test_solo_mutes_others() {
        let (mut f, _) = fleet();
        for i in 0..4 {
            f.track_mut(TrackId(i)).unwrap().load_buffer(ones(64), 44100, None);
            f.track_mut(TrackId(i)).unwrap().set_volume(1.0);
        }

        f.track_mut(TrackId(0)).unwrap().set_soloed(true);
        assert_eq!(f.track(TrackId(0)).unwrap().produce_frames(8).peak(), 1.0);
        for i in 1..4 {
            assert_eq!(f.track(TrackId(i)).unwrap().produce_frames(8).peak(), 0.0);
        }

        f.track_mut(TrackId(0)).unwrap().set_soloed(false);
        for i in 0..4 {
            assert_eq!(f.track(TrackId(i)).unwrap().produce_frames(8).peak(), 1.0);
        }
    }

    #[test]
    fn test_status_display() {
        let (mut f, _) = fleet();
        // Low rates keep the buffers small
        f.track_mut(TrackId(0)).unwrap().load_buffer(ones(100 * 90), 100, None);
        f.track_mut(TrackId(1)).unwrap().load_buffer(ones(200 * 10), 200, None);
        f.seek(0.5).unwrap();

        let status = f.poll();
        assert_eq!(status.sample_rate, Some(100));
        assert_eq!(status.time_display(), "00:45 / 01:30");
        assert_eq!(status.slider_value(), 500);
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut f, backend) = fleet();
        f.track_mut(TrackId(2)).unwrap().load_buffer(ones(64), 44100, None);
        f.track_mut(TrackId(2)).unwrap().set_soloed(true);
        f.start().unwrap();

        f.reset();

        assert!(!f.is_playing());
        assert_eq!(backend.active_streams(), 0);
        assert_eq!(f.global_length(), 0);
        assert!(!f.solo_group().any());
    }

    #[test]
    fn test_unknown_track() {
        let (mut f, _) = fleet();
        assert!(matches!(f.track(TrackId(9)), Err(TrackError::UnknownTrack(9))));
        assert!(f.track_mut(TrackId(4)).is_err());
    }
}
