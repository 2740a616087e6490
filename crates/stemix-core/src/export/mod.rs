//! Offline mixdown of every track into one buffer
//!
//! The mix is the volume-weighted sum of the rendered buffers, zero-padded to
//! the longest track. Mute and solo are monitoring controls and do not affect
//! the export. If the sum clips, the whole mix is scaled down so its peak is
//! exactly 1.0; quiet mixes are left alone.

use std::path::Path;

use thiserror::Error;

use crate::audio_file::{write_wav, AudioFileError};
use crate::engine::Track;
use crate::types::{AudioBuffer, TrackId};

/// Errors from exporting a mix
#[derive(Error, Debug)]
pub enum ExportError {
    /// Nothing loaded on any track
    #[error("No audio to export")]
    NoAudio,

    /// Tracks disagree on sample rate
    #[error("{track} is at {found} Hz but the mix is at {expected} Hz")]
    SampleRateMismatch {
        expected: u32,
        found: u32,
        track: TrackId,
    },

    /// Output file could not be written
    #[error(transparent)]
    Write(#[from] AudioFileError),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Sum every loaded track into a single buffer
///
/// Returns the mix and its sample rate. The output has as many channels as
/// the widest track; narrower tracks map channel `c` to `c % channels`.
pub fn export_mix(tracks: &[Track]) -> ExportResult<(AudioBuffer, u32)> {
    let mut sample_rate: Option<u32> = None;
    let mut sources = Vec::new();

    for track in tracks {
        let Some(track_rate) = track.sample_rate() else {
            continue;
        };
        match sample_rate {
            None => sample_rate = Some(track_rate),
            Some(expected) if expected != track_rate => {
                return Err(ExportError::SampleRateMismatch {
                    expected,
                    found: track_rate,
                    track: track.id(),
                });
            }
            Some(_) => {}
        }
        sources.push((track.rendered(), track.volume()));
    }

    let sample_rate = sample_rate.ok_or(ExportError::NoAudio)?;

    let buffers: Vec<(&AudioBuffer, f32)> = sources
        .iter()
        .filter_map(|(shared, volume)| Option::as_ref(&**shared).map(|b| (b, *volume)))
        .collect();

    let channels = buffers.iter().map(|(b, _)| b.channels()).max().unwrap_or(1);
    let mut mix = AudioBuffer::new(channels);
    for (buffer, volume) in &buffers {
        mix.mix_in(buffer, *volume);
    }

    let peak = mix.peak();
    if peak > 1.0 {
        log::info!("Normalizing mix (peak {:.3})", peak);
        mix.scale(1.0 / peak);
    }

    log::debug!(
        "Mixed {} tracks: {} frames, {}ch @ {}Hz",
        buffers.len(),
        mix.frames(),
        channels,
        sample_rate
    );
    Ok((mix, sample_rate))
}

/// Mix every track and write the result as a float WAV file
pub fn write_mix(path: &Path, tracks: &[Track]) -> ExportResult<()> {
    let (mix, sample_rate) = export_mix(tracks)?;
    write_wav(path, &mix, sample_rate)?;
    log::info!(
        "Exported {:.1}s mix to {:?}",
        mix.duration_seconds(sample_rate),
        path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::read_audio;
    use crate::engine::SoloGroup;
    use std::sync::Arc;

    fn tracks(count: usize) -> Vec<Track> {
        let solo = Arc::new(SoloGroup::new(count));
        (0..count)
            .map(|i| Track::new(TrackId(i), solo.clone(), 1.0))
            .collect()
    }

    fn stereo(samples: &[f32]) -> AudioBuffer {
        AudioBuffer::from_interleaved(samples.to_vec(), 2)
    }

    #[test]
    fn test_no_audio() {
        assert!(matches!(export_mix(&tracks(4)), Err(ExportError::NoAudio)));
    }

    #[test]
    fn test_weighted_sum() {
        let mut t = tracks(4);
        t[0].load_buffer(stereo(&[0.2, -0.2, 0.4, 0.1]), 44100, None);
        t[1].load_buffer(stereo(&[0.4, 0.2, -0.2, 0.6]), 44100, None);
        t[1].set_volume(0.5);

        let (mix, sr) = export_mix(&t).unwrap();

        assert_eq!(sr, 44100);
        let expected = [0.4, -0.1, 0.3, 0.4];
        for (a, b) in mix.as_interleaved().iter().zip(expected) {
            assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
        }
    }

    #[test]
    fn test_normalized_only_when_clipping() {
        let mut t = tracks(2);
        t[0].load_buffer(stereo(&[0.9, 0.9, 0.5, 0.5]), 44100, None);
        t[1].load_buffer(stereo(&[0.9, 0.9, 0.1, 0.1]), 44100, None);

        let (mix, _) = export_mix(&t).unwrap();
        assert!((mix.peak() - 1.0).abs() < 1e-6);
        assert!((mix[2] - 0.6 / 1.8).abs() < 1e-6);

        t[1].reset();
        t[0].set_volume(0.5);
        let (quiet, _) = export_mix(&t).unwrap();
        assert!((quiet.peak() - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_shorter_track_zero_padded() {
        let mut t = tracks(2);
        t[0].load_buffer(stereo(&[0.1; 8]), 44100, None);
        t[1].load_buffer(stereo(&[0.2; 4]), 44100, None);

        let (mix, _) = export_mix(&t).unwrap();

        assert_eq!(mix.frames(), 4);
        assert!((mix.frame(0)[0] - 0.3).abs() < 1e-6);
        assert!((mix.frame(3)[1] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_mute_and_solo_ignored() {
        let mut t = tracks(2);
        t[0].load_buffer(stereo(&[0.1, 0.1]), 44100, None);
        t[1].load_buffer(stereo(&[0.2, 0.2]), 44100, None);
        t[0].set_muted(true);
        t[1].set_soloed(true);

        let (mix, _) = export_mix(&t).unwrap();
        assert!((mix[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_mono_track_spread_to_stereo() {
        let mut t = tracks(2);
        t[0].load_buffer(AudioBuffer::from_interleaved(vec![0.1, 0.2], 1), 44100, None);
        t[1].load_buffer(stereo(&[0.0, 0.5, 0.0, 0.5]), 44100, None);

        let (mix, _) = export_mix(&t).unwrap();

        assert_eq!(mix.channels(), 2);
        assert!((mix.frame(1)[0] - 0.2).abs() < 1e-6);
        assert!((mix.frame(1)[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_mixed_rates_rejected() {
        let mut t = tracks(3);
        t[0].load_buffer(stereo(&[0.1, 0.1]), 44100, None);
        t[2].load_buffer(stereo(&[0.1, 0.1]), 48000, None);

        match export_mix(&t) {
            Err(ExportError::SampleRateMismatch {
                expected,
                found,
                track,
            }) => {
                assert_eq!(expected, 44100);
                assert_eq!(found, 48000);
                assert_eq!(track, TrackId(2));
            }
            other => panic!("unexpected result: {:?}", other.map(|(b, _)| b.frames())),
        }
    }

    #[test]
    fn test_write_mix_to_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mix.wav");
        let mut t = tracks(1);
        t[0].load_buffer(stereo(&[0.25, -0.25, 0.5, -0.5]), 22050, None);

        write_mix(&path, &t).unwrap();

        let (buffer, sr) = read_audio(&path).unwrap();
        assert_eq!(sr, 22050);
        assert_eq!(buffer.frames(), 2);
        assert!((buffer.frame(1)[1] + 0.5).abs() < 1e-6);
    }
}
