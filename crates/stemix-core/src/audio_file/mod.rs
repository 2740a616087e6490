//! Audio file reading and writing
//!
//! Decoding goes through symphonia so any container it recognises (WAV, MP3,
//! FLAC, OGG, ...) can be loaded into an [`AudioBuffer`] at its native
//! sample rate and channel count. Writing always produces 32-bit float WAV
//! via hound.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::AudioBuffer;

/// Audio file errors
#[derive(Error, Debug)]
pub enum AudioFileError {
    /// File not found or couldn't be opened
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container or codec not recognized
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Stream could not be decoded
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// File decoded to zero frames
    #[error("No audio data in {0}")]
    Empty(PathBuf),

    /// WAV encoding failed
    #[error("Failed to write WAV file: {0}")]
    Encode(#[from] hound::Error),
}

/// Result type for audio file operations
pub type AudioFileResult<T> = Result<T, AudioFileError>;

/// Decode an entire audio file into memory
///
/// Returns the interleaved samples and the file's native sample rate.
/// Packet-level decode errors are skipped with a warning, as long as at
/// least one frame decodes.
pub fn read_audio(path: &Path) -> AudioFileResult<(AudioBuffer, u32)> {
    let file = File::open(path).map_err(|e| AudioFileError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioFileError::UnsupportedFormat(e.to_string()))?;

    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioFileError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioFileError::UnsupportedFormat("Unknown sample rate".to_string()))?;

    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioFileError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioFileError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => return Err(AudioFileError::Decode(e.to_string())),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if channels == 0 || samples.is_empty() {
        return Err(AudioFileError::Empty(path.to_path_buf()));
    }

    // Drop a trailing partial frame rather than reject the file
    let whole = samples.len() - samples.len() % channels;
    samples.truncate(whole);

    log::debug!(
        "Decoded {:?}: {} frames, {} channels @ {} Hz",
        path,
        samples.len() / channels,
        channels,
        sample_rate
    );

    Ok((AudioBuffer::from_interleaved(samples, channels), sample_rate))
}

/// Write a buffer to disk as 32-bit float WAV
pub fn write_wav(path: &Path, buffer: &AudioBuffer, sample_rate: u32) -> AudioFileResult<()> {
    use hound::{SampleFormat, WavSpec, WavWriter};

    let channels = u16::try_from(buffer.channels()).map_err(|_| {
        AudioFileError::UnsupportedFormat(format!("{} channels", buffer.channels()))
    })?;

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in buffer.as_interleaved() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sine(frames: usize, channels: usize, sample_rate: u32) -> AudioBuffer {
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let v = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin() * 0.5;
            for _ in 0..channels {
                samples.push(v);
            }
        }
        AudioBuffer::from_interleaved(samples, channels)
    }

    #[test]
    fn test_write_then_read_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let buffer = sine(4410, 2, 44100);

        write_wav(&path, &buffer, 44100).unwrap();
        let (decoded, sample_rate) = read_audio(&path).unwrap();

        assert_eq!(sample_rate, 44100);
        assert_eq!(decoded.channels(), 2);
        assert_eq!(decoded.frames(), 4410);
        assert!((decoded.sample(100, 1) - buffer.sample(100, 1)).abs() < 1e-6);
    }

    #[test]
    fn test_read_preserves_mono() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, &sine(1000, 1, 22050), 22050).unwrap();

        let (decoded, sample_rate) = read_audio(&path).unwrap();
        assert_eq!(sample_rate, 22050);
        assert_eq!(decoded.channels(), 1);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_audio(Path::new("/nonexistent/file.wav")).unwrap_err();
        assert!(matches!(err, AudioFileError::Io { .. }));
    }

    #[test]
    fn test_read_garbage_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();

        assert!(read_audio(&path).is_err());
    }
}
