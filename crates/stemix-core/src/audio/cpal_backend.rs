//! CPAL output backend
//!
//! Opens one f32 output stream per playing track on the default device.
//! The stream runs at the track's native rate and channel count when the
//! device supports it; otherwise it falls back to the device default. The
//! voice maps channels, and the track resamples to the fallback rate.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, SampleRate, Stream, StreamConfig};

use super::backend::{AudioBackend, OutputStream, StreamFormat};
use super::error::{AudioError, AudioResult};
use crate::engine::TrackVoice;

/// Default buffer size in frames when none is configured
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Device-backed output
#[derive(Debug, Clone)]
pub struct CpalBackend {
    /// Requested buffer size in frames (`None` = device default)
    buffer_size: Option<u32>,
}

impl CpalBackend {
    pub fn new(buffer_size: Option<u32>) -> Self {
        Self { buffer_size }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(Some(DEFAULT_BUFFER_SIZE))
    }
}

/// A playing CPAL stream; dropping it stops playback
struct CpalStream {
    _stream: Stream,
    format: StreamFormat,
}

impl OutputStream for CpalStream {
    fn format(&self) -> StreamFormat {
        self.format
    }
}

fn default_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string()))
}

/// Pick a stream config for the track's format
///
/// Prefers an f32 config with the exact channel count and a rate range
/// covering the track; falls back to the device default.
fn select_config(
    device: &cpal::Device,
    sample_rate: u32,
    channels: usize,
) -> AudioResult<(u16, u32)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let native = supported.iter().find(|c| {
        c.sample_format() == SampleFormat::F32
            && c.channels() as usize == channels
            && sample_rate >= c.min_sample_rate().0
            && sample_rate <= c.max_sample_rate().0
    });
    if let Some(config) = native {
        return Ok((config.channels(), sample_rate));
    }

    let fallback = device
        .default_output_config()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;
    if fallback.sample_format() != SampleFormat::F32 {
        return Err(AudioError::UnsupportedFormat(format!(
            "{:?}",
            fallback.sample_format()
        )));
    }

    log::warn!(
        "Device has no {}ch @ {}Hz f32 config, using {}ch @ {}Hz (track will be resampled)",
        channels,
        sample_rate,
        fallback.channels(),
        fallback.sample_rate().0
    );
    Ok((fallback.channels(), fallback.sample_rate().0))
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn negotiate(&self, sample_rate: u32, channels: usize) -> AudioResult<StreamFormat> {
        let device = default_device()?;
        let (device_channels, device_rate) = select_config(&device, sample_rate, channels)?;
        Ok(StreamFormat {
            sample_rate: device_rate,
            channels: device_channels as usize,
        })
    }

    fn open_stream(
        &self,
        voice: Arc<TrackVoice>,
        format: StreamFormat,
    ) -> AudioResult<Box<dyn OutputStream>> {
        let device = default_device()?;
        let config = StreamConfig {
            channels: format.channels as u16,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: match self.buffer_size {
                Some(frames) => CpalBufferSize::Fixed(frames),
                None => CpalBufferSize::Default,
            },
        };

        let out_channels = format.channels;
        let track_index = voice.index();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    voice.fill(data, out_channels);
                },
                move |err| {
                    log::error!("Track {} stream error: {}", track_index + 1, err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        log::debug!(
            "Opened stream for track {}: {}ch @ {}Hz",
            track_index + 1,
            format.channels,
            format.sample_rate
        );

        Ok(Box::new(CpalStream {
            _stream: stream,
            format,
        }))
    }
}
