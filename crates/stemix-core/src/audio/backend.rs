//! Backend trait and the headless backend

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::error::{AudioError, AudioResult};
use crate::engine::TrackVoice;

/// Format an output stream runs at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: usize,
}

/// A running output stream
///
/// Dropping the handle stops the stream; once the drop returns the voice
/// receives no further callbacks.
pub trait OutputStream {
    /// Format the device runs at
    fn format(&self) -> StreamFormat;
}

/// Opens output streams for tracks
pub trait AudioBackend {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Pick the stream format for a track with the given native format
    ///
    /// The sample rate may differ from the track's when the device cannot
    /// match it; the caller then resamples before opening the stream.
    fn negotiate(&self, sample_rate: u32, channels: usize) -> AudioResult<StreamFormat>;

    /// Open and start a stream in `format` that pulls audio from `voice`
    fn open_stream(
        &self,
        voice: Arc<TrackVoice>,
        format: StreamFormat,
    ) -> AudioResult<Box<dyn OutputStream>>;
}

/// Backend that opens streams without any device
///
/// By default streams never call back into the voice and callers drive
/// `produce_frames` themselves. A [`NullBackend::clocked`] backend instead
/// runs a thread per stream that pulls one period of frames at a time in
/// real time, so headless playback advances and reaches its end. The
/// number of live streams is observable, which lets tests check that
/// stopping releases them.
#[derive(Debug, Clone, Default)]
pub struct NullBackend {
    active: Arc<AtomicUsize>,
    /// Forced stream rate (`None` = the track's own rate)
    device_rate: Option<u32>,
    /// Period in frames for clocked streams
    period: Option<usize>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams pull `period` frames per period from a timer thread
    pub fn clocked(period: usize) -> Self {
        Self {
            period: Some(period.max(1)),
            ..Self::default()
        }
    }

    /// Pretend the device only runs at `sample_rate`
    pub fn with_device_rate(mut self, sample_rate: u32) -> Self {
        self.device_rate = Some(sample_rate);
        self
    }

    /// Number of streams opened and not yet dropped
    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

/// Timer thread standing in for a device callback
struct Clock {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Clock {
    fn spawn(voice: Arc<TrackVoice>, format: StreamFormat, period: usize) -> AudioResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let interval = Duration::from_secs_f64(period as f64 / format.sample_rate.max(1) as f64);
        let thread = thread::Builder::new()
            .name(format!("stemix-clock-{}", voice.index() + 1))
            .spawn(move || {
                let mut scratch = vec![0.0f32; period * format.channels];
                while !thread_stop.load(Ordering::Relaxed) {
                    voice.fill(&mut scratch, format.channels);
                    thread::sleep(interval);
                }
            })
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct NullStream {
    format: StreamFormat,
    active: Arc<AtomicUsize>,
    _clock: Option<Clock>,
}

impl OutputStream for NullStream {
    fn format(&self) -> StreamFormat {
        self.format
    }
}

impl Drop for NullStream {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn negotiate(&self, sample_rate: u32, channels: usize) -> AudioResult<StreamFormat> {
        Ok(StreamFormat {
            sample_rate: self.device_rate.unwrap_or(sample_rate),
            channels,
        })
    }

    fn open_stream(
        &self,
        voice: Arc<TrackVoice>,
        format: StreamFormat,
    ) -> AudioResult<Box<dyn OutputStream>> {
        let clock = match self.period {
            Some(period) => Some(Clock::spawn(voice, format, period)?),
            None => None,
        };
        self.active.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(NullStream {
            format,
            active: self.active.clone(),
            _clock: clock,
        }))
    }
}
