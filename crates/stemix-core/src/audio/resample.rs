//! Sample rate conversion for output streams
//!
//! When a device cannot run at a track's native rate, the rendered audio is
//! converted once on the control thread so the callback still copies one
//! frame per device frame.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::error::{AudioError, AudioResult};
use crate::types::AudioBuffer;

/// Input frames fed to the resampler per call
const CHUNK_FRAMES: usize = 1024;

/// Convert `buffer` from `from` Hz to `to` Hz
///
/// The result has `round(frames * to / from)` frames and the same channel
/// count. The resampler's group delay is trimmed so frame 0 of the output
/// lines up with frame 0 of the input.
pub fn resample(buffer: &AudioBuffer, from: u32, to: u32) -> AudioResult<AudioBuffer> {
    if from == 0 || to == 0 {
        return Err(AudioError::Resample(format!(
            "invalid rates {} Hz -> {} Hz",
            from, to
        )));
    }
    if from == to || buffer.is_empty() {
        return Ok(buffer.clone());
    }

    let channels = buffer.channels();
    let ratio = to as f64 / from as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, channels)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let input = buffer.to_channels();
    let frames = buffer.frames();
    let expected = (frames as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    let mut offset = 0;
    while offset < frames {
        let end = (offset + resampler.input_frames_next()).min(frames);
        let chunk: Vec<&[f32]> = input.iter().map(|c| &c[offset..end]).collect();
        let processed = if end - offset == resampler.input_frames_next() {
            resampler.process(chunk.as_slice(), None)
        } else {
            resampler.process_partial(Some(chunk.as_slice()), None)
        }
        .map_err(|e| AudioError::Resample(e.to_string()))?;
        append(&mut output, processed);
        offset = end;
    }

    // Flush the filter tail
    while output[0].len() < expected + delay {
        let processed = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if processed[0].is_empty() {
            break;
        }
        append(&mut output, processed);
    }

    for channel in &mut output {
        channel.resize(expected + delay, 0.0);
        channel.drain(..delay);
    }
    let slices: Vec<&[f32]> = output.iter().map(Vec::as_slice).collect();

    log::debug!(
        "Resampled {} frames @ {}Hz to {} frames @ {}Hz",
        frames,
        from,
        expected,
        to
    );
    Ok(AudioBuffer::from_channels(&slices))
}

fn append(output: &mut [Vec<f32>], processed: Vec<Vec<f32>>) {
    for (dst, src) in output.iter_mut().zip(processed) {
        dst.extend_from_slice(&src);
    }
}
