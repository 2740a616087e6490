//! Native Rust effects
//!
//! One implementation per catalog entry. Every effect handles any channel
//! count and sizes its state in [`Effect::prepare`](crate::effect::Effect::prepare).

mod chorus;
mod compressor;
mod delay;
mod distortion;
mod gain;
mod phaser;
mod reverb;

pub use chorus::ChorusEffect;
pub use compressor::CompressorEffect;
pub use delay::DelayEffect;
pub use distortion::DistortionEffect;
pub use gain::GainEffect;
pub use phaser::PhaserEffect;
pub use reverb::ReverbEffect;

#[cfg(test)]
pub(crate) mod test_util {
    use crate::types::AudioBuffer;

    /// Single-sample impulse on every channel followed by silence
    pub fn impulse(frames: usize, channels: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::silence(frames, channels);
        for sample in buffer.frame_mut(0) {
            *sample = 1.0;
        }
        buffer
    }

    /// Constant-amplitude signal on every channel
    pub fn constant(frames: usize, channels: usize, value: f32) -> AudioBuffer {
        AudioBuffer::from_interleaved(vec![value; frames * channels], channels)
    }

    /// Sine wave at `freq` Hz, same on every channel
    pub fn sine(frames: usize, channels: usize, freq: f32, sample_rate: u32) -> AudioBuffer {
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let v = (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin();
            for _ in 0..channels {
                samples.push(v);
            }
        }
        AudioBuffer::from_interleaved(samples, channels)
    }
}
