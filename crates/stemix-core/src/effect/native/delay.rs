//! Delay effect
//!
//! A feedback delay with one independent delay line per channel.

use crate::effect::{delegate_effect_base, Effect, EffectBase, EffectInfo, ParamInfo};
use crate::types::AudioBuffer;

/// Maximum delay time in seconds
const MAX_DELAY_SECONDS: f32 = 2.0;

/// Single-channel circular delay line
struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(2)],
            write_pos: 0,
        }
    }

    /// Read the sample written `delay` samples ago
    #[inline]
    fn read(&self, delay: usize) -> f32 {
        let len = self.buffer.len();
        let read_pos = (self.write_pos + len - delay) % len;
        self.buffer[read_pos]
    }

    /// Write to delay line and advance position
    #[inline]
    fn write(&mut self, value: f32) {
        self.buffer[self.write_pos] = value;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }
}

/// Feedback delay
///
/// Parameters:
/// - delay_seconds: Delay time (0.001-2.0 s)
/// - feedback: Amount of delayed signal fed back (0-0.95)
/// - mix: Dry/wet balance (0 = dry, 1 = wet)
pub struct DelayEffect {
    base: EffectBase,
    lines: Vec<DelayLine>,
    sample_rate: u32,
}

impl DelayEffect {
    /// Schema for the delay effect
    pub fn effect_info() -> EffectInfo {
        EffectInfo::new("Delay", "Delay")
            .with_param(
                ParamInfo::new("delay_seconds", 0.5)
                    .with_range(0.001, 2.0)
                    .with_unit("s"),
            )
            .with_param(ParamInfo::new("feedback", 0.3).with_range(0.0, 0.95))
            .with_param(ParamInfo::new("mix", 0.5).with_range(0.0, 1.0))
    }

    /// Create a new delay effect; call `prepare` before processing
    pub fn new() -> Self {
        Self {
            base: EffectBase::new(Self::effect_info()),
            lines: Vec::new(),
            sample_rate: 44100,
        }
    }

    fn delay_samples(&self) -> usize {
        let samples = (self.base.param_actual(0) * self.sample_rate as f32).round() as usize;
        let capacity = self.lines.first().map(|l| l.buffer.len()).unwrap_or(2);
        samples.clamp(1, capacity - 1)
    }
}

impl Default for DelayEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for DelayEffect {
    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate.max(1);
        let capacity = (self.sample_rate as f32 * MAX_DELAY_SECONDS) as usize + 1;
        self.lines = (0..channels).map(|_| DelayLine::new(capacity)).collect();
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if self.lines.len() != buffer.channels() {
            self.prepare(self.sample_rate, buffer.channels());
        }

        let delay = self.delay_samples();
        let feedback = self.base.param_actual(1);
        let mix = self.base.param_actual(2);
        let dry = 1.0 - mix;

        for frame in buffer.frames_iter_mut() {
            for (sample, line) in frame.iter_mut().zip(self.lines.iter_mut()) {
                let delayed = line.read(delay);
                line.write(*sample + delayed * feedback);
                *sample = *sample * dry + delayed * mix;
            }
        }
    }

    delegate_effect_base!();

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.buffer.fill(0.0);
            line.write_pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::native::test_util::impulse;

    #[test]
    fn test_delay_impulse_position() {
        let mut effect = DelayEffect::new();
        effect.set_param_actual(0, 0.01); // 441 samples at 44.1kHz
        effect.set_param_actual(1, 0.0);
        effect.set_param_actual(2, 1.0);
        effect.prepare(44100, 2);

        let mut buffer = impulse(2048, 2);
        effect.process(&mut buffer);

        assert_eq!(buffer.sample(0, 0), 0.0);
        assert!((buffer.sample(441, 0) - 1.0).abs() < 1e-6);
        assert!((buffer.sample(441, 1) - 1.0).abs() < 1e-6);
        assert_eq!(buffer.sample(882, 0), 0.0);
    }

    #[test]
    fn test_delay_feedback_repeats() {
        let mut effect = DelayEffect::new();
        effect.set_param_actual(0, 0.01);
        effect.set_param_actual(1, 0.5);
        effect.set_param_actual(2, 1.0);
        effect.prepare(44100, 1);

        let mut buffer = impulse(2048, 1);
        effect.process(&mut buffer);

        assert!((buffer[441] - 1.0).abs() < 1e-6);
        assert!((buffer[882] - 0.5).abs() < 1e-6);
        assert!((buffer[1323] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_delay_dry_passthrough() {
        let mut effect = DelayEffect::new();
        effect.set_param_actual(2, 0.0);
        effect.prepare(44100, 2);

        let mut buffer = impulse(128, 2);
        let original = buffer.clone();
        effect.process(&mut buffer);

        assert_eq!(buffer, original);
    }

    #[test]
    fn test_delay_reset() {
        let mut effect = DelayEffect::new();
        effect.set_param_actual(0, 0.01);
        effect.set_param_actual(2, 1.0);
        effect.prepare(44100, 1);

        let mut buffer = impulse(100, 1);
        effect.process(&mut buffer);
        effect.reset();

        let mut buffer = AudioBuffer::silence(1024, 1);
        effect.process(&mut buffer);
        assert_eq!(buffer.peak(), 0.0);
    }
}
