//! Chorus effect
//!
//! A modulated short delay mixed with the dry signal. Each channel has its
//! own delay line; odd channels run the LFO a quarter cycle ahead for width.

use std::f32::consts::TAU;

use crate::effect::{delegate_effect_base, Effect, EffectBase, EffectInfo, ParamInfo};
use crate::types::AudioBuffer;

/// Centre delay of the modulated tap in milliseconds
const CENTRE_DELAY_MS: f32 = 7.0;

/// Maximum excursion around the centre delay at full depth, in milliseconds
const MAX_SWEEP_MS: f32 = 5.0;

/// Fixed dry/wet balance
const MIX: f32 = 0.5;

/// Chorus
///
/// Parameters:
/// - rate_hz: LFO rate (0.1-5.0 Hz)
/// - depth: Modulation depth (0.0-1.0)
pub struct ChorusEffect {
    base: EffectBase,
    lines: Vec<Vec<f32>>,
    write_pos: usize,
    phase: f32,
    sample_rate: u32,
}

impl ChorusEffect {
    /// Schema for the chorus effect
    pub fn effect_info() -> EffectInfo {
        EffectInfo::new("Chorus", "Modulation")
            .with_param(
                ParamInfo::new("rate_hz", 1.5)
                    .with_range(0.1, 5.0)
                    .with_unit("Hz"),
            )
            .with_param(ParamInfo::new("depth", 0.5).with_range(0.0, 1.0))
    }

    /// Create a new chorus; call `prepare` before processing
    pub fn new() -> Self {
        Self {
            base: EffectBase::new(Self::effect_info()),
            lines: Vec::new(),
            write_pos: 0,
            phase: 0.0,
            sample_rate: 44100,
        }
    }

    /// Read a fractionally delayed sample with linear interpolation
    #[inline]
    fn read_interpolated(line: &[f32], write_pos: usize, delay: f32) -> f32 {
        let len = line.len();
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;
        let a = line[(write_pos + len - whole) % len];
        let b = line[(write_pos + len - whole - 1) % len];
        a + (b - a) * frac
    }
}

impl Default for ChorusEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for ChorusEffect {
    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate.max(1);
        let capacity =
            ((CENTRE_DELAY_MS + MAX_SWEEP_MS) / 1000.0 * self.sample_rate as f32) as usize + 4;
        self.lines = vec![vec![0.0; capacity]; channels];
        self.write_pos = 0;
        self.phase = 0.0;
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if self.lines.len() != buffer.channels() {
            self.prepare(self.sample_rate, buffer.channels());
        }

        let sr = self.sample_rate as f32;
        let phase_inc = self.base.param_actual(0) / sr;
        let sweep = self.base.param_actual(1) * MAX_SWEEP_MS;
        let len = self.lines.first().map(|l| l.len()).unwrap_or(0);

        for frame in buffer.frames_iter_mut() {
            for (c, sample) in frame.iter_mut().enumerate() {
                let line = &mut self.lines[c];
                line[self.write_pos] = *sample;

                let offset = if c % 2 == 1 { 0.25 } else { 0.0 };
                let lfo = (TAU * (self.phase + offset)).sin();
                let delay = ((CENTRE_DELAY_MS + sweep * lfo) / 1000.0 * sr).max(1.0);

                let wet = Self::read_interpolated(line, self.write_pos, delay);
                *sample = *sample * (1.0 - MIX) + wet * MIX;
            }

            self.write_pos = (self.write_pos + 1) % len;
            self.phase = (self.phase + phase_inc).fract();
        }
    }

    delegate_effect_base!();

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.fill(0.0);
        }
        self.write_pos = 0;
        self.phase = 0.0;
    }
}
