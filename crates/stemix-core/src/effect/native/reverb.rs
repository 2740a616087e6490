//! Reverb effect
//!
//! A Freeverb-style algorithmic reverb:
//! - Eight parallel damped comb filters per side
//! - Four series allpass filters for diffusion
//! - Width control crossfading the two sides

use crate::effect::{delegate_effect_base, Effect, EffectBase, EffectInfo, ParamInfo};
use crate::types::AudioBuffer;

/// Comb filter delay line lengths (in samples at 44.1kHz)
const COMB_LENGTHS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass filter delay line lengths
const ALLPASS_LENGTHS: [usize; 4] = [556, 441, 341, 225];

/// Stereo spread offset for the right side (in samples at 44.1kHz)
const STEREO_SPREAD: usize = 23;

/// Input gain into the comb bank
const FIXED_GAIN: f32 = 0.015;

/// Wet and dry output levels (wet 0.33, dry 0.4, scaled as in Freeverb)
const WET_LEVEL: f32 = 0.33 * 3.0;
const DRY_LEVEL: f32 = 0.4 * 2.0;

const ALLPASS_FEEDBACK: f32 = 0.5;

/// Comb filter for reverb
struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl CombFilter {
    fn new(length: usize, sr_scale: f32) -> Self {
        let scaled_len = ((length as f32 * sr_scale) as usize).max(1);
        Self {
            buffer: vec![0.0; scaled_len],
            pos: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.pos];

        // One-pole lowpass filter for damping high frequencies
        self.filter_state = output * (1.0 - damp) + self.filter_state * damp;

        self.buffer[self.pos] = input + self.filter_state * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();

        output
    }
}

/// Allpass filter for diffusion
struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(length: usize, sr_scale: f32) -> Self {
        let scaled_len = ((length as f32 * sr_scale) as usize).max(1);
        Self {
            buffer: vec![0.0; scaled_len],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        let output = -input + buffered;
        self.buffer[self.pos] = input + buffered * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }
}

/// One side (left or right) of the reverb tank
struct Tank {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
}

impl Tank {
    fn new(spread: usize, sr_scale: f32) -> Self {
        Self {
            combs: COMB_LENGTHS
                .iter()
                .map(|&len| CombFilter::new(len + spread, sr_scale))
                .collect(),
            allpasses: ALLPASS_LENGTHS
                .iter()
                .map(|&len| AllpassFilter::new(len + spread, sr_scale))
                .collect(),
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let mut out = 0.0f32;
        for comb in &mut self.combs {
            out += comb.process(input, feedback, damp);
        }
        for ap in &mut self.allpasses {
            out = ap.process(out, ALLPASS_FEEDBACK);
        }
        out
    }
}

/// Freeverb-style reverb
///
/// Parameters:
/// - room_size: Decay time (0.0-1.0)
/// - damping: High frequency damping (0.0 = bright, 1.0 = dark)
/// - width: Stereo width (0.0 = mono, 1.0 = full stereo)
///
/// All channels are summed into the tank. Even output channels take the left
/// side, odd channels the right; a mono buffer gets the average of both.
pub struct ReverbEffect {
    base: EffectBase,
    left: Tank,
    right: Tank,
    sample_rate: u32,
}

impl ReverbEffect {
    /// Schema for the reverb effect
    pub fn effect_info() -> EffectInfo {
        EffectInfo::new("Reverb", "Reverb")
            .with_param(ParamInfo::new("room_size", 0.5).with_range(0.0, 1.0))
            .with_param(ParamInfo::new("damping", 0.5).with_range(0.0, 1.0))
            .with_param(ParamInfo::new("width", 1.0).with_range(0.0, 1.0))
    }

    /// Create a new reverb effect sized for 44.1kHz
    pub fn new() -> Self {
        Self {
            base: EffectBase::new(Self::effect_info()),
            left: Tank::new(0, 1.0),
            right: Tank::new(STEREO_SPREAD, 1.0),
            sample_rate: 44100,
        }
    }

    /// Comb feedback derived from room size (0.7-0.98)
    fn feedback(&self) -> f32 {
        0.7 + self.base.param_actual(0) * 0.28
    }

    fn damping(&self) -> f32 {
        self.base.param_actual(1) * 0.4
    }

    fn width(&self) -> f32 {
        self.base.param_actual(2)
    }
}

impl Default for ReverbEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for ReverbEffect {
    fn prepare(&mut self, sample_rate: u32, _channels: usize) {
        self.sample_rate = sample_rate.max(1);
        self.reset();
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let feedback = self.feedback();
        let damp = self.damping();
        let width = self.width();

        let wet1 = WET_LEVEL * (width / 2.0 + 0.5);
        let wet2 = WET_LEVEL * ((1.0 - width) / 2.0);

        let channels = buffer.channels();
        for frame in buffer.frames_iter_mut() {
            let input = frame.iter().sum::<f32>() / channels as f32 * FIXED_GAIN;

            let out_l = self.left.process(input, feedback, damp);
            let out_r = self.right.process(input, feedback, damp);

            let wet_left = out_l * wet1 + out_r * wet2;
            let wet_right = out_r * wet1 + out_l * wet2;

            if channels == 1 {
                frame[0] = frame[0] * DRY_LEVEL + (wet_left + wet_right) * 0.5;
                continue;
            }
            for (c, sample) in frame.iter_mut().enumerate() {
                let wet = if c % 2 == 0 { wet_left } else { wet_right };
                *sample = *sample * DRY_LEVEL + wet;
            }
        }
    }

    delegate_effect_base!();

    fn reset(&mut self) {
        let sr_scale = self.sample_rate as f32 / 44100.0;
        self.left = Tank::new(0, sr_scale);
        self.right = Tank::new(STEREO_SPREAD, sr_scale);
    }
}
