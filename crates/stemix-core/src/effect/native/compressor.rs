//! Compressor effect
//!
//! Peak-detecting downward compressor with fixed ballistics. Each channel
//! has its own envelope follower.

use crate::effect::{db_to_gain, delegate_effect_base, Effect, EffectBase, EffectInfo, ParamInfo};
use crate::types::AudioBuffer;

/// Envelope attack time in milliseconds
const ATTACK_MS: f32 = 1.0;

/// Envelope release time in milliseconds
const RELEASE_MS: f32 = 100.0;

/// Compressor
///
/// Parameters:
/// - threshold_db: Level above which gain reduction starts (-60 to 0 dB)
/// - ratio: Compression ratio (1 = off, 20 = near limiting)
pub struct CompressorEffect {
    base: EffectBase,
    envelopes: Vec<f32>,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: u32,
}

impl CompressorEffect {
    /// Schema for the compressor effect
    pub fn effect_info() -> EffectInfo {
        EffectInfo::new("Compressor", "Dynamics")
            .with_param(
                ParamInfo::new("threshold_db", -24.0)
                    .with_range(-60.0, 0.0)
                    .with_unit("dB"),
            )
            .with_param(ParamInfo::new("ratio", 4.0).with_range(1.0, 20.0))
    }

    /// Create a new compressor; call `prepare` before processing
    pub fn new() -> Self {
        let mut effect = Self {
            base: EffectBase::new(Self::effect_info()),
            envelopes: Vec::new(),
            attack_coeff: 0.0,
            release_coeff: 0.0,
            sample_rate: 44100,
        };
        effect.update_coefficients();
        effect
    }

    fn update_coefficients(&mut self) {
        let sr = self.sample_rate as f32;
        self.attack_coeff = (-1.0 / (ATTACK_MS / 1000.0 * sr)).exp();
        self.release_coeff = (-1.0 / (RELEASE_MS / 1000.0 * sr)).exp();
    }
}

impl Default for CompressorEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for CompressorEffect {
    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate.max(1);
        self.update_coefficients();
        self.envelopes = vec![0.0; channels];
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if self.envelopes.len() != buffer.channels() {
            self.prepare(self.sample_rate, buffer.channels());
        }

        let threshold = db_to_gain(self.base.param_actual(0));
        let ratio_inv = 1.0 / self.base.param_actual(1);

        for frame in buffer.frames_iter_mut() {
            for (sample, env) in frame.iter_mut().zip(self.envelopes.iter_mut()) {
                let level = sample.abs();
                let coeff = if level > *env {
                    self.attack_coeff
                } else {
                    self.release_coeff
                };
                *env = level + coeff * (*env - level);

                if *env > threshold {
                    // Output level follows threshold * (env / threshold)^(1/ratio)
                    let gain = (*env / threshold).powf(ratio_inv - 1.0);
                    *sample *= gain;
                }
            }
        }
    }

    delegate_effect_base!();

    fn reset(&mut self) {
        self.envelopes.fill(0.0);
    }
}
