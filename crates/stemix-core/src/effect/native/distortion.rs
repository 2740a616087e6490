//! Distortion effect - tanh waveshaper with input drive

use crate::effect::{db_to_gain, delegate_effect_base, Effect, EffectBase, EffectInfo, ParamInfo};
use crate::types::AudioBuffer;

/// Soft-clipping distortion
///
/// Parameters:
/// - drive_db: Input gain before the `tanh` curve (0 to 60 dB)
///
/// At 0 dB drive the curve is still applied, so loud peaks are softened.
pub struct DistortionEffect {
    base: EffectBase,
}

impl DistortionEffect {
    /// Schema for the distortion effect
    pub fn effect_info() -> EffectInfo {
        EffectInfo::new("Distortion", "Saturation").with_param(
            ParamInfo::new("drive_db", 0.0)
                .with_range(0.0, 60.0)
                .with_unit("dB"),
        )
    }

    /// Create a new distortion effect
    pub fn new() -> Self {
        Self {
            base: EffectBase::new(Self::effect_info()),
        }
    }
}

impl Default for DistortionEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for DistortionEffect {
    fn prepare(&mut self, _sample_rate: u32, _channels: usize) {}

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let drive = db_to_gain(self.base.param_actual(0));
        for sample in buffer.as_interleaved_mut() {
            *sample = (*sample * drive).tanh();
        }
    }

    delegate_effect_base!();

    fn reset(&mut self) {}
}
