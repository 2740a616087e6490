//! Gain effect - Volume change in decibels

use crate::effect::{db_to_gain, delegate_effect_base, Effect, EffectBase, EffectInfo, ParamInfo};
use crate::types::AudioBuffer;

/// A simple gain effect
///
/// Parameters:
/// - gain_db: Gain in decibels (-24 to +24, 0 = unity)
pub struct GainEffect {
    base: EffectBase,
}

impl GainEffect {
    /// Schema for the gain effect
    pub fn effect_info() -> EffectInfo {
        EffectInfo::new("Gain", "Utility").with_param(
            ParamInfo::new("gain_db", 0.0)
                .with_range(-24.0, 24.0)
                .with_unit("dB"),
        )
    }

    /// Create a new gain effect at unity
    pub fn new() -> Self {
        Self {
            base: EffectBase::new(Self::effect_info()),
        }
    }
}

impl Default for GainEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for GainEffect {
    fn prepare(&mut self, _sample_rate: u32, _channels: usize) {}

    fn process(&mut self, buffer: &mut AudioBuffer) {
        buffer.scale(db_to_gain(self.base.param_actual(0)));
    }

    delegate_effect_base!();

    fn reset(&mut self) {
        // No state to reset
    }
}
