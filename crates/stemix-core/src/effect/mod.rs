//! Effect system - traits, catalog, chains and rendering
//!
//! This module provides a unified interface for the native effects:
//! - [`Effect`] trait implemented by every processing unit
//! - [`catalog`] with the static registry of effect kinds and their schemas
//! - [`chain`] with the per-track ordered list of effect descriptors
//! - [`render`] which turns a raw buffer plus a chain into a rendered buffer

pub mod catalog;
pub mod chain;
pub mod native;
pub mod render;

pub use catalog::{instantiate, list_effect_kinds, parameter_schema, EffectKind, EffectPipeline};
pub use chain::{ChainError, ChainResult, ChainSlot, EffectChain, EffectDescriptor, SlotId};
pub use render::render;

use crate::types::AudioBuffer;

/// Information about an effect parameter
///
/// Unlike the slider value, `default`, `min` and `max` are in the
/// parameter's own unit (seconds, dB, Hz, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    /// Parameter name, also the key used in effect descriptors
    pub name: String,
    /// Default value (actual, not normalized)
    pub default: f32,
    /// Minimum value
    pub min: f32,
    /// Maximum value
    pub max: f32,
    /// Unit label (e.g., "s", "dB", "Hz")
    pub unit: String,
}

impl Default for ParamInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            default: 0.5,
            min: 0.0,
            max: 1.0,
            unit: String::new(),
        }
    }
}

impl ParamInfo {
    /// Create a new parameter info with name and default value
    pub fn new(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            default,
            ..Default::default()
        }
    }

    /// Set the value range
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the unit label
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Check whether an actual value lies inside `[min, max]`
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp an actual value into `[min, max]`
    ///
    /// NaN maps to the default.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default;
        }
        value.clamp(self.min, self.max)
    }

    /// Map a slider position (0.0-1.0) to an actual value
    pub fn denormalize(&self, normalized: f32) -> f32 {
        ParamValue::from_normalized(normalized, self).actual
    }

    /// Map an actual value to a slider position (0.0-1.0)
    pub fn normalize(&self, actual: f32) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((self.clamp(actual) - self.min) / span).clamp(0.0, 1.0)
    }
}

/// Current parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamValue {
    /// Normalized value (0.0-1.0)
    pub normalized: f32,
    /// Actual value after range mapping
    pub actual: f32,
}

impl ParamValue {
    /// Create from normalized value with the given param info
    pub fn from_normalized(normalized: f32, info: &ParamInfo) -> Self {
        let normalized = if normalized.is_nan() {
            0.0
        } else {
            normalized.clamp(0.0, 1.0)
        };
        let actual = info.min + normalized * (info.max - info.min);
        Self { normalized, actual }
    }

    /// Create from an actual value, clamping it into range
    pub fn from_actual(actual: f32, info: &ParamInfo) -> Self {
        let actual = info.clamp(actual);
        Self {
            normalized: info.normalize(actual),
            actual,
        }
    }
}

/// Information about an effect
#[derive(Debug, Clone)]
pub struct EffectInfo {
    /// Effect name for display
    pub name: String,
    /// Effect category (e.g., "Delay", "Reverb", "Dynamics")
    pub category: String,
    /// Parameter descriptions in schema order
    pub params: Vec<ParamInfo>,
}

impl EffectInfo {
    /// Create a new effect info
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter to this effect
    pub fn with_param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    /// Get the number of parameters
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Find a parameter index by name
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

/// The core effect trait - implemented by all audio effects
///
/// Effects process interleaved buffers of any channel count. Before the
/// first `process` call (and whenever the format changes) the renderer
/// calls `prepare` so the effect can size its delay lines and filters.
pub trait Effect: Send {
    /// Allocate internal state for the given format and clear it
    fn prepare(&mut self, sample_rate: u32, channels: usize);

    /// Process a buffer in-place
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Get information about this effect (name, category, parameters)
    fn info(&self) -> &EffectInfo;

    /// Set a parameter by index in its own unit, clamping into range
    fn set_param_actual(&mut self, index: usize, value: f32);

    /// Reset the effect state (delay lines, envelopes, oscillators)
    fn reset(&mut self);
}

/// Base implementation helper for effects
///
/// Holds the schema and the current parameter values.
#[derive(Debug, Clone)]
pub struct EffectBase {
    info: EffectInfo,
    params: Vec<ParamValue>,
}

impl EffectBase {
    /// Create a new effect base from effect info, with every parameter at its default
    pub fn new(info: EffectInfo) -> Self {
        let params: Vec<ParamValue> = info
            .params
            .iter()
            .map(|p| ParamValue::from_actual(p.default, p))
            .collect();
        Self { info, params }
    }

    /// Get the effect info
    pub fn info(&self) -> &EffectInfo {
        &self.info
    }

    /// Set a parameter value in its own unit, clamping into range
    pub fn set_param_actual(&mut self, index: usize, value: f32) {
        if index < self.params.len() {
            self.params[index] = ParamValue::from_actual(value, &self.info.params[index]);
        }
    }

    /// Get a parameter's actual (denormalized) value
    pub fn param_actual(&self, index: usize) -> f32 {
        self.params.get(index).map(|p| p.actual).unwrap_or(0.0)
    }
}

/// Convert decibels to a linear gain factor
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Implements the [`Effect`] accessors that forward to an `EffectBase` field named `base`
macro_rules! delegate_effect_base {
    () => {
        fn info(&self) -> &$crate::effect::EffectInfo {
            self.base.info()
        }

        fn set_param_actual(&mut self, index: usize, value: f32) {
            self.base.set_param_actual(index, value);
        }
    };
}

pub(crate) use delegate_effect_base;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_info() {
        let param = ParamInfo::new("gain_db", 0.0)
            .with_range(-24.0, 24.0)
            .with_unit("dB");

        assert_eq!(param.name, "gain_db");
        assert_eq!(param.default, 0.0);
        assert_eq!(param.min, -24.0);
        assert_eq!(param.max, 24.0);
        assert_eq!(param.unit, "dB");
    }

    #[test]
    fn test_param_value_mapping() {
        let info = ParamInfo::new("Test", 50.0).with_range(0.0, 100.0);

        let value = ParamValue::from_normalized(0.5, &info);
        assert_eq!(value.normalized, 0.5);
        assert_eq!(value.actual, 50.0);

        let value = ParamValue::from_normalized(1.0, &info);
        assert_eq!(value.actual, 100.0);

        // Out-of-range slider positions are clamped
        let value = ParamValue::from_normalized(1.7, &info);
        assert_eq!(value.actual, 100.0);
        let value = ParamValue::from_normalized(-0.2, &info);
        assert_eq!(value.actual, 0.0);
    }

    #[test]
    fn test_param_value_from_actual_clamps() {
        let info = ParamInfo::new("ratio", 4.0).with_range(1.0, 20.0);

        let value = ParamValue::from_actual(40.0, &info);
        assert_eq!(value.actual, 20.0);
        assert_eq!(value.normalized, 1.0);

        let value = ParamValue::from_actual(f32::NAN, &info);
        assert_eq!(value.actual, 4.0);
    }

    #[test]
    fn test_effect_info() {
        let info = EffectInfo::new("Test Effect", "Filter")
            .with_param(ParamInfo::new("cutoff", 0.5))
            .with_param(ParamInfo::new("resonance", 0.0));

        assert_eq!(info.name, "Test Effect");
        assert_eq!(info.category, "Filter");
        assert_eq!(info.param_count(), 2);
        assert_eq!(info.param_index("resonance"), Some(1));
        assert_eq!(info.param_index("missing"), None);
    }

    #[test]
    fn test_effect_base() {
        let info = EffectInfo::new("Test", "Test")
            .with_param(ParamInfo::new("P1", 50.0).with_range(0.0, 100.0))
            .with_param(ParamInfo::new("P2", -1.0).with_range(-1.0, 1.0));

        let mut base = EffectBase::new(info);

        // Defaults are actual values
        assert_eq!(base.param_actual(0), 50.0);
        assert_eq!(base.param_actual(1), -1.0);

        base.set_param_actual(1, 0.0);
        assert_eq!(base.param_actual(1), 0.0);

        base.set_param_actual(0, 250.0);
        assert_eq!(base.param_actual(0), 100.0);
        base.set_param_actual(0, f32::NAN);
        assert_eq!(base.param_actual(0), 50.0);
    }

    #[test]
    fn test_db_conversion() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-6.0) - 0.501).abs() < 0.001);
        assert!((db_to_gain(20.0) - 10.0).abs() < 1e-4);
    }
}
