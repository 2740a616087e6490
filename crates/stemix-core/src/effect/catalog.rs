//! Effect catalog - the static registry of effect kinds
//!
//! Every kind carries a bounded parameter schema with defaults. The catalog
//! never fails on lookups: an unknown name has an empty schema and
//! instantiates to a pass-through pipeline.

use std::collections::BTreeMap;
use std::fmt;

use super::native::{
    ChorusEffect, CompressorEffect, DelayEffect, DistortionEffect, GainEffect, PhaserEffect,
    ReverbEffect,
};
use super::{Effect, EffectInfo, ParamInfo};
use crate::types::AudioBuffer;

/// Effect kinds offered to the user
///
/// `None` is the pass-through sentinel a freshly added slot starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum EffectKind {
    #[default]
    None,
    Reverb,
    Delay,
    Chorus,
    Phaser,
    Gain,
    Distortion,
    Compressor,
}

impl EffectKind {
    /// All kinds in display order, sentinel first
    pub const ALL: [EffectKind; 8] = [
        EffectKind::None,
        EffectKind::Reverb,
        EffectKind::Delay,
        EffectKind::Chorus,
        EffectKind::Phaser,
        EffectKind::Gain,
        EffectKind::Distortion,
        EffectKind::Compressor,
    ];

    /// Display name, also accepted by [`EffectKind::from_name`]
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::None => "None",
            EffectKind::Reverb => "Reverb",
            EffectKind::Delay => "Delay",
            EffectKind::Chorus => "Chorus",
            EffectKind::Phaser => "Phaser",
            EffectKind::Gain => "Gain",
            EffectKind::Distortion => "Distortion",
            EffectKind::Compressor => "Compressor",
        }
    }

    /// Look up a kind by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Check for the pass-through sentinel
    pub fn is_none(&self) -> bool {
        matches!(self, EffectKind::None)
    }

    /// Effect info with the parameter schema, `None` for the sentinel
    pub fn info(&self) -> Option<EffectInfo> {
        match self {
            EffectKind::None => None,
            EffectKind::Reverb => Some(ReverbEffect::effect_info()),
            EffectKind::Delay => Some(DelayEffect::effect_info()),
            EffectKind::Chorus => Some(ChorusEffect::effect_info()),
            EffectKind::Phaser => Some(PhaserEffect::effect_info()),
            EffectKind::Gain => Some(GainEffect::effect_info()),
            EffectKind::Distortion => Some(DistortionEffect::effect_info()),
            EffectKind::Compressor => Some(CompressorEffect::effect_info()),
        }
    }

    /// Parameter schema in declaration order (empty for the sentinel)
    pub fn schema(&self) -> Vec<ParamInfo> {
        self.info().map(|i| i.params).unwrap_or_default()
    }

    /// Look up one parameter of this kind's schema
    pub fn param(&self, name: &str) -> Option<ParamInfo> {
        self.schema().into_iter().find(|p| p.name == name)
    }

    /// Default parameter values keyed by name
    pub fn default_parameters(&self) -> BTreeMap<String, f32> {
        self.schema()
            .into_iter()
            .map(|p| (p.name, p.default))
            .collect()
    }

    fn create(&self) -> Option<Box<dyn Effect>> {
        match self {
            EffectKind::None => None,
            EffectKind::Reverb => Some(Box::new(ReverbEffect::new())),
            EffectKind::Delay => Some(Box::new(DelayEffect::new())),
            EffectKind::Chorus => Some(Box::new(ChorusEffect::new())),
            EffectKind::Phaser => Some(Box::new(PhaserEffect::new())),
            EffectKind::Gain => Some(Box::new(GainEffect::new())),
            EffectKind::Distortion => Some(Box::new(DistortionEffect::new())),
            EffectKind::Compressor => Some(Box::new(CompressorEffect::new())),
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// List every effect kind, including the `None` sentinel
pub fn list_effect_kinds() -> Vec<EffectKind> {
    EffectKind::ALL.to_vec()
}

/// Parameter schema for an effect name
///
/// Unknown names and "None" yield an empty schema.
pub fn parameter_schema(name: &str) -> Vec<ParamInfo> {
    EffectKind::from_name(name)
        .map(|k| k.schema())
        .unwrap_or_default()
}

/// Build a processing pipeline for one effect kind
///
/// `None` (or the `None` kind) yields an empty, pass-through pipeline.
/// Missing parameters keep their schema default; out-of-range values are
/// clamped and unknown names are ignored, both with a warning.
pub fn instantiate(kind: Option<EffectKind>, parameters: &BTreeMap<String, f32>) -> EffectPipeline {
    let mut pipeline = EffectPipeline::identity();

    let Some(mut effect) = kind.and_then(|k| k.create()) else {
        return pipeline;
    };

    for (name, &value) in parameters {
        let info = effect.info();
        let Some(index) = info.param_index(name) else {
            log::warn!("{} has no parameter '{}', ignoring", info.name, name);
            continue;
        };
        let param = &info.params[index];
        if !param.contains(value) {
            log::warn!(
                "{}.{} = {} outside [{}, {}], clamping",
                info.name,
                name,
                value,
                param.min,
                param.max
            );
        }
        effect.set_param_actual(index, value);
    }

    pipeline.push(effect);
    pipeline
}

/// An ordered list of effects applied in sequence
///
/// An empty pipeline is the identity.
#[derive(Default)]
pub struct EffectPipeline {
    effects: Vec<Box<dyn Effect>>,
}

impl EffectPipeline {
    /// The pass-through pipeline
    pub fn identity() -> Self {
        Self::default()
    }

    /// Append an effect at the end of the signal path
    pub fn push(&mut self, effect: Box<dyn Effect>) {
        self.effects.push(effect);
    }

    /// Append every effect of another pipeline
    pub fn extend(&mut self, other: EffectPipeline) {
        self.effects.extend(other.effects);
    }

    /// Check whether processing leaves the signal unchanged
    pub fn is_identity(&self) -> bool {
        self.effects.is_empty()
    }

    /// Number of effects in the pipeline
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Check if the pipeline holds no effects
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effect names in signal order
    pub fn names(&self) -> Vec<String> {
        self.effects.iter().map(|e| e.info().name.clone()).collect()
    }

    /// Run a whole buffer through every effect, starting from clean state
    pub fn process(&mut self, buffer: &mut AudioBuffer, sample_rate: u32) {
        for effect in &mut self.effects {
            effect.prepare(sample_rate, buffer.channels());
            effect.process(buffer);
        }
    }
}

impl fmt::Debug for EffectPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectPipeline")
            .field("effects", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_buffer() -> AudioBuffer {
        let samples = (0..256).map(|i| ((i as f32) * 0.1).sin() * 0.5).collect();
        AudioBuffer::from_interleaved(samples, 2)
    }

    #[test]
    fn test_list_includes_sentinel() {
        let kinds = list_effect_kinds();
        assert_eq!(kinds.len(), 8);
        assert_eq!(kinds[0], EffectKind::None);
        assert!(kinds.contains(&EffectKind::Compressor));
    }

    #[test]
    fn test_schema_ranges() {
        let delay = parameter_schema("Delay");
        let names: Vec<_> = delay.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["delay_seconds", "feedback", "mix"]);
        assert_eq!((delay[0].min, delay[0].max, delay[0].default), (0.001, 2.0, 0.5));
        assert_eq!((delay[1].min, delay[1].max, delay[1].default), (0.0, 0.95, 0.3));

        let comp = parameter_schema("Compressor");
        assert_eq!((comp[0].min, comp[0].max, comp[0].default), (-60.0, 0.0, -24.0));
        assert_eq!((comp[1].min, comp[1].max, comp[1].default), (1.0, 20.0, 4.0));

        let dist = parameter_schema("Distortion");
        assert_eq!((dist[0].min, dist[0].max), (0.0, 60.0));

        let gain = parameter_schema("Gain");
        assert_eq!((gain[0].min, gain[0].max), (-24.0, 24.0));

        assert_eq!(parameter_schema("Reverb").len(), 3);
        assert_eq!(parameter_schema("Chorus")[0].default, 1.5);
        assert_eq!(parameter_schema("Phaser")[0].default, 0.5);
    }

    #[test]
    fn test_schema_empty_for_none_and_unknown() {
        assert!(parameter_schema("None").is_empty());
        assert!(parameter_schema("Flanger").is_empty());
        assert!(parameter_schema("").is_empty());
    }

    #[test]
    fn test_from_name_case_insensitive() {
        assert_eq!(EffectKind::from_name("reverb"), Some(EffectKind::Reverb));
        assert_eq!(EffectKind::from_name(" DELAY "), Some(EffectKind::Delay));
        assert_eq!(EffectKind::from_name("bitcrusher"), None);
    }

    #[test]
    fn test_instantiate_none_is_identity() {
        let empty = BTreeMap::new();

        let mut pipeline = instantiate(Some(EffectKind::None), &empty);
        assert!(pipeline.is_identity());
        let mut buffer = test_buffer();
        pipeline.process(&mut buffer, 44100);
        assert_eq!(buffer, test_buffer());

        let mut pipeline = instantiate(None, &empty);
        assert!(pipeline.is_identity());
        let mut buffer = test_buffer();
        pipeline.process(&mut buffer, 44100);
        assert_eq!(buffer, test_buffer());
    }

    #[test]
    fn test_instantiate_applies_parameters() {
        let mut params = BTreeMap::new();
        params.insert("gain_db".to_string(), -6.0);

        let mut pipeline = instantiate(Some(EffectKind::Gain), &params);
        assert_eq!(pipeline.len(), 1);

        let mut buffer = AudioBuffer::from_interleaved(vec![1.0, 1.0], 2);
        pipeline.process(&mut buffer, 44100);
        assert!((buffer[0] - 0.501).abs() < 0.001);
    }

    #[test]
    fn test_instantiate_clamps_out_of_range() {
        let mut params = BTreeMap::new();
        params.insert("gain_db".to_string(), 100.0);
        params.insert("bogus".to_string(), 1.0);

        let mut pipeline = instantiate(Some(EffectKind::Gain), &params);

        let mut buffer = AudioBuffer::from_interleaved(vec![0.01], 1);
        pipeline.process(&mut buffer, 44100);
        // Clamped to +24 dB
        assert!((buffer[0] - 0.01 * 15.849).abs() < 1e-3);
    }

    #[test]
    fn test_default_parameters() {
        let defaults = EffectKind::Reverb.default_parameters();
        assert_eq!(defaults.get("room_size"), Some(&0.5));
        assert_eq!(defaults.get("width"), Some(&1.0));
        assert!(EffectKind::None.default_parameters().is_empty());
    }
}
