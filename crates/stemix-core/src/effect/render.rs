//! Effect chain rendering
//!
//! Rendering is a pure function of the raw buffer, the chain and the sample
//! rate: every call instantiates fresh effects and works on a copy, so the
//! same inputs always give bit-identical output and the raw buffer is never
//! touched.

use super::catalog::{instantiate, EffectPipeline};
use super::chain::EffectDescriptor;
use super::EffectChain;
use crate::types::AudioBuffer;

/// Build the processing pipeline for a sequence of descriptors
///
/// Pass-through entries are skipped. Descriptors that fail validation are
/// clamped before instantiation.
pub fn build_pipeline<'a>(descriptors: impl IntoIterator<Item = &'a EffectDescriptor>) -> EffectPipeline {
    let mut pipeline = EffectPipeline::identity();
    for descriptor in descriptors {
        if descriptor.kind.is_none() {
            continue;
        }
        let descriptor = match descriptor.validate() {
            Ok(()) => descriptor.clone(),
            Err(e) => {
                log::warn!("Clamping {} before render: {}", descriptor.kind, e);
                descriptor.clamped()
            }
        };
        pipeline.extend(instantiate(Some(descriptor.kind), &descriptor.parameters));
    }
    pipeline
}

/// Render a raw buffer through an effect chain
///
/// Returns a new buffer with the same channel count. Callers must take the
/// length from the result rather than assume it matches the input.
pub fn render(raw: &AudioBuffer, chain: &EffectChain, sample_rate: u32) -> AudioBuffer {
    let mut pipeline = build_pipeline(chain.descriptors());
    let mut rendered = raw.clone();
    if pipeline.is_identity() {
        return rendered;
    }

    log::debug!(
        "Rendering {} frames through {:?} @ {} Hz",
        raw.frames(),
        pipeline.names(),
        sample_rate
    );
    pipeline.process(&mut rendered, sample_rate);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EffectDescriptor, EffectKind};
    use std::collections::BTreeMap;

    fn noise(frames: usize, channels: usize) -> AudioBuffer {
        // Deterministic pseudo-random signal
        let mut state = 0x1234_5678u32;
        let samples = (0..frames * channels)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();
        AudioBuffer::from_interleaved(samples, channels)
    }

    fn full_chain() -> EffectChain {
        EffectChain::from_descriptors(
            EffectKind::ALL.iter().map(|&k| EffectDescriptor::new(k)),
        )
    }

    #[test]
    fn test_render_is_idempotent() {
        let raw = noise(8192, 2);
        let chain = full_chain();

        let first = render(&raw, &chain, 44100);
        let second = render(&raw, &chain, 44100);

        assert_eq!(first.as_interleaved(), second.as_interleaved());
    }

    #[test]
    fn test_render_never_mutates_raw() {
        let raw = noise(4096, 2);
        let before = raw.clone();

        let rendered = render(&raw, &full_chain(), 48000);

        assert_eq!(raw, before);
        assert_ne!(rendered, raw);
        assert_eq!(rendered.channels(), raw.channels());
        assert_eq!(rendered.frames(), raw.frames());
    }

    #[test]
    fn test_empty_and_none_chains_pass_through() {
        let raw = noise(512, 1);

        assert_eq!(render(&raw, &EffectChain::new(), 44100), raw);

        let mut chain = EffectChain::new();
        chain.add_slot();
        chain.add_slot();
        assert_eq!(render(&raw, &chain, 44100), raw);
    }

    #[test]
    fn test_chain_order_matters() {
        let raw = noise(2048, 1);
        let gain = EffectDescriptor::new(EffectKind::Gain)
            .with_param("gain_db", 24.0)
            .unwrap();
        let dist = EffectDescriptor::new(EffectKind::Distortion);

        let a = render(&raw, &EffectChain::from_descriptors([gain.clone(), dist.clone()]), 44100);
        let b = render(&raw, &EffectChain::from_descriptors([dist, gain]), 44100);

        assert_ne!(a, b);
        assert!(a.peak() <= 1.0);
    }

    #[test]
    fn test_render_clamps_invalid_descriptor() {
        let raw = AudioBuffer::from_interleaved(vec![0.01; 64], 2);
        let mut parameters = BTreeMap::new();
        parameters.insert("gain_db".to_string(), 1000.0);
        let chain = EffectChain::from_descriptors([EffectDescriptor {
            kind: EffectKind::Gain,
            parameters,
        }]);

        let rendered = render(&raw, &chain, 44100);

        assert!(rendered.as_interleaved().iter().all(|s| s.is_finite()));
        assert!((rendered[0] - 0.01 * 15.849).abs() < 1e-3);
    }
}
