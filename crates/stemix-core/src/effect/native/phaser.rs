//! Phaser effect
//!
//! Six first-order allpass stages whose break frequency is swept by an LFO,
//! mixed half and half with the dry signal.

use std::f32::consts::{PI, TAU};

use crate::effect::{delegate_effect_base, Effect, EffectBase, EffectInfo, ParamInfo};
use crate::types::AudioBuffer;

const NUM_STAGES: usize = 6;

/// Centre of the sweep in Hz
const CENTRE_FREQUENCY: f32 = 1300.0;

/// Sweep range at full depth, in octaves either side of the centre
const SWEEP_OCTAVES: f32 = 2.0;

const MIX: f32 = 0.5;

/// State of one first-order allpass stage
#[derive(Clone, Copy, Default)]
struct AllpassStage {
    x1: f32,
    y1: f32,
}

impl AllpassStage {
    #[inline]
    fn process(&mut self, input: f32, coeff: f32) -> f32 {
        let output = coeff * input + self.x1 - coeff * self.y1;
        self.x1 = input;
        self.y1 = output;
        output
    }
}

/// Phaser
///
/// Parameters:
/// - rate_hz: LFO rate (0.1-5.0 Hz)
/// - depth: Sweep depth (0.0-1.0)
pub struct PhaserEffect {
    base: EffectBase,
    stages: Vec<[AllpassStage; NUM_STAGES]>,
    phase: f32,
    sample_rate: u32,
}

impl PhaserEffect {
    /// Schema for the phaser effect
    pub fn effect_info() -> EffectInfo {
        EffectInfo::new("Phaser", "Modulation")
            .with_param(
                ParamInfo::new("rate_hz", 0.5)
                    .with_range(0.1, 5.0)
                    .with_unit("Hz"),
            )
            .with_param(ParamInfo::new("depth", 0.5).with_range(0.0, 1.0))
    }

    /// Create a new phaser; call `prepare` before processing
    pub fn new() -> Self {
        Self {
            base: EffectBase::new(Self::effect_info()),
            stages: Vec::new(),
            phase: 0.0,
            sample_rate: 44100,
        }
    }

    /// Allpass coefficient for a break frequency
    #[inline]
    fn coefficient(freq: f32, sample_rate: f32) -> f32 {
        let freq = freq.min(sample_rate * 0.49);
        let t = (PI * freq / sample_rate).tan();
        (t - 1.0) / (t + 1.0)
    }
}

impl Default for PhaserEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for PhaserEffect {
    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate.max(1);
        self.stages = vec![[AllpassStage::default(); NUM_STAGES]; channels];
        self.phase = 0.0;
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if self.stages.len() != buffer.channels() {
            self.prepare(self.sample_rate, buffer.channels());
        }

        let sr = self.sample_rate as f32;
        let phase_inc = self.base.param_actual(0) / sr;
        let depth = self.base.param_actual(1);

        for frame in buffer.frames_iter_mut() {
            let lfo = (TAU * self.phase).sin();
            let freq = CENTRE_FREQUENCY * (depth * SWEEP_OCTAVES * lfo).exp2();
            let coeff = Self::coefficient(freq, sr);

            for (sample, stages) in frame.iter_mut().zip(self.stages.iter_mut()) {
                let mut wet = *sample;
                for stage in stages.iter_mut() {
                    wet = stage.process(wet, coeff);
                }
                *sample = *sample * (1.0 - MIX) + wet * MIX;
            }

            self.phase = (self.phase + phase_inc).fract();
        }
    }

    delegate_effect_base!();

    fn reset(&mut self) {
        for stages in &mut self.stages {
            *stages = [AllpassStage::default(); NUM_STAGES];
        }
        self.phase = 0.0;
    }
}
