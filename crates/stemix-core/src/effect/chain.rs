//! Effect chains - ordered, editable lists of effect descriptors
//!
//! A chain is pure data: it names effect kinds and parameter values but holds
//! no DSP state. The renderer instantiates fresh effects from it every time.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use super::catalog::EffectKind;
use super::ParamInfo;

/// Errors from editing effect descriptors and chains
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    /// No slot with this ID in the chain
    #[error("No effect slot {0}")]
    UnknownSlot(SlotId),

    /// Slot is locked against edits
    #[error("Effect slot {0} is locked")]
    SlotLocked(SlotId),

    /// Effect name not in the catalog
    #[error("Unknown effect: {0}")]
    UnknownEffect(String),

    /// Parameter name not in the kind's schema
    #[error("{kind} has no parameter '{name}'")]
    UnknownParameter { kind: EffectKind, name: String },

    /// Parameter value outside the schema range
    #[error("{name} = {value} is outside [{min}, {max}]")]
    ParameterOutOfRange {
        name: String,
        value: f32,
        min: f32,
        max: f32,
    },
}

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Stable identifier of a slot within one chain
///
/// IDs are never reused after removal, so a stale ID fails with
/// [`ChainError::UnknownSlot`] instead of hitting another slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An effect kind plus its parameter values
///
/// Every parameter name exists in the kind's schema and every value lies in
/// its range, as long as the descriptor is built and edited through these
/// methods. Directly constructed maps go through [`EffectDescriptor::validate`]
/// or [`EffectDescriptor::clamped`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectDescriptor {
    pub kind: EffectKind,
    pub parameters: BTreeMap<String, f32>,
}

impl EffectDescriptor {
    /// Descriptor for `kind` with every parameter at its default
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            parameters: kind.default_parameters(),
        }
    }

    /// The pass-through descriptor
    pub fn none() -> Self {
        Self::new(EffectKind::None)
    }

    /// Builder form of [`EffectDescriptor::set_param`]
    pub fn with_param(mut self, name: &str, value: f32) -> ChainResult<Self> {
        self.set_param(name, value)?;
        Ok(self)
    }

    fn schema_param(&self, name: &str) -> ChainResult<ParamInfo> {
        self.kind
            .param(name)
            .ok_or_else(|| ChainError::UnknownParameter {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    /// Set a parameter in its own unit, rejecting out-of-range values
    pub fn set_param(&mut self, name: &str, value: f32) -> ChainResult<()> {
        let param = self.schema_param(name)?;
        if !param.contains(value) {
            return Err(ChainError::ParameterOutOfRange {
                name: name.to_string(),
                value,
                min: param.min,
                max: param.max,
            });
        }
        self.parameters.insert(param.name, value);
        Ok(())
    }

    /// Set a parameter from a slider position in [0, 1]
    ///
    /// The position is clamped, then mapped to `min + (max - min) * norm`.
    /// Returns the resulting value.
    pub fn set_param_normalized(&mut self, name: &str, normalized: f32) -> ChainResult<f32> {
        let param = self.schema_param(name)?;
        let value = param.denormalize(normalized);
        self.parameters.insert(param.name, value);
        Ok(value)
    }

    /// Current value of a parameter, falling back to the schema default
    pub fn param(&self, name: &str) -> Option<f32> {
        self.parameters
            .get(name)
            .copied()
            .or_else(|| self.kind.param(name).map(|p| p.default))
    }

    /// Check every parameter against the schema
    pub fn validate(&self) -> ChainResult<()> {
        for (name, &value) in &self.parameters {
            let param = self.schema_param(name)?;
            if !param.contains(value) {
                return Err(ChainError::ParameterOutOfRange {
                    name: name.clone(),
                    value,
                    min: param.min,
                    max: param.max,
                });
            }
        }
        Ok(())
    }

    /// Copy with unknown parameters dropped and values clamped into range
    pub fn clamped(&self) -> Self {
        let parameters = self
            .parameters
            .iter()
            .filter_map(|(name, &value)| {
                self.kind
                    .param(name)
                    .map(|p| (name.clone(), p.clamp(value)))
            })
            .collect();
        Self {
            kind: self.kind,
            parameters,
        }
    }
}

/// One entry in an effect chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSlot {
    pub id: SlotId,
    pub descriptor: EffectDescriptor,
    /// Locked slots keep processing but reject edits
    pub locked: bool,
}

/// Ordered sequence of effect slots; signal flows from first to last
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectChain {
    slots: Vec<ChainSlot>,
    next_id: u32,
}

impl EffectChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chain holding the given descriptors, unlocked, in order
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = EffectDescriptor>) -> Self {
        let mut chain = Self::new();
        for descriptor in descriptors {
            chain.push(descriptor);
        }
        chain
    }

    /// Append a descriptor and return its slot ID
    pub fn push(&mut self, descriptor: EffectDescriptor) -> SlotId {
        let id = SlotId(self.next_id);
        self.next_id += 1;
        self.slots.push(ChainSlot {
            id,
            descriptor,
            locked: false,
        });
        id
    }

    /// Append a pass-through slot
    pub fn add_slot(&mut self) -> SlotId {
        self.push(EffectDescriptor::none())
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the chain has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots in signal order
    pub fn slots(&self) -> &[ChainSlot] {
        &self.slots
    }

    /// Descriptors in signal order
    pub fn descriptors(&self) -> impl Iterator<Item = &EffectDescriptor> {
        self.slots.iter().map(|s| &s.descriptor)
    }

    /// Look up a slot
    pub fn slot(&self, id: SlotId) -> ChainResult<&ChainSlot> {
        self.slots
            .iter()
            .find(|s| s.id == id)
            .ok_or(ChainError::UnknownSlot(id))
    }

    /// ID of the slot at a position in the chain
    pub fn slot_at(&self, index: usize) -> Option<SlotId> {
        self.slots.get(index).map(|s| s.id)
    }

    fn editable_slot(&mut self, id: SlotId) -> ChainResult<&mut ChainSlot> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(ChainError::UnknownSlot(id))?;
        if slot.locked {
            return Err(ChainError::SlotLocked(id));
        }
        Ok(slot)
    }

    /// Change a slot's effect kind, resetting its parameters to defaults
    pub fn set_kind(&mut self, id: SlotId, kind: EffectKind) -> ChainResult<()> {
        let slot = self.editable_slot(id)?;
        slot.descriptor = EffectDescriptor::new(kind);
        Ok(())
    }

    /// Set one parameter of a slot from a slider position in [0, 1]
    pub fn set_param_normalized(
        &mut self,
        id: SlotId,
        name: &str,
        normalized: f32,
    ) -> ChainResult<f32> {
        self.editable_slot(id)?
            .descriptor
            .set_param_normalized(name, normalized)
    }

    /// Set one parameter of a slot in its own unit
    pub fn set_param(&mut self, id: SlotId, name: &str, value: f32) -> ChainResult<()> {
        self.editable_slot(id)?.descriptor.set_param(name, value)
    }

    /// Freeze a slot against edits
    pub fn lock(&mut self, id: SlotId) -> ChainResult<()> {
        self.set_locked(id, true)
    }

    /// Allow edits on a slot again
    pub fn unlock(&mut self, id: SlotId) -> ChainResult<()> {
        self.set_locked(id, false)
    }

    fn set_locked(&mut self, id: SlotId, locked: bool) -> ChainResult<()> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(ChainError::UnknownSlot(id))?;
        slot.locked = locked;
        Ok(())
    }

    /// Remove a slot (locked or not) and return it
    pub fn remove(&mut self, id: SlotId) -> ChainResult<ChainSlot> {
        let index = self
            .slots
            .iter()
            .position(|s| s.id == id)
            .ok_or(ChainError::UnknownSlot(id))?;
        Ok(self.slots.remove(index))
    }

    /// Remove every slot
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
