//! Continuous "secondary" events: gap junctions, rate coupling,
//! diffusion, and slow neuromodulatory signals. Unlike [`SpikeEvent`], these
//! carry a small fixed-size vector of values per source per min-delay
//! window rather than a single weighted deposit.
//!
//! [`SpikeEvent`]: crate::spike::SpikeEvent

use esk_types::{KernelError, NodeId, Result, SynapseModelId};
use smallvec::SmallVec;

/// Which secondary-event family a connection carries.
///
/// Each variant has a fixed `coeff_length`: the number of `f64`
/// values serialized after the synapse-type tag and source id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryKind {
    /// Interpolated membrane-voltage coefficient for gap-junction coupling.
    GapJunction,
    /// A single instantaneous rate value.
    InstantaneousRate,
    /// A single rate value, delivered `delay` steps later than emitted.
    DelayedRate,
    /// Drift and diffusion coefficients of a stochastic coupling.
    Diffusion,
    /// A scalar learning (neuromodulatory) signal.
    LearningSignal,
    /// A scalar slow inhibitory current.
    SlowInhibitoryCurrent,
}

impl SecondaryKind {
    /// Number of `f64` coefficients this kind carries.
    pub const fn coeff_length(&self) -> usize {
        match self {
            SecondaryKind::GapJunction => 1,
            SecondaryKind::InstantaneousRate => 1,
            SecondaryKind::DelayedRate => 1,
            SecondaryKind::Diffusion => 2,
            SecondaryKind::LearningSignal => 1,
            SecondaryKind::SlowInhibitoryCurrent => 1,
        }
    }
}

/// A continuous secondary event in flight between one source and one
/// target.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryEvent {
    /// Which family this event belongs to.
    pub kind: SecondaryKind,
    /// Identity of the emitting neuron.
    pub source: NodeId,
    /// `coeff_length` coefficient values, in kind-defined order (for
    /// `Diffusion`: `[drift, diffusion]`).
    pub coeffs: SmallVec<[f64; 2]>,
    /// Relative delivery delay in steps, used by [`SecondaryKind::DelayedRate`].
    pub delay_steps: u32,
}

impl SecondaryEvent {
    /// Construct an event, panicking if `coeffs.len()` does not match
    /// `kind.coeff_length()`. Use [`SecondaryRegistry::emit`] at the
    /// connection boundary, where the length mismatch must be a recoverable
    /// [`KernelError`] rather than a panic.
    pub fn new(kind: SecondaryKind, source: NodeId, coeffs: &[f64], delay_steps: u32) -> Self {
        assert_eq!(coeffs.len(), kind.coeff_length());
        Self {
            kind,
            source,
            coeffs: SmallVec::from_slice(coeffs),
            delay_steps,
        }
    }
}

/// Tracks, per synapse model, the secondary-event kind declared at
/// connection time.
///
/// A source model that never declares a kind for a given `SynapseModelId`
/// cannot emit through it; attempting to do so raises
/// [`KernelError::IllegalConnection`].
#[derive(Debug, Clone, Default)]
pub struct SecondaryRegistry {
    declared: std::collections::HashMap<SynapseModelId, SecondaryKind>,
}

impl SecondaryRegistry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `syn_id` carries secondary events of `kind`. Declaring
    /// the same `syn_id` twice with a different kind is rejected: the
    /// coefficient length is fixed for the lifetime of the connection.
    pub fn declare(&mut self, syn_id: SynapseModelId, kind: SecondaryKind) -> Result<()> {
        match self.declared.get(&syn_id) {
            Some(existing) if *existing != kind => Err(KernelError::illegal_connection(format!(
                "synapse model {:?} already declared as {:?}, cannot redeclare as {:?}",
                syn_id, existing, kind
            ))),
            _ => {
                self.declared.insert(syn_id, kind);
                Ok(())
            }
        }
    }

    /// Emit a secondary event through `syn_id`, verifying that `syn_id` was
    /// declared and that `coeffs` matches its declared length.
    ///
    /// Returns [`KernelError::IllegalConnection`] if `syn_id` was never
    /// declared.
    pub fn emit(
        &self,
        syn_id: SynapseModelId,
        source: NodeId,
        coeffs: &[f64],
        delay_steps: u32,
    ) -> Result<SecondaryEvent> {
        let kind = self.declared.get(&syn_id).ok_or_else(|| {
            KernelError::illegal_connection(format!(
                "synapse model {:?} never declared a secondary event kind",
                syn_id
            ))
        })?;
        if coeffs.len() != kind.coeff_length() {
            return Err(KernelError::illegal_connection(format!(
                "secondary event for {:?} expects {} coefficients, got {}",
                kind,
                kind.coeff_length(),
                coeffs.len()
            )));
        }
        Ok(SecondaryEvent::new(*kind, source, coeffs, delay_steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_emit_succeeds_with_matching_length() {
        let mut reg = SecondaryRegistry::new();
        let syn = SynapseModelId::new(1);
        reg.declare(syn, SecondaryKind::Diffusion).unwrap();
        let ev = reg
            .emit(syn, NodeId::new(1), &[0.1, 0.2], 0)
            .expect("declared kind should emit");
        assert_eq!(ev.coeffs.as_slice(), &[0.1, 0.2]);
    }

    #[test]
    fn emit_without_declaration_is_illegal_connection() {
        let reg = SecondaryRegistry::new();
        let err = reg
            .emit(SynapseModelId::new(5), NodeId::new(1), &[1.0], 0)
            .unwrap_err();
        assert!(matches!(err, KernelError::IllegalConnection { .. }));
    }

    #[test]
    fn redeclaring_with_a_different_kind_is_rejected() {
        let mut reg = SecondaryRegistry::new();
        let syn = SynapseModelId::new(2);
        reg.declare(syn, SecondaryKind::GapJunction).unwrap();
        let err = reg.declare(syn, SecondaryKind::Diffusion).unwrap_err();
        assert!(matches!(err, KernelError::IllegalConnection { .. }));
    }

    #[test]
    fn wrong_coefficient_count_is_rejected() {
        let mut reg = SecondaryRegistry::new();
        let syn = SynapseModelId::new(3);
        reg.declare(syn, SecondaryKind::InstantaneousRate).unwrap();
        let err = reg.emit(syn, NodeId::new(1), &[1.0, 2.0], 0).unwrap_err();
        assert!(matches!(err, KernelError::IllegalConnection { .. }));
    }
}
