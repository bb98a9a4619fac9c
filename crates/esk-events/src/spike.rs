//! Discrete spike events.

use esk_types::{Delay, NodeId, ReceptorType};

/// A discrete spike emitted by a source neuron, destined for one target.
///
/// Handlers deposit `weight * multiplicity` into the target's ring buffer
/// at the relative delivery step `stamp + delay` (, "Ordering
/// guarantees"). `offset` is the sub-step offset within step `stamp`; it is
/// `0.0` for on-grid (non-precise) models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeEvent {
    /// Identity of the emitting neuron.
    pub source: NodeId,
    /// Identity of the receiving neuron.
    pub target: NodeId,
    /// Integer step at which the spike was emitted.
    pub stamp: i64,
    /// Sub-step offset within `stamp`, in `[0, h)`. Zero for grid-aligned
    /// emission.
    pub offset: f64,
    /// Synaptic weight of the connection the spike travels along.
    pub weight: f64,
    /// Number of coincident spikes folded into one event (always `1` unless
    /// the source explicitly emits a multiplicity, e.g. a Poisson
    /// generator producing several spikes in the same step).
    pub multiplicity: u32,
    /// Receptor port on the target this event targets.
    pub receptor: ReceptorType,
    /// Connection delay, in integration steps.
    pub delay: Delay,
}

impl SpikeEvent {
    /// The absolute step at which this event is delivered: `stamp +
    /// delay`. Spec §8: `delivery_step - source_step == delay` always.
    pub fn delivery_step(&self) -> i64 {
        self.stamp + self.delay.steps() as i64
    }

    /// Total deposited magnitude: `weight * multiplicity`.
    pub fn deposit(&self) -> f64 {
        self.weight * self.multiplicity as f64
    }
}
