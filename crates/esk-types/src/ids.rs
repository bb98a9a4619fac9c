//! Stable identifiers used across the kernel workspace.

use core::fmt;

/// Stable integer identity of a node (neuron), in `[1, N]` 
///
/// `0` is never a valid node id; it is reserved as a sentinel for "no
/// node" in contexts such as an empty receptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Construct a node id. Does not validate range; callers that need the
    /// `[1, N]` invariant check it at the node-collection boundary.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw integer value.
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Index of a worker thread on the local rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId {
    /// Construct a thread id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw integer value.
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

/// Index of an MPI rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RankId(pub u32);

impl RankId {
    /// Construct a rank id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw integer value.
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

/// A virtual process: the combination of rank and thread that owns a node.
///
/// `V_p = threads × ranks` ; a `VpId` is the flat index into
/// that space, used to decide which thread/rank a global node id is local
/// to under round-robin distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VpId(pub u32);

impl VpId {
    /// Construct a virtual process id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw integer value.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Decompose into `(rank, thread)` given the number of local threads
    /// per rank.
    pub const fn decompose(&self, threads_per_rank: u32) -> (RankId, ThreadId) {
        let rank = self.0 / threads_per_rank;
        let thread = self.0 % threads_per_rank;
        (RankId::new(rank), ThreadId::new(thread))
    }

    /// Compose from `(rank, thread)` given the number of local threads per
    /// rank.
    pub const fn compose(rank: RankId, thread: ThreadId, threads_per_rank: u32) -> Self {
        Self(rank.0 * threads_per_rank + thread.0)
    }
}

/// Identifier of a synapse model, used to index per-synapse-type rows of
/// the source table (C6) and to select event-handling behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SynapseModelId(pub u16);

impl SynapseModelId {
    /// Construct a synapse model id.
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Raw integer value.
    pub const fn raw(&self) -> u16 {
        self.0
    }
}

/// An integer delay, a positive multiple of the integration step `h`.
///
/// Invariant: `delay >= 1`. The zero value is never constructed
/// through [`Delay::new`]; use [`Delay::try_new`] at configuration
/// boundaries where the caller-provided value has not yet been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Delay(u32);

impl Delay {
    /// Construct a delay of exactly one step, the minimum legal value.
    pub const MIN: Delay = Delay(1);

    /// Construct a delay from a step count known to be `>= 1`.
    ///
    /// # Panics
    /// Panics if `steps == 0`. Use [`Delay::try_new`] when the value has
    /// not already been validated.
    pub const fn new(steps: u32) -> Self {
        assert!(steps >= 1, "delay must be >= 1 step");
        Self(steps)
    }

    /// Construct a delay, returning `None` if `steps == 0`.
    pub const fn try_new(steps: u32) -> Option<Self> {
        if steps == 0 {
            None
        } else {
            Some(Self(steps))
        }
    }

    /// Number of integration steps this delay spans.
    pub const fn steps(&self) -> u32 {
        self.0
    }
}

/// A receptor port selecting one of several parallel synaptic channels on
/// a target neuron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ReceptorType(pub usize);

impl ReceptorType {
    /// The default receptor (port 0), used by models without multiplexing.
    pub const DEFAULT: ReceptorType = ReceptorType(0);

    /// Construct a receptor type.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Raw port index.
    pub const fn index(&self) -> usize {
        self.0
    }
}
