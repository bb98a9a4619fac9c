//! Shared identifiers, D-dimensional positions, and the error taxonomy
//! used across the event-driven simulation kernel workspace.
//!
//! This crate has no simulation logic of its own; it exists so that
//! `esk-propagator`, `esk-buffers`, `esk-events`, `esk-neuron`,
//! `esk-spatial`, `esk-connect`, and `esk-builder` can share the same
//! vocabulary without depending on each other.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod position;

pub use error::{KernelError, Result};
pub use ids::{Delay, NodeId, ReceptorType, RankId, SynapseModelId, ThreadId, VpId};
pub use position::{Extent, Position, Position2, Position3};
