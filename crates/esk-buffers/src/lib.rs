//! Per-neuron spike/current accumulation buffers.
//!
//! [`ring::RingBuffer`] is the grid-aligned lag accumulator every neuron
//! owns for each input channel. [`slice::SliceRingBuffer`] is the
//! off-grid priority queue used by precise-timing models.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ring;
pub mod slice;

pub use ring::RingBuffer;
pub use slice::{NextSpike, SliceRingBuffer};
