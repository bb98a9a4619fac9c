//! Per-neuron integration engine: calibration,
//! grid-exact and precise-timing update, threshold detection, refractory
//! handling, spike-frequency adaptation, and the stochastic-threshold
//! variant used by generalized integrate-and-fire models.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adaptation;
pub mod interpolation;
pub mod models;
pub mod receptor;
pub mod solver;
pub mod stochastic;

pub use adaptation::Adaptation;
pub use interpolation::{find_crossing, CrossingInputs, InterpolationOrder};
pub use receptor::ReceptorTable;
pub use solver::{AdaptiveSolver, OdeSystem};
pub use stochastic::StochasticThreshold;
