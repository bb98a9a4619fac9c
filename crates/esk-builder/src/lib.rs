//! Spatial connection rules and the per-connection parameter evaluation
//! tree.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alias;
pub mod parallel;
pub mod parameter;
pub mod rule;

pub use alias::AliasTable;
pub use parallel::{fixed_indegree_parallel, pairwise_bernoulli_target_driven_parallel};
pub use parameter::{
    Clip, CompareOp, Compare, Conditional, Constant, Distance, ElementaryOp, Elementary,
    EvalContext, ExpDist, Gaussian, Gaussian2d, GammaDist, Max, Min, NodePos, PairPos, PairSide,
    Parameter, Pow, RandomDistribution, Redraw,
};
pub use rule::{
    fixed_indegree, fixed_outdegree, pairwise_bernoulli_source_driven,
    pairwise_bernoulli_target_driven, reject_device_targets, Connection, SynapseSpec,
};
