//! Spatially embedded layers, geometric masks, and the n-tree spatial index.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bbox;
pub mod layer;
pub mod mask;
pub mod ntree;

pub use bbox::BoundingBox;
pub use layer::{FreeLayer, GridLayer};
pub use mask::{
    AllMask, Anchored, BallMask, BoxMask, Converse, Difference, EllipseMask, GridMask,
    Intersection, Mask, Union,
};
pub use ntree::NTree;
