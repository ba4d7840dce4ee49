//! Object skeletons.
//!
//! A skeleton is an undirected graph of physically positioned nodes with
//! per-node radii. Skeletonization itself is pluggable through the
//! [`Skeletonizer`] trait with two built-in strategies:
//! [`SampleSkeletonizer`] connects a deterministic voxel subsample with a
//! minimum spanning tree, which is coarse but cheap and good enough for
//! anchoring per-object statistics; [`MaskSkeletonizer`] thins a dense
//! mask down to a connectivity-preserving voxel core. Sparsification
//! prunes nearly straight runs of pass-through nodes without changing
//! the graph topology.

mod build;
mod graph;
mod sparsify;
mod thin;

pub use build::{SampleSkeletonizer, Skeletonizer};
pub use thin::MaskSkeletonizer;
pub use graph::{SkeletonGraph, SkeletonNode};
pub use sparsify::{sparsify_skeleton, SparsifyConfig};
