//! Aggregated entity datasets.
//!
//! An aggregation dataset groups extracted supervoxels into higher-level
//! entities (cells) through an explicit mapping, stores per-entity state
//! under a fanned-out `so_storage/` tree, and keeps column-style
//! attribute caches aligned with the entity ID column for fast bulk
//! reads. Everything that requires the mapping fails hard when no
//! mapping was applied, since silently empty results would poison every
//! downstream analysis.

mod coherent;
mod dataset;
mod entity;

pub use coherent::Cached;
pub use dataset::{AggregationDataset, DeepSaveSummary};
pub use entity::{entity_dir, AggregatedObject, LockGuard};
