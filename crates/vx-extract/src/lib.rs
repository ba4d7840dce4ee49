//! Object extraction from stitched per-chunk label volumes.
//!
//! Extraction runs in two phases so that no two tasks ever write the same
//! file. Phase one walks each chunk independently and writes one partial
//! record per `(object ID, chunk)` pair; phase two groups partials by ID
//! and hands each ID to exactly one reduce task, which merges the pieces
//! into the final object record with absolute voxel coordinates.

mod partial;
mod records;
mod reduce;

pub use partial::{
    extract_partial_objects, extract_partials, partial_path, save_partial, ExtractSummary,
};
pub use records::{object_path, ObjectRecord, ObjectType, PartialObject};
pub use reduce::{load_object, reduce_objects, ReduceSummary};
