//! Cross-chunk label stitching.
//!
//! After per-chunk labeling, component labels are only unique within a
//! chunk. The stitching stage first rewrites them into disjoint global
//! ranges (`make_unique_labels`), then compares thin voxel bands across
//! every chunk boundary against the three positive-direction neighbors,
//! collects label pairs that meet across a boundary, and resolves them
//! with a union-find whose canonical label is the smallest set member.
//! The final pass relabels every chunk, crops the read padding away, and
//! persists the stitched artifact.

mod stitcher;
mod union_find;
mod unique;

pub use stitcher::{
    build_merge_list, collect_chunk_merge_pairs, relabel_volume, stitch_chunks, StitchSummary,
};
pub use union_find::UnionFind;
pub use unique::make_unique_labels;
