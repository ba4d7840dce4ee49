//! Chunk grid and storage adapters.
//!
//! A [`ChunkDataset`] tiles a bounding box on a regular stride equal to the
//! chunk size; the read `overlap` is metadata consumed when loading padded
//! sub-volumes and never changes the stride. Chunk adjacency is resolved by
//! coordinate arithmetic through the coordinate index; a miss at the volume
//! edge yields a sentinel, never an error.

mod artifact;
mod chunk;
mod markers;
mod store;

pub use artifact::{load_container, save_container, stage_path, ChannelContainer, Stage};
pub use chunk::{Chunk, ChunkDataset};
pub use markers::{
    read_error_markers, validate_chunks, write_error_marker, MarkerKind, ValidationSummary,
};
pub use store::{MemoryVolumeStore, VolumeStore};
