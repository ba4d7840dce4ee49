//! Foundational primitives for volumetric segmentation processing.
//!
//! ## Volumes and Axis Order
//! Volumes are dense 3D arrays with shape `[sx, sy, sz]` and x-fastest
//! element order: `idx = (z * sy + y) * sx + x`. All coordinates carried
//! across the workspace are voxel coordinates unless a function explicitly
//! works in physical (scaled) units.
//!
//! ## Coordinates
//! Global coordinates are signed (`Vec3i`) so that padded reads may start
//! before the dataset origin; stores zero-fill outside their extent.
//!
//! ## Configuration
//! `PipelineConfig` is built once per run from a key-value source and passed
//! by reference. There is no global mutable configuration state.

mod config;
mod error;
mod geom;
mod volume;

pub use config::{ChannelConfig, ConfigSource, MapSource, PipelineConfig};
pub use error::Error;
pub use geom::{BoundingBox, Vec3f, Vec3i};
pub use volume::Volume;
