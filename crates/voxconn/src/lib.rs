//! Umbrella crate for the `voxconn` workspace.
//!
//! This crate re-exports foundational crates. Additional domain-specific
//! modules will be layered on top over time.

pub use vx_core::*;
pub use vx_grid::*;
