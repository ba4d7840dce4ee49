//! Per-chunk labeling kernels.
//!
//! A block is a padded sub-volume of size `chunk_size + 2*overlap`. Each
//! channel is processed independently: optional context crop, optional
//! Gaussian smoothing, optional membrane masking, optional thresholding,
//! then 6-connectivity component labeling. Contact-site detection is a
//! specialized variant working on an integer label volume.
//!
//! An empty or all-zero channel result is a data-quality warning recorded
//! as a per-chunk marker file by the stage driver, not a hard failure.

mod components;
mod contact;
mod driver;
mod labeler;
mod smooth;

pub use components::label_components_6;
pub use contact::{contact_partners, detect_contact_sites, detect_contact_voxels};
pub use driver::{detect_contact_chunks, label_chunks, ContactStageSummary, LabelStageSummary};
pub use labeler::{label_block, BlockLabelConfig, ChannelResult};
pub use smooth::{smooth_volume, GaussKernel1D};
