use vx_core::{ChannelConfig, Error, Vec3i, Volume};

use crate::components::label_components_6;
use crate::smooth::smooth_volume;

/// Block-level parameters shared by all channels of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLabelConfig {
    pub chunk_size: Vec3i,
    pub overlap: Vec3i,
    /// Fraction of `dynamic_range` above which membrane evidence masks a
    /// candidate voxel.
    pub membrane_fraction: f32,
    pub dynamic_range: f32,
}

impl BlockLabelConfig {
    pub fn padded_shape(&self) -> [usize; 3] {
        (self.chunk_size + self.overlap * 2).to_shape()
    }
}

/// Output of labeling one channel of one block.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelResult {
    /// Block-local labels over the padded extent.
    pub labels: Volume<u64>,
    pub component_count: u64,
}

/// Labels one probability/binary channel of a padded block.
///
/// Steps, in order: crop any extra context beyond the declared overlap,
/// Gaussian smoothing (only for non-zero sigma), masking against a
/// companion membrane channel, thresholding (skipped when the threshold is
/// 0, meaning the channel is already binary/labeled), then 6-connectivity
/// labeling.
pub fn label_block(
    block: &Volume<f32>,
    membrane: Option<&Volume<f32>>,
    spec: &ChannelConfig,
    cfg: &BlockLabelConfig,
) -> Result<ChannelResult, Error> {
    let target = cfg.padded_shape();
    let mut data = if block.shape() != target {
        block.crop_center(target)?
    } else {
        block.clone()
    };

    if spec.sigma.x + spec.sigma.y + spec.sigma.z != 0.0 {
        data = smooth_volume(&data, spec.sigma);
    }

    if spec.mask_with_membrane {
        let membrane =
            membrane.ok_or_else(|| Error::MissingChannel("membrane".to_owned()))?;
        let membrane = if membrane.shape() != target {
            membrane.crop_center(target)?
        } else {
            membrane.clone()
        };
        let cutoff = cfg.membrane_fraction * cfg.dynamic_range;
        for (v, &m) in data.data_mut().iter_mut().zip(membrane.data()) {
            if m > cutoff {
                *v = 0.0;
            }
        }
    }

    let mask = if spec.threshold != 0.0 {
        data.map(|v| u8::from(v > spec.threshold))
    } else {
        data.map(|v| u8::from(v > 0.0))
    };

    let (labels, component_count) = label_components_6(&mask);
    Ok(ChannelResult {
        labels,
        component_count,
    })
}
