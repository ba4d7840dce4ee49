use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Vec3f, Vec3i};

/// Key-value configuration provider, looked up by section and key.
///
/// A missing required key is a hard error at the point of first use. The
/// only documented fallbacks live in [`PipelineConfig::from_source`].
pub trait ConfigSource {
    fn get(&self, section: &str, key: &str) -> Option<&str>;
}

/// In-memory source, used by tests and the CLI after parsing a config file.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    entries: BTreeMap<(String, String), String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section: &str, key: &str, value: &str) {
        self.entries
            .insert((section.to_owned(), key.to_owned()), value.to_owned());
    }
}

impl ConfigSource for MapSource {
    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.entries
            .get(&(section.to_owned(), key.to_owned()))
            .map(String::as_str)
    }
}

/// Per-channel labeling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    /// Gaussian sigma per axis; all-zero skips smoothing.
    pub sigma: Vec3f,
    /// Binarization threshold; `0.0` means the channel is already binary
    /// or labeled.
    pub threshold: f32,
    /// Suppress candidate voxels under membrane evidence.
    pub mask_with_membrane: bool,
}

/// Immutable per-run pipeline configuration, constructed once and passed by
/// reference through every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Physical voxel size per axis.
    pub scaling: Vec3f,
    pub chunk_size: Vec3i,
    /// Read padding per chunk face; does not change the tiling stride.
    pub overlap: Vec3i,
    /// Half-width of the boundary comparison band used by stitching.
    pub stitch_overlap: Vec3i,
    /// Fraction of the dynamic range above which membrane evidence masks a
    /// candidate voxel.
    pub membrane_fraction: f32,
    /// Dynamic range of probability channels.
    pub dynamic_range: f32,
    /// Grouping window for contact-site detection.
    pub contact_window: [usize; 3],
    pub channels: Vec<ChannelConfig>,
    /// Skeletonize by mask thinning instead of surface sampling.
    pub mask_skeletonization: bool,
    /// Components below this voxel count are skipped by skeletonization.
    pub dust_threshold: usize,
}

impl PipelineConfig {
    /// Builds a configuration from a key-value source.
    ///
    /// Documented fallbacks: `[dataset] scaling` defaults to `1,1,1` and
    /// `[skeleton] mask_skeletonization` defaults to `false`. Every other
    /// key listed here is required.
    pub fn from_source(src: &impl ConfigSource) -> Result<Self, Error> {
        let scaling = match src.get("dataset", "scaling") {
            Some(raw) => parse_vec3f("dataset.scaling", raw)?,
            None => Vec3f::new(1.0, 1.0, 1.0),
        };
        let mask_skeletonization = match src.get("skeleton", "mask_skeletonization") {
            Some(raw) => parse_bool("skeleton.mask_skeletonization", raw)?,
            None => false,
        };

        Ok(Self {
            scaling,
            chunk_size: parse_vec3i("chunks.chunk_size", required(src, "chunks", "chunk_size")?)?,
            overlap: parse_vec3i("chunks.overlap", required(src, "chunks", "overlap")?)?,
            stitch_overlap: parse_vec3i(
                "chunks.stitch_overlap",
                required(src, "chunks", "stitch_overlap")?,
            )?,
            membrane_fraction: 0.4,
            dynamic_range: 255.0,
            contact_window: [13, 13, 7],
            channels: Vec::new(),
            mask_skeletonization,
            dust_threshold: parse_usize(
                "skeleton.dust_threshold",
                required(src, "skeleton", "dust_threshold")?,
            )?,
        })
    }
}

fn required<'a>(src: &'a impl ConfigSource, section: &str, key: &str) -> Result<&'a str, Error> {
    src.get(section, key).ok_or_else(|| Error::MissingKey {
        section: section.to_owned(),
        key: key.to_owned(),
    })
}

fn parse_vec3i(key: &str, raw: &str) -> Result<Vec3i, Error> {
    let parts = split3(key, raw)?;
    let mut out = [0i64; 3];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.trim().parse().map_err(|_| Error::InvalidValue {
            key: key.to_owned(),
            value: raw.to_owned(),
        })?;
    }
    Ok(Vec3i::new(out[0], out[1], out[2]))
}

fn parse_vec3f(key: &str, raw: &str) -> Result<Vec3f, Error> {
    let parts = split3(key, raw)?;
    let mut out = [0f32; 3];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.trim().parse().map_err(|_| Error::InvalidValue {
            key: key.to_owned(),
            value: raw.to_owned(),
        })?;
    }
    Ok(Vec3f::new(out[0], out[1], out[2]))
}

fn split3<'a>(key: &str, raw: &'a str) -> Result<[&'a str; 3], Error> {
    let mut it = raw.split(',');
    let invalid = || Error::InvalidValue {
        key: key.to_owned(),
        value: raw.to_owned(),
    };
    let a = it.next().ok_or_else(invalid)?;
    let b = it.next().ok_or_else(invalid)?;
    let c = it.next().ok_or_else(invalid)?;
    if it.next().is_some() {
        return Err(invalid());
    }
    Ok([a, b, c])
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, Error> {
    match raw.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(Error::InvalidValue {
            key: key.to_owned(),
            value: raw.to_owned(),
        }),
    }
}

fn parse_usize(key: &str, raw: &str) -> Result<usize, Error> {
    raw.trim().parse().map_err(|_| Error::InvalidValue {
        key: key.to_owned(),
        value: raw.to_owned(),
    })
}
