use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use vx_core::{BoundingBox, Vec3i};

/// Kinds of segmentation objects handled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Supervoxel.
    Sv,
    /// Mitochondrion.
    Mi,
    /// Vesicle cloud.
    Vc,
    /// Synaptic junction.
    Sj,
    /// Contact site.
    Cs,
    /// Synapse.
    Syn,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sv => "sv",
            Self::Mi => "mi",
            Self::Vc => "vc",
            Self::Sj => "sj",
            Self::Cs => "cs",
            Self::Syn => "syn",
        }
    }
}

impl core::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One object's voxels as seen from a single chunk. Coordinates are
/// absolute dataset voxels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialObject {
    pub id: u64,
    pub chunk_number: usize,
    pub voxels: Vec<Vec3i>,
    pub bounding_box: BoundingBox,
}

/// Fully reduced segmentation object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: u64,
    pub object_type: ObjectType,
    /// Absolute voxel coordinates in scan order (z, then y, then x).
    pub voxels: Vec<Vec3i>,
    pub bounding_box: BoundingBox,
    /// Voxel count.
    pub size: u64,
    /// Member voxel closest to the bounding-box center.
    pub rep_coord: Vec3i,
}

pub fn object_path(root: &Path, object_type: ObjectType, id: u64) -> PathBuf {
    root.join("objects")
        .join(object_type.as_str())
        .join(format!("{id}.json"))
}

#[cfg(test)]
mod tests {
    use super::{object_path, ObjectType};
    use std::path::Path;

    #[test]
    fn object_paths_are_grouped_by_type() {
        let root = Path::new("/data/run0");
        assert_eq!(
            object_path(root, ObjectType::Mi, 42),
            root.join("objects/mi/42.json")
        );
        assert_eq!(ObjectType::Syn.to_string(), "syn");
    }
}
