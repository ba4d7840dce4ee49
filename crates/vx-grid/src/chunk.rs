use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use vx_core::{BoundingBox, Error, Vec3i};

/// Immutable descriptor of one rectangular unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique sequential identifier within the dataset.
    pub number: usize,
    /// Global voxel offset of the chunk origin.
    pub coordinates: Vec3i,
    /// Logical (unpadded) extent; equals the grid stride except for edge
    /// chunks clamped to the bounding box.
    pub size: Vec3i,
    /// Storage location for intermediate per-chunk artifacts.
    pub folder: PathBuf,
}

/// The set of all chunks for one volume partitioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDataset {
    chunks: Vec<Chunk>,
    coord_dict: HashMap<(i64, i64, i64), usize>,
    pub bounding_box: BoundingBox,
    /// Grid stride per axis.
    pub chunk_size: Vec3i,
    /// Read padding per face.
    pub overlap: Vec3i,
}

impl ChunkDataset {
    /// Enumerates chunk coordinates on a regular stride equal to
    /// `chunk_size`, covering `bounding_box` exactly. Edge chunks are
    /// clamped so logical tile extents neither overlap nor leave gaps.
    pub fn build(
        root: &Path,
        bounding_box: BoundingBox,
        chunk_size: Vec3i,
        overlap: Vec3i,
    ) -> Result<Self, Error> {
        if chunk_size.x <= 0 || chunk_size.y <= 0 || chunk_size.z <= 0 {
            return Err(Error::Consistency(format!(
                "non-positive chunk size {chunk_size:?}"
            )));
        }
        if bounding_box.volume() <= 0 {
            return Err(Error::Consistency(format!(
                "empty bounding box {bounding_box:?}"
            )));
        }
        if overlap.x < 0 || overlap.y < 0 || overlap.z < 0 {
            return Err(Error::Consistency(format!("negative overlap {overlap:?}")));
        }

        let mut chunks = Vec::new();
        let mut coord_dict = HashMap::new();

        let mut z = bounding_box.min.z;
        while z < bounding_box.max.z {
            let mut y = bounding_box.min.y;
            while y < bounding_box.max.y {
                let mut x = bounding_box.min.x;
                while x < bounding_box.max.x {
                    let coordinates = Vec3i::new(x, y, z);
                    let size = Vec3i::new(
                        chunk_size.x.min(bounding_box.max.x - x),
                        chunk_size.y.min(bounding_box.max.y - y),
                        chunk_size.z.min(bounding_box.max.z - z),
                    );
                    let number = chunks.len();
                    coord_dict.insert((x, y, z), number);
                    chunks.push(Chunk {
                        number,
                        coordinates,
                        size,
                        folder: root.join(format!("chunky_{number}")),
                    });
                    x += chunk_size.x;
                }
                y += chunk_size.y;
            }
            z += chunk_size.z;
        }

        Ok(Self {
            chunks,
            coord_dict,
            bounding_box,
            chunk_size,
            overlap,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, number: usize) -> Option<&Chunk> {
        self.chunks.get(number)
    }

    pub fn chunk_at(&self, coordinate: Vec3i) -> Option<usize> {
        self.coord_dict
            .get(&(coordinate.x, coordinate.y, coordinate.z))
            .copied()
    }

    /// Chunk numbers of the six face neighbors in the fixed order
    /// `[-x, -y, -z, +x, +y, +z]`; `None` where the grid ends.
    pub fn neighbors(&self, chunk: &Chunk) -> [Option<usize>; 6] {
        let mut out = [None; 6];
        for dim in 0..3 {
            let step = Vec3i::unit(dim, self.chunk_size.axis(dim));
            out[dim] = self.chunk_at(chunk.coordinates - step);
            out[dim + 3] = self.chunk_at(chunk.coordinates + step);
        }
        out
    }

    /// The three positive-direction neighbors, the only ones compared by
    /// stitching to avoid double counting.
    pub fn forward_neighbors(&self, chunk: &Chunk) -> [Option<usize>; 3] {
        let all = self.neighbors(chunk);
        [all[3], all[4], all[5]]
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::ChunkDataset;
    use vx_core::{BoundingBox, Vec3i};

    fn grid(bb_max: (i64, i64, i64), cs: (i64, i64, i64)) -> ChunkDataset {
        ChunkDataset::build(
            Path::new("/tmp/cset"),
            BoundingBox::new(Vec3i::default(), Vec3i::new(bb_max.0, bb_max.1, bb_max.2)),
            Vec3i::new(cs.0, cs.1, cs.2),
            Vec3i::splat(1),
        )
        .expect("valid grid")
    }

    #[test]
    fn cube_grid_has_eight_chunks_with_three_sentinels_each() {
        let ds = grid((256, 256, 256), (128, 128, 128));
        assert_eq!(ds.len(), 8);

        for chunk in ds.chunks() {
            let n = ds.neighbors(chunk);
            let sentinels = n.iter().filter(|v| v.is_none()).count();
            // Every chunk of a 2x2x2 grid is a corner chunk.
            assert_eq!(sentinels, 3);
            assert_eq!(6 - sentinels, 3);
        }
    }

    #[test]
    fn tiling_covers_bounding_box_without_gaps_or_overlaps() {
        // Non-cubic box, non-power-of-two chunk size, uneven remainder.
        let ds = grid((100, 70, 31), (48, 32, 31));

        let mut covered = 0i64;
        for chunk in ds.chunks() {
            covered += chunk.size.x * chunk.size.y * chunk.size.z;
            for other in ds.chunks() {
                if other.number == chunk.number {
                    continue;
                }
                let disjoint = other.coordinates.x >= chunk.coordinates.x + chunk.size.x
                    || chunk.coordinates.x >= other.coordinates.x + other.size.x
                    || other.coordinates.y >= chunk.coordinates.y + chunk.size.y
                    || chunk.coordinates.y >= other.coordinates.y + other.size.y
                    || other.coordinates.z >= chunk.coordinates.z + chunk.size.z
                    || chunk.coordinates.z >= other.coordinates.z + other.size.z;
                assert!(disjoint, "tiles {} and {} overlap", chunk.number, other.number);
            }
        }
        assert_eq!(covered, ds.bounding_box.volume());
    }

    #[test]
    fn neighbor_symmetry_holds_for_irregular_grids() {
        let ds = grid((100, 70, 31), (48, 32, 31));

        for chunk in ds.chunks() {
            let n = ds.neighbors(chunk);
            for dim in 0..3 {
                if let Some(fwd) = n[dim + 3] {
                    let back = ds.neighbors(ds.chunk(fwd).expect("neighbor exists"));
                    assert_eq!(back[dim], Some(chunk.number));
                }
                if let Some(bwd) = n[dim] {
                    let fwd = ds.neighbors(ds.chunk(bwd).expect("neighbor exists"));
                    assert_eq!(fwd[dim + 3], Some(chunk.number));
                }
            }
        }
    }

    #[test]
    fn edge_lookup_miss_is_sentinel_not_error() {
        let ds = grid((64, 64, 64), (64, 64, 64));
        let only = &ds.chunks()[0];
        assert_eq!(ds.neighbors(only), [None; 6]);
        assert_eq!(ds.chunk_at(Vec3i::new(64, 0, 0)), None);
    }

    #[test]
    fn coord_dict_maps_each_coordinate_to_one_chunk() {
        let ds = grid((96, 96, 96), (32, 48, 96));
        for chunk in ds.chunks() {
            assert_eq!(ds.chunk_at(chunk.coordinates), Some(chunk.number));
        }
    }
}
