use std::collections::{HashMap, HashSet};

use vx_core::{Error, Vec3f, Vec3i, Volume};

use crate::build::{axis_radius, Skeletonizer};
use crate::graph::SkeletonGraph;

/// Mask-based skeletonizer.
///
/// Rasterizes the object into a dense local mask and iteratively peels
/// border voxels whose remaining foreground neighborhood stays
/// 26-connected, so the object can never fall apart; line ends are kept.
/// The surviving voxels become nodes in physical units, joined along
/// 26-adjacency. Objects with fewer than `dust_threshold` voxels yield
/// no skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskSkeletonizer {
    pub dust_threshold: u64,
}

impl Default for MaskSkeletonizer {
    fn default() -> Self {
        Self { dust_threshold: 10 }
    }
}

const OFFSETS_26: usize = 26;

fn offsets_26() -> [Vec3i; OFFSETS_26] {
    let mut out = [Vec3i::default(); OFFSETS_26];
    let mut i = 0;
    for dz in -1i64..=1 {
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx != 0 || dy != 0 || dz != 0 {
                    out[i] = Vec3i::new(dx, dy, dz);
                    i += 1;
                }
            }
        }
    }
    out
}

fn foreground_at(mask: &Volume<u8>, p: Vec3i) -> bool {
    let shape = mask.shape();
    p.x >= 0
        && p.y >= 0
        && p.z >= 0
        && (p.x as usize) < shape[0]
        && (p.y as usize) < shape[1]
        && (p.z as usize) < shape[2]
        && mask.at(p.x as usize, p.y as usize, p.z as usize) != 0
}

fn is_border(mask: &Volume<u8>, p: Vec3i) -> bool {
    for d in 0..3 {
        let step = Vec3i::unit(d, 1);
        if !foreground_at(mask, p + step) || !foreground_at(mask, p - step) {
            return true;
        }
    }
    false
}

/// Whether the voxel's foreground neighbors form one 26-connected set.
/// If so, removing the voxel cannot split the component.
fn neighbors_stay_connected(neighbors: &[Vec3i]) -> bool {
    let set: HashSet<Vec3i> = neighbors.iter().copied().collect();
    let mut seen = HashSet::with_capacity(set.len());
    let mut stack = vec![neighbors[0]];
    seen.insert(neighbors[0]);
    while let Some(cur) = stack.pop() {
        for &other in &set {
            if !seen.contains(&other)
                && (other.x - cur.x).abs() <= 1
                && (other.y - cur.y).abs() <= 1
                && (other.z - cur.z).abs() <= 1
            {
                seen.insert(other);
                stack.push(other);
            }
        }
    }
    seen.len() == set.len()
}

impl Skeletonizer for MaskSkeletonizer {
    fn skeletonize(
        &self,
        voxels: &[Vec3i],
        scaling: Vec3f,
    ) -> Result<Option<SkeletonGraph>, Error> {
        if (voxels.len() as u64) < self.dust_threshold || voxels.is_empty() {
            return Ok(None);
        }

        let mut min = voxels[0];
        let mut max = voxels[0];
        for &v in voxels {
            min = Vec3i::new(min.x.min(v.x), min.y.min(v.y), min.z.min(v.z));
            max = Vec3i::new(max.x.max(v.x), max.y.max(v.y), max.z.max(v.z));
        }
        let extent = max - min + Vec3i::splat(1);
        let mut mask = Volume::new_fill(extent.to_shape(), 0u8);
        for &v in voxels {
            let l = v - min;
            mask.set(l.x as usize, l.y as usize, l.z as usize, 1);
        }

        let offsets = offsets_26();
        loop {
            let mut changed = false;
            for z in 0..extent.z {
                for y in 0..extent.y {
                    for x in 0..extent.x {
                        let p = Vec3i::new(x, y, z);
                        if !foreground_at(&mask, p) || !is_border(&mask, p) {
                            continue;
                        }
                        let neighbors: Vec<Vec3i> = offsets
                            .iter()
                            .map(|&o| p + o)
                            .filter(|&n| foreground_at(&mask, n))
                            .collect();
                        // Line ends stay; anything else goes when its
                        // neighborhood holds together without it.
                        if neighbors.len() <= 1 || !neighbors_stay_connected(&neighbors) {
                            continue;
                        }
                        mask.set(x as usize, y as usize, z as usize, 0);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let members: HashSet<Vec3i> = voxels.iter().copied().collect();
        let mut survivors = Vec::new();
        for z in 0..extent.z {
            for y in 0..extent.y {
                for x in 0..extent.x {
                    let p = Vec3i::new(x, y, z);
                    if foreground_at(&mask, p) {
                        survivors.push(min + p);
                    }
                }
            }
        }

        let mut graph = SkeletonGraph::new();
        let mut index: HashMap<Vec3i, usize> = HashMap::with_capacity(survivors.len());
        for &voxel in &survivors {
            let position = scaling.scale(voxel.to_f());
            let radius = axis_radius(voxel, &members, scaling);
            index.insert(voxel, graph.add_node(position, radius));
        }
        for &voxel in &survivors {
            let a = index[&voxel];
            for &o in &offsets {
                if let Some(&b) = index.get(&(voxel + o)) {
                    if a < b {
                        graph.add_edge(a, b);
                    }
                }
            }
        }

        Ok(Some(graph))
    }
}

#[cfg(test)]
mod tests {
    use super::MaskSkeletonizer;
    use crate::build::Skeletonizer;
    use vx_core::{Vec3f, Vec3i};

    fn rod(len: i64) -> Vec<Vec3i> {
        (0..len).map(|x| Vec3i::new(x, 0, 0)).collect()
    }

    #[test]
    fn thin_rod_survives_thinning_intact() {
        let builder = MaskSkeletonizer { dust_threshold: 1 };
        let graph = builder
            .skeletonize(&rod(16), Vec3f::new(10.0, 10.0, 20.0))
            .expect("skeletonize")
            .expect("skeleton exists");

        // A one-voxel-wide rod is already a skeleton.
        assert_eq!(graph.nodes.len(), 16);
        assert_eq!(graph.edges.len(), 15);
        assert_eq!(graph.component_count(), 1);
        // Rod ends touch the boundary on every axis, radius is half the
        // smallest voxel pitch.
        assert!((graph.nodes[0].radius - 5.0).abs() < 1e-4);
    }

    #[test]
    fn solid_cube_thins_to_a_connected_core() {
        let mut voxels = Vec::new();
        for z in 0..3 {
            for y in 0..3 {
                for x in 0..3 {
                    voxels.push(Vec3i::new(x, y, z));
                }
            }
        }
        let builder = MaskSkeletonizer { dust_threshold: 1 };
        let graph = builder
            .skeletonize(&voxels, Vec3f::new(1.0, 1.0, 1.0))
            .expect("skeletonize")
            .expect("skeleton exists");

        assert!(!graph.is_empty());
        assert!(graph.nodes.len() < voxels.len());
        assert_eq!(graph.component_count(), 1);
    }

    #[test]
    fn dust_objects_yield_no_skeleton() {
        let builder = MaskSkeletonizer { dust_threshold: 100 };
        let out = builder
            .skeletonize(&rod(5), Vec3f::new(1.0, 1.0, 1.0))
            .expect("skeletonize");
        assert!(out.is_none());
    }
}
