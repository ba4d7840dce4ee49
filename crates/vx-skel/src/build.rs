use std::collections::HashSet;

use vx_core::{Error, Vec3f, Vec3i};

use crate::graph::SkeletonGraph;

/// Pluggable skeletonization backend.
///
/// Implementations receive the object's absolute voxel coordinates and
/// the physical voxel size and return a connected skeleton graph, or
/// `None` for objects too small to skeletonize.
pub trait Skeletonizer {
    fn skeletonize(
        &self,
        voxels: &[Vec3i],
        scaling: Vec3f,
    ) -> Result<Option<SkeletonGraph>, Error>;
}

/// Sample-based skeletonizer.
///
/// Takes every `sample_step`-th voxel in scan order as a node, estimates
/// the node radius from axis-aligned runs inside the object, and connects
/// the nodes with a Euclidean minimum spanning tree in physical space.
/// Objects with fewer than `dust_threshold` voxels yield no skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSkeletonizer {
    pub sample_step: usize,
    pub dust_threshold: u64,
}

impl Default for SampleSkeletonizer {
    fn default() -> Self {
        Self {
            sample_step: 8,
            dust_threshold: 10,
        }
    }
}

const AXIS_DIRS: [Vec3i; 6] = [
    Vec3i::new(-1, 0, 0),
    Vec3i::new(1, 0, 0),
    Vec3i::new(0, -1, 0),
    Vec3i::new(0, 1, 0),
    Vec3i::new(0, 0, -1),
    Vec3i::new(0, 0, 1),
];

/// Shortest physical distance from `voxel` to the object boundary along
/// the coordinate axes.
pub(crate) fn axis_radius(voxel: Vec3i, members: &HashSet<Vec3i>, scaling: Vec3f) -> f32 {
    let mut best = f32::MAX;
    for dir in &AXIS_DIRS {
        let step = scaling.scale(dir.to_f()).norm();
        let mut cursor = voxel;
        let mut run = 0u32;
        loop {
            cursor = cursor + *dir;
            if !members.contains(&cursor) {
                break;
            }
            run += 1;
        }
        best = best.min(run as f32 * step + 0.5 * step);
    }
    best
}

impl Skeletonizer for SampleSkeletonizer {
    fn skeletonize(
        &self,
        voxels: &[Vec3i],
        scaling: Vec3f,
    ) -> Result<Option<SkeletonGraph>, Error> {
        if self.sample_step == 0 {
            return Err(Error::InvalidValue {
                key: "sample_step".to_owned(),
                value: "0".to_owned(),
            });
        }
        if (voxels.len() as u64) < self.dust_threshold || voxels.is_empty() {
            return Ok(None);
        }

        let members: HashSet<Vec3i> = voxels.iter().copied().collect();
        let mut sampled: Vec<Vec3i> = voxels.iter().copied().step_by(self.sample_step).collect();
        if sampled.is_empty() {
            sampled.push(voxels[0]);
        }

        let mut graph = SkeletonGraph::new();
        for &voxel in &sampled {
            let position = scaling.scale(voxel.to_f());
            let radius = axis_radius(voxel, &members, scaling);
            graph.add_node(position, radius);
        }

        // Prim's MST over physical node distances keeps the skeleton
        // connected whenever the object is.
        let n = graph.nodes.len();
        if n > 1 {
            let mut in_tree = vec![false; n];
            let mut best_dist = vec![f32::MAX; n];
            let mut best_from = vec![0usize; n];
            in_tree[0] = true;
            for i in 1..n {
                best_dist[i] = (graph.nodes[i].position - graph.nodes[0].position).norm();
            }

            for _ in 1..n {
                let mut next = None;
                let mut next_dist = f32::MAX;
                for i in 0..n {
                    if !in_tree[i] && best_dist[i] < next_dist {
                        next_dist = best_dist[i];
                        next = Some(i);
                    }
                }
                let Some(next) = next else {
                    break;
                };
                in_tree[next] = true;
                graph.add_edge(best_from[next], next);
                for i in 0..n {
                    if in_tree[i] {
                        continue;
                    }
                    let d = (graph.nodes[i].position - graph.nodes[next].position).norm();
                    if d < best_dist[i] {
                        best_dist[i] = d;
                        best_from[i] = next;
                    }
                }
            }
        }

        Ok(Some(graph))
    }
}
