use std::collections::BTreeSet;

use tracing::debug;

use crate::graph::SkeletonGraph;

/// Thresholds for pass-through node removal, in physical units.
///
/// Both distance thresholds apply to the straight-line distance between
/// the candidate's two neighbors, which is the length of the edge that
/// replaces the node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparsifyConfig {
    /// A node is removable by angle only if the angle spanned by its two
    /// edges exceeds this, i.e. the run is nearly straight.
    pub min_angle_deg: f32,
    /// Angle-based removal additionally requires the neighbors closer
    /// than this.
    pub max_neighbor_dist: f32,
    /// Neighbors at or closer than this are merged regardless of angle.
    pub min_neighbor_dist: f32,
}

impl Default for SparsifyConfig {
    fn default() -> Self {
        Self {
            min_angle_deg: 135.0,
            max_neighbor_dist: 500.0,
            min_neighbor_dist: 50.0,
        }
    }
}

/// Removes pass-through nodes from nearly straight, densely sampled runs.
///
/// Only nodes whose degree in the *input* graph is exactly 2 are
/// candidates, so branch points and endpoints survive even when removal
/// temporarily changes degrees around them; each removal reconnects the
/// two neighbors directly. Scanning repeats until a fixed point, then the
/// surviving nodes are compacted into a fresh graph.
pub fn sparsify_skeleton(graph: &SkeletonGraph, config: &SparsifyConfig) -> SkeletonGraph {
    let n = graph.nodes.len();
    let original_degree = graph.degrees();
    let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for &(a, b) in &graph.edges {
        adjacency[a].insert(b);
        adjacency[b].insert(a);
    }
    let mut removed = vec![false; n];
    let cos_limit = config.min_angle_deg.to_radians().cos();

    loop {
        let mut changed = false;
        for node in 0..n {
            if removed[node] || original_degree[node] != 2 || adjacency[node].len() != 2 {
                continue;
            }
            let mut it = adjacency[node].iter();
            let (Some(&a), Some(&b)) = (it.next(), it.next()) else {
                continue;
            };
            if a == b {
                continue;
            }

            let pos = graph.nodes[node].position;
            let to_a = graph.nodes[a].position - pos;
            let to_b = graph.nodes[b].position - pos;
            let da = to_a.norm();
            let db = to_b.norm();
            if da == 0.0 || db == 0.0 {
                continue;
            }

            // angle > min_angle_deg <=> cos(angle) < cos(min_angle_deg)
            let cos_angle = to_a.dot(to_b) / (da * db);
            let span = (graph.nodes[a].position - graph.nodes[b].position).norm();
            let straight_enough = cos_angle < cos_limit && span < config.max_neighbor_dist;
            let close_neighbors = span <= config.min_neighbor_dist;
            if !straight_enough && !close_neighbors {
                continue;
            }

            adjacency[a].remove(&node);
            adjacency[b].remove(&node);
            adjacency[a].insert(b);
            adjacency[b].insert(a);
            adjacency[node].clear();
            removed[node] = true;
            changed = true;
        }
        if !changed {
            break;
        }
    }

    let mut out = SkeletonGraph::new();
    let mut remap = vec![usize::MAX; n];
    for node in 0..n {
        if !removed[node] {
            remap[node] = out.add_node(graph.nodes[node].position, graph.nodes[node].radius);
        }
    }
    for node in 0..n {
        if removed[node] {
            continue;
        }
        for &other in &adjacency[node] {
            if node < other {
                out.add_edge(remap[node], remap[other]);
            }
        }
    }

    debug!(
        before = graph.nodes.len(),
        after = out.nodes.len(),
        "sparsified skeleton"
    );
    out
}
