use serde::{Deserialize, Serialize};

use vx_core::Vec3f;

/// One skeleton node in physical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkeletonNode {
    pub position: Vec3f,
    /// Estimated local process radius, in the same unit as `position`.
    pub radius: f32,
}

/// Undirected skeleton graph. Edges are stored once with `a < b`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkeletonGraph {
    pub nodes: Vec<SkeletonNode>,
    pub edges: Vec<(usize, usize)>,
}

impl SkeletonGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, position: Vec3f, radius: f32) -> usize {
        self.nodes.push(SkeletonNode { position, radius });
        self.nodes.len() - 1
    }

    /// Adds an undirected edge; self-loops and duplicates are dropped.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let edge = (a.min(b), a.max(b));
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0usize; self.nodes.len()];
        for &(a, b) in &self.edges {
            degrees[a] += 1;
            degrees[b] += 1;
        }
        degrees
    }

    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.nodes.len()];
        for &(a, b) in &self.edges {
            adj[a].push(b);
            adj[b].push(a);
        }
        adj
    }

    /// Total edge length.
    pub fn path_length(&self) -> f32 {
        self.edges
            .iter()
            .map(|&(a, b)| (self.nodes[a].position - self.nodes[b].position).norm())
            .sum()
    }

    pub fn component_count(&self) -> usize {
        let adj = self.adjacency();
        let mut seen = vec![false; self.nodes.len()];
        let mut count = 0;
        let mut stack = Vec::new();

        for start in 0..self.nodes.len() {
            if seen[start] {
                continue;
            }
            count += 1;
            seen[start] = true;
            stack.push(start);
            while let Some(n) = stack.pop() {
                for &m in &adj[n] {
                    if !seen[m] {
                        seen[m] = true;
                        stack.push(m);
                    }
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::SkeletonGraph;
    use vx_core::Vec3f;

    fn chain(n: usize) -> SkeletonGraph {
        let mut g = SkeletonGraph::new();
        for i in 0..n {
            g.add_node(Vec3f::new(i as f32 * 10.0, 0.0, 0.0), 1.0);
        }
        for i in 1..n {
            g.add_edge(i - 1, i);
        }
        g
    }

    #[test]
    fn degrees_and_components_of_a_chain() {
        let g = chain(4);
        assert_eq!(g.degrees(), vec![1, 2, 2, 1]);
        assert_eq!(g.component_count(), 1);
        assert!((g.path_length() - 30.0).abs() < 1e-6);
    }

    #[test]
    fn duplicate_and_self_edges_are_dropped() {
        let mut g = chain(3);
        g.add_edge(1, 0);
        g.add_edge(2, 2);
        assert_eq!(g.edges.len(), 2);
    }

    #[test]
    fn isolated_nodes_count_as_components() {
        let mut g = chain(2);
        g.add_node(Vec3f::new(100.0, 0.0, 0.0), 1.0);
        assert_eq!(g.component_count(), 2);
    }
}
