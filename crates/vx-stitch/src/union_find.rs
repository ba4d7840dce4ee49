use std::collections::HashMap;

/// Disjoint-set forest over sparse `u64` labels.
///
/// Merging always hangs the larger root under the smaller one, so the
/// root of a set is its smallest member and `find` doubles as the
/// canonical-label lookup. `find` applies path compression.
#[derive(Debug, Clone, Default)]
pub struct UnionFind {
    parent: HashMap<u64, u64>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical (smallest) label of the set containing `label`. Labels
    /// never merged are their own canonical label.
    pub fn find(&mut self, label: u64) -> u64 {
        let mut root = label;
        while let Some(&up) = self.parent.get(&root) {
            root = up;
        }

        let mut cursor = label;
        while cursor != root {
            let up = self.parent.insert(cursor, root).unwrap_or(root);
            cursor = up;
        }
        root
    }

    pub fn union(&mut self, a: u64, b: u64) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        if ra < rb {
            self.parent.insert(rb, ra);
        } else {
            self.parent.insert(ra, rb);
        }
    }

    /// Canonical label for every non-root member.
    pub fn canonical_map(&mut self) -> HashMap<u64, u64> {
        let members: Vec<u64> = self.parent.keys().copied().collect();
        let mut map = HashMap::with_capacity(members.len());
        for member in members {
            let root = self.find(member);
            map.insert(member, root);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::UnionFind;

    #[test]
    fn transitive_merges_share_the_smallest_canonical_label() {
        let mut uf = UnionFind::new();
        uf.union(1, 2);
        uf.union(2, 3);

        assert_eq!(uf.find(1), 1);
        assert_eq!(uf.find(2), 1);
        assert_eq!(uf.find(3), 1);
    }

    #[test]
    fn self_merge_is_a_no_op() {
        let mut uf = UnionFind::new();
        uf.union(7, 7);
        assert_eq!(uf.find(7), 7);
        assert!(uf.canonical_map().is_empty());
    }

    #[test]
    fn merge_order_does_not_change_the_canonical_label() {
        let mut forward = UnionFind::new();
        forward.union(5, 9);
        forward.union(9, 2);

        let mut reversed = UnionFind::new();
        reversed.union(2, 9);
        reversed.union(9, 5);

        for label in [2, 5, 9] {
            assert_eq!(forward.find(label), 2);
            assert_eq!(reversed.find(label), 2);
        }
    }

    #[test]
    fn canonical_map_covers_every_merged_label() {
        let mut uf = UnionFind::new();
        uf.union(10, 4);
        uf.union(20, 30);

        let map = uf.canonical_map();
        assert_eq!(map.get(&10), Some(&4));
        assert_eq!(map.get(&30), Some(&20));
        assert_eq!(map.get(&4), None);
        assert_eq!(map.get(&99), None);
    }
}
