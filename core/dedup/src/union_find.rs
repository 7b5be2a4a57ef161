//! Disjoint-set union with path compression and union-by-rank, keyed by
//! an arbitrary hashable/cloneable item rather than pointer identity.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

pub struct UnionFind<T: Eq + Hash + Clone> {
    parent: HashMap<T, T>,
    rank: HashMap<T, u32>,
}

impl<T: Eq + Hash + Clone> UnionFind<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let mut parent = HashMap::new();
        let mut rank = HashMap::new();
        for item in items {
            rank.insert(item.clone(), 0);
            parent.insert(item.clone(), item);
        }
        Self { parent, rank }
    }

    /// Finds the canonical representative of `item`'s set, compressing
    /// the path to the root as it walks up.
    pub fn find(&mut self, item: &T) -> T {
        let parent = self.parent.get(item).cloned().expect("item not tracked by this UnionFind");
        if &parent == item {
            return parent;
        }
        let root = self.find(&parent);
        self.parent.insert(item.clone(), root.clone());
        root
    }

    /// Unions the sets containing `a` and `b`. Returns `false` if they
    /// were already in the same set.
    pub fn union(&mut self, a: &T, b: &T) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }

        let rank_a = *self.rank.get(&root_a).unwrap_or(&0);
        let rank_b = *self.rank.get(&root_b).unwrap_or(&0);

        if rank_a < rank_b {
            self.parent.insert(root_a, root_b);
        } else if rank_a > rank_b {
            self.parent.insert(root_b, root_a);
        } else {
            self.parent.insert(root_b, root_a.clone());
            self.rank.insert(root_a, rank_a + 1);
        }
        true
    }

    pub fn get_canonical(&mut self, item: &T) -> T {
        self.find(item)
    }

    /// All canonical representatives (the roots of each set).
    pub fn get_representatives(&mut self) -> HashSet<T> {
        let items: Vec<T> = self.parent.keys().cloned().collect();
        items.into_iter().map(|item| self.find(&item)).collect()
    }

    /// Representative -> every item in that set, including the
    /// representative itself.
    pub fn get_groups(&mut self) -> HashMap<T, Vec<T>> {
        let items: Vec<T> = self.parent.keys().cloned().collect();
        let mut groups: HashMap<T, Vec<T>> = HashMap::new();
        for item in items {
            let rep = self.find(&item);
            groups.entry(rep).or_default().push(item);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_their_own_representative() {
        let mut uf = UnionFind::new(["a", "b", "c"]);
        assert_eq!(uf.find(&"a"), "a");
        assert_eq!(uf.get_representatives().len(), 3);
    }

    #[test]
    fn union_merges_two_sets() {
        let mut uf = UnionFind::new(["a", "b", "c"]);
        assert!(uf.union(&"a", &"b"));
        assert_eq!(uf.find(&"a"), uf.find(&"b"));
        assert_eq!(uf.get_representatives().len(), 2);
    }

    #[test]
    fn union_of_already_joined_items_returns_false() {
        let mut uf = UnionFind::new(["a", "b"]);
        assert!(uf.union(&"a", &"b"));
        assert!(!uf.union(&"a", &"b"));
    }

    #[test]
    fn transitive_unions_collapse_into_one_group() {
        let mut uf = UnionFind::new(["a", "b", "c", "d"]);
        uf.union(&"a", &"b");
        uf.union(&"c", &"d");
        uf.union(&"b", &"c");
        let groups = uf.get_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.values().next().unwrap().len(), 4);
    }
}
