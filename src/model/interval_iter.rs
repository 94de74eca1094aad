//! Borrowing traversals over an [`IntervalTree`]
//!
//! Both iterators walk the arena through parent links and keep only a few
//! indices of state, so creating one is O(1) and no traversal allocates.

use std::iter::FusedIterator;

use crate::model::interval_tree::{IntervalTree, NodeId};
use crate::model::position::TextInterval;

impl<V> IntervalTree<V> {
    /// All stored pairs in ascending order of start, then of end
    pub fn iter(&self) -> Iter<'_, V> {
        let node = self.root.map(|root| self.leftmost(root));
        Iter {
            tree: self,
            node,
            remaining: node.map_or(0, |id| self.nodes[id].range.len()),
            len: self.len(),
        }
    }

    /// All stored intervals, in the order of [`IntervalTree::iter`]
    pub fn intervals(&self) -> impl Iterator<Item = TextInterval> + '_ {
        self.iter().map(|(interval, _)| interval)
    }

    /// All stored values, in the order of [`IntervalTree::iter`]
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Lazily find every stored interval overlapping `query`
    ///
    /// Results come in ascending order of start; intervals sharing a start
    /// come largest end first. Intervals that only touch `query` are not
    /// reported. Each call starts a fresh traversal.
    pub fn find_overlapping(&self, query: &TextInterval) -> Overlapping<'_, V> {
        Overlapping {
            tree: self,
            query: *query,
            current: self.root,
            previous: None,
            pending: None,
        }
    }

    /// Append the value of every interval overlapping `query` to `out`
    pub fn find_overlapping_into<'a>(&'a self, query: &TextInterval, out: &mut Vec<&'a V>) {
        out.extend(self.find_overlapping(query).map(|(_, value)| value));
    }

    pub fn find_overlapping_values(&self, query: &TextInterval) -> Vec<&V> {
        let mut out = Vec::new();
        self.find_overlapping_into(query, &mut out);
        out
    }
}

impl<'a, V> IntoIterator for &'a IntervalTree<V> {
    type Item = (TextInterval, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over the pairs of an [`IntervalTree`]
pub struct Iter<'a, V> {
    tree: &'a IntervalTree<V>,
    node: Option<NodeId>,
    /// Range entries of `node` not yet yielded, taken from the back
    remaining: usize,
    len: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (TextInterval, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let id = self.node?;
        let node = &tree.nodes[id];
        self.len -= 1;

        if self.remaining > 0 {
            self.remaining -= 1;
            let (end, value) = &node.range[self.remaining];
            return Some((TextInterval::spanning(node.interval.start, *end), value));
        }

        self.node = tree.successor(id);
        if let Some(next) = self.node {
            self.remaining = tree.nodes[next].range.len();
        }
        Some((node.interval, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V> FusedIterator for Iter<'_, V> {}

/// Lazy overlap query over an [`IntervalTree`]
///
/// Created by [`IntervalTree::find_overlapping`].
pub struct Overlapping<'a, V> {
    tree: &'a IntervalTree<V>,
    query: TextInterval,
    current: Option<NodeId>,
    /// Where the walk came from, which tells whether `current` is being
    /// entered from above or returned to from a child
    previous: Option<NodeId>,
    /// Node whose primary interval was just yielded, with the next range
    /// entry to test
    pending: Option<(NodeId, usize)>,
}

impl<V> Overlapping<'_, V> {
    /// Finish with `id` and continue into its right subtree, or upwards
    fn leave(&mut self, id: NodeId) {
        let node = &self.tree.nodes[id];
        self.previous = Some(id);
        self.current = node.right.or(node.parent);
    }

    fn ascend(&mut self, id: NodeId) {
        self.previous = Some(id);
        self.current = self.tree.nodes[id].parent;
    }
}

impl<'a, V> Iterator for Overlapping<'a, V> {
    type Item = (TextInterval, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let query = self.query;

        if let Some((id, index)) = self.pending.take() {
            let node = &tree.nodes[id];
            // Range ends decrease, so the first miss ends the scan
            if let Some((end, value)) = node.range.get(index) {
                if *end > query.start {
                    self.pending = Some((id, index + 1));
                    return Some((TextInterval::spanning(node.interval.start, *end), value));
                }
            }
            self.leave(id);
        }

        while let Some(id) = self.current {
            let node = &tree.nodes[id];

            if query.start >= node.max {
                self.ascend(id);
                continue;
            }

            if self.previous == node.parent {
                if let Some(left) = node.left {
                    self.previous = Some(id);
                    self.current = Some(left);
                    continue;
                }
            } else if self.previous != node.left {
                // Back from the right subtree
                self.ascend(id);
                continue;
            }

            // This node and its right subtree start at or after the query end
            if query.end <= node.interval.start {
                self.ascend(id);
                continue;
            }

            if node.interval.end > query.start {
                self.pending = Some((id, 0));
                return Some((node.interval, &node.value));
            }
            self.leave(id);
        }
        None
    }
}

impl<V> FusedIterator for Overlapping<'_, V> {}
