use std::cmp::Ordering;
use std::iter;
use std::mem;

use crate::config::TreeConfig;
use crate::model::edit::{EditObserver, TextEdit};
use crate::model::position::{IntervalError, TextInterval, TextPosition};

/// Index of a node in the tree's arena
pub(crate) type NodeId = usize;

// ---
// 1. Core Data Structures
// ---

/// One node per distinct start position
#[derive(Debug, Clone)]
pub(crate) struct Node<V> {
    /// The interval with the largest end among those sharing this start
    pub(crate) interval: TextInterval,
    pub(crate) value: V,
    /// The other intervals sharing `interval.start`, as `(end, value)` in
    /// strictly decreasing order of end
    pub(crate) range: Vec<(TextPosition, V)>,
    /// Augmentation: the max end in this node's subtree
    pub(crate) max: TextPosition,
    /// AVL: height(right) - height(left)
    balance: i8,

    pub(crate) parent: Option<NodeId>,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
}

/// Augmented AVL interval tree mapping text intervals to values
///
/// Nodes are keyed by start position. Intervals sharing a start live in the
/// same node: the one with the largest end is the node's primary interval,
/// the rest are kept in an end-descending list beside it. Every node tracks
/// the largest end in its subtree so overlap queries can prune whole
/// subtrees.
///
/// Nodes live in an arena and link to their parent by index, which lets
/// ordered iteration, overlap queries and edit shifting walk the tree
/// without recursion or an explicit stack.
#[derive(Debug, Clone)]
pub struct IntervalTree<V> {
    pub(crate) nodes: Vec<Node<V>>,
    pub(crate) root: Option<NodeId>,
    len: usize,
    config: TreeConfig,
}

/// Result of inserting below a subtree root
struct Inserted {
    root: NodeId,
    grew: bool,
    added: bool,
}

/// What a removal took out of the tree
enum Taken<V> {
    /// An entry of a node that stays in place
    Entry(V),
    /// A node detached from the tree, still occupying its arena slot
    Node(NodeId),
}

/// Result of removing below a subtree root
struct Removed<V> {
    root: Option<NodeId>,
    shrunk: bool,
    taken: Option<Taken<V>>,
}

/// Summary of a checked subtree
struct Audit {
    height: i32,
    pairs: usize,
    nodes: usize,
}

// ---
// 2. Node Helpers
// ---

impl<V> Node<V> {
    fn new(interval: TextInterval, value: V, parent: Option<NodeId>) -> Self {
        Node {
            max: interval.end,
            interval,
            value,
            range: Vec::new(),
            balance: 0,
            parent,
            left: None,
            right: None,
        }
    }

    /// Position of `end` in the end-descending range list
    fn search_range(&self, end: TextPosition) -> Result<usize, usize> {
        self.range.binary_search_by(|(entry_end, _)| end.cmp(entry_end))
    }

    /// Merge an interval starting at this node's start
    ///
    /// Hands the value back if the exact interval is already stored.
    fn merge(&mut self, interval: TextInterval, value: V) -> Result<(), V> {
        let end = interval.end;
        match end.cmp(&self.interval.end) {
            Ordering::Greater => {
                let old_end = mem::replace(&mut self.interval.end, end);
                let old_value = mem::replace(&mut self.value, value);
                self.range.insert(0, (old_end, old_value));
                Ok(())
            }
            Ordering::Equal => Err(value),
            Ordering::Less => match self.search_range(end) {
                Ok(_) => Err(value),
                Err(index) => {
                    self.range.insert(index, (end, value));
                    Ok(())
                }
            },
        }
    }

    /// Remove the entry ending at `end` without changing the tree shape
    ///
    /// Removing the primary promotes the largest remaining range entry. The
    /// caller must splice the node out instead when the primary is the only
    /// entry left.
    fn take_entry(&mut self, end: TextPosition) -> Option<V> {
        if end == self.interval.end {
            if self.range.is_empty() {
                return None;
            }
            let (next_end, next_value) = self.range.remove(0);
            self.interval.end = next_end;
            return Some(mem::replace(&mut self.value, next_value));
        }
        let index = self.search_range(end).ok()?;
        Some(self.range.remove(index).1)
    }

    fn get(&self, end: TextPosition) -> Option<&V> {
        if end == self.interval.end {
            return Some(&self.value);
        }
        let index = self.search_range(end).ok()?;
        Some(&self.range[index].1)
    }

    fn get_mut(&mut self, end: TextPosition) -> Option<&mut V> {
        if end == self.interval.end {
            return Some(&mut self.value);
        }
        let index = self.search_range(end).ok()?;
        Some(&mut self.range[index].1)
    }

    /// All entries of this node in ascending order of end
    pub(crate) fn entries_ascending(&self) -> impl Iterator<Item = (TextInterval, &V)> + '_ {
        let start = self.interval.start;
        self.range
            .iter()
            .rev()
            .map(move |(end, value)| (TextInterval::spanning(start, *end), value))
            .chain(iter::once((self.interval, &self.value)))
    }

    fn into_pairs(self) -> impl Iterator<Item = (TextInterval, V)> {
        let start = self.interval.start;
        iter::once((self.interval, self.value)).chain(
            self.range
                .into_iter()
                .map(move |(end, value)| (TextInterval { start, end }, value)),
        )
    }

    /// Number of stored pairs in this node
    fn pair_count(&self) -> usize {
        1 + self.range.len()
    }
}

// ---
// 3. Main Public API
// ---

impl<V> Default for IntervalTree<V> {
    fn default() -> Self {
        Self::with_config(TreeConfig::default())
    }
}

impl<V> IntervalTree<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            len: 0,
            config,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of stored (interval, value) pairs
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every stored pair
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.len = 0;
    }

    /// Build the interval from `start` and `end` using the configured
    /// validation mode and insert it. Performance: O(log n)
    ///
    /// In strict mode a degenerate interval is rejected and the tree is left
    /// untouched; otherwise it is repaired to span one column.
    pub fn add(
        &mut self,
        start: impl Into<TextPosition>,
        end: impl Into<TextPosition>,
        value: V,
    ) -> Result<bool, IntervalError> {
        let interval = TextInterval::with_validation(start, end, self.config.validation)?;
        Ok(self.insert(interval, value))
    }

    /// Insert an interval with its value. Performance: O(log n)
    ///
    /// Returns false, leaving the tree unchanged, when the exact interval is
    /// already stored.
    pub fn insert(&mut self, interval: TextInterval, value: V) -> bool {
        let inserted = self.insert_below(self.root, None, interval, value);
        self.root = Some(inserted.root);
        debug_assert!(self.nodes[inserted.root].parent.is_none());

        if inserted.added {
            self.len += 1;
            tracing::trace!("Inserted interval {} ({} stored)", interval, self.len);
        } else {
            tracing::trace!("Interval {} already stored", interval);
        }
        inserted.added
    }

    /// Remove the exact interval and return its value. Performance: O(log n)
    pub fn remove(&mut self, interval: &TextInterval) -> Option<V> {
        let root = self.root?;
        let removed = self.remove_below(root, interval);
        self.root = removed.root;
        if let Some(root) = self.root {
            self.nodes[root].parent = None;
        }

        let value = match removed.taken? {
            Taken::Entry(value) => value,
            Taken::Node(id) => self.free(id),
        };
        self.len -= 1;
        tracing::trace!("Removed interval {} ({} stored)", interval, self.len);
        Some(value)
    }

    /// Remove the exact interval, reporting whether it was present
    pub fn delete(&mut self, interval: &TextInterval) -> bool {
        self.remove(interval).is_some()
    }

    /// Value stored for the exact interval. Performance: O(log n)
    pub fn get(&self, interval: &TextInterval) -> Option<&V> {
        let id = self.find_node(interval.start)?;
        self.nodes[id].get(interval.end)
    }

    pub fn get_mut(&mut self, interval: &TextInterval) -> Option<&mut V> {
        let id = self.find_node(interval.start)?;
        self.nodes[id].get_mut(interval.end)
    }

    pub fn contains(&self, interval: &TextInterval) -> bool {
        self.get(interval).is_some()
    }

    /// All intervals starting exactly at `position`, in ascending order of end
    pub fn intervals_starting_at(&self, position: TextPosition) -> Vec<(TextInterval, &V)> {
        match self.find_node(position) {
            Some(id) => self.nodes[id].entries_ascending().collect(),
            None => Vec::new(),
        }
    }

    /// Shift every stored position for text inserted at `from`, ending at
    /// `to` in the new coordinate space. Performance: O(n)
    pub fn on_inserted_text(&mut self, from: TextPosition, to: TextPosition) {
        let edit = TextEdit::Insert { from, to };
        if edit.is_noop() {
            return;
        }

        self.walk_in_order_mut(|node| {
            node.interval.start.on_inserted_text(from, to, true);
            node.interval.end.on_inserted_text(from, to, false);
            node.max.on_inserted_text(from, to, false);
            for (end, _) in &mut node.range {
                end.on_inserted_text(from, to, false);
            }
        });

        tracing::trace!("Shifted {} intervals for insertion {} -> {}", self.len, from, to);
    }

    /// Shift every stored position for the text between `from` and `to` (old
    /// coordinates) having been removed. Performance: O(n)
    ///
    /// Positions inside the removed span collapse onto `from`. If that leaves
    /// an interval empty or makes two stored intervals identical, the tree is
    /// rebuilt without the emptied intervals and duplicates.
    pub fn on_removed_text(&mut self, from: TextPosition, to: TextPosition) {
        let edit = TextEdit::Remove { from, to };
        if edit.is_noop() {
            return;
        }

        let mut collapsed = false;
        let mut previous_start: Option<TextPosition> = None;
        self.walk_in_order_mut(|node| {
            node.interval.start.on_removed_text(from, to);
            node.interval.end.on_removed_text(from, to);
            node.max.on_removed_text(from, to);

            let mut smallest_end = node.interval.end;
            for (end, _) in &mut node.range {
                end.on_removed_text(from, to);
                collapsed |= *end >= smallest_end;
                smallest_end = *end;
            }

            let start = node.interval.start;
            collapsed |= smallest_end <= start;
            collapsed |= previous_start.is_some_and(|previous| previous >= start);
            previous_start = Some(start);
        });

        tracing::trace!("Shifted {} intervals for removal {} -> {}", self.len, from, to);

        if collapsed {
            self.rebuild();
        }
    }

    /// Shift every stored position for `edit`
    pub fn on_edit(&mut self, edit: &TextEdit) {
        match *edit {
            TextEdit::Insert { from, to } => self.on_inserted_text(from, to),
            TextEdit::Remove { from, to } => self.on_removed_text(from, to),
        }
    }

    /// Verify every structural invariant. Performance: O(n)
    ///
    /// Checks BST order, AVL balance and stored balance factors, the max
    /// augmentation, range ordering, parent links and the pair count.
    pub fn check_invariants(&self) -> Result<(), String> {
        let Some(root) = self.root else {
            if self.len != 0 || !self.nodes.is_empty() {
                return Err(format!(
                    "empty tree holds {} pairs in {} nodes",
                    self.len,
                    self.nodes.len()
                ));
            }
            return Ok(());
        };

        if self.nodes[root].parent.is_some() {
            return Err(format!("root {root} has a parent"));
        }

        let audit = self.check_subtree(root, None, None)?;
        if audit.pairs != self.len {
            return Err(format!(
                "tree holds {} pairs but len is {}",
                audit.pairs, self.len
            ));
        }
        if audit.nodes != self.nodes.len() {
            return Err(format!(
                "{} nodes reachable but {} allocated",
                audit.nodes,
                self.nodes.len()
            ));
        }
        Ok(())
    }
}

impl<V> EditObserver for IntervalTree<V> {
    fn on_edit(&mut self, edit: &TextEdit) {
        IntervalTree::on_edit(self, edit);
    }
}

impl<V> Extend<(TextInterval, V)> for IntervalTree<V> {
    fn extend<I: IntoIterator<Item = (TextInterval, V)>>(&mut self, pairs: I) {
        for (interval, value) in pairs {
            self.insert(interval, value);
        }
    }
}

impl<V> FromIterator<(TextInterval, V)> for IntervalTree<V> {
    fn from_iter<I: IntoIterator<Item = (TextInterval, V)>>(pairs: I) -> Self {
        let mut tree = IntervalTree::new();
        tree.extend(pairs);
        tree
    }
}

// ---
// 4. Recursive Implementation Details (Insert, Remove)
// ---

impl<V> IntervalTree<V> {
    fn insert_below(
        &mut self,
        subtree: Option<NodeId>,
        parent: Option<NodeId>,
        interval: TextInterval,
        value: V,
    ) -> Inserted {
        let Some(id) = subtree else {
            let id = self.nodes.len();
            self.nodes.push(Node::new(interval, value, parent));
            return Inserted {
                root: id,
                grew: true,
                added: true,
            };
        };

        let (root, grew, added) = match interval.start.cmp(&self.nodes[id].interval.start) {
            Ordering::Less => {
                let left = self.nodes[id].left;
                let child = self.insert_below(left, Some(id), interval, value);
                self.set_left(id, Some(child.root));
                if child.grew {
                    let (root, grew) = self.left_grew(id);
                    (root, grew, child.added)
                } else {
                    (id, false, child.added)
                }
            }
            Ordering::Greater => {
                let right = self.nodes[id].right;
                let child = self.insert_below(right, Some(id), interval, value);
                self.set_right(id, Some(child.root));
                if child.grew {
                    let (root, grew) = self.right_grew(id);
                    (root, grew, child.added)
                } else {
                    (id, false, child.added)
                }
            }
            Ordering::Equal => {
                let added = self.nodes[id].merge(interval, value).is_ok();
                (id, false, added)
            }
        };

        self.update_max(root);
        Inserted { root, grew, added }
    }

    /// The left subtree of `id` is one level taller than before
    fn left_grew(&mut self, id: NodeId) -> (NodeId, bool) {
        self.nodes[id].balance -= 1;
        match self.nodes[id].balance {
            0 => (id, false),
            -1 => (id, true),
            balance => {
                debug_assert_eq!(balance, -2);
                (self.rebalance_left_heavy(id).0, false)
            }
        }
    }

    /// The right subtree of `id` is one level taller than before
    fn right_grew(&mut self, id: NodeId) -> (NodeId, bool) {
        self.nodes[id].balance += 1;
        match self.nodes[id].balance {
            0 => (id, false),
            1 => (id, true),
            balance => {
                debug_assert_eq!(balance, 2);
                (self.rebalance_right_heavy(id).0, false)
            }
        }
    }

    fn remove_below(&mut self, id: NodeId, interval: &TextInterval) -> Removed<V> {
        let mut shrunk = false;
        let taken;

        match interval.start.cmp(&self.nodes[id].interval.start) {
            Ordering::Less => {
                taken = match self.nodes[id].left {
                    Some(left) => {
                        let child = self.remove_below(left, interval);
                        self.set_left(id, child.root);
                        if child.shrunk {
                            self.nodes[id].balance += 1;
                            shrunk = true;
                        }
                        child.taken
                    }
                    None => None,
                };
            }
            Ordering::Greater => {
                taken = match self.nodes[id].right {
                    Some(right) => {
                        let child = self.remove_below(right, interval);
                        self.set_right(id, child.root);
                        if child.shrunk {
                            self.nodes[id].balance -= 1;
                            shrunk = true;
                        }
                        child.taken
                    }
                    None => None,
                };
            }
            Ordering::Equal => {
                let node = &mut self.nodes[id];
                if interval.end != node.interval.end || !node.range.is_empty() {
                    taken = node.take_entry(interval.end).map(Taken::Entry);
                } else if let (Some(_), Some(right)) = (node.left, node.right) {
                    // Trade places with the in-order successor, then remove
                    // the successor's slot from the right subtree
                    let successor = self.leftmost(right);
                    self.swap_payload(id, successor);
                    let child = self.remove_below(right, interval);
                    self.set_right(id, child.root);
                    if child.shrunk {
                        self.nodes[id].balance -= 1;
                        shrunk = true;
                    }
                    taken = child.taken;
                } else {
                    let child = node.left.or(node.right);
                    let parent = node.parent;
                    if let Some(child) = child {
                        self.nodes[child].parent = parent;
                    }
                    return Removed {
                        root: child,
                        shrunk: true,
                        taken: Some(Taken::Node(id)),
                    };
                }
            }
        }

        self.update_max(id);
        if !shrunk {
            return Removed {
                root: Some(id),
                shrunk: false,
                taken,
            };
        }

        let (root, shrunk) = match self.nodes[id].balance {
            -1 | 1 => (id, false),
            0 => (id, true),
            -2 => self.rebalance_left_heavy(id),
            balance => {
                debug_assert_eq!(balance, 2);
                self.rebalance_right_heavy(id)
            }
        };
        Removed {
            root: Some(root),
            shrunk,
            taken,
        }
    }

    /// Release the arena slot of a node that is no longer linked into the
    /// tree, returning its value
    ///
    /// The last node in the arena moves into the freed slot, so links that
    /// pointed at it are redirected.
    fn free(&mut self, id: NodeId) -> V {
        let moved_from = self.nodes.len() - 1;
        let node = self.nodes.swap_remove(id);

        if id != moved_from {
            let moved = &self.nodes[id];
            let (parent, left, right) = (moved.parent, moved.left, moved.right);
            match parent {
                Some(parent) => {
                    let parent = &mut self.nodes[parent];
                    if parent.left == Some(moved_from) {
                        parent.left = Some(id);
                    } else {
                        parent.right = Some(id);
                    }
                }
                None => self.root = Some(id),
            }
            for child in [left, right].into_iter().flatten() {
                self.nodes[child].parent = Some(id);
            }
        }
        node.value
    }

    /// Rebuild from the surviving pairs after a removal edit collapsed
    /// positions, dropping emptied intervals and duplicates
    fn rebuild(&mut self) {
        let before = self.len;
        let nodes = mem::take(&mut self.nodes);
        self.root = None;
        self.len = 0;

        for (interval, value) in nodes.into_iter().flat_map(Node::into_pairs) {
            if !interval.is_empty() {
                self.insert(interval, value);
            }
        }

        tracing::debug!(
            "Rebuilt interval tree after collapsing removal: kept {} of {} intervals",
            self.len,
            before
        );
    }

    // --- Navigation ---

    fn find_node(&self, start: TextPosition) -> Option<NodeId> {
        let mut current = self.root;
        while let Some(id) = current {
            let node = &self.nodes[id];
            current = match start.cmp(&node.interval.start) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    pub(crate) fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.nodes[id].left {
            id = left;
        }
        id
    }

    /// The next node in start order, found through parent links
    pub(crate) fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(right) = self.nodes[id].right {
            return Some(self.leftmost(right));
        }

        let mut child = id;
        let mut parent = self.nodes[id].parent;
        while let Some(p) = parent {
            if self.nodes[p].right != Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p].parent;
        }
        None
    }

    /// Visit every node in start order without recursion, steering by where
    /// the walk came from
    fn walk_in_order_mut(&mut self, mut visit: impl FnMut(&mut Node<V>)) {
        let mut current = self.root;
        let mut previous: Option<NodeId> = None;

        while let Some(mut id) = current {
            if previous == self.nodes[id].parent {
                // Going down: the leftmost node of this subtree comes first
                while let Some(left) = self.nodes[id].left {
                    id = left;
                }
            } else if previous.is_some() && previous == self.nodes[id].right {
                // Back from the right subtree
                previous = Some(id);
                current = self.nodes[id].parent;
                continue;
            }

            visit(&mut self.nodes[id]);

            previous = Some(id);
            current = self.nodes[id].right.or(self.nodes[id].parent);
        }
    }

    // --- Links and Augmentation ---

    fn set_left(&mut self, id: NodeId, child: Option<NodeId>) {
        self.nodes[id].left = child;
        if let Some(child) = child {
            self.nodes[child].parent = Some(id);
        }
    }

    fn set_right(&mut self, id: NodeId, child: Option<NodeId>) {
        self.nodes[id].right = child;
        if let Some(child) = child {
            self.nodes[child].parent = Some(id);
        }
    }

    /// Point `parent`'s link that referenced `old` at `new`
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: NodeId) {
        match parent {
            Some(parent) => {
                let parent = &mut self.nodes[parent];
                if parent.left == Some(old) {
                    parent.left = Some(new);
                } else {
                    parent.right = Some(new);
                }
            }
            None => self.root = Some(new),
        }
    }

    fn update_max(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        let mut max = node.interval.end;
        for child in [node.left, node.right].into_iter().flatten() {
            max = max.max(self.nodes[child].max);
        }
        self.nodes[id].max = max;
    }

    /// Exchange the stored intervals and values of two nodes, leaving links
    /// in place
    fn swap_payload(&mut self, a: NodeId, b: NodeId) {
        debug_assert_ne!(a, b);
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.nodes.split_at_mut(high);
        let (x, y) = (&mut head[low], &mut tail[0]);
        mem::swap(&mut x.interval, &mut y.interval);
        mem::swap(&mut x.value, &mut y.value);
        mem::swap(&mut x.range, &mut y.range);
    }

    // --- AVL Balancing ---

    /// Restore balance at a node whose balance factor reached -2
    ///
    /// Returns the new subtree root and whether the subtree lost a level
    /// compared to before the rotation.
    fn rebalance_left_heavy(&mut self, id: NodeId) -> (NodeId, bool) {
        let Some(left) = self.nodes[id].left else {
            debug_assert!(false, "left-heavy node {id} has no left child");
            return (id, false);
        };

        match self.nodes[left].balance {
            1 => {
                let Some(pivot) = self.nodes[left].right else {
                    debug_assert!(false, "right-heavy node {left} has no right child");
                    return (id, false);
                };
                let pivot_balance = self.nodes[pivot].balance;

                self.rotate_left(left);
                let root = self.rotate_right(id);

                self.nodes[root].balance = 0;
                self.nodes[left].balance = if pivot_balance == 1 { -1 } else { 0 };
                self.nodes[id].balance = if pivot_balance == -1 { 1 } else { 0 };
                (root, true)
            }
            -1 => {
                let root = self.rotate_right(id);
                self.nodes[root].balance = 0;
                self.nodes[id].balance = 0;
                (root, true)
            }
            _ => {
                // Only reachable while removing: the height is unchanged
                let root = self.rotate_right(id);
                self.nodes[root].balance = 1;
                self.nodes[id].balance = -1;
                (root, false)
            }
        }
    }

    /// Mirror of [`Self::rebalance_left_heavy`] for a balance factor of 2
    fn rebalance_right_heavy(&mut self, id: NodeId) -> (NodeId, bool) {
        let Some(right) = self.nodes[id].right else {
            debug_assert!(false, "right-heavy node {id} has no right child");
            return (id, false);
        };

        match self.nodes[right].balance {
            -1 => {
                let Some(pivot) = self.nodes[right].left else {
                    debug_assert!(false, "left-heavy node {right} has no left child");
                    return (id, false);
                };
                let pivot_balance = self.nodes[pivot].balance;

                self.rotate_right(right);
                let root = self.rotate_left(id);

                self.nodes[root].balance = 0;
                self.nodes[id].balance = if pivot_balance == 1 { -1 } else { 0 };
                self.nodes[right].balance = if pivot_balance == -1 { 1 } else { 0 };
                (root, true)
            }
            1 => {
                let root = self.rotate_left(id);
                self.nodes[root].balance = 0;
                self.nodes[id].balance = 0;
                (root, true)
            }
            _ => {
                let root = self.rotate_left(id);
                self.nodes[root].balance = -1;
                self.nodes[id].balance = 1;
                (root, false)
            }
        }
    }

    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let Some(pivot) = self.nodes[id].right else {
            debug_assert!(false, "rotate_left on node {id} without right child");
            return id;
        };
        let parent = self.nodes[id].parent;
        let inner = self.nodes[pivot].left;

        self.set_right(id, inner);
        self.nodes[pivot].left = Some(id);
        self.nodes[id].parent = Some(pivot);
        self.nodes[pivot].parent = parent;
        self.replace_child(parent, id, pivot);

        self.update_max(id);
        self.update_max(pivot);
        pivot
    }

    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let Some(pivot) = self.nodes[id].left else {
            debug_assert!(false, "rotate_right on node {id} without left child");
            return id;
        };
        let parent = self.nodes[id].parent;
        let inner = self.nodes[pivot].right;

        self.set_left(id, inner);
        self.nodes[pivot].right = Some(id);
        self.nodes[id].parent = Some(pivot);
        self.nodes[pivot].parent = parent;
        self.replace_child(parent, id, pivot);

        self.update_max(id);
        self.update_max(pivot);
        pivot
    }

    // --- Invariant Audit ---

    fn check_subtree(
        &self,
        id: NodeId,
        lower: Option<TextPosition>,
        upper: Option<TextPosition>,
    ) -> Result<Audit, String> {
        let node = &self.nodes[id];
        let start = node.interval.start;

        if lower.is_some_and(|lower| start <= lower) || upper.is_some_and(|upper| start >= upper) {
            return Err(format!("node {id} starting at {start} breaks BST order"));
        }
        if node.interval.is_empty() {
            return Err(format!("node {id} holds empty interval {}", node.interval));
        }

        let mut previous_end = node.interval.end;
        for (end, _) in &node.range {
            if *end >= previous_end || *end <= start {
                return Err(format!(
                    "node {id} range entry ending at {end} is out of order"
                ));
            }
            previous_end = *end;
        }

        let mut audit = Audit {
            height: 0,
            pairs: node.pair_count(),
            nodes: 1,
        };
        let mut max = node.interval.end;
        let mut heights = [0; 2];

        for (side, child) in [node.left, node.right].into_iter().enumerate() {
            let Some(child) = child else { continue };
            if self.nodes[child].parent != Some(id) {
                return Err(format!("node {child} does not link back to parent {id}"));
            }
            let (lower, upper) = if side == 0 {
                (lower, Some(start))
            } else {
                (Some(start), upper)
            };
            let child_audit = self.check_subtree(child, lower, upper)?;
            heights[side] = child_audit.height;
            audit.pairs += child_audit.pairs;
            audit.nodes += child_audit.nodes;
            max = max.max(self.nodes[child].max);
        }

        let [left_height, right_height] = heights;
        if (right_height - left_height).abs() > 1 {
            return Err(format!(
                "node {id} is unbalanced: left height {left_height}, right height {right_height}"
            ));
        }
        if i32::from(node.balance) != right_height - left_height {
            return Err(format!(
                "node {id} stores balance {} but heights differ by {}",
                node.balance,
                right_height - left_height
            ));
        }
        if node.max != max {
            return Err(format!(
                "node {id} stores max {} but subtree max is {max}",
                node.max
            ));
        }

        audit.height = 1 + left_height.max(right_height);
        Ok(audit)
    }
}
