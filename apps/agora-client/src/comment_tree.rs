//! Hierarchical view of a flat, parent-referencing comment list.
//!
//! Sibling order is the input order; callers that want a different order sort
//! the flat list first (see [`crate::sort`]). Single-record changes are patched
//! in place so per-node UI state such as `collapsed` survives.

use std::collections::{HashMap, HashSet};

use agora_proto::CommentView;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct CommentNode {
    pub record: CommentView,
    pub depth: u32,
    pub collapsed: bool,
    children: Vec<usize>,
}

impl CommentNode {
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Nodes live in one flat arena and refer to their children by index, so no
/// operation recurses per level of nesting.
#[derive(Debug, Clone, Default)]
pub struct CommentForest {
    nodes: Vec<CommentNode>,
    roots: Vec<usize>,
    index: HashMap<i32, usize>,
}

impl CommentForest {
    pub fn build(records: &[CommentView]) -> Self {
        let mut positions: HashMap<i32, usize> = HashMap::with_capacity(records.len());
        let mut unique: Vec<&CommentView> = Vec::with_capacity(records.len());
        for record in records {
            if positions.contains_key(&record.id) {
                warn!(target = "agora::comment_tree", id = record.id, "duplicate comment id ignored");
                continue;
            }
            positions.insert(record.id, unique.len());
            unique.push(record);
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); unique.len()];
        let mut roots = Vec::new();
        for (pos, record) in unique.iter().enumerate() {
            match record.parent_id.and_then(|parent| positions.get(&parent)) {
                Some(&parent) if parent != pos => children[parent].push(pos),
                _ => roots.push(pos),
            }
        }

        let mut forest = Self {
            nodes: Vec::with_capacity(unique.len()),
            roots: Vec::new(),
            index: HashMap::with_capacity(unique.len()),
        };
        let mut visited = vec![false; unique.len()];
        for pos in roots {
            forest.attach_subtree(pos, &unique, &children, &mut visited);
        }

        // Anything still unvisited hangs off a parent cycle.
        for pos in 0..unique.len() {
            if !visited[pos] {
                warn!(
                    target = "agora::comment_tree",
                    id = unique[pos].id,
                    parent_id = ?unique[pos].parent_id,
                    "comment parent chain forms a cycle; promoting to root"
                );
                forest.attach_subtree(pos, &unique, &children, &mut visited);
            }
        }

        forest
    }

    /// Adds `root` and everything below it, depth first with an explicit
    /// stack. Children keep their input order.
    fn attach_subtree(
        &mut self,
        root: usize,
        records: &[&CommentView],
        children: &[Vec<usize>],
        visited: &mut [bool],
    ) {
        let mut stack: Vec<(usize, Option<usize>)> = vec![(root, None)];
        while let Some((pos, parent)) = stack.pop() {
            if visited[pos] {
                continue;
            }
            visited[pos] = true;
            let depth = parent.map_or(0, |p| self.nodes[p].depth + 1);
            let slot = self.push_node(records[pos].clone(), depth);
            match parent {
                Some(p) => self.nodes[p].children.push(slot),
                None => self.roots.push(slot),
            }
            stack.extend(children[pos].iter().rev().map(|&child| (child, Some(slot))));
        }
    }

    fn push_node(&mut self, record: CommentView, depth: u32) -> usize {
        let slot = self.nodes.len();
        self.index.insert(record.id, slot);
        self.nodes.push(CommentNode {
            record,
            depth,
            collapsed: false,
            children: Vec::new(),
        });
        slot
    }

    /// Rebuilds from `records`, carrying over the collapsed flags of ids that
    /// are still present.
    pub fn rebuild_preserving(&self, records: &[CommentView]) -> Self {
        let collapsed: HashSet<i32> = self
            .nodes
            .iter()
            .filter(|node| node.collapsed)
            .map(|node| node.record.id)
            .collect();
        let mut next = Self::build(records);
        for id in collapsed {
            next.set_collapsed(id, true);
        }
        next
    }

    pub fn roots(&self) -> Siblings<'_> {
        Siblings {
            nodes: &self.nodes,
            slots: self.roots.iter(),
        }
    }

    pub fn children<'a>(&'a self, node: &'a CommentNode) -> Siblings<'a> {
        Siblings {
            nodes: &self.nodes,
            slots: node.children.iter(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, id: i32) -> Option<&CommentNode> {
        self.index.get(&id).map(|&slot| &self.nodes[slot])
    }

    pub fn find_mut(&mut self, id: i32) -> Option<&mut CommentNode> {
        let slot = *self.index.get(&id)?;
        self.nodes.get_mut(slot)
    }

    /// Applies `patch` to the record with `id`. Returns false if absent.
    pub fn update<F>(&mut self, id: i32, patch: F) -> bool
    where
        F: FnOnce(&mut CommentView),
    {
        match self.find_mut(id) {
            Some(node) => {
                patch(&mut node.record);
                true
            }
            None => false,
        }
    }

    /// Adds a newly created comment as the first child of its parent, or as
    /// the first root when the parent is unknown. A record whose id is
    /// already present replaces the existing one in place.
    pub fn insert(&mut self, record: CommentView) {
        if let Some(node) = self.find_mut(record.id) {
            node.record = record;
            return;
        }
        let parent = record.parent_id.and_then(|parent| self.index.get(&parent).copied());
        let depth = parent.map_or(0, |p| self.nodes[p].depth + 1);
        let slot = self.push_node(record, depth);
        match parent {
            Some(p) => self.nodes[p].children.insert(0, slot),
            None => self.roots.insert(0, slot),
        }
    }

    pub fn set_collapsed(&mut self, id: i32, collapsed: bool) -> bool {
        match self.find_mut(id) {
            Some(node) => {
                node.collapsed = collapsed;
                true
            }
            None => false,
        }
    }

    /// Visits every record, e.g. to flag all comments by one creator.
    pub fn for_each_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut CommentView),
    {
        for node in &mut self.nodes {
            visit(&mut node.record);
        }
    }

    /// Depth-first, parents before children, siblings in order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            nodes: &self.nodes,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Flattens back to records in depth-first order.
    pub fn records(&self) -> Vec<CommentView> {
        self.iter().map(|node| node.record.clone()).collect()
    }
}

/// Same records in the same shape, regardless of insertion history.
impl PartialEq for CommentForest {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.roots.len() == other.roots.len()
            && self.iter().zip(other.iter()).all(|(a, b)| {
                a.record == b.record
                    && a.depth == b.depth
                    && a.collapsed == b.collapsed
                    && a.children.len() == b.children.len()
            })
    }
}

pub struct Siblings<'a> {
    nodes: &'a [CommentNode],
    slots: std::slice::Iter<'a, usize>,
}

impl<'a> Iterator for Siblings<'a> {
    type Item = &'a CommentNode;

    fn next(&mut self) -> Option<Self::Item> {
        let nodes = self.nodes;
        self.slots.next().map(|&slot| &nodes[slot])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl ExactSizeIterator for Siblings<'_> {}

pub struct Iter<'a> {
    nodes: &'a [CommentNode],
    stack: Vec<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a CommentNode;

    fn next(&mut self) -> Option<Self::Item> {
        let nodes = self.nodes;
        let node = &nodes[self.stack.pop()?];
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Places that hold comment records and can take single-record patches.
pub trait CommentStore {
    fn patch_comment<F>(&mut self, id: i32, patch: F) -> bool
    where
        F: FnOnce(&mut CommentView);
}

impl CommentStore for CommentForest {
    fn patch_comment<F>(&mut self, id: i32, patch: F) -> bool
    where
        F: FnOnce(&mut CommentView),
    {
        self.update(id, patch)
    }
}

impl CommentStore for Vec<CommentView> {
    fn patch_comment<F>(&mut self, id: i32, patch: F) -> bool
    where
        F: FnOnce(&mut CommentView),
    {
        match self.iter_mut().find(|c| c.id == id) {
            Some(record) => {
                patch(record);
                true
            }
            None => false,
        }
    }
}
