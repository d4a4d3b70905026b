//! Arena-backed record tree.
//!
//! Nodes live in a slot vector and refer to each other through [`NodeId`]
//! indices. Removing a subtree tombstones its slots; slot indices are never
//! reused for the lifetime of the tree, so a stored id either points at the
//! node it was created for or at a tombstone, never at an unrelated node.
//!
//! Indexing the tree with a removed id is a caller bug and panics, the same
//! contract as slice indexing. The fallible [`EscherTree::get`] accessor
//! covers code that needs to probe.
use crate::escher::node::{EscherNode, NodePayload};
use crate::escher::types::EscherRecordType;
use std::ops::{Index, IndexMut};

/// Stable handle to one node of an [`EscherTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The record tree of one drawing stream.
#[derive(Debug, Clone, Default)]
pub struct EscherTree {
    slots: Vec<Option<EscherNode>>,
    root: Option<NodeId>,
}

impl EscherTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the arena. The node starts detached; link it with
    /// [`append_child`](Self::append_child) or make it the root.
    pub fn alloc(&mut self, node: EscherNode) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(node));
        id
    }

    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self[id].parent = None;
        self.root = Some(id);
    }

    /// Live node count.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&EscherNode> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut EscherNode> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Child ids of a container; empty slice for leaves.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self[id].children()
    }

    /// Append `child` to the end of `parent`'s child list.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child);
    }

    /// Insert `child` into `parent`'s child list at `index`.
    ///
    /// Panics if `parent` is a leaf or `index` is past the end, both caller
    /// bugs.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self[child].parent = Some(parent);
        match &mut self[parent].payload {
            NodePayload::Container(children) => children.insert(index, child),
            _ => panic!("attempted to insert a child under a leaf node"),
        }
    }

    /// Unlink `child` from its parent, leaving it allocated but detached.
    pub fn detach(&mut self, child: NodeId) {
        let Some(parent) = self[child].parent.take() else {
            return;
        };
        if let NodePayload::Container(children) = &mut self[parent].payload {
            children.retain(|c| *c != child);
        }
    }

    /// Position of `child` within `parent`'s child list.
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Move the child at `from` to position `to` within one container.
    pub fn move_child(&mut self, parent: NodeId, from: usize, to: usize) {
        if let NodePayload::Container(children) = &mut self[parent].payload {
            let child = children.remove(from);
            children.insert(to, child);
        }
    }

    /// Remove a node and every descendant, tombstoning their slots.
    pub fn remove_subtree(&mut self, id: NodeId) {
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.slots[current.index()].take() {
                stack.extend_from_slice(node.children());
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
    }

    /// First direct child with the given record type.
    pub fn find_child(&self, parent: NodeId, record_type: EscherRecordType) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self[c].record_type == record_type)
    }

    /// Depth-first search for the first descendant with the given type.
    pub fn find_descendant(&self, start: NodeId, record_type: EscherRecordType) -> Option<NodeId> {
        for &child in self.children(start) {
            if self[child].record_type == record_type {
                return Some(child);
            }
            if let Some(found) = self.find_descendant(child, record_type) {
                return Some(found);
            }
        }
        None
    }

    /// Pre-order traversal of the subtree rooted at `start`, `start`
    /// included.
    pub fn walk(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            for &child in self.children(id).iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Walk parent links from `id` to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self[id].parent;
        while let Some(node) = current {
            chain.push(node);
            current = self[node].parent;
        }
        chain
    }
}

impl Index<NodeId> for EscherTree {
    type Output = EscherNode;

    fn index(&self, id: NodeId) -> &EscherNode {
        match self.slots[id.index()].as_ref() {
            Some(node) => node,
            None => panic!("node id {} points at a removed node", id.0),
        }
    }
}

impl IndexMut<NodeId> for EscherTree {
    fn index_mut(&mut self, id: NodeId) -> &mut EscherNode {
        match self.slots[id.index()].as_mut() {
            Some(node) => node,
            None => panic!("node id {} points at a removed node", id.0),
        }
    }
}
