//! The node arena backing every slot list in a hierarchy.
//!
//! Slots link their tasks through `Node` entries held in one shared slotmap.
//! `acquire` hands out an index, `release` returns it to the map's internal
//! free list, so steady-state scheduling reuses storage instead of
//! allocating, and a released `NodeId` can never dangle: it simply stops
//! resolving.

use crate::common::{NodeId, TaskId};
use slotmap::SlotMap;
use std::ops::{Index, IndexMut};

/// One entry of a slot's doubly-linked task list.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Node {
    pub task: TaskId,
    pub prev: Option<NodeId>,
    pub next: Option<NodeId>,
}

/// Arena of list nodes, shared by every level of one hierarchy.
#[derive(Debug, Default)]
pub(crate) struct NodePool {
    nodes: SlotMap<NodeId, Node>,
}

impl NodePool {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    /// Takes a node out of the pool, freshly unlinked and carrying `task`.
    pub fn acquire(&mut self, task: TaskId) -> NodeId {
        self.nodes.insert(Node {
            task,
            prev: None,
            next: None,
        })
    }

    /// Returns a node to the pool for reuse. The payload is gone once this
    /// returns; the old id no longer resolves.
    pub fn release(&mut self, node: NodeId) -> Option<Node> {
        self.nodes.remove(node)
    }

    pub fn get(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node)
    }

    /// Number of nodes currently linked into some slot.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

impl Index<NodeId> for NodePool {
    type Output = Node;

    fn index(&self, node: NodeId) -> &Node {
        &self.nodes[node]
    }
}

impl IndexMut<NodeId> for NodePool {
    fn index_mut(&mut self, node: NodeId) -> &mut Node {
        &mut self.nodes[node]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_makes_the_id_inert() {
        let mut pool = NodePool::new();
        let node = pool.acquire(TaskId::default());
        assert!(pool.get(node).is_some());
        pool.release(node);
        assert!(pool.get(node).is_none());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn released_storage_is_reused() {
        let mut pool = NodePool::new();
        let first = pool.acquire(TaskId::default());
        pool.release(first);
        let second = pool.acquire(TaskId::default());
        // same storage, different version: the stale handle must not resolve
        assert_ne!(first, second);
        assert!(pool.get(first).is_none());
        assert!(pool.get(second).is_some());
        assert_eq!(pool.len(), 1);
    }
}
