//! Target store
//!
//! An arena of targets indexed by id. Each node keeps its parent pointer, a
//! child index and the set of owners that reference it. Walks over the tree
//! use explicit stacks and visit children in id order, so traversal order is
//! deterministic.
//!
//! The store itself performs no validation beyond keeping the parent and
//! child links in step; cycle and existence checks belong to the engine.

use rolegraph_rbac::{OwnerId, TargetId};
use std::collections::{BTreeMap, BTreeSet};

/// A single node of the permission hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNode {
    /// Node id
    pub id: TargetId,
    /// Parent node, `None` for roots
    pub parent: Option<TargetId>,
    /// Child index
    pub children: BTreeSet<TargetId>,
    /// Domain objects whose permissions are governed by this node
    pub owners: BTreeSet<OwnerId>,
}

impl TargetNode {
    fn new(id: TargetId, parent: Option<TargetId>) -> Self {
        Self {
            id,
            parent,
            children: BTreeSet::new(),
            owners: BTreeSet::new(),
        }
    }
}

/// The forest of targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetStore {
    nodes: BTreeMap<TargetId, TargetNode>,
}

impl TargetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the store holds no targets.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if a target exists.
    pub fn contains(&self, id: TargetId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Look up a node.
    pub fn get(&self, id: TargetId) -> Option<&TargetNode> {
        self.nodes.get(&id)
    }

    /// Parent of a target. `None` for roots and for unknown ids.
    pub fn parent(&self, id: TargetId) -> Option<TargetId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// Direct children of a target, in id order.
    pub fn children(&self, id: TargetId) -> impl DoubleEndedIterator<Item = TargetId> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|node| node.children.iter().copied())
    }

    /// All target ids, in id order.
    pub fn ids(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.nodes.keys().copied()
    }

    /// All nodes, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &TargetNode> + '_ {
        self.nodes.values()
    }

    /// Targets without a parent, in id order.
    pub fn roots(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.nodes
            .values()
            .filter(|node| node.parent.is_none())
            .map(|node| node.id)
    }

    /// Check if `ancestor` is `id` itself or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: TargetId, id: TargetId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// The subtree rooted at `root` in pre-order (every node after its parent).
    ///
    /// Returns an empty list if `root` does not exist.
    pub fn subtree(&self, root: TargetId) -> Vec<TargetId> {
        let mut out = Vec::new();
        if !self.contains(root) {
            return out;
        }

        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            out.push(current);
            // Reversed so the smallest child is popped first
            stack.extend(self.children(current).rev());
        }
        out
    }

    /// Every target, ancestors before descendants.
    pub fn topological(&self) -> Vec<TargetId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for root in self.roots() {
            out.extend(self.subtree(root));
        }
        out
    }

    /// Owners of a target.
    pub fn owners(&self, id: TargetId) -> Option<&BTreeSet<OwnerId>> {
        self.nodes.get(&id).map(|node| &node.owners)
    }

    /// Insert a new node and link it under its parent.
    ///
    /// The parent must already exist.
    pub(crate) fn insert(&mut self, id: TargetId, parent: Option<TargetId>) {
        self.restore(TargetNode::new(id, parent));
    }

    /// Re-insert a previously removed node, owners included.
    pub(crate) fn restore(&mut self, node: TargetNode) {
        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.insert(node.id);
            }
        }
        self.nodes.insert(node.id, node);
    }

    /// Remove a node and unlink it from its parent.
    ///
    /// Children are left dangling; callers remove subtrees leaves first.
    pub(crate) fn remove(&mut self, id: TargetId) -> Option<TargetNode> {
        let node = self.nodes.remove(&id)?;
        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.remove(&id);
            }
        }
        Some(node)
    }

    /// Move a node under a new parent, returning the old one.
    pub(crate) fn set_parent(&mut self, id: TargetId, parent: Option<TargetId>) -> Option<TargetId> {
        let old = match self.nodes.get_mut(&id) {
            Some(node) => std::mem::replace(&mut node.parent, parent),
            None => return None,
        };
        if let Some(old_parent) = old {
            if let Some(node) = self.nodes.get_mut(&old_parent) {
                node.children.remove(&id);
            }
        }
        if let Some(new_parent) = parent {
            if let Some(node) = self.nodes.get_mut(&new_parent) {
                node.children.insert(id);
            }
        }
        old
    }

    /// Add an owner. Returns false if it was already attached.
    pub(crate) fn attach_owner(&mut self, id: TargetId, owner: OwnerId) -> bool {
        self.nodes
            .get_mut(&id)
            .map(|node| node.owners.insert(owner))
            .unwrap_or(false)
    }

    /// Remove an owner. Returns false if it was not attached.
    pub(crate) fn detach_owner(&mut self, id: TargetId, owner: OwnerId) -> bool {
        self.nodes
            .get_mut(&id)
            .map(|node| node.owners.remove(&owner))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// a -> b -> c, a -> d
    fn sample() -> (TargetStore, [TargetId; 4]) {
        let mut store = TargetStore::new();
        let ids = [TargetId::new(), TargetId::new(), TargetId::new(), TargetId::new()];
        store.insert(ids[0], None);
        store.insert(ids[1], Some(ids[0]));
        store.insert(ids[2], Some(ids[1]));
        store.insert(ids[3], Some(ids[0]));
        (store, ids)
    }

    #[test]
    fn test_insert_links_children() {
        let (store, [a, b, c, d]) = sample();

        assert_eq!(store.len(), 4);
        assert_eq!(store.parent(b), Some(a));
        assert_eq!(store.parent(a), None);
        assert_eq!(store.children(a).collect::<Vec<_>>().len(), 2);
        assert!(store.children(a).any(|id| id == d));
        assert_eq!(store.children(b).collect::<Vec<_>>(), vec![c]);
        assert_eq!(store.roots().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_subtree_is_preorder() {
        let (store, [a, b, c, d]) = sample();

        let subtree = store.subtree(a);
        assert_eq!(subtree.len(), 4);
        assert_eq!(subtree[0], a);

        let pos = |id| subtree.iter().position(|x| *x == id).unwrap();
        assert!(pos(b) < pos(c));
        assert!(pos(a) < pos(d));

        assert_eq!(store.subtree(c), vec![c]);
        assert!(store.subtree(TargetId::new()).is_empty());
    }

    #[test]
    fn test_ancestry() {
        let (store, [a, b, c, d]) = sample();

        assert_eq!(store.parent(c), Some(b));
        assert!(store.is_ancestor_or_self(a, c));
        assert!(store.is_ancestor_or_self(c, c));
        assert!(!store.is_ancestor_or_self(d, c));
        assert!(!store.is_ancestor_or_self(c, a));
    }

    #[test]
    fn test_set_parent_moves_child_index() {
        let (mut store, [a, b, c, d]) = sample();

        let old = store.set_parent(b, Some(d));
        assert_eq!(old, Some(a));
        assert!(!store.children(a).any(|id| id == b));
        assert_eq!(store.children(d).collect::<Vec<_>>(), vec![b]);
        assert!(store.is_ancestor_or_self(d, c));
        assert!(store.is_ancestor_or_self(a, c));

        store.set_parent(b, None);
        assert_eq!(store.roots().count(), 2);
    }

    #[test]
    fn test_remove_and_restore() {
        let (mut store, [a, b, c, _]) = sample();
        let before = store.clone();

        store.attach_owner(c, OwnerId::new());
        let snapshot = store.clone();

        let node = store.remove(c).unwrap();
        assert!(!store.contains(c));
        assert!(store.children(b).next().is_none());

        store.restore(node);
        assert_eq!(store, snapshot);
        assert_ne!(store, before);
        assert_eq!(store.topological()[0], a);
    }

    #[test]
    fn test_owners() {
        let (mut store, [a, ..]) = sample();
        let owner = OwnerId::new();

        assert!(store.attach_owner(a, owner));
        assert!(!store.attach_owner(a, owner));
        assert_eq!(store.owners(a).map(|o| o.len()), Some(1));
        assert!(store.detach_owner(a, owner));
        assert!(!store.detach_owner(a, owner));
        assert!(!store.attach_owner(TargetId::new(), owner));
    }
}
