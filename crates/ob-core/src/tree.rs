//! Arena of suggestions.
//!
//! Nodes are addressed by [`NodeId`]; parent pointers and child lists carry
//! the hierarchy. Paths are labels computed from the hierarchy and indexed for
//! lookup, never parsed back into structure.

use crate::error::EntryError;
use crate::types::{Change, EntityKey, EntityKind, Suggestion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Node {
    suggestion: Suggestion,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    index: BTreeMap<String, NodeId>,
}

/// True when `path` is `prefix` itself or lies below it at a segment
/// boundary. The empty prefix matches everything.
pub fn path_matches(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() || path == prefix {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('.'))
}

fn segment(entity: EntityKind, key: &EntityKey, change: &Change) -> String {
    match change {
        Change::Field { field, .. } => field.as_str().to_string(),
        _ => format!("{}.{}", entity.collection(), key.as_str()),
    }
}

impl SuggestionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a node below `parent` (or as a root) and returns its id.
    ///
    /// Field nodes must be inserted below the entity they belong to.
    pub fn insert(
        &mut self,
        parent: Option<NodeId>,
        entity: EntityKind,
        key: EntityKey,
        change: Change,
    ) -> Result<NodeId, EntryError> {
        let segment = segment(entity, &key, &change);
        let path = match parent.and_then(|id| self.get(id)) {
            Some(parent) => format!("{}.{segment}", parent.path),
            None => segment,
        };
        if self.index.contains_key(&path) {
            return Err(EntryError::Duplicate { path });
        }

        let id = NodeId(self.nodes.len());
        self.index.insert(path.clone(), id);
        self.nodes.push(Node {
            suggestion: Suggestion {
                path,
                entity,
                key,
                change,
            },
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Suggestion> {
        self.nodes.get(id.0).map(|node| &node.suggestion)
    }

    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        self.index.get(path).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Field suggestions directly below an entity node.
    pub fn fields_of(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.nodes[child.0].suggestion.field().is_some())
    }

    /// Entity suggestions directly below an entity node.
    pub fn entities_under(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.nodes[child.0].suggestion.field().is_none())
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// All nodes, parents before children, siblings in insertion order.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Nodes whose path matches `prefix`, in walk order.
    pub fn matching(&self, prefix: &str) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|id| path_matches(&self.nodes[id.0].suggestion.path, prefix))
            .collect()
    }

    /// The node and everything below it, in walk order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if id.0 >= self.nodes.len() {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Re-keys an entity node (and its field nodes) and recomputes the paths
    /// of its whole subtree.
    ///
    /// Fails with [`EntryError::Duplicate`] and leaves the tree untouched when
    /// another node already holds the new path.
    pub fn rekey(&mut self, id: NodeId, key: EntityKey) -> Result<(), EntryError> {
        let Some(node) = self.nodes.get(id.0) else {
            return Ok(());
        };
        let segment_for_key = segment(node.suggestion.entity, &key, &node.suggestion.change);
        let path = match node.parent {
            Some(parent) => format!("{}.{segment_for_key}", self.nodes[parent.0].suggestion.path),
            None => segment_for_key,
        };
        if self.index.get(&path).is_some_and(|holder| *holder != id) {
            return Err(EntryError::Duplicate { path });
        }

        self.nodes[id.0].suggestion.key = key.clone();
        let fields: Vec<NodeId> = self.fields_of(id).collect();
        for field in fields {
            self.nodes[field.0].suggestion.key = key.clone();
        }

        for node in self.subtree(id) {
            let suggestion = &self.nodes[node.0].suggestion;
            let segment = segment(suggestion.entity, &suggestion.key, &suggestion.change);
            let path = match self.nodes[node.0].parent {
                Some(parent) => format!("{}.{segment}", self.nodes[parent.0].suggestion.path),
                None => segment,
            };
            let old = std::mem::replace(&mut self.nodes[node.0].suggestion.path, path.clone());
            self.index.remove(&old);
            self.index.insert(path, node);
        }
        Ok(())
    }
}
