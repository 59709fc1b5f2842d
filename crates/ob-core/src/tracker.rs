use crate::tree::{NodeId, SuggestionTree};
use crate::types::ResolutionState;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Per-node user decisions, kept apart from the suggestions themselves so a
/// suggestion survives any number of resolve/rollback cycles.
///
/// UPDATE containers never hold a state of their own; theirs is derived from
/// their field nodes on every read. A container without field changes
/// derives it from its nested entity suggestions instead.
#[derive(Debug, Clone, Default)]
pub struct ResolutionTracker {
    states: HashMap<NodeId, ResolutionState>,
    committed: BTreeSet<NodeId>,
}

impl ResolutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, tree: &SuggestionTree, id: NodeId) -> ResolutionState {
        match tree.get(id) {
            Some(suggestion) if suggestion.is_container() => self.container_state(tree, id),
            Some(_) => self.states.get(&id).cloned().unwrap_or_default(),
            None => ResolutionState::default(),
        }
    }

    /// Nodes a container's decision is made of: its fields, or its nested
    /// entities when it changes no field.
    fn members(tree: &SuggestionTree, id: NodeId) -> Vec<NodeId> {
        let fields: Vec<NodeId> = tree.fields_of(id).collect();
        if fields.is_empty() {
            tree.children(id).to_vec()
        } else {
            fields
        }
    }

    fn container_state(&self, tree: &SuggestionTree, id: NodeId) -> ResolutionState {
        let fields: Vec<(NodeId, ResolutionState)> = Self::members(tree, id)
            .into_iter()
            .map(|member| (member, self.state(tree, member)))
            .collect();
        if fields.is_empty() || !fields.iter().all(|(_, state)| state.is_resolved) {
            return ResolutionState::default();
        }

        let accepted: Vec<&(NodeId, ResolutionState)> =
            fields.iter().filter(|(_, state)| state.is_accepted).collect();
        if accepted.is_empty() {
            return ResolutionState::rejected();
        }

        let mut value = tree
            .get(id)
            .and_then(|s| s.original_value())
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new);
        for (field, state) in &accepted {
            if let Some(name) = tree.get(*field).and_then(|s| s.field()) {
                value.insert(
                    name.as_str().to_string(),
                    state.resolved_value.clone().unwrap_or(Value::Null),
                );
            }
        }

        ResolutionState {
            is_resolved: true,
            is_accepted: accepted.len() == fields.len(),
            resolved_value: Some(Value::Object(value)),
        }
    }

    /// Records a decision. Returns `false` when nothing was recorded: the node
    /// does not exist or was already committed.
    ///
    /// On a container the decision is applied to each member node; an object
    /// override is split by field name.
    pub fn resolve(
        &mut self,
        tree: &SuggestionTree,
        id: NodeId,
        accepted: bool,
        value: Option<Value>,
    ) -> bool {
        let Some(suggestion) = tree.get(id) else {
            return false;
        };
        if self.committed.contains(&id) {
            return false;
        }

        if suggestion.is_container() {
            let mut recorded = false;
            for member in Self::members(tree, id) {
                let member_value = value.as_ref().and_then(|value| {
                    let name = tree.get(member)?.field()?;
                    value.get(name.as_str()).cloned()
                });
                recorded |= self.resolve(tree, member, accepted, member_value);
            }
            return recorded;
        }

        let state = if accepted {
            ResolutionState::accepted(value.or_else(|| suggestion.suggested_value().cloned()))
        } else {
            ResolutionState::rejected()
        };
        self.states.insert(id, state);
        true
    }

    pub fn rollback(&mut self, tree: &SuggestionTree, id: NodeId) -> bool {
        let Some(suggestion) = tree.get(id) else {
            return false;
        };
        if self.committed.contains(&id) {
            return false;
        }
        if suggestion.is_container() {
            let mut cleared = false;
            for member in Self::members(tree, id) {
                cleared |= self.rollback(tree, member);
            }
            cleared
        } else {
            self.states.remove(&id);
            true
        }
    }

    pub fn is_committed(&self, id: NodeId) -> bool {
        self.committed.contains(&id)
    }

    pub fn mark_committed(&mut self, id: NodeId) {
        self.committed.insert(id);
    }

    pub fn committed(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.committed.iter().copied()
    }

    /// Stored decisions, for snapshots.
    pub fn decisions(&self) -> impl Iterator<Item = (NodeId, &ResolutionState)> {
        self.states.iter().map(|(id, state)| (*id, state))
    }

    pub fn restore(&mut self, id: NodeId, state: ResolutionState) {
        self.states.insert(id, state);
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.committed.clear();
    }
}
