use crate::types::enums::{Action, EntityKind, Field, SuggestionKind};
use crate::types::ids::EntityKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A proposed change to one entity or to one field of an entity.
///
/// Field suggestions carry the `entity`/`key` of the entity they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub path: String,
    pub entity: EntityKind,
    pub key: EntityKey,
    pub change: Change,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    Create {
        suggested: Value,
    },
    Update {
        original: Option<Value>,
        suggested: Value,
    },
    Delete {
        original: Option<Value>,
    },
    Field {
        field: Field,
        original: Option<Value>,
        suggested: Value,
    },
}

impl Suggestion {
    pub fn kind(&self) -> SuggestionKind {
        match self.change {
            Change::Field { .. } => SuggestionKind::Field,
            _ => SuggestionKind::Entity,
        }
    }

    pub fn action(&self) -> Option<Action> {
        match self.change {
            Change::Create { .. } => Some(Action::Create),
            Change::Update { .. } => Some(Action::Update),
            Change::Delete { .. } => Some(Action::Delete),
            Change::Field { .. } => None,
        }
    }

    pub fn field(&self) -> Option<Field> {
        match self.change {
            Change::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn original_value(&self) -> Option<&Value> {
        match &self.change {
            Change::Create { .. } => None,
            Change::Update { original, .. }
            | Change::Delete { original }
            | Change::Field { original, .. } => original.as_ref(),
        }
    }

    pub fn suggested_value(&self) -> Option<&Value> {
        match &self.change {
            Change::Create { suggested }
            | Change::Update { suggested, .. }
            | Change::Field { suggested, .. } => Some(suggested),
            Change::Delete { .. } => None,
        }
    }

    /// Human-readable identifier of the targeted entity (`I-245`, `new-…`).
    pub fn entity_identifier(&self) -> &str {
        self.key.as_str()
    }

    /// UPDATE suggestions hold no decision of their own; their state is
    /// derived from their field suggestions.
    pub fn is_container(&self) -> bool {
        matches!(self.change, Change::Update { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionState {
    pub is_resolved: bool,
    pub is_accepted: bool,
    pub resolved_value: Option<Value>,
}

impl ResolutionState {
    pub fn accepted(value: Option<Value>) -> Self {
        Self {
            is_resolved: true,
            is_accepted: true,
            resolved_value: value,
        }
    }

    pub fn rejected() -> Self {
        Self {
            is_resolved: true,
            is_accepted: false,
            resolved_value: None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.is_resolved && !self.is_accepted
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionSummary {
    pub total: usize,
    pub resolved: usize,
    pub accepted: usize,
    pub rejected: usize,
}

impl ResolutionSummary {
    pub fn pending(&self) -> usize {
        self.total - self.resolved
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.resolved == self.total
    }
}
