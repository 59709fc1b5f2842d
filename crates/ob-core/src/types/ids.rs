use crate::types::enums::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct InitiativeId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChecklistItemId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

/// Reference to a persisted entity of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Initiative(InitiativeId),
    Task(TaskId),
    ChecklistItem(ChecklistItemId),
}

/// Temporary key of an entity that only exists as a CREATE suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftKey(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "key", rename_all = "snake_case")]
pub enum EntityKey {
    Existing(EntityRef),
    Draft(DraftKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    InvalidPrefix { expected: &'static str, got: String },
    InvalidUlid { value: String },
    InvalidFormat { value: String },
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPrefix { expected, got } => {
                write!(f, "invalid prefix: expected {expected}, got {got}")
            }
            Self::InvalidUlid { value } => write!(f, "invalid ulid: {value}"),
            Self::InvalidFormat { value } => write!(f, "invalid id format: {value}"),
        }
    }
}

impl std::error::Error for IdError {}

fn prefix_of(value: &str) -> String {
    value
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_string()
}

fn validate_numbered(value: &str, prefix: &'static str) -> Result<(), IdError> {
    let Some(rest) = value.strip_prefix(prefix) else {
        return Err(IdError::InvalidPrefix {
            expected: prefix,
            got: prefix_of(value),
        });
    };
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdError::InvalidFormat {
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate_ulid(value: &str, prefix: &'static str) -> Result<(), IdError> {
    let Some(rest) = value.strip_prefix(prefix) else {
        return Err(IdError::InvalidPrefix {
            expected: prefix,
            got: prefix_of(value),
        });
    };
    if rest.len() != 26 {
        return Err(IdError::InvalidFormat {
            value: value.to_string(),
        });
    }
    Ulid::from_str(rest).map_err(|_| IdError::InvalidUlid {
        value: value.to_string(),
    })?;
    Ok(())
}

// Path labels are dot separated, so workspace identifiers may not contain dots.
fn validate_plain(value: &str, _prefix: &'static str) -> Result<(), IdError> {
    if value.is_empty() || value.contains('.') || value.chars().any(char::is_whitespace) {
        return Err(IdError::InvalidFormat {
            value: value.to_string(),
        });
    }
    Ok(())
}

macro_rules! id_type {
    ($name:ident, $prefix:expr, $validate:path) => {
        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new(value: String) -> Result<Self, IdError> {
                $validate(&value, Self::PREFIX)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let value = String::deserialize(deserializer)?;
                Self::new(value).map_err(serde::de::Error::custom)
            }
        }
    };
}

id_type!(InitiativeId, "I-", validate_numbered);
id_type!(TaskId, "T-", validate_numbered);
id_type!(ChecklistItemId, "cl_", validate_ulid);
id_type!(WorkspaceId, "", validate_plain);

impl InitiativeId {
    pub fn from_number(number: i64) -> Self {
        Self(format!("{}{number}", Self::PREFIX))
    }
}

impl TaskId {
    pub fn from_number(number: i64) -> Self {
        Self(format!("{}{number}", Self::PREFIX))
    }
}

impl ChecklistItemId {
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, Ulid::new()))
    }
}

impl EntityRef {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initiative(id) => id.as_str(),
            Self::Task(id) => id.as_str(),
            Self::ChecklistItem(id) => id.as_str(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Initiative(_) => EntityKind::Initiative,
            Self::Task(_) => EntityKind::Task,
            Self::ChecklistItem(_) => EntityKind::ChecklistItem,
        }
    }

    pub fn as_initiative(&self) -> Option<&InitiativeId> {
        match self {
            Self::Initiative(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&TaskId> {
        match self {
            Self::Task(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_checklist_item(&self) -> Option<&ChecklistItemId> {
        match self {
            Self::ChecklistItem(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DraftKey {
    pub const PREFIX: &'static str = "new-";

    /// Builds a draft key from an entity title: lowercase ascii alphanumerics,
    /// other runs collapsed to `-`, capped at 32 characters.
    pub fn from_title(title: &str) -> Self {
        let mut slug = String::new();
        for ch in title.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
            if slug.len() >= 32 {
                break;
            }
        }
        let slug = slug.trim_end_matches('-');
        if slug.is_empty() {
            return Self(format!("{}untitled", Self::PREFIX));
        }
        Self(format!("{}{slug}", Self::PREFIX))
    }

    pub fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl EntityKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Existing(entity) => entity.as_str(),
            Self::Draft(key) => key.as_str(),
        }
    }

    pub fn existing(&self) -> Option<&EntityRef> {
        match self {
            Self::Existing(entity) => Some(entity),
            Self::Draft(_) => None,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft(_))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
