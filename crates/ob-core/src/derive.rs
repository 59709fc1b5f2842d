//! Derivation of the suggestion tree from a parsed job and the live entities.
//!
//! Derivation is pure: the same job and the same live tree always produce the
//! same nodes in the same order.

use crate::error::EntryError;
use crate::job::skip;
use crate::tree::{NodeId, SuggestionTree};
use crate::types::{
    Change, ChecklistItem, ChecklistItemId, DraftKey, EntityKey, EntityKind, EntityRef, Field,
    Initiative, InitiativeChange, InitiativeId, ListChange, ManagedChecklistItem,
    ManagedInitiative, ManagedTask, ParsedJob, SkippedEntry, Task, TaskChange, TaskDraft, TaskId,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct Derived {
    pub tree: SuggestionTree,
    pub skipped: Vec<SkippedEntry>,
}

pub fn initiative_snapshot(initiative: &Initiative) -> Value {
    json!({
        "identifier": initiative.identifier,
        "workspace_identifier": initiative.workspace_identifier,
        "title": initiative.title,
        "description": initiative.description,
        "type": initiative.kind,
        "status": initiative.status,
        "order": initiative.order,
    })
}

pub fn task_snapshot(task: &Task) -> Value {
    json!({
        "identifier": task.identifier,
        "initiative_identifier": task.initiative_identifier,
        "title": task.title,
        "description": task.description,
        "type": task.kind,
        "status": task.status,
    })
}

pub fn checklist_snapshot(item: &ChecklistItem) -> Value {
    json!({
        "id": item.id,
        "task_identifier": item.task_identifier,
        "title": item.title,
        "is_complete": item.is_complete,
        "order": item.order,
    })
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

struct FieldChange {
    field: Field,
    original: Option<Value>,
    suggested: Value,
}

struct Proposal {
    entity: EntityKind,
    key: EntityKey,
    change: Change,
    fields: Vec<FieldChange>,
    children: Vec<Proposal>,
}

impl Proposal {
    fn entity(entity: EntityKind, key: EntityKey, change: Change) -> Self {
        Self {
            entity,
            key,
            change,
            fields: Vec::new(),
            children: Vec::new(),
        }
    }

    /// An UPDATE proposal, or `None` when it would change nothing.
    fn update(
        entity: EntityKind,
        key: EntityKey,
        live: Option<Value>,
        patch: &Value,
        children: Vec<Proposal>,
    ) -> Option<Self> {
        let fields = field_changes(entity, live.as_ref(), patch);
        if fields.is_empty() && children.is_empty() {
            tracing::debug!(entity = %key, "dropping update without changes");
            return None;
        }
        let suggested = overlay(live.as_ref(), patch);
        Some(Self {
            entity,
            key,
            change: Change::Update {
                original: live,
                suggested,
            },
            fields,
            children,
        })
    }
}

fn field_changes(entity: EntityKind, live: Option<&Value>, patch: &Value) -> Vec<FieldChange> {
    entity
        .fields()
        .iter()
        .filter_map(|field| {
            let suggested = patch.get(field.as_str())?;
            let original = live.and_then(|live| live.get(field.as_str())).cloned();
            if original.as_ref() == Some(suggested) {
                return None;
            }
            Some(FieldChange {
                field: *field,
                original,
                suggested: suggested.clone(),
            })
        })
        .collect()
}

fn overlay(live: Option<&Value>, patch: &Value) -> Value {
    let mut merged = live
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);
    if let Some(patch) = patch.as_object() {
        for (name, value) in patch {
            merged.insert(name.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// Allocates draft keys unique among one sibling list.
#[derive(Default)]
struct DraftKeys(HashSet<String>);

impl DraftKeys {
    fn allocate(&mut self, title: &str) -> EntityKey {
        let base = DraftKey::from_title(title);
        let mut key = base.clone();
        let mut n = 2;
        while !self.0.insert(key.as_str().to_string()) {
            key = base.with_suffix(n);
            n += 1;
        }
        EntityKey::Draft(key)
    }
}

pub fn derive(job: &ParsedJob, live: &[Initiative]) -> Derived {
    let mut derived = Derived::default();
    let mut drafts = DraftKeys::default();
    for managed in &job.initiatives {
        if let Some(proposal) = initiative_proposal(managed, live, &mut drafts) {
            insert(&mut derived, None, proposal);
        }
    }
    derived
}

fn insert(derived: &mut Derived, parent: Option<NodeId>, proposal: Proposal) {
    let Proposal {
        entity,
        key,
        change,
        fields,
        children,
    } = proposal;
    let id = match derived.tree.insert(parent, entity, key.clone(), change) {
        Ok(id) => id,
        Err(err) => {
            let location = match &err {
                EntryError::Duplicate { path } => path.clone(),
                _ => key.to_string(),
            };
            skip(&mut derived.skipped, location, &err);
            return;
        }
    };
    for field in fields {
        let change = Change::Field {
            field: field.field,
            original: field.original,
            suggested: field.suggested,
        };
        if let Err(err) = derived.tree.insert(Some(id), entity, key.clone(), change) {
            skip(&mut derived.skipped, key.to_string(), &err);
        }
    }
    for child in children {
        insert(derived, Some(id), child);
    }
}

fn initiative_proposal(
    managed: &ManagedInitiative,
    live: &[Initiative],
    drafts: &mut DraftKeys,
) -> Option<Proposal> {
    let find = |id: &InitiativeId| live.iter().find(|initiative| &initiative.identifier == id);
    match managed {
        ManagedInitiative::Create(draft) => {
            let mut tasks = DraftKeys::default();
            let children = draft
                .tasks
                .iter()
                .map(|task| task_draft_proposal(task, &mut tasks))
                .collect();
            let mut suggested = draft.clone();
            suggested.tasks.clear();
            Some(Proposal {
                children,
                ..Proposal::entity(
                    EntityKind::Initiative,
                    drafts.allocate(&draft.title),
                    Change::Create {
                        suggested: to_json(&suggested),
                    },
                )
            })
        }
        ManagedInitiative::Update(change) => initiative_update(change, find(&change.identifier)),
        ManagedInitiative::Delete { identifier } => Some(Proposal::entity(
            EntityKind::Initiative,
            EntityKey::Existing(EntityRef::Initiative(identifier.clone())),
            Change::Delete {
                original: find(identifier).map(initiative_snapshot),
            },
        )),
    }
}

fn initiative_update(change: &InitiativeChange, live: Option<&Initiative>) -> Option<Proposal> {
    let key = EntityKey::Existing(EntityRef::Initiative(change.identifier.clone()));
    if live.is_none() {
        tracing::debug!(initiative = %change.identifier, "update targets an initiative missing from the live tree");
    }
    let live_tasks = live.map_or(&[][..], |initiative| initiative.tasks.as_slice());
    let children = change
        .tasks
        .as_ref()
        .map(|tasks| task_list_proposals(tasks, live_tasks))
        .unwrap_or_default();
    Proposal::update(
        EntityKind::Initiative,
        key,
        live.map(initiative_snapshot),
        &to_json(&change.patch),
        children,
    )
}

fn task_draft_proposal(draft: &TaskDraft, drafts: &mut DraftKeys) -> Proposal {
    let mut items = DraftKeys::default();
    let children = draft
        .checklist
        .iter()
        .map(|item| {
            Proposal::entity(
                EntityKind::ChecklistItem,
                items.allocate(&item.title),
                Change::Create {
                    suggested: to_json(item),
                },
            )
        })
        .collect();
    let mut suggested = draft.clone();
    suggested.checklist.clear();
    Proposal {
        children,
        ..Proposal::entity(
            EntityKind::Task,
            drafts.allocate(&draft.title),
            Change::Create {
                suggested: to_json(&suggested),
            },
        )
    }
}

fn task_list_proposals(list: &ListChange<ManagedTask>, live: &[Task]) -> Vec<Proposal> {
    let find = |id: &TaskId| live.iter().find(|task| &task.identifier == id);
    let mut drafts = DraftKeys::default();
    let mut mentioned = HashSet::new();
    let mut proposals = Vec::new();

    for entry in &list.entries {
        let proposal = match entry {
            ManagedTask::Create(draft) => Some(task_draft_proposal(draft, &mut drafts)),
            ManagedTask::Update(change) => {
                mentioned.insert(change.identifier.clone());
                task_update(change, find(&change.identifier))
            }
            ManagedTask::Delete { identifier } => {
                mentioned.insert(identifier.clone());
                Some(task_delete(identifier.clone(), find(identifier)))
            }
        };
        proposals.extend(proposal);
    }

    if list.snapshot {
        let deleted = live.iter().filter(|task| {
            !mentioned.contains(&task.identifier)
                && !list.kept.contains(task.identifier.as_str())
        });
        for task in deleted {
            proposals.push(task_delete(task.identifier.clone(), Some(task)));
        }
    }
    proposals
}

fn task_delete(identifier: TaskId, live: Option<&Task>) -> Proposal {
    Proposal::entity(
        EntityKind::Task,
        EntityKey::Existing(EntityRef::Task(identifier)),
        Change::Delete {
            original: live.map(task_snapshot),
        },
    )
}

fn task_update(change: &TaskChange, live: Option<&Task>) -> Option<Proposal> {
    let live_items = live.map_or(&[][..], |task| task.checklist.as_slice());
    let children = change
        .checklist
        .as_ref()
        .map(|items| checklist_proposals(items, live_items))
        .unwrap_or_default();
    Proposal::update(
        EntityKind::Task,
        EntityKey::Existing(EntityRef::Task(change.identifier.clone())),
        live.map(task_snapshot),
        &to_json(&change.patch),
        children,
    )
}

fn checklist_proposals(
    list: &ListChange<ManagedChecklistItem>,
    live: &[ChecklistItem],
) -> Vec<Proposal> {
    let find = |id: &ChecklistItemId| live.iter().find(|item| &item.id == id);
    let mut drafts = DraftKeys::default();
    let mut mentioned = HashSet::new();
    let mut proposals = Vec::new();

    for entry in &list.entries {
        let proposal = match entry {
            ManagedChecklistItem::Create(draft) => Some(Proposal::entity(
                EntityKind::ChecklistItem,
                drafts.allocate(&draft.title),
                Change::Create {
                    suggested: to_json(draft),
                },
            )),
            ManagedChecklistItem::Update(change) => {
                mentioned.insert(change.id.clone());
                let key = EntityKey::Existing(EntityRef::ChecklistItem(change.id.clone()));
                Proposal::update(
                    EntityKind::ChecklistItem,
                    key,
                    find(&change.id).map(checklist_snapshot),
                    &to_json(&change.patch),
                    Vec::new(),
                )
            }
            ManagedChecklistItem::Delete { id } => {
                mentioned.insert(id.clone());
                Some(Proposal::entity(
                    EntityKind::ChecklistItem,
                    EntityKey::Existing(EntityRef::ChecklistItem(id.clone())),
                    Change::Delete {
                        original: find(id).map(checklist_snapshot),
                    },
                ))
            }
        };
        proposals.extend(proposal);
    }

    if list.snapshot {
        let deleted = live
            .iter()
            .filter(|item| !mentioned.contains(&item.id) && !list.kept.contains(item.id.as_str()));
        for item in deleted {
            proposals.push(Proposal::entity(
                EntityKind::ChecklistItem,
                EntityKey::Existing(EntityRef::ChecklistItem(item.id.clone())),
                Change::Delete {
                    original: Some(checklist_snapshot(item)),
                },
            ));
        }
    }
    proposals
}
