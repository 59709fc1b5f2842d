//! Turning resolved suggestions into store calls.
//!
//! Planning is pure and runs against the tree and tracker. Execution only
//! needs the plan and a [`Store`], so it can run on another thread while the
//! session stays locked for saving.

use crate::checklist::ChecklistRepository;
use crate::error::BacklogError;
use crate::initiatives::InitiativeRepository;
use crate::store::Store;
use crate::tasks::TaskRepository;
use crate::tracker::ResolutionTracker;
use crate::tree::{NodeId, SuggestionTree};
use crate::types::{
    Change, ChecklistDraft, ChecklistItemId, CreateChecklistItemInput, CreateInitiativeInput,
    CreateTaskInput, EntityKey, EntityKind, EntityRef, InitiativeDraft, InitiativeId, TaskDraft,
    TaskId, UpdateChecklistItemInput, UpdateInitiativeInput, UpdateTaskInput,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Parent of an entity being created: already stored, or created earlier in
/// the same save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent<T> {
    Existing(T),
    Planned(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOp {
    CreateInitiative {
        input: CreateInitiativeInput,
    },
    UpdateInitiative {
        identifier: InitiativeId,
        input: UpdateInitiativeInput,
    },
    DeleteInitiative {
        identifier: InitiativeId,
    },
    CreateTask {
        initiative: Parent<InitiativeId>,
        draft: TaskDraft,
    },
    UpdateTask {
        identifier: TaskId,
        input: UpdateTaskInput,
    },
    DeleteTask {
        identifier: TaskId,
    },
    CreateChecklistItem {
        task: Parent<TaskId>,
        draft: ChecklistDraft,
    },
    UpdateChecklistItem {
        id: ChecklistItemId,
        input: UpdateChecklistItemInput,
    },
    DeleteChecklistItem {
        id: ChecklistItemId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommit {
    pub node: NodeId,
    pub path: String,
    pub op: CommitOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Commit(PlannedCommit),
    /// Decided without a store call: dropped, or failed during planning.
    Settled(EntityOutcome),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavePlan {
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommitFailure {
    #[error("entity no longer exists: {message}")]
    NotFound { message: String },
    #[error("parent entity was not created")]
    ParentUnavailable,
    #[error("invalid value: {message}")]
    InvalidValue { message: String },
    #[error("store error: {message}")]
    Store { message: String },
}

impl From<BacklogError> for CommitFailure {
    fn from(err: BacklogError) -> Self {
        use crate::error::{ChecklistError, InitiativeError, TaskError};

        let message = err.to_string();
        if err.is_not_found() {
            return Self::NotFound { message };
        }
        match err {
            BacklogError::Initiative(InitiativeError::InvalidInput { .. })
            | BacklogError::Task(TaskError::InvalidInput { .. })
            | BacklogError::Checklist(ChecklistError::InvalidInput { .. }) => {
                Self::InvalidValue { message }
            }
            _ => Self::Store { message },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Created { entity: EntityRef },
    Updated { entity: EntityRef },
    Deleted { entity: EntityRef },
    Dropped,
    Failed { reason: CommitFailure },
}

impl OutcomeStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityOutcome {
    pub node: NodeId,
    pub path: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub outcomes: Vec<EntityOutcome>,
}

impl SaveReport {
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(|outcome| outcome.status.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntityOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status.is_failure())
    }

    pub fn created(&self) -> usize {
        self.count(|status| matches!(status, OutcomeStatus::Created { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count(|status| matches!(status, OutcomeStatus::Updated { .. }))
    }

    pub fn deleted(&self) -> usize {
        self.count(|status| matches!(status, OutcomeStatus::Deleted { .. }))
    }

    pub fn dropped(&self) -> usize {
        self.count(|status| matches!(status, OutcomeStatus::Dropped))
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| pred(&outcome.status))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreateFate {
    Planned,
    Rejected,
    Failed,
}

struct Planner<'a> {
    tree: &'a SuggestionTree,
    tracker: &'a ResolutionTracker,
    fates: HashMap<NodeId, CreateFate>,
}

/// Builds the save plan for every uncommitted entity suggestion, parents
/// before children. Unresolved decisions count as rejected; callers check
/// resolution before planning.
pub fn plan(tree: &SuggestionTree, tracker: &ResolutionTracker) -> SavePlan {
    let mut planner = Planner {
        tree,
        tracker,
        fates: HashMap::new(),
    };
    let mut steps = Vec::new();
    for id in tree.walk() {
        let Some(suggestion) = tree.get(id) else {
            continue;
        };
        if suggestion.field().is_some() || tracker.is_committed(id) {
            continue;
        }
        let path = suggestion.path.clone();
        let step = match planner.step(id) {
            Ok(Some(op)) => PlanStep::Commit(PlannedCommit { node: id, path, op }),
            Ok(None) => PlanStep::Settled(EntityOutcome {
                node: id,
                path,
                status: OutcomeStatus::Dropped,
            }),
            Err(reason) => PlanStep::Settled(EntityOutcome {
                node: id,
                path,
                status: OutcomeStatus::Failed { reason },
            }),
        };
        steps.push(step);
    }
    SavePlan { steps }
}

impl Planner<'_> {
    fn step(&mut self, id: NodeId) -> Result<Option<CommitOp>, CommitFailure> {
        let tree = self.tree;
        let Some(suggestion) = tree.get(id) else {
            return Ok(None);
        };
        match &suggestion.change {
            Change::Create { .. } => {
                let result = self.create(id, suggestion.entity);
                let fate = match &result {
                    Ok(Some(_)) => CreateFate::Planned,
                    Ok(None) => CreateFate::Rejected,
                    Err(_) => CreateFate::Failed,
                };
                self.fates.insert(id, fate);
                result
            }
            Change::Update { .. } => self.update(id, suggestion.entity, &suggestion.key),
            Change::Delete { .. } => {
                if !self.tracker.state(self.tree, id).is_accepted {
                    return Ok(None);
                }
                let entity = existing(&suggestion.key)?;
                Ok(Some(match entity {
                    EntityRef::Initiative(identifier) => {
                        CommitOp::DeleteInitiative { identifier }
                    }
                    EntityRef::Task(identifier) => CommitOp::DeleteTask { identifier },
                    EntityRef::ChecklistItem(id) => CommitOp::DeleteChecklistItem { id },
                }))
            }
            Change::Field { .. } => Ok(None),
        }
    }

    fn create(&self, id: NodeId, entity: EntityKind) -> Result<Option<CommitOp>, CommitFailure> {
        let state = self.tracker.state(self.tree, id);
        if !state.is_accepted {
            return Ok(None);
        }
        let value = state.resolved_value.unwrap_or(Value::Null);
        let op = match entity {
            EntityKind::Initiative => {
                let draft: InitiativeDraft = decode(value)?;
                CommitOp::CreateInitiative {
                    input: CreateInitiativeInput {
                        workspace_identifier: draft.workspace_identifier,
                        title: draft.title,
                        description: draft.description,
                        kind: draft.kind,
                        status: draft.status,
                        order: draft.order,
                    },
                }
            }
            EntityKind::Task => {
                let Some(initiative) = self.parent(id, EntityRef::as_initiative)? else {
                    return Ok(None);
                };
                let mut draft: TaskDraft = decode(value)?;
                draft.checklist.clear();
                CommitOp::CreateTask { initiative, draft }
            }
            EntityKind::ChecklistItem => {
                let Some(task) = self.parent(id, EntityRef::as_task)? else {
                    return Ok(None);
                };
                CommitOp::CreateChecklistItem {
                    task,
                    draft: decode(value)?,
                }
            }
        };
        Ok(Some(op))
    }

    /// Where a created child goes. `None` when the parent is a rejected
    /// draft: the child is dropped along with it.
    fn parent<T: Clone>(
        &self,
        id: NodeId,
        extract: impl Fn(&EntityRef) -> Option<&T>,
    ) -> Result<Option<Parent<T>>, CommitFailure> {
        let parent = self
            .tree
            .parent(id)
            .ok_or(CommitFailure::ParentUnavailable)?;
        let suggestion = self
            .tree
            .get(parent)
            .ok_or(CommitFailure::ParentUnavailable)?;
        match &suggestion.key {
            EntityKey::Existing(entity) => extract(entity)
                .cloned()
                .map(|entity| Some(Parent::Existing(entity)))
                .ok_or(CommitFailure::ParentUnavailable),
            EntityKey::Draft(_) => match self.fates.get(&parent) {
                Some(CreateFate::Planned) => Ok(Some(Parent::Planned(parent))),
                Some(CreateFate::Rejected) => Ok(None),
                Some(CreateFate::Failed) => Err(CommitFailure::ParentUnavailable),
                // Settled by an earlier save.
                None if self.tracker.state(self.tree, parent).is_rejected() => {
                    tracing::debug!(?parent, "dropping child of a rejected draft");
                    Ok(None)
                }
                None => Err(CommitFailure::ParentUnavailable),
            },
        }
    }

    fn update(
        &self,
        id: NodeId,
        entity: EntityKind,
        key: &EntityKey,
    ) -> Result<Option<CommitOp>, CommitFailure> {
        let subtree_accepted = self.tree.subtree(id).into_iter().skip(1).any(|node| {
            !self.tracker.is_committed(node)
                && self.tree.get(node).is_some_and(|s| !s.is_container())
                && self.tracker.state(self.tree, node).is_accepted
        });
        if !subtree_accepted {
            return Ok(None);
        }

        let mut patch = Map::new();
        for field in self.tree.fields_of(id) {
            let state = self.tracker.state(self.tree, field);
            let Some(name) = self.tree.get(field).and_then(|s| s.field()) else {
                continue;
            };
            if state.is_accepted {
                patch.insert(
                    name.as_str().to_string(),
                    state.resolved_value.unwrap_or(Value::Null),
                );
            }
        }
        let patch = Value::Object(patch);

        let entity_ref = existing(key)?;
        let op = match (entity, entity_ref) {
            (EntityKind::Initiative, EntityRef::Initiative(identifier)) => {
                CommitOp::UpdateInitiative {
                    identifier,
                    input: decode(patch)?,
                }
            }
            (EntityKind::Task, EntityRef::Task(identifier)) => CommitOp::UpdateTask {
                identifier,
                input: decode(patch)?,
            },
            (EntityKind::ChecklistItem, EntityRef::ChecklistItem(id)) => {
                CommitOp::UpdateChecklistItem {
                    id,
                    input: decode(patch)?,
                }
            }
            (kind, entity) => {
                return Err(CommitFailure::InvalidValue {
                    message: format!("{entity} is not a {kind}"),
                });
            }
        };
        Ok(Some(op))
    }
}

fn existing(key: &EntityKey) -> Result<EntityRef, CommitFailure> {
    key.existing()
        .cloned()
        .ok_or_else(|| CommitFailure::InvalidValue {
            message: format!("{key} has no stored identifier"),
        })
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, CommitFailure> {
    serde_json::from_value(value).map_err(|err| CommitFailure::InvalidValue {
        message: err.to_string(),
    })
}

impl SavePlan {
    /// Number of store calls the plan will make.
    pub fn commits(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, PlanStep::Commit(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every planned call in order, each in its own transaction. A
    /// failure is recorded against its entity and the remaining calls still
    /// run.
    pub fn execute<S: Store>(&self, store: &S) -> SaveReport {
        let mut created: HashMap<NodeId, EntityRef> = HashMap::new();
        let mut outcomes = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match step {
                PlanStep::Settled(outcome) => outcomes.push(outcome.clone()),
                PlanStep::Commit(commit) => {
                    let status = match apply(store, &commit.op, &created) {
                        Ok(status) => {
                            tracing::info!(path = %commit.path, "committed suggestion");
                            if let OutcomeStatus::Created { entity } = &status {
                                created.insert(commit.node, entity.clone());
                            }
                            status
                        }
                        Err(reason) => {
                            tracing::warn!(path = %commit.path, reason = %reason, "commit failed");
                            OutcomeStatus::Failed { reason }
                        }
                    };
                    outcomes.push(EntityOutcome {
                        node: commit.node,
                        path: commit.path.clone(),
                        status,
                    });
                }
            }
        }
        SaveReport { outcomes }
    }
}

fn resolve_parent<T: Clone>(
    parent: &Parent<T>,
    created: &HashMap<NodeId, EntityRef>,
    extract: impl Fn(&EntityRef) -> Option<&T>,
) -> Result<T, CommitFailure> {
    match parent {
        Parent::Existing(id) => Ok(id.clone()),
        Parent::Planned(node) => created
            .get(node)
            .and_then(extract)
            .cloned()
            .ok_or(CommitFailure::ParentUnavailable),
    }
}

fn apply<S: Store>(
    store: &S,
    op: &CommitOp,
    created: &HashMap<NodeId, EntityRef>,
) -> Result<OutcomeStatus, CommitFailure> {
    let status = match op {
        CommitOp::CreateInitiative { input } => {
            let initiative =
                store.with_tx(|store| Ok(store.initiatives().create(input.clone())?))?;
            OutcomeStatus::Created {
                entity: EntityRef::Initiative(initiative.identifier),
            }
        }
        CommitOp::UpdateInitiative { identifier, input } => {
            store.with_tx(|store| Ok(store.initiatives().update(identifier, input.clone())?))?;
            OutcomeStatus::Updated {
                entity: EntityRef::Initiative(identifier.clone()),
            }
        }
        CommitOp::DeleteInitiative { identifier } => {
            store.with_tx(|store| Ok(store.initiatives().delete(identifier)?))?;
            OutcomeStatus::Deleted {
                entity: EntityRef::Initiative(identifier.clone()),
            }
        }
        CommitOp::CreateTask { initiative, draft } => {
            let initiative_identifier =
                resolve_parent(initiative, created, EntityRef::as_initiative)?;
            let input = CreateTaskInput {
                initiative_identifier,
                title: draft.title.clone(),
                description: draft.description.clone(),
                kind: draft.kind.clone(),
                status: draft.status,
            };
            let task = store.with_tx(|store| Ok(store.tasks().create(input)?))?;
            OutcomeStatus::Created {
                entity: EntityRef::Task(task.identifier),
            }
        }
        CommitOp::UpdateTask { identifier, input } => {
            store.with_tx(|store| Ok(store.tasks().update(identifier, input.clone())?))?;
            OutcomeStatus::Updated {
                entity: EntityRef::Task(identifier.clone()),
            }
        }
        CommitOp::DeleteTask { identifier } => {
            store.with_tx(|store| Ok(store.tasks().delete(identifier)?))?;
            OutcomeStatus::Deleted {
                entity: EntityRef::Task(identifier.clone()),
            }
        }
        CommitOp::CreateChecklistItem { task, draft } => {
            let task_identifier = resolve_parent(task, created, EntityRef::as_task)?;
            let input = CreateChecklistItemInput {
                task_identifier,
                title: draft.title.clone(),
                is_complete: draft.is_complete,
                order: draft.order,
            };
            let item = store.with_tx(|store| Ok(store.checklist().create(input)?))?;
            OutcomeStatus::Created {
                entity: EntityRef::ChecklistItem(item.id),
            }
        }
        CommitOp::UpdateChecklistItem { id, input } => {
            store.with_tx(|store| Ok(store.checklist().update(id, input.clone())?))?;
            OutcomeStatus::Updated {
                entity: EntityRef::ChecklistItem(id.clone()),
            }
        }
        CommitOp::DeleteChecklistItem { id } => {
            store.with_tx(|store| Ok(store.checklist().delete(id)?))?;
            OutcomeStatus::Deleted {
                entity: EntityRef::ChecklistItem(id.clone()),
            }
        }
    };
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::derive;
    use crate::job::parse_job;
    use crate::test_support::{Call, RecordingStore, initiative, job, task};
    use serde_json::json;

    fn load(entries: Value, store: &RecordingStore) -> SuggestionTree {
        let parsed = parse_job(&job(entries)).unwrap();
        derive(&parsed, &store.snapshot()).tree
    }

    fn resolve(tree: &SuggestionTree, tracker: &mut ResolutionTracker, path: &str, accepted: bool) {
        let id = tree.lookup(path).unwrap();
        assert!(tracker.resolve(tree, id, accepted, None));
    }

    #[test]
    fn rejected_parent_drops_its_accepted_children() {
        let store = RecordingStore::default();
        let tree = load(
            json!([{"action": "CREATE", "workspace_identifier": "ws-1", "title": "Launch",
                    "tasks": [{"title": "Plan", "checklist": [{"title": "Book room"}]},
                              {"title": "Skip"}]}]),
            &store,
        );
        let mut tracker = ResolutionTracker::new();
        resolve(&tree, &mut tracker, "initiative.new-launch", false);
        resolve(&tree, &mut tracker, "initiative.new-launch.tasks.new-plan", true);
        resolve(
            &tree,
            &mut tracker,
            "initiative.new-launch.tasks.new-plan.checklist.new-book-room",
            true,
        );
        resolve(&tree, &mut tracker, "initiative.new-launch.tasks.new-skip", false);

        let plan = plan(&tree, &tracker);

        assert_eq!(plan.commits(), 0);
        let statuses: Vec<_> = plan
            .steps
            .iter()
            .map(|step| match step {
                PlanStep::Settled(outcome) => outcome.status.clone(),
                PlanStep::Commit(_) => panic!("unexpected commit"),
            })
            .collect();
        assert_eq!(statuses, vec![OutcomeStatus::Dropped; 4]);

        let report = plan.execute(&store);
        assert!(report.is_success());
        assert!(store.calls().is_empty());
    }

    #[test]
    fn children_of_planned_creates_use_created_identifiers() {
        let store = RecordingStore::default();
        let tree = load(
            json!([{"action": "CREATE", "workspace_identifier": "ws-1", "title": "Launch",
                    "tasks": [{"title": "Plan", "checklist": [{"title": "Book room"}]}]}]),
            &store,
        );
        let mut tracker = ResolutionTracker::new();
        for id in tree.walk() {
            tracker.resolve(&tree, id, true, None);
        }

        let plan = plan(&tree, &tracker);
        assert_eq!(plan.commits(), 3);
        let report = plan.execute(&store);

        assert!(report.is_success());
        assert_eq!(report.created(), 3);
        assert_eq!(
            store.calls(),
            vec![
                Call::CreateInitiative("Launch".to_string()),
                Call::CreateTask("I-1".to_string(), "Plan".to_string()),
                Call::CreateChecklistItem("T-1".to_string(), "Book room".to_string()),
            ]
        );
    }

    #[test]
    fn invalid_override_fails_only_that_entity() {
        let store = RecordingStore::with_initiatives(vec![initiative("I-1", "Old", Vec::new())]);
        let tree = load(
            json!([
                {"action": "UPDATE", "identifier": "I-1", "status": "DONE"},
                {"action": "CREATE", "workspace_identifier": "ws-1", "title": "Other"},
            ]),
            &store,
        );
        let mut tracker = ResolutionTracker::new();
        let status = tree.lookup("initiative.I-1.status").unwrap();
        tracker.resolve(&tree, status, true, Some(json!("SOMETIME")));
        resolve(&tree, &mut tracker, "initiative.new-other", true);

        let report = plan(&tree, &tracker).execute(&store);

        assert_eq!(report.failures().count(), 1);
        assert!(matches!(
            report.outcomes[0].status,
            OutcomeStatus::Failed {
                reason: CommitFailure::InvalidValue { .. }
            }
        ));
        assert_eq!(report.created(), 1);
    }

    #[test]
    fn stale_entities_fail_with_not_found() {
        let store = RecordingStore::with_initiatives(vec![initiative(
            "I-1",
            "Init",
            vec![task("T-5", "I-1", "Doomed")],
        )]);
        let tree = load(
            json!([{"action": "UPDATE", "identifier": "I-1", "tasks": [
                {"action": "DELETE", "identifier": "T-5"}
            ]}]),
            &store,
        );
        let mut tracker = ResolutionTracker::new();
        resolve(&tree, &mut tracker, "initiative.I-1.tasks.T-5", true);
        store.remove_initiative("I-1");

        let report = plan(&tree, &tracker).execute(&store);

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|outcome| matches!(
            outcome.status,
            OutcomeStatus::Failed {
                reason: CommitFailure::NotFound { .. }
            }
        )));
    }

    #[test]
    fn update_with_only_rejected_fields_and_children_is_dropped() {
        let store = RecordingStore::with_initiatives(vec![initiative("I-1", "Old", Vec::new())]);
        let tree = load(
            json!([{"action": "UPDATE", "identifier": "I-1", "title": "New"}]),
            &store,
        );
        let mut tracker = ResolutionTracker::new();
        resolve(&tree, &mut tracker, "initiative.I-1", false);

        let report = plan(&tree, &tracker).execute(&store);

        assert_eq!(report.dropped(), 1);
        assert!(store.calls().is_empty());
    }
}
