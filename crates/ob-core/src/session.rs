//! The editing session: one suggestion tree, its decisions, and the save
//! lifecycle.

use crate::commit::{self, OutcomeStatus, SavePlan, SaveReport};
use crate::derive::derive;
use crate::error::{BacklogError, SuggestionError};
use crate::job::{job_digest, parse_job};
use crate::rollup;
use crate::store::Store;
use crate::tracker::ResolutionTracker;
use crate::tree::{NodeId, SuggestionTree};
use crate::types::{
    AiJobResult, BulkDecision, EntityKey, EventBody, Initiative, ResolutionState,
    ResolutionSummary, SkippedEntry, Suggestion, SuggestionKind,
};
use ob_events::{EventBus, EventRecord, EventSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Where the current suggestions came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSource {
    /// Hex SHA-256 of the job result.
    pub digest: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRecord {
    pub parent: Option<String>,
    pub suggestion: Suggestion,
}

/// Serializable form of a session, used to carry it between CLI runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub source: Option<SessionSource>,
    #[serde(default)]
    pub skipped: Vec<SkippedEntry>,
    #[serde(default)]
    pub suggestions: Vec<SuggestionRecord>,
    #[serde(default)]
    pub resolutions: BTreeMap<String, ResolutionState>,
    #[serde(default)]
    pub committed: Vec<String>,
}

pub struct SuggestionSession {
    tree: SuggestionTree,
    tracker: ResolutionTracker,
    source: Option<SessionSource>,
    skipped: Vec<SkippedEntry>,
    saving: bool,
    events: Option<EventBus>,
    event_source: EventSource,
    seq: i64,
}

impl Default for SuggestionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionSession {
    pub fn new() -> Self {
        Self {
            tree: SuggestionTree::new(),
            tracker: ResolutionTracker::new(),
            source: None,
            skipped: Vec::new(),
            saving: false,
            events: None,
            event_source: EventSource::Cli,
            seq: 0,
        }
    }

    pub fn with_events(mut self, bus: EventBus, source: EventSource) -> Self {
        self.events = Some(bus);
        self.event_source = source;
        self
    }

    /// Replaces the whole session with suggestions derived from `job`.
    ///
    /// Returns the number of suggestions. Entries that cannot be used are
    /// listed in [`Self::skipped`].
    pub fn load_job(
        &mut self,
        job: &AiJobResult,
        live: &[Initiative],
    ) -> Result<usize, BacklogError> {
        if self.saving {
            return Err(SuggestionError::SaveInProgress.into());
        }
        let parsed = parse_job(job)?;
        let derived = derive(&parsed, live);
        let mut skipped = parsed.skipped;
        skipped.extend(derived.skipped);

        let digest = job_digest(job);
        self.tree = derived.tree;
        self.tracker = ResolutionTracker::new();
        self.skipped = skipped;
        self.source = Some(SessionSource {
            digest: digest.clone(),
            message: parsed.message,
        });

        tracing::info!(
            digest = %digest,
            suggestions = self.tree.len(),
            skipped = self.skipped.len(),
            "loaded ai job result"
        );
        self.publish(EventBody::SuggestionsLoaded {
            digest,
            suggestions: self.tree.len(),
            skipped: self.skipped.clone(),
        });
        Ok(self.tree.len())
    }

    pub fn source(&self) -> Option<&SessionSource> {
        self.source.as_ref()
    }

    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn suggestion(&self, path: &str) -> Option<&Suggestion> {
        self.tree.lookup(path).and_then(|id| self.tree.get(id))
    }

    /// Every suggestion, parents before children.
    pub fn suggestions(&self) -> Vec<&Suggestion> {
        self.suggestions_under("")
    }

    pub fn suggestions_under(&self, prefix: &str) -> Vec<&Suggestion> {
        self.tree
            .matching(prefix)
            .into_iter()
            .filter_map(|id| self.tree.get(id))
            .collect()
    }

    pub fn entity_suggestions(&self) -> Vec<&Suggestion> {
        self.suggestions_of(SuggestionKind::Entity)
    }

    pub fn field_suggestions(&self) -> Vec<&Suggestion> {
        self.suggestions_of(SuggestionKind::Field)
    }

    fn suggestions_of(&self, kind: SuggestionKind) -> Vec<&Suggestion> {
        self.suggestions()
            .into_iter()
            .filter(|suggestion| suggestion.kind() == kind)
            .collect()
    }

    /// Never fails: unknown paths read as unresolved.
    pub fn resolution_state(&self, path: &str) -> ResolutionState {
        self.tree
            .lookup(path)
            .map(|id| self.tracker.state(&self.tree, id))
            .unwrap_or_default()
    }

    pub fn is_committed(&self, path: &str) -> bool {
        self.tree
            .lookup(path)
            .is_some_and(|id| self.tracker.is_committed(id))
    }

    /// Records a decision for `path`. Unknown paths are ignored and return
    /// `false`.
    pub fn resolve(&mut self, path: &str, accepted: bool) -> bool {
        self.resolve_value(path, accepted, None)
    }

    /// Like [`Self::resolve`], committing `value` instead of the suggested
    /// value when accepted.
    pub fn resolve_with(&mut self, path: &str, accepted: bool, value: Value) -> bool {
        self.resolve_value(path, accepted, Some(value))
    }

    fn resolve_value(&mut self, path: &str, accepted: bool, value: Option<Value>) -> bool {
        let Some(id) = self.tree.lookup(path) else {
            tracing::debug!(path, "ignoring resolve for unknown path");
            return false;
        };
        if !self.tracker.resolve(&self.tree, id, accepted, value) {
            return false;
        }
        self.publish(EventBody::SuggestionResolved {
            path: path.to_string(),
            accepted,
        });
        true
    }

    pub fn rollback(&mut self, path: &str) -> bool {
        let Some(id) = self.tree.lookup(path) else {
            tracing::debug!(path, "ignoring rollback for unknown path");
            return false;
        };
        if !self.tracker.rollback(&self.tree, id) {
            return false;
        }
        self.publish(EventBody::SuggestionRolledBack {
            path: path.to_string(),
        });
        true
    }

    pub fn is_fully_resolved(&self, prefix: &str) -> bool {
        rollup::is_fully_resolved(&self.tree, &self.tracker, prefix)
    }

    pub fn summary(&self, prefix: &str) -> ResolutionSummary {
        rollup::summary(&self.tree, &self.tracker, prefix)
    }

    pub fn unresolved_paths(&self, prefix: &str) -> Vec<String> {
        rollup::unresolved_paths(&self.tree, &self.tracker, prefix)
    }

    pub fn accept_all(&mut self, prefix: &str) -> usize {
        self.bulk(prefix, BulkDecision::Accept)
    }

    pub fn reject_all(&mut self, prefix: &str) -> usize {
        self.bulk(prefix, BulkDecision::Reject)
    }

    pub fn rollback_all(&mut self, prefix: &str) -> usize {
        self.bulk(prefix, BulkDecision::Rollback)
    }

    /// Applies one decision to every decision node under `prefix` and
    /// publishes a single event for the batch.
    fn bulk(&mut self, prefix: &str, decision: BulkDecision) -> usize {
        let mut count = 0;
        for id in rollup::decision_set(&self.tree, prefix) {
            let changed = match decision {
                BulkDecision::Accept => self.tracker.resolve(&self.tree, id, true, None),
                BulkDecision::Reject => self.tracker.resolve(&self.tree, id, false, None),
                BulkDecision::Rollback => self.tracker.rollback(&self.tree, id),
            };
            if changed {
                count += 1;
            }
        }
        tracing::debug!(prefix, ?decision, count, "bulk resolution");
        self.publish(EventBody::BulkResolved {
            prefix: prefix.to_string(),
            decision,
            count,
        });
        count
    }

    /// Plans the save and marks the session as saving.
    ///
    /// Every uncommitted decision must be made first. A second call before
    /// [`Self::finish_save`] or [`Self::abort_save`] is an error.
    pub fn begin_save(&mut self) -> Result<SavePlan, SuggestionError> {
        if self.saving {
            return Err(SuggestionError::SaveInProgress);
        }
        let paths = self.unresolved_paths("");
        if !paths.is_empty() {
            return Err(SuggestionError::Unresolved { paths });
        }

        let plan = commit::plan(&self.tree, &self.tracker);
        self.saving = true;
        self.publish(EventBody::SaveStarted {
            commits: plan.commits(),
        });
        Ok(plan)
    }

    /// Applies the outcome of an executed plan.
    ///
    /// A fully successful save empties the session. Otherwise entities that
    /// were committed or dropped are settled (created drafts take their real
    /// identifier) and failed ones keep their decisions for a retry.
    pub fn finish_save(&mut self, report: &SaveReport) -> Result<(), SuggestionError> {
        if !self.saving {
            return Err(SuggestionError::NotSaving);
        }
        self.saving = false;

        if report.is_success() {
            tracing::info!(outcomes = report.outcomes.len(), "save completed");
            self.reset();
        } else {
            for outcome in &report.outcomes {
                match &outcome.status {
                    OutcomeStatus::Created { entity } => {
                        let key = EntityKey::Existing(entity.clone());
                        if let Err(err) = self.tree.rekey(outcome.node, key) {
                            tracing::warn!(
                                path = %outcome.path,
                                %entity,
                                error = %err,
                                "created entity keeps its draft path"
                            );
                        }
                        self.settle(outcome.node);
                    }
                    OutcomeStatus::Updated { .. }
                    | OutcomeStatus::Deleted { .. }
                    | OutcomeStatus::Dropped => self.settle(outcome.node),
                    OutcomeStatus::Failed { reason } => {
                        tracing::warn!(path = %outcome.path, reason = %reason, "suggestion not saved");
                    }
                }
            }
        }

        self.publish(EventBody::SaveCompleted {
            report: report.clone(),
        });
        Ok(())
    }

    /// Releases the saving flag without touching any decision.
    pub fn abort_save(&mut self) {
        self.saving = false;
    }

    /// Plans, executes and finishes a save in one call.
    pub fn save_suggestions<S: Store>(&mut self, store: &S) -> Result<SaveReport, BacklogError> {
        let plan = self.begin_save()?;
        let report = plan.execute(store);
        self.finish_save(&report)?;
        Ok(report)
    }

    pub fn clear(&mut self) -> Result<(), SuggestionError> {
        if self.saving {
            return Err(SuggestionError::SaveInProgress);
        }
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.tree = SuggestionTree::new();
        self.tracker.clear();
        self.skipped.clear();
        self.source = None;
        self.publish(EventBody::SessionCleared);
    }

    fn settle(&mut self, node: NodeId) {
        self.tracker.mark_committed(node);
        let fields: Vec<NodeId> = self.tree.fields_of(node).collect();
        for field in fields {
            self.tracker.mark_committed(field);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let path_of = |id: NodeId| self.tree.get(id).map(|s| s.path.clone());
        let suggestions = self
            .tree
            .walk()
            .into_iter()
            .filter_map(|id| {
                Some(SuggestionRecord {
                    parent: self.tree.parent(id).and_then(path_of),
                    suggestion: self.tree.get(id)?.clone(),
                })
            })
            .collect();
        let resolutions = self
            .tracker
            .decisions()
            .filter_map(|(id, state)| Some((path_of(id)?, state.clone())))
            .collect();
        let committed = self.tracker.committed().filter_map(path_of).collect();

        SessionSnapshot {
            source: self.source.clone(),
            skipped: self.skipped.clone(),
            suggestions,
            resolutions,
            committed,
        }
    }

    /// Rebuilds a session from a snapshot. Records must list parents before
    /// their children.
    pub fn restore(snapshot: SessionSnapshot) -> Result<Self, SuggestionError> {
        let mut session = Self::new();
        for record in snapshot.suggestions {
            let parent = match &record.parent {
                Some(path) => Some(session.tree.lookup(path).ok_or_else(|| {
                    SuggestionError::InvalidSnapshot {
                        message: format!("unknown parent {path}"),
                    }
                })?),
                None => None,
            };
            let Suggestion {
                path,
                entity,
                key,
                change,
            } = record.suggestion;
            let id = session
                .tree
                .insert(parent, entity, key, change)
                .map_err(|err| SuggestionError::InvalidSnapshot {
                    message: err.to_string(),
                })?;
            if session.tree.get(id).is_none_or(|s| s.path != path) {
                return Err(SuggestionError::InvalidSnapshot {
                    message: format!("path {path} does not match its position"),
                });
            }
        }

        for (path, state) in snapshot.resolutions {
            let id = session.lookup_snapshot_path(&path)?;
            session.tracker.restore(id, state);
        }
        for path in snapshot.committed {
            let id = session.lookup_snapshot_path(&path)?;
            session.tracker.mark_committed(id);
        }
        session.source = snapshot.source;
        session.skipped = snapshot.skipped;
        Ok(session)
    }

    fn lookup_snapshot_path(&self, path: &str) -> Result<NodeId, SuggestionError> {
        self.tree
            .lookup(path)
            .ok_or_else(|| SuggestionError::InvalidSnapshot {
                message: format!("unknown path {path}"),
            })
    }

    fn publish(&mut self, body: EventBody) {
        let Some(bus) = &self.events else {
            return;
        };
        let value = match serde_json::to_value(&body) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(error = %err, "failed to encode session event");
                return;
            }
        };
        self.seq += 1;
        let correlation_id = self.source.as_ref().map(|source| source.digest.clone());
        let record = EventRecord::new(self.seq, self.event_source, correlation_id, value);
        let _ = bus.publish(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::CommitFailure;
    use crate::initiatives::InitiativeRepository;
    use crate::test_support::{Call, RecordingStore, checklist_item, initiative, job, task};
    use crate::types::{Action, InitiativeFilter, UpdateInitiativeInput};
    use serde_json::json;

    fn session_for(entries: Value, store: &RecordingStore) -> SuggestionSession {
        let mut session = SuggestionSession::new();
        session.load_job(&job(entries), &store.snapshot()).unwrap();
        session
    }

    #[test]
    fn unknown_paths_read_as_default_and_ignore_decisions() {
        let store = RecordingStore::default();
        let mut session = session_for(json!([{"action": "DELETE", "identifier": "I-1"}]), &store);

        assert_eq!(
            session.resolution_state("initiative.I-404"),
            ResolutionState::default()
        );
        assert!(!session.resolve("initiative.I-404", true));
        assert!(!session.rollback("initiative.I-404"));
        assert!(!session.resolve_with("", true, json!(1)));
        assert_eq!(session.summary("").resolved, 0);
    }

    #[test]
    fn resolve_then_rollback_round_trips() {
        let store = RecordingStore::default();
        let mut session = session_for(json!([{"action": "DELETE", "identifier": "I-1"}]), &store);

        assert!(session.resolve("initiative.I-1", true));
        assert!(session.resolution_state("initiative.I-1").is_resolved);
        assert!(session.rollback("initiative.I-1"));
        assert_eq!(
            session.resolution_state("initiative.I-1"),
            ResolutionState::default()
        );
        assert!(session.suggestion("initiative.I-1").is_some());
    }

    #[test]
    fn overrides_become_the_resolved_value() {
        let store = RecordingStore::with_initiatives(vec![initiative("I-1", "Old", Vec::new())]);
        let mut session = session_for(
            json!([{"action": "UPDATE", "identifier": "I-1", "title": "Suggested"}]),
            &store,
        );

        assert!(session.resolve_with("initiative.I-1.title", true, json!("Hand edited")));
        assert_eq!(
            session.resolution_state("initiative.I-1.title").resolved_value,
            Some(json!("Hand edited"))
        );

        let report = session.save_suggestions(&store).unwrap();
        assert!(report.is_success());
        assert_eq!(
            store.calls(),
            vec![Call::UpdateInitiative(
                "I-1".to_string(),
                UpdateInitiativeInput {
                    title: Some("Hand edited".to_string()),
                    ..UpdateInitiativeInput::default()
                }
            )]
        );
    }

    #[test]
    fn empty_prefix_set_is_never_fully_resolved() {
        let session = SuggestionSession::new();
        assert!(!session.is_fully_resolved(""));
        assert!(!session.is_fully_resolved("initiative"));
    }

    #[test]
    fn accept_all_resolves_everything_under_the_prefix() {
        let store = RecordingStore::with_initiatives(vec![initiative(
            "I-2",
            "Two",
            vec![task("T-1", "I-2", "Old")],
        )]);
        let mut session = session_for(
            json!([
                {"action": "CREATE", "workspace_identifier": "ws-1", "title": "One"},
                {"action": "UPDATE", "identifier": "I-2", "title": "Deux", "tasks": [
                    {"action": "UPDATE", "identifier": "T-1", "title": "New"}
                ]},
            ]),
            &store,
        );

        assert!(!session.is_fully_resolved("initiative.I-2"));
        assert_eq!(session.accept_all("initiative.I-2"), 2);
        assert!(session.is_fully_resolved("initiative.I-2"));
        assert!(!session.is_fully_resolved("initiative"));
        for suggestion in session.suggestions_under("initiative.I-2") {
            assert!(session.resolution_state(&suggestion.path).is_accepted);
        }

        session.reject_all("");
        assert!(session.is_fully_resolved(""));
        assert_eq!(session.summary("").rejected, 3);

        assert_eq!(session.rollback_all("initiative.I-2.tasks"), 1);
        assert!(!session.is_fully_resolved(""));
        assert!(session.is_fully_resolved("initiative.new-one"));
    }

    #[test]
    fn update_with_only_nested_changes_follows_its_children() {
        let store = RecordingStore::with_initiatives(vec![initiative("I-1", "Init", Vec::new())]);
        let mut session = session_for(
            json!([{"action": "UPDATE", "identifier": "I-1",
                    "tasks": [{"action": "CREATE", "title": "New"}]}]),
            &store,
        );

        assert!(!session.resolution_state("initiative.I-1").is_resolved);
        assert!(session.resolve("initiative.I-1", true));
        assert!(session.resolution_state("initiative.I-1").is_accepted);
        assert!(session.resolution_state("initiative.I-1.tasks.new-new").is_accepted);

        assert!(session.rollback("initiative.I-1"));
        assert!(!session.resolution_state("initiative.I-1").is_resolved);

        assert_eq!(session.accept_all(""), 1);
        for suggestion in session.suggestions_under("") {
            assert!(session.resolution_state(&suggestion.path).is_accepted);
        }

        let report = session.save_suggestions(&store).unwrap();
        assert!(report.is_success());
        assert_eq!(
            store.calls(),
            vec![
                Call::UpdateInitiative("I-1".to_string(), UpdateInitiativeInput::default()),
                Call::CreateTask("I-1".to_string(), "New".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_snapshot_entry_does_not_delete_its_task() {
        let store = RecordingStore::with_initiatives(vec![initiative(
            "I-1",
            "Init",
            vec![task("T-1", "I-1", "First"), task("T-2", "I-1", "Second")],
        )]);
        let mut session = session_for(
            json!([{"action": "UPDATE", "identifier": "I-1", "tasks": [
                {"identifier": "T-1", "status": "BOGUS"},
                {"identifier": "T-2", "title": "Renamed"},
            ]}]),
            &store,
        );

        assert_eq!(session.skipped().len(), 1);
        assert!(session.suggestion("initiative.I-1.tasks.T-1").is_none());

        session.accept_all("");
        let report = session.save_suggestions(&store).unwrap();

        assert!(report.is_success());
        assert!(!store.calls().contains(&Call::DeleteTask("T-1".to_string())));
        let stored = (&store)
            .list(InitiativeFilter::default())
            .unwrap()
            .remove(0);
        assert_eq!(stored.tasks.len(), 2);
    }

    #[test]
    fn entity_and_field_suggestions_are_separable() {
        let store = RecordingStore::with_initiatives(vec![initiative("I-1", "Old", Vec::new())]);
        let session = session_for(
            json!([{"action": "UPDATE", "identifier": "I-1", "title": "New", "status": "DONE"}]),
            &store,
        );
        let entities: Vec<_> = session
            .entity_suggestions()
            .iter()
            .map(|s| s.path.as_str())
            .collect();
        let fields: Vec<_> = session
            .field_suggestions()
            .iter()
            .map(|s| s.path.as_str())
            .collect();
        assert_eq!(entities, vec!["initiative.I-1"]);
        assert_eq!(fields, vec!["initiative.I-1.title", "initiative.I-1.status"]);
    }

    #[test]
    fn accepted_create_and_delete_commit_and_clear_the_session() {
        let store = RecordingStore::with_initiatives(vec![initiative("I-247", "Old", Vec::new())]);
        let mut session = session_for(
            json!([
                {"action": "CREATE", "workspace_identifier": "ws-1", "title": "New dashboard analytics"},
                {"action": "DELETE", "identifier": "I-247"},
            ]),
            &store,
        );

        session.accept_all("initiative");
        let report = session.save_suggestions(&store).unwrap();

        assert!(report.is_success());
        assert_eq!(report.created(), 1);
        assert_eq!(report.deleted(), 1);
        assert_eq!(
            store.calls(),
            vec![
                Call::CreateInitiative("New dashboard analytics".to_string()),
                Call::DeleteInitiative("I-247".to_string()),
            ]
        );
        assert!(session.is_empty());
        assert!(session.source().is_none());
        assert!(!session.is_saving());
    }

    #[test]
    fn rejected_field_keeps_original_while_accepted_task_is_created() {
        let store = RecordingStore::with_initiatives(vec![initiative("I-245", "Original", Vec::new())]);
        let mut session = session_for(
            json!([{"action": "UPDATE", "identifier": "I-245", "title": "Renamed",
                    "tasks": [{"action": "CREATE", "title": "Write migration"}]}]),
            &store,
        );

        assert!(session.resolve("initiative.I-245.title", false));
        assert!(session.resolve("initiative.I-245.tasks.new-write-migration", true));
        assert!(session.is_fully_resolved("initiative.I-245"));

        let report = session.save_suggestions(&store).unwrap();

        assert!(report.is_success());
        assert_eq!(
            store.calls(),
            vec![
                Call::UpdateInitiative("I-245".to_string(), UpdateInitiativeInput::default()),
                Call::CreateTask("I-245".to_string(), "Write migration".to_string()),
            ]
        );
        let stored = (&store)
            .list(InitiativeFilter::default())
            .unwrap()
            .remove(0);
        assert_eq!(stored.title, "Original");
        assert_eq!(stored.tasks.len(), 1);
    }

    #[test]
    fn new_job_replaces_previous_decisions() {
        let store = RecordingStore::default();
        let entries = json!([{"action": "DELETE", "identifier": "I-1"}]);
        let mut session = session_for(entries.clone(), &store);
        session.resolve("initiative.I-1", true);

        session.load_job(&job(entries), &store.snapshot()).unwrap();

        assert_eq!(
            session.resolution_state("initiative.I-1"),
            ResolutionState::default()
        );
        assert!(!session.is_fully_resolved(""));
    }

    #[test]
    fn second_save_while_saving_is_an_error() {
        let store = RecordingStore::default();
        let mut session = session_for(json!([{"action": "DELETE", "identifier": "I-1"}]), &store);
        session.reject_all("");

        let plan = session.begin_save().unwrap();
        assert!(session.is_saving());
        assert!(matches!(
            session.begin_save(),
            Err(SuggestionError::SaveInProgress)
        ));
        assert!(session.load_job(&job(json!([])), &[]).is_err());
        assert!(session.clear().is_err());

        let report = plan.execute(&store);
        session.finish_save(&report).unwrap();
        assert!(!session.is_saving());
        assert!(matches!(
            session.finish_save(&report),
            Err(SuggestionError::NotSaving)
        ));
    }

    #[test]
    fn unresolved_decisions_block_the_save() {
        let store = RecordingStore::default();
        let mut session = session_for(
            json!([
                {"action": "DELETE", "identifier": "I-1"},
                {"action": "DELETE", "identifier": "I-2"},
            ]),
            &store,
        );
        session.resolve("initiative.I-1", false);

        match session.save_suggestions(&store) {
            Err(BacklogError::Suggestion(SuggestionError::Unresolved { paths })) => {
                assert_eq!(paths, vec!["initiative.I-2".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!session.is_saving());
    }

    #[test]
    fn partial_failure_settles_successes_and_keeps_failures() {
        let store = RecordingStore::with_initiatives(vec![initiative("I-3", "Three", Vec::new())]);
        store.fail_title("Broken");
        let mut session = session_for(
            json!([
                {"action": "CREATE", "workspace_identifier": "ws-1", "title": "Fine",
                 "tasks": [{"title": "Child"}]},
                {"action": "CREATE", "workspace_identifier": "ws-1", "title": "Broken"},
                {"action": "DELETE", "identifier": "I-3"},
            ]),
            &store,
        );
        session.accept_all("");

        let report = session.save_suggestions(&store).unwrap();

        assert!(!report.is_success());
        let failed: Vec<_> = report.failures().map(|o| o.path.as_str()).collect();
        assert_eq!(failed, vec!["initiative.new-broken"]);
        assert!(matches!(
            report.failures().next().unwrap().status,
            OutcomeStatus::Failed {
                reason: CommitFailure::Store { .. }
            }
        ));

        // Committed drafts now carry their stored identifier.
        assert!(session.suggestion("initiative.new-fine").is_none());
        assert!(session.is_committed("initiative.I-4"));
        assert!(session.is_committed("initiative.I-4.tasks.T-1"));
        assert!(session.is_committed("initiative.I-3"));
        assert!(!session.is_committed("initiative.new-broken"));
        assert!(session.resolution_state("initiative.new-broken").is_accepted);

        store.heal();
        let calls_before = store.calls().len();
        let retry = session.save_suggestions(&store).unwrap();

        assert!(retry.is_success());
        assert_eq!(retry.outcomes.len(), 1);
        assert_eq!(store.calls().len(), calls_before + 1);
        assert!(session.is_empty());
    }

    #[test]
    fn created_entity_keeps_draft_path_when_its_identifier_is_taken() {
        let store = RecordingStore::default();
        let mut session = session_for(
            json!([
                {"action": "DELETE", "identifier": "I-1"},
                {"action": "CREATE", "workspace_identifier": "ws-1", "title": "Launch"},
            ]),
            &store,
        );
        session.accept_all("");

        let report = session.save_suggestions(&store).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.created(), 1);
        assert!(session.is_committed("initiative.new-launch"));
        assert_eq!(
            session.suggestion("initiative.I-1").and_then(Suggestion::action),
            Some(Action::Delete)
        );
        assert!(!session.is_committed("initiative.I-1"));
        assert!(session.resolution_state("initiative.I-1").is_accepted);
    }

    #[test]
    fn checklist_snapshot_lists_delete_missing_items() {
        let mut live_task = task("T-1", "I-1", "Task");
        live_task.checklist = vec![checklist_item("T-1", "keep"), checklist_item("T-1", "drop")];
        let keep = live_task.checklist[0].id.clone();
        let dropped = live_task.checklist[1].id.clone();
        let store = RecordingStore::with_initiatives(vec![initiative("I-1", "Init", vec![live_task])]);
        let mut session = session_for(
            json!([{"action": "UPDATE", "identifier": "I-1", "tasks": [
                {"action": "UPDATE", "identifier": "T-1", "checklist": [
                    {"id": keep.as_str(), "title": "keep", "is_complete": true},
                ]},
            ]}]),
            &store,
        );

        let base = "initiative.I-1.tasks.T-1.checklist";
        assert!(session.suggestion(&format!("{base}.{keep}.is_complete")).is_some());
        assert!(session.suggestion(&format!("{base}.{dropped}")).is_some());

        session.accept_all("");
        let report = session.save_suggestions(&store).unwrap();
        assert!(report.is_success());
        assert!(store.calls().contains(&Call::DeleteChecklistItem(dropped.to_string())));
    }

    #[test]
    fn snapshots_restore_tree_and_decisions() {
        let store = RecordingStore::with_initiatives(vec![initiative("I-1", "Old", Vec::new())]);
        let mut session = session_for(
            json!([
                {"action": "UPDATE", "identifier": "I-1", "title": "New",
                 "tasks": [{"action": "CREATE", "title": "Child"}]},
                {"bogus": true},
            ]),
            &store,
        );
        session.resolve_with("initiative.I-1.title", true, json!("Edited"));

        let encoded = serde_json::to_string(&session.snapshot()).unwrap();
        let restored =
            SuggestionSession::restore(serde_json::from_str(&encoded).unwrap()).unwrap();

        assert_eq!(restored.snapshot(), session.snapshot());
        assert_eq!(restored.skipped().len(), 1);
        assert_eq!(
            restored.resolution_state("initiative.I-1.title").resolved_value,
            Some(json!("Edited"))
        );
        assert!(!restored.is_fully_resolved("initiative.I-1"));
    }

    #[test]
    fn restore_rejects_orphaned_records() {
        let snapshot = SessionSnapshot {
            suggestions: vec![SuggestionRecord {
                parent: Some("initiative.I-9".to_string()),
                suggestion: Suggestion {
                    path: "initiative.I-9.title".to_string(),
                    entity: crate::types::EntityKind::Initiative,
                    key: EntityKey::Existing(crate::types::EntityRef::Initiative(
                        crate::types::InitiativeId::new("I-9".to_string()).unwrap(),
                    )),
                    change: crate::types::Change::Field {
                        field: crate::types::Field::Title,
                        original: None,
                        suggested: json!("x"),
                    },
                },
            }],
            ..SessionSnapshot::default()
        };
        assert!(matches!(
            SuggestionSession::restore(snapshot),
            Err(SuggestionError::InvalidSnapshot { .. })
        ));
    }

    #[test]
    fn session_events_reach_subscribers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let store = RecordingStore::default();
        let mut session = SuggestionSession::new().with_events(bus, EventSource::Test);

        session
            .load_job(&job(json!([{"action": "DELETE", "identifier": "I-1"}])), &[])
            .unwrap();
        session.accept_all("");
        session.save_suggestions(&store).unwrap();

        let mut kinds = Vec::new();
        while let Ok(record) = rx.try_recv() {
            kinds.push(record.kind().unwrap_or_default().to_string());
        }
        assert_eq!(
            kinds,
            vec![
                "SuggestionsLoaded",
                "BulkResolved",
                "SaveStarted",
                "SessionCleared",
                "SaveCompleted",
            ]
        );
    }
}
