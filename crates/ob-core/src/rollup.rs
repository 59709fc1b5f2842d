//! Prefix rollups over the suggestion tree.

use crate::tracker::ResolutionTracker;
use crate::tree::{NodeId, SuggestionTree};
use crate::types::ResolutionSummary;

/// Nodes under `prefix` that carry a decision of their own.
pub fn decision_set(tree: &SuggestionTree, prefix: &str) -> Vec<NodeId> {
    tree.matching(prefix)
        .into_iter()
        .filter(|id| tree.get(*id).is_some_and(|s| !s.is_container()))
        .collect()
}

/// True iff at least one decision exists under `prefix` and all of them are
/// resolved. An empty set is not resolved.
pub fn is_fully_resolved(tree: &SuggestionTree, tracker: &ResolutionTracker, prefix: &str) -> bool {
    let set = decision_set(tree, prefix);
    !set.is_empty()
        && set
            .iter()
            .all(|id| tracker.state(tree, *id).is_resolved)
}

pub fn summary(tree: &SuggestionTree, tracker: &ResolutionTracker, prefix: &str) -> ResolutionSummary {
    let mut summary = ResolutionSummary::default();
    for id in decision_set(tree, prefix) {
        let state = tracker.state(tree, id);
        summary.total += 1;
        if state.is_resolved {
            summary.resolved += 1;
            if state.is_accepted {
                summary.accepted += 1;
            } else {
                summary.rejected += 1;
            }
        }
    }
    summary
}

/// Paths under `prefix` that still need a decision.
pub fn unresolved_paths(tree: &SuggestionTree, tracker: &ResolutionTracker, prefix: &str) -> Vec<String> {
    decision_set(tree, prefix)
        .into_iter()
        .filter(|id| !tracker.state(tree, *id).is_resolved)
        .filter_map(|id| tree.get(id).map(|s| s.path.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Change, EntityKey, EntityKind, EntityRef, Field, InitiativeId, TaskId};
    use serde_json::json;

    fn build() -> (SuggestionTree, NodeId, NodeId, NodeId) {
        let initiative =
            EntityKey::Existing(EntityRef::Initiative(InitiativeId::new("I-1".to_string()).unwrap()));
        let mut tree = SuggestionTree::new();
        let root = tree
            .insert(
                None,
                EntityKind::Initiative,
                initiative.clone(),
                Change::Update {
                    original: None,
                    suggested: json!({"title": "x"}),
                },
            )
            .unwrap();
        let title = tree
            .insert(
                Some(root),
                EntityKind::Initiative,
                initiative,
                Change::Field {
                    field: Field::Title,
                    original: None,
                    suggested: json!("x"),
                },
            )
            .unwrap();
        let task = tree
            .insert(
                Some(root),
                EntityKind::Task,
                EntityKey::Existing(EntityRef::Task(TaskId::new("T-1".to_string()).unwrap())),
                Change::Delete { original: None },
            )
            .unwrap();
        (tree, root, title, task)
    }

    #[test]
    fn containers_are_not_part_of_the_decision_set() {
        let (tree, _, title, task) = build();
        assert_eq!(decision_set(&tree, "initiative.I-1"), vec![title, task]);
        assert_eq!(decision_set(&tree, "initiative.I-1.tasks.T-1"), vec![task]);
    }

    #[test]
    fn empty_set_is_not_fully_resolved() {
        let (tree, _, _, _) = build();
        let tracker = ResolutionTracker::new();
        assert!(!is_fully_resolved(&tree, &tracker, "initiative.I-404"));
        assert!(!is_fully_resolved(
            &SuggestionTree::new(),
            &tracker,
            ""
        ));
    }

    #[test]
    fn rollup_tracks_every_decision() {
        let (tree, _, title, task) = build();
        let mut tracker = ResolutionTracker::new();

        tracker.resolve(&tree, title, false, None);
        assert!(!is_fully_resolved(&tree, &tracker, "initiative.I-1"));
        assert_eq!(
            unresolved_paths(&tree, &tracker, ""),
            vec!["initiative.I-1.tasks.T-1".to_string()]
        );

        tracker.resolve(&tree, task, true, None);
        assert!(is_fully_resolved(&tree, &tracker, "initiative.I-1"));
        assert_eq!(
            summary(&tree, &tracker, "initiative"),
            ResolutionSummary {
                total: 2,
                resolved: 2,
                accepted: 1,
                rejected: 1,
            }
        );

        tracker.rollback(&tree, task);
        assert!(!is_fully_resolved(&tree, &tracker, "initiative.I-1"));
    }
}
