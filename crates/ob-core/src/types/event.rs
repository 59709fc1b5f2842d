use crate::commit::SaveReport;
use crate::types::job::SkippedEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BulkDecision {
    Accept,
    Reject,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventBody {
    SuggestionsLoaded {
        digest: String,
        suggestions: usize,
        skipped: Vec<SkippedEntry>,
    },
    SuggestionResolved {
        path: String,
        accepted: bool,
    },
    SuggestionRolledBack {
        path: String,
    },
    BulkResolved {
        prefix: String,
        decision: BulkDecision,
        count: usize,
    },
    SaveStarted {
        commits: usize,
    },
    SaveCompleted {
        report: SaveReport,
    },
    SessionCleared,
}
