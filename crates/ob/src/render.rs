use ob_core::SuggestionSession;
use ob_core::commit::{OutcomeStatus, SaveReport};
use ob_core::types::Suggestion;
use owo_colors::{OwoColorize, Stream};
use serde_json::Value;
use std::fmt::Write;

const VALUE_WIDTH: usize = 40;

fn label(session: &SuggestionSession, path: &str) -> String {
    if session.is_committed(path) {
        let text = format!("{:<8}", "saved");
        return text
            .if_supports_color(Stream::Stdout, |t| t.dimmed())
            .to_string();
    }
    let state = session.resolution_state(path);
    if !state.is_resolved {
        let text = format!("{:<8}", "pending");
        return text
            .if_supports_color(Stream::Stdout, |t| t.yellow())
            .to_string();
    }
    if state.is_accepted {
        let text = format!("{:<8}", "accepted");
        text.if_supports_color(Stream::Stdout, |t| t.green())
            .to_string()
    } else {
        let text = format!("{:<8}", "rejected");
        text.if_supports_color(Stream::Stdout, |t| t.red())
            .to_string()
    }
}

fn short(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => "(none)".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    if text.chars().count() > VALUE_WIDTH {
        let cut: String = text.chars().take(VALUE_WIDTH - 1).collect();
        format!("{cut}…")
    } else {
        text
    }
}

fn describe(suggestion: &Suggestion) -> String {
    if let Some(action) = suggestion.action() {
        return format!("{action} {}", suggestion.entity);
    }
    format!(
        "{} -> {}",
        short(suggestion.original_value()),
        short(suggestion.suggested_value())
    )
}

pub fn loaded(session: &SuggestionSession) -> String {
    let mut out = String::new();
    let digest = session
        .source()
        .map(|source| source.digest.chars().take(12).collect::<String>())
        .unwrap_or_default();
    let _ = writeln!(out, "loaded {} suggestion(s) from job {digest}", session.len());
    if let Some(message) = session.source().and_then(|source| source.message.as_deref()) {
        let _ = writeln!(out, "  {message}");
    }
    for entry in session.skipped() {
        let _ = writeln!(
            out,
            "{} {}: {}",
            "skipped".if_supports_color(Stream::Stdout, |t| t.yellow()),
            entry.location,
            entry.reason
        );
    }
    out
}

pub fn suggestions(session: &SuggestionSession, prefix: &str) -> String {
    let listed = session.suggestions_under(prefix);
    if listed.is_empty() {
        return "no suggestions\n".to_string();
    }
    let mut out = String::new();
    for suggestion in listed {
        let _ = writeln!(
            out,
            "{} {}  {}",
            label(session, &suggestion.path),
            suggestion.path,
            describe(suggestion)
        );
    }
    out
}

pub fn state_line(session: &SuggestionSession, path: &str) -> String {
    format!("{} {path}\n", label(session, path))
}

pub fn bulk(verb: &str, count: usize) -> String {
    format!("{verb} {count} suggestion(s)\n")
}

pub fn status(session: &SuggestionSession, prefix: &str) -> String {
    let summary = session.summary(prefix);
    let mut out = format!(
        "{} decided of {} ({} accepted, {} rejected, {} pending)\n",
        summary.resolved,
        summary.total,
        summary.accepted,
        summary.rejected,
        summary.pending()
    );
    if session.is_fully_resolved(prefix) {
        let _ = writeln!(
            out,
            "{}",
            "ready to save".if_supports_color(Stream::Stdout, |t| t.green())
        );
    } else {
        for path in session.unresolved_paths(prefix) {
            let _ = writeln!(out, "  pending {path}");
        }
    }
    out
}

pub fn report(report: &SaveReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let line = match &outcome.status {
            OutcomeStatus::Created { entity } => format!("created {entity}"),
            OutcomeStatus::Updated { entity } => format!("updated {entity}"),
            OutcomeStatus::Deleted { entity } => format!("deleted {entity}"),
            OutcomeStatus::Dropped => "dropped".to_string(),
            OutcomeStatus::Failed { reason } => format!(
                "{} {reason}",
                "failed".if_supports_color(Stream::Stdout, |t| t.red())
            ),
        };
        let _ = writeln!(out, "{}: {line}", outcome.path);
    }
    let _ = writeln!(
        out,
        "{} created, {} updated, {} deleted, {} dropped, {} failed",
        report.created(),
        report.updated(),
        report.deleted(),
        report.dropped(),
        report.failures().count()
    );
    out
}
