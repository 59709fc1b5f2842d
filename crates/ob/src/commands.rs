use anyhow::{Context, Result, bail};
use clap::Subcommand;
use ob_core::config::BacklogConfig;
use ob_core::initiatives::InitiativeRepository;
use ob_core::job::parse_job_str;
use ob_core::store::Store;
use ob_core::types::InitiativeFilter;
use ob_core::{SessionSnapshot, SuggestionSession};
use ob_db::DbStore;
use ob_events::{EventBus, EventSource};
use serde_json::{Value, json};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::render;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a completed AI job result, replacing the current session
    Load { file: PathBuf },
    /// List suggestions under a path prefix
    List {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Accept one suggestion
    Accept {
        path: String,
        /// Replacement for the suggested value, as JSON
        #[arg(long)]
        value: Option<String>,
    },
    /// Reject one suggestion
    Reject { path: String },
    /// Undo the decision on one suggestion
    Rollback { path: String },
    /// Accept every suggestion under a prefix
    AcceptAll {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Reject every suggestion under a prefix
    RejectAll {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Undo every decision under a prefix
    RollbackAll {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Show how many suggestions are decided
    Status {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Apply accepted suggestions to the backlog database
    Save,
    /// Print one suggestion and its decision as JSON
    Show { path: String },
    /// Drop the current session without saving
    Clear,
}

pub struct Workspace {
    config: BacklogConfig,
    events: EventBus,
}

impl Workspace {
    pub fn new(config: BacklogConfig) -> Self {
        Self {
            config,
            events: EventBus::new(256),
        }
    }

    fn load_session(&self) -> Result<SuggestionSession> {
        let path = &self.config.session_path;
        let session = match fs::read_to_string(path) {
            Ok(content) => {
                let snapshot: SessionSnapshot = serde_json::from_str(&content)
                    .with_context(|| format!("failed to parse session {}", path.display()))?;
                SuggestionSession::restore(snapshot)?
            }
            Err(err) if err.kind() == ErrorKind::NotFound => SuggestionSession::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read session {}", path.display()));
            }
        };
        Ok(session.with_events(self.events.clone(), EventSource::Cli))
    }

    fn persist(&self, session: &SuggestionSession) -> Result<()> {
        let path = &self.config.session_path;
        if session.is_empty() && session.source().is_none() {
            return match fs::remove_file(path) {
                Err(err) if err.kind() != ErrorKind::NotFound => Err(err)
                    .with_context(|| format!("failed to remove session {}", path.display())),
                _ => Ok(()),
            };
        }
        ensure_parent(path)?;
        let json = serde_json::to_string_pretty(&session.snapshot())?;
        fs::write(path, json)
            .with_context(|| format!("failed to write session {}", path.display()))?;
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn open_store(path: &Path) -> Result<DbStore> {
    ensure_parent(path)?;
    let conn = ob_db::schema::open_and_migrate(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok(DbStore::new(conn))
}

fn decided(session: &SuggestionSession, path: &str, changed: bool) -> Result<String> {
    if !changed {
        bail!("no open suggestion at {path}");
    }
    Ok(render::state_line(session, path))
}

pub async fn execute(workspace: &Workspace, command: Command) -> Result<String> {
    let mut events = workspace.events.subscribe();
    let mut session = workspace.load_session()?;

    let output = match command {
        Command::Load { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let job = parse_job_str(&raw)?;
            let db_path = workspace.config.db_path.clone();
            let live = tokio::task::spawn_blocking(move || -> Result<_> {
                let store = open_store(&db_path)?;
                Ok(store.initiatives().list(InitiativeFilter::default())?)
            })
            .await??;
            session.load_job(&job, &live)?;
            render::loaded(&session)
        }
        Command::List { prefix } => render::suggestions(&session, &prefix),
        Command::Accept { path, value } => {
            let changed = match value {
                Some(raw) => {
                    let value: Value =
                        serde_json::from_str(&raw).context("--value must be valid JSON")?;
                    session.resolve_with(&path, true, value)
                }
                None => session.resolve(&path, true),
            };
            decided(&session, &path, changed)?
        }
        Command::Reject { path } => {
            let changed = session.resolve(&path, false);
            decided(&session, &path, changed)?
        }
        Command::Rollback { path } => {
            let changed = session.rollback(&path);
            decided(&session, &path, changed)?
        }
        Command::AcceptAll { prefix } => render::bulk("accepted", session.accept_all(&prefix)),
        Command::RejectAll { prefix } => render::bulk("rejected", session.reject_all(&prefix)),
        Command::RollbackAll { prefix } => {
            render::bulk("rolled back", session.rollback_all(&prefix))
        }
        Command::Status { prefix } => render::status(&session, &prefix),
        Command::Save => {
            if session.is_empty() {
                "nothing to save\n".to_string()
            } else {
                let db_path = workspace.config.db_path.clone();
                let (returned, report) = tokio::task::spawn_blocking(move || -> Result<_> {
                    let store = open_store(&db_path)?;
                    let report = session.save_suggestions(&store);
                    Ok((session, report))
                })
                .await??;
                session = returned;
                render::report(&report?)
            }
        }
        Command::Show { path } => {
            let suggestion = session
                .suggestion(&path)
                .with_context(|| format!("no suggestion at {path}"))?;
            let detail = json!({
                "suggestion": suggestion,
                "resolution": session.resolution_state(&path),
                "committed": session.is_committed(&path),
            });
            format!("{}\n", serde_json::to_string_pretty(&detail)?)
        }
        Command::Clear => {
            session.clear()?;
            "session cleared\n".to_string()
        }
    };

    workspace.persist(&session)?;
    while let Ok(record) = events.try_recv() {
        tracing::debug!(
            seq = record.seq,
            kind = record.kind().unwrap_or("unknown"),
            correlation_id = ?record.correlation_id,
            "session event"
        );
    }
    Ok(output)
}
