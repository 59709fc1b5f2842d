use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".openbacklog";
pub const CONFIG_FILE: &str = "config.toml";
pub const DB_PATH_ENV: &str = "OPENBACKLOG_DB_PATH";
pub const SESSION_PATH_ENV: &str = "OPENBACKLOG_SESSION_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacklogConfig {
    pub db_path: PathBuf,
    pub session_path: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            db_path: Path::new(CONFIG_DIR).join("backlog.db"),
            session_path: Path::new(CONFIG_DIR).join("session.json"),
            log_filter: "warn".to_string(),
        }
    }
}

impl BacklogConfig {
    /// Applies `OPENBACKLOG_*` overrides from `lookup` (usually `std::env::var`).
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(DB_PATH_ENV).filter(|v| !v.is_empty()) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(SESSION_PATH_ENV).filter(|v| !v.is_empty()) {
            self.session_path = PathBuf::from(path);
        }
        self
    }

    fn anchored(mut self, root: &Path) -> Self {
        if self.db_path.is_relative() {
            self.db_path = root.join(&self.db_path);
        }
        if self.session_path.is_relative() {
            self.session_path = root.join(&self.session_path);
        }
        self
    }
}

/// Loads `<root>/.openbacklog/config.toml`. A missing file yields the
/// defaults. Relative paths are resolved against `root`.
pub fn load_config(root: &Path) -> Result<BacklogConfig, ConfigError> {
    let path = root.join(CONFIG_DIR).join(CONFIG_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(BacklogConfig::default().anchored(root));
        }
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                message: err.to_string(),
            });
        }
    };
    let config: BacklogConfig = toml::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    Ok(config.anchored(root))
}
