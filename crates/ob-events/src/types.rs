use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub seq: i64,
    pub at: DateTime<Utc>,
    pub correlation_id: Option<String>,
    pub source: EventSource,
    pub body: Value,
}

impl EventRecord {
    pub fn new(seq: i64, source: EventSource, correlation_id: Option<String>, body: Value) -> Self {
        Self {
            id: format!("evt_{}", Ulid::new()),
            seq,
            at: Utc::now(),
            correlation_id,
            source,
            body,
        }
    }

    /// The `type` tag of the body, if the body is a tagged event.
    pub fn kind(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EventSource {
    Cli,
    Ui,
    Test,
}
