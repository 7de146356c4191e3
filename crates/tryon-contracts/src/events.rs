use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::assets::{AssetRole, AssetSource};
use crate::models::ModelProfile;
use crate::runs::summary::now_utc_iso;
use crate::workflow::{ProcessingStage, WorkflowState};

/// Everything a session records in `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        run_dir: String,
        text_model: String,
        image_model: String,
    },
    ModelFallback {
        profile: ModelProfile,
        reason: String,
        model: String,
    },
    AssetSelected {
        role: AssetRole,
        source: AssetSource,
        mime_type: String,
        digest: String,
    },
    WorkflowState {
        state: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<ProcessingStage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
    },
    SafetyChecked {
        valid: bool,
        reason: Option<String>,
    },
    BackendCall {
        purpose: String,
        backend: String,
        model: String,
        ok: bool,
        latency_ms: u64,
        error: Option<String>,
    },
    GenerationFinished {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_kind: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        recommendations: usize,
        artifact_path: Option<String>,
    },
    RecommendationApplied {
        item_name: String,
        color: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        garment_path: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ArtifactWriteFailed {
        error: String,
    },
    SessionFinished {
        cycles: u64,
        successes: u64,
        failures: u64,
    },
}

impl SessionEvent {
    pub fn workflow_state(state: &WorkflowState) -> Self {
        Self::WorkflowState {
            state: state.name(),
            stage: match state {
                WorkflowState::Processing { stage } => Some(*stage),
                _ => None,
            },
            message: state.error_message().map(str::to_string),
            notice: state.notice().map(str::to_string),
        }
    }
}

/// Append-only writer for the session's `events.jsonl`.
///
/// Every line is one compact object: the event's own fields plus
/// `session_id` and `ts`. Clones share the open file, so the fan-out
/// threads can log concurrently without interleaving lines.
#[derive(Debug, Clone)]
pub struct EventWriter {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.into(),
                session_id: session_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    /// Appends `event` and returns the line as written.
    pub fn emit(&self, event: &SessionEvent) -> anyhow::Result<Value> {
        let mut line = Map::new();
        if let Value::Object(fields) = serde_json::to_value(event)? {
            line.extend(fields);
        }
        line.insert(
            "session_id".to_string(),
            Value::String(self.shared.session_id.clone()),
        );
        line.insert("ts".to_string(), Value::String(now_utc_iso()));
        let mut encoded = serde_json::to_vec(&line)?;
        encoded.push(b'\n');

        let mut file = self
            .shared
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        if file.is_none() {
            if let Some(parent) = self.shared.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            *file = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.shared.path)?,
            );
        }
        if let Some(file) = file.as_mut() {
            file.write_all(&encoded)?;
        }
        Ok(Value::Object(line))
    }
}
