use crate::config::ConfigError;
use crate::orchestration::run_store::RunState;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("run `{run_id}` not found")]
    UnknownRun { run_id: String },
    #[error("run `{run_id}` already exists and is {state}")]
    AlreadyRunning { run_id: String, state: RunState },
    #[error("run state transition `{from}` -> `{to}` is invalid")]
    InvalidRunTransition { from: RunState, to: RunState },
    #[error("activity `{activity}` failed for run `{run_id}`: {reason}")]
    ActivityFailed {
        run_id: String,
        activity: String,
        reason: String,
    },
    #[error("run `{run_id}` is not awaiting a reviewer estimate (current step `{step}`)")]
    NotAwaitingInput { run_id: String, step: String },
    #[error("replay of run `{run_id}` needs a live activity call for `{activity}`")]
    MissingRecording { run_id: String, activity: String },
    #[error("run `{run_id}` has not reached a terminal result yet")]
    ReplayIncomplete { run_id: String },
    #[error("stored {context} for run `{run_id}` does not decode: {source}")]
    Decode {
        run_id: String,
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {context}: {source}")]
    Encode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("config error: {0}")]
    Config(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ConfigError> for OrchestratorError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
