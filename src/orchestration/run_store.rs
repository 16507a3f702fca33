use crate::domain::claim::StageStamp;
use crate::orchestration::activities::ActivityResult;
use crate::orchestration::error::OrchestratorError;
use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::logging::OrchestratorLog;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Running,
    Waiting,
    Completed,
    Failed,
}

impl RunState {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (RunState::Queued, RunState::Running)
                | (RunState::Queued, RunState::Failed)
                | (RunState::Running, RunState::Waiting)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::Failed)
                | (RunState::Waiting, RunState::Running)
                | (RunState::Waiting, RunState::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Queued => write!(f, "queued"),
            RunState::Running => write!(f, "running"),
            RunState::Waiting => write!(f, "waiting"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Claim,
    Invoice,
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowKind::Claim => write!(f, "claim"),
            WorkflowKind::Invoice => write!(f, "invoice"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Received,
    Classifying,
    SendingNotification,
    AwaitingApproval,
    Adjudicating,
    Parsing,
    Composing,
    SendingEmail,
    Completed,
    Rejected,
    TimedOut,
}

impl PipelineStep {
    pub fn display_status(self) -> &'static str {
        match self {
            PipelineStep::Received => "Received",
            PipelineStep::Classifying => "Classifying",
            PipelineStep::SendingNotification => "Notifying Reviewer",
            PipelineStep::AwaitingApproval => "Awaiting Approval",
            PipelineStep::Adjudicating => "Adjudicating",
            PipelineStep::Parsing => "Parsing Invoice",
            PipelineStep::Composing => "Drafting Email",
            PipelineStep::SendingEmail => "Sending Email",
            PipelineStep::Completed => "Completed",
            PipelineStep::Rejected => "Rejected",
            PipelineStep::TimedOut => "Timed Out",
        }
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PipelineStep::Received => "received",
            PipelineStep::Classifying => "classifying",
            PipelineStep::SendingNotification => "sending_notification",
            PipelineStep::AwaitingApproval => "awaiting_approval",
            PipelineStep::Adjudicating => "adjudicating",
            PipelineStep::Parsing => "parsing",
            PipelineStep::Composing => "composing",
            PipelineStep::SendingEmail => "sending_email",
            PipelineStep::Completed => "completed",
            PipelineStep::Rejected => "rejected",
            PipelineStep::TimedOut => "timed_out",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub business_key: String,
    pub workflow: WorkflowKind,
    pub state: RunState,
    pub step: PipelineStep,
    pub inputs: Value,
    /// Milestones, insert-once: a recorded timestamp always wins on replay.
    #[serde(default)]
    pub stage_timestamps: Vec<StageStamp>,
    #[serde(default)]
    pub timeout_deadline: Option<i64>,
    pub started_at: i64,
    pub updated_at: i64,
    pub total_activities: u32,
    #[serde(default)]
    pub terminal_reason: Option<String>,
}

impl RunRecord {
    /// Records `stage` at `at` unless already present, returning the
    /// effective timestamp and whether it was inserted.
    pub fn stamp(&mut self, stage: &str, at: i64) -> (i64, bool) {
        if let Some(existing) = self.stage_at(stage) {
            return (existing, false);
        }
        self.stage_timestamps.push(StageStamp {
            stage: stage.to_string(),
            at,
        });
        (at, true)
    }

    pub fn stage_at(&self, stage: &str) -> Option<i64> {
        self.stage_timestamps
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.at)
    }
}

/// Poller-facing status document, rewritten on every checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub run_id: String,
    pub business_key: String,
    pub workflow: WorkflowKind,
    pub state: RunState,
    pub step: PipelineStep,
    pub message: String,
    #[serde(default)]
    pub contractor: Option<String>,
    /// Present while the run waits on a reviewer, so the review desk can show
    /// the classifier output without reading activity files.
    #[serde(default)]
    pub classification: Option<Value>,
    pub stage_timestamps: Vec<StageStamp>,
    pub updated_at: i64,
    pub pending_human_input: bool,
    pub next_expected_action: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusFields {
    pub message: String,
    pub contractor: Option<String>,
    pub classification: Option<Value>,
    pub pending_human_input: bool,
    pub next_expected_action: String,
}

impl StatusFields {
    pub fn message(message: impl Into<String>, next_expected_action: impl Into<String>) -> Self {
        StatusFields {
            message: message.into(),
            next_expected_action: next_expected_action.into(),
            ..StatusFields::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub business_key: String,
    pub workflow: WorkflowKind,
    pub state: RunState,
    pub step: PipelineStep,
    pub display_status: String,
    pub started_at: i64,
    pub updated_at: i64,
}

/// Whether the engine is allowed to invoke live activities or must find
/// everything already recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Live,
    ReplayOnly,
}

#[derive(Debug, Clone)]
pub struct RunStore {
    state_root: PathBuf,
}

impl RunStore {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    /// Creates a fresh run keyed by `run_id`. A non-terminal run under the
    /// same id is a duplicate start; a terminal one is wiped and replaced.
    pub fn create_run(
        &self,
        run_id: &str,
        business_key: &str,
        workflow: WorkflowKind,
        inputs: Value,
        now: i64,
    ) -> Result<RunRecord, OrchestratorError> {
        if let Some(existing) = self.try_load_run(run_id)? {
            if !existing.state.is_terminal() {
                return Err(OrchestratorError::AlreadyRunning {
                    run_id: run_id.to_string(),
                    state: existing.state,
                });
            }
            self.remove_run_artifacts(run_id)?;
        }
        let mut run = RunRecord {
            run_id: run_id.to_string(),
            business_key: business_key.to_string(),
            workflow,
            state: RunState::Queued,
            step: PipelineStep::Received,
            inputs,
            stage_timestamps: Vec::new(),
            timeout_deadline: None,
            started_at: now,
            updated_at: now,
            total_activities: 0,
            terminal_reason: None,
        };
        run.stamp("received", now);
        self.persist_run(&run)?;
        self.persist_status(&run, &StatusFields::message("received", "workflow start"))?;
        Ok(run)
    }

    pub fn load_run(&self, run_id: &str) -> Result<RunRecord, OrchestratorError> {
        self.try_load_run(run_id)?
            .ok_or_else(|| OrchestratorError::UnknownRun {
                run_id: run_id.to_string(),
            })
    }

    pub fn try_load_run(&self, run_id: &str) -> Result<Option<RunRecord>, OrchestratorError> {
        let path = self.run_metadata_path(run_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(&path, source)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| json_error(&path, e))
    }

    pub fn persist_run(&self, run: &RunRecord) -> Result<(), OrchestratorError> {
        let path = self.run_metadata_path(&run.run_id);
        let body = serde_json::to_vec_pretty(run).map_err(|e| json_error(&path, e))?;
        atomic_write_file(&path, &body).map_err(|e| io_error(&path, e))
    }

    pub fn transition_state(
        &self,
        run: &mut RunRecord,
        next: RunState,
        now: i64,
        fields: &StatusFields,
    ) -> Result<(), OrchestratorError> {
        if !run.state.can_transition_to(next) {
            return Err(OrchestratorError::InvalidRunTransition {
                from: run.state,
                to: next,
            });
        }
        run.state = next;
        run.updated_at = now;
        run.terminal_reason = if run.state.is_terminal() {
            Some(fields.message.clone())
        } else {
            None
        };
        self.persist_run(run)?;
        self.persist_status(run, fields)
    }

    /// Persist progress without a state change.
    pub fn checkpoint(
        &self,
        run: &mut RunRecord,
        now: i64,
        fields: &StatusFields,
    ) -> Result<(), OrchestratorError> {
        run.updated_at = now;
        self.persist_run(run)?;
        self.persist_status(run, fields)
    }

    /// Insert-once stage milestone; returns the effective timestamp.
    pub fn record_stage(
        &self,
        run: &mut RunRecord,
        stage: &str,
        at: i64,
    ) -> Result<i64, OrchestratorError> {
        let (effective, inserted) = run.stamp(stage, at);
        if inserted {
            self.persist_run(run)?;
        }
        Ok(effective)
    }

    fn persist_status(
        &self,
        run: &RunRecord,
        fields: &StatusFields,
    ) -> Result<(), OrchestratorError> {
        let snapshot = StatusSnapshot {
            run_id: run.run_id.clone(),
            business_key: run.business_key.clone(),
            workflow: run.workflow,
            state: run.state,
            step: run.step,
            message: fields.message.clone(),
            contractor: fields.contractor.clone(),
            classification: fields.classification.clone(),
            stage_timestamps: run.stage_timestamps.clone(),
            updated_at: run.updated_at,
            pending_human_input: fields.pending_human_input,
            next_expected_action: fields.next_expected_action.clone(),
        };
        let path = self.status_path(&run.run_id);
        let body = serde_json::to_vec_pretty(&snapshot).map_err(|e| json_error(&path, e))?;
        atomic_write_file(&path, &body).map_err(|e| io_error(&path, e))
    }

    pub fn load_status(&self, run_id: &str) -> Result<StatusSnapshot, OrchestratorError> {
        let path = self.status_path(run_id);
        let raw = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        serde_json::from_str(&raw).map_err(|e| json_error(&path, e))
    }

    /// Recorded-result gate around one activity call site. A recording wins;
    /// otherwise the activity runs live (and is recorded) or, in replay-only
    /// mode, the call is an error. `replaying` flips to false on the first
    /// live invocation, marking the execution frontier.
    pub fn recorded_call<T, F>(
        &self,
        run: &mut RunRecord,
        mode: ExecMode,
        replaying: &mut bool,
        name: &str,
        now: i64,
        invoke: F,
    ) -> Result<T, OrchestratorError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> ActivityResult<T>,
    {
        let path = self.activity_path(&run.run_id, name);
        if let Some(raw) = read_optional(&path)? {
            return serde_json::from_str(&raw).map_err(|e| json_error(&path, e));
        }
        if mode == ExecMode::ReplayOnly {
            return Err(OrchestratorError::MissingRecording {
                run_id: run.run_id.clone(),
                activity: name.to_string(),
            });
        }
        *replaying = false;
        let value = invoke().map_err(|err| OrchestratorError::ActivityFailed {
            run_id: run.run_id.clone(),
            activity: name.to_string(),
            reason: err.reason,
        })?;
        let body = serde_json::to_vec_pretty(&value).map_err(|e| json_error(&path, e))?;
        atomic_write_file(&path, &body).map_err(|e| io_error(&path, e))?;
        run.total_activities = run.total_activities.saturating_add(1);
        run.updated_at = now;
        self.persist_run(run)?;
        Ok(value)
    }

    pub fn has_recorded_activities(&self, run_id: &str) -> Result<bool, OrchestratorError> {
        let dir = self.run_dir(run_id).join("activities");
        let mut entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(io_error(&dir, source)),
        };
        Ok(entries.next().is_some())
    }

    pub fn persist_signal(&self, run_id: &str, signal: &Value) -> Result<(), OrchestratorError> {
        let path = self.signal_path(run_id);
        let body = serde_json::to_vec_pretty(signal).map_err(|e| json_error(&path, e))?;
        atomic_write_file(&path, &body).map_err(|e| io_error(&path, e))
    }

    pub fn load_signal(&self, run_id: &str) -> Result<Option<Value>, OrchestratorError> {
        let path = self.signal_path(run_id);
        match read_optional(&path)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| json_error(&path, e)),
            None => Ok(None),
        }
    }

    pub fn persist_result(&self, run_id: &str, result: &Value) -> Result<(), OrchestratorError> {
        let path = self.result_path(run_id);
        let body = serde_json::to_vec_pretty(result).map_err(|e| json_error(&path, e))?;
        atomic_write_file(&path, &body).map_err(|e| io_error(&path, e))
    }

    pub fn load_result(&self, run_id: &str) -> Result<Option<Value>, OrchestratorError> {
        let path = self.result_path(run_id);
        match read_optional(&path)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| json_error(&path, e)),
            None => Ok(None),
        }
    }

    /// Newest first by last update.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>, OrchestratorError> {
        let runs_root = self.runs_root();
        let entries = match fs::read_dir(&runs_root) {
            Ok(entries) => entries,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(io_error(&runs_root, source)),
        };
        let mut summaries = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&runs_root, source))?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|v| v.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
            let run: RunRecord =
                serde_json::from_str(&raw).map_err(|source| json_error(&path, source))?;
            let display_status = if run.state == RunState::Failed {
                "Failed".to_string()
            } else {
                run.step.display_status().to_string()
            };
            summaries.push(RunSummary {
                run_id: run.run_id,
                business_key: run.business_key,
                workflow: run.workflow,
                state: run.state,
                step: run.step,
                display_status,
                started_at: run.started_at,
                updated_at: run.updated_at,
            });
        }
        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(b.started_at.cmp(&a.started_at))
                .then(a.run_id.cmp(&b.run_id))
        });
        Ok(summaries)
    }

    pub fn append_engine_log(
        &self,
        run_id: &str,
        now: i64,
        message: impl AsRef<str>,
    ) -> Result<(), OrchestratorError> {
        let log = OrchestratorLog::new(&self.state_root);
        log.run_event(now, run_id, message.as_ref())
            .map_err(|source| io_error(log.path(), source))
    }

    fn remove_run_artifacts(&self, run_id: &str) -> Result<(), OrchestratorError> {
        let dir = self.run_dir(run_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(source) if source.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(io_error(&dir, source)),
        }
        let meta = self.run_metadata_path(run_id);
        match fs::remove_file(&meta) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&meta, source)),
        }
    }

    fn runs_root(&self) -> PathBuf {
        self.state_root.join("pipelines/runs")
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_root().join(run_id)
    }

    fn run_metadata_path(&self, run_id: &str) -> PathBuf {
        self.runs_root().join(format!("{run_id}.json"))
    }

    fn status_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("status.json")
    }

    fn activity_path(&self, run_id: &str, name: &str) -> PathBuf {
        self.run_dir(run_id)
            .join("activities")
            .join(format!("{name}.json"))
    }

    fn signal_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("signal.json")
    }

    fn result_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("result.json")
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, OrchestratorError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(source) if source.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(io_error(path, source)),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> OrchestratorError {
    OrchestratorError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> OrchestratorError {
    OrchestratorError::Json {
        path: path.display().to_string(),
        source,
    }
}
