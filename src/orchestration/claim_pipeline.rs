use crate::domain::claim::{
    ApprovalDecision, ClaimRequest, ClaimResult, ClassificationResult, ComposeResult, FinalStatus,
    ReviewDecision,
};
use crate::orchestration::activities::{
    Activities, AdjudicationOutcome, AssignOutcome, ComposeInput, CounterAction, CounterName,
    NotificationReceipt, ReleaseOutcome,
};
use crate::orchestration::error::OrchestratorError;
use crate::orchestration::run_store::{
    ExecMode, PipelineStep, RunRecord, RunState, RunStore, StatusFields, WorkflowKind,
};
use crate::shared::ids::StageId;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

const STAGE_CLASSIFIER: &str = "classifier";
const STAGE_ADJUDICATOR: &str = "adjudicator";
const STAGE_COMPOSER: &str = "email_composer";

fn stage(raw: &str) -> StageId {
    // The stage constants above are valid identifiers.
    StageId::parse(raw).unwrap_or_else(|_| unreachable!())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Accepted,
    /// The wait already resolved (or the signal was a duplicate); nothing
    /// changed.
    Ignored,
}

/// Replay-driven claim engine. Every start/resume re-executes the stage
/// sequence from the top; recorded activity results short-circuit the calls
/// that already happened, so the only live work is at the frontier.
pub struct ClaimPipeline {
    store: RunStore,
    activities: Arc<dyn Activities>,
    approval_timeout_secs: i64,
}

impl ClaimPipeline {
    pub fn new(
        store: RunStore,
        activities: Arc<dyn Activities>,
        approval_timeout_secs: i64,
    ) -> Self {
        ClaimPipeline {
            store,
            activities,
            approval_timeout_secs,
        }
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn run_id_for(claim_id: &str) -> String {
        format!("claim-{claim_id}")
    }

    /// Starts a run keyed by the claim id and drives it until it suspends or
    /// finishes. Duplicate starts of a live claim fail with `AlreadyRunning`.
    pub fn start(&self, request: &ClaimRequest, now: i64) -> Result<RunRecord, OrchestratorError> {
        let run_id = Self::run_id_for(&request.claim_id);
        let inputs = serde_json::to_value(request).map_err(|source| OrchestratorError::Encode {
            context: "claim request".to_string(),
            source,
        })?;
        let mut run =
            self.store
                .create_run(&run_id, &request.claim_id, WorkflowKind::Claim, inputs, now)?;
        self.store
            .append_engine_log(&run_id, now, "workflow=claim event=started")?;
        self.execute_or_fail(&mut run, now)?;
        Ok(run)
    }

    /// Re-drives a suspended or in-flight run. A no-op for terminal runs.
    pub fn resume(&self, run_id: &str, now: i64) -> Result<RunRecord, OrchestratorError> {
        let mut run = self.store.load_run(run_id)?;
        if run.state.is_terminal() {
            return Ok(run);
        }
        self.execute_or_fail(&mut run, now)?;
        Ok(run)
    }

    /// Fires the durable timer for every waiting run whose deadline has
    /// passed. Returns the run ids that were resumed.
    pub fn resume_due(&self, now: i64) -> Result<Vec<String>, OrchestratorError> {
        let mut resumed = Vec::new();
        for summary in self.store.list_runs()? {
            if summary.workflow != WorkflowKind::Claim || summary.state != RunState::Waiting {
                continue;
            }
            let run = self.store.load_run(&summary.run_id)?;
            if run.timeout_deadline.is_some_and(|deadline| now >= deadline) {
                self.resume(&summary.run_id, now)?;
                resumed.push(summary.run_id);
            }
        }
        Ok(resumed)
    }

    /// Delivers the reviewer's estimate. The signal is persisted before the
    /// engine resumes, so it survives a crash between the two steps. Late or
    /// duplicate signals are ignored; a signal for a run that has not reached
    /// the wait yet is the caller's error.
    pub fn deliver_approval(
        &self,
        run_id: &str,
        decision: &ApprovalDecision,
        now: i64,
    ) -> Result<SignalOutcome, OrchestratorError> {
        let run = self.store.load_run(run_id)?;
        if run.state.is_terminal() {
            return Ok(SignalOutcome::Ignored);
        }
        if self.store.load_signal(run_id)?.is_some() {
            return Ok(SignalOutcome::Ignored);
        }
        if run.step != PipelineStep::AwaitingApproval {
            return Err(OrchestratorError::NotAwaitingInput {
                run_id: run_id.to_string(),
                step: run.step.to_string(),
            });
        }
        let signal = serde_json::to_value(decision).map_err(|source| OrchestratorError::Encode {
            context: "approval decision".to_string(),
            source,
        })?;
        self.store.persist_signal(run_id, &signal)?;
        self.resume(run_id, now)?;
        Ok(SignalOutcome::Accepted)
    }

    pub fn load_result(&self, run_id: &str) -> Result<Option<ClaimResult>, OrchestratorError> {
        match self.store.load_result(run_id)? {
            Some(value) => Ok(Some(self.decode(run_id, "result", value)?)),
            None => Ok(None),
        }
    }

    /// Rebuilds the terminal result purely from recorded state, invoking
    /// nothing and persisting nothing. Determinism check for finished runs.
    pub fn replay_result(&self, run_id: &str, now: i64) -> Result<ClaimResult, OrchestratorError> {
        let stored = self.store.load_run(run_id)?;
        let mut shadow = stored.clone();
        shadow.state = RunState::Running;
        shadow.step = PipelineStep::Received;
        match self.execute(&mut shadow, now, ExecMode::ReplayOnly)? {
            Some(result) => Ok(result),
            None => Err(OrchestratorError::ReplayIncomplete {
                run_id: run_id.to_string(),
            }),
        }
    }

    fn execute_or_fail(
        &self,
        run: &mut RunRecord,
        now: i64,
    ) -> Result<Option<ClaimResult>, OrchestratorError> {
        match self.execute(run, now, ExecMode::Live) {
            Ok(result) => Ok(result),
            Err(err) => {
                if !run.state.is_terminal() && run.state.can_transition_to(RunState::Failed) {
                    let fields = StatusFields::message(err.to_string(), "operator attention");
                    let _ = self
                        .store
                        .transition_state(run, RunState::Failed, now, &fields);
                    let _ = self.store.append_engine_log(
                        &run.run_id,
                        now,
                        format!("workflow=claim event=failed reason=\"{err}\""),
                    );
                }
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        run: &mut RunRecord,
        now: i64,
        mode: ExecMode,
    ) -> Result<Option<ClaimResult>, OrchestratorError> {
        let mut replaying = self.store.has_recorded_activities(&run.run_id)?;
        let request: ClaimRequest = self.decode(&run.run_id, "claim request", run.inputs.clone())?;
        let key = request.claim_id.clone();

        if run.state == RunState::Queued {
            self.transition(
                run,
                mode,
                now,
                RunState::Running,
                &StatusFields::message("claim received", "classification"),
            )?;
        }

        // Classification, bracketed by the classifier pool.
        let classifier = stage(STAGE_CLASSIFIER);
        let assign: AssignOutcome =
            self.store
                .recorded_call(run, mode, &mut replaying, "assign_classifier", now, || {
                    self.activities.assign_contractor(&classifier, &key)
                })?;
        self.set_step(
            run,
            mode,
            now,
            PipelineStep::Classifying,
            &StatusFields {
                message: format!(
                    "Classifying claim with {}",
                    contractor_label(&assign.contractor_name)
                ),
                contractor: assign.contractor_name.clone(),
                next_expected_action: "classifier output".to_string(),
                ..StatusFields::default()
            },
        )?;
        self.stamp(run, mode, "classifier_started", now)?;
        let contractor = assign.contractor_name.clone();
        let classification: ClassificationResult =
            self.store
                .recorded_call(run, mode, &mut replaying, "classify", now, || {
                    self.activities.classify(&request, contractor.as_deref())
                })?;
        let _: ReleaseOutcome =
            self.store
                .recorded_call(run, mode, &mut replaying, "release_classifier", now, || {
                    self.activities.release_contractor(&classifier, &key)
                })?;
        self.stamp(run, mode, "classifier_completed", now)?;

        // Reviewer notification.
        self.set_step(
            run,
            mode,
            now,
            PipelineStep::SendingNotification,
            &StatusFields::message("Notifying reviewer", "reviewer notification"),
        )?;
        let _: NotificationReceipt =
            self.store
                .recorded_call(run, mode, &mut replaying, "notify", now, || {
                    self.activities.notify_reviewer(&request, &classification)
                })?;

        // Human wait: the reviewer's estimate races a durable timeout.
        let awaiting_at = self.stamp(run, mode, "awaiting_started", now)?;
        let _ = self.store.recorded_call(
            run,
            mode,
            &mut replaying,
            "review_waiting_inc",
            now,
            || {
                self.activities
                    .update_counter(CounterName::ReviewWaiting, CounterAction::Increment)
            },
        )?;

        let approval = match self.store.load_signal(&run.run_id)? {
            Some(raw) => {
                // Signal wins; drop the timer.
                if run.timeout_deadline.take().is_some() && mode == ExecMode::Live {
                    self.store.persist_run(run)?;
                }
                let approval: ApprovalDecision =
                    self.decode(&run.run_id, "approval signal", raw)?;
                if run.state == RunState::Waiting {
                    self.transition(
                        run,
                        mode,
                        now,
                        RunState::Running,
                        &StatusFields::message("reviewer estimate received", "adjudication"),
                    )?;
                }
                self.stamp(run, mode, "approval_received", now)?;
                let _ = self.store.recorded_call(
                    run,
                    mode,
                    &mut replaying,
                    "review_waiting_dec",
                    now,
                    || {
                        self.activities
                            .update_counter(CounterName::ReviewWaiting, CounterAction::Decrement)
                    },
                )?;
                self.log(run, mode, replaying, now, || {
                    format!(
                        "workflow=claim event=signal decision={}",
                        match approval.decision {
                            ReviewDecision::Approved => "approved",
                            ReviewDecision::Rejected => "rejected",
                        }
                    )
                })?;
                if approval.decision == ReviewDecision::Rejected {
                    let completed_at = self.stamp(run, mode, "completed", now)?;
                    let result = ClaimResult {
                        claim_id: key.clone(),
                        status: FinalStatus::Rejected,
                        classification: Some(classification),
                        approval: Some(approval),
                        adjudication_input: None,
                        adjudication: None,
                        email: None,
                        delivery: None,
                        stage_timestamps: run.stage_timestamps.clone(),
                        started_at: run.started_at,
                        completed_at,
                    };
                    self.finalize(
                        run,
                        mode,
                        now,
                        PipelineStep::Rejected,
                        &StatusFields::message("claim rejected by reviewer", "none"),
                        &result,
                    )?;
                    return Ok(Some(result));
                }
                approval
            }
            None => {
                let deadline = match run.timeout_deadline {
                    Some(deadline) => deadline,
                    None => {
                        let deadline = awaiting_at + self.approval_timeout_secs;
                        run.timeout_deadline = Some(deadline);
                        if mode == ExecMode::Live {
                            self.store.persist_run(run)?;
                        }
                        deadline
                    }
                };
                // A recorded timeout milestone wins over the clock on replay.
                if run.stage_at("timeout").is_some() || now >= deadline {
                    if run.state == RunState::Waiting {
                        self.transition(
                            run,
                            mode,
                            now,
                            RunState::Running,
                            &StatusFields::message("approval wait timed out", "terminal result"),
                        )?;
                    }
                    let timeout_at = self.stamp(run, mode, "timeout", now)?;
                    let _ = self.store.recorded_call(
                        run,
                        mode,
                        &mut replaying,
                        "review_waiting_dec",
                        now,
                        || {
                            self.activities.update_counter(
                                CounterName::ReviewWaiting,
                                CounterAction::Decrement,
                            )
                        },
                    )?;
                    self.log(run, mode, replaying, now, || {
                        "workflow=claim event=timeout".to_string()
                    })?;
                    let result = ClaimResult {
                        claim_id: key.clone(),
                        status: FinalStatus::TimedOut,
                        classification: Some(classification),
                        approval: None,
                        adjudication_input: None,
                        adjudication: None,
                        email: None,
                        delivery: None,
                        stage_timestamps: run.stage_timestamps.clone(),
                        started_at: run.started_at,
                        completed_at: timeout_at,
                    };
                    self.finalize(
                        run,
                        mode,
                        now,
                        PipelineStep::TimedOut,
                        &StatusFields::message("approval wait timed out", "none"),
                        &result,
                    )?;
                    return Ok(Some(result));
                }

                // Suspend until a signal or the timer fires.
                run.step = PipelineStep::AwaitingApproval;
                let classification_value = serde_json::to_value(&classification).map_err(
                    |source| OrchestratorError::Encode {
                        context: "classification payload".to_string(),
                        source,
                    },
                )?;
                let fields = StatusFields {
                    message: "Awaiting reviewer estimate".to_string(),
                    contractor: None,
                    classification: Some(classification_value),
                    pending_human_input: true,
                    next_expected_action: "reviewer estimate or timeout".to_string(),
                };
                if mode == ExecMode::Live {
                    if run.state == RunState::Waiting {
                        self.store.checkpoint(run, now, &fields)?;
                    } else {
                        self.store
                            .transition_state(run, RunState::Waiting, now, &fields)?;
                    }
                }
                self.log(run, mode, replaying, now, || {
                    format!("workflow=claim event=suspended deadline={deadline}")
                })?;
                return Ok(None);
            }
        };

        // Adjudication, bracketed by the adjudicator pool.
        let adjudicator = stage(STAGE_ADJUDICATOR);
        let adj_assign: AssignOutcome =
            self.store
                .recorded_call(run, mode, &mut replaying, "assign_adjudicator", now, || {
                    self.activities.assign_contractor(&adjudicator, &key)
                })?;
        self.set_step(
            run,
            mode,
            now,
            PipelineStep::Adjudicating,
            &StatusFields {
                message: format!(
                    "Adjudicating claim with {}",
                    contractor_label(&adj_assign.contractor_name)
                ),
                contractor: adj_assign.contractor_name.clone(),
                next_expected_action: "adjudicator verdict".to_string(),
                ..StatusFields::default()
            },
        )?;
        self.stamp(run, mode, "adjudicator_started", now)?;
        let adjudication: AdjudicationOutcome =
            self.store
                .recorded_call(run, mode, &mut replaying, "adjudicate", now, || {
                    self.activities.adjudicate(&key, &classification, &approval)
                })?;
        let _: ReleaseOutcome = self.store.recorded_call(
            run,
            mode,
            &mut replaying,
            "release_adjudicator",
            now,
            || self.activities.release_contractor(&adjudicator, &key),
        )?;
        self.stamp(run, mode, "adjudicator_completed", now)?;

        // Notification drafting, bracketed by the composer pool. Failures
        // degrade into data instead of aborting.
        let composer = stage(STAGE_COMPOSER);
        let compose_assign: AssignOutcome =
            self.store
                .recorded_call(run, mode, &mut replaying, "assign_composer", now, || {
                    self.activities.assign_contractor(&composer, &key)
                })?;
        self.set_step(
            run,
            mode,
            now,
            PipelineStep::Composing,
            &StatusFields {
                message: format!(
                    "Drafting notification with {}",
                    contractor_label(&compose_assign.contractor_name)
                ),
                contractor: compose_assign.contractor_name.clone(),
                next_expected_action: "composed email".to_string(),
                ..StatusFields::default()
            },
        )?;
        self.stamp(run, mode, "email_composer_started", now)?;
        let compose_input = ComposeInput::ClaimDecision {
            classification: classification.clone(),
            adjudication: adjudication.result.clone(),
        };
        let compose: ComposeResult =
            self.store
                .recorded_call(run, mode, &mut replaying, "compose", now, || {
                    self.activities.compose_notification(&compose_input)
                })?;
        let _: ReleaseOutcome =
            self.store
                .recorded_call(run, mode, &mut replaying, "release_composer", now, || {
                    self.activities.release_contractor(&composer, &key)
                })?;
        self.stamp(run, mode, "email_composer_completed", now)?;
        if let ComposeResult::Failed { error } = &compose {
            let reason = error.clone();
            self.log(run, mode, replaying, now, move || {
                format!("workflow=claim event=compose_degraded reason=\"{reason}\"")
            })?;
        }

        // Delivery, bracketed by the outbound counter. Skipped entirely when
        // there is nothing to send.
        let delivery = match &compose {
            ComposeResult::Composed { email } => {
                let _ = self.store.recorded_call(
                    run,
                    mode,
                    &mut replaying,
                    "email_sending_inc",
                    now,
                    || {
                        self.activities
                            .update_counter(CounterName::EmailSending, CounterAction::Increment)
                    },
                )?;
                self.set_step(
                    run,
                    mode,
                    now,
                    PipelineStep::SendingEmail,
                    &StatusFields::message("Sending notification email", "delivery receipt"),
                )?;
                let email = email.clone();
                let delivered = self
                    .store
                    .recorded_call(run, mode, &mut replaying, "deliver", now, || {
                        self.activities.deliver(&email)
                    })?;
                let _ = self.store.recorded_call(
                    run,
                    mode,
                    &mut replaying,
                    "email_sending_dec",
                    now,
                    || {
                        self.activities
                            .update_counter(CounterName::EmailSending, CounterAction::Decrement)
                    },
                )?;
                Some(delivered)
            }
            ComposeResult::Failed { .. } => None,
        };

        let completed_at = self.stamp(run, mode, "completed", now)?;
        let result = ClaimResult {
            claim_id: key,
            status: FinalStatus::Completed,
            classification: Some(classification),
            approval: Some(approval),
            adjudication_input: Some(adjudication.input),
            adjudication: Some(adjudication.result),
            email: Some(compose),
            delivery,
            stage_timestamps: run.stage_timestamps.clone(),
            started_at: run.started_at,
            completed_at,
        };
        self.log(run, mode, replaying, now, || {
            format!(
                "workflow=claim event=completed activities={}",
                run.total_activities
            )
        })?;
        self.finalize(
            run,
            mode,
            now,
            PipelineStep::Completed,
            &StatusFields::message("claim completed", "none"),
            &result,
        )?;
        Ok(Some(result))
    }

    fn finalize(
        &self,
        run: &mut RunRecord,
        mode: ExecMode,
        now: i64,
        step: PipelineStep,
        fields: &StatusFields,
        result: &ClaimResult,
    ) -> Result<(), OrchestratorError> {
        run.step = step;
        if mode == ExecMode::Live {
            let value =
                serde_json::to_value(result).map_err(|source| OrchestratorError::Encode {
                    context: "claim result".to_string(),
                    source,
                })?;
            self.store.persist_result(&run.run_id, &value)?;
            self.store
                .transition_state(run, RunState::Completed, now, fields)?;
        } else {
            run.state = RunState::Completed;
        }
        Ok(())
    }

    fn set_step(
        &self,
        run: &mut RunRecord,
        mode: ExecMode,
        now: i64,
        step: PipelineStep,
        fields: &StatusFields,
    ) -> Result<(), OrchestratorError> {
        run.step = step;
        // Replaying through a suspended run keeps the waiting status intact
        // until the wait actually resolves.
        if mode == ExecMode::Live && run.state == RunState::Running {
            self.store.checkpoint(run, now, fields)?;
        }
        Ok(())
    }

    fn transition(
        &self,
        run: &mut RunRecord,
        mode: ExecMode,
        now: i64,
        next: RunState,
        fields: &StatusFields,
    ) -> Result<(), OrchestratorError> {
        if mode == ExecMode::Live {
            self.store.transition_state(run, next, now, fields)
        } else {
            run.state = next;
            Ok(())
        }
    }

    fn stamp(
        &self,
        run: &mut RunRecord,
        mode: ExecMode,
        stage: &str,
        at: i64,
    ) -> Result<i64, OrchestratorError> {
        match mode {
            ExecMode::Live => self.store.record_stage(run, stage, at),
            ExecMode::ReplayOnly => Ok(run.stamp(stage, at).0),
        }
    }

    fn log<F>(
        &self,
        run: &RunRecord,
        mode: ExecMode,
        replaying: bool,
        now: i64,
        message: F,
    ) -> Result<(), OrchestratorError>
    where
        F: FnOnce() -> String,
    {
        if mode == ExecMode::Live && !replaying {
            self.store.append_engine_log(&run.run_id, now, message())?;
        }
        Ok(())
    }

    fn decode<T: DeserializeOwned>(
        &self,
        run_id: &str,
        context: &str,
        value: Value,
    ) -> Result<T, OrchestratorError> {
        serde_json::from_value(value).map_err(|source| OrchestratorError::Decode {
            run_id: run_id.to_string(),
            context: context.to_string(),
            source,
        })
    }
}

fn contractor_label(name: &Option<String>) -> String {
    name.clone().unwrap_or_else(|| "queued contractor".to_string())
}
