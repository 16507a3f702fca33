use crate::domain::claim::{ComposeResult, FinalStatus};
use crate::domain::invoice::{InvoiceRequest, InvoiceResult, ParsedInvoice};
use crate::orchestration::activities::{
    Activities, AssignOutcome, ComposeInput, CounterAction, CounterName, ReleaseOutcome,
};
use crate::orchestration::error::OrchestratorError;
use crate::orchestration::run_store::{
    ExecMode, PipelineStep, RunRecord, RunState, RunStore, StatusFields, WorkflowKind,
};
use crate::shared::ids::StageId;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

const STAGE_PARSER: &str = "invoice_parser";
const STAGE_COMPOSER: &str = "email_composer";

fn stage(raw: &str) -> StageId {
    StageId::parse(raw).unwrap_or_else(|_| unreachable!())
}

/// Linear invoice engine: parse, acknowledge, send. No human wait, no timer,
/// same replay rules as the claim pipeline.
pub struct InvoicePipeline {
    store: RunStore,
    activities: Arc<dyn Activities>,
}

impl InvoicePipeline {
    pub fn new(store: RunStore, activities: Arc<dyn Activities>) -> Self {
        InvoicePipeline { store, activities }
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn run_id_for(invoice_id: &str) -> String {
        format!("invoice-{invoice_id}")
    }

    pub fn start(
        &self,
        request: &InvoiceRequest,
        now: i64,
    ) -> Result<RunRecord, OrchestratorError> {
        let run_id = Self::run_id_for(&request.invoice_id);
        let inputs = serde_json::to_value(request).map_err(|source| OrchestratorError::Encode {
            context: "invoice request".to_string(),
            source,
        })?;
        let mut run = self.store.create_run(
            &run_id,
            &request.invoice_id,
            WorkflowKind::Invoice,
            inputs,
            now,
        )?;
        self.store
            .append_engine_log(&run_id, now, "workflow=invoice event=started")?;
        self.execute_or_fail(&mut run, now)?;
        Ok(run)
    }

    pub fn resume(&self, run_id: &str, now: i64) -> Result<RunRecord, OrchestratorError> {
        let mut run = self.store.load_run(run_id)?;
        if run.state.is_terminal() {
            return Ok(run);
        }
        self.execute_or_fail(&mut run, now)?;
        Ok(run)
    }

    pub fn load_result(&self, run_id: &str) -> Result<Option<InvoiceResult>, OrchestratorError> {
        match self.store.load_result(run_id)? {
            Some(value) => Ok(Some(self.decode(run_id, "result", value)?)),
            None => Ok(None),
        }
    }

    /// Rebuilds the terminal result from recordings only; see the claim
    /// pipeline counterpart.
    pub fn replay_result(
        &self,
        run_id: &str,
        now: i64,
    ) -> Result<InvoiceResult, OrchestratorError> {
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
    ) -> Result<Option<InvoiceResult>, OrchestratorError> {
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
                        format!("workflow=invoice event=failed reason=\"{err}\""),
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
    ) -> Result<Option<InvoiceResult>, OrchestratorError> {
        let mut replaying = self.store.has_recorded_activities(&run.run_id)?;
        let request: InvoiceRequest =
            self.decode(&run.run_id, "invoice request", run.inputs.clone())?;
        let key = request.invoice_id.clone();

        if run.state == RunState::Queued {
            self.transition(
                run,
                mode,
                now,
                RunState::Running,
                &StatusFields::message("invoice received", "parsing"),
            )?;
        }

        // Parsing, bracketed by the parser pool.
        let parser = stage(STAGE_PARSER);
        let assign: AssignOutcome =
            self.store
                .recorded_call(run, mode, &mut replaying, "assign_parser", now, || {
                    self.activities.assign_contractor(&parser, &key)
                })?;
        self.set_step(
            run,
            mode,
            now,
            PipelineStep::Parsing,
            &StatusFields {
                message: format!(
                    "Parsing invoice with {}",
                    assign
                        .contractor_name
                        .clone()
                        .unwrap_or_else(|| "queued contractor".to_string())
                ),
                contractor: assign.contractor_name.clone(),
                next_expected_action: "parsed invoice".to_string(),
                ..StatusFields::default()
            },
        )?;
        self.stamp(run, mode, "parser_started", now)?;
        let contractor = assign.contractor_name.clone();
        let parsed: ParsedInvoice =
            self.store
                .recorded_call(run, mode, &mut replaying, "parse_invoice", now, || {
                    self.activities.parse_invoice(&request, contractor.as_deref())
                })?;
        let _: ReleaseOutcome =
            self.store
                .recorded_call(run, mode, &mut replaying, "release_parser", now, || {
                    self.activities.release_contractor(&parser, &key)
                })?;
        self.stamp(run, mode, "parser_completed", now)?;

        // Acknowledgement email, bracketed by the composer pool.
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
                    "Drafting acknowledgement with {}",
                    compose_assign
                        .contractor_name
                        .clone()
                        .unwrap_or_else(|| "queued contractor".to_string())
                ),
                contractor: compose_assign.contractor_name.clone(),
                next_expected_action: "composed email".to_string(),
                ..StatusFields::default()
            },
        )?;
        self.stamp(run, mode, "email_composer_started", now)?;
        let compose_input = ComposeInput::InvoiceAck {
            parsed: parsed.clone(),
            shop_name: request.shop_name.clone(),
            shop_email: request.shop_email.clone(),
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
                    &StatusFields::message("Sending acknowledgement email", "delivery receipt"),
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
        let result = InvoiceResult {
            invoice_id: key,
            status: FinalStatus::Completed,
            parsed: Some(parsed),
            email: Some(compose),
            delivery,
            stage_timestamps: run.stage_timestamps.clone(),
            started_at: run.started_at,
            completed_at,
        };
        if mode == ExecMode::Live && !replaying {
            self.store.append_engine_log(
                &run.run_id,
                now,
                format!(
                    "workflow=invoice event=completed activities={}",
                    run.total_activities
                ),
            )?;
        }
        run.step = PipelineStep::Completed;
        if mode == ExecMode::Live {
            let value =
                serde_json::to_value(&result).map_err(|source| OrchestratorError::Encode {
                    context: "invoice result".to_string(),
                    source,
                })?;
            self.store.persist_result(&run.run_id, &value)?;
            self.store.transition_state(
                run,
                RunState::Completed,
                now,
                &StatusFields::message("invoice completed", "none"),
            )?;
        } else {
            run.state = RunState::Completed;
        }
        Ok(Some(result))
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
