pub mod adjudicate;
pub mod classify;
pub mod compose;
pub mod deliver;
pub mod pool_ops;

use crate::agent::client::AgentClient;
use crate::config::Settings;
use crate::domain::claim::{
    AdjudicationResult, ApprovalDecision, ClaimRequest, ClassificationResult, ComposeResult,
    ComposedEmail, DeliveryResult,
};
use crate::domain::invoice::{InvoiceRequest, ParsedInvoice};
use crate::orchestration::activities::{
    Activities, ActivityError, ActivityResult, AdjudicationOutcome, AssignOutcome, ComposeInput,
    CounterAction, CounterDelta, CounterName, NotificationReceipt, ReleaseOutcome,
};
use crate::pool::manager::ContractorManager;
use crate::shared::ids::StageId;
use crate::shared::logging::OrchestratorLog;
use crate::shared::time::utc_rfc3339;
use deliver::{LogMailer, Mailer};
use std::path::PathBuf;
use std::sync::Arc;

/// Production wiring of the activity seam: agent service for the model
/// stages, contractor manager for pool bookkeeping, mailer for delivery.
pub struct ActivityRouter {
    agent: AgentClient,
    manager: Arc<ContractorManager>,
    mailer: Arc<dyn Mailer>,
    log: OrchestratorLog,
}

impl ActivityRouter {
    pub fn new(
        agent: AgentClient,
        manager: Arc<ContractorManager>,
        mailer: Arc<dyn Mailer>,
        state_root: PathBuf,
    ) -> Self {
        ActivityRouter {
            agent,
            manager,
            mailer,
            log: OrchestratorLog::new(&state_root),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let manager = ContractorManager::get_or_init(&settings.pools);
        ActivityRouter {
            agent: AgentClient::new(settings.agent.clone()),
            manager,
            mailer: Arc::new(LogMailer::new(settings.state_root.clone())),
            log: OrchestratorLog::new(&settings.state_root),
        }
    }
}

impl Activities for ActivityRouter {
    fn classify(
        &self,
        request: &ClaimRequest,
        contractor: Option<&str>,
    ) -> ActivityResult<ClassificationResult> {
        classify::classify_claim(&self.agent, request, contractor)
    }

    fn notify_reviewer(
        &self,
        request: &ClaimRequest,
        classification: &ClassificationResult,
    ) -> ActivityResult<NotificationReceipt> {
        let line = format!(
            "notify claim_id={} claim_type={} reviewer_action=estimate_required",
            request.claim_id, classification.classification.claim_type
        );
        self.log
            .append(&line)
            .map_err(|err| ActivityError::new(format!("reviewer notification failed: {err}")))?;
        Ok(NotificationReceipt {
            notification_sent: true,
            channel: "log".to_string(),
            timestamp: utc_rfc3339(),
        })
    }

    fn adjudicate(
        &self,
        claim_id: &str,
        classification: &ClassificationResult,
        approval: &ApprovalDecision,
    ) -> ActivityResult<AdjudicationOutcome> {
        let input = adjudicate::build_adjudication_input(claim_id, classification, approval);
        let result: AdjudicationResult =
            adjudicate::run_adjudicator(&self.agent, claim_id, &input)?;
        Ok(AdjudicationOutcome { input, result })
    }

    fn compose_notification(&self, input: &ComposeInput) -> ActivityResult<ComposeResult> {
        Ok(compose::compose(&self.agent, input))
    }

    fn parse_invoice(
        &self,
        request: &InvoiceRequest,
        contractor: Option<&str>,
    ) -> ActivityResult<ParsedInvoice> {
        classify::parse_invoice(&self.agent, request, contractor)
    }

    fn deliver(&self, email: &ComposedEmail) -> ActivityResult<DeliveryResult> {
        Ok(deliver::deliver(self.mailer.as_ref(), email))
    }

    fn assign_contractor(
        &self,
        stage: &StageId,
        business_key: &str,
    ) -> ActivityResult<AssignOutcome> {
        pool_ops::assign(&self.manager, stage, business_key)
    }

    fn release_contractor(
        &self,
        stage: &StageId,
        business_key: &str,
    ) -> ActivityResult<ReleaseOutcome> {
        pool_ops::release(&self.manager, stage, business_key)
    }

    fn update_counter(
        &self,
        counter: CounterName,
        action: CounterAction,
    ) -> ActivityResult<CounterDelta> {
        pool_ops::update_counter(&self.manager, counter, action)
    }
}
