use crate::domain::claim::{
    AdjudicationResult, ApprovalDecision, ClaimRequest, ClassificationResult, ComposeResult,
    ComposedEmail, DeliveryResult,
};
use crate::domain::invoice::{InvoiceRequest, ParsedInvoice};
use crate::shared::ids::StageId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure surfaced by an activity implementation. Whether it aborts the run
/// or degrades into structured data is the pipeline's call, not the
/// activity's.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct ActivityError {
    pub reason: String,
}

impl ActivityError {
    pub fn new(reason: impl Into<String>) -> Self {
        ActivityError {
            reason: reason.into(),
        }
    }
}

pub type ActivityResult<T> = Result<T, ActivityError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignOutcome {
    #[serde(default)]
    pub contractor_name: Option<String>,
    pub queued: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseOutcome {
    pub released: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReceipt {
    pub notification_sent: bool,
    pub channel: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterName {
    EmailReceived,
    ReviewWaiting,
    EmailSending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterAction {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDelta {
    pub counter: CounterName,
    pub action: CounterAction,
    pub value: u64,
}

/// Adjudication returns both the structured input that was built for the
/// agent and the agent's verdict, so the final result can show its work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjudicationOutcome {
    pub input: Value,
    pub result: AdjudicationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ComposeInput {
    ClaimDecision {
        classification: ClassificationResult,
        adjudication: AdjudicationResult,
    },
    InvoiceAck {
        parsed: ParsedInvoice,
        shop_name: String,
        shop_email: String,
    },
}

/// Everything a pipeline calls out to. One call site per recording name; all
/// implementations must be safe to invoke at least once per recording.
pub trait Activities: Send + Sync {
    fn classify(
        &self,
        request: &ClaimRequest,
        contractor: Option<&str>,
    ) -> ActivityResult<ClassificationResult>;

    fn notify_reviewer(
        &self,
        request: &ClaimRequest,
        classification: &ClassificationResult,
    ) -> ActivityResult<NotificationReceipt>;

    fn adjudicate(
        &self,
        claim_id: &str,
        classification: &ClassificationResult,
        approval: &ApprovalDecision,
    ) -> ActivityResult<AdjudicationOutcome>;

    /// Never aborts the run: implementation failures come back as
    /// `ComposeResult::Failed`.
    fn compose_notification(&self, input: &ComposeInput) -> ActivityResult<ComposeResult>;

    fn parse_invoice(
        &self,
        request: &InvoiceRequest,
        contractor: Option<&str>,
    ) -> ActivityResult<ParsedInvoice>;

    /// Never aborts the run: transport failures come back as an unsuccessful
    /// `DeliveryResult`.
    fn deliver(&self, email: &ComposedEmail) -> ActivityResult<DeliveryResult>;

    fn assign_contractor(&self, stage: &StageId, business_key: &str)
        -> ActivityResult<AssignOutcome>;

    fn release_contractor(
        &self,
        stage: &StageId,
        business_key: &str,
    ) -> ActivityResult<ReleaseOutcome>;

    fn update_counter(
        &self,
        counter: CounterName,
        action: CounterAction,
    ) -> ActivityResult<CounterDelta>;
}
