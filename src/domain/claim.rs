use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Intake payload that starts a claim run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub claim_id: String,
    pub email_content: String,
    pub attachment_url: String,
    pub sender_email: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    Standard,
    Urgent,
    Emergency,
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Standard
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Urgency::Standard => "Standard",
            Urgency::Urgent => "Urgent",
            Urgency::Emergency => "Emergency",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimClassification {
    pub claim_type: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub component_category: Option<String>,
    #[serde(default)]
    pub urgency: Urgency,
}

/// Fields a classifier can lift out of free text. The same shape covers the
/// email body and the attachment, which keeps the merge below symmetric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailBodyExtraction {
    #[serde(default)]
    pub claimant_name: Option<String>,
    #[serde(default)]
    pub claimant_phone: Option<String>,
    #[serde(default)]
    pub claimant_address: Option<String>,
    #[serde(default)]
    pub contract_number: Option<String>,
    #[serde(default)]
    pub vehicle_year: Option<i32>,
    #[serde(default)]
    pub vehicle_make: Option<String>,
    #[serde(default)]
    pub vehicle_model: Option<String>,
    #[serde(default)]
    pub vehicle_vin: Option<String>,
    #[serde(default)]
    pub issue_summary: Option<String>,
    #[serde(default)]
    pub repair_facility: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub total_parts: Option<f64>,
    #[serde(default)]
    pub total_labor: Option<f64>,
    #[serde(default)]
    pub total_estimate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Success,
    Failed,
    NotAccessible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentExtraction {
    pub status: ExtractionStatus,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub extracted_fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DocumentExtraction {
    /// Reads the free-form extracted fields back into the shared extraction
    /// shape; unknown keys are dropped, wrong-typed values become None.
    pub fn typed_fields(&self) -> EmailBodyExtraction {
        let raw = Value::Object(
            self.extracted_fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        lenient_extraction(&raw)
    }
}

fn lenient_extraction(raw: &Value) -> EmailBodyExtraction {
    // Field-by-field so one malformed value does not discard the rest.
    let get = |key: &str| raw.get(key);
    let text = |key: &str| get(key).and_then(Value::as_str).map(str::to_string);
    let number = |key: &str| get(key).and_then(Value::as_f64);
    EmailBodyExtraction {
        claimant_name: text("claimantName"),
        claimant_phone: text("claimantPhone"),
        claimant_address: text("claimantAddress"),
        contract_number: text("contractNumber"),
        vehicle_year: get("vehicleYear").and_then(Value::as_i64).map(|v| v as i32),
        vehicle_make: text("vehicleMake"),
        vehicle_model: text("vehicleModel"),
        vehicle_vin: text("vehicleVin"),
        issue_summary: text("issueSummary"),
        repair_facility: text("repairFacility"),
        diagnosis: text("diagnosis"),
        total_parts: number("totalParts"),
        total_labor: number("totalLabor"),
        total_estimate: number("totalEstimate"),
    }
}

/// Merged view across email body and attachment extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedInfo {
    #[serde(default)]
    pub claimant_name: Option<String>,
    #[serde(default)]
    pub claimant_email: Option<String>,
    #[serde(default)]
    pub claimant_phone: Option<String>,
    #[serde(default)]
    pub claimant_address: Option<String>,
    #[serde(default)]
    pub contract_number: Option<String>,
    #[serde(default)]
    pub vehicle_year: Option<i32>,
    #[serde(default)]
    pub vehicle_make: Option<String>,
    #[serde(default)]
    pub vehicle_model: Option<String>,
    #[serde(default)]
    pub vehicle_vin: Option<String>,
    #[serde(default)]
    pub issue_summary: Option<String>,
    #[serde(default)]
    pub repair_facility: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub total_parts: Option<f64>,
    #[serde(default)]
    pub total_labor: Option<f64>,
    #[serde(default)]
    pub total_estimate: Option<f64>,
}

/// Merge precedence: the attachment wins for every field except
/// `issue_summary`, where the customer's own words from the email win.
/// `claimant_email` is always taken from the sender address.
pub fn merge_extractions(
    email: Option<&EmailBodyExtraction>,
    document: Option<&EmailBodyExtraction>,
    sender_email: &str,
) -> ExtractedInfo {
    let blank = EmailBodyExtraction::default();
    let email = email.unwrap_or(&blank);
    let document = document.unwrap_or(&blank);
    fn pick<T: Clone>(primary: &Option<T>, fallback: &Option<T>) -> Option<T> {
        primary.clone().or_else(|| fallback.clone())
    }
    ExtractedInfo {
        claimant_name: pick(&document.claimant_name, &email.claimant_name),
        claimant_email: Some(sender_email.to_string()),
        claimant_phone: pick(&document.claimant_phone, &email.claimant_phone),
        claimant_address: pick(&document.claimant_address, &email.claimant_address),
        contract_number: pick(&document.contract_number, &email.contract_number),
        vehicle_year: pick(&document.vehicle_year, &email.vehicle_year),
        vehicle_make: pick(&document.vehicle_make, &email.vehicle_make),
        vehicle_model: pick(&document.vehicle_model, &email.vehicle_model),
        vehicle_vin: pick(&document.vehicle_vin, &email.vehicle_vin),
        issue_summary: pick(&email.issue_summary, &document.issue_summary),
        repair_facility: pick(&document.repair_facility, &email.repair_facility),
        diagnosis: pick(&document.diagnosis, &email.diagnosis),
        total_parts: pick(&document.total_parts, &email.total_parts),
        total_labor: pick(&document.total_labor, &email.total_labor),
        total_estimate: pick(&document.total_estimate, &email.total_estimate),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierFlags {
    #[serde(default)]
    pub requires_human_review: bool,
    #[serde(default)]
    pub missing_information: Vec<String>,
    #[serde(default)]
    pub potential_concerns: Vec<String>,
}

/// Full classifier stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub claim_id: String,
    pub classification: ClaimClassification,
    pub justification: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub flags: ClassifierFlags,
    #[serde(default)]
    pub email_body_extraction: Option<EmailBodyExtraction>,
    #[serde(default)]
    pub document_extraction: Option<DocumentExtraction>,
    #[serde(default)]
    pub extracted_info: ExtractedInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimAmounts {
    pub total_parts_cost: f64,
    pub total_labor_cost: f64,
    pub total_estimate: f64,
    #[serde(default)]
    pub deductible: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

/// Manual estimate submission from the review desk. The reviewer does not
/// adjudicate; `approved` means "proceed to the adjudicator".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub decision: ReviewDecision,
    pub reviewer: String,
    #[serde(default)]
    pub comments: String,
    pub timestamp: String,
    #[serde(default)]
    pub claim_amounts: Option<ClaimAmounts>,
    /// Complete adjudication input entered by the reviewer. When present it
    /// overrides everything the classifier extracted.
    #[serde(default)]
    pub claim_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    pub contract_status: String,
    pub coverage_valid: bool,
    pub mileage_valid: bool,
    pub estimate_amount: f64,
    pub auto_approve_threshold: f64,
    pub within_threshold: bool,
    pub facility_authorized: bool,
    pub documents_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjudicationResult {
    pub claim_id: String,
    /// APPROVED, DENIED, MANUAL_REVIEW, REQUEST_DOCUMENTS.
    pub decision: String,
    #[serde(default = "default_decision_type")]
    pub decision_type: String,
    #[serde(default)]
    pub approved_amount: Option<f64>,
    #[serde(default)]
    pub deductible_applied: Option<f64>,
    #[serde(default)]
    pub missing_documents: Vec<Value>,
    #[serde(default)]
    pub rules_evaluated: Vec<Value>,
    #[serde(default)]
    pub rules_passed: Vec<Value>,
    #[serde(default)]
    pub rules_failed: Vec<Value>,
    #[serde(default)]
    pub rules_triggered: Vec<Value>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assigned_queue: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub evaluation_summary: Option<EvaluationSummary>,
}

fn default_decision_type() -> String {
    "AUTO".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedEmail {
    pub email_subject: String,
    pub email_body: String,
    #[serde(default)]
    pub recipient_name: Option<String>,
    pub recipient_email: String,
}

/// Composer output. A failed compose is data, not an error, so the pipeline
/// can finish and record what went wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ComposeResult {
    Composed { email: ComposedEmail },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub success: bool,
    #[serde(default)]
    pub delivered_to: Vec<String>,
    pub transport: String,
    #[serde(default)]
    pub errors: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Completed,
    Rejected,
    TimedOut,
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FinalStatus::Completed => "completed",
            FinalStatus::Rejected => "rejected",
            FinalStatus::TimedOut => "timed_out",
        };
        f.write_str(label)
    }
}

/// Terminal document for a claim run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResult {
    pub claim_id: String,
    pub status: FinalStatus,
    #[serde(default)]
    pub classification: Option<ClassificationResult>,
    #[serde(default)]
    pub approval: Option<ApprovalDecision>,
    #[serde(default)]
    pub adjudication_input: Option<Value>,
    #[serde(default)]
    pub adjudication: Option<AdjudicationResult>,
    #[serde(default)]
    pub email: Option<ComposeResult>,
    #[serde(default)]
    pub delivery: Option<DeliveryResult>,
    pub stage_timestamps: Vec<StageStamp>,
    pub started_at: i64,
    pub completed_at: i64,
}

/// One milestone in a run's timeline. Kept as an append-only list so the
/// order of insertion survives serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStamp {
    pub stage: String,
    pub at: i64,
}
