use claimwork::activities::adjudicate::build_adjudication_input;
use claimwork::activities::compose::compose;
use claimwork::activities::deliver::{deliver, LogMailer, Mailer};
use claimwork::agent::client::AgentClient;
use claimwork::config::{AgentSettings, ContractorIdentity, PoolSettings, StagePoolConfig};
use claimwork::domain::claim::{
    AdjudicationResult, ApprovalDecision, ClaimAmounts, ClaimClassification, ClassificationResult,
    ClassifierFlags, ComposeResult, ComposedEmail, DocumentExtraction, ExtractedInfo,
    ExtractionStatus, ReviewDecision, Urgency,
};
use claimwork::orchestration::activities::{ComposeInput, CounterAction, CounterName};
use claimwork::pool::manager::ContractorManager;
use claimwork::shared::ids::StageId;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use tempfile::tempdir;

fn mock_agent() -> AgentClient {
    AgentClient::new(AgentSettings {
        endpoint: "http://127.0.0.1:1".to_string(),
        api_key: None,
        mock_mode: true,
        max_attempts: 1,
        retry_backoff_ms: 0,
    })
}

fn classification() -> ClassificationResult {
    ClassificationResult {
        claim_id: "CLM-1".to_string(),
        classification: ClaimClassification {
            claim_type: "VSC".to_string(),
            sub_type: Some("Mechanical".to_string()),
            component_category: Some("Transmission".to_string()),
            urgency: Urgency::Standard,
        },
        justification: "transmission failure".to_string(),
        confidence_score: 0.9,
        flags: ClassifierFlags::default(),
        email_body_extraction: None,
        document_extraction: Some(DocumentExtraction {
            status: ExtractionStatus::Success,
            document_type: Some("claim_form".to_string()),
            summary: None,
            extracted_fields: BTreeMap::new(),
            notes: None,
        }),
        extracted_info: ExtractedInfo {
            claimant_name: Some("John Smith".to_string()),
            claimant_email: Some("john@example.com".to_string()),
            contract_number: Some("VSC-2024-78542".to_string()),
            ..ExtractedInfo::default()
        },
    }
}

fn approval(amounts: Option<ClaimAmounts>) -> ApprovalDecision {
    ApprovalDecision {
        decision: ReviewDecision::Approved,
        reviewer: "reviewer@example.com".to_string(),
        comments: "looks right".to_string(),
        timestamp: "2026-01-01T01:00:00Z".to_string(),
        claim_amounts: amounts,
        claim_data: None,
    }
}

#[test]
fn activities_module_classify_recomputes_merged_extraction() {
    let agent = mock_agent();
    let request = claimwork::domain::claim::ClaimRequest {
        claim_id: "CLM-42".to_string(),
        email_content: "Transmission is grinding when shifting.".to_string(),
        attachment_url: "https://storage.example.com/claims/claim form.pdf".to_string(),
        sender_email: "customer@example.com".to_string(),
        metadata: BTreeMap::new(),
    };

    let result = claimwork::activities::classify::classify_claim(&agent, &request, Some("Alice"))
        .expect("classify");

    assert_eq!(result.claim_id, "CLM-42");
    // The document wins for identity fields.
    assert_eq!(result.extracted_info.claimant_name.as_deref(), Some("John Smith"));
    // The email body wins for the issue summary.
    assert_eq!(
        result.extracted_info.issue_summary.as_deref(),
        Some("Transmission issues reported - grinding noise when shifting")
    );
    // The sender address always wins.
    assert_eq!(
        result.extracted_info.claimant_email.as_deref(),
        Some("customer@example.com")
    );
}

#[test]
fn activities_module_adjudication_input_uses_reviewer_amounts() {
    let amounts = ClaimAmounts {
        total_parts_cost: 330.0,
        total_labor_cost: 437.5,
        total_estimate: 767.5,
        deductible: 150.0,
    };
    let input = build_adjudication_input("CLM-1", &classification(), &approval(Some(amounts)));

    assert_eq!(input["claimId"], "CLM-1");
    assert_eq!(input["repair"]["totalEstimate"], 767.5);
    assert_eq!(input["repair"]["totalParts"], 330.0);
    assert_eq!(input["repair"]["repairType"], "Mechanical - Transmission");
    assert_eq!(input["contract"]["deductible"], 150.0);
    assert_eq!(input["contract"]["contractNumber"], "VSC-2024-78542");
    assert_eq!(input["claimant"]["email"], "john@example.com");
    assert_eq!(input["documents"]["claimForm"], true);
    assert_eq!(input["metadata"]["dataSource"], "classifier_extraction");
    assert_eq!(input["metadata"]["reviewer"], "reviewer@example.com");
}

#[test]
fn activities_module_adjudication_input_falls_back_to_contract_defaults() {
    let input = build_adjudication_input("CLM-1", &classification(), &approval(None));

    assert_eq!(input["contract"]["deductible"], 100.0);
    assert_eq!(input["contract"]["maxClaimAmount"], 5000);
    assert_eq!(input["contract"]["mileageLimit"], 100000);
    assert_eq!(input["contract"]["coverageLevel"], "Gold");
    assert_eq!(input["repair"]["totalEstimate"], 0.0);
}

#[test]
fn activities_module_reviewer_claim_data_overrides_extraction() {
    let mut decision = approval(None);
    decision.claim_data = Some(json!({
        "claimant": { "name": "Corrected Name" },
        "contract": { "deductible": 500.0 },
        "repair": { "totalEstimate": 2200.0 }
    }));

    let input = build_adjudication_input("CLM-1", &classification(), &decision);

    assert_eq!(input["claimant"]["name"], "Corrected Name");
    assert_eq!(input["contract"]["deductible"], 500.0);
    assert_eq!(input["repair"]["totalEstimate"], 2200.0);
    // Sections the reviewer omitted come back empty, not from extraction.
    assert_eq!(input["vehicle"], json!({}));
    assert_eq!(input["metadata"]["dataSource"], "reviewer_claim_data");
}

#[test]
fn activities_module_compose_addresses_the_claimant() {
    let agent = mock_agent();
    let input = ComposeInput::ClaimDecision {
        classification: classification(),
        adjudication: AdjudicationResult {
            claim_id: "CLM-1".to_string(),
            decision: "APPROVED".to_string(),
            decision_type: "AUTO".to_string(),
            approved_amount: Some(667.5),
            deductible_applied: Some(100.0),
            missing_documents: Vec::new(),
            rules_evaluated: Vec::new(),
            rules_passed: Vec::new(),
            rules_failed: Vec::new(),
            rules_triggered: Vec::new(),
            priority: None,
            assigned_queue: None,
            reason: "within threshold".to_string(),
            evaluation_summary: None,
        },
    };

    let result = compose(&agent, &input);
    let ComposeResult::Composed { email } = result else {
        panic!("expected composed email");
    };
    assert_eq!(email.recipient_email, "john@example.com");
    assert_eq!(email.recipient_name.as_deref(), Some("John Smith"));
    assert!(!email.email_subject.is_empty());
    assert!(!email.email_body.is_empty());
}

#[test]
fn activities_module_compose_without_recipient_degrades() {
    let agent = mock_agent();
    let mut classification = classification();
    classification.extracted_info.claimant_email = None;
    let input = ComposeInput::ClaimDecision {
        classification,
        adjudication: AdjudicationResult {
            claim_id: "CLM-1".to_string(),
            decision: "DENIED".to_string(),
            decision_type: "AUTO".to_string(),
            approved_amount: None,
            deductible_applied: None,
            missing_documents: Vec::new(),
            rules_evaluated: Vec::new(),
            rules_passed: Vec::new(),
            rules_failed: Vec::new(),
            rules_triggered: Vec::new(),
            priority: None,
            assigned_queue: None,
            reason: "coverage lapsed".to_string(),
            evaluation_summary: None,
        },
    };

    let result = compose(&agent, &input);
    assert!(matches!(result, ComposeResult::Failed { ref error } if error.contains("recipient")));
}

#[test]
fn activities_module_log_mailer_records_delivery() {
    let temp = tempdir().expect("tempdir");
    let mailer = LogMailer::new(temp.path().to_path_buf());
    let email = ComposedEmail {
        email_subject: "Update on your claim".to_string(),
        email_body: "Dear John Smith, your claim was approved.".to_string(),
        recipient_name: Some("John Smith".to_string()),
        recipient_email: "john@example.com".to_string(),
    };

    let result = deliver(&mailer, &email);

    assert!(result.success);
    assert_eq!(result.transport, "log");
    assert_eq!(result.delivered_to, vec!["john@example.com".to_string()]);
    assert!(result.errors.is_empty());

    let log = fs::read_to_string(temp.path().join("logs/orchestrator.log")).expect("log file");
    assert!(log.contains("deliver to=john@example.com"));
}

#[test]
fn activities_module_failing_mailer_reports_errors() {
    struct RefusingMailer;
    impl Mailer for RefusingMailer {
        fn transport(&self) -> &str {
            "smtp"
        }
        fn send(&self, _email: &ComposedEmail) -> Result<(), String> {
            Err("connection refused".to_string())
        }
    }

    let email = ComposedEmail {
        email_subject: "s".to_string(),
        email_body: "b".to_string(),
        recipient_name: None,
        recipient_email: "john@example.com".to_string(),
    };
    let result = deliver(&RefusingMailer, &email);

    assert!(!result.success);
    assert!(result.delivered_to.is_empty());
    assert_eq!(result.errors, vec!["connection refused".to_string()]);
}

fn pool_settings() -> PoolSettings {
    let mut stages = BTreeMap::new();
    stages.insert(
        StageId::parse("classifier").expect("stage id"),
        StagePoolConfig {
            display_name: "Claims Classification".to_string(),
            capacity: 2,
            max_contractors: 1,
            expected_duration_secs: 10,
            contractors: vec![ContractorIdentity {
                name: "Alice".to_string(),
                color: "#2dd4a8".to_string(),
            }],
        },
    );
    PoolSettings {
        stages,
        intake_stage: Some(StageId::parse("classifier").expect("stage id")),
        event_log_size: 10,
        progress_tick_ms: 500,
        progress_cap: 95,
    }
}

#[test]
fn activities_module_intake_assignment_consumes_received() {
    let manager = ContractorManager::new(&pool_settings());
    manager.increment_received();

    let stage = StageId::parse("classifier").expect("stage id");
    let outcome =
        claimwork::activities::pool_ops::assign(&manager, &stage, "CLM-1").expect("assign");
    assert_eq!(outcome.contractor_name.as_deref(), Some("Alice"));
    assert!(!outcome.queued);
    assert_eq!(manager.received_count(), 0);

    let release =
        claimwork::activities::pool_ops::release(&manager, &stage, "CLM-1").expect("release");
    assert!(release.released);
}

#[test]
fn activities_module_counter_updates_route_by_name() {
    let manager = ContractorManager::new(&pool_settings());

    let delta = claimwork::activities::pool_ops::update_counter(
        &manager,
        CounterName::EmailReceived,
        CounterAction::Increment,
    )
    .expect("increment");
    assert_eq!(delta.value, 1);
    assert_eq!(manager.received_count(), 1);

    claimwork::activities::pool_ops::update_counter(
        &manager,
        CounterName::EmailSending,
        CounterAction::Increment,
    )
    .expect("begin sending");
    let delta = claimwork::activities::pool_ops::update_counter(
        &manager,
        CounterName::EmailSending,
        CounterAction::Decrement,
    )
    .expect("finish sending");
    assert_eq!(delta.value, 1, "decrement reports the lifetime sent total");
    assert_eq!(manager.sending_counts(), (0, 1));
}
