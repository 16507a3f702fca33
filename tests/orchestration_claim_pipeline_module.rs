use claimwork::domain::claim::{
    AdjudicationResult, ApprovalDecision, ClaimClassification, ClaimRequest, ClassificationResult,
    ClassifierFlags, ComposeResult, ComposedEmail, DeliveryResult, ExtractedInfo, FinalStatus,
    ReviewDecision, Urgency,
};
use claimwork::domain::invoice::{InvoiceLineItem, InvoiceRequest, ParsedInvoice};
use claimwork::orchestration::activities::{
    Activities, ActivityResult, AdjudicationOutcome, AssignOutcome, ComposeInput, CounterAction,
    CounterDelta, CounterName, NotificationReceipt, ReleaseOutcome,
};
use claimwork::orchestration::claim_pipeline::{ClaimPipeline, SignalOutcome};
use claimwork::orchestration::error::OrchestratorError;
use claimwork::orchestration::run_store::{PipelineStep, RunState, RunStore};
use claimwork::shared::ids::StageId;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

#[derive(Default)]
struct FakeActivities {
    calls: Mutex<Vec<String>>,
    fail_compose: bool,
}

impl FakeActivities {
    fn failing_compose() -> Self {
        FakeActivities {
            calls: Mutex::new(Vec::new()),
            fail_compose: true,
        }
    }

    fn record(&self, name: &str) {
        self.calls.lock().expect("calls lock").push(name.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

fn canned_classification(claim_id: &str) -> ClassificationResult {
    ClassificationResult {
        claim_id: claim_id.to_string(),
        classification: ClaimClassification {
            claim_type: "VSC".to_string(),
            sub_type: Some("Mechanical".to_string()),
            component_category: Some("Transmission".to_string()),
            urgency: Urgency::Standard,
        },
        justification: "transmission failure described in email".to_string(),
        confidence_score: 0.9,
        flags: ClassifierFlags::default(),
        email_body_extraction: None,
        document_extraction: None,
        extracted_info: ExtractedInfo {
            claimant_name: Some("John Smith".to_string()),
            claimant_email: Some("john@example.com".to_string()),
            ..ExtractedInfo::default()
        },
    }
}

impl Activities for FakeActivities {
    fn classify(
        &self,
        request: &ClaimRequest,
        _contractor: Option<&str>,
    ) -> ActivityResult<ClassificationResult> {
        self.record("classify");
        Ok(canned_classification(&request.claim_id))
    }

    fn notify_reviewer(
        &self,
        _request: &ClaimRequest,
        _classification: &ClassificationResult,
    ) -> ActivityResult<NotificationReceipt> {
        self.record("notify");
        Ok(NotificationReceipt {
            notification_sent: true,
            channel: "log".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        })
    }

    fn adjudicate(
        &self,
        claim_id: &str,
        _classification: &ClassificationResult,
        _approval: &ApprovalDecision,
    ) -> ActivityResult<AdjudicationOutcome> {
        self.record("adjudicate");
        Ok(AdjudicationOutcome {
            input: serde_json::json!({ "claimId": claim_id }),
            result: AdjudicationResult {
                claim_id: claim_id.to_string(),
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
                reason: "within auto-approve threshold".to_string(),
                evaluation_summary: None,
            },
        })
    }

    fn compose_notification(&self, _input: &ComposeInput) -> ActivityResult<ComposeResult> {
        self.record("compose");
        if self.fail_compose {
            return Ok(ComposeResult::Failed {
                error: "composer unavailable".to_string(),
            });
        }
        Ok(ComposeResult::Composed {
            email: ComposedEmail {
                email_subject: "Update on your claim".to_string(),
                email_body: "Dear John Smith, your claim was approved.".to_string(),
                recipient_name: Some("John Smith".to_string()),
                recipient_email: "john@example.com".to_string(),
            },
        })
    }

    fn parse_invoice(
        &self,
        request: &InvoiceRequest,
        _contractor: Option<&str>,
    ) -> ActivityResult<ParsedInvoice> {
        self.record("parse_invoice");
        Ok(ParsedInvoice {
            invoice_id: request.invoice_id.clone(),
            shop_name: request.shop_name.clone(),
            line_items: vec![InvoiceLineItem {
                description: "Labor".to_string(),
                amount: 437.5,
            }],
            subtotal: Some(437.5),
            tax: Some(0.0),
            total: 437.5,
            invoice_date: None,
            notes: None,
        })
    }

    fn deliver(&self, email: &ComposedEmail) -> ActivityResult<DeliveryResult> {
        self.record("deliver");
        Ok(DeliveryResult {
            success: true,
            delivered_to: vec![email.recipient_email.clone()],
            transport: "fake".to_string(),
            errors: Vec::new(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        })
    }

    fn assign_contractor(
        &self,
        stage: &StageId,
        _business_key: &str,
    ) -> ActivityResult<AssignOutcome> {
        self.record(&format!("assign_{stage}"));
        Ok(AssignOutcome {
            contractor_name: Some("AIContractor Alice".to_string()),
            queued: false,
        })
    }

    fn release_contractor(
        &self,
        stage: &StageId,
        _business_key: &str,
    ) -> ActivityResult<ReleaseOutcome> {
        self.record(&format!("release_{stage}"));
        Ok(ReleaseOutcome { released: true })
    }

    fn update_counter(
        &self,
        counter: CounterName,
        action: CounterAction,
    ) -> ActivityResult<CounterDelta> {
        self.record("counter");
        Ok(CounterDelta {
            counter,
            action,
            value: 1,
        })
    }
}

fn claim_request(claim_id: &str) -> ClaimRequest {
    ClaimRequest {
        claim_id: claim_id.to_string(),
        email_content: "My transmission is grinding when shifting.".to_string(),
        attachment_url: "https://storage.example.com/claims/claim form.pdf".to_string(),
        sender_email: "john@example.com".to_string(),
        metadata: BTreeMap::new(),
    }
}

fn approval(decision: ReviewDecision) -> ApprovalDecision {
    ApprovalDecision {
        decision,
        reviewer: "reviewer@example.com".to_string(),
        comments: "estimate verified".to_string(),
        timestamp: "2026-01-01T01:00:00Z".to_string(),
        claim_amounts: None,
        claim_data: None,
    }
}

fn pipeline(root: &std::path::Path, activities: Arc<FakeActivities>) -> ClaimPipeline {
    ClaimPipeline::new(RunStore::new(root), activities, 3600)
}

fn stage_index(result: &claimwork::domain::claim::ClaimResult, stage: &str) -> usize {
    result
        .stage_timestamps
        .iter()
        .position(|s| s.stage == stage)
        .unwrap_or_else(|| panic!("stage {stage} missing"))
}

#[test]
fn claim_pipeline_module_suspends_for_reviewer_estimate() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::default());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    let run = pipeline.start(&claim_request("CLM-1001"), 100).expect("start");

    assert_eq!(run.run_id, "claim-CLM-1001");
    assert_eq!(run.state, RunState::Waiting);
    assert_eq!(run.step, PipelineStep::AwaitingApproval);
    assert_eq!(run.timeout_deadline, Some(100 + 3600));

    let status = pipeline.store().load_status(&run.run_id).expect("status");
    assert!(status.pending_human_input);
    assert!(status.classification.is_some());
    assert_eq!(status.next_expected_action, "reviewer estimate or timeout");

    let calls = activities.calls();
    assert!(calls.contains(&"classify".to_string()));
    assert!(calls.contains(&"notify".to_string()));
    assert!(!calls.contains(&"adjudicate".to_string()));
}

#[test]
fn claim_pipeline_module_resume_before_deadline_keeps_waiting_without_rework() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::default());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    let run = pipeline.start(&claim_request("CLM-1002"), 100).expect("start");
    let calls_after_start = activities.calls().len();

    let resumed = pipeline.resume(&run.run_id, 200).expect("resume");
    assert_eq!(resumed.state, RunState::Waiting);
    // Everything up to the wait was recorded; the resume replays it.
    assert_eq!(activities.calls().len(), calls_after_start);

    assert!(pipeline.resume_due(200).expect("resume_due").is_empty());
}

#[test]
fn claim_pipeline_module_approved_estimate_runs_to_completion() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::default());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    let run = pipeline.start(&claim_request("CLM-1003"), 100).expect("start");
    let outcome = pipeline
        .deliver_approval(&run.run_id, &approval(ReviewDecision::Approved), 500)
        .expect("deliver approval");
    assert_eq!(outcome, SignalOutcome::Accepted);

    let finished = pipeline.store().load_run(&run.run_id).expect("load run");
    assert_eq!(finished.state, RunState::Completed);
    assert_eq!(finished.step, PipelineStep::Completed);
    assert_eq!(finished.timeout_deadline, None);

    let result = pipeline
        .load_result(&run.run_id)
        .expect("load result")
        .expect("result present");
    assert_eq!(result.status, FinalStatus::Completed);
    assert!(result.adjudication.is_some());
    assert!(matches!(result.email, Some(ComposeResult::Composed { .. })));
    let delivery = result.delivery.as_ref().expect("delivery");
    assert!(delivery.success);
    assert_eq!(delivery.delivered_to, vec!["john@example.com".to_string()]);

    assert!(stage_index(&result, "received") < stage_index(&result, "classifier_started"));
    assert!(stage_index(&result, "classifier_completed") < stage_index(&result, "awaiting_started"));
    assert!(stage_index(&result, "approval_received") < stage_index(&result, "adjudicator_started"));
    assert!(
        stage_index(&result, "email_composer_completed") < stage_index(&result, "completed")
    );
}

#[test]
fn claim_pipeline_module_rejected_estimate_skips_adjudication() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::default());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    let run = pipeline.start(&claim_request("CLM-1004"), 100).expect("start");
    let outcome = pipeline
        .deliver_approval(&run.run_id, &approval(ReviewDecision::Rejected), 500)
        .expect("deliver rejection");
    assert_eq!(outcome, SignalOutcome::Accepted);

    let result = pipeline
        .load_result(&run.run_id)
        .expect("load result")
        .expect("result present");
    assert_eq!(result.status, FinalStatus::Rejected);
    assert!(result.adjudication.is_none());
    assert!(result.email.is_none());
    assert!(result.delivery.is_none());

    let calls = activities.calls();
    assert!(!calls.contains(&"adjudicate".to_string()));
    assert!(!calls.contains(&"compose".to_string()));
    assert!(!calls.contains(&"deliver".to_string()));

    let finished = pipeline.store().load_run(&run.run_id).expect("load run");
    assert_eq!(finished.step, PipelineStep::Rejected);
    assert_eq!(finished.state, RunState::Completed);
}

#[test]
fn claim_pipeline_module_timeout_fires_through_resume_due() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::default());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    let run = pipeline.start(&claim_request("CLM-1005"), 100).expect("start");

    assert!(pipeline.resume_due(3699).expect("early sweep").is_empty());
    let resumed = pipeline.resume_due(100 + 3600).expect("due sweep");
    assert_eq!(resumed, vec![run.run_id.clone()]);

    let result = pipeline
        .load_result(&run.run_id)
        .expect("load result")
        .expect("result present");
    assert_eq!(result.status, FinalStatus::TimedOut);
    assert!(result.approval.is_none());
    assert!(result.adjudication.is_none());
    assert!(!activities.calls().contains(&"adjudicate".to_string()));

    let finished = pipeline.store().load_run(&run.run_id).expect("load run");
    assert_eq!(finished.step, PipelineStep::TimedOut);
    assert_eq!(finished.state, RunState::Completed);
}

#[test]
fn claim_pipeline_module_late_and_duplicate_signals_are_ignored() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::default());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    let run = pipeline.start(&claim_request("CLM-1006"), 100).expect("start");
    pipeline
        .deliver_approval(&run.run_id, &approval(ReviewDecision::Approved), 500)
        .expect("first signal");

    let late = pipeline
        .deliver_approval(&run.run_id, &approval(ReviewDecision::Rejected), 600)
        .expect("late signal");
    assert_eq!(late, SignalOutcome::Ignored);

    let result = pipeline
        .load_result(&run.run_id)
        .expect("load result")
        .expect("result present");
    assert_eq!(result.status, FinalStatus::Completed);
}

#[test]
fn claim_pipeline_module_signal_before_wait_is_rejected() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::default());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    // A run that exists but never executed is still at the received step.
    let request = claim_request("CLM-1007");
    let inputs = serde_json::to_value(&request).expect("encode");
    pipeline
        .store()
        .create_run(
            "claim-CLM-1007",
            &request.claim_id,
            claimwork::orchestration::run_store::WorkflowKind::Claim,
            inputs,
            100,
        )
        .expect("create run");

    let err = pipeline
        .deliver_approval("claim-CLM-1007", &approval(ReviewDecision::Approved), 200)
        .expect_err("signal should be rejected");
    assert!(matches!(err, OrchestratorError::NotAwaitingInput { .. }));
}

#[test]
fn claim_pipeline_module_duplicate_start_is_rejected_until_terminal() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::default());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    let run = pipeline.start(&claim_request("CLM-1008"), 100).expect("start");
    let err = pipeline
        .start(&claim_request("CLM-1008"), 200)
        .expect_err("duplicate start");
    assert!(matches!(err, OrchestratorError::AlreadyRunning { .. }));

    pipeline
        .deliver_approval(&run.run_id, &approval(ReviewDecision::Approved), 500)
        .expect("finish first run");

    // Terminal runs are wiped and replaced by a fresh start.
    let second = pipeline.start(&claim_request("CLM-1008"), 900).expect("restart");
    assert_eq!(second.started_at, 900);
}

#[test]
fn claim_pipeline_module_compose_failure_degrades_and_skips_delivery() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::failing_compose());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    let run = pipeline.start(&claim_request("CLM-1009"), 100).expect("start");
    pipeline
        .deliver_approval(&run.run_id, &approval(ReviewDecision::Approved), 500)
        .expect("deliver approval");

    let result = pipeline
        .load_result(&run.run_id)
        .expect("load result")
        .expect("result present");
    assert_eq!(result.status, FinalStatus::Completed);
    assert!(matches!(result.email, Some(ComposeResult::Failed { .. })));
    assert!(result.delivery.is_none());
    assert!(!activities.calls().contains(&"deliver".to_string()));
}

#[test]
fn claim_pipeline_module_replay_rebuilds_result_without_live_calls() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::default());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    let run = pipeline.start(&claim_request("CLM-1010"), 100).expect("start");
    pipeline
        .deliver_approval(&run.run_id, &approval(ReviewDecision::Approved), 500)
        .expect("deliver approval");
    let stored = pipeline
        .load_result(&run.run_id)
        .expect("load result")
        .expect("result present");

    let silent = Arc::new(FakeActivities::default());
    let verifier = ClaimPipeline::new(RunStore::new(temp.path()), Arc::clone(&silent) as Arc<dyn Activities>, 3600);
    let replayed = verifier.replay_result(&run.run_id, 9999).expect("replay");

    assert!(silent.calls().is_empty());
    assert_eq!(replayed.status, stored.status);
    assert_eq!(replayed.claim_id, stored.claim_id);
    assert_eq!(replayed.adjudication, stored.adjudication);
    assert_eq!(replayed.email, stored.email);
    assert_eq!(replayed.stage_timestamps, stored.stage_timestamps);
}

#[test]
fn claim_pipeline_module_replay_of_waiting_run_is_incomplete() {
    let temp = tempdir().expect("tempdir");
    let activities = Arc::new(FakeActivities::default());
    let pipeline = pipeline(temp.path(), Arc::clone(&activities));

    let run = pipeline.start(&claim_request("CLM-1011"), 100).expect("start");
    let err = pipeline
        .replay_result(&run.run_id, 200)
        .expect_err("waiting run has no terminal result");
    assert!(matches!(err, OrchestratorError::ReplayIncomplete { .. }));
}
