use claimwork::config::{ContractorIdentity, PoolSettings, StagePoolConfig};
use claimwork::pool::manager::ContractorManager;
use claimwork::pool::PoolError;
use claimwork::shared::ids::StageId;
use std::collections::BTreeMap;

fn stage(raw: &str) -> StageId {
    StageId::parse(raw).expect("stage id")
}

fn roster(names: &[&str]) -> Vec<ContractorIdentity> {
    names
        .iter()
        .map(|name| ContractorIdentity {
            name: (*name).to_string(),
            color: "#7c5cfc".to_string(),
        })
        .collect()
}

fn settings() -> PoolSettings {
    let mut stages = BTreeMap::new();
    stages.insert(
        stage("classifier"),
        StagePoolConfig {
            display_name: "Claims Classification".to_string(),
            capacity: 1,
            max_contractors: 2,
            expected_duration_secs: 10,
            contractors: roster(&["Alice", "Bob"]),
        },
    );
    stages.insert(
        stage("adjudicator"),
        StagePoolConfig {
            display_name: "Claims Adjudication".to_string(),
            capacity: 2,
            max_contractors: 2,
            expected_duration_secs: 10,
            contractors: roster(&["Priya", "David"]),
        },
    );
    PoolSettings {
        stages,
        intake_stage: Some(stage("classifier")),
        event_log_size: 10,
        progress_tick_ms: 500,
        progress_cap: 95,
    }
}

#[test]
fn manager_module_routes_jobs_to_the_named_stage() {
    let manager = ContractorManager::new(&settings());

    let assigned = manager
        .assign_job(&stage("adjudicator"), "CLM-1", 100)
        .expect("assign");
    assert_eq!(assigned, Some("Priya".to_string()));

    let err = manager
        .assign_job(&stage("mystery"), "CLM-1", 100)
        .expect_err("unknown stage");
    assert!(matches!(err, PoolError::UnknownStage { .. }));

    assert!(manager
        .complete_job(&stage("adjudicator"), "CLM-1", 110)
        .expect("complete"));
}

#[test]
fn manager_module_intake_assignment_consumes_received_counter() {
    let manager = ContractorManager::new(&settings());

    assert_eq!(manager.increment_received(), 1);
    assert_eq!(manager.increment_received(), 2);

    manager
        .assign_from_received(&stage("classifier"), "CLM-1", 100)
        .expect("intake assign");
    assert_eq!(manager.received_count(), 1);
}

#[test]
fn manager_module_counters_saturate_at_zero() {
    let manager = ContractorManager::new(&settings());

    assert_eq!(manager.decrement_received(), 0);
    assert_eq!(manager.decrement_waiting_review(), 0);

    assert_eq!(manager.increment_waiting_review(), 1);
    assert_eq!(manager.decrement_waiting_review(), 0);
    assert_eq!(manager.decrement_waiting_review(), 0);
}

#[test]
fn manager_module_sending_counter_moves_into_sent_total() {
    let manager = ContractorManager::new(&settings());

    manager.begin_sending();
    manager.begin_sending();
    assert_eq!(manager.sending_counts(), (2, 0));

    manager.finish_sending();
    assert_eq!(manager.sending_counts(), (1, 1));
    manager.finish_sending();
    assert_eq!(manager.sending_counts(), (0, 2));

    // Finishing with nothing in flight never underflows the in-flight count.
    manager.finish_sending();
    assert_eq!(manager.sending_counts(), (0, 3));
}

#[test]
fn manager_module_snapshot_aggregates_pools_and_counters() {
    let manager = ContractorManager::new(&settings());

    manager.increment_received();
    manager.increment_waiting_review();
    manager.begin_sending();
    manager
        .assign_job(&stage("classifier"), "CLM-1", 100)
        .expect("assign classifier");
    manager
        .assign_job(&stage("adjudicator"), "CLM-2", 100)
        .expect("assign adjudicator");
    manager
        .complete_job(&stage("adjudicator"), "CLM-2", 110)
        .expect("complete adjudicator");

    let snap = manager.snapshot().expect("snapshot");
    assert_eq!(snap.email_receiver.display_name, "Email Intake");
    assert_eq!(snap.email_receiver.count, 1);
    assert_eq!(snap.review_desk.display_name, "Review Desk");
    assert_eq!(snap.review_desk.count, 1);
    assert_eq!(snap.email_sender.display_name, "Email Outbox");
    assert_eq!(snap.email_sender.sending, 1);
    assert_eq!(snap.global.jobs_in_flight, 1);
    assert_eq!(snap.global.total_completed, 1);
    assert_eq!(snap.stages.len(), 2);
    assert!(snap.stages.contains_key("classifier"));
    assert!(!snap.events.is_empty());
}

#[test]
fn manager_module_progress_updates_reach_the_right_pool() {
    let manager = ContractorManager::new(&settings());

    manager
        .assign_job(&stage("classifier"), "CLM-1", 100)
        .expect("assign");
    assert!(manager
        .update_progress(&stage("classifier"), "CLM-1", 40)
        .expect("progress"));
    assert!(!manager
        .update_progress(&stage("adjudicator"), "CLM-1", 40)
        .expect("wrong stage"));

    let snap = manager.snapshot().expect("snapshot");
    let classifier = snap.stages.get("classifier").expect("classifier pool");
    assert_eq!(classifier.active_contractors[0].active_jobs[0].progress_pct, 40);
}

#[test]
fn manager_module_config_view_mirrors_settings() {
    let settings = settings();
    let manager = ContractorManager::new(&settings);

    let view = manager.config_view(&settings);
    assert_eq!(view.intake_stage.as_deref(), Some("classifier"));
    let classifier = view.stages.get("classifier").expect("classifier view");
    assert_eq!(classifier.display_name, "Claims Classification");
    assert_eq!(classifier.max_contractors, 2);
    assert_eq!(classifier.contractors.len(), 2);
}
