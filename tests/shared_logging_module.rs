use claimwork::shared::logging::OrchestratorLog;
use std::fs;
use tempfile::tempdir;

#[test]
fn logging_module_appends_under_the_state_root() {
    let temp = tempdir().expect("tempdir");
    let log = OrchestratorLog::new(temp.path());

    log.append("first line").expect("append");
    log.append("second line").expect("append again");

    let contents = fs::read_to_string(temp.path().join("logs/orchestrator.log")).expect("read");
    assert_eq!(contents, "first line\nsecond line\n");
}

#[test]
fn logging_module_run_events_carry_clock_and_run_id() {
    let temp = tempdir().expect("tempdir");
    let log = OrchestratorLog::new(temp.path());

    log.run_event(1700000000, "claim-CLM-1", "workflow=claim event=started")
        .expect("run event");

    let contents = fs::read_to_string(log.path()).expect("read");
    assert_eq!(
        contents,
        "ts=1700000000 run_id=claim-CLM-1 workflow=claim event=started\n"
    );
}
