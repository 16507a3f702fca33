use crate::orchestration::activities::{
    ActivityError, ActivityResult, AssignOutcome, CounterAction, CounterDelta, CounterName,
    ReleaseOutcome,
};
use crate::pool::manager::ContractorManager;
use crate::shared::ids::StageId;
use crate::shared::time::now_secs;
use std::sync::Arc;

/// Places a job on a stage pool. The intake stage additionally drains the
/// received counter so the handoff is one transition.
pub fn assign(
    manager: &Arc<ContractorManager>,
    stage: &StageId,
    business_key: &str,
) -> ActivityResult<AssignOutcome> {
    let now = now_secs();
    let assigned = if manager.intake_stage() == Some(stage) {
        manager.assign_from_received(stage, business_key, now)
    } else {
        manager.assign_job(stage, business_key, now)
    }
    .map_err(|err| ActivityError::new(err.to_string()))?;
    Ok(AssignOutcome {
        queued: assigned.is_none(),
        contractor_name: assigned,
    })
}

pub fn release(
    manager: &Arc<ContractorManager>,
    stage: &StageId,
    business_key: &str,
) -> ActivityResult<ReleaseOutcome> {
    let released = manager
        .complete_job(stage, business_key, now_secs())
        .map_err(|err| ActivityError::new(err.to_string()))?;
    Ok(ReleaseOutcome { released })
}

pub fn update_counter(
    manager: &Arc<ContractorManager>,
    counter: CounterName,
    action: CounterAction,
) -> ActivityResult<CounterDelta> {
    let value = match (counter, action) {
        (CounterName::EmailReceived, CounterAction::Increment) => manager.increment_received(),
        (CounterName::EmailReceived, CounterAction::Decrement) => manager.decrement_received(),
        (CounterName::ReviewWaiting, CounterAction::Increment) => {
            manager.increment_waiting_review()
        }
        (CounterName::ReviewWaiting, CounterAction::Decrement) => {
            manager.decrement_waiting_review()
        }
        (CounterName::EmailSending, CounterAction::Increment) => manager.begin_sending(),
        (CounterName::EmailSending, CounterAction::Decrement) => manager.finish_sending(),
    };
    Ok(CounterDelta {
        counter,
        action,
        value,
    })
}
