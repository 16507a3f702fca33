pub mod contractor;
pub mod event_log;
pub mod manager;
pub(crate) mod simulation;

use crate::shared::ids::StageId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no pool is configured for stage `{stage}`")]
    UnknownStage { stage: StageId },
    #[error(
        "stage `{stage}` needs another contractor but only {defined} identities are defined"
    )]
    RosterExhausted { stage: StageId, defined: usize },
    #[error("pool lock for stage `{stage}` is poisoned")]
    Poisoned { stage: StageId },
}
