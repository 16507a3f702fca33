use crate::config::{ContractorIdentity, PoolSettings};
use crate::pool::contractor::{ContractorPool, PoolSnapshot};
use crate::pool::event_log::{EventLog, PoolEvent};
use crate::pool::simulation::{self, SimulationHandle};
use crate::pool::PoolError;
use crate::shared::ids::StageId;
use crate::shared::time::utc_rfc3339;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub display_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySnapshot {
    pub display_name: String,
    pub sending: u64,
    pub sent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSnapshot {
    pub jobs_in_flight: usize,
    pub total_completed: u64,
}

/// Point-in-time dashboard state across every pool and counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerSnapshot {
    pub timestamp: String,
    pub stages: BTreeMap<String, PoolSnapshot>,
    pub email_receiver: CounterSnapshot,
    pub review_desk: CounterSnapshot,
    pub email_sender: DeliverySnapshot,
    pub global: GlobalSnapshot,
    pub events: Vec<PoolEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfigView {
    pub display_name: String,
    pub capacity: usize,
    pub max_contractors: usize,
    pub contractors: Vec<ContractorIdentity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfigView {
    pub stages: BTreeMap<String, StageConfigView>,
    #[serde(default)]
    pub intake_stage: Option<String>,
}

#[derive(Debug, Default)]
struct DeliveryCounters {
    sending: u64,
    sent: u64,
}

/// Process-wide aggregator: one pool per stage plus the three edge counters
/// (intake, review desk, outbound). Each counter has its own lock; methods
/// never hold two counter locks at once.
#[derive(Debug)]
pub struct ContractorManager {
    pools: BTreeMap<StageId, ContractorPool>,
    intake_stage: Option<StageId>,
    events: Arc<EventLog>,
    progress_cap: u8,
    received: Mutex<u64>,
    waiting_review: Mutex<u64>,
    delivery: Mutex<DeliveryCounters>,
}

struct ManagerCell {
    manager: Arc<ContractorManager>,
    simulation: SimulationHandle,
}

static INSTANCE: Mutex<Option<ManagerCell>> = Mutex::new(None);

impl ContractorManager {
    pub fn new(settings: &PoolSettings) -> Arc<Self> {
        let events = Arc::new(EventLog::new(settings.event_log_size));
        let pools = settings
            .stages
            .iter()
            .map(|(stage, config)| {
                (
                    stage.clone(),
                    ContractorPool::new(stage.clone(), config, Arc::clone(&events)),
                )
            })
            .collect();
        Arc::new(ContractorManager {
            pools,
            intake_stage: settings.intake_stage.clone(),
            events,
            progress_cap: settings.progress_cap,
            received: Mutex::new(0),
            waiting_review: Mutex::new(0),
            delivery: Mutex::new(DeliveryCounters::default()),
        })
    }

    /// Returns the shared instance, building it (and starting the progress
    /// estimator thread) on first call. Later calls ignore `settings`.
    pub fn get_or_init(settings: &PoolSettings) -> Arc<ContractorManager> {
        let mut cell = match INSTANCE.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = cell.as_ref() {
            return Arc::clone(&existing.manager);
        }
        let manager = ContractorManager::new(settings);
        let simulation = simulation::spawn(Arc::clone(&manager), settings.progress_tick_ms);
        *cell = Some(ManagerCell {
            manager: Arc::clone(&manager),
            simulation,
        });
        manager
    }

    /// Tears down the shared instance and stops its estimator thread. Test
    /// hook; a live process never resets.
    pub fn reset() {
        let taken = {
            let mut cell = match INSTANCE.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            cell.take()
        };
        if let Some(mut cell) = taken {
            cell.simulation.shutdown();
        }
    }

    pub fn intake_stage(&self) -> Option<&StageId> {
        self.intake_stage.as_ref()
    }

    fn pool(&self, stage: &StageId) -> Result<&ContractorPool, PoolError> {
        self.pools.get(stage).ok_or_else(|| PoolError::UnknownStage {
            stage: stage.clone(),
        })
    }

    pub fn assign_job(
        &self,
        stage: &StageId,
        business_key: &str,
        now: i64,
    ) -> Result<Option<String>, PoolError> {
        self.pool(stage)?.assign_job(business_key, now)
    }

    /// Intake handoff: the job leaves the received counter and enters the
    /// stage pool in one named transition.
    pub fn assign_from_received(
        &self,
        stage: &StageId,
        business_key: &str,
        now: i64,
    ) -> Result<Option<String>, PoolError> {
        self.decrement_received();
        self.assign_job(stage, business_key, now)
    }

    pub fn complete_job(&self, stage: &StageId, business_key: &str, now: i64) -> Result<bool, PoolError> {
        self.pool(stage)?.complete_job(business_key, now)
    }

    pub fn update_progress(
        &self,
        stage: &StageId,
        business_key: &str,
        pct: i64,
    ) -> Result<bool, PoolError> {
        self.pool(stage)?.update_progress(business_key, pct)
    }

    pub(crate) fn simulate_tick(&self, now: i64) {
        for pool in self.pools.values() {
            // Estimation is display-only; a poisoned pool just skips a tick.
            let _ = pool.simulate_progress(now, self.progress_cap);
        }
    }

    fn counter(&self, lock: &Mutex<u64>) -> u64 {
        match lock.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn adjust(lock: &Mutex<u64>, up: bool) -> u64 {
        let mut guard = match lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = if up {
            guard.saturating_add(1)
        } else {
            guard.saturating_sub(1)
        };
        *guard
    }

    pub fn increment_received(&self) -> u64 {
        Self::adjust(&self.received, true)
    }

    pub fn decrement_received(&self) -> u64 {
        Self::adjust(&self.received, false)
    }

    pub fn received_count(&self) -> u64 {
        self.counter(&self.received)
    }

    pub fn increment_waiting_review(&self) -> u64 {
        Self::adjust(&self.waiting_review, true)
    }

    pub fn decrement_waiting_review(&self) -> u64 {
        Self::adjust(&self.waiting_review, false)
    }

    pub fn waiting_review_count(&self) -> u64 {
        self.counter(&self.waiting_review)
    }

    pub fn begin_sending(&self) -> u64 {
        let mut guard = match self.delivery.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.sending = guard.sending.saturating_add(1);
        guard.sending
    }

    /// One send finished: leaves the in-flight count and joins the lifetime
    /// sent total.
    pub fn finish_sending(&self) -> u64 {
        let mut guard = match self.delivery.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.sending = guard.sending.saturating_sub(1);
        guard.sent = guard.sent.saturating_add(1);
        guard.sent
    }

    pub fn sending_counts(&self) -> (u64, u64) {
        let guard = match self.delivery.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (guard.sending, guard.sent)
    }

    pub fn snapshot(&self) -> Result<ManagerSnapshot, PoolError> {
        let mut stages = BTreeMap::new();
        let mut jobs_in_flight = 0usize;
        let mut total_completed = 0u64;
        for (stage, pool) in &self.pools {
            let snap = pool.snapshot()?;
            jobs_in_flight += snap.jobs_in_flight;
            total_completed += snap.total_completed;
            stages.insert(stage.to_string(), snap);
        }
        let (sending, sent) = self.sending_counts();
        Ok(ManagerSnapshot {
            timestamp: utc_rfc3339(),
            stages,
            email_receiver: CounterSnapshot {
                display_name: "Email Intake".to_string(),
                count: self.received_count(),
            },
            review_desk: CounterSnapshot {
                display_name: "Review Desk".to_string(),
                count: self.waiting_review_count(),
            },
            email_sender: DeliverySnapshot {
                display_name: "Email Outbox".to_string(),
                sending,
                sent,
            },
            global: GlobalSnapshot {
                jobs_in_flight,
                total_completed,
            },
            events: self.events.snapshot(),
        })
    }

    /// Static pool shape, for dashboards that render before any job arrives.
    pub fn config_view(&self, settings: &PoolSettings) -> ManagerConfigView {
        let stages = settings
            .stages
            .iter()
            .map(|(stage, config)| {
                (
                    stage.to_string(),
                    StageConfigView {
                        display_name: config.display_name.clone(),
                        capacity: config.capacity,
                        max_contractors: config.max_contractors,
                        contractors: config.contractors.clone(),
                    },
                )
            })
            .collect();
        ManagerConfigView {
            stages,
            intake_stage: settings.intake_stage.as_ref().map(|s| s.to_string()),
        }
    }
}
