use crate::config::{ContractorIdentity, StagePoolConfig};
use crate::pool::event_log::{EventLog, PoolEventKind};
use crate::pool::PoolError;
use crate::shared::ids::StageId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractorStatus {
    Full,
    Available,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSlotSnapshot {
    pub business_key: String,
    pub progress_pct: u8,
    pub started_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorSnapshot {
    pub name: String,
    pub color: String,
    pub is_primary: bool,
    pub capacity: usize,
    pub slots_used: usize,
    pub status: ContractorStatus,
    pub jobs_completed: u64,
    pub active_jobs: Vec<JobSlotSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub stage: String,
    pub display_name: String,
    pub capacity_per_contractor: usize,
    pub max_contractors: usize,
    pub contractor_count: usize,
    pub active_contractors: Vec<ContractorSnapshot>,
    pub pending_queue: Vec<String>,
    pub pending_count: usize,
    pub jobs_in_flight: usize,
    pub total_completed: u64,
}

#[derive(Debug)]
struct JobSlot {
    business_key: String,
    progress_pct: u8,
    started_at: i64,
}

#[derive(Debug)]
struct Contractor {
    identity: ContractorIdentity,
    is_primary: bool,
    active_jobs: Vec<JobSlot>,
    jobs_completed: u64,
}

impl Contractor {
    fn status(&self, capacity: usize) -> ContractorStatus {
        if self.active_jobs.is_empty() {
            ContractorStatus::Idle
        } else if self.active_jobs.len() >= capacity {
            ContractorStatus::Full
        } else {
            ContractorStatus::Available
        }
    }
}

#[derive(Debug)]
struct PoolInner {
    active: Vec<Contractor>,
    pending: VecDeque<String>,
    total_completed: u64,
}

/// One stage's worker pool. Contractors fill in spawn order (first-fill), new
/// contractors spawn on demand up to `max_contractors`, overflow queues FIFO,
/// and empty contractors are released in reverse spawn order. The primary
/// contractor is never released.
#[derive(Debug)]
pub struct ContractorPool {
    stage: StageId,
    display_name: String,
    capacity: usize,
    max_contractors: usize,
    expected_duration_secs: u64,
    roster: Vec<ContractorIdentity>,
    inner: Mutex<PoolInner>,
    events: Arc<EventLog>,
}

impl ContractorPool {
    pub fn new(stage: StageId, config: &StagePoolConfig, events: Arc<EventLog>) -> Self {
        let primary = Contractor {
            identity: config.contractors[0].clone(),
            is_primary: true,
            active_jobs: Vec::new(),
            jobs_completed: 0,
        };
        ContractorPool {
            stage,
            display_name: config.display_name.clone(),
            capacity: config.capacity,
            max_contractors: config.max_contractors,
            expected_duration_secs: config.expected_duration_secs,
            roster: config.contractors.clone(),
            inner: Mutex::new(PoolInner {
                active: vec![primary],
                pending: VecDeque::new(),
                total_completed: 0,
            }),
            events,
        }
    }

    pub fn stage(&self) -> &StageId {
        &self.stage
    }

    pub fn expected_duration_secs(&self) -> u64 {
        self.expected_duration_secs
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolInner>, PoolError> {
        self.inner.lock().map_err(|_| PoolError::Poisoned {
            stage: self.stage.clone(),
        })
    }

    /// Place a job on the first contractor with a free slot, spawning a new
    /// contractor when everyone is full and the cap allows. Returns the
    /// assignee's name, or None when the job was queued.
    pub fn assign_job(&self, business_key: &str, now: i64) -> Result<Option<String>, PoolError> {
        let mut inner = self.lock()?;
        match self.try_place(&mut inner, business_key, now)? {
            Some(name) => Ok(Some(name)),
            None => {
                inner.pending.push_back(business_key.to_string());
                Ok(None)
            }
        }
    }

    fn try_place(
        &self,
        inner: &mut PoolInner,
        business_key: &str,
        now: i64,
    ) -> Result<Option<String>, PoolError> {
        let slot = JobSlot {
            business_key: business_key.to_string(),
            progress_pct: 0,
            started_at: now,
        };
        if let Some(contractor) = inner
            .active
            .iter_mut()
            .find(|c| c.active_jobs.len() < self.capacity)
        {
            contractor.active_jobs.push(slot);
            let name = contractor.identity.name.clone();
            self.record_assignment(&name, business_key);
            return Ok(Some(name));
        }
        if inner.active.len() < self.max_contractors {
            // Scale-down can free a definition in the middle of the roster,
            // so the next spawn takes the first definition not already active.
            let identity = self
                .roster
                .iter()
                .find(|def| !inner.active.iter().any(|c| c.identity.name == def.name))
                .ok_or_else(|| PoolError::RosterExhausted {
                    stage: self.stage.clone(),
                    defined: self.roster.len(),
                })?
                .clone();
            let name = identity.name.clone();
            self.events.record(
                self.stage.as_str(),
                PoolEventKind::Spawn,
                &name,
                None,
                format!("{name} spawned for {} (demand)", self.display_name),
            );
            inner.active.push(Contractor {
                identity,
                is_primary: false,
                active_jobs: vec![slot],
                jobs_completed: 0,
            });
            self.record_assignment(&name, business_key);
            return Ok(Some(name));
        }
        Ok(None)
    }

    fn record_assignment(&self, contractor: &str, business_key: &str) {
        self.events.record(
            self.stage.as_str(),
            PoolEventKind::JobAssigned,
            contractor,
            Some(business_key),
            format!("{contractor} picked up {business_key}"),
        );
    }

    /// Remove the job, credit the contractor, drain the pending queue into
    /// freed slots, then release every now-empty non-primary contractor in
    /// reverse spawn order. Returns false when the key holds no active slot.
    pub fn complete_job(&self, business_key: &str, now: i64) -> Result<bool, PoolError> {
        let mut inner = self.lock()?;
        let mut finisher: Option<String> = None;
        for contractor in inner.active.iter_mut() {
            if let Some(pos) = contractor
                .active_jobs
                .iter()
                .position(|j| j.business_key == business_key)
            {
                contractor.active_jobs.remove(pos);
                contractor.jobs_completed += 1;
                finisher = Some(contractor.identity.name.clone());
                break;
            }
        }
        let Some(name) = finisher else {
            return Ok(false);
        };
        inner.total_completed += 1;
        self.events.record(
            self.stage.as_str(),
            PoolEventKind::JobCompleted,
            &name,
            Some(business_key),
            format!("{name} finished {business_key}"),
        );

        while let Some(next) = inner.pending.front().cloned() {
            if self.try_place(&mut inner, &next, now)?.is_none() {
                break;
            }
            inner.pending.pop_front();
        }

        // Last-spawned empty contractor goes first; empty contractors in the
        // middle of the list are released too.
        let mut index = inner.active.len();
        while index > 0 {
            index -= 1;
            let contractor = &inner.active[index];
            if contractor.is_primary || !contractor.active_jobs.is_empty() {
                continue;
            }
            let released = inner.active.remove(index);
            let name = released.identity.name;
            self.events.record(
                self.stage.as_str(),
                PoolEventKind::Terminate,
                &name,
                None,
                format!("{name} released (idle)"),
            );
        }
        Ok(true)
    }

    /// Clamp and apply a caller-reported progress percentage.
    pub fn update_progress(&self, business_key: &str, pct: i64) -> Result<bool, PoolError> {
        let clamped = pct.clamp(0, 100) as u8;
        let mut inner = self.lock()?;
        for contractor in inner.active.iter_mut() {
            if let Some(job) = contractor
                .active_jobs
                .iter_mut()
                .find(|j| j.business_key == business_key)
            {
                job.progress_pct = clamped;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Elapsed-time progress estimate, capped and monotone. Display only.
    pub fn simulate_progress(&self, now: i64, cap: u8) -> Result<(), PoolError> {
        let expected = self.expected_duration_secs.max(1) as i64;
        let mut inner = self.lock()?;
        for contractor in inner.active.iter_mut() {
            for job in contractor.active_jobs.iter_mut() {
                let elapsed = (now - job.started_at).max(0);
                let estimate = ((elapsed * 100) / expected).clamp(0, cap as i64) as u8;
                if estimate > job.progress_pct {
                    job.progress_pct = estimate;
                }
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Result<PoolSnapshot, PoolError> {
        let inner = self.lock()?;
        let active_contractors: Vec<ContractorSnapshot> = inner
            .active
            .iter()
            .map(|c| ContractorSnapshot {
                name: c.identity.name.clone(),
                color: c.identity.color.clone(),
                is_primary: c.is_primary,
                capacity: self.capacity,
                slots_used: c.active_jobs.len(),
                status: c.status(self.capacity),
                jobs_completed: c.jobs_completed,
                active_jobs: c
                    .active_jobs
                    .iter()
                    .map(|j| JobSlotSnapshot {
                        business_key: j.business_key.clone(),
                        progress_pct: j.progress_pct,
                        started_at: j.started_at,
                    })
                    .collect(),
            })
            .collect();
        let jobs_in_flight = active_contractors.iter().map(|c| c.slots_used).sum();
        Ok(PoolSnapshot {
            stage: self.stage.to_string(),
            display_name: self.display_name.clone(),
            capacity_per_contractor: self.capacity,
            max_contractors: self.max_contractors,
            contractor_count: active_contractors.len(),
            active_contractors,
            pending_queue: inner.pending.iter().cloned().collect(),
            pending_count: inner.pending.len(),
            jobs_in_flight,
            total_completed: inner.total_completed,
        })
    }
}
