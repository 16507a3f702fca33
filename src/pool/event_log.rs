use crate::shared::time::utc_clock_time;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolEventKind {
    Spawn,
    JobAssigned,
    JobCompleted,
    Terminate,
}

impl PoolEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolEventKind::Spawn => "spawn",
            PoolEventKind::JobAssigned => "job_assigned",
            PoolEventKind::JobCompleted => "job_completed",
            PoolEventKind::Terminate => "terminate",
        }
    }
}

impl std::fmt::Display for PoolEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEvent {
    pub timestamp: String,
    pub stage: String,
    pub kind: PoolEventKind,
    pub contractor: String,
    #[serde(default)]
    pub business_key: Option<String>,
    pub message: String,
}

/// Fixed-size, newest-first feed of pool lifecycle events. Guarded by its own
/// lock so pools never hold two locks at once.
#[derive(Debug)]
pub struct EventLog {
    inner: Mutex<VecDeque<PoolEvent>>,
    max_events: usize,
}

impl EventLog {
    pub fn new(max_events: usize) -> Self {
        EventLog {
            inner: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events: max_events.max(1),
        }
    }

    pub fn record(
        &self,
        stage: &str,
        kind: PoolEventKind,
        contractor: &str,
        business_key: Option<&str>,
        message: String,
    ) {
        let event = PoolEvent {
            timestamp: utc_clock_time(),
            stage: stage.to_string(),
            kind,
            contractor: contractor.to_string(),
            business_key: business_key.map(str::to_string),
            message,
        };
        let mut events = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push_front(event);
        while events.len() > self.max_events {
            events.pop_back();
        }
    }

    /// Newest first.
    pub fn snapshot(&self) -> Vec<PoolEvent> {
        let events = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.iter().cloned().collect()
    }
}
