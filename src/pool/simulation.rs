use crate::pool::manager::ContractorManager;
use crate::shared::time::now_secs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background progress estimator. Ticks every `tick_ms` and nudges each
/// in-flight job's displayed percentage toward the cap.
pub(crate) struct SimulationHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimulationHandle {
    pub(crate) fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub(crate) fn spawn(manager: Arc<ContractorManager>, tick_ms: u64) -> SimulationHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);
    let handle = thread::Builder::new()
        .name("pool-progress".to_string())
        .spawn(move || {
            let tick = Duration::from_millis(tick_ms.max(50));
            while sleep_with_stop(&thread_stop, tick) {
                manager.simulate_tick(now_secs());
            }
        })
        .ok();
    SimulationHandle { stop, handle }
}

pub(crate) fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(Duration::from_millis(200));
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}
