use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only key=value trail under `state_root/logs/`, shared by the
/// workflow engine and the activity implementations.
#[derive(Debug, Clone)]
pub struct OrchestratorLog {
    path: PathBuf,
}

impl OrchestratorLog {
    pub fn new(state_root: &Path) -> Self {
        OrchestratorLog {
            path: state_root.join("logs").join("orchestrator.log"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Engine diagnostics: every line is stamped with the engine's virtual
    /// clock and the owning run, never the wall clock.
    pub fn run_event(&self, now: i64, run_id: &str, message: &str) -> std::io::Result<()> {
        self.append(&format!("ts={now} run_id={run_id} {message}"))
    }

    pub fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}
