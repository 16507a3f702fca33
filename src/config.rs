use crate::shared::ids::StageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One named worker identity a pool may spawn. The display color travels with
/// the name so dashboards stay consistent across spawns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractorIdentity {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePoolConfig {
    pub display_name: String,
    pub capacity: usize,
    pub max_contractors: usize,
    /// Expected wall time for one job at this stage, drives the progress
    /// estimator only.
    #[serde(default = "default_expected_duration_secs")]
    pub expected_duration_secs: u64,
    pub contractors: Vec<ContractorIdentity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSettings {
    pub stages: BTreeMap<StageId, StagePoolConfig>,
    /// Stage whose assignments consume from the received-intake counter.
    #[serde(default)]
    pub intake_stage: Option<StageId>,
    #[serde(default = "default_event_log_size")]
    pub event_log_size: usize,
    #[serde(default = "default_progress_tick_ms")]
    pub progress_tick_ms: u64,
    #[serde(default = "default_progress_cap")]
    pub progress_cap: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// When set the client returns canned responses instead of calling out.
    #[serde(default)]
    pub mock_mode: bool,
    #[serde(default = "default_agent_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_agent_backoff_ms")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub state_root: PathBuf,
    #[serde(default = "default_approval_timeout_secs")]
    pub approval_timeout_secs: i64,
    #[serde(default = "default_agent_settings")]
    pub agent: AgentSettings,
    #[serde(default = "default_pool_settings")]
    pub pools: PoolSettings,
}

fn default_expected_duration_secs() -> u64 {
    10
}

fn default_event_log_size() -> usize {
    50
}

fn default_progress_tick_ms() -> u64 {
    500
}

fn default_progress_cap() -> u8 {
    95
}

fn default_agent_endpoint() -> String {
    "http://127.0.0.1:8765".to_string()
}

fn default_agent_max_attempts() -> u32 {
    3
}

fn default_agent_backoff_ms() -> u64 {
    500
}

fn default_approval_timeout_secs() -> i64 {
    24 * 60 * 60
}

fn default_agent_settings() -> AgentSettings {
    AgentSettings {
        endpoint: default_agent_endpoint(),
        api_key: None,
        mock_mode: false,
        max_attempts: default_agent_max_attempts(),
        retry_backoff_ms: default_agent_backoff_ms(),
    }
}

fn roster(names: &[(&str, &str)]) -> Vec<ContractorIdentity> {
    names
        .iter()
        .map(|(name, color)| ContractorIdentity {
            name: (*name).to_string(),
            color: (*color).to_string(),
        })
        .collect()
}

fn default_roster() -> Vec<ContractorIdentity> {
    roster(&[
        ("AIContractor Alice", "#2dd4a8"),
        ("AIContractor Bob", "#7c5cfc"),
        ("AIContractor Priya", "#f59e0b"),
        ("AIContractor David", "#38bdf8"),
        ("AIContractor Mei", "#c084fc"),
    ])
}

fn stage_id(raw: &str) -> StageId {
    // Literal stage names below are valid identifiers.
    StageId::parse(raw).unwrap_or_else(|_| unreachable!())
}

fn default_pool_settings() -> PoolSettings {
    let mut stages = BTreeMap::new();
    stages.insert(
        stage_id("classifier"),
        StagePoolConfig {
            display_name: "Claims Classification".to_string(),
            capacity: 3,
            max_contractors: 5,
            expected_duration_secs: 15,
            contractors: default_roster(),
        },
    );
    stages.insert(
        stage_id("adjudicator"),
        StagePoolConfig {
            display_name: "Claims Adjudication".to_string(),
            capacity: 3,
            max_contractors: 5,
            expected_duration_secs: 10,
            contractors: default_roster(),
        },
    );
    stages.insert(
        stage_id("email_composer"),
        StagePoolConfig {
            display_name: "Notification Drafting".to_string(),
            capacity: 5,
            max_contractors: 3,
            expected_duration_secs: 8,
            contractors: default_roster(),
        },
    );
    stages.insert(
        stage_id("invoice_parser"),
        StagePoolConfig {
            display_name: "Invoice Parsing".to_string(),
            capacity: 3,
            max_contractors: 5,
            expected_duration_secs: 12,
            contractors: default_roster(),
        },
    );
    PoolSettings {
        stages,
        intake_stage: Some(stage_id("classifier")),
        event_log_size: default_event_log_size(),
        progress_tick_ms: default_progress_tick_ms(),
        progress_cap: default_progress_cap(),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            state_root: PathBuf::from("state"),
            approval_timeout_secs: default_approval_timeout_secs(),
            agent: default_agent_settings(),
            pools: default_pool_settings(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.approval_timeout_secs <= 0 {
            return Err(ConfigError::Invalid(
                "approval_timeout_secs must be positive".to_string(),
            ));
        }
        self.pools.validate()
    }
}

impl PoolSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one stage pool must be configured".to_string(),
            ));
        }
        for (stage, pool) in &self.stages {
            if pool.capacity == 0 {
                return Err(ConfigError::Invalid(format!(
                    "stage `{stage}` has zero per-contractor capacity"
                )));
            }
            if pool.max_contractors == 0 {
                return Err(ConfigError::Invalid(format!(
                    "stage `{stage}` allows zero contractors"
                )));
            }
            if pool.contractors.len() < pool.max_contractors {
                return Err(ConfigError::Invalid(format!(
                    "stage `{stage}` defines {} contractors but allows up to {}",
                    pool.contractors.len(),
                    pool.max_contractors
                )));
            }
        }
        if let Some(intake) = &self.intake_stage {
            if !self.stages.contains_key(intake) {
                return Err(ConfigError::Invalid(format!(
                    "intake stage `{intake}` has no configured pool"
                )));
            }
        }
        if self.progress_cap > 100 {
            return Err(ConfigError::Invalid(
                "progress_cap must be within 0..=100".to_string(),
            ));
        }
        Ok(())
    }
}
