use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::calc::OperationTimes;
use crate::{dlog_debug, dlog_warn, Error, Result};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ORCHESTRATOR_URL: &str = "http://localhost:8080";
pub const DEFAULT_COMPUTING_POWER: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub timings: OperationTimes,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub addr: String,
    /// Processing tasks older than this are requeued. Unset disables it.
    pub task_lease_ms: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            task_lease_ms: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn task_lease(&self) -> Option<Duration> {
        self.task_lease_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub orchestrator_url: String,
    pub computing_power: usize,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            orchestrator_url: DEFAULT_ORCHESTRATOR_URL.to_string(),
            computing_power: DEFAULT_COMPUTING_POWER,
            poll_interval_ms: 1000,
            request_timeout_ms: 10_000,
        }
    }
}

impl AgentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    pub fn distcalc_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".distcalc"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::distcalc_dir()?.join("distcalc.toml"))
    }

    /// Load from `path`, or the default location when `None`, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load_from(&Self::config_path()?)?,
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        dlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            dlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        dlog_debug!(
            "Config loaded: addr={}, lease={:?}, workers={}",
            config.orchestrator.addr,
            config.orchestrator.task_lease_ms,
            config.agent.computing_power
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                dlog_debug!("Creating config directory: {}", parent.display());
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        dlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`, keyed by environment variable name.
    ///
    /// Unparseable numbers are ignored, except `COMPUTING_POWER` which
    /// falls back to the default when invalid or below 1.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str, slot: &mut u64| {
            if let Some(raw) = lookup(key) {
                match raw.trim().parse::<u64>() {
                    Ok(value) => *slot = value,
                    Err(_) => dlog_warn!("Ignoring {}={:?}: not a number", key, raw),
                }
            }
        };

        millis("TIME_ADDITION_MS", &mut self.timings.addition_ms);
        millis("TIME_SUBTRACTION_MS", &mut self.timings.subtraction_ms);
        millis("TIME_MULTIPLICATIONS_MS", &mut self.timings.multiplication_ms);
        millis("TIME_DIVISIONS_MS", &mut self.timings.division_ms);
        millis("AGENT_POLL_INTERVAL_MS", &mut self.agent.poll_interval_ms);

        if let Some(raw) = lookup("TASK_LEASE_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.orchestrator.task_lease_ms = Some(ms),
                Err(_) => dlog_warn!("Ignoring TASK_LEASE_MS={:?}: not a number", raw),
            }
        }
        if let Some(addr) = lookup("DISTCALC_ADDR") {
            self.orchestrator.addr = addr;
        }
        if let Some(url) = lookup("ORCHESTRATOR_URL") {
            self.agent.orchestrator_url = url;
        }
        if let Some(raw) = lookup("COMPUTING_POWER") {
            self.agent.computing_power = match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    dlog_warn!(
                        "Invalid COMPUTING_POWER={:?}, using {}",
                        raw,
                        DEFAULT_COMPUTING_POWER
                    );
                    DEFAULT_COMPUTING_POWER
                }
            };
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent.computing_power == 0 {
            return Err(Error::Config("agent.computing_power must be at least 1".into()));
        }
        if self.orchestrator.addr.trim().is_empty() {
            return Err(Error::Config("orchestrator.addr is empty".into()));
        }
        if self.agent.orchestrator_url.trim().is_empty() {
            return Err(Error::Config("agent.orchestrator_url is empty".into()));
        }
        Ok(())
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file.as_deref().map(expand_tilde)
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
