use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the worker's port
pub const WORKER_PORT_ENV: &str = "WORKER_PORT";

/// Configuration for the supervised worker process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Path to the worker executable
    pub command: PathBuf,

    /// Command-line arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the worker
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Extra environment variables (the parent environment is always inherited)
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Host the worker binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the worker binds to and serves its health endpoint on
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Restart and monitoring behavior of the supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Base delay before a restart attempt (in seconds)
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,

    /// Upper bound on the backoff delay (in seconds)
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,

    /// Maximum number of consecutive failed restart attempts
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Interval between periodic health probes (in seconds)
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Time to let the worker settle after launch before probing (in seconds)
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    /// Timeout for a single health probe (in seconds)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Timeout before force kill on stop (in seconds)
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

// Default value functions for serde
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_base_delay() -> u64 {
    2
}

fn default_max_delay() -> u64 {
    30
}

fn default_max_restarts() -> u32 {
    10
}

fn default_check_interval() -> u64 {
    30
}

fn default_grace_period() -> u64 {
    5
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_stop_timeout() -> u64 {
    10
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
            max_restarts: default_max_restarts(),
            check_interval_secs: default_check_interval(),
            grace_period_secs: default_grace_period(),
            probe_timeout_secs: default_probe_timeout(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

impl SupervisorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Top-level warden configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    pub worker: WorkerConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl WardenConfig {
    /// Build a configuration for a bare worker command with default settings
    pub fn for_command(command: PathBuf, args: Vec<String>) -> Self {
        Self {
            worker: WorkerConfig {
                command,
                args,
                cwd: None,
                env: HashMap::new(),
                host: default_host(),
                port: default_port(),
            },
            supervisor: SupervisorConfig::default(),
        }
    }

    /// Load configuration from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WardenError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .map_err(|e| WardenError::InvalidConfig(format!("Failed to parse TOML: {}", e))),
            "json" => serde_json::from_str(&contents)
                .map_err(|e| WardenError::InvalidConfig(format!("Failed to parse JSON: {}", e))),
            _ => Err(WardenError::InvalidConfig(format!(
                "Unsupported file format: {}. Use .toml or .json",
                extension
            ))),
        }
    }

    /// Apply environment overrides (currently only `WORKER_PORT`)
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(WORKER_PORT_ENV) {
            self.worker.port = value.parse().map_err(|_| {
                WardenError::ConfigError(format!(
                    "Invalid {} value: {}",
                    WORKER_PORT_ENV, value
                ))
            })?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker.command.as_os_str().is_empty() {
            return Err(WardenError::ConfigValidationError(
                "worker command must not be empty".to_string(),
            ));
        }

        if let Some(ref cwd) = self.worker.cwd {
            if !cwd.is_dir() {
                return Err(WardenError::ConfigValidationError(format!(
                    "Working directory does not exist: {}",
                    cwd.display()
                )));
            }
        }

        if self.supervisor.max_restarts == 0 {
            return Err(WardenError::ConfigValidationError(
                "max_restarts must be at least 1".to_string(),
            ));
        }

        if self.supervisor.base_delay_secs > self.supervisor.max_delay_secs {
            return Err(WardenError::ConfigValidationError(format!(
                "base_delay_secs ({}) exceeds max_delay_secs ({})",
                self.supervisor.base_delay_secs, self.supervisor.max_delay_secs
            )));
        }

        if self.supervisor.probe_timeout_secs == 0 {
            return Err(WardenError::ConfigValidationError(
                "probe_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> WardenConfig {
        WardenConfig::for_command(PathBuf::from("/bin/sleep"), vec!["30".to_string()])
    }

    #[test]
    fn test_defaults() {
        let config = base_config();
        assert_eq!(config.worker.host, "0.0.0.0");
        assert_eq!(config.worker.port, 8000);
        assert_eq!(config.supervisor.base_delay_secs, 2);
        assert_eq!(config.supervisor.max_delay_secs, 30);
        assert_eq!(config.supervisor.max_restarts, 10);
        assert_eq!(config.supervisor.check_interval_secs, 30);
        assert_eq!(config.supervisor.grace_period_secs, 5);
        assert_eq!(config.supervisor.probe_timeout_secs, 5);
    }

    #[test]
    fn test_duration_helpers() {
        let config = base_config();
        assert_eq!(config.supervisor.check_interval(), Duration::from_secs(30));
        assert_eq!(config.supervisor.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.supervisor.stop_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_toml_minimal() {
        let toml_str = r#"
            [worker]
            command = "/usr/bin/python3"
            args = ["-m", "uvicorn", "main:app"]
        "#;

        let config: WardenConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.worker.command, PathBuf::from("/usr/bin/python3"));
        assert_eq!(config.worker.args.len(), 3);
        assert_eq!(config.worker.port, 8000);
        assert_eq!(config.supervisor.max_restarts, 10);
    }

    #[test]
    fn test_parse_toml_full() {
        let toml_str = r#"
            [worker]
            command = "/usr/bin/python3"
            port = 9000
            cwd = "/tmp"

            [worker.env]
            API_KEY = "secret"

            [supervisor]
            base_delay_secs = 1
            max_delay_secs = 10
            max_restarts = 3
        "#;

        let config: WardenConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.worker.port, 9000);
        assert_eq!(config.worker.env.get("API_KEY").unwrap(), "secret");
        assert_eq!(config.supervisor.base_delay_secs, 1);
        assert_eq!(config.supervisor.max_restarts, 3);
        // Unspecified supervisor fields fall back to defaults
        assert_eq!(config.supervisor.check_interval_secs, 30);
    }

    #[test]
    fn test_validate_ok() {
        let config = base_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_command() {
        let mut config = base_config();
        config.worker.command = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_max_restarts() {
        let mut config = base_config();
        config.supervisor.max_restarts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_base_delay_exceeds_max() {
        let mut config = base_config();
        config.supervisor.base_delay_secs = 60;
        config.supervisor.max_delay_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_missing_cwd() {
        let mut config = base_config();
        config.worker.cwd = Some(PathBuf::from("/nonexistent/directory"));
        assert!(config.validate().is_err());
    }
}
