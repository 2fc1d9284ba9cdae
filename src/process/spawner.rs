use crate::config::WorkerConfig;
use crate::error::{Result, WardenError};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::{Child, Command};

/// Handle for a spawned worker process
#[derive(Debug)]
pub struct SpawnedWorker {
    /// The child process handle
    pub child: Child,

    /// Process ID assigned by the OS
    pub pid: u32,

    /// Time the process was launched
    pub started_at: Instant,
}

/// Spawn the worker process described by the configuration
///
/// The worker inherits the parent environment (API credentials pass through
/// untouched) plus any extra variables from the config. The bind address is
/// handed over via `HOST` and `PORT`. Stdout and stderr are piped so their
/// lines can be relayed to the supervisor's own output.
pub fn spawn_worker(config: &WorkerConfig) -> Result<SpawnedWorker> {
    if !config.command.exists() {
        return Err(WardenError::SpawnError(format!(
            "Executable does not exist: {}",
            config.command.display()
        )));
    }

    let mut command = Command::new(&config.command);

    if !config.args.is_empty() {
        command.args(&config.args);
    }

    if let Some(ref cwd) = config.cwd {
        command.current_dir(cwd);
    }

    for (key, value) in &config.env {
        command.env(key, value);
    }

    command.env("HOST", &config.host);
    command.env("PORT", config.port.to_string());

    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let child = command.spawn().map_err(|e| {
        WardenError::SpawnError(format!(
            "Failed to spawn '{}': {}",
            config.command.display(),
            e
        ))
    })?;

    let pid = child.id().ok_or_else(|| {
        WardenError::SpawnError(format!(
            "Failed to get PID for '{}'",
            config.command.display()
        ))
    })?;

    Ok(SpawnedWorker {
        child,
        pid,
        started_at: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config(command: PathBuf) -> WorkerConfig {
        WorkerConfig {
            command,
            args: vec![],
            cwd: None,
            env: HashMap::new(),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }

    #[tokio::test]
    async fn test_spawn_simple_worker() {
        let config = test_config(PathBuf::from("/bin/echo"));

        let spawned = spawn_worker(&config).unwrap();
        assert!(spawned.pid > 0);
    }

    #[tokio::test]
    async fn test_spawn_captures_stdout_stderr() {
        let config = test_config(PathBuf::from("/bin/echo"));

        let spawned = spawn_worker(&config).unwrap();
        assert!(spawned.child.stdout.is_some());
        assert!(spawned.child.stderr.is_some());
    }

    #[tokio::test]
    async fn test_spawn_with_working_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(PathBuf::from("/bin/pwd"));
        config.cwd = Some(temp_dir.path().to_path_buf());

        assert!(spawn_worker(&config).is_ok());
    }

    #[tokio::test]
    async fn test_spawn_passes_port_env() {
        let mut config = test_config(PathBuf::from("/bin/sh"));
        config.args = vec!["-c".to_string(), "test \"$PORT\" = 9000".to_string()];
        config.port = 9000;

        let mut spawned = spawn_worker(&config).unwrap();
        let status = spawned.child.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_spawn_nonexistent_executable() {
        let config = test_config(PathBuf::from("/nonexistent/worker"));

        match spawn_worker(&config) {
            Err(WardenError::SpawnError(msg)) => assert!(msg.contains("does not exist")),
            other => panic!("Expected SpawnError, got {:?}", other.map(|s| s.pid)),
        }
    }
}
