use crate::config::WardenConfig;
use crate::error::{Result, WardenError};
use crate::output;
use crate::process::backoff::RestartPolicy;
use crate::process::health::HealthProbe;
use crate::process::spawner::{spawn_worker, SpawnedWorker};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Lifecycle state of the supervised worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Restarting,
    Failed,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Stopped => write!(f, "stopped"),
            WorkerState::Starting => write!(f, "starting"),
            WorkerState::Running => write!(f, "running"),
            WorkerState::Restarting => write!(f, "restarting"),
            WorkerState::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one monitor-loop wait
enum Event {
    Exited(std::io::Result<std::process::ExitStatus>),
    Tick,
    Shutdown { closed: bool },
}

/// Keeps exactly one worker process alive
///
/// Owns the worker handle exclusively: a new process is never spawned until
/// the previous handle has been reaped or forcibly terminated. All state
/// mutation happens on the task driving [`Supervisor::run`]; the shutdown
/// signal arrives through a watch channel written by the signal task.
pub struct Supervisor {
    config: WardenConfig,
    policy: RestartPolicy,
    probe: HealthProbe,
    state: WorkerState,
    /// Consecutive failed restart attempts; reset on a healthy restart
    restart_count: u32,
    running: bool,
    worker: Option<SpawnedWorker>,
    relay_tx: mpsc::UnboundedSender<String>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Supervisor {
    pub fn new(
        config: WardenConfig,
        relay_tx: mpsc::UnboundedSender<String>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let policy = RestartPolicy::from_config(&config.supervisor);
        let probe = HealthProbe::new(config.worker.port, config.supervisor.probe_timeout());

        Self {
            config,
            policy,
            probe,
            state: WorkerState::Stopped,
            restart_count: 0,
            running: true,
            worker: None,
            relay_tx,
            shutdown_rx,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Launch the worker and monitor it until shutdown or budget exhaustion
    ///
    /// Returns `Ok(())` on graceful shutdown and an error when the restart
    /// budget is exhausted (including when the very first launch never
    /// becomes healthy).
    pub async fn run(&mut self) -> Result<()> {
        info!(
            command = %self.config.worker.command.display(),
            host = %self.config.worker.host,
            port = self.config.worker.port,
            health_url = self.probe.url(),
            "supervisor started"
        );

        self.attempt_start().await;
        self.monitor_loop().await;

        match self.state {
            WorkerState::Failed => Err(WardenError::RestartBudgetExhausted(
                self.policy.max_restarts,
            )),
            _ => Ok(()),
        }
    }

    /// Spawn the worker and attach the output relay
    ///
    /// Spawn failure is recoverable and reported as `false`; the retry loop
    /// decides what to do with it.
    fn start(&mut self) -> bool {
        match spawn_worker(&self.config.worker) {
            Ok(mut spawned) => {
                output::attach(&mut spawned.child, self.relay_tx.clone());
                info!(pid = spawned.pid, "worker started");
                self.worker = Some(spawned);
                true
            }
            Err(e) => {
                error!(error = %e, "failed to start worker");
                false
            }
        }
    }

    /// Probe the worker's health endpoint
    pub async fn probe_health(&self) -> bool {
        self.probe.probe().await
    }

    /// One full start attempt: spawn, grace period, health probe
    ///
    /// Leaves the state at `Running` on success and `Restarting` on failure
    /// (with the unhealthy process terminated first). Does not touch the
    /// restart count; that bookkeeping belongs to [`Supervisor::restart`].
    async fn attempt_start(&mut self) -> bool {
        self.state = WorkerState::Starting;

        if !self.start() {
            self.state = WorkerState::Restarting;
            return false;
        }

        if self.wait_or_shutdown(self.config.supervisor.grace_period()).await {
            return false;
        }

        if self.probe_health().await {
            info!("worker is healthy");
            self.state = WorkerState::Running;
            true
        } else {
            warn!("worker failed its post-start health check");
            self.terminate_worker().await;
            self.state = WorkerState::Restarting;
            false
        }
    }

    /// Restart the worker under the backoff policy
    ///
    /// Reaching `max_restarts` consecutive failures is the one fatal path:
    /// at that point retrying cannot fix whatever is wrong (bad config,
    /// missing credentials), so the supervisor gives up.
    async fn restart(&mut self) {
        if !self.policy.budget_remaining(self.restart_count) {
            error!(
                max_restarts = self.policy.max_restarts,
                "restart budget exhausted, giving up"
            );
            self.state = WorkerState::Failed;
            self.running = false;
            return;
        }

        let delay = self.policy.delay_for(self.restart_count);
        info!(
            attempt = self.restart_count + 1,
            delay_secs = delay.as_secs(),
            "waiting before restart"
        );

        if self.wait_or_shutdown(delay).await {
            return;
        }

        if self.attempt_start().await {
            info!("worker restarted successfully");
            self.restart_count = 0;
        } else if !self.shutdown_requested() {
            self.restart_count += 1;
        }
    }

    /// Monitor the worker until shutdown or a terminal failure
    ///
    /// Reacts to a worker exit as soon as it happens; the periodic interval
    /// only paces the health probes.
    async fn monitor_loop(&mut self) {
        while self.running {
            if self.shutdown_requested() {
                self.shutdown().await;
                break;
            }

            match self.state {
                WorkerState::Restarting => {
                    self.restart().await;
                    continue;
                }
                WorkerState::Failed | WorkerState::Stopped => break,
                WorkerState::Starting | WorkerState::Running => {}
            }

            let Some(mut worker) = self.worker.take() else {
                self.state = WorkerState::Restarting;
                continue;
            };
            let interval = self.config.supervisor.check_interval();

            let event = tokio::select! {
                status = worker.child.wait() => Event::Exited(status),
                res = self.shutdown_rx.changed() => Event::Shutdown { closed: res.is_err() },
                _ = sleep(interval) => Event::Tick,
            };

            match event {
                Event::Exited(Ok(status)) => {
                    warn!(pid = worker.pid, %status, "worker exited, restarting");
                    self.state = WorkerState::Restarting;
                }
                Event::Exited(Err(e)) => {
                    warn!(pid = worker.pid, error = %e, "failed to wait on worker, restarting");
                    self.state = WorkerState::Restarting;
                }
                Event::Shutdown { closed } => {
                    self.worker = Some(worker);
                    if closed {
                        // Signal task is gone; there is no other shutdown path
                        self.shutdown().await;
                        break;
                    }
                }
                Event::Tick => {
                    self.worker = Some(worker);
                    if !self.probe_health().await {
                        warn!("periodic health check failed, restarting worker");
                        self.terminate_worker().await;
                        self.state = WorkerState::Restarting;
                    }
                }
            }
        }
    }

    /// Stop monitoring and terminate the worker
    pub async fn shutdown(&mut self) {
        info!("shutdown requested, stopping worker");
        self.running = false;
        self.terminate_worker().await;
        if self.state != WorkerState::Failed {
            self.state = WorkerState::Stopped;
        }
    }

    /// Terminate the active worker: SIGTERM, bounded wait, then SIGKILL
    ///
    /// The handle is always reaped before this returns, so a subsequent
    /// spawn never overlaps with a live predecessor.
    async fn terminate_worker(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        let pid = worker.pid;

        match worker.child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid, %status, "worker already exited");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(pid, error = %e, "failed to poll worker before terminating");
            }
        }

        info!(pid, "stopping worker with SIGTERM");
        if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!(pid, error = %e, "failed to send SIGTERM");
        }

        let timeout = self.config.supervisor.stop_timeout();
        match tokio::time::timeout(timeout, worker.child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid, %status, "worker stopped");
            }
            Ok(Err(e)) => {
                warn!(pid, error = %e, "wait on worker failed");
            }
            Err(_) => {
                warn!(pid, timeout_secs = timeout.as_secs(), "worker did not exit in time, sending SIGKILL");
                if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                    warn!(pid, error = %e, "failed to send SIGKILL");
                }
                let _ = worker.child.wait().await;
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Sleep, waking early on shutdown; returns true if shutdown fired
    async fn wait_or_shutdown(&mut self, duration: Duration) -> bool {
        if duration.is_zero() {
            return self.shutdown_requested();
        }
        tokio::select! {
            _ = sleep(duration) => false,
            _ = self.shutdown_rx.changed() => true,
        }
    }
}
