//! Relays the worker's stdout/stderr to the supervisor's own output
//!
//! One draining task per pipe reads lines and forwards them, prefixed for
//! provenance, into a channel; a single printer task writes them to stdout.
//! Read errors end the affected task but never disturb the supervisor.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Prefix applied to every relayed worker line
pub const WORKER_PREFIX: &str = "[SERVER]";

/// Spawn the printer task draining relayed lines to stdout
pub fn stdout_printer() -> (mpsc::UnboundedSender<String>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let handle = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("{}", line);
        }
    });

    (tx, handle)
}

/// Attach relay tasks to a freshly spawned worker
///
/// Takes the stdout and stderr pipes out of the child; the tasks exit on
/// their own when the pipes reach EOF.
pub fn attach(child: &mut Child, tx: mpsc::UnboundedSender<String>) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(relay_lines(stdout, tx.clone()));
    } else {
        warn!("worker has no stdout pipe to relay");
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(relay_lines(stderr, tx));
    } else {
        warn!("worker has no stderr pipe to relay");
    }
}

async fn relay_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(format!("{} {}", WORKER_PREFIX, line)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "error reading worker output");
                break;
            }
        }
    }
}
