// Process module - worker lifecycle management

mod backoff;
mod health;
pub mod spawner;
mod supervisor;

pub use backoff::RestartPolicy;
pub use health::HealthProbe;
pub use spawner::{spawn_worker, SpawnedWorker};
pub use supervisor::{Supervisor, WorkerState};
