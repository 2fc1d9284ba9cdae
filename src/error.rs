use thiserror::Error;

/// Main error type for the warden supervisor
#[derive(Debug, Error)]
pub enum WardenError {
    // Worker process errors
    #[error("Failed to spawn worker: {0}")]
    SpawnError(String),

    #[error("Failed to stop worker (pid {0}): {1}")]
    StopError(u32, String),

    #[error("Signal error: {0}")]
    SignalError(String),

    // Restart policy errors
    #[error("Restart budget exhausted after {0} consecutive failed attempts")]
    RestartBudgetExhausted(u32),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for warden operations
pub type Result<T> = std::result::Result<T, WardenError>;
