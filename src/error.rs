//! Error types for restartd
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in restartd
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Worker process could not be started
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// Delivering a signal to the worker failed
    #[error("Signal error: {0}")]
    Signal(String),

    /// File-change watcher could not be set up
    #[error("Watch error: {0}")]
    Watch(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for restartd operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error() {
        let err = SupervisorError::Spawn("python3: not found".to_string());
        assert_eq!(err.to_string(), "Spawn error: python3: not found");
    }

    #[test]
    fn test_signal_error() {
        let err = SupervisorError::Signal("EPERM".to_string());
        assert_eq!(err.to_string(), "Signal error: EPERM");
    }

    #[test]
    fn test_watch_error() {
        let err = SupervisorError::Watch("inotify limit reached".to_string());
        assert_eq!(err.to_string(), "Watch error: inotify limit reached");
    }

    #[test]
    fn test_config_error() {
        let err = SupervisorError::Config("empty program".to_string());
        assert_eq!(err.to_string(), "Config error: empty program");
    }
}
