//! Error types for stack management.

use thiserror::Error;

/// Result type for stack operations.
pub type Result<T> = std::result::Result<T, StackError>;

/// Errors returned by [`Stack::start`](crate::Stack::start) and
/// [`Stack::stop`](crate::Stack::stop).
#[derive(Debug, Error)]
pub enum StackError {
    /// The container runtime client could not be constructed.
    #[error("Container runtime not available: {reason}")]
    ClientInit {
        /// Reason why the client could not be built.
        reason: String,
    },

    /// Listing or pulling the image failed.
    #[error("Failed to provision image '{image}': {reason}")]
    Provision {
        /// Image reference.
        image: String,
        /// Reason for failure.
        reason: String,
    },

    /// Creating the container failed.
    #[error("localstack: could not create container: {source}")]
    Create {
        /// Underlying runtime error.
        #[source]
        source: RuntimeError,
    },

    /// The runtime refused to start a created container.
    #[error("Failed to start container '{id}': {reason}")]
    Start {
        /// Container identifier.
        id: String,
        /// Reason for failure.
        reason: String,
    },

    /// The readiness marker did not show up in time.
    #[error("localstack: init timeout exceeded ({timeout_secs} seconds)")]
    InitTimeout {
        /// Configured bound in seconds.
        timeout_secs: u64,
    },

    /// Inspecting the started container failed.
    #[error("Failed to inspect container '{id}': {reason}")]
    Inspect {
        /// Container identifier.
        id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Stopping the container failed. The stack stays started.
    #[error("Failed to stop container '{id}': {reason}")]
    Stop {
        /// Container identifier.
        id: String,
        /// Reason for failure.
        reason: String,
    },

    /// The shutdown token fired before the container was ready.
    #[error("Stack has been shut down")]
    ShutDown,
}

impl StackError {
    /// Returns the configured bound if this is a readiness timeout.
    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            StackError::InitTimeout { timeout_secs } => Some(*timeout_secs),
            _ => None,
        }
    }
}

/// Errors surfaced by a [`ContainerRuntime`](crate::runtime::ContainerRuntime).
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// A container with the requested name already exists.
    #[error("The container name \"{name}\" is already in use by container")]
    NameConflict {
        /// The conflicting container name.
        name: String,
    },

    /// Could not reach the runtime.
    #[error("Runtime connection failed: {reason}")]
    Connect {
        /// Reason for failure.
        reason: String,
    },

    /// Any other API failure.
    #[error("{reason}")]
    Api {
        /// Reason for failure.
        reason: String,
    },
}

impl RuntimeError {
    pub fn api(reason: impl Into<String>) -> Self {
        RuntimeError::Api {
            reason: reason.into(),
        }
    }

    pub fn is_name_conflict(&self) -> bool {
        matches!(self, RuntimeError::NameConflict { .. })
    }
}

/// Errors from the functional probe. Never escapes `is_functional`.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The client configuration could not be built.
    #[error("Probe client configuration failed: {reason}")]
    Config {
        /// Reason for failure.
        reason: String,
    },

    /// A request against the emulated service failed.
    #[error("Probe request failed: {0}")]
    Request(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_carries_bound() {
        let err = StackError::InitTimeout { timeout_secs: 30 };
        assert_eq!(err.timeout_secs(), Some(30));
        assert_eq!(
            err.to_string(),
            "localstack: init timeout exceeded (30 seconds)"
        );

        let other = StackError::ShutDown;
        assert_eq!(other.timeout_secs(), None);
    }

    #[test]
    fn test_name_conflict_message() {
        let err = RuntimeError::NameConflict {
            name: "ls".to_string(),
        };
        assert!(err.is_name_conflict());
        assert!(
            err.to_string()
                .contains("The container name \"ls\" is already in use")
        );
        assert!(!RuntimeError::api("boom").is_name_conflict());
    }

    #[test]
    fn test_create_error_wraps_source() {
        let err = StackError::Create {
            source: RuntimeError::api("no space left"),
        };
        assert_eq!(
            err.to_string(),
            "localstack: could not create container: no space left"
        );
    }
}
