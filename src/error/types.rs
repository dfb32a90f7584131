//! Error types for the cAdvisor charm.

use thiserror::Error;

/// Main error type for a convergence pass.
#[derive(Error, Debug)]
pub enum CharmError {
    /// Settings or charm option loading errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid option values.
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// The registration service answered with a non-success status.
    #[error("Registration error: {action} of target {target} failed with status {status}: {body}")]
    Registration {
        action: String,
        target: String,
        status: u16,
        body: String,
    },

    /// Package manager failures.
    #[error("Install error: {kind}")]
    Install { kind: CommandErrorKind },

    /// Service manager failures.
    #[error("Service '{unit}' error: {kind}")]
    Service { unit: String, kind: CommandErrorKind },

    /// Any other subprocess failure.
    #[error("Command '{program}' failed: {kind}")]
    Command { program: String, kind: CommandErrorKind },

    /// Failure while fetching an install file.
    #[error("Download of '{url}' failed: {message}")]
    Download { url: String, message: String },

    /// Framework hook tool failures.
    #[error("Hook tool '{tool}' failed: {message}")]
    Hook { tool: String, message: String },

    /// Template-related errors.
    #[error("Template error: {message}")]
    Template { message: String },

    /// Persistent state errors.
    #[error("State error: {message}")]
    State { message: String },

    /// The dispatcher could not reach a fixed point.
    #[error("Convergence error: {message}")]
    Convergence { message: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Invalid port: {value}")]
    InvalidPort { value: i64 },

    #[error("Invalid URL for '{option}': {value}")]
    InvalidUrl { option: String, value: String },

    #[error("Invalid package name: {package}")]
    InvalidPackageName { package: String },

    #[error("Invalid value for '{option}': {message}")]
    InvalidOption { option: String, message: String },
}

/// Subprocess error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Command timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

impl CharmError {
    /// Short machine-readable code, used by the pass journal.
    pub fn code(&self) -> &'static str {
        match self {
            CharmError::Config { .. } => "CONFIG",
            CharmError::Validation { .. } => "VALIDATION",
            CharmError::Registration { .. } => "REGISTRATION",
            CharmError::Install { .. } => "INSTALL",
            CharmError::Service { .. } => "SERVICE",
            CharmError::Command { .. } => "COMMAND",
            CharmError::Download { .. } => "DOWNLOAD",
            CharmError::Hook { .. } => "HOOK",
            CharmError::Template { .. } => "TEMPLATE",
            CharmError::State { .. } => "STATE",
            CharmError::Convergence { .. } => "CONVERGENCE",
            CharmError::Io(_) => "IO",
            CharmError::Serialization(_) => "SERIALIZATION",
        }
    }

    pub(crate) fn execution_failed(message: impl Into<String>) -> Self {
        CharmError::Install {
            kind: CommandErrorKind::ExecutionFailed {
                message: message.into(),
            },
        }
    }

    pub(crate) fn command_failed(program: &str, message: impl Into<String>) -> Self {
        CharmError::Command {
            program: program.to_string(),
            kind: CommandErrorKind::ExecutionFailed {
                message: message.into(),
            },
        }
    }

    /// Report a subprocess failure as a package manager failure.
    pub(crate) fn into_install(self) -> Self {
        match self {
            CharmError::Command { kind, .. } => CharmError::Install { kind },
            other => other,
        }
    }

    /// Report a subprocess failure as a failure of service `unit`.
    pub(crate) fn into_service(self, unit: &str) -> Self {
        match self {
            CharmError::Command { kind, .. } => CharmError::Service {
                unit: unit.to_string(),
                kind,
            },
            other => other,
        }
    }
}

/// Result type alias for charm operations.
pub type CharmResult<T> = Result<T, CharmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_error_message() {
        let err = CharmError::Registration {
            action: "register".to_string(),
            target: "10.0.0.1:9103".to_string(),
            status: 503,
            body: "unavailable".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("10.0.0.1:9103"));
        assert!(message.contains("503"));
        assert!(message.contains("unavailable"));
        assert_eq!(err.code(), "REGISTRATION");
    }

    #[test]
    fn test_command_failures_are_reclassified_by_caller() {
        let timeout = || CharmError::Command {
            program: "systemctl".to_string(),
            kind: CommandErrorKind::Timeout { timeout_secs: 30 },
        };
        assert_eq!(timeout().code(), "COMMAND");
        assert_eq!(timeout().into_service("cadvisor").code(), "SERVICE");
        assert_eq!(timeout().into_install().code(), "INSTALL");

        let config = CharmError::Config {
            message: "bad".to_string(),
        };
        assert_eq!(config.into_install().code(), "CONFIG");
    }

    #[test]
    fn test_execution_failed_is_install_error() {
        let err = CharmError::execution_failed("dpkg exited with 1");
        assert_eq!(err.code(), "INSTALL");
        assert!(err.to_string().contains("dpkg exited with 1"));
    }
}
