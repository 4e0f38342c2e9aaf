//! CLI error types with exit code handling
//!
//! Deploy failures are mapped to diagnostics naming the failing phase, with
//! a hint on what to look at, and to a distinct exit code.

use kptdeploy_live::{DeployError, ErrorKind};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Package or inventory initialization failed
    #[error("Init failed: {message}")]
    #[diagnostic(code(kptdeploy::cli::init))]
    Init {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Kptfile is unreadable or malformed
    #[error("Kptfile error: {message}")]
    #[diagnostic(code(kptdeploy::cli::descriptor))]
    Descriptor {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// `kpt live apply` failed
    #[error("Apply failed: {message}")]
    #[diagnostic(code(kptdeploy::cli::apply))]
    Apply {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// `kpt live destroy` failed
    #[error("Destroy failed: {message}")]
    #[diagnostic(code(kptdeploy::cli::destroy))]
    Destroy {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Operation interrupted
    #[error("Cancelled: {message}")]
    #[diagnostic(code(kptdeploy::cli::cancelled))]
    Cancelled { message: String },

    /// Invalid config file or arguments
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kptdeploy::cli::config))]
    Config { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(kptdeploy::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(kptdeploy::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Init { .. } => exit_codes::INIT_ERROR,
            CliError::Descriptor { .. } => exit_codes::DESCRIPTOR_ERROR,
            CliError::Apply { .. } => exit_codes::APPLY_ERROR,
            CliError::Destroy { .. } => exit_codes::DESTROY_ERROR,
            CliError::Cancelled { .. } => exit_codes::CANCELLED,
            CliError::Config { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<DeployError> for CliError {
    fn from(err: DeployError) -> Self {
        let message = err.to_string();
        if err.is_cancelled() {
            return CliError::Cancelled { message };
        }
        let dir = err.path().display().to_string();
        match err.kind() {
            ErrorKind::Initialization => CliError::Init {
                message,
                help: Some(format!("Check that kpt is installed and that {dir} is writable")),
            },
            ErrorKind::LiveInit => CliError::Init {
                message,
                help: Some(
                    "Check cluster access, or pass --force to adopt an existing inventory"
                        .to_string(),
                ),
            },
            ErrorKind::DescriptorCorrupt => CliError::Descriptor {
                message,
                help: Some(format!("Fix or remove {dir} and run the command again")),
            },
            ErrorKind::Io => CliError::Io { message },
            ErrorKind::LiveApply => CliError::Apply {
                message,
                help: Some("See the kpt output above for the resources that failed".to_string()),
            },
            ErrorKind::LiveDestroy => CliError::Destroy {
                message,
                help: Some("Resources may be partially deleted; run cleanup again".to_string()),
            },
            ErrorKind::SourceCollection => CliError::Internal { message },
        }
    }
}

impl From<kptdeploy_core::CoreError> for CliError {
    fn from(err: kptdeploy_core::CoreError) -> Self {
        CliError::Config {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kptdeploy_live::CommandError;
    use std::path::PathBuf;

    #[test]
    fn test_apply_failure_maps_to_apply_exit_code() {
        let err: CliError = DeployError::LiveApply {
            dir: PathBuf::from("/pkg"),
            source: CommandError::Exit {
                command: "kpt live apply /pkg".to_string(),
                code: Some(1),
                stderr: String::new(),
            },
        }
        .into();
        assert!(matches!(err, CliError::Apply { .. }));
        assert_eq!(err.exit_code(), exit_codes::APPLY_ERROR);
    }

    #[test]
    fn test_cancelled_command_maps_to_cancelled() {
        let err: CliError = DeployError::LiveDestroy {
            dir: PathBuf::from("/pkg"),
            source: CommandError::Cancelled {
                command: "kpt live destroy /pkg".to_string(),
            },
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::CANCELLED);
    }
}
