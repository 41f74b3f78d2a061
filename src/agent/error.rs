//! Errors surfaced to the backup host.

use crate::error::Error;

/// Result type for agent operations.
pub type AgentResult<T> = std::result::Result<T, BackupAgentError>;

/// Host-visible agent failure.
///
/// Client errors are never exposed directly; they are wrapped into a message
/// naming the failed operation, with the client error kept as the source.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BackupAgentError {
    /// A storage operation failed.
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Error,
    },

    /// No stored backup has the requested id.
    #[error("Backup not found: {backup_id}")]
    NotFound { backup_id: String },

    /// The operation is not available for this agent.
    #[error("{operation} is not supported")]
    Unsupported { operation: String },
}

impl BackupAgentError {
    /// Wraps a client error raised while trying to `action`, e.g.
    /// `"upload backup"` gives `Failed to upload backup: <cause>`.
    pub fn failed(action: &str, source: Error) -> Self {
        if let Error::Unsupported { operation } = source {
            return Self::Unsupported { operation };
        }
        Self::Failed {
            message: format!("Failed to {action}: {source}"),
            source,
        }
    }

    /// Create a not found error.
    pub fn not_found(backup_id: impl Into<String>) -> Self {
        Self::NotFound {
            backup_id: backup_id.into(),
        }
    }

    /// The client error behind a failure, if any.
    pub fn client_error(&self) -> Option<&Error> {
        match self {
            Self::Failed { source, .. } => Some(source),
            _ => None,
        }
    }
}
