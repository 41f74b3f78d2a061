//! Error types for the storage client.
//!
//! Gateway failures come in two flavours: the executable could not be started
//! at all ([`Error::GatewayLaunch`]), or it ran and reported failure through a
//! non-zero exit ([`Error::GatewayOperation`]). Nothing here is retried.

use std::time::Duration;

use crate::codec::CodecError;
use crate::constants::STDERR_EXCERPT_LEN;

/// Result type for storage client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage client errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The gateway executable could not be started.
    #[error("failed to launch '{program}': {source}")]
    GatewayLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A gateway command exited with a non-zero status.
    #[error("Unable to complete {operation}: {stderr}")]
    GatewayOperation { operation: String, stderr: String },

    /// A gateway command ran longer than the configured limit and was killed.
    #[error("'{program}' timed out after {timeout:?}")]
    GatewayTimeout { program: String, timeout: Duration },

    /// Metadata could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The access grant was rejected.
    #[error("authentication failed: {reason}")]
    Authentication { reason: String },

    /// The operation is not available through this client.
    #[error("{operation} is not supported")]
    Unsupported { operation: String },
}

impl Error {
    /// Create a launch error.
    pub fn gateway_launch(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::GatewayLaunch {
            program: program.into(),
            source,
        }
    }

    /// Create an operation error, keeping a bounded excerpt of stderr.
    pub fn gateway_operation(operation: impl Into<String>, stderr: &[u8]) -> Self {
        Self::GatewayOperation {
            operation: operation.into(),
            stderr: stderr_excerpt(stderr),
        }
    }

    /// Create an authentication error.
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::Authentication {
            reason: reason.into(),
        }
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Whether the error points at the installation rather than one request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::GatewayLaunch { .. } | Self::Authentication { .. })
    }
}

/// Trims stderr and cuts it to [`STDERR_EXCERPT_LEN`] bytes on a char boundary.
fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_EXCERPT_LEN {
        return text.to_string();
    }

    let mut end = STDERR_EXCERPT_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
