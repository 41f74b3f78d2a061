//! Invocation of the external storage gateway.
//!
//! Every storage operation is one request/response exchange with a
//! subprocess: an argument vector goes in, buffered stdout/stderr and an exit
//! code come out. [`GatewayRunner`] is the only seam between the client and
//! the operating system, so the rest of the crate can be exercised against
//! [`ScriptedRunner`] or [`MemoryGateway`] instead of a real `uplink`.
//!
//! ## Module Structure
//!
//! - [`process`]: real subprocesses through tokio
//! - [`scripted`]: canned responses, records every call
//! - [`memory`]: in-memory emulation of the gateway commands

mod memory;
mod process;
mod scripted;

use std::borrow::Cow;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryGateway;
pub use process::ProcessRunner;
pub use scripted::ScriptedRunner;

/// Outcome of one gateway invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit status; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessResult {
    /// A successful run with the given stdout.
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failure(exit_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with status 0.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout decoded as UTF-8, replacing invalid sequences.
    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }
}

/// Runs gateway commands.
///
/// `argv[0]` names the executable, the remaining elements are its arguments.
/// A non-zero exit is a normal outcome reported through
/// [`ProcessResult::exit_code`]; only a failure to start the process (or to
/// wait for it) is an error. Implementations never retry.
#[async_trait]
pub trait GatewayRunner: Send + Sync + 'static {
    /// Runs one command to completion, optionally feeding `stdin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GatewayLaunch`](crate::Error::GatewayLaunch) if the
    /// executable cannot be started, or
    /// [`Error::GatewayTimeout`](crate::Error::GatewayTimeout) if the runner
    /// enforces a time limit and the process exceeded it.
    async fn run(&self, argv: &[String], stdin: Option<&[u8]>) -> Result<ProcessResult>;
}
