//! Gateway commands as real subprocesses.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{GatewayRunner, ProcessResult};
use crate::error::{Error, Result};

/// Runs gateway commands with `tokio::process`.
///
/// Children are spawned with `kill_on_drop`, so a run that exceeds the
/// configured timeout (or whose future is dropped by the caller) terminates
/// the subprocess instead of leaking it.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Creates a runner without a time limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner that kills commands running longer than `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Configured time limit, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl GatewayRunner for ProcessRunner {
    async fn run(&self, argv: &[String], stdin: Option<&[u8]>) -> Result<ProcessResult> {
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::gateway_launch(
                "",
                io::Error::new(io::ErrorKind::InvalidInput, "empty argument vector"),
            ));
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Arguments may carry the access grant; only their count is logged.
        debug!(program = %program, args = args.len(), "Running gateway command");

        let mut child = command
            .spawn()
            .map_err(|e| Error::gateway_launch(program, e))?;

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            let input = input.to_vec();
            // Feed stdin concurrently so a chatty child cannot block on a full stdout pipe.
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&input).await {
                    debug!(error = %e, "Gateway closed stdin early");
                }
            });
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| Error::GatewayTimeout {
                    program: program.clone(),
                    timeout: limit,
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Error::gateway_launch(program, e))?;

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(program = %program, exit_code, "Gateway command finished");

        Ok(ProcessResult {
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
