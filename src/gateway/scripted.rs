//! Runner that replays canned results.

use std::collections::VecDeque;
use std::io;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{GatewayRunner, ProcessResult};
use crate::error::{Error, Result};

/// Gateway runner returning queued results in order.
///
/// Every invocation is recorded so tests can assert on the exact argument
/// vectors sent to the gateway. Once the queue is drained further calls fail
/// with a launch error.
///
/// # Example
///
/// ```ignore
/// let runner = Arc::new(ScriptedRunner::with_results([ProcessResult::failure(1, "denied")]));
/// let client = StorjClient::new(runner.clone(), "ha-backups");
/// assert!(client.upload_backup(dir, &record).await.is_err());
/// assert_eq!(runner.calls()[0][1], "cp");
/// ```
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    results: Mutex<VecDeque<ProcessResult>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    /// Creates a runner with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner that returns `results` in order.
    pub fn with_results(results: impl IntoIterator<Item = ProcessResult>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Appends a result to the queue.
    pub fn push(&self, result: ProcessResult) {
        self.results.lock().push_back(result);
    }

    /// Argument vectors received so far, oldest first.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    /// Number of invocations so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl GatewayRunner for ScriptedRunner {
    async fn run(&self, argv: &[String], _stdin: Option<&[u8]>) -> Result<ProcessResult> {
        self.calls.lock().push(argv.to_vec());

        self.results.lock().pop_front().ok_or_else(|| {
            Error::gateway_launch(
                argv.first().cloned().unwrap_or_default(),
                io::Error::new(io::ErrorKind::NotFound, "no scripted result left"),
            )
        })
    }
}
