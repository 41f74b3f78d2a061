//! Entry lifecycle: turning a configuration into a ready agent and back.

use std::sync::Arc;

use tracing::info;

use crate::agent::{AgentListeners, StorjBackupAgent};
use crate::client::StorjClient;
use crate::config::{Config, GatewayConfig};
use crate::error::{Error, Result};
use crate::gateway::{GatewayRunner, ProcessRunner};

/// Subprocess runner honoring the configured timeout.
pub fn process_runner(config: &GatewayConfig) -> Arc<dyn GatewayRunner> {
    match config.timeout() {
        Some(timeout) => Arc::new(ProcessRunner::with_timeout(timeout)),
        None => Arc::new(ProcessRunner::new()),
    }
}

/// Builds the client for `config`, imports the access grant and returns the
/// agent for the entry.
///
/// Authentication happens here once; agent operations never repeat it.
///
/// # Errors
///
/// Returns [`Error::Authentication`] if the gateway rejects the grant and
/// [`Error::GatewayLaunch`] if it cannot be started.
pub async fn setup_entry(
    config: &Config,
    runner: Arc<dyn GatewayRunner>,
) -> Result<StorjBackupAgent> {
    let mut client =
        StorjClient::new(runner, config.bucket_name.clone()).with_program(config.gateway.program.clone());
    if let Some(instance_id) = &config.instance_id {
        client = client.with_instance_id(instance_id.clone());
    }

    if !client.authenticate(&config.access_grant).await? {
        return Err(Error::authentication("the gateway rejected the access grant"));
    }

    info!(bucket = %config.bucket_name, title = config.title(), "Storage entry ready");
    Ok(StorjBackupAgent::new(
        client,
        config.title(),
        config.unique_id(),
        config.backup_dir.clone(),
    ))
}

/// Tears an entry down, telling listeners the set of agents changed.
pub fn unload_entry(listeners: &AgentListeners) {
    listeners.notify();
}
