//! Backup agent adapter.
//!
//! [`BackupAgent`] is the contract the backup host consumes: list, upload,
//! get, download and delete by backup id. [`StorjBackupAgent`] fulfils it on
//! top of a [`StorjClient`], turning every client error into a
//! [`BackupAgentError`] whose message names the failed operation.
//!
//! ## Module Structure
//!
//! - [`error`]: host-visible errors
//! - [`listeners`]: "agents changed" callbacks owned by the host
//! - [`manager`]: combined listing across agents

mod error;
mod listeners;
mod manager;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::client::{BackupRecord, BackupStream, StorjClient};
use crate::constants::DOMAIN;

pub use error::{AgentResult, BackupAgentError};
pub use listeners::{AgentListeners, ListenerHandle};
pub use manager::{BackupInfo, ManagedBackup, collect_backup_info};

/// Storage location the backup host can use.
///
/// All operations take an already authenticated agent; none of them
/// re-authenticates.
#[async_trait]
pub trait BackupAgent: Send + Sync + 'static {
    /// Identifier unique across all agents, `<domain>.<unique id>`.
    fn agent_id(&self) -> &str;

    /// Display name.
    fn name(&self) -> &str;

    /// Stores the archive described by `backup`.
    async fn upload_backup(&self, backup: &BackupRecord) -> AgentResult<()>;

    /// Every backup held by this agent.
    async fn list_backups(&self) -> AgentResult<Vec<BackupRecord>>;

    /// The backup with `backup_id`, or `None` if there is none.
    async fn get_backup(&self, backup_id: &str) -> AgentResult<Option<BackupRecord>> {
        Ok(self
            .list_backups()
            .await?
            .into_iter()
            .find(|backup| backup.backup_id == backup_id))
    }

    /// Streams the archive of `backup_id`.
    async fn download_backup(&self, backup_id: &str) -> AgentResult<BackupStream>;

    /// Removes the backup with `backup_id`.
    async fn delete_backup(&self, backup_id: &str) -> AgentResult<()>;
}

/// Agent storing backups in one Storj bucket.
#[derive(Clone)]
pub struct StorjBackupAgent {
    client: StorjClient,
    agent_id: String,
    name: String,
    unique_id: String,
    backup_dir: PathBuf,
}

impl StorjBackupAgent {
    /// Creates an agent over an authenticated `client`.
    ///
    /// `backup_dir` is the local directory archives are uploaded from.
    pub fn new(
        client: StorjClient,
        name: impl Into<String>,
        unique_id: impl Into<String>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        let unique_id = unique_id.into();
        Self {
            client,
            agent_id: format!("{DOMAIN}.{unique_id}"),
            name: name.into(),
            unique_id,
            backup_dir: backup_dir.into(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn client(&self) -> &StorjClient {
        &self.client
    }
}

impl std::fmt::Debug for StorjBackupAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // unique_id is the access grant
        f.debug_struct("StorjBackupAgent")
            .field("name", &self.name)
            .field("bucket_name", &self.client.bucket_name())
            .field("backup_dir", &self.backup_dir)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BackupAgent for StorjBackupAgent {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn upload_backup(&self, backup: &BackupRecord) -> AgentResult<()> {
        self.client
            .upload_backup(&self.backup_dir, backup)
            .await
            .map_err(|e| BackupAgentError::failed("upload backup", e))
    }

    async fn list_backups(&self) -> AgentResult<Vec<BackupRecord>> {
        self.client
            .list_backups()
            .await
            .map_err(|e| BackupAgentError::failed("list backups", e))
    }

    async fn download_backup(&self, backup_id: &str) -> AgentResult<BackupStream> {
        debug!(backup_id, "Downloading backup");
        self.client
            .download_backup(backup_id)
            .await
            .map_err(|e| BackupAgentError::failed("download backup", e))
    }

    async fn delete_backup(&self, backup_id: &str) -> AgentResult<()> {
        debug!(backup_id, "Deleting backup");
        let backup = self
            .client
            .get_backup(backup_id)
            .await
            .map_err(|e| BackupAgentError::failed("delete backup", e))?
            .ok_or_else(|| BackupAgentError::not_found(backup_id))?;

        self.client
            .delete_backup(&backup)
            .await
            .map_err(|e| BackupAgentError::failed("delete backup", e))
    }
}
