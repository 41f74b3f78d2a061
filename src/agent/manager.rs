//! Backup overview across agents.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use super::BackupAgent;
use crate::client::BackupRecord;

/// A backup together with the agents that hold a copy of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagedBackup {
    #[serde(flatten)]
    pub backup: BackupRecord,
    pub agent_ids: Vec<String>,
}

/// Combined listing of every agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackupInfo {
    pub backups: Vec<ManagedBackup>,
    /// Failure message per agent id.
    pub agent_errors: BTreeMap<String, String>,
}

/// Lists all `agents` concurrently and merges the results by backup id.
///
/// A failing agent contributes one entry to `agent_errors` and nothing else;
/// the overview itself always succeeds. Backups keep the order in which they
/// were first seen.
pub async fn collect_backup_info(agents: &[Arc<dyn BackupAgent>]) -> BackupInfo {
    let listings = join_all(agents.iter().map(|agent| async move {
        (agent.agent_id().to_string(), agent.list_backups().await)
    }))
    .await;

    let mut info = BackupInfo::default();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for (agent_id, listing) in listings {
        let backups = match listing {
            Ok(backups) => backups,
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Agent failed to list backups");
                info.agent_errors.insert(agent_id, e.to_string());
                continue;
            },
        };

        for backup in backups {
            if let Some(&position) = index.get(&backup.backup_id) {
                info.backups[position].agent_ids.push(agent_id.clone());
                continue;
            }
            index.insert(backup.backup_id.clone(), info.backups.len());
            info.backups.push(ManagedBackup {
                backup,
                agent_ids: vec![agent_id.clone()],
            });
        }
    }

    info
}
