//! Storage client for backups kept in a Storj bucket.
//!
//! [`StorjClient`] drives the `uplink` gateway through a [`GatewayRunner`]:
//!
//! - credentials are imported once under a fixed alias
//! - each backup is one object under `backups/`, named by
//!   [`suggested_filename`], with the backup record attached as flattened
//!   object metadata
//! - listing fetches the metadata of every object and keeps only those
//!   carrying our `metadata_version` marker
//!
//! There is no cache: every listing queries the bucket again.

mod commands;
mod naming;
mod types;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec::{self, CodecError, FlattenedMetadata};
use crate::constants::{
    CREDENTIAL_ALIAS, DEFAULT_GATEWAY_PROGRAM, MARKER_FIELD, METADATA_VERSION, OBJECT_NOT_FOUND,
};
use crate::error::{Error, Result};
use crate::gateway::{GatewayRunner, ProcessResult};

pub use naming::{backup_object_uri, backup_prefix_uri, suggested_filename};
pub use types::{AddonInfo, BackupRecord, BackupStream, RemoteObjectDescriptor};

use types::MetadataEnvelope;

/// Client for one bucket.
///
/// Cheap to clone; clones share the runner. The client keeps no mutable
/// state, so operations may run concurrently.
#[derive(Clone)]
pub struct StorjClient {
    runner: Arc<dyn GatewayRunner>,
    program: String,
    bucket_name: String,
    instance_id: Option<String>,
}

impl StorjClient {
    /// Creates a client for `bucket_name` using the default `uplink` program.
    pub fn new(runner: Arc<dyn GatewayRunner>, bucket_name: impl Into<String>) -> Self {
        Self {
            runner,
            program: DEFAULT_GATEWAY_PROGRAM.to_string(),
            bucket_name: bucket_name.into(),
            instance_id: None,
        }
    }

    /// Uses `program` as the gateway executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Records `instance_id` in the metadata of every upload.
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Name of the bucket this client talks to.
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Imports `access_grant` into the gateway's credential store.
    ///
    /// Returns whether the gateway accepted the grant. Importing the same
    /// grant again under the same alias is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GatewayLaunch`] if the gateway cannot be started.
    pub async fn authenticate(&self, access_grant: &str) -> Result<bool> {
        let argv = commands::access_import(&self.program, CREDENTIAL_ALIAS, access_grant);
        let result = self.runner.run(&argv, None).await?;

        if !result.is_success() {
            warn!(
                exit_code = result.exit_code,
                stderr = %String::from_utf8_lossy(&result.stderr).trim(),
                "Access grant import failed"
            );
        }
        Ok(result.is_success())
    }

    /// Uploads `<backup_dir>/<suggested filename>` with `backup` attached as
    /// metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if the record cannot be encoded and
    /// [`Error::GatewayOperation`] if the gateway reports failure.
    pub async fn upload_backup(&self, backup_dir: &Path, backup: &BackupRecord) -> Result<()> {
        let filename = suggested_filename(backup)?;
        debug!("Uploading backup: {} as {}", backup.backup_id, filename);

        let envelope = MetadataEnvelope {
            metadata_version: METADATA_VERSION,
            instance_id: self.instance_id.clone(),
            backup,
        };
        let metadata = codec::encode(&envelope)?;
        let metadata_json =
            serde_json::to_string(&metadata).map_err(|e| CodecError::Encode(e.to_string()))?;

        let argv = commands::upload(
            &self.program,
            &backup_dir.join(&filename),
            &backup_object_uri(&self.bucket_name, &filename),
            &metadata_json,
        );
        self.run_checked("upload", &argv).await?;

        debug!("Uploaded backup: {} to '{}'", backup.backup_id, self.bucket_name);
        info!(backup_id = %backup.backup_id, bucket = %self.bucket_name, "Backup uploaded");
        Ok(())
    }

    /// Lists the backups stored in the bucket, in listing order.
    ///
    /// Entries that cannot be parsed, carry no marker or fail to decode are
    /// skipped. When two objects describe the same `backup_id` the first one
    /// listed wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GatewayOperation`] if listing or fetching the metadata
    /// of a listed object fails.
    pub async fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let argv = commands::list(&self.program, &backup_prefix_uri(&self.bucket_name));
        let listing = self.run_checked("listing", &argv).await?;

        let mut backups = Vec::new();
        let mut seen = HashSet::new();

        for line in listing.stdout_text().lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            let descriptor: RemoteObjectDescriptor = match serde_json::from_str(line) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!(error = %e, "Skipping unparseable listing entry");
                    continue;
                },
            };
            if !descriptor.is_object() {
                continue;
            }

            let Some(backup) = self.resolve(&descriptor).await? else {
                continue;
            };
            if !seen.insert(backup.backup_id.clone()) {
                warn!(
                    backup_id = %backup.backup_id,
                    key = %descriptor.key,
                    "Skipping duplicate backup id"
                );
                continue;
            }
            backups.push(backup);
        }

        debug!(count = backups.len(), bucket = %self.bucket_name, "Listed backups");
        Ok(backups)
    }

    /// Finds a backup by id through a full listing.
    ///
    /// # Errors
    ///
    /// Returns the listing error, if any.
    pub async fn get_backup(&self, backup_id: &str) -> Result<Option<BackupRecord>> {
        Ok(self
            .list_backups()
            .await?
            .into_iter()
            .find(|backup| backup.backup_id == backup_id))
    }

    /// Removes the object holding `backup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if the object name cannot be derived and
    /// [`Error::GatewayOperation`] if the gateway reports failure.
    pub async fn delete_backup(&self, backup: &BackupRecord) -> Result<()> {
        let filename = suggested_filename(backup)?;
        let argv = commands::remove(
            &self.program,
            &backup_object_uri(&self.bucket_name, &filename),
        );
        self.run_checked("delete", &argv).await?;

        info!(backup_id = %backup.backup_id, bucket = %self.bucket_name, "Backup deleted");
        Ok(())
    }

    /// Downloading is not available yet.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::Unsupported`].
    pub async fn download_backup(&self, backup_id: &str) -> Result<BackupStream> {
        debug!(backup_id, "Download requested");
        Err(Error::unsupported("download"))
    }

    /// Fetches and decodes the metadata of one listed object.
    ///
    /// `Ok(None)` means the object is not one of our backups or its metadata
    /// is unreadable.
    async fn resolve(&self, descriptor: &RemoteObjectDescriptor) -> Result<Option<BackupRecord>> {
        let argv = commands::meta_get(
            &self.program,
            &backup_object_uri(&self.bucket_name, &descriptor.key),
        );
        let result = self.runner.run(&argv, None).await?;
        if !result.is_success() {
            // Removed between `ls` and `meta get`, e.g. by a concurrent delete.
            if String::from_utf8_lossy(&result.stderr)
                .to_ascii_lowercase()
                .contains(OBJECT_NOT_FOUND)
            {
                warn!(key = %descriptor.key, "Skipping object that disappeared during listing");
                return Ok(None);
            }
            warn!(operation = "metadata fetch", exit_code = result.exit_code, "Gateway command failed");
            return Err(Error::gateway_operation("metadata fetch", &result.stderr));
        }

        let metadata: FlattenedMetadata = match serde_json::from_slice(&result.stdout) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(key = %descriptor.key, error = %e, "Skipping object with unparseable metadata");
                return Ok(None);
            },
        };

        match decode_backup(&metadata) {
            Ok(Some(backup)) => Ok(Some(backup)),
            Ok(None) => {
                debug!(key = %descriptor.key, "Skipping object without backup marker");
                Ok(None)
            },
            Err(e) => {
                warn!(key = %descriptor.key, error = %e, "Skipping object with invalid backup metadata");
                Ok(None)
            },
        }
    }

    /// Runs `argv` and turns a non-zero exit into [`Error::GatewayOperation`].
    async fn run_checked(&self, operation: &str, argv: &[String]) -> Result<ProcessResult> {
        let result = self.runner.run(argv, None).await?;
        if !result.is_success() {
            warn!(operation, exit_code = result.exit_code, "Gateway command failed");
            return Err(Error::gateway_operation(operation, &result.stderr));
        }
        Ok(result)
    }
}

/// Rebuilds a backup record from object metadata.
///
/// Returns `Ok(None)` when the marker is missing or names a version this
/// client does not understand. The marker is read from the flat entries, so
/// foreign metadata is never rebuilt.
fn decode_backup(metadata: &FlattenedMetadata) -> std::result::Result<Option<BackupRecord>, CodecError> {
    let marked = metadata
        .get(MARKER_FIELD)
        .and_then(|raw| serde_json::from_str::<u64>(raw).ok())
        == Some(METADATA_VERSION);
    if !marked {
        return Ok(None);
    }

    let envelope: MetadataEnvelope<BackupRecord> = codec::decode(metadata)?;
    Ok(Some(envelope.backup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ScriptedRunner;
    use serde_json::json;

    fn record() -> BackupRecord {
        let mut backup = BackupRecord::new("test-backup", "Test", "2025-01-01T01:23:45.678Z", 987);
        backup.addons = vec![AddonInfo {
            name: "Test".to_string(),
            slug: "test".to_string(),
            version: "1.0.0".to_string(),
        }];
        backup.database_included = true;
        backup.homeassistant_included = true;
        backup.homeassistant_version = Some("2024.12.0".to_string());
        backup
            .extra_metadata
            .insert("with_automatic_settings".to_string(), json!(false));
        backup
    }

    fn marked_metadata(backup: &BackupRecord) -> String {
        let envelope = MetadataEnvelope {
            metadata_version: METADATA_VERSION,
            instance_id: None,
            backup,
        };
        serde_json::to_string(&codec::encode(&envelope).unwrap()).unwrap()
    }

    fn client(runner: &Arc<ScriptedRunner>) -> StorjClient {
        StorjClient::new(runner.clone(), "ha-backups")
    }

    #[tokio::test]
    async fn test_authenticate_reports_exit_status() {
        let runner = Arc::new(ScriptedRunner::with_results([
            ProcessResult::success(""),
            ProcessResult::failure(1, "invalid access"),
        ]));
        let client = client(&runner);

        assert!(client.authenticate("123xyz").await.unwrap());
        assert!(!client.authenticate("123xyz").await.unwrap());
        assert_eq!(
            runner.calls()[0],
            ["uplink", "access", "import", CREDENTIAL_ALIAS, "123xyz"]
        );
    }

    #[tokio::test]
    async fn test_upload_builds_copy_command() {
        let runner = Arc::new(ScriptedRunner::with_results([ProcessResult::success("")]));
        let client = client(&runner).with_instance_id("instance-1");

        client
            .upload_backup(Path::new("/config/backups"), &record())
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        let argv = &calls[0];
        assert_eq!(argv[1], "cp");
        assert_eq!(argv[2], "/config/backups/Test_2025-01-01_01.23_45678000.tar");
        assert_eq!(
            argv[3],
            "sj://ha-backups/backups/Test_2025-01-01_01.23_45678000.tar"
        );
        assert_eq!(argv[4], "--metadata");

        let metadata: FlattenedMetadata = serde_json::from_str(&argv[5]).unwrap();
        assert_eq!(metadata["metadata_version"], "1");
        assert_eq!(metadata["instance_id"], r#""instance-1""#);
        assert_eq!(metadata["backup.addons[0].slug"], r#""test""#);
        assert_eq!(decode_backup(&metadata).unwrap(), Some(record()));
    }

    #[tokio::test]
    async fn test_upload_failure_is_operation_error() {
        let runner = Arc::new(ScriptedRunner::with_results([ProcessResult::failure(
            1,
            "uplink: permission denied",
        )]));
        let err = client(&runner)
            .upload_backup(Path::new("/backups"), &record())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::GatewayOperation { .. }));
        assert!(err.to_string().contains("Unable to complete upload"));
    }

    #[tokio::test]
    async fn test_list_keeps_marked_objects_only() {
        let listing = [
            r#"{"kind":"OBJ","created":"2025-01-01T00:00:00Z","size":987,"key":"a.tar"}"#,
            r#"{"kind":"OBJ","created":"2025-01-01T00:00:00Z","size":5,"key":"b.tar"}"#,
        ]
        .join("\n");
        let runner = Arc::new(ScriptedRunner::with_results([
            ProcessResult::success(listing),
            ProcessResult::success(marked_metadata(&record())),
            ProcessResult::success(r#"{"content-type":"\"application/x-tar\""}"#),
        ]));

        let backups = client(&runner).list_backups().await.unwrap();

        assert_eq!(backups, vec![record()]);
        let calls = runner.calls();
        assert_eq!(calls[0], ["uplink", "ls", "sj://ha-backups/backups/", "--o", "json"]);
        assert_eq!(calls[1], ["uplink", "meta", "get", "sj://ha-backups/backups/a.tar"]);
        assert_eq!(calls[2], ["uplink", "meta", "get", "sj://ha-backups/backups/b.tar"]);
    }

    #[tokio::test]
    async fn test_list_skips_bad_lines_prefixes_and_metadata() {
        let listing = [
            "not json",
            r#"{"kind":"PRE","key":"old/"}"#,
            r#"{"kind":"OBJ","key":"garbled.tar"}"#,
            r#"{"kind":"OBJ","key":"foreign.tar"}"#,
            r#"{"kind":"OBJ","key":"a.tar"}"#,
        ]
        .join("\n");
        let runner = Arc::new(ScriptedRunner::with_results([
            ProcessResult::success(listing),
            ProcessResult::success("garbage"),
            ProcessResult::success(r#"{"metadata_version":"1","backup.size":"[1]"}"#),
            ProcessResult::success(marked_metadata(&record())),
        ]));

        let backups = client(&runner).list_backups().await.unwrap();

        assert_eq!(backups.len(), 1);
        assert_eq!(runner.call_count(), 4);
    }

    #[tokio::test]
    async fn test_list_drops_duplicate_ids() {
        let listing = [r#"{"kind":"OBJ","key":"a.tar"}"#, r#"{"kind":"OBJ","key":"a-copy.tar"}"#].join("\n");
        let mut copy = record();
        copy.name = "Copy".to_string();
        let runner = Arc::new(ScriptedRunner::with_results([
            ProcessResult::success(listing),
            ProcessResult::success(marked_metadata(&record())),
            ProcessResult::success(marked_metadata(&copy)),
        ]));

        let backups = client(&runner).list_backups().await.unwrap();
        assert_eq!(backups, vec![record()]);
    }

    #[tokio::test]
    async fn test_list_failure_is_fatal() {
        let runner = Arc::new(ScriptedRunner::with_results([ProcessResult::failure(
            1,
            "bucket not found",
        )]));
        let err = client(&runner).list_backups().await.unwrap_err();
        assert!(matches!(err, Error::GatewayOperation { ref operation, .. } if operation == "listing"));
    }

    #[tokio::test]
    async fn test_metadata_fetch_failure_is_fatal() {
        let runner = Arc::new(ScriptedRunner::with_results([
            ProcessResult::success(r#"{"kind":"OBJ","key":"a.tar"}"#),
            ProcessResult::failure(1, "permission denied"),
        ]));
        let err = client(&runner).list_backups().await.unwrap_err();
        assert!(matches!(err, Error::GatewayOperation { ref operation, .. } if operation == "metadata fetch"));
    }

    #[tokio::test]
    async fn test_list_skips_object_removed_during_listing() {
        let listing = [r#"{"kind":"OBJ","key":"gone.tar"}"#, r#"{"kind":"OBJ","key":"a.tar"}"#].join("\n");
        let runner = Arc::new(ScriptedRunner::with_results([
            ProcessResult::success(listing),
            ProcessResult::failure(1, "Object not found: sj://ha-backups/backups/gone.tar"),
            ProcessResult::success(marked_metadata(&record())),
        ]));

        let backups = client(&runner).list_backups().await.unwrap();
        assert_eq!(backups, vec![record()]);
    }

    #[tokio::test]
    async fn test_list_skips_deeply_nested_metadata() {
        let deep_key = format!("a{}", "[0]".repeat(200_000));
        let foreign: FlattenedMetadata = [(deep_key.clone(), "1".to_string())].into_iter().collect();
        let mut marked: FlattenedMetadata = serde_json::from_str(&marked_metadata(&record())).unwrap();
        marked.insert(format!("backup.extra_metadata.{deep_key}"), "1".to_string());

        let listing = [
            r#"{"kind":"OBJ","key":"foreign.tar"}"#,
            r#"{"kind":"OBJ","key":"nested.tar"}"#,
            r#"{"kind":"OBJ","key":"a.tar"}"#,
        ]
        .join("\n");
        let runner = Arc::new(ScriptedRunner::with_results([
            ProcessResult::success(listing),
            ProcessResult::success(serde_json::to_string(&foreign).unwrap()),
            ProcessResult::success(serde_json::to_string(&marked).unwrap()),
            ProcessResult::success(marked_metadata(&record())),
        ]));

        let backups = client(&runner).list_backups().await.unwrap();
        assert_eq!(backups, vec![record()]);
    }

    #[tokio::test]
    async fn test_get_backup_absent() {
        let runner = Arc::new(ScriptedRunner::with_results([ProcessResult::success("")]));
        let found = client(&runner).get_backup("nonexistent-id").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_delete_uses_upload_name() {
        let runner = Arc::new(ScriptedRunner::with_results([
            ProcessResult::success(""),
            ProcessResult::failure(1, "object not found"),
        ]));
        let client = client(&runner);

        client.delete_backup(&record()).await.unwrap();
        let err = client.delete_backup(&record()).await.unwrap_err();

        assert_eq!(
            runner.calls()[0],
            ["uplink", "rm", "sj://ha-backups/backups/Test_2025-01-01_01.23_45678000.tar"]
        );
        assert!(err.to_string().contains("Unable to complete delete"));
    }

    #[tokio::test]
    async fn test_download_is_unsupported() {
        let runner = Arc::new(ScriptedRunner::new());
        let err = client(&runner).download_backup("test-backup").await.err();
        assert!(matches!(err, Some(Error::Unsupported { .. })));
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_decode_rejects_unknown_marker_version() {
        let mut metadata: FlattenedMetadata =
            serde_json::from_str(&marked_metadata(&record())).unwrap();
        metadata.insert(MARKER_FIELD.to_string(), "2".to_string());
        assert_eq!(decode_backup(&metadata).unwrap(), None);

        metadata.remove(MARKER_FIELD);
        assert_eq!(decode_backup(&metadata).unwrap(), None);
    }
}
