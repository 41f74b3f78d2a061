//! In-memory emulation of the gateway command surface.
//!
//! Understands the subset of `uplink` used by the client (`access import`,
//! `cp`, `ls --o json`, `meta get`, `rm`) and keeps objects in a `DashMap`.
//! Nothing leaves the process. Ideal for testing and local development.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use dashmap::{DashMap, DashSet};
use serde_json::json;

use super::{GatewayRunner, ProcessResult};
use crate::codec::FlattenedMetadata;
use crate::constants::{BUCKET_SCHEME, OBJECT_KIND};
use crate::error::Result;

/// Object held by the emulated bucket.
#[derive(Debug, Clone)]
struct MemoryObject {
    size: u64,
    created: String,
    metadata: FlattenedMetadata,
}

/// Gateway runner backed by an in-memory object store.
///
/// Objects are keyed by `<bucket>/<key>`. Uploads record the size of the
/// local file when it exists and zero otherwise.
///
/// # Thread Safety
///
/// `MemoryGateway` uses `DashMap` internally and can serve concurrent
/// invocations.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    objects: DashMap<String, MemoryObject>,
    credentials: DashMap<String, String>,
    rejected_grants: DashSet<String>,
}

impl MemoryGateway {
    /// Creates an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `access import` fail for `grant`.
    pub fn reject_grant(&self, grant: impl Into<String>) {
        self.rejected_grants.insert(grant.into());
    }

    /// Grant imported under `alias`, if any.
    pub fn credential(&self, alias: &str) -> Option<String> {
        self.credentials.get(alias).map(|g| g.value().clone())
    }

    /// Stores an object directly, bypassing `cp`.
    pub fn insert_object(&self, bucket: &str, key: &str, size: u64, metadata: FlattenedMetadata) {
        self.objects.insert(
            format!("{bucket}/{key}"),
            MemoryObject {
                size,
                created: now(),
                metadata,
            },
        );
    }

    /// Whether `<bucket>/<key>` exists.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects.contains_key(&format!("{bucket}/{key}"))
    }

    /// Number of stored objects across all buckets.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn access_import(&self, args: &[&str]) -> ProcessResult {
        let [alias, grant] = args else {
            return usage("access import <name> <access>");
        };
        if grant.is_empty() || self.rejected_grants.contains(*grant) {
            return ProcessResult::failure(1, "access grant is invalid");
        }
        self.credentials
            .insert((*alias).to_string(), (*grant).to_string());
        ProcessResult::success(format!("Imported access to {alias:?}\n"))
    }

    fn copy(&self, args: &[&str]) -> ProcessResult {
        let (local, remote, metadata) = match args {
            [local, remote] => (*local, *remote, FlattenedMetadata::new()),
            [local, remote, "--metadata", raw] => match serde_json::from_str(raw) {
                Ok(metadata) => (*local, *remote, metadata),
                Err(e) => return ProcessResult::failure(1, format!("invalid metadata: {e}")),
            },
            _ => return usage("cp <source> <destination> [--metadata <json>]"),
        };
        let Some(path) = object_path(remote) else {
            return ProcessResult::failure(1, format!("invalid destination: {remote}"));
        };

        let size = std::fs::metadata(local).map(|m| m.len()).unwrap_or(0);
        self.objects.insert(
            path,
            MemoryObject {
                size,
                created: now(),
                metadata,
            },
        );
        ProcessResult::success(format!("upload {local} to {remote}\n"))
    }

    fn list(&self, args: &[&str]) -> ProcessResult {
        let [prefix_uri, "--o", "json"] = args else {
            return usage("ls <prefix> --o json");
        };
        let Some(prefix) = object_path(prefix_uri) else {
            return ProcessResult::failure(1, format!("invalid prefix: {prefix_uri}"));
        };

        let mut objects = BTreeMap::new();
        let mut prefixes = BTreeSet::new();
        for entry in self.objects.iter() {
            let Some(relative) = entry.key().strip_prefix(&prefix) else {
                continue;
            };
            match relative.split_once('/') {
                Some((dir, _)) => {
                    prefixes.insert(format!("{dir}/"));
                },
                None => {
                    objects.insert(relative.to_string(), entry.value().clone());
                },
            }
        }

        let mut out = String::new();
        for dir in prefixes {
            out.push_str(&json!({"kind": "PRE", "key": dir}).to_string());
            out.push('\n');
        }
        for (key, object) in objects {
            let line = json!({
                "kind": OBJECT_KIND,
                "created": object.created,
                "size": object.size,
                "key": key,
            });
            out.push_str(&line.to_string());
            out.push('\n');
        }
        ProcessResult::success(out)
    }

    fn meta_get(&self, args: &[&str]) -> ProcessResult {
        let [uri] = args else {
            return usage("meta get <location>");
        };
        let Some(object) = object_path(uri).and_then(|path| self.objects.get(&path)) else {
            return ProcessResult::failure(1, format!("object not found: {uri}"));
        };
        match serde_json::to_string(&object.metadata) {
            Ok(text) => ProcessResult::success(text),
            Err(e) => ProcessResult::failure(1, e.to_string()),
        }
    }

    fn remove(&self, args: &[&str]) -> ProcessResult {
        let [uri] = args else {
            return usage("rm <location>");
        };
        match object_path(uri).and_then(|path| self.objects.remove(&path)) {
            Some(_) => ProcessResult::success(format!("removed {uri}\n")),
            None => ProcessResult::failure(1, format!("object not found: {uri}")),
        }
    }
}

#[async_trait]
impl GatewayRunner for MemoryGateway {
    async fn run(&self, argv: &[String], _stdin: Option<&[u8]>) -> Result<ProcessResult> {
        let args: Vec<&str> = argv.iter().skip(1).map(String::as_str).collect();

        let result = match args.as_slice() {
            ["access", "import", rest @ ..] => self.access_import(rest),
            ["cp", rest @ ..] => self.copy(rest),
            ["ls", rest @ ..] => self.list(rest),
            ["meta", "get", rest @ ..] => self.meta_get(rest),
            ["rm", rest @ ..] => self.remove(rest),
            _ => ProcessResult::failure(2, "unknown command"),
        };
        Ok(result)
    }
}

/// `sj://bucket/key` to `bucket/key`.
fn object_path(uri: &str) -> Option<String> {
    let path = uri.strip_prefix(BUCKET_SCHEME)?;
    let (bucket, _) = path.split_once('/')?;
    (!bucket.is_empty()).then(|| path.to_string())
}

fn usage(text: &str) -> ProcessResult {
    ProcessResult::failure(2, format!("usage: {text}"))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_copy_list_meta_remove() {
        let gateway = MemoryGateway::new();

        let result = gateway
            .run(
                &argv(&[
                    "uplink",
                    "cp",
                    "/nonexistent/a.tar",
                    "sj://bucket/backups/a.tar",
                    "--metadata",
                    r#"{"k":"\"v\""}"#,
                ]),
                None,
            )
            .await
            .unwrap();
        assert!(result.is_success());
        assert!(gateway.contains("bucket", "backups/a.tar"));

        let listing = gateway
            .run(&argv(&["uplink", "ls", "sj://bucket/backups/", "--o", "json"]), None)
            .await
            .unwrap();
        let line: serde_json::Value =
            serde_json::from_str(listing.stdout_text().trim()).unwrap();
        assert_eq!(line["key"], "a.tar");
        assert_eq!(line["kind"], "OBJ");

        let meta = gateway
            .run(&argv(&["uplink", "meta", "get", "sj://bucket/backups/a.tar"]), None)
            .await
            .unwrap();
        let metadata: FlattenedMetadata = serde_json::from_slice(&meta.stdout).unwrap();
        assert_eq!(metadata["k"], "\"v\"");

        let removed = gateway
            .run(&argv(&["uplink", "rm", "sj://bucket/backups/a.tar"]), None)
            .await
            .unwrap();
        assert!(removed.is_success());
        assert!(gateway.is_empty());
    }

    #[tokio::test]
    async fn test_list_reports_sub_prefixes() {
        let gateway = MemoryGateway::new();
        gateway.insert_object("bucket", "backups/old/x.tar", 1, FlattenedMetadata::new());
        gateway.insert_object("bucket", "backups/y.tar", 2, FlattenedMetadata::new());
        gateway.insert_object("other", "backups/z.tar", 3, FlattenedMetadata::new());

        let listing = gateway
            .run(&argv(&["uplink", "ls", "sj://bucket/backups/", "--o", "json"]), None)
            .await
            .unwrap();
        let lines: Vec<serde_json::Value> = listing
            .stdout_text()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "PRE");
        assert_eq!(lines[1]["key"], "y.tar");
    }

    #[tokio::test]
    async fn test_missing_objects_fail() {
        let gateway = MemoryGateway::new();
        for cmd in [
            argv(&["uplink", "meta", "get", "sj://bucket/backups/none.tar"]),
            argv(&["uplink", "rm", "sj://bucket/backups/none.tar"]),
        ] {
            let result = gateway.run(&cmd, None).await.unwrap();
            assert_eq!(result.exit_code, 1);
        }
    }

    #[tokio::test]
    async fn test_access_import() {
        let gateway = MemoryGateway::new();
        gateway.reject_grant("expired");

        let ok = gateway
            .run(&argv(&["uplink", "access", "import", "ha2", "grant"]), None)
            .await
            .unwrap();
        assert!(ok.is_success());
        assert_eq!(gateway.credential("ha2").as_deref(), Some("grant"));

        let rejected = gateway
            .run(&argv(&["uplink", "access", "import", "ha2", "expired"]), None)
            .await
            .unwrap();
        assert!(!rejected.is_success());
    }
}
