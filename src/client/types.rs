//! Types exchanged with the storage client.

use std::collections::BTreeMap;

use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::OBJECT_KIND;

/// Add-on captured in a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonInfo {
    pub name: String,
    pub slug: String,
    pub version: String,
}

/// Description of one backup snapshot.
///
/// Records are uploaded as object metadata and rebuilt from it on every
/// listing; a rebuilt record compares equal to the uploaded one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    #[serde(default)]
    pub addons: Vec<AddonInfo>,
    /// Unique within a bucket.
    pub backup_id: String,
    /// ISO 8601 creation time, with or without an offset.
    pub date: String,
    #[serde(default)]
    pub database_included: bool,
    /// Host-defined values, carried verbatim.
    #[serde(default)]
    pub extra_metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub folders: Vec<String>,
    #[serde(default)]
    pub homeassistant_included: bool,
    #[serde(default)]
    pub homeassistant_version: Option<String>,
    pub name: String,
    /// Whether the archive is password protected.
    #[serde(default)]
    pub protected: bool,
    /// Archive size in bytes.
    pub size: u64,
}

impl BackupRecord {
    /// Creates a record with the required fields and empty contents.
    pub fn new(
        backup_id: impl Into<String>,
        name: impl Into<String>,
        date: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            addons: Vec::new(),
            backup_id: backup_id.into(),
            date: date.into(),
            database_included: false,
            extra_metadata: BTreeMap::new(),
            folders: Vec::new(),
            homeassistant_included: false,
            homeassistant_version: None,
            name: name.into(),
            protected: false,
            size,
        }
    }
}

/// One line of `ls --o json` output.
///
/// `created` and `size` are informational; the authoritative size is the one
/// stored in the backup's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteObjectDescriptor {
    pub kind: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Path relative to the listed prefix.
    pub key: String,
}

impl RemoteObjectDescriptor {
    /// Whether the entry is an object rather than a sub-prefix.
    pub fn is_object(&self) -> bool {
        self.kind == OBJECT_KIND
    }
}

/// Structure attached to every uploaded object.
///
/// `metadata_version` is the marker telling our objects apart from anything
/// else living in the bucket.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MetadataEnvelope<B> {
    pub metadata_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub backup: B,
}

/// Byte stream of a downloaded backup.
pub type BackupStream = BoxStream<'static, std::io::Result<Bytes>>;
