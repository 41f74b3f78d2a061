//! Fixed names shared by the client, the adapter and the CLI.

/// Integration domain, prefix of every agent id.
pub const DOMAIN: &str = "storj";

/// Default display name of a configured entry.
pub const DEFAULT_TITLE: &str = "Storj";

/// Executable of the storage gateway.
pub const DEFAULT_GATEWAY_PROGRAM: &str = "uplink";

/// Alias under which the access grant is imported into the gateway.
pub const CREDENTIAL_ALIAS: &str = "ha2";

/// URI scheme understood by the gateway.
pub const BUCKET_SCHEME: &str = "sj://";

/// Object prefix under which backups live inside the bucket.
pub const BACKUP_PREFIX: &str = "backups/";

/// Value of the `metadata_version` marker written on upload.
pub const METADATA_VERSION: u64 = 1;

/// Name of the marker field in the metadata envelope.
pub const MARKER_FIELD: &str = "metadata_version";

/// `kind` reported by `ls` for stored objects.
pub const OBJECT_KIND: &str = "OBJ";

/// Gateway stderr text for an object that does not exist.
pub const OBJECT_NOT_FOUND: &str = "object not found";

/// Default subprocess timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Default local directory holding backup archives.
pub const DEFAULT_BACKUP_DIR: &str = "backups";

/// Maximum stderr bytes carried in an operation error.
pub const STDERR_EXCERPT_LEN: usize = 512;
