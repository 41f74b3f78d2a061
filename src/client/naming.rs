//! Object names and bucket URIs.

use chrono::{DateTime, NaiveDateTime};

use super::types::BackupRecord;
use crate::codec::CodecError;
use crate::constants::{BACKUP_PREFIX, BUCKET_SCHEME};

/// File name a backup is stored under, e.g. `Test_2025-01-01_01.23_45678000.tar`.
///
/// The name and the backup date are joined and every run of whitespace or
/// path separators is replaced by a single `_`, so the object always sits
/// directly under `backups/`.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if `date` is not an ISO 8601 timestamp.
pub fn suggested_filename(backup: &BackupRecord) -> Result<String, CodecError> {
    let date = parse_backup_date(&backup.date)?;
    let raw = format!("{} {}.tar", backup.name, date.format("%Y-%m-%d %H.%M %S%6f"));
    Ok(raw
        .split(|c: char| c.is_whitespace() || c == '/' || c == '\\')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_"))
}

/// Wall-clock time of a backup date. An offset is optional; when present the
/// time is kept as written rather than converted.
fn parse_backup_date(date: &str) -> Result<NaiveDateTime, CodecError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Ok(parsed.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(date, format).ok())
        .ok_or_else(|| CodecError::Encode(format!("invalid backup date '{date}'")))
}

/// `sj://<bucket>/backups/`
pub fn backup_prefix_uri(bucket: &str) -> String {
    format!("{BUCKET_SCHEME}{bucket}/{BACKUP_PREFIX}")
}

/// `sj://<bucket>/backups/<name>`
pub fn backup_object_uri(bucket: &str, name: &str) -> String {
    format!("{}{name}", backup_prefix_uri(bucket))
}
