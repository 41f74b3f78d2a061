//! Configuration of a backup entry.
//!
//! One TOML file describes one configured location:
//!
//! ```toml
//! access_grant = "1Abc..."
//! bucket_name = "ha-backups"
//! title = "Storj"
//!
//! [gateway]
//! program = "uplink"
//! timeout_secs = 3600
//! ```
//!
//! Everything except `access_grant` and `bucket_name` has a default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Root configuration of an entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Serialized access grant; also the entry's unique id.
    pub access_grant: String,
    pub bucket_name: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Recorded in the metadata of uploaded backups.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Local directory holding the archives to upload.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// How the gateway executable is invoked.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_program")]
    pub program: String,
    /// Per-command limit in seconds, `0` disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    /// Configured limit, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(constants::DEFAULT_BACKUP_DIR)
}

fn default_program() -> String {
    constants::DEFAULT_GATEWAY_PROGRAM.to_string()
}

fn default_timeout_secs() -> u64 {
    constants::DEFAULT_TIMEOUT_SECS
}

impl Config {
    /// Builds a configuration with defaults for everything optional.
    pub fn new(access_grant: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            access_grant: access_grant.into(),
            bucket_name: bucket_name.into(),
            title: None,
            instance_id: None,
            backup_dir: default_backup_dir(),
            gateway: GatewayConfig::default(),
        }
    }

    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - Required fields are missing or have invalid types
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Display name of the entry.
    pub fn title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(constants::DEFAULT_TITLE)
    }

    /// Stable identifier of the entry.
    pub fn unique_id(&self) -> &str {
        &self.access_grant
    }

    /// Validate configuration.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails with one or more errors:
    /// - Empty access grant
    /// - Bucket name outside the naming rules
    /// - Empty gateway program
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.access_grant.trim().is_empty() {
            errors.push("access_grant cannot be empty".to_string());
        }

        if let Err(reason) = check_bucket_name(&self.bucket_name) {
            errors.push(format!(
                "bucket_name '{}' is invalid: {reason}",
                self.bucket_name
            ));
        }

        if self.gateway.program.trim().is_empty() {
            errors.push("gateway.program cannot be empty".to_string());
        }

        if self.gateway.timeout_secs == 0 {
            warnings.push(
                "gateway.timeout_secs is 0, commands may hang forever\n  \
                 Recommendation: keep a limit long enough for a full upload"
                    .to_string(),
            );
        }

        if let Some(title) = &self.title
            && title.trim().is_empty()
        {
            warnings.push(format!(
                "title is blank, using '{}'",
                constants::DEFAULT_TITLE
            ));
        }

        if !self.backup_dir.exists() {
            warnings.push(format!(
                "Backup directory does not exist: {}",
                self.backup_dir.display()
            ));
        } else if !self.backup_dir.is_dir() {
            errors.push(format!(
                "backup_dir is not a directory: {}",
                self.backup_dir.display()
            ));
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }
}

/// Bucket names are 3-63 characters of lowercase letters, digits, `-` and
/// `.`, starting and ending with a letter or digit.
fn check_bucket_name(name: &str) -> std::result::Result<(), &'static str> {
    if !(3..=63).contains(&name.len()) {
        return Err("must be 3 to 63 characters long");
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err("only lowercase letters, digits, '-' and '.' are allowed");
    }
    let alnum = |b: Option<u8>| b.is_some_and(|b| b.is_ascii_alphanumeric());
    if !alnum(name.bytes().next()) || !alnum(name.bytes().last()) {
        return Err("must start and end with a letter or digit");
    }
    Ok(())
}
