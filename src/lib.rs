//! Backup agent keeping snapshots in a Storj bucket.
//!
//! Storage goes through the `uplink` command-line gateway, one subprocess per
//! operation. Each backup is a single object under `backups/` whose
//! description travels with it as flattened object metadata, so listing the
//! bucket is enough to rebuild every backup record.
//!
//! # Layers
//!
//! - [`gateway`] runs gateway commands ([`gateway::ProcessRunner`] for real
//!   subprocesses, [`gateway::MemoryGateway`] and [`gateway::ScriptedRunner`]
//!   for tests and local use)
//! - [`codec`] flattens nested metadata into string pairs and back
//! - [`client`] implements upload, list, get and delete on top of both
//! - [`agent`] exposes the client to a backup host with host-level errors
//! - [`setup`] turns a [`config::Config`] into an authenticated agent
//!
//! # Example
//!
//! ```no_run
//! use storj_backup::agent::BackupAgent;
//! use storj_backup::config::Config;
//! use storj_backup::setup::{process_runner, setup_entry};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load_from("storj.toml")?;
//! let agent = setup_entry(&config, process_runner(&config.gateway)).await?;
//! for backup in agent.list_backups().await? {
//!     println!("{} {}", backup.backup_id, backup.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod client;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod setup;
pub mod ui;

pub use error::{Error, Result};
