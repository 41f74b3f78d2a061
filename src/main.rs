//! storj-backup: manage backups stored in a Storj bucket.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use storj_backup::agent::{BackupAgent, collect_backup_info};
use storj_backup::client::BackupRecord;
use storj_backup::config::Config;
use storj_backup::setup::{process_runner, setup_entry};
use storj_backup::ui;

#[derive(Parser, Debug)]
#[command(name = "storj-backup")]
#[command(about = "Store and list backups in a Storj bucket through uplink")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "storj.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import the access grant and check that it is accepted
    Auth,
    /// List stored backups
    List,
    /// Show one backup
    Get { backup_id: String },
    /// Upload the archive described by a JSON backup record
    Upload { record: PathBuf },
    /// Delete one backup
    Delete { backup_id: String },
    /// Download one backup
    Download { backup_id: String },
}

fn init_logging(json: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("storj_backup=info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    if let Err(e) = run(cli).await {
        ui::print_error_box("storj-backup failed", Some(&format!("{e:#}")));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from(&cli.config)?;
    let validation = config.validate()?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let agent = setup_entry(&config, process_runner(&config.gateway))
        .await
        .context("Failed to set up storage entry")?;

    match cli.command {
        Commands::Auth => {
            println!(
                "Authenticated {} for bucket {}",
                agent.name(),
                config.bucket_name
            );
        },
        Commands::List => {
            let agents: Vec<Arc<dyn BackupAgent>> = vec![Arc::new(agent)];
            let info = collect_backup_info(&agents).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print!("{}", ui::render_backup_info(&info));
            }
            if !info.agent_errors.is_empty() {
                anyhow::bail!("{} agent(s) failed to list backups", info.agent_errors.len());
            }
        },
        Commands::Get { backup_id } => {
            let backup = agent
                .get_backup(&backup_id)
                .await?
                .with_context(|| format!("Backup not found: {backup_id}"))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&backup)?);
            } else {
                print!("{}", ui::render_backups(std::slice::from_ref(&backup)));
            }
        },
        Commands::Upload { record } => {
            let content = std::fs::read_to_string(&record)
                .with_context(|| format!("Failed to read backup record: {}", record.display()))?;
            let backup: BackupRecord = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse backup record: {}", record.display()))?;
            agent.upload_backup(&backup).await?;
            println!("Uploaded {} to {}", backup.backup_id, config.bucket_name);
        },
        Commands::Delete { backup_id } => {
            agent.delete_backup(&backup_id).await?;
            println!("Deleted {backup_id}");
        },
        Commands::Download { backup_id } => {
            let mut stream = agent.download_backup(&backup_id).await?;
            let mut stdout = tokio::io::stdout();
            while let Some(chunk) = stream.next().await {
                stdout.write_all(&chunk?).await?;
            }
            stdout.flush().await?;
        },
    }

    Ok(())
}
