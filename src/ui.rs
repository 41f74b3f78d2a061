//! Terminal output for the `storj-backup` binary.

use std::fmt::Write as _;

use crate::agent::BackupInfo;
use crate::client::BackupRecord;

/// Width of error box separators.
const ERROR_BOX_WIDTH: usize = 60;

/// Print an error box with a title and optional detail.
///
/// ```text
/// ============================================================
/// Listing failed
/// ============================================================
///
/// <detail>
/// ```
pub fn print_error_box(title: &str, detail: Option<&str>) {
    eprintln!("\n{}", "=".repeat(ERROR_BOX_WIDTH));
    eprintln!("{title}");
    eprintln!("{}", "=".repeat(ERROR_BOX_WIDTH));

    if let Some(detail) = detail
        && !detail.is_empty()
    {
        eprintln!("\n{detail}");
    }
}

/// Format a byte count in human-readable form.
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

/// One line per backup: id, date, size and name.
pub fn render_backups(backups: &[BackupRecord]) -> String {
    if backups.is_empty() {
        return "No backups found\n".to_string();
    }

    let width = backups
        .iter()
        .map(|b| b.backup_id.len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for backup in backups {
        let _ = writeln!(
            out,
            "{:<width$}  {}  {:>10}  {}{}",
            backup.backup_id,
            backup.date,
            format_bytes(backup.size),
            backup.name,
            if backup.protected { " (protected)" } else { "" },
        );
    }
    out
}

/// Backups of an overview followed by one line per failed agent.
pub fn render_backup_info(info: &BackupInfo) -> String {
    let backups: Vec<BackupRecord> = info.backups.iter().map(|m| m.backup.clone()).collect();
    let mut out = render_backups(&backups);
    for (agent_id, message) in &info.agent_errors {
        let _ = writeln!(out, "error from {agent_id}: {message}");
    }
    out
}
