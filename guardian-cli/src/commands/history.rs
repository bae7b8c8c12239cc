//! `backup-guardian history`: read back recorded sync runs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use guardian_core::{RunStatus, SyncRun, SyncRunId, SyncRunsSelector};
use guardian_store::file_store::{list_at, load_at};

use crate::GlobalArgs;

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// List runs, newest first.
    List(ListArgs),
    /// Show a single run.
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only runs of this job.
    #[arg(long)]
    pub job: Option<String>,

    /// Page size (0 uses the default of 50).
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Runs to skip before the page starts.
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Run identifier as printed by `history list`.
    pub id: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(command: HistoryCommand, global: &GlobalArgs) -> Result<()> {
    match command {
        HistoryCommand::List(args) => list(args, global),
        HistoryCommand::Show(args) => show(args, global),
    }
}

fn list(args: ListArgs, global: &GlobalArgs) -> Result<()> {
    let selector = SyncRunsSelector {
        job_name: args.job.unwrap_or_default(),
        limit: args.limit,
        offset: args.offset,
    };
    let runs = list_at(&global.data_dir, &selector).with_context(|| {
        format!(
            "failed to read run history under {}",
            global.data_dir.display()
        )
    })?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&runs).context("failed to serialize runs")?
        );
        return Ok(());
    }

    if runs.is_empty() {
        println!("No sync runs recorded.");
        return Ok(());
    }

    let rows: Vec<RunRow> = runs.iter().map(RunRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn show(args: ShowArgs, global: &GlobalArgs) -> Result<()> {
    let id = SyncRunId::from(args.id.as_str());
    let run = load_at(&global.data_dir, &id)
        .with_context(|| format!("failed to load sync run {id}"))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&run).context("failed to serialize run")?
        );
        return Ok(());
    }

    println!("{:<12}{}", "id", run.id);
    println!("{:<12}{}", "job", run.job_name);
    println!("{:<12}{}", "status", colored_status(run.status));
    println!("{:<12}{}", "started", format_time(run.started_at));
    println!(
        "{:<12}{}",
        "finished",
        run.finished_at.map(format_time).unwrap_or_else(|| "-".to_string())
    );
    println!("{:<12}{}", "duration", format_elapsed(&run));
    println!("{:<12}{}", "files", run.files_transferred);
    println!("{:<12}{}", "bytes", format_bytes(run.bytes_transferred));
    if !run.error_message.is_empty() {
        println!("{:<12}{}", "error", run.error_message.red());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "job")]
    job: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "started")]
    started: String,
    #[tabled(rename = "duration")]
    duration: String,
    #[tabled(rename = "files")]
    files: u64,
    #[tabled(rename = "bytes")]
    bytes: String,
    #[tabled(rename = "error")]
    error: String,
}

impl From<&SyncRun> for RunRow {
    fn from(run: &SyncRun) -> Self {
        Self {
            id: run.id.to_string(),
            job: run.job_name.clone(),
            status: colored_status(run.status),
            started: format_time(run.started_at),
            duration: format_elapsed(run),
            files: run.files_transferred,
            bytes: format_bytes(run.bytes_transferred),
            error: truncate(&run.error_message, 48),
        }
    }
}

fn colored_status(status: RunStatus) -> String {
    match status {
        RunStatus::Success => status.as_str().green().to_string(),
        RunStatus::Failed => status.as_str().red().bold().to_string(),
        RunStatus::Running => status.as_str().yellow().to_string(),
        RunStatus::Pending => status.as_str().bright_black().to_string(),
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_elapsed(run: &SyncRun) -> String {
    let Some(elapsed) = run.elapsed() else {
        return "-".to_string();
    };
    let secs = elapsed.num_seconds().max(0);
    match secs {
        0 => format!("{}ms", elapsed.num_milliseconds().max(0)),
        1..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m{:02}s", secs / 60, secs % 60),
        _ => format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60),
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let cut: String = first_line.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use guardian_core::SyncJob;

    use super::*;

    #[test]
    fn bytes_are_human_readable() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn elapsed_formats_by_magnitude() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut run = SyncRun::start(&SyncJob::new("job", "a", "b"), start);
        assert_eq!(format_elapsed(&run), "-");

        run.finished_at = Some(start + chrono::Duration::seconds(75));
        assert_eq!(format_elapsed(&run), "1m15s");

        run.finished_at = Some(start + chrono::Duration::minutes(125));
        assert_eq!(format_elapsed(&run), "2h05m");
    }

    #[test]
    fn long_errors_are_cut_to_one_line() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("first\nsecond", 10), "first");
        assert_eq!(truncate("abcdefghijkl", 5), "abcd…");
    }
}
