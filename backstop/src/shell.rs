//! Line-oriented front-end for `backstop chat`.
//!
//! Parsing and rendering are pure so the terminal loop in `main.rs` stays a thin
//! read/print wrapper around [`Orchestrator::handle`](crate::session::Orchestrator::handle).

use std::fmt::Write as _;

use crate::core::types::{BackupReport, RootOutcome};
use crate::session::{ApplySignal, BackupSignal, SessionEvent, SessionSignal, SubmitSignal};

pub const HELP: &str = "\
Type a prompt to send it to the model (the workspace is backed up first).
  :apply     back up again and accept the pending proposal
  :backup    back up the workspace now
  :backups   list backup folders
  :logs      show the session log
  :history   show the conversation
  :help      show this help
  :quit      leave";

/// What one input line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Event(SessionEvent),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_line(line: &str) -> ShellCommand {
    let line = line.trim();
    if line.is_empty() {
        return ShellCommand::Empty;
    }
    let Some(command) = line.strip_prefix(':') else {
        return ShellCommand::Event(SessionEvent::SubmitPrompt {
            text: line.to_string(),
        });
    };
    match command.trim() {
        "apply" => ShellCommand::Event(SessionEvent::RequestApply),
        "backup" => ShellCommand::Event(SessionEvent::ManualBackup),
        "backups" => ShellCommand::Event(SessionEvent::ShowBackups),
        "logs" => ShellCommand::Event(SessionEvent::ShowLogs),
        "history" => ShellCommand::Event(SessionEvent::ShowConversation),
        "help" | "h" | "?" => ShellCommand::Help,
        "quit" | "q" | "exit" => ShellCommand::Quit,
        other => ShellCommand::Unknown(other.to_string()),
    }
}

/// Text shown to the user for a signal.
pub fn render(signal: &SessionSignal) -> String {
    match signal {
        SessionSignal::Submit(signal) => render_submit(signal),
        SessionSignal::Apply(signal) => render_apply(signal),
        SessionSignal::Backup(signal) => render_backup(signal),
        SessionSignal::Logs(entries) => {
            if entries.is_empty() {
                return "No log entries.".to_string();
            }
            join_lines(entries.iter().map(ToString::to_string))
        }
        SessionSignal::Backups(Ok(names)) => {
            if names.is_empty() {
                return "No backups yet.".to_string();
            }
            join_lines(names.iter().cloned())
        }
        SessionSignal::Backups(Err(error)) => format!("Could not list backups: {error}"),
        SessionSignal::Conversation(turns) => {
            if turns.is_empty() {
                return "No conversation yet.".to_string();
            }
            let mut out = String::new();
            for turn in turns {
                let _ = writeln!(out, "[{}] you: {}", turn.timestamp, turn.prompt);
                let _ = writeln!(out, "[{}] model: {}", turn.timestamp, turn.response);
            }
            out.trim_end().to_string()
        }
    }
}

pub fn render_submit(signal: &SubmitSignal) -> String {
    match signal {
        SubmitSignal::Busy => "Busy: wait for the current action to finish.".to_string(),
        SubmitSignal::NoCredential => {
            "No API key found. Run `backstop login` or set the configured env var.".to_string()
        }
        SubmitSignal::NoWorkspace => "No workspace folder open to back up.".to_string(),
        SubmitSignal::Failed { error } => format!("Prompt not sent: {error}"),
        SubmitSignal::ProposalReady { response } => {
            format!("{response}\n\n(:apply to accept, or type a new prompt)")
        }
    }
}

pub fn render_apply(signal: &ApplySignal) -> String {
    match signal {
        ApplySignal::Applied { backups } if backups.is_empty() => {
            "Changes applied (no backup taken).".to_string()
        }
        ApplySignal::Applied { backups } => {
            let folders: Vec<String> = backups
                .iter()
                .map(|record| record.path.display().to_string())
                .collect();
            format!("Changes applied. Backup: {}", folders.join(", "))
        }
        ApplySignal::NotReady => "Nothing to apply.".to_string(),
        ApplySignal::Failed { error } => format!("Apply aborted, backup failed: {error}"),
    }
}

pub fn render_backup(signal: &BackupSignal) -> String {
    match signal {
        BackupSignal::Done(report) => render_report(report),
        BackupSignal::NoWorkspace => "No workspace folder open to back up.".to_string(),
        BackupSignal::Busy => "Busy: wait for the current action to finish.".to_string(),
        BackupSignal::Failed { error } => format!("Backup failed: {error}"),
    }
}

fn render_report(report: &BackupReport) -> String {
    if report.outcomes.is_empty() {
        return "Nothing backed up.".to_string();
    }
    join_lines(report.outcomes.iter().map(|outcome| match outcome {
        RootOutcome::Copied(record) => format!(
            "Backed up {} to {}",
            record.root_name,
            record.path.display()
        ),
        RootOutcome::Skipped { name, source } => {
            format!("Skipped {name}: {} does not exist", source.display())
        }
        RootOutcome::Failed { name, error, .. } => format!("Failed {name}: {error}"),
    }))
}

fn join_lines(lines: impl Iterator<Item = String>) -> String {
    lines.collect::<Vec<_>>().join("\n")
}
