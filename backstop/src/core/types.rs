//! Shared types for the session core.
//!
//! These types define the contracts between the orchestrator, the backup
//! engine, and whatever front-end drives them. Values are immutable once
//! created; collections of them are handed out as cloned snapshots.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the current session stands.
///
/// Exactly one state is active per orchestrator. States are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the user to submit a prompt.
    Idle,
    /// Prompt accepted, resolving the API credential.
    AwaitingCredential,
    /// Snapshotting workspace roots.
    BackingUp,
    /// Waiting for the remote model.
    CallingRemote,
    /// A response is available and may be applied.
    ProposalReady,
    /// Running the pre-apply backup.
    Applying,
}

impl SessionState {
    /// True while work is in flight and new user actions must be rejected.
    pub fn is_in_flight(self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::ProposalReady)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingCredential => "awaiting_credential",
            SessionState::BackingUp => "backing_up",
            SessionState::CallingRemote => "calling_remote",
            SessionState::ProposalReady => "proposal_ready",
            SessionState::Applying => "applying",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the in-memory session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp assigned when the entry was recorded.
    pub timestamp: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.message)
    }
}

/// One recorded prompt/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub prompt: String,
    /// Model reply, or the error placeholder when the remote call failed.
    pub response: String,
    /// Local wall-clock time, formatted for display.
    pub timestamp: String,
}

/// A workspace folder that must be backed up before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    /// Folder base name, used as the backup folder prefix.
    pub name: String,
    /// Absolute path of the folder.
    pub path: PathBuf,
}

/// A completed snapshot of one workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub root_name: String,
    pub source: PathBuf,
    /// `<backup root>/<root_name>_<timestamp>`.
    pub path: PathBuf,
    /// Filesystem-safe timestamp embedded in the folder name.
    pub timestamp: String,
}

impl BackupRecord {
    pub fn folder_name(&self) -> String {
        format!("{}_{}", self.root_name, self.timestamp)
    }
}

/// Per-root result of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootOutcome {
    Copied(BackupRecord),
    /// The source folder does not exist; nothing was written.
    Skipped { name: String, source: PathBuf },
    /// The copy started but did not finish.
    Failed {
        name: String,
        source: PathBuf,
        error: String,
    },
}

/// Outcomes of one snapshot, in the order the roots were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    pub outcomes: Vec<RootOutcome>,
}

impl BackupReport {
    pub fn records(&self) -> Vec<BackupRecord> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                RootOutcome::Copied(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, RootOutcome::Failed { .. }))
            .count()
    }

    pub fn is_partial(&self) -> bool {
        self.failure_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_states_exclude_resting_states() {
        assert!(!SessionState::Idle.is_in_flight());
        assert!(!SessionState::ProposalReady.is_in_flight());
        assert!(SessionState::AwaitingCredential.is_in_flight());
        assert!(SessionState::BackingUp.is_in_flight());
        assert!(SessionState::CallingRemote.is_in_flight());
        assert!(SessionState::Applying.is_in_flight());
    }

    #[test]
    fn log_entry_displays_with_bracketed_timestamp() {
        let entry = LogEntry {
            timestamp: "2026-01-18T12:00:00.000Z".to_string(),
            message: "hello".to_string(),
        };
        assert_eq!(entry.to_string(), "[2026-01-18T12:00:00.000Z] hello");
    }

    #[test]
    fn report_separates_records_from_failures() {
        let record = BackupRecord {
            root_name: "proj".to_string(),
            source: PathBuf::from("/src/proj"),
            path: PathBuf::from("/bk/proj_ts"),
            timestamp: "ts".to_string(),
        };
        let report = BackupReport {
            outcomes: vec![
                RootOutcome::Copied(record.clone()),
                RootOutcome::Skipped {
                    name: "gone".to_string(),
                    source: PathBuf::from("/src/gone"),
                },
                RootOutcome::Failed {
                    name: "locked".to_string(),
                    source: PathBuf::from("/src/locked"),
                    error: "permission denied".to_string(),
                },
            ],
        };

        assert_eq!(report.records(), vec![record]);
        assert_eq!(report.failure_count(), 1);
        assert!(report.is_partial());
        assert_eq!(report.records()[0].folder_name(), "proj_ts");
    }
}
