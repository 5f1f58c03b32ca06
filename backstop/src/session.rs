//! Session orchestration: prompt → backup → remote call → proposal → apply.
//!
//! One [`Orchestrator`] owns the session state, the session log, the
//! conversation history, and the pending proposal. Its operations take
//! `&self`; state lives behind a mutex that is never held across an `.await`,
//! so a second call issued while the first is suspended observes the in-flight
//! state and is rejected instead of interleaving.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::conversation::ConversationStore;
use crate::core::log::LogRecorder;
use crate::core::state::{Trigger, next_state};
use crate::core::timestamp::localized_now;
use crate::core::types::{
    BackupRecord, BackupReport, ConversationTurn, LogEntry, RootOutcome, SessionState,
    WorkspaceRoot,
};
use crate::io::backup::{FsTreeCopier, TreeCopier, list_backups, snapshot};
use crate::io::credentials::{Credential, CredentialSource};
use crate::io::remote::Completion;
use crate::io::workspace::WorkspaceRoots;

/// Prefix of the response text recorded when the remote call fails.
pub const REMOTE_ERROR_PLACEHOLDER: &str = "Error calling the remote model";

/// Events the front-end can send to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SubmitPrompt { text: String },
    RequestApply,
    ManualBackup,
    ShowLogs,
    ShowBackups,
    ShowConversation,
}

/// Outcome of a prompt submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitSignal {
    /// Another action is in flight; nothing was done.
    Busy,
    /// No API key is available; nothing was backed up.
    NoCredential,
    /// No workspace folder is open; nothing was backed up.
    NoWorkspace,
    /// The submit could not proceed (backup root unusable, credential store unreadable).
    Failed { error: String },
    /// A response (possibly the error placeholder) is ready for display.
    ProposalReady { response: String },
}

/// Outcome of an apply request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplySignal {
    /// Pre-apply backup done; the front-end may apply the proposal.
    Applied { backups: Vec<BackupRecord> },
    /// There is no proposal to apply.
    NotReady,
    /// The pre-apply backup could not run; the proposal is still pending.
    Failed { error: String },
}

/// Outcome of a manual backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupSignal {
    Done(BackupReport),
    NoWorkspace,
    Busy,
    Failed { error: String },
}

/// Reply to a [`SessionEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    Submit(SubmitSignal),
    Apply(ApplySignal),
    Backup(BackupSignal),
    Logs(Vec<LogEntry>),
    Backups(Result<Vec<String>, String>),
    Conversation(Vec<ConversationTurn>),
}

#[derive(Debug)]
struct Session {
    state: SessionState,
    log: LogRecorder,
    conversation: ConversationStore,
    proposal: Option<String>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            log: LogRecorder::new(),
            conversation: ConversationStore::new(),
            proposal: None,
        }
    }

    /// Apply `trigger` and record exactly one log entry for the transition.
    fn transition(&mut self, trigger: Trigger, detail: &str) {
        let from = self.state;
        match next_state(from, trigger) {
            Ok(to) => {
                debug!(from = %from, to = %to, trigger = trigger.as_str(), "session transition");
                self.state = to;
                if detail.is_empty() {
                    self.log.append(format!("{from} -> {to}"));
                } else {
                    self.log.append(format!("{from} -> {to}: {detail}"));
                }
            }
            Err(err) => {
                // Only reachable through a logic error in the orchestrator itself.
                warn!(error = %err, "ignored invalid session transition");
                self.log.append(format!("ignored invalid transition: {err}"));
            }
        }
    }

    fn record_backup(&mut self, report: &BackupReport) {
        for outcome in &report.outcomes {
            match outcome {
                RootOutcome::Copied(record) => self.log.append(format!(
                    "backup of {} created at {}",
                    record.root_name,
                    record.path.display()
                )),
                RootOutcome::Skipped { name, source } => self.log.append(format!(
                    "backup of {name} skipped: {} does not exist",
                    source.display()
                )),
                RootOutcome::Failed { name, error, .. } => {
                    self.log.append(format!("backup of {name} failed: {error}"));
                }
            }
        }
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    // The guarded data stays consistent even if a holder panicked.
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns the session to a resting state if an operation future is dropped
/// while still in flight.
struct InFlight<'a> {
    session: &'a Mutex<Session>,
    resume: SessionState,
}

impl<'a> InFlight<'a> {
    fn new(session: &'a Mutex<Session>, resume: SessionState) -> Self {
        Self { session, resume }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut session = lock(self.session);
        let from = session.state;
        if from.is_in_flight() {
            warn!(from = %from, to = %self.resume, "operation dropped while in flight");
            session.state = self.resume;
            session
                .log
                .append(format!("{from} -> {}: interrupted", self.resume));
        }
    }
}

/// Drives one session at a time over injected capabilities.
pub struct Orchestrator<C, R, W> {
    credentials: C,
    remote: R,
    workspace: W,
    copier: Arc<dyn TreeCopier>,
    backup_root: PathBuf,
    session: Mutex<Session>,
}

impl<C, R, W> Orchestrator<C, R, W>
where
    C: CredentialSource,
    R: Completion,
    W: WorkspaceRoots,
{
    pub fn new(credentials: C, remote: R, workspace: W, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            credentials,
            remote,
            workspace,
            copier: Arc::new(FsTreeCopier),
            backup_root: backup_root.into(),
            session: Mutex::new(Session::new()),
        }
    }

    /// Replace the filesystem copier (e.g. with an instrumented one in tests).
    pub fn with_copier(mut self, copier: Arc<dyn TreeCopier>) -> Self {
        self.copier = copier;
        self
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    pub fn state(&self) -> SessionState {
        self.session().state
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.session().log.all()
    }

    pub fn conversation(&self) -> Vec<ConversationTurn> {
        self.session().conversation.all()
    }

    /// Response awaiting an apply decision, if any.
    pub fn proposal(&self) -> Option<String> {
        self.session().proposal.clone()
    }

    /// Backup folder names under the backup root.
    pub fn backup_listing(&self) -> Result<Vec<String>> {
        list_backups(&self.backup_root)
    }

    /// Dispatch a front-end event.
    pub async fn handle(&self, event: SessionEvent) -> SessionSignal {
        match event {
            SessionEvent::SubmitPrompt { text } => {
                SessionSignal::Submit(self.submit_prompt(&text).await)
            }
            SessionEvent::RequestApply => SessionSignal::Apply(self.request_apply().await),
            SessionEvent::ManualBackup => SessionSignal::Backup(self.manual_backup().await),
            SessionEvent::ShowLogs => SessionSignal::Logs(self.logs()),
            SessionEvent::ShowBackups => {
                SessionSignal::Backups(self.backup_listing().map_err(|err| format!("{err:#}")))
            }
            SessionEvent::ShowConversation => SessionSignal::Conversation(self.conversation()),
        }
    }

    /// Back up the workspace, ask the remote model, and record the reply.
    #[instrument(skip_all, fields(prompt_bytes = text.len()))]
    pub async fn submit_prompt(&self, text: &str) -> SubmitSignal {
        {
            let mut session = self.session();
            if session.state.is_in_flight() {
                let state = session.state;
                session.log.append(format!("prompt rejected: session busy ({state})"));
                info!(state = %state, "prompt rejected while busy");
                return SubmitSignal::Busy;
            }
            let superseded = session.proposal.take().is_some();
            let detail = if superseded {
                "prompt submitted, pending proposal discarded"
            } else {
                "prompt submitted"
            };
            session.transition(Trigger::PromptSubmitted, detail);
        }
        let _in_flight = InFlight::new(&self.session, SessionState::Idle);

        let credential = match self.credentials.credential().await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                self.session()
                    .transition(Trigger::SubmitHalted, "no credential available");
                return SubmitSignal::NoCredential;
            }
            Err(err) => {
                let error = format!("{err:#}");
                self.session().transition(
                    Trigger::SubmitHalted,
                    &format!("credential lookup failed: {error}"),
                );
                return SubmitSignal::Failed { error };
            }
        };

        let roots = self.workspace.roots();
        if roots.is_empty() {
            self.session()
                .transition(Trigger::SubmitHalted, "no workspace folder open to back up");
            return SubmitSignal::NoWorkspace;
        }

        self.session().transition(
            Trigger::CredentialPresent,
            &format!("backing up {}", root_names(&roots)),
        );
        let report = match snapshot(&roots, &self.backup_root, Arc::clone(&self.copier)).await {
            Ok(report) => report,
            Err(err) => {
                let error = format!("{err:#}");
                self.session()
                    .transition(Trigger::BackupAborted, &format!("backup failed: {error}"));
                return SubmitSignal::Failed { error };
            }
        };
        {
            let mut session = self.session();
            session.record_backup(&report);
            let detail = if report.is_partial() {
                format!(
                    "calling remote model after partial backup ({} failed)",
                    report.failure_count()
                )
            } else {
                "calling remote model".to_string()
            };
            session.transition(Trigger::BackupFinished, &detail);
        }

        let (response, detail) = self.call_remote(&credential, text).await;

        let mut session = self.session();
        session.conversation.append(ConversationTurn {
            prompt: text.to_string(),
            response: response.clone(),
            timestamp: localized_now(),
        });
        session.proposal = Some(response.clone());
        session.transition(Trigger::RemoteFinished, &detail);
        SubmitSignal::ProposalReady { response }
    }

    async fn call_remote(&self, credential: &Credential, text: &str) -> (String, String) {
        match self.remote.complete(credential, text).await {
            Ok(response) => (response, "proposal ready".to_string()),
            Err(err) => {
                let error = format!("{err:#}");
                warn!(error = %error, "remote call failed");
                (
                    format!("{REMOTE_ERROR_PLACEHOLDER}: {error}"),
                    format!("remote call failed: {error}"),
                )
            }
        }
    }

    /// Back up the workspace again and signal that the proposal may be applied.
    #[instrument(skip_all)]
    pub async fn request_apply(&self) -> ApplySignal {
        {
            let mut session = self.session();
            if session.state != SessionState::ProposalReady {
                let state = session.state;
                session.log.append(format!("apply rejected: no proposal ({state})"));
                return ApplySignal::NotReady;
            }
            session.transition(Trigger::ApplyRequested, "backing up before apply");
        }
        let _in_flight = InFlight::new(&self.session, SessionState::ProposalReady);

        let roots = self.workspace.roots();
        let backups = if roots.is_empty() {
            self.session()
                .log
                .append("no workspace folder open; applying without backup");
            Vec::new()
        } else {
            match snapshot(&roots, &self.backup_root, Arc::clone(&self.copier)).await {
                Ok(report) => {
                    self.session().record_backup(&report);
                    report.records()
                }
                Err(err) => {
                    let error = format!("{err:#}");
                    self.session().transition(
                        Trigger::ApplyAborted,
                        &format!("backup before apply failed: {error}"),
                    );
                    return ApplySignal::Failed { error };
                }
            }
        };

        let mut session = self.session();
        session.proposal = None;
        session.transition(Trigger::ApplyFinished, "changes applied");
        ApplySignal::Applied { backups }
    }

    /// Snapshot the workspace on demand.
    #[instrument(skip_all)]
    pub async fn manual_backup(&self) -> BackupSignal {
        let resume = {
            let mut session = self.session();
            let resume = session.state;
            if resume.is_in_flight() {
                session
                    .log
                    .append(format!("manual backup rejected: session busy ({resume})"));
                return BackupSignal::Busy;
            }
            resume
        };

        let roots = self.workspace.roots();
        if roots.is_empty() {
            self.session()
                .log
                .append("manual backup skipped: no workspace folder open");
            return BackupSignal::NoWorkspace;
        }

        self.session().transition(
            Trigger::ManualBackupStarted,
            &format!("manual backup of {}", root_names(&roots)),
        );
        let _in_flight = InFlight::new(&self.session, resume);
        let result = snapshot(&roots, &self.backup_root, Arc::clone(&self.copier)).await;

        let mut session = self.session();
        match result {
            Ok(report) => {
                session.record_backup(&report);
                session.transition(Trigger::ManualBackupFinished { resume }, "manual backup done");
                BackupSignal::Done(report)
            }
            Err(err) => {
                let error = format!("{err:#}");
                session.transition(
                    Trigger::ManualBackupFinished { resume },
                    &format!("manual backup failed: {error}"),
                );
                BackupSignal::Failed { error }
            }
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }
}

fn root_names(roots: &[WorkspaceRoot]) -> String {
    roots
        .iter()
        .map(|root| root.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
