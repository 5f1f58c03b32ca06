//! Session transition table.
//!
//! Pure: given the current state and a trigger, decide the next state or
//! reject the trigger. The orchestrator applies the result and logs it.

use std::fmt;

use crate::core::types::SessionState;

/// Events that move the session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// User submitted a prompt.
    PromptSubmitted,
    /// Credential resolved and at least one workspace root exists.
    CredentialPresent,
    /// Submit stopped before any backup (no credential, no workspace, credential error).
    SubmitHalted,
    /// Pre-call snapshot finished, possibly with per-root failures.
    BackupFinished,
    /// Pre-call snapshot could not run at all.
    BackupAborted,
    /// Remote call returned a reply or an error.
    RemoteFinished,
    ApplyRequested,
    /// Pre-apply snapshot finished and the apply signal was sent.
    ApplyFinished,
    /// Pre-apply snapshot could not run; the proposal stays available.
    ApplyAborted,
    ManualBackupStarted,
    /// Manual snapshot finished; return to the resting state it started from.
    ManualBackupFinished { resume: SessionState },
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::PromptSubmitted => "prompt submitted",
            Trigger::CredentialPresent => "credential present",
            Trigger::SubmitHalted => "submit halted",
            Trigger::BackupFinished => "backup finished",
            Trigger::BackupAborted => "backup aborted",
            Trigger::RemoteFinished => "remote call finished",
            Trigger::ApplyRequested => "apply requested",
            Trigger::ApplyFinished => "apply finished",
            Trigger::ApplyAborted => "apply aborted",
            Trigger::ManualBackupStarted => "manual backup started",
            Trigger::ManualBackupFinished { .. } => "manual backup finished",
        }
    }
}

/// A trigger that is not valid in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: SessionState,
    pub trigger: Trigger,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not allowed while {}", self.trigger.as_str(), self.from)
    }
}

impl std::error::Error for TransitionError {}

pub fn next_state(from: SessionState, trigger: Trigger) -> Result<SessionState, TransitionError> {
    use SessionState::{Applying, AwaitingCredential, BackingUp, CallingRemote, Idle, ProposalReady};

    let next = match (from, trigger) {
        // A pending proposal is superseded by a new prompt.
        (Idle | ProposalReady, Trigger::PromptSubmitted) => Some(AwaitingCredential),
        (AwaitingCredential, Trigger::CredentialPresent) => Some(BackingUp),
        (AwaitingCredential, Trigger::SubmitHalted) => Some(Idle),
        (BackingUp, Trigger::BackupFinished) => Some(CallingRemote),
        (BackingUp, Trigger::BackupAborted) => Some(Idle),
        (CallingRemote, Trigger::RemoteFinished) => Some(ProposalReady),
        (ProposalReady, Trigger::ApplyRequested) => Some(Applying),
        (Applying, Trigger::ApplyFinished) => Some(Idle),
        (Applying, Trigger::ApplyAborted) => Some(ProposalReady),
        (Idle | ProposalReady, Trigger::ManualBackupStarted) => Some(BackingUp),
        (BackingUp, Trigger::ManualBackupFinished { resume }) if !resume.is_in_flight() => {
            Some(resume)
        }
        _ => None,
    };
    next.ok_or(TransitionError { from, trigger })
}
