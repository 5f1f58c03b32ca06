//! Backup-first session core for an AI-assisted project editor.
//!
//! Every prompt sent to the remote model, and every accepted proposal, is
//! preceded by a timestamped snapshot of the open workspace folders. The
//! crate is split the same way throughout:
//!
//! - **[`core`]**: Pure session pieces (states, transition table, log, history).
//!   No I/O beyond reading the clock.
//! - **[`io`]**: Side-effecting adapters (filesystem copies, HTTP, config,
//!   credentials). Each sits behind a trait so tests can swap it out.
//!
//! [`session`] drives the state machine over those adapters and [`shell`] turns
//! terminal lines into session events for the `backstop` binary.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
pub mod shell;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
