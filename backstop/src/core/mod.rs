//! Deterministic, in-memory logic shared by the session orchestrator.
//!
//! Core modules do no filesystem or network I/O. They operate on in-memory
//! data and only read the clock to stamp entries.

pub mod conversation;
pub mod log;
pub mod state;
pub mod timestamp;
pub mod types;
