//! Stable exit codes for backstop CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid config, a fatal backup failure, or other errors.
pub const INVALID: i32 = 1;
/// No workspace folder was available to back up.
pub const NO_WORKSPACE: i32 = 2;
/// No API key was found (run `backstop login` or set the configured env var).
pub const NO_CREDENTIAL: i32 = 3;
