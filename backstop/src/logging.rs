//! Development-time tracing for debugging backstop.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG` or `-v`, output to
//!   stderr. Not kept in memory, not shown by `:logs`.
//!
//! - **Session log (`core::log`)**: Product log owned by the orchestrator and
//!   displayed to the user. Always recorded, unaffected by tracing filters.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
///
/// Other crates stay at `warn`; `-v` and `-vv` only open up backstop's own spans.
pub fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "warn,backstop=info",
        _ => "warn,backstop=debug",
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `verbose`. Output: stderr, compact, no targets.
///
/// # Example
/// ```bash
/// RUST_LOG=backstop::io::backup=debug backstop backup
/// backstop -vv chat
/// ```
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}
