//! # Observability & Tracing
//!
//! The [`setup_tracing`] function initializes structured logging with the `tracing` crate.
//! Log levels are controlled through the `RUST_LOG` environment variable.
//!
//! ```bash
//! # Cycle boundaries and failures only
//! RUST_LOG=info cargo run
//!
//! # Every attempt, commit and discarded outcome
//! RUST_LOG=debug cargo run
//! ```
//!
//! ## What Gets Traced
//!
//! - **Orchestrator Lifecycle**: startup, shutdown and how many slots were still outstanding
//! - **Cycles**: each generation start (with the reason) and when its last bulk attempt settles
//! - **Attempts**: start, commit, and outcomes discarded as stale or cancelled (debug)
//! - **Failures**: every committed failure with its slot key and message (warn)
//!
//! With `RUST_LOG=info` a refetch where one of three resources fails looks like:
//!
//! ```text
//! INFO Cycle started generation=2 reason="refetch" slots=3 superseded=0
//! WARN Attempt failed key=/b error=timeout
//! INFO Cycle settled generation=2 succeeded=2 failed=1
//! ```
//!
//! Client calls open a span per operation (`refetch`, `refetch_index`, `set_data`, ...), so
//! the compact format shows the caller's context inline.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // Slot keys identify the source; module paths add nothing
        .compact()
        .init();
}
