//! Interrupt guardian
//!
//! Fires only on a user-initiated interrupt (Ctrl+C). Normal completion and
//! error returns clean up through the pipeline itself; the guardian exists
//! so an interrupted run still leaves the host without stale mounts or
//! helper processes.

use std::sync::Arc;

use crate::core::context::CleanupState;

/// Install the Ctrl+C handler over the shared cleanup slot. Interrupting
/// before a target exists is a safe no-op: the slot starts inert.
pub fn install(state: Arc<CleanupState>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            tracing::error!("Ctrl+C detected; cleaning up and exiting");
            state.teardown();
            std::process::exit(1);
        }
    });
}
