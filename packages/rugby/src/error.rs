//! Typed error kinds (spec §7).
//!
//! Ad hoc failures from collaborators propagate as `color_eyre::Report` with
//! `.context(...)` attached at each hop, the way the rest of the crate does
//! it. [`RugbyError`] exists for the handful of outcomes the `Orchestrator`
//! needs to pattern-match on to pick a branch (`AlreadyPatched` driving
//! `cache` → `rebuild-cache`, `NoSnapshot` aborting `rollback`, and so on) —
//! wrap one in a `color_eyre::Report` via `?` like any other error and match
//! on it downstream with `report.downcast_ref::<RugbyError>()`.
use derive_more::{Display, Error};

#[derive(Clone, Eq, PartialEq, Hash, Debug, Display, Error)]
pub enum RugbyError {
    /// Wraps any external-component error. In practice this crate prefers to
    /// propagate the original error with added context instead of
    /// re-wrapping it in this variant; it exists so the kind is nameable.
    #[display("collaborator failed: {message}")]
    CollaboratorFailure { message: String },

    #[display("selection yielded zero targets")]
    NoBuildTargets,

    #[display("could not find a matching simulator")]
    CantFindSimulator,

    #[display("project is already patched")]
    AlreadyPatched,

    #[display("no snapshot available to restore")]
    NoSnapshot,

    #[display("no +latest file to upload from")]
    NoLatestFile,

    #[display("+latest file is empty, nothing to upload")]
    EmptySelection,

    #[display("remote authentication failed")]
    RemoteAuthFailure,

    #[display("remote bucket not found")]
    RemoteBucketNotFound,

    #[display("remote request rejected with status {status_code}")]
    RemoteRequestRejected { status_code: u16 },

    #[display("network request timed out")]
    NetworkTimeout,

    #[display("cycle detection exhausted (this should be unreachable)")]
    CycleExhausted,

    #[display("cache entry at {path} is corrupt: {reason}")]
    CorruptCacheEntry { path: String, reason: String },

    #[display("io error during {operation} on {path}: {cause}")]
    IoError {
        operation: String,
        path: String,
        cause: String,
    },
}
