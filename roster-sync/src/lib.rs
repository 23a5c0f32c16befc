//! Roster synchronization: the assignment ledger, the flat store translation,
//! and the service actor that keeps roster, ledger and store in step.

pub mod derive;
mod error;
pub mod flat;
pub mod ledger;
mod service;
pub mod session;
pub mod timer;

pub use derive::{derive_date, ProcessedDates};
pub use error::SyncError;
pub use ledger::AssignmentLedger;
pub use service::{init_tracing, init_tracing_with, spawn, LogFormat, RosterHandle, SaveSummary};
pub use session::{
    Activity, DirtyPost, LoadState, PostView, ReplaceSummary, RosterSession, SyncStatus,
};
