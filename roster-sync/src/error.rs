use thiserror::Error;

use roster_core::{RosterError, StoreError};

/// Error surface of the synchronization layer and its service handle.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("roster is loading; try again once the load completes")]
    LoadInProgress,

    #[error("no schedule date is active")]
    NoActiveDate,

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}

pub(crate) fn join_err(task: &'static str, err: tokio::task::JoinError) -> SyncError {
    SyncError::Join {
        task,
        message: err.to_string(),
    }
}
