//! Error types for roster-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::time::TimeOfDay;
use crate::types::{PersonId, PositionId, Role, ShiftId};

/// Validation failures raised by the roster model.
///
/// Every variant is a local, non-retryable failure carrying the ids or times
/// that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("invalid time '{input}': expected HH:MM on a 15-minute boundary")]
    InvalidTimeFormat { input: String },

    #[error("shift {shift_id} ({start}-{end}) does not span a single quantum")]
    InvalidDuration {
        shift_id: ShiftId,
        start: TimeOfDay,
        end: TimeOfDay,
    },

    #[error("post {position_id} already has a shift with id {shift_id}")]
    DuplicateShiftId {
        position_id: PositionId,
        shift_id: ShiftId,
    },

    #[error("shifts {first} and {second} overlap at post {position_id} (slot {slot})")]
    OverlappingShifts {
        position_id: PositionId,
        first: ShiftId,
        second: ShiftId,
        slot: usize,
    },

    #[error("shift {shift_id} at post {position_id} is shorter than one quantum")]
    ShiftTooShort {
        position_id: PositionId,
        shift_id: ShiftId,
    },

    #[error("shift {shift_id} is full ({capacity} slots)")]
    CapacityExceeded { shift_id: ShiftId, capacity: usize },

    #[error("slot {index} out of range for shift {shift_id} ({capacity} slots)")]
    IndexOutOfRange {
        shift_id: ShiftId,
        index: usize,
        capacity: usize,
    },

    #[error("person {person_id} has role {role}, not eligible for slot {slot} of shift {shift_id}")]
    RoleMismatch {
        shift_id: ShiftId,
        slot: usize,
        person_id: PersonId,
        role: Role,
    },

    #[error("shift {shift_id} does not accept assignments")]
    NotAssignable { shift_id: ShiftId },

    #[error("position not found: {0}")]
    PositionNotFound(PositionId),

    #[error("shift {shift_id} not found at post {position_id}")]
    ShiftNotFound {
        position_id: PositionId,
        shift_id: ShiftId,
    },

    #[error("person not found: {0}")]
    PersonNotFound(PersonId),
}

/// Failures of the roster store and configuration loading.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("roster record not found at {path}")]
    RecordNotFound { path: PathBuf },

    #[error("range {range} names an unknown shift")]
    UnknownShift { range: String },

    #[error("range {range} exceeds {len} slots")]
    RangeOutOfBounds { range: String, len: usize },

    #[error("roster store unreachable: {0}")]
    Unreachable(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
