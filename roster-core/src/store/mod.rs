//! The roster store surface and its flat, spreadsheet-like record format.
//!
//! A store hands out [`RosterPost`] records whose shifts carry a flat
//! `occupant_ids` array (index-aligned with the slot definitions, empty string
//! for an open slot) and accepts [`SlotUpdate`] diffs against that array.

pub mod file;
pub mod memory;

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::shift::{ShiftKind, SlotDefinition};
use crate::time::TimeOfDay;
use crate::types::{Person, PositionId, ShiftId};

pub use file::FileRosterStore;
pub use memory::{MemoryRosterStore, PersistCall};

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `date` plus the `history_days` dates before it.
    pub fn ending_at(date: NaiveDate, history_days: u32) -> Self {
        let start = date
            .checked_sub_days(Days::new(u64::from(history_days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Dates in the window, oldest first.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// One shift as stored: definition plus flat occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub shift_id: ShiftId,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    #[serde(default)]
    pub kind: ShiftKind,
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
    #[serde(default)]
    pub occupant_ids: Vec<String>,
}

/// One post as stored for a single date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPost {
    pub position_id: PositionId,
    pub position_name: String,
    #[serde(default)]
    pub shifts: Vec<ShiftRecord>,
}

/// All posts stored for a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterDay {
    pub date: NaiveDate,
    pub posts: Vec<RosterPost>,
}

/// Half-open run of slots `start..end` in one shift's flat occupant array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub shift_id: ShiftId,
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}:{}", self.shift_id, self.start, self.end)
    }
}

/// New values for a [`SlotRange`]; `values.len() == end - start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotUpdate {
    pub range: SlotRange,
    pub values: Vec<String>,
}

/// Whether a persist call changed stored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    Unchanged,
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Read/write surface of the external roster service.
///
/// Calls are blocking; async callers run them on a blocking thread.
pub trait RosterStore: Send + Sync {
    /// Every stored date in `window`, oldest first. Dates without data come
    /// back with no posts.
    fn fetch_roster(&self, window: DateWindow) -> Result<Vec<RosterDay>, StoreError>;

    /// Applies flat-slot updates to one post on one date.
    fn persist(
        &self,
        date: NaiveDate,
        position_id: &PositionId,
        updates: &[SlotUpdate],
    ) -> Result<PersistOutcome, StoreError>;

    fn fetch_person_roster(&self) -> Result<Vec<Person>, StoreError>;
}

/// Writes `updates` into `post`, padding short occupant arrays with `""`.
///
/// Validates every update before touching the record. Entries stored past the
/// last slot definition are left in place.
pub fn apply_updates(post: &mut RosterPost, updates: &[SlotUpdate]) -> Result<(), StoreError> {
    let mut targets = Vec::with_capacity(updates.len());
    for update in updates {
        let range = &update.range;
        let index = post
            .shifts
            .iter()
            .position(|s| s.shift_id == range.shift_id)
            .ok_or_else(|| StoreError::UnknownShift {
                range: range.to_string(),
            })?;
        let len = post.shifts[index].slots.len();
        if range.start > range.end
            || range.end > len
            || update.values.len() != range.end - range.start
        {
            return Err(StoreError::RangeOutOfBounds {
                range: range.to_string(),
                len,
            });
        }
        targets.push(index);
    }

    for (update, index) in updates.iter().zip(targets) {
        let shift = &mut post.shifts[index];
        let slots = shift.slots.len();
        if shift.occupant_ids.len() < slots {
            shift.occupant_ids.resize(slots, String::new());
        } else if shift.occupant_ids.len() > slots {
            tracing::warn!(
                shift = %shift.shift_id,
                slots,
                stored = shift.occupant_ids.len(),
                "occupant array longer than slot definitions",
            );
        }
        shift.occupant_ids[update.range.start..update.range.end].clone_from_slice(&update.values);
    }
    Ok(())
}
