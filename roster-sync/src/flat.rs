//! Translation between slot-indexed occupancy and the store's flat form.
//!
//! The in-memory [`Post`] is the single source of truth. Everything here is a
//! pure function: [`hydrate_post`] builds a post from a stored record,
//! [`flatten_post`] renders it back, and [`diff_flat`] turns two flat
//! snapshots into the minimal set of contiguous [`SlotUpdate`]s.

use std::collections::{BTreeMap, HashMap};

use roster_core::store::{RosterPost, ShiftRecord, SlotRange, SlotUpdate};
use roster_core::{
    Person, PersonId, PositionId, Post, RoleCheck, RosterError, Shift, ShiftId, ShiftKind,
};

/// Flat occupancy of a post: shift id → one id per slot, `""` when open.
pub type FlatPost = BTreeMap<ShiftId, Vec<String>>;

/// An occupant id in a record that could not be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOccupant {
    pub shift_id: ShiftId,
    pub slot: usize,
    pub occupant_id: String,
}

/// A post rebuilt from its record, plus the occupants that were dropped.
#[derive(Debug, Clone)]
pub struct Hydrated {
    pub post: Post,
    pub skipped: Vec<SkippedOccupant>,
}

/// Builds a validated [`Post`] from a stored record.
///
/// Shape errors (bad durations, duplicates, overlaps) fail the whole post.
/// Occupant ids that are not on the personnel roster, or that sit beyond the
/// shift's capacity, are skipped with a warning and leave the slot open.
pub fn hydrate_post(
    record: &RosterPost,
    people: &HashMap<PersonId, Person>,
) -> Result<Hydrated, RosterError> {
    let mut shifts = Vec::with_capacity(record.shifts.len());
    let mut skipped = Vec::new();

    for rec in &record.shifts {
        let mut shift = build_shift(&record.position_id, rec)?;
        for (slot, occupant_id) in rec.occupant_ids.iter().enumerate() {
            if occupant_id.is_empty() {
                continue;
            }
            let placed = people
                .get(&PersonId::from(occupant_id.as_str()))
                .map(|person| shift.assign(person, Some(slot), RoleCheck::Ignore));
            if !matches!(placed, Some(Ok(_))) {
                tracing::warn!(
                    position = %record.position_id,
                    shift = %rec.shift_id,
                    slot,
                    occupant = %occupant_id,
                    "stale occupant skipped, slot left open",
                );
                skipped.push(SkippedOccupant {
                    shift_id: rec.shift_id.clone(),
                    slot,
                    occupant_id: occupant_id.clone(),
                });
            }
        }
        shifts.push(shift);
    }

    let post = Post::with_shifts(
        record.position_id.clone(),
        record.position_name.clone(),
        shifts,
    )?;
    Ok(Hydrated { post, skipped })
}

fn build_shift(position_id: &PositionId, rec: &ShiftRecord) -> Result<Shift, RosterError> {
    let built = match rec.kind {
        ShiftKind::Assignable => Shift::new(rec.shift_id.clone(), rec.start, rec.end, rec.slots.clone()),
        ShiftKind::Unassignable => Shift::unassignable(rec.shift_id.clone(), rec.start, rec.end),
    };
    built.map_err(|err| match err {
        RosterError::InvalidDuration { shift_id, .. } => RosterError::ShiftTooShort {
            position_id: position_id.clone(),
            shift_id,
        },
        other => other,
    })
}

/// One entry per slot, `""` for an open slot.
pub fn flatten_shift(shift: &Shift) -> Vec<String> {
    shift
        .occupants()
        .iter()
        .map(|p| p.as_ref().map(|p| p.0.clone()).unwrap_or_default())
        .collect()
}

pub fn flatten_post(post: &Post) -> FlatPost {
    post.shifts()
        .iter()
        .map(|s| (s.id().clone(), flatten_shift(s)))
        .collect()
}

/// Flat form of a stored record, normalized to one entry per slot.
pub fn flatten_record(record: &RosterPost) -> FlatPost {
    record
        .shifts
        .iter()
        .map(|s| {
            let mut row = s.occupant_ids.clone();
            row.resize(s.slots.len(), String::new());
            (s.shift_id.clone(), row)
        })
        .collect()
}

/// Replaces the occupant arrays of `record` with the rows in `flat`.
pub fn overlay_record(record: &mut RosterPost, flat: &FlatPost) {
    for shift in &mut record.shifts {
        if let Some(row) = flat.get(&shift.shift_id) {
            shift.occupant_ids = row.clone();
        }
    }
}

/// Contiguous runs of slots that differ between `before` and `after`.
///
/// Shifts missing from `before` are compared against an all-open row.
pub fn diff_flat(before: &FlatPost, after: &FlatPost) -> Vec<SlotUpdate> {
    let mut updates = Vec::new();
    for (shift_id, new_row) in after {
        let old_row = before.get(shift_id);
        let old_at = |i: usize| {
            old_row
                .and_then(|row| row.get(i))
                .map(String::as_str)
                .unwrap_or("")
        };

        let mut run_start: Option<usize> = None;
        for i in 0..=new_row.len() {
            let differs = i < new_row.len() && new_row[i] != old_at(i);
            match (differs, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    updates.push(SlotUpdate {
                        range: SlotRange {
                            shift_id: shift_id.clone(),
                            start,
                            end: i,
                        },
                        values: new_row[start..i].to_vec(),
                    });
                    run_start = None;
                }
                _ => {}
            }
        }
    }
    updates
}
