//! Posts: a duty position and the shifts that cover its day.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::RosterError;
use crate::shift::Shift;
use crate::time::{MINUTES_PER_DAY, SLOTS_PER_DAY};
use crate::types::{PositionId, ShiftId};

/// A duty position owning an ordered set of non-overlapping shifts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    position_id: PositionId,
    position_name: String,
    shifts: Vec<Shift>,
}

impl Post {
    pub fn new(position_id: impl Into<PositionId>, position_name: impl Into<String>) -> Self {
        Self {
            position_id: position_id.into(),
            position_name: position_name.into(),
            shifts: Vec::new(),
        }
    }

    /// Builds a post from a complete shift set, validated as one unit.
    pub fn with_shifts(
        position_id: impl Into<PositionId>,
        position_name: impl Into<String>,
        shifts: Vec<Shift>,
    ) -> Result<Self, RosterError> {
        let mut post = Self::new(position_id, position_name);
        validate_shift_set(&post.position_id, &shifts)?;
        post.shifts = shifts;
        Ok(post)
    }

    pub fn position_id(&self) -> &PositionId {
        &self.position_id
    }

    pub fn position_name(&self) -> &str {
        &self.position_name
    }

    /// Shifts in insertion order.
    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    /// Adds `shift` after re-validating the resulting set.
    ///
    /// On error the post is left untouched.
    pub fn add_shift(&mut self, shift: Shift) -> Result<(), RosterError> {
        let mut candidate = self.shifts.clone();
        candidate.push(shift);
        validate_shift_set(&self.position_id, &candidate)?;
        self.shifts = candidate;
        Ok(())
    }

    pub fn remove_shift(&mut self, shift_id: &ShiftId) -> Result<Shift, RosterError> {
        let index = self
            .shifts
            .iter()
            .position(|s| s.id() == shift_id)
            .ok_or_else(|| self.shift_not_found(shift_id))?;
        Ok(self.shifts.remove(index))
    }

    pub fn shift(&self, shift_id: &ShiftId) -> Result<&Shift, RosterError> {
        self.shifts
            .iter()
            .find(|s| s.id() == shift_id)
            .ok_or_else(|| self.shift_not_found(shift_id))
    }

    pub fn shift_mut(&mut self, shift_id: &ShiftId) -> Result<&mut Shift, RosterError> {
        let missing = self.shift_not_found(shift_id);
        self.shifts
            .iter_mut()
            .find(|s| s.id() == shift_id)
            .ok_or(missing)
    }

    /// Shifts sorted by start time measured from `day_start_hour`.
    ///
    /// With a day start of 06:00, a 22:00 shift sorts before a 02:00 one.
    pub fn presentation_order(&self, day_start_hour: u8) -> Vec<&Shift> {
        let offset = i32::from(day_start_hour) * 60;
        let mut ordered: Vec<&Shift> = self.shifts.iter().collect();
        ordered.sort_by_key(|s| {
            let rel = (i32::from(s.start().minutes()) - offset).rem_euclid(i32::from(MINUTES_PER_DAY));
            (rel, s.id().clone())
        });
        ordered
    }

    fn shift_not_found(&self, shift_id: &ShiftId) -> RosterError {
        RosterError::ShiftNotFound {
            position_id: self.position_id.clone(),
            shift_id: shift_id.clone(),
        }
    }
}

/// Checks a complete shift set: unique ids, minimum span, no shared quanta.
pub fn validate_shift_set(position_id: &PositionId, shifts: &[Shift]) -> Result<(), RosterError> {
    let mut seen = HashSet::new();
    for shift in shifts {
        if !seen.insert(shift.id()) {
            return Err(RosterError::DuplicateShiftId {
                position_id: position_id.clone(),
                shift_id: shift.id().clone(),
            });
        }
    }

    for shift in shifts {
        if shift.quanta().is_empty() {
            return Err(RosterError::ShiftTooShort {
                position_id: position_id.clone(),
                shift_id: shift.id().clone(),
            });
        }
    }

    let mut grid: [Option<usize>; SLOTS_PER_DAY] = [None; SLOTS_PER_DAY];
    for (index, shift) in shifts.iter().enumerate() {
        for slot in shift.quanta() {
            if let Some(owner) = grid[slot] {
                return Err(RosterError::OverlappingShifts {
                    position_id: position_id.clone(),
                    first: shifts[owner].id().clone(),
                    second: shift.id().clone(),
                    slot,
                });
            }
            grid[slot] = Some(index);
        }
    }
    Ok(())
}
