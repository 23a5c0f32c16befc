//! Shifts: a time box at a post with a fixed set of role-constrained slots.

use serde::{Deserialize, Serialize};

use crate::error::RosterError;
use crate::time::{span_minutes, TimeOfDay, SLOTS_PER_DAY};
use crate::types::{Person, PersonId, Role, ShiftId};

/// Eligible roles for one fillable spot. An empty set accepts anyone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotDefinition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eligible_roles: Vec<Role>,
}

impl SlotDefinition {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn for_roles<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            eligible_roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, role: &Role) -> bool {
        self.eligible_roles.is_empty() || self.eligible_roles.contains(role)
    }
}

/// Whether [`Shift::assign`] checks slot eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleCheck {
    #[default]
    Enforce,
    Ignore,
}

impl RoleCheck {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            RoleCheck::Enforce
        } else {
            RoleCheck::Ignore
        }
    }
}

/// Assignable shifts hold people; unassignable ones are display-only blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftKind {
    #[default]
    Assignable,
    Unassignable,
}

/// Where an assignment landed and who, if anyone, it displaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub slot: usize,
    pub displaced: Option<PersonId>,
}

/// A duty period with index-addressable occupant slots.
///
/// `occupants` always has exactly one entry per slot definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shift {
    id: ShiftId,
    start: TimeOfDay,
    end: TimeOfDay,
    kind: ShiftKind,
    slots: Vec<SlotDefinition>,
    occupants: Vec<Option<PersonId>>,
}

impl Shift {
    /// Creates an empty assignable shift.
    ///
    /// Fails with [`RosterError::InvalidDuration`] when `start..end` is empty.
    /// An end slot before the start slot crosses midnight.
    pub fn new(
        id: impl Into<ShiftId>,
        start: TimeOfDay,
        end: TimeOfDay,
        slots: Vec<SlotDefinition>,
    ) -> Result<Self, RosterError> {
        let id = id.into();
        if span_minutes(start, end) == 0 {
            return Err(RosterError::InvalidDuration {
                shift_id: id,
                start,
                end,
            });
        }
        let occupants = vec![None; slots.len()];
        Ok(Self {
            id,
            start,
            end,
            kind: ShiftKind::Assignable,
            slots,
            occupants,
        })
    }

    /// Creates a zero-capacity placeholder block.
    pub fn unassignable(
        id: impl Into<ShiftId>,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<Self, RosterError> {
        let mut shift = Self::new(id, start, end, Vec::new())?;
        shift.kind = ShiftKind::Unassignable;
        Ok(shift)
    }

    pub fn id(&self) -> &ShiftId {
        &self.id
    }

    pub fn start(&self) -> TimeOfDay {
        self.start
    }

    pub fn end(&self) -> TimeOfDay {
        self.end
    }

    pub fn kind(&self) -> ShiftKind {
        self.kind
    }

    pub fn slots(&self) -> &[SlotDefinition] {
        &self.slots
    }

    pub fn capacity(&self) -> usize {
        match self.kind {
            ShiftKind::Assignable => self.slots.len(),
            ShiftKind::Unassignable => 0,
        }
    }

    pub fn duration_minutes(&self) -> u16 {
        span_minutes(self.start, self.end)
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end.end_slot_index() < self.start.slot_index()
    }

    /// Day-grid cells this shift occupies, in time order.
    pub fn quanta(&self) -> Vec<usize> {
        let start = self.start.slot_index();
        let end = self.end.end_slot_index();
        if end > start {
            (start..end).collect()
        } else {
            (start..SLOTS_PER_DAY).chain(0..end).collect()
        }
    }

    pub fn occupant(&self, slot: usize) -> Option<&PersonId> {
        self.occupants.get(slot).and_then(Option::as_ref)
    }

    pub fn occupants(&self) -> &[Option<PersonId>] {
        &self.occupants
    }

    /// Filled slots as `(slot, person)` pairs.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &PersonId)> + '_ {
        self.occupants
            .iter()
            .enumerate()
            .filter_map(|(slot, p)| p.as_ref().map(|p| (slot, p)))
    }

    pub fn occupant_count(&self) -> usize {
        self.occupants.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.occupant_count() >= self.capacity()
    }

    /// Places `person` in `slot`, or in the first free slot when `slot` is `None`.
    ///
    /// An explicit slot overwrites its current occupant, which is returned in
    /// [`Placement::displaced`] so the caller can reconcile it.
    pub fn assign(
        &mut self,
        person: &Person,
        slot: Option<usize>,
        check: RoleCheck,
    ) -> Result<Placement, RosterError> {
        if self.kind == ShiftKind::Unassignable {
            return Err(RosterError::NotAssignable {
                shift_id: self.id.clone(),
            });
        }

        let slot = match slot {
            Some(index) => {
                self.check_index(index)?;
                index
            }
            None => self
                .occupants
                .iter()
                .position(Option::is_none)
                .ok_or_else(|| RosterError::CapacityExceeded {
                    shift_id: self.id.clone(),
                    capacity: self.capacity(),
                })?,
        };

        if check == RoleCheck::Enforce && !self.slots[slot].accepts(&person.role) {
            return Err(RosterError::RoleMismatch {
                shift_id: self.id.clone(),
                slot,
                person_id: person.id.clone(),
                role: person.role.clone(),
            });
        }

        let displaced = self.occupants[slot].replace(person.id.clone());
        Ok(Placement { slot, displaced })
    }

    /// Clears `slot`. Clearing an empty slot is a no-op.
    pub fn unassign(&mut self, slot: usize) -> Result<Option<PersonId>, RosterError> {
        self.check_index(slot)?;
        Ok(self.occupants[slot].take())
    }

    fn check_index(&self, index: usize) -> Result<(), RosterError> {
        if index >= self.capacity() {
            return Err(RosterError::IndexOutOfRange {
                shift_id: self.id.clone(),
                index,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }
}
