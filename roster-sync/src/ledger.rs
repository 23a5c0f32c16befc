//! Per-person, per-date index of assignments.

use std::collections::HashMap;

use chrono::NaiveDate;

use roster_core::{Assignment, PersonId, PositionId, ShiftId};

/// `person → assignments`, kept sorted by `(date, start)`.
///
/// The ledger only references posts and shifts by id; it never owns roster
/// state and can always be rebuilt from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentLedger {
    entries: HashMap<PersonId, Vec<Assignment>>,
}

impl AssignmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `assignment` for `person_id`. An identical fact is stored once.
    pub fn record_assignment(&mut self, person_id: &PersonId, assignment: Assignment) {
        let list = self.entries.entry(person_id.clone()).or_default();
        if list.contains(&assignment) {
            return;
        }
        let at = list.partition_point(|a| (a.date, a.start) <= (assignment.date, assignment.start));
        list.insert(at, assignment);
    }

    /// Removes `person_id`'s entries for one shift; `date: None` clears every date.
    pub fn clear_assignment(
        &mut self,
        person_id: &PersonId,
        position_id: &PositionId,
        shift_id: &ShiftId,
        date: Option<NaiveDate>,
    ) {
        if let Some(list) = self.entries.get_mut(person_id) {
            list.retain(|a| {
                !(&a.position_id == position_id
                    && &a.shift_id == shift_id
                    && date.map_or(true, |d| a.date == d))
            });
            if list.is_empty() {
                self.entries.remove(person_id);
            }
        }
    }

    /// Removes the entry for one exact slot on one date, whoever holds it.
    pub fn clear_slot(
        &mut self,
        person_id: &PersonId,
        position_id: &PositionId,
        shift_id: &ShiftId,
        slot_index: usize,
        date: NaiveDate,
    ) {
        if let Some(list) = self.entries.get_mut(person_id) {
            list.retain(|a| {
                !(&a.position_id == position_id
                    && &a.shift_id == shift_id
                    && a.slot_index == slot_index
                    && a.date == date)
            });
            if list.is_empty() {
                self.entries.remove(person_id);
            }
        }
    }

    pub fn clear_all_for_date(&mut self, date: NaiveDate) {
        self.entries.retain(|_, list| {
            list.retain(|a| a.date != date);
            !list.is_empty()
        });
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn assignments_on(&self, person_id: &PersonId, date: NaiveDate) -> Vec<Assignment> {
        self.assignments_in_range(person_id, date, date)
    }

    /// Assignments dated `start..=end`.
    pub fn assignments_in_range(
        &self,
        person_id: &PersonId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<Assignment> {
        self.entries
            .get(person_id)
            .map(|list| {
                list.iter()
                    .filter(|a| a.date >= start && a.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn people(&self) -> impl Iterator<Item = &PersonId> {
        self.entries.keys()
    }

    /// Total number of recorded assignments.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
    }

    fn fact(shift: &str, slot: usize, start: &str, date: NaiveDate) -> Assignment {
        Assignment {
            person_id: "p1".into(),
            position_id: "gate".into(),
            shift_id: shift.into(),
            slot_index: slot,
            start: start.parse().unwrap(),
            end: "23:00".parse().unwrap(),
            date,
        }
    }

    fn p1() -> PersonId {
        PersonId::from("p1")
    }

    #[test]
    fn entries_stay_sorted_and_deduplicated() {
        let mut ledger = AssignmentLedger::new();
        ledger.record_assignment(&p1(), fact("b", 0, "14:00", d(2)));
        ledger.record_assignment(&p1(), fact("a", 0, "06:00", d(2)));
        ledger.record_assignment(&p1(), fact("z", 0, "06:00", d(1)));
        ledger.record_assignment(&p1(), fact("a", 0, "06:00", d(2)));

        let ids: Vec<_> = ledger
            .assignments_in_range(&p1(), d(1), d(2))
            .into_iter()
            .map(|a| a.shift_id.to_string())
            .collect();
        assert_eq!(ids, ["z", "a", "b"]);
    }

    #[test]
    fn clear_for_date_leaves_other_dates() {
        let mut ledger = AssignmentLedger::new();
        ledger.record_assignment(&p1(), fact("a", 0, "06:00", d(1)));
        ledger.record_assignment(&p1(), fact("a", 0, "06:00", d(2)));
        ledger.clear_all_for_date(d(2));
        assert_eq!(ledger.assignments_on(&p1(), d(1)).len(), 1);
        assert!(ledger.assignments_on(&p1(), d(2)).is_empty());
    }

    #[test]
    fn clear_assignment_without_date_clears_every_date() {
        let mut ledger = AssignmentLedger::new();
        ledger.record_assignment(&p1(), fact("a", 0, "06:00", d(1)));
        ledger.record_assignment(&p1(), fact("a", 1, "06:00", d(2)));
        ledger.record_assignment(&p1(), fact("b", 0, "14:00", d(2)));

        ledger.clear_assignment(&p1(), &"gate".into(), &"a".into(), Some(d(1)));
        assert_eq!(ledger.len(), 2);
        ledger.clear_assignment(&p1(), &"gate".into(), &"a".into(), None);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn clear_slot_is_exact() {
        let mut ledger = AssignmentLedger::new();
        ledger.record_assignment(&p1(), fact("a", 0, "06:00", d(1)));
        ledger.record_assignment(&p1(), fact("a", 1, "06:00", d(1)));
        ledger.clear_slot(&p1(), &"gate".into(), &"a".into(), 1, d(1));
        let left = ledger.assignments_on(&p1(), d(1));
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].slot_index, 0);
    }

    #[test]
    fn clear_all_empties_the_ledger() {
        let mut ledger = AssignmentLedger::new();
        ledger.record_assignment(&p1(), fact("a", 0, "06:00", d(1)));
        ledger.clear_all();
        assert!(ledger.is_empty());
    }
}
