//! Dated assignment facts derived from roster occupancy.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::time::{span_minutes, TimeOfDay, MINUTES_PER_DAY};
use crate::types::{PersonId, PositionId, ShiftId};

/// A person occupying one slot of one shift on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub person_id: PersonId,
    pub position_id: PositionId,
    pub shift_id: ShiftId,
    pub slot_index: usize,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub date: NaiveDate,
}

impl Assignment {
    /// `(start, end)` in minutes of the assignment's date; the end is pushed
    /// past 1440 when the shift wraps midnight.
    pub fn interval_minutes(&self) -> (u32, u32) {
        let start = u32::from(self.start.minutes());
        let mut end = u32::from(self.end.minutes());
        if end <= start {
            end += u32::from(MINUTES_PER_DAY);
        }
        (start, end)
    }

    pub fn duration_minutes(&self) -> u32 {
        u32::from(span_minutes(self.start, self.end))
    }

    /// True when both facts describe the same slot of the same shift.
    pub fn same_slot(&self, other: &Assignment) -> bool {
        self.position_id == other.position_id
            && self.shift_id == other.shift_id
            && self.slot_index == other.slot_index
            && self.date == other.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_wraps_midnight() {
        let a = Assignment {
            person_id: "p".into(),
            position_id: "gate".into(),
            shift_id: "night".into(),
            slot_index: 0,
            start: "22:00".parse().unwrap(),
            end: "02:00".parse().unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert_eq!(a.interval_minutes(), (1320, 1560));
        assert_eq!(a.duration_minutes(), 240);
    }
}
