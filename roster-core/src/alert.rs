//! Rest-time alerts for one person's assignments.
//!
//! Only assignments on the same calendar date are compared. An overlap is
//! always [`AlertLevel::Red`]. Otherwise every ordered pair `(first, second)`
//! is graded by the rest gap relative to the first shift's duration `D`:
//!
//! | gap            | level  |
//! |----------------|--------|
//! | `gap <= D`     | orange |
//! | `D < gap < 2D` | yellow |
//! | `gap >= 2D`    | none   |
//!
//! A negative gap (the first shift wraps past midnight, so it ends after the
//! second one starts on the clock) is treated as unconstrained.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::assignment::Assignment;

/// Severity of a person's rest-time risk, ordered `None < Yellow < Orange < Red`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    None,
    Yellow,
    Orange,
    Red,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::None => write!(f, "none"),
            AlertLevel::Yellow => write!(f, "yellow"),
            AlertLevel::Orange => write!(f, "orange"),
            AlertLevel::Red => write!(f, "red"),
        }
    }
}

/// Classifies `assignments`; input order does not matter.
pub fn alert_level(assignments: &[Assignment]) -> AlertLevel {
    if assignments.len() <= 1 {
        return AlertLevel::None;
    }

    let mut sorted: Vec<&Assignment> = assignments.iter().collect();
    sorted.sort_by(|a, b| {
        (a.date, a.start, a.end, &a.position_id, &a.shift_id, a.slot_index).cmp(&(
            b.date,
            b.start,
            b.end,
            &b.position_id,
            &b.shift_id,
            b.slot_index,
        ))
    });

    for (i, a) in sorted.iter().enumerate() {
        for b in sorted[i + 1..].iter().take_while(|b| b.date == a.date) {
            if overlaps(a, b) {
                return AlertLevel::Red;
            }
        }
    }

    let mut level = AlertLevel::None;
    for (i, first) in sorted.iter().enumerate() {
        for second in sorted[i + 1..].iter().take_while(|b| b.date == first.date) {
            level = level.max(grade_pair(first, second));
            if level == AlertLevel::Orange {
                return level;
            }
        }
    }
    level
}

/// Like [`alert_level`], restricted to `today` and the `history_days` before it.
pub fn alert_level_in_window(
    assignments: &[Assignment],
    today: NaiveDate,
    history_days: u32,
) -> AlertLevel {
    let earliest = today
        .checked_sub_days(Days::new(u64::from(history_days)))
        .unwrap_or(NaiveDate::MIN);
    let window: Vec<Assignment> = assignments
        .iter()
        .filter(|a| a.date >= earliest && a.date <= today)
        .cloned()
        .collect();
    alert_level(&window)
}

fn overlaps(a: &Assignment, b: &Assignment) -> bool {
    let (s1, e1) = a.interval_minutes();
    let (s2, e2) = b.interval_minutes();
    s1 < e2 && s2 < e1
}

fn grade_pair(first: &Assignment, second: &Assignment) -> AlertLevel {
    let (_, first_end) = first.interval_minutes();
    let (second_start, _) = second.interval_minutes();
    let Some(gap) = second_start.checked_sub(first_end) else {
        return AlertLevel::None;
    };
    let duration = first.duration_minutes();
    if gap <= duration {
        AlertLevel::Orange
    } else if gap < duration * 2 {
        AlertLevel::Yellow
    } else {
        AlertLevel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).expect("date")
    }

    fn at(date: NaiveDate, shift: &str, start: &str, end: &str) -> Assignment {
        Assignment {
            person_id: "p1".into(),
            position_id: "gate".into(),
            shift_id: shift.into(),
            slot_index: 0,
            start: start.parse().expect("start"),
            end: end.parse().expect("end"),
            date,
        }
    }

    #[test]
    fn empty_and_single_are_none() {
        assert_eq!(alert_level(&[]), AlertLevel::None);
        assert_eq!(alert_level(&[at(day(1), "a", "08:00", "16:00")]), AlertLevel::None);
    }

    #[test]
    fn yellow_between_one_and_two_durations() {
        // D = 4h, gap = 6h
        let list = [at(day(1), "a", "04:00", "08:00"), at(day(1), "b", "14:00", "16:00")];
        assert_eq!(alert_level(&list), AlertLevel::Yellow);
    }

    #[test]
    fn two_durations_is_clear() {
        // D = 4h, gap = 8h
        let list = [at(day(1), "a", "04:00", "08:00"), at(day(1), "b", "16:00", "18:00")];
        assert_eq!(alert_level(&list), AlertLevel::None);
    }

    #[test]
    fn orange_beats_yellow_from_other_pairs() {
        let list = [
            at(day(1), "a", "00:00", "02:00"),
            at(day(1), "b", "05:00", "06:00"),
            at(day(1), "c", "06:00", "07:00"),
        ];
        assert_eq!(alert_level(&list), AlertLevel::Orange);
    }

    #[test]
    fn wrapped_first_shift_overlaps_any_later_start() {
        let list = [at(day(1), "a", "20:00", "02:00"), at(day(1), "b", "23:00", "23:30")];
        assert_eq!(alert_level(&list), AlertLevel::Red);
    }

    #[test]
    fn overnight_second_shift_uses_evening_start() {
        // D = 2h, gap = 14h
        let list = [at(day(1), "a", "06:00", "08:00"), at(day(1), "b", "22:00", "04:00")];
        assert_eq!(alert_level(&list), AlertLevel::None);
    }

    #[test]
    fn window_drops_old_dates() {
        let list = [
            at(day(1), "a", "08:00", "12:00"),
            at(day(1), "b", "12:00", "16:00"),
            at(day(5), "c", "08:00", "12:00"),
        ];
        assert_eq!(alert_level_in_window(&list, day(5), 3), AlertLevel::None);
        assert_eq!(alert_level_in_window(&list, day(5), 4), AlertLevel::Orange);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(AlertLevel::Orange.to_string(), "orange");
        assert!(AlertLevel::Red > AlertLevel::Orange);
    }
}
