//! Time of day on a 15-minute grid.
//!
//! The day is split into [`SLOTS_PER_DAY`] quanta. Start times map to slots
//! `0..=95`; an end time of `00:00` means end-of-day and maps to slot 96, so a
//! shift ending at midnight never collides with one starting at midnight.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RosterError;

pub const QUANTUM_MINUTES: u16 = 15;
pub const SLOTS_PER_DAY: usize = 96;
pub const MINUTES_PER_DAY: u16 = 1440;

/// A quantized time of day, stored as minute-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);

    /// Builds a time from hour and minute; the minute must be a quarter hour.
    pub fn from_hm(hour: u8, minute: u8) -> Result<Self, RosterError> {
        if hour > 23 || minute > 59 || u16::from(minute) % QUANTUM_MINUTES != 0 {
            return Err(RosterError::InvalidTimeFormat {
                input: format!("{hour:02}:{minute:02}"),
            });
        }
        Ok(Self(u16::from(hour) * 60 + u16::from(minute)))
    }

    /// Parses `HH:MM` (a single-digit hour is accepted).
    pub fn parse(input: &str) -> Result<Self, RosterError> {
        let invalid = || RosterError::InvalidTimeFormat {
            input: input.to_owned(),
        };
        let (h, m) = input.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).map_err(|_| invalid())
    }

    pub fn hour(self) -> u8 {
        (self.0 / 60) as u8
    }

    pub fn minute(self) -> u8 {
        (self.0 % 60) as u8
    }

    /// Minute of day, `0..1440`.
    pub fn minutes(self) -> u16 {
        self.0
    }

    /// Slot index of this time used as a start boundary (`0..=95`).
    pub fn slot_index(self) -> usize {
        usize::from(self.0 / QUANTUM_MINUTES)
    }

    /// Slot index of this time used as an end boundary; `00:00` is slot 96.
    pub fn end_slot_index(self) -> usize {
        if self.0 == 0 {
            SLOTS_PER_DAY
        } else {
            self.slot_index()
        }
    }
}

/// Length of `start..end` in minutes.
///
/// An end at or before the start wraps past midnight; `00:00` as an end is
/// end-of-day. A zero result means the interval is empty.
pub fn span_minutes(start: TimeOfDay, end: TimeOfDay) -> u16 {
    let start_slot = start.slot_index();
    let end_slot = end.end_slot_index();
    let slots = if end_slot >= start_slot {
        end_slot - start_slot
    } else {
        SLOTS_PER_DAY - start_slot + end_slot
    };
    slots as u16 * QUANTUM_MINUTES
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = RosterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}
