//! Rebuilding ledger entries from roster occupancy.

use std::collections::HashSet;

use chrono::NaiveDate;

use roster_core::{Assignment, Post};

use crate::ledger::AssignmentLedger;

/// Replaces every ledger entry dated `date` with the occupancy of `posts`.
///
/// Running it twice over the same posts leaves the ledger unchanged.
/// Returns the number of assignments recorded.
pub fn derive_date<'a, I>(ledger: &mut AssignmentLedger, date: NaiveDate, posts: I) -> usize
where
    I: IntoIterator<Item = &'a Post>,
{
    ledger.clear_all_for_date(date);
    let mut recorded = 0;
    for post in posts {
        for shift in post.shifts() {
            for (slot_index, person_id) in shift.occupied() {
                ledger.record_assignment(
                    person_id,
                    Assignment {
                        person_id: person_id.clone(),
                        position_id: post.position_id().clone(),
                        shift_id: shift.id().clone(),
                        slot_index,
                        start: shift.start(),
                        end: shift.end(),
                        date,
                    },
                );
                recorded += 1;
            }
        }
    }
    tracing::debug!(%date, recorded, "derived ledger entries");
    recorded
}

/// History dates already indexed, so each is derived at most once per load.
#[derive(Debug, Clone, Default)]
pub struct ProcessedDates {
    dates: HashSet<NaiveDate>,
}

impl ProcessedDates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `date`; returns `false` when it was already processed.
    pub fn mark(&mut self, date: NaiveDate) -> bool {
        self.dates.insert(date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn forget(&mut self, date: NaiveDate) {
        self.dates.remove(&date);
    }

    pub fn clear(&mut self) {
        self.dates.clear();
    }
}
