//! In-process roster store.
//!
//! Holds records in memory, counts calls, and can be switched unreachable to
//! exercise failure paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;

use crate::error::StoreError;
use crate::store::{
    apply_updates, DateWindow, PersistOutcome, RosterDay, RosterPost, RosterStore, SlotUpdate,
};
use crate::types::{Person, PositionId};

/// A recorded [`RosterStore::persist`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistCall {
    pub date: NaiveDate,
    pub position_id: PositionId,
    pub updates: Vec<SlotUpdate>,
}

#[derive(Debug)]
pub struct MemoryRosterStore {
    days: Mutex<BTreeMap<NaiveDate, Vec<RosterPost>>>,
    people: Mutex<Vec<Person>>,
    persisted: Mutex<Vec<PersistCall>>,
    reachable: AtomicBool,
    fetches: AtomicUsize,
}

impl Default for MemoryRosterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self {
            days: Mutex::new(BTreeMap::new()),
            people: Mutex::new(Vec::new()),
            persisted: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_people(self, people: Vec<Person>) -> Self {
        *lock(&self.people) = people;
        self
    }

    /// Inserts or replaces the record for `post.position_id` on `date`.
    pub fn put_post(&self, date: NaiveDate, post: RosterPost) {
        let mut days = lock(&self.days);
        let posts = days.entry(date).or_default();
        match posts.iter_mut().find(|p| p.position_id == post.position_id) {
            Some(existing) => *existing = post,
            None => posts.push(post),
        }
    }

    pub fn post(&self, date: NaiveDate, position_id: &PositionId) -> Option<RosterPost> {
        lock(&self.days)
            .get(&date)
            .and_then(|posts| posts.iter().find(|p| &p.position_id == position_id))
            .cloned()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn persist_calls(&self) -> Vec<PersistCall> {
        lock(&self.persisted).clone()
    }

    fn ensure_reachable(&self) -> Result<(), StoreError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unreachable("memory store switched off".into()))
        }
    }
}

impl RosterStore for MemoryRosterStore {
    fn fetch_roster(&self, window: DateWindow) -> Result<Vec<RosterDay>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.ensure_reachable()?;
        let days = lock(&self.days);
        Ok(window
            .dates()
            .map(|date| RosterDay {
                date,
                posts: days.get(&date).cloned().unwrap_or_default(),
            })
            .collect())
    }

    fn persist(
        &self,
        date: NaiveDate,
        position_id: &PositionId,
        updates: &[SlotUpdate],
    ) -> Result<PersistOutcome, StoreError> {
        self.ensure_reachable()?;
        let mut days = lock(&self.days);
        let post = days
            .get_mut(&date)
            .and_then(|posts| posts.iter_mut().find(|p| &p.position_id == position_id))
            .ok_or_else(|| StoreError::RecordNotFound {
                path: format!("memory:{date}/{position_id}").into(),
            })?;
        let before = post.clone();
        apply_updates(post, updates)?;
        let changed = *post != before;
        drop(days);

        lock(&self.persisted).push(PersistCall {
            date,
            position_id: position_id.clone(),
            updates: updates.to_vec(),
        });
        Ok(if changed {
            PersistOutcome::Written
        } else {
            PersistOutcome::Unchanged
        })
    }

    fn fetch_person_roster(&self) -> Result<Vec<Person>, StoreError> {
        self.ensure_reachable()?;
        Ok(lock(&self.people).clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_store_fails_every_call() {
        let store = MemoryRosterStore::new();
        store.set_reachable(false);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(store.fetch_roster(DateWindow::ending_at(date, 0)).is_err());
        assert!(store.fetch_person_roster().is_err());
        assert_eq!(store.fetch_count(), 1);
    }

    #[test]
    fn put_post_replaces_by_position() {
        let store = MemoryRosterStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let post = |name: &str| RosterPost {
            position_id: "gate".into(),
            position_name: name.into(),
            shifts: vec![],
        };
        store.put_post(date, post("old"));
        store.put_post(date, post("new"));
        let stored = store.post(date, &PositionId::from("gate")).unwrap();
        assert_eq!(stored.position_name, "new");
    }
}
