//! The roster session: loaded posts, the assignment ledger, and unsaved edits.
//!
//! A session is plain synchronous state. The service actor owns exactly one
//! and drives it with explicit events (load finished, slot edited, roster
//! replaced, save completed); nothing here spawns, sleeps or touches a store.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use roster_core::store::{DateWindow, RosterDay, SlotUpdate};
use roster_core::{
    alert_level_in_window, AlertLevel, Assignment, Person, PersonId, Placement, PositionId, Post,
    RosterConfig, RosterError, Shift, ShiftId,
};

use crate::derive::{derive_date, ProcessedDates};
use crate::error::SyncError;
use crate::flat::{diff_flat, flatten_post, flatten_record, hydrate_post, overlay_record, FlatPost};
use crate::ledger::AssignmentLedger;

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

/// Progress of the single in-flight schedule-date load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Fetching,
    Deriving,
    Done,
    Failed,
}

impl LoadState {
    pub fn is_loading(self) -> bool {
        matches!(self, LoadState::Fetching | LoadState::Deriving)
    }
}

/// Which exclusive operation currently owns the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    BulkDerive,
    SlotEdit,
}

/// Identifies one load; results carrying an older epoch are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub epoch: u64,
    pub date: NaiveDate,
    pub window: DateWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoadSummary {
    pub posts: usize,
    pub skipped_occupants: usize,
    pub derived: usize,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(LoadSummary),
    /// A newer load started after this one; the result was dropped.
    Stale,
    Failed(SyncError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RederiveOutcome {
    NotPending,
    /// Exclusion held; `rederive_pending` stays set.
    Suppressed,
    Derived(usize),
}

/// One post's unsaved changes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingPost {
    baseline: FlatPost,
    current: FlatPost,
}

/// A batch of updates ready for [`RosterStore::persist`](roster_core::store::RosterStore::persist).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub date: NaiveDate,
    pub position_id: PositionId,
    pub updates: Vec<SlotUpdate>,
    pub snapshot: FlatPost,
}

/// A post as presented to callers, shifts in day order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub position_id: PositionId,
    pub position_name: String,
    pub shifts: Vec<Shift>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirtyPost {
    pub date: NaiveDate,
    pub position_id: PositionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub load_state: LoadState,
    pub loading: bool,
    pub active_date: Option<NaiveDate>,
    pub activity: Activity,
    pub auto_save: bool,
    pub rederive_pending: bool,
    pub dirty: Vec<DirtyPost>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_save_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReplaceSummary {
    pub days: usize,
    pub posts: usize,
    pub skipped_occupants: usize,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RosterSession {
    config: RosterConfig,
    days: BTreeMap<NaiveDate, Vec<Post>>,
    people: HashMap<PersonId, Person>,
    ledger: AssignmentLedger,
    processed: ProcessedDates,
    active_date: Option<NaiveDate>,
    load_state: LoadState,
    epoch: u64,
    activity: Activity,
    rederive_pending: bool,
    persisted: HashMap<(NaiveDate, PositionId), FlatPost>,
    outbox: BTreeMap<(NaiveDate, PositionId), PendingPost>,
    auto_save: bool,
    last_saved_at: Option<DateTime<Utc>>,
    last_save_error: Option<String>,
}

impl RosterSession {
    pub fn new(config: RosterConfig) -> Self {
        let auto_save = config.auto_save;
        Self {
            config,
            days: BTreeMap::new(),
            people: HashMap::new(),
            ledger: AssignmentLedger::new(),
            processed: ProcessedDates::new(),
            active_date: None,
            load_state: LoadState::Idle,
            epoch: 0,
            activity: Activity::Idle,
            rederive_pending: false,
            persisted: HashMap::new(),
            outbox: BTreeMap::new(),
            auto_save,
            last_saved_at: None,
            last_save_error: None,
        }
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    pub fn active_date(&self) -> Option<NaiveDate> {
        self.active_date
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_loading(&self) -> bool {
        self.load_state.is_loading()
    }

    pub fn rederive_pending(&self) -> bool {
        self.rederive_pending
    }

    pub fn ledger(&self) -> &AssignmentLedger {
        &self.ledger
    }

    pub fn set_people(&mut self, people: Vec<Person>) {
        self.people = people.into_iter().map(|p| (p.id.clone(), p)).collect();
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Starts a load of `date`, superseding any load still in flight.
    ///
    /// The active date's ledger entries are cleared right away; they are
    /// rebuilt when [`finish_load`](Self::finish_load) accepts the result.
    pub fn begin_load(&mut self, date: NaiveDate) -> LoadTicket {
        self.epoch += 1;
        self.active_date = Some(date);
        self.load_state = LoadState::Fetching;
        self.activity = Activity::BulkDerive;
        self.ledger.clear_all_for_date(date);
        self.processed.forget(date);
        let ticket = LoadTicket {
            epoch: self.epoch,
            date,
            window: DateWindow::ending_at(date, self.config.history_days),
        };
        tracing::info!(
            %date,
            epoch = ticket.epoch,
            from = %ticket.window.start,
            "roster load started",
        );
        ticket
    }

    /// Installs a fetched window and re-derives the ledger.
    ///
    /// Any failure releases the loading state as [`LoadState::Failed`] after
    /// re-deriving the roster already installed, which also settles a
    /// re-derivation suppressed during the load.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        fetched: Result<(Vec<RosterDay>, Vec<Person>), SyncError>,
    ) -> LoadOutcome {
        if ticket.epoch != self.epoch {
            tracing::debug!(
                date = %ticket.date,
                epoch = ticket.epoch,
                current = self.epoch,
                "discarding superseded roster load",
            );
            return LoadOutcome::Stale;
        }

        let (days, people) = match fetched {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::warn!(date = %ticket.date, error = %err, "roster load failed");
                // The ledger was cleared for this date in begin_load; rebuild it
                // from whatever roster is still installed.
                let derived = self.derive_loaded();
                self.load_state = LoadState::Failed;
                self.activity = Activity::Idle;
                self.rederive_pending = false;
                tracing::debug!(date = %ticket.date, derived, "ledger rebuilt from installed roster");
                return LoadOutcome::Failed(err);
            }
        };

        self.load_state = LoadState::Deriving;
        self.set_people(people);
        self.drop_dates_outside(ticket.window);

        let mut summary = LoadSummary::default();
        for day in days {
            if !ticket.window.contains(day.date) {
                continue;
            }
            let (posts, skipped) = self.install_day(day);
            summary.posts += posts;
            summary.skipped_occupants += skipped;
        }
        summary.derived = self.derive_loaded();

        self.load_state = LoadState::Done;
        self.activity = Activity::Idle;
        self.rederive_pending = false;
        tracing::info!(
            date = %ticket.date,
            posts = summary.posts,
            skipped = summary.skipped_occupants,
            derived = summary.derived,
            "roster load completed",
        );
        LoadOutcome::Loaded(summary)
    }

    /// Installs a bulk roster without fetching; the ledger catches up on the
    /// next [`rederive`](Self::rederive).
    pub fn replace_roster(&mut self, days: Vec<RosterDay>) -> Result<ReplaceSummary, SyncError> {
        if self.is_loading() {
            return Err(SyncError::LoadInProgress);
        }
        let mut summary = ReplaceSummary::default();
        let mut latest = None;
        for day in days {
            self.processed.forget(day.date);
            latest = latest.max(Some(day.date));
            let (posts, skipped) = self.install_day(day);
            summary.days += 1;
            summary.posts += posts;
            summary.skipped_occupants += skipped;
        }
        if self.active_date.is_none() {
            self.active_date = latest;
        }
        self.rederive_pending = true;
        Ok(summary)
    }

    /// Re-derives the ledger after a bulk replace, unless exclusion is held.
    pub fn rederive(&mut self) -> RederiveOutcome {
        if !self.rederive_pending {
            return RederiveOutcome::NotPending;
        }
        if self.is_loading() || !self.enter(Activity::BulkDerive) {
            tracing::debug!(
                load_state = ?self.load_state,
                activity = ?self.activity,
                "re-derivation suppressed, roster busy",
            );
            return RederiveOutcome::Suppressed;
        }
        let derived = self.derive_loaded();
        self.leave();
        self.rederive_pending = false;
        RederiveOutcome::Derived(derived)
    }

    fn install_day(&mut self, day: RosterDay) -> (usize, usize) {
        let date = day.date;
        let mut posts = Vec::with_capacity(day.posts.len());
        let mut skipped = 0;

        for mut record in day.posts {
            let key = (date, record.position_id.clone());
            let stored = flatten_record(&record);
            if let Some(pending) = self.outbox.get_mut(&key) {
                pending.baseline = stored.clone();
                overlay_record(&mut record, &pending.current);
                if diff_flat(&pending.baseline, &pending.current).is_empty() {
                    self.outbox.remove(&key);
                }
            }
            self.persisted.insert(key, stored);

            match hydrate_post(&record, &self.people) {
                Ok(hydrated) => {
                    skipped += hydrated.skipped.len();
                    posts.push(hydrated.post);
                }
                Err(err) => {
                    tracing::error!(
                        %date,
                        position = %record.position_id,
                        error = %err,
                        "post rejected",
                    );
                }
            }
        }

        let count = posts.len();
        self.days.insert(date, posts);
        (count, skipped)
    }

    fn drop_dates_outside(&mut self, window: DateWindow) {
        let gone: Vec<NaiveDate> = self
            .days
            .keys()
            .copied()
            .filter(|d| !window.contains(*d))
            .collect();
        for date in gone {
            self.days.remove(&date);
            self.ledger.clear_all_for_date(date);
            self.processed.forget(date);
        }
        let outbox = &self.outbox;
        self.persisted
            .retain(|key, _| window.contains(key.0) || outbox.contains_key(key));
    }

    /// Derives the active date, then every other loaded date not yet processed.
    fn derive_loaded(&mut self) -> usize {
        let mut derived = 0;
        if let Some(active) = self.active_date {
            derived += match self.days.get(&active) {
                Some(posts) => derive_date(&mut self.ledger, active, posts),
                None => derive_date(&mut self.ledger, active, std::iter::empty()),
            };
            self.processed.mark(active);
        }
        let history: Vec<NaiveDate> = self
            .days
            .keys()
            .copied()
            .filter(|d| Some(*d) != self.active_date)
            .collect();
        for date in history {
            if !self.processed.mark(date) {
                continue;
            }
            if let Some(posts) = self.days.get(&date) {
                derived += derive_date(&mut self.ledger, date, posts);
            }
        }
        derived
    }

    // -----------------------------------------------------------------------
    // Slot edits
    // -----------------------------------------------------------------------

    /// Places `person_id` in a slot of the active date's roster.
    ///
    /// A displaced occupant's ledger entry is evicted in the same step.
    pub fn assign(
        &mut self,
        position_id: &PositionId,
        shift_id: &ShiftId,
        slot: Option<usize>,
        person_id: &PersonId,
    ) -> Result<Placement, SyncError> {
        let date = self.editable_date()?;
        let person = self
            .people
            .get(person_id)
            .cloned()
            .ok_or_else(|| RosterError::PersonNotFound(person_id.clone()))?;
        if !self.enter(Activity::SlotEdit) {
            return Err(SyncError::LoadInProgress);
        }
        let result = self.apply_assign(date, position_id, shift_id, slot, &person);
        self.leave();
        result
    }

    /// Clears a slot of the active date's roster; returns who held it.
    pub fn unassign(
        &mut self,
        position_id: &PositionId,
        shift_id: &ShiftId,
        slot: usize,
    ) -> Result<Option<PersonId>, SyncError> {
        let date = self.editable_date()?;
        if !self.enter(Activity::SlotEdit) {
            return Err(SyncError::LoadInProgress);
        }
        let result = self.apply_unassign(date, position_id, shift_id, slot);
        self.leave();
        result
    }

    fn apply_assign(
        &mut self,
        date: NaiveDate,
        position_id: &PositionId,
        shift_id: &ShiftId,
        slot: Option<usize>,
        person: &Person,
    ) -> Result<Placement, SyncError> {
        let check = self.config.role_check();
        let shift = self.shift_mut(date, position_id, shift_id)?;
        let placement = shift.assign(person, slot, check)?;
        let (start, end) = (shift.start(), shift.end());

        if let Some(displaced) = &placement.displaced {
            self.ledger
                .clear_slot(displaced, position_id, shift_id, placement.slot, date);
        }
        self.ledger.record_assignment(
            &person.id,
            Assignment {
                person_id: person.id.clone(),
                position_id: position_id.clone(),
                shift_id: shift_id.clone(),
                slot_index: placement.slot,
                start,
                end,
                date,
            },
        );
        self.note_edit(date, position_id);
        tracing::debug!(
            %date,
            position = %position_id,
            shift = %shift_id,
            slot = placement.slot,
            person = %person.id,
            "slot assigned",
        );
        Ok(placement)
    }

    fn apply_unassign(
        &mut self,
        date: NaiveDate,
        position_id: &PositionId,
        shift_id: &ShiftId,
        slot: usize,
    ) -> Result<Option<PersonId>, SyncError> {
        let removed = self.shift_mut(date, position_id, shift_id)?.unassign(slot)?;
        if let Some(person_id) = &removed {
            self.ledger
                .clear_slot(person_id, position_id, shift_id, slot, date);
            self.note_edit(date, position_id);
        }
        Ok(removed)
    }

    fn editable_date(&self) -> Result<NaiveDate, SyncError> {
        if self.is_loading() {
            return Err(SyncError::LoadInProgress);
        }
        self.active_date.ok_or(SyncError::NoActiveDate)
    }

    fn shift_mut(
        &mut self,
        date: NaiveDate,
        position_id: &PositionId,
        shift_id: &ShiftId,
    ) -> Result<&mut Shift, RosterError> {
        self.days
            .get_mut(&date)
            .and_then(|posts| posts.iter_mut().find(|p| p.position_id() == position_id))
            .ok_or_else(|| RosterError::PositionNotFound(position_id.clone()))?
            .shift_mut(shift_id)
    }

    fn enter(&mut self, activity: Activity) -> bool {
        if self.activity != Activity::Idle {
            return false;
        }
        self.activity = activity;
        true
    }

    fn leave(&mut self) {
        self.activity = Activity::Idle;
    }

    // -----------------------------------------------------------------------
    // Outbox
    // -----------------------------------------------------------------------

    fn note_edit(&mut self, date: NaiveDate, position_id: &PositionId) {
        let Some(post) = self
            .days
            .get(&date)
            .and_then(|posts| posts.iter().find(|p| p.position_id() == position_id))
        else {
            return;
        };
        let current = flatten_post(post);
        let key = (date, position_id.clone());
        let baseline = match self.outbox.get(&key) {
            Some(pending) => pending.baseline.clone(),
            None => self.persisted.get(&key).cloned().unwrap_or_default(),
        };
        if diff_flat(&baseline, &current).is_empty() {
            self.outbox.remove(&key);
        } else {
            self.outbox.insert(key, PendingPost { baseline, current });
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Minimal slot updates for every post with unsaved changes.
    pub fn pending_saves(&self) -> Vec<PendingSave> {
        self.outbox
            .iter()
            .filter_map(|((date, position_id), pending)| {
                let updates = diff_flat(&pending.baseline, &pending.current);
                (!updates.is_empty()).then(|| PendingSave {
                    date: *date,
                    position_id: position_id.clone(),
                    updates,
                    snapshot: pending.current.clone(),
                })
            })
            .collect()
    }

    /// Records that `save` reached the store.
    pub fn mark_saved(&mut self, save: &PendingSave) {
        let key = (save.date, save.position_id.clone());
        self.persisted.insert(key.clone(), save.snapshot.clone());
        let settled = match self.outbox.get_mut(&key) {
            Some(pending) if pending.current != save.snapshot => {
                pending.baseline = save.snapshot.clone();
                false
            }
            Some(_) => true,
            None => false,
        };
        if settled {
            self.outbox.remove(&key);
        }
    }

    pub fn record_save_success(&mut self, at: DateTime<Utc>) {
        self.last_saved_at = Some(at);
        self.last_save_error = None;
    }

    pub fn record_save_error(&mut self, message: String) {
        self.last_save_error = Some(message);
    }

    pub fn auto_save(&self) -> bool {
        self.auto_save
    }

    pub fn set_auto_save(&mut self, enabled: bool) {
        self.auto_save = enabled;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Posts of the active date in presentation order.
    pub fn current_roster(&self) -> Result<Vec<PostView>, SyncError> {
        let date = self.active_date.ok_or(SyncError::NoActiveDate)?;
        let hour = self.config.day_start_hour;
        Ok(self
            .days
            .get(&date)
            .map(|posts| {
                posts
                    .iter()
                    .map(|post| PostView {
                        position_id: post.position_id().clone(),
                        position_name: post.position_name().to_string(),
                        shifts: post.presentation_order(hour).into_iter().cloned().collect(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Ledger entries on `date`, or on the active date when `None`.
    pub fn assignments_on(
        &self,
        person_id: &PersonId,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Assignment>, SyncError> {
        let date = date.or(self.active_date).ok_or(SyncError::NoActiveDate)?;
        Ok(self.ledger.assignments_on(person_id, date))
    }

    pub fn assignments_in_range(
        &self,
        person_id: &PersonId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<Assignment> {
        self.ledger.assignments_in_range(person_id, start, end)
    }

    /// Rest-time alert for `person_id` over the active date's history window.
    pub fn alert_level(&self, person_id: &PersonId) -> Result<AlertLevel, SyncError> {
        let date = self.active_date.ok_or(SyncError::NoActiveDate)?;
        let history = self.config.history_days;
        let window = DateWindow::ending_at(date, history);
        let assignments = self
            .ledger
            .assignments_in_range(person_id, window.start, window.end);
        Ok(alert_level_in_window(&assignments, date, history))
    }

    /// Alert level of everyone with at least one ledger entry.
    pub fn alert_levels(&self) -> Result<BTreeMap<PersonId, AlertLevel>, SyncError> {
        self.ledger
            .people()
            .map(|id| Ok((id.clone(), self.alert_level(id)?)))
            .collect()
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            load_state: self.load_state,
            loading: self.is_loading(),
            active_date: self.active_date,
            activity: self.activity,
            auto_save: self.auto_save,
            rederive_pending: self.rederive_pending,
            dirty: self
                .outbox
                .keys()
                .map(|(date, position_id)| DirtyPost {
                    date: *date,
                    position_id: position_id.clone(),
                })
                .collect(),
            last_saved_at: self.last_saved_at,
            last_save_error: self.last_save_error.clone(),
        }
    }
}
