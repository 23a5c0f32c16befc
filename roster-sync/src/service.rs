//! The roster service actor.
//!
//! A single task owns the [`RosterSession`] and serializes every command sent
//! through a [`RosterHandle`]. Saves, schedule date changes and bulk
//! re-derivation are debounced here; store I/O runs on the blocking pool.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use roster_core::store::{PersistOutcome, RosterDay, RosterStore};
use roster_core::{
    AlertLevel, Assignment, Person, PersonId, Placement, PositionId, RosterConfig, ShiftId,
};

use crate::error::{join_err, SyncError};
use crate::session::{
    LoadOutcome, LoadTicket, PendingSave, PostView, ReplaceSummary, RosterSession, SyncStatus,
};
use crate::timer::{wait_for, DebounceTimer};

type Reply<T> = oneshot::Sender<T>;
type Fetched = Result<(Vec<RosterDay>, Vec<Person>), SyncError>;

enum Command {
    CurrentRoster {
        respond_to: Reply<Result<Vec<PostView>, SyncError>>,
    },
    AssignmentsOn {
        person_id: PersonId,
        date: Option<NaiveDate>,
        respond_to: Reply<Result<Vec<Assignment>, SyncError>>,
    },
    AssignmentsInRange {
        person_id: PersonId,
        start: NaiveDate,
        end: NaiveDate,
        respond_to: Reply<Vec<Assignment>>,
    },
    AlertLevel {
        person_id: PersonId,
        respond_to: Reply<Result<AlertLevel, SyncError>>,
    },
    AlertLevels {
        respond_to: Reply<Result<BTreeMap<PersonId, AlertLevel>, SyncError>>,
    },
    Assign {
        position_id: PositionId,
        shift_id: ShiftId,
        slot: Option<usize>,
        person_id: PersonId,
        respond_to: Reply<Result<Placement, SyncError>>,
    },
    Unassign {
        position_id: PositionId,
        shift_id: ShiftId,
        slot: usize,
        respond_to: Reply<Result<Option<PersonId>, SyncError>>,
    },
    SetAutoSave {
        enabled: bool,
        respond_to: Reply<()>,
    },
    ManualSave {
        respond_to: Reply<Result<SaveSummary, SyncError>>,
    },
    SetScheduleDate {
        date: NaiveDate,
        respond_to: Reply<()>,
    },
    ReplaceRoster {
        days: Vec<RosterDay>,
        respond_to: Reply<Result<ReplaceSummary, SyncError>>,
    },
    Status {
        respond_to: Reply<SyncStatus>,
    },
    Shutdown {
        respond_to: Reply<()>,
    },
}

struct FetchResult {
    ticket: LoadTicket,
    fetched: Fetched,
}

/// Result of pushing the outbox to the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SaveSummary {
    pub posts: usize,
    pub written: usize,
    pub unchanged: usize,
    pub duration_ms: u128,
}

/// Cloneable handle to a running roster service.
#[derive(Debug, Clone)]
pub struct RosterHandle {
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::CurrentRoster { .. } => "current_roster",
            Command::AssignmentsOn { .. } => "assignments_on",
            Command::AssignmentsInRange { .. } => "assignments_in_range",
            Command::AlertLevel { .. } => "alert_level",
            Command::AlertLevels { .. } => "alert_levels",
            Command::Assign { .. } => "assign",
            Command::Unassign { .. } => "unassign",
            Command::SetAutoSave { .. } => "set_auto_save",
            Command::ManualSave { .. } => "manual_save",
            Command::SetScheduleDate { .. } => "set_schedule_date",
            Command::ReplaceRoster { .. } => "replace_roster",
            Command::Status { .. } => "status",
            Command::Shutdown { .. } => "shutdown",
        };
        f.write_str(name)
    }
}

/// Starts the service actor on the current tokio runtime.
pub fn spawn(store: Arc<dyn RosterStore>, config: RosterConfig) -> RosterHandle {
    let (commands_tx, commands_rx) = mpsc::channel::<Command>(64);
    let (fetch_tx, fetch_rx) = mpsc::channel::<FetchResult>(8);
    let service = Service {
        store,
        session: RosterSession::new(config.clone()),
        config,
        save_timer: DebounceTimer::new(),
        date_timer: DebounceTimer::new(),
        rederive_timer: DebounceTimer::new(),
        pending_date: None,
        fetch_tx,
    };
    tokio::spawn(service.run(commands_rx, fetch_rx));
    RosterHandle {
        commands: commands_tx,
    }
}

impl RosterHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SyncError::ChannelClosed("roster commands"))?;
        rx.await
            .map_err(|_| SyncError::ChannelClosed("roster reply"))
    }

    pub async fn current_roster(&self) -> Result<Vec<PostView>, SyncError> {
        self.request(|respond_to| Command::CurrentRoster { respond_to })
            .await?
    }

    /// Ledger entries on `date`, or on the active schedule date when `None`.
    pub async fn assignments_on(
        &self,
        person_id: impl Into<PersonId>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Assignment>, SyncError> {
        let person_id = person_id.into();
        self.request(|respond_to| Command::AssignmentsOn {
            person_id,
            date,
            respond_to,
        })
        .await?
    }

    pub async fn assignments_in_range(
        &self,
        person_id: impl Into<PersonId>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Assignment>, SyncError> {
        let person_id = person_id.into();
        self.request(|respond_to| Command::AssignmentsInRange {
            person_id,
            start,
            end,
            respond_to,
        })
        .await
    }

    pub async fn alert_level(&self, person_id: impl Into<PersonId>) -> Result<AlertLevel, SyncError> {
        let person_id = person_id.into();
        self.request(|respond_to| Command::AlertLevel {
            person_id,
            respond_to,
        })
        .await?
    }

    pub async fn alert_levels(
        &self,
    ) -> Result<BTreeMap<PersonId, AlertLevel>, SyncError> {
        self.request(|respond_to| Command::AlertLevels { respond_to })
            .await?
    }

    /// Places a person in `slot`, or the first free slot when `None`.
    pub async fn assign(
        &self,
        position_id: impl Into<PositionId>,
        shift_id: impl Into<ShiftId>,
        slot: Option<usize>,
        person_id: impl Into<PersonId>,
    ) -> Result<Placement, SyncError> {
        let (position_id, shift_id, person_id) =
            (position_id.into(), shift_id.into(), person_id.into());
        self.request(|respond_to| Command::Assign {
            position_id,
            shift_id,
            slot,
            person_id,
            respond_to,
        })
        .await?
    }

    pub async fn unassign(
        &self,
        position_id: impl Into<PositionId>,
        shift_id: impl Into<ShiftId>,
        slot: usize,
    ) -> Result<Option<PersonId>, SyncError> {
        let (position_id, shift_id) = (position_id.into(), shift_id.into());
        self.request(|respond_to| Command::Unassign {
            position_id,
            shift_id,
            slot,
            respond_to,
        })
        .await?
    }

    /// Disabling cancels any pending debounced save.
    pub async fn set_auto_save(&self, enabled: bool) -> Result<(), SyncError> {
        self.request(|respond_to| Command::SetAutoSave {
            enabled,
            respond_to,
        })
        .await
    }

    pub async fn manual_save(&self) -> Result<SaveSummary, SyncError> {
        self.request(|respond_to| Command::ManualSave { respond_to })
            .await?
    }

    /// Schedules a load of `date` after the date-change quiet interval.
    pub async fn set_schedule_date(&self, date: NaiveDate) -> Result<(), SyncError> {
        self.request(|respond_to| Command::SetScheduleDate { date, respond_to })
            .await
    }

    pub async fn replace_roster(&self, days: Vec<RosterDay>) -> Result<ReplaceSummary, SyncError> {
        self.request(|respond_to| Command::ReplaceRoster { days, respond_to })
            .await?
    }

    pub async fn status(&self) -> Result<SyncStatus, SyncError> {
        self.request(|respond_to| Command::Status { respond_to })
            .await
    }

    pub async fn status_json(&self) -> Result<Value, SyncError> {
        let status = self.status().await?;
        Ok(json!(status))
    }

    /// Flushes pending edits when auto-save is on, then stops the actor.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.request(|respond_to| Command::Shutdown { respond_to })
            .await
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Service {
    store: Arc<dyn RosterStore>,
    session: RosterSession,
    config: RosterConfig,
    save_timer: DebounceTimer,
    date_timer: DebounceTimer,
    rederive_timer: DebounceTimer,
    pending_date: Option<NaiveDate>,
    fetch_tx: mpsc::Sender<FetchResult>,
}

impl Service {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut fetches: mpsc::Receiver<FetchResult>,
    ) {
        tracing::debug!("roster service started");
        loop {
            let save_at = self.save_timer.deadline();
            let date_at = self.date_timer.deadline();
            let rederive_at = self.rederive_timer.deadline();

            tokio::select! {
                maybe_cmd = commands.recv() => {
                    let Some(cmd) = maybe_cmd else { break };
                    if !self.handle(cmd).await {
                        break;
                    }
                }
                Some(result) = fetches.recv() => self.finish_fetch(result),
                _ = wait_for(save_at) => {
                    self.save_timer.cancel();
                    self.flush_debounced().await;
                }
                _ = wait_for(date_at) => {
                    self.date_timer.cancel();
                    self.start_load();
                }
                _ = wait_for(rederive_at) => {
                    self.rederive_timer.cancel();
                    let outcome = self.session.rederive();
                    tracing::debug!(?outcome, "re-derivation timer fired");
                }
            }
        }
        tracing::debug!("roster service stopped");
    }

    /// Returns `false` when the actor should stop.
    async fn handle(&mut self, cmd: Command) -> bool {
        tracing::trace!(command = ?cmd, "roster command");
        match cmd {
            Command::CurrentRoster { respond_to } => {
                let _ = respond_to.send(self.session.current_roster());
            }
            Command::AssignmentsOn {
                person_id,
                date,
                respond_to,
            } => {
                let _ = respond_to.send(self.session.assignments_on(&person_id, date));
            }
            Command::AssignmentsInRange {
                person_id,
                start,
                end,
                respond_to,
            } => {
                let _ = respond_to.send(self.session.assignments_in_range(&person_id, start, end));
            }
            Command::AlertLevel {
                person_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.session.alert_level(&person_id));
            }
            Command::AlertLevels { respond_to } => {
                let _ = respond_to.send(self.session.alert_levels());
            }
            Command::Assign {
                position_id,
                shift_id,
                slot,
                person_id,
                respond_to,
            } => {
                let result = self
                    .session
                    .assign(&position_id, &shift_id, slot, &person_id);
                if result.is_ok() {
                    self.schedule_save();
                }
                let _ = respond_to.send(result);
            }
            Command::Unassign {
                position_id,
                shift_id,
                slot,
                respond_to,
            } => {
                let result = self.session.unassign(&position_id, &shift_id, slot);
                if matches!(result, Ok(Some(_))) {
                    self.schedule_save();
                }
                let _ = respond_to.send(result);
            }
            Command::SetAutoSave {
                enabled,
                respond_to,
            } => {
                self.session.set_auto_save(enabled);
                if enabled {
                    self.schedule_save();
                } else if self.save_timer.is_armed() {
                    self.save_timer.cancel();
                    tracing::info!("auto-save disabled, pending save cancelled");
                }
                let _ = respond_to.send(());
            }
            Command::ManualSave { respond_to } => {
                self.save_timer.cancel();
                let result = self.save_all().await;
                let _ = respond_to.send(result);
            }
            Command::SetScheduleDate { date, respond_to } => {
                if let Some(previous) = self.pending_date.replace(date) {
                    tracing::debug!(%previous, %date, "schedule date change superseded");
                }
                self.date_timer
                    .arm(Instant::now(), self.config.date_change_debounce());
                let _ = respond_to.send(());
            }
            Command::ReplaceRoster { days, respond_to } => {
                let result = self.session.replace_roster(days);
                if result.is_ok() {
                    self.rederive_timer
                        .arm(Instant::now(), self.config.rederive_delay());
                }
                let _ = respond_to.send(result);
            }
            Command::Status { respond_to } => {
                let _ = respond_to.send(self.session.status());
            }
            Command::Shutdown { respond_to } => {
                if self.session.auto_save() && self.session.is_dirty() {
                    self.flush_debounced().await;
                }
                let _ = respond_to.send(());
                return false;
            }
        }
        true
    }

    fn schedule_save(&mut self) {
        if self.session.auto_save() && self.session.is_dirty() {
            self.save_timer
                .arm(Instant::now(), self.config.save_debounce());
        }
    }

    fn start_load(&mut self) {
        let Some(date) = self.pending_date.take() else {
            return;
        };
        let ticket = self.session.begin_load(date);
        let store = Arc::clone(&self.store);
        let fetch_tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let window = ticket.window;
            let fetched = tokio::task::spawn_blocking(move || {
                let days = store.fetch_roster(window)?;
                let people = store.fetch_person_roster()?;
                Ok::<_, SyncError>((days, people))
            })
            .await
            .map_err(|err| join_err("roster fetch", err))
            .and_then(|inner| inner);
            if fetch_tx.send(FetchResult { ticket, fetched }).await.is_err() {
                tracing::debug!(date = %ticket.date, "service gone, dropping fetched roster");
            }
        });
    }

    fn finish_fetch(&mut self, result: FetchResult) {
        match self.session.finish_load(&result.ticket, result.fetched) {
            LoadOutcome::Loaded(summary) => {
                tracing::debug!(?summary, "schedule date ready");
            }
            LoadOutcome::Stale => {}
            LoadOutcome::Failed(err) => {
                tracing::error!(date = %result.ticket.date, error = %err, "schedule date load failed");
            }
        }
    }

    async fn flush_debounced(&mut self) {
        if !self.session.auto_save() {
            return;
        }
        match self.save_all().await {
            Ok(summary) if summary.posts > 0 => {
                tracing::info!(
                    posts = summary.posts,
                    written = summary.written,
                    unchanged = summary.unchanged,
                    duration_ms = summary.duration_ms,
                    "debounced save completed",
                );
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "debounced save failed, edits kept for the next save");
            }
        }
    }

    /// Persists every pending post in order, stopping at the first failure.
    async fn save_all(&mut self) -> Result<SaveSummary, SyncError> {
        let started = Instant::now();
        let mut summary = SaveSummary::default();

        for save in self.session.pending_saves() {
            match self.persist(&save).await {
                Ok(PersistOutcome::Written) => summary.written += 1,
                Ok(PersistOutcome::Unchanged) => summary.unchanged += 1,
                Err(err) => {
                    tracing::warn!(
                        date = %save.date,
                        position = %save.position_id,
                        error = %err,
                        "persist failed",
                    );
                    self.session.record_save_error(err.to_string());
                    return Err(err);
                }
            }
            self.session.mark_saved(&save);
            summary.posts += 1;
        }

        if summary.posts > 0 {
            self.session.record_save_success(Utc::now());
        }
        summary.duration_ms = started.elapsed().as_millis();
        Ok(summary)
    }

    async fn persist(&self, save: &PendingSave) -> Result<PersistOutcome, SyncError> {
        let store = Arc::clone(&self.store);
        let (date, position_id, updates) =
            (save.date, save.position_id.clone(), save.updates.clone());
        let outcome = tokio::task::spawn_blocking(move || {
            store.persist(date, &position_id, &updates)
        })
        .await
        .map_err(|err| join_err("roster persist", err))??;
        Ok(outcome)
    }
}

/// Output format for [`init_tracing_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Installs a text `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    init_tracing_with(LogFormat::Text);
}

/// Installs a `fmt` subscriber in `format`. A second call is a no-op.
pub fn init_tracing_with(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_init_tolerates_repeat_calls() {
        init_tracing_with(LogFormat::Json);
        init_tracing_with(LogFormat::Text);
        init_tracing();
        tracing::info!(format = ?LogFormat::default(), "subscriber installed");
    }
}
