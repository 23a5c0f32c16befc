//! Service actor behaviour under a paused clock: debounced saves, date
//! changes, load failures and bulk replacement.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rstest::rstest;
use tokio::time::sleep;
use tokio_test::assert_ok;

use roster_core::store::{MemoryRosterStore, RosterDay, RosterPost, ShiftRecord};
use roster_core::{AlertLevel, Person, PersonId, PositionId, RosterConfig, ShiftKind, SlotDefinition, StoreError};
use roster_sync::{LoadState, RosterHandle, SyncError, SyncStatus};

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, day).expect("date")
}

fn people() -> Vec<Person> {
    vec![
        Person::new("p1", "Ana", "guard"),
        Person::new("p2", "Ben", "guard"),
    ]
}

fn record(shift_id: &str, start: &str, end: &str, occupants: &[&str]) -> ShiftRecord {
    ShiftRecord {
        shift_id: shift_id.into(),
        start: start.parse().expect("start"),
        end: end.parse().expect("end"),
        kind: ShiftKind::Assignable,
        slots: vec![SlotDefinition::any(); 2],
        occupant_ids: occupants.iter().map(|s| s.to_string()).collect(),
    }
}

fn gate(shifts: Vec<ShiftRecord>) -> RosterPost {
    RosterPost {
        position_id: "gate".into(),
        position_name: "Main gate".into(),
        shifts,
    }
}

fn store_with(day: NaiveDate, post: RosterPost) -> Arc<MemoryRosterStore> {
    let store = MemoryRosterStore::new().with_people(people());
    store.put_post(day, post);
    Arc::new(store)
}

fn start(store: &Arc<MemoryRosterStore>) -> RosterHandle {
    roster_sync::spawn(store.clone(), RosterConfig::default())
}

async fn wait_until_settled(handle: &RosterHandle) -> SyncStatus {
    for _ in 0..200 {
        let status = handle.status().await.expect("status");
        if matches!(status.load_state, LoadState::Done | LoadState::Failed) {
            return status;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("roster load never settled");
}

async fn loaded(store: &Arc<MemoryRosterStore>) -> RosterHandle {
    let handle = start(store);
    assert_ok!(handle.set_schedule_date(date(10)).await);
    let status = wait_until_settled(&handle).await;
    assert_eq!(status.load_state, LoadState::Done);
    handle
}

fn gate_position() -> PositionId {
    PositionId::from("gate")
}

// ---------------------------------------------------------------------------
// 1. Debounced persistence
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_save() {
    let store = store_with(date(10), gate(vec![record("day", "06:00", "14:00", &[])]));
    let handle = loaded(&store).await;

    assert_ok!(handle.assign("gate", "day", Some(0), "p1").await);
    sleep(Duration::from_millis(300)).await;
    assert_ok!(handle.assign("gate", "day", Some(1), "p2").await);
    sleep(Duration::from_millis(900)).await;
    assert!(store.persist_calls().is_empty(), "quiet interval not over yet");

    sleep(Duration::from_millis(200)).await;
    let status = handle.status().await.expect("status");
    let calls = store.persist_calls();
    assert_eq!(calls.len(), 1, "edits should collapse to one save");
    assert_eq!(calls[0].updates.len(), 1);
    assert_eq!(calls[0].updates[0].range.to_string(), "day!0:2");
    assert!(status.dirty.is_empty());
    assert!(status.last_saved_at.is_some());

    let stored = store.post(date(10), &gate_position()).expect("post");
    assert_eq!(stored.shifts[0].occupant_ids, ["p1", "p2"]);
}

#[tokio::test(start_paused = true)]
async fn disabling_auto_save_cancels_the_pending_save() {
    let store = store_with(date(10), gate(vec![record("day", "06:00", "14:00", &[])]));
    let handle = loaded(&store).await;

    assert_ok!(handle.assign("gate", "day", None, "p1").await);
    assert_ok!(handle.set_auto_save(false).await);
    sleep(Duration::from_secs(3)).await;

    assert!(store.persist_calls().is_empty());
    assert_eq!(handle.status().await.expect("status").dirty.len(), 1);

    let summary = handle.manual_save().await.expect("manual save");
    assert_eq!((summary.posts, summary.written), (1, 1));
    assert_eq!(store.persist_calls().len(), 1);
    assert!(handle.status().await.expect("status").dirty.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_manual_save_surfaces_and_keeps_edits() {
    let store = store_with(date(10), gate(vec![record("day", "06:00", "14:00", &[])]));
    let handle = loaded(&store).await;
    assert_ok!(handle.set_auto_save(false).await);
    assert_ok!(handle.assign("gate", "day", None, "p1").await);

    store.set_reachable(false);
    let err = handle.manual_save().await.unwrap_err();
    assert!(
        matches!(err, SyncError::Store(StoreError::Unreachable(_))),
        "got: {err}"
    );
    let status = handle.status().await.expect("status");
    assert_eq!(status.dirty.len(), 1);
    assert!(status.last_save_error.is_some());

    store.set_reachable(true);
    assert_ok!(handle.manual_save().await);
    let status = handle.status().await.expect("status");
    assert!(status.dirty.is_empty());
    assert!(status.last_save_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_debounced_save_waits_for_the_next_trigger() {
    let store = store_with(date(10), gate(vec![record("day", "06:00", "14:00", &[])]));
    let handle = loaded(&store).await;

    store.set_reachable(false);
    assert_ok!(handle.assign("gate", "day", Some(0), "p1").await);
    sleep(Duration::from_millis(1_100)).await;
    let status = handle.status().await.expect("status");
    assert!(status.last_save_error.is_some());
    assert_eq!(status.dirty.len(), 1);

    store.set_reachable(true);
    sleep(Duration::from_secs(5)).await;
    assert!(store.persist_calls().is_empty(), "no automatic retry");

    assert_ok!(handle.assign("gate", "day", Some(1), "p2").await);
    sleep(Duration::from_millis(1_100)).await;
    let calls = store.persist_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].updates[0].values, ["p1", "p2"]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_pending_edits() {
    let store = store_with(date(10), gate(vec![record("day", "06:00", "14:00", &[])]));
    let handle = loaded(&store).await;
    assert_ok!(handle.assign("gate", "day", None, "p1").await);

    assert_ok!(handle.shutdown().await);
    assert_eq!(store.persist_calls().len(), 1);
    assert!(matches!(
        handle.status().await,
        Err(SyncError::ChannelClosed(_))
    ));
}

// ---------------------------------------------------------------------------
// 2. Schedule date loading
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rapid_date_changes_load_only_the_last_date() {
    let store = store_with(date(10), gate(vec![record("day", "06:00", "14:00", &["p1"])]));
    let handle = start(&store);

    assert_ok!(handle.set_schedule_date(date(9)).await);
    sleep(Duration::from_millis(100)).await;
    assert_ok!(handle.set_schedule_date(date(10)).await);
    let status = wait_until_settled(&handle).await;

    assert_eq!(status.active_date, Some(date(10)));
    assert_eq!(store.fetch_count(), 1, "superseded date must not be fetched");
    let entries = handle.assignments_on("p1", None).await.expect("entries");
    assert_eq!(entries.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_load_releases_the_loading_flag() {
    let store = store_with(date(10), gate(vec![record("day", "06:00", "14:00", &[])]));
    store.set_reachable(false);
    let handle = start(&store);

    assert_ok!(handle.set_schedule_date(date(10)).await);
    let status = wait_until_settled(&handle).await;
    assert_eq!(status.load_state, LoadState::Failed);
    assert!(!status.loading);

    let err = handle.assign("gate", "day", None, "p1").await.unwrap_err();
    assert!(!matches!(err, SyncError::LoadInProgress), "got: {err}");
}

#[tokio::test(start_paused = true)]
async fn failed_reload_still_reports_rostered_people() {
    let store = store_with(date(10), gate(vec![record("day", "06:00", "14:00", &["p1"])]));
    let handle = loaded(&store).await;

    store.set_reachable(false);
    assert_ok!(handle.set_schedule_date(date(10)).await);
    sleep(Duration::from_millis(300)).await;
    let status = wait_until_settled(&handle).await;
    assert_eq!(status.load_state, LoadState::Failed);

    let roster = handle.current_roster().await.expect("roster");
    assert_eq!(roster[0].shifts[0].occupant(0), Some(&PersonId::from("p1")));
    assert_eq!(handle.assignments_on("p1", None).await.expect("p1").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_occupants_load_as_open_slots() {
    let store = store_with(
        date(10),
        gate(vec![record("day", "06:00", "14:00", &["ghost", "p1"])]),
    );
    let handle = loaded(&store).await;

    let roster = handle.current_roster().await.expect("roster");
    let shift = &roster[0].shifts[0];
    assert_eq!(shift.occupant(0), None);
    assert_eq!(shift.occupant(1), Some(&PersonId::from("p1")));
    assert!(handle.status().await.expect("status").dirty.is_empty());
}

#[tokio::test(start_paused = true)]
async fn status_serializes_to_json() {
    let store = store_with(date(10), gate(vec![record("day", "06:00", "14:00", &[])]));
    let handle = loaded(&store).await;
    let value = handle.status_json().await.expect("status");
    assert_eq!(value["load_state"], "done");
    assert_eq!(value["active_date"], "2024-07-10");
    assert_eq!(value["auto_save"], true);
}

// ---------------------------------------------------------------------------
// 3. Bulk replacement and alerts
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn replaced_roster_is_indexed_after_the_rederive_delay() {
    let store = store_with(date(10), gate(vec![record("day", "06:00", "14:00", &["p1"])]));
    let handle = loaded(&store).await;

    let replacement = RosterDay {
        date: date(10),
        posts: vec![gate(vec![record("day", "06:00", "14:00", &["p2"])])],
    };
    let summary = handle.replace_roster(vec![replacement]).await.expect("replace");
    assert_eq!(summary.posts, 1);
    assert!(handle.status().await.expect("status").rederive_pending);

    sleep(Duration::from_millis(100)).await;
    let status = handle.status().await.expect("status");
    assert!(!status.rederive_pending);
    assert!(handle.assignments_on("p1", None).await.expect("p1").is_empty());
    assert_eq!(handle.assignments_on("p2", None).await.expect("p2").len(), 1);
}

#[rstest]
#[case::short_rest("18:00", "22:00", AlertLevel::Orange)]
#[case::overnight_rest("23:00", "01:00", AlertLevel::Yellow)]
#[tokio::test(start_paused = true)]
async fn alert_level_reflects_loaded_roster(
    #[case] late_start: &str,
    #[case] late_end: &str,
    #[case] expected: AlertLevel,
) {
    let store = store_with(
        date(10),
        gate(vec![
            record("day", "06:00", "14:00", &["p1"]),
            record("late", late_start, late_end, &["p1"]),
        ]),
    );
    let handle = loaded(&store).await;

    assert_eq!(handle.alert_level("p1").await.expect("level"), expected);
    let levels = handle.alert_levels().await.expect("levels");
    assert_eq!(levels.get(&PersonId::from("p1")), Some(&expected));
    assert_eq!(
        handle.assignments_in_range("p1", date(7), date(10)).await.expect("range").len(),
        2
    );
}
