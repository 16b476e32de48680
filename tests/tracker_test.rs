// Integration tests for InstanceTracker over on-disk storage
//
// Every test drives time through a ManualClock; "local" below means the
// default schedule zone (UTC-03:00).

use chrono::{DateTime, Duration, TimeZone, Utc};
use respawn::action::ActionKind;
use respawn::catalog::EntityCatalog;
use respawn::clock::ManualClock;
use respawn::config::TrackerConfig;
use respawn::state::EntityState;
use respawn::store::DocumentStore;
use respawn::tracker::InstanceTracker;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn config_for(dir: &Path, instance: &str) -> TrackerConfig {
    let mut config = TrackerConfig::default();
    config.storage.directory = dir.to_path_buf();
    config.instance.id = instance.to_string();
    config
}

fn open(dir: &Path, instance: &str, clock: &Arc<ManualClock>) -> InstanceTracker {
    InstanceTracker::open(
        &config_for(dir, instance),
        EntityCatalog::builtin(),
        clock.clone(),
    )
    .unwrap()
}

// ── Reconciliation on open ───────────────────────────────────────────────────

#[test]
fn test_first_open_writes_complete_document() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(utc(2025, 6, 10, 9, 0)));
    let mut tracker = open(temp_dir.path(), "pico7f", &clock);

    let stored = DocumentStore::new(&temp_dir.path().join("instances"))
        .unwrap()
        .load("pico7f")
        .unwrap();
    assert_eq!(stored.len(), 10);
    assert_eq!(&stored, tracker.states());

    // Nothing left to repair
    assert_eq!(tracker.reload().unwrap(), 0);
}

#[test]
fn test_exact_mark_is_stable_then_advances() {
    let temp_dir = TempDir::new().unwrap();
    // 06:00 local; Red Norte next at 10:00 local (13:00 UTC)
    let clock = Arc::new(ManualClock::new(utc(2025, 6, 10, 9, 0)));
    let mut tracker = open(temp_dir.path(), "pico7f", &clock);

    clock.set(utc(2025, 6, 10, 13, 0));
    assert_eq!(tracker.reload().unwrap(), 0);
    assert_eq!(
        tracker.state("red-boss-1").unwrap().next_spawn_time,
        Some(utc(2025, 6, 10, 13, 0))
    );

    clock.set(utc(2025, 6, 10, 13, 0) + Duration::seconds(1));
    assert_eq!(tracker.reload().unwrap(), 1);
    assert_eq!(
        tracker.state("red-boss-1").unwrap().next_spawn_time,
        Some(utc(2025, 6, 10, 19, 0))
    );
}

#[test]
fn test_fixed_schedule_rolls_over_month_end() {
    let temp_dir = TempDir::new().unwrap();
    // 2025-06-30 22:30 local
    let clock = Arc::new(ManualClock::new(utc(2025, 7, 1, 1, 30)));
    let tracker = open(temp_dir.path(), "pico7f", &clock);

    // Red Sul: 01:00 local on July 1st
    assert_eq!(
        tracker.state("red-boss-2").unwrap().next_spawn_time,
        Some(utc(2025, 7, 1, 4, 0))
    );
    // Red Norte: 04:00 local on July 1st
    assert_eq!(
        tracker.state("red-boss-1").unwrap().next_spawn_time,
        Some(utc(2025, 7, 1, 7, 0))
    );
}

#[test]
fn test_legacy_document_with_stale_entries() {
    let temp_dir = TempDir::new().unwrap();
    let instances = temp_dir.path().join("instances");
    fs::create_dir_all(&instances).unwrap();

    let last_kill = utc(2025, 6, 10, 8, 50).timestamp_millis();
    let legacy = format!(
        r#"{{
            "cyan-boss-1": {{"lastActionTime": {last}, "nextSpawnTime": {next}}},
            "red-boss-1": {{"lastActionTime": null, "nextSpawnTime": {past}}},
            "retired-boss": {{"lastActionTime": null, "nextSpawnTime": null}},
            "cyan-boss-2": "garbage"
        }}"#,
        last = last_kill,
        next = last_kill + 30 * 60 * 1000,
        past = utc(2025, 6, 9, 13, 0).timestamp_millis(),
    );
    fs::write(instances.join("pico7f.json"), legacy).unwrap();

    let clock = Arc::new(ManualClock::new(utc(2025, 6, 10, 9, 0)));
    let tracker = open(temp_dir.path(), "pico7f", &clock);

    // Delay-based entry kept as stored
    let cyan = tracker.state("cyan-boss-1").unwrap();
    assert_eq!(cyan.last_action_time, Some(utc(2025, 6, 10, 8, 50)));
    assert_eq!(cyan.next_spawn_time, Some(utc(2025, 6, 10, 9, 20)));

    // Elapsed fixed entry recomputed
    assert_eq!(
        tracker.state("red-boss-1").unwrap().next_spawn_time,
        Some(utc(2025, 6, 10, 13, 0))
    );

    // Malformed entry re-synthesized, unknown id dropped
    assert_eq!(tracker.state("cyan-boss-2"), Some(&EntityState::default()));
    assert!(tracker.state("retired-boss").is_none());
    assert_eq!(tracker.states().len(), 10);

    // Migrated to the compressed document
    assert!(!instances.join("pico7f.json").exists());
    assert!(instances.join("pico7f.json.gz").exists());
}

// ── Actions across sessions and instances ────────────────────────────────────

#[test]
fn test_concurrent_sessions_keep_each_others_updates() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(utc(2025, 6, 10, 9, 0)));
    let mut alice = open(temp_dir.path(), "pico7f", &clock);
    let mut bob = open(temp_dir.path(), "pico7f", &clock);

    alice.act("cyan-boss-1", Some("Alice")).unwrap();
    clock.advance(Duration::minutes(1));
    bob.act("yellow-boss-1", Some("Bob")).unwrap();

    // Bob's write re-read the document, so Alice's kill survived it
    bob.reload().unwrap();
    assert_eq!(
        bob.state("cyan-boss-1").unwrap().next_spawn_time,
        Some(utc(2025, 6, 10, 9, 30))
    );

    alice.reload().unwrap();
    assert_eq!(
        alice.state("yellow-boss-1").unwrap().next_spawn_time,
        Some(utc(2025, 6, 10, 10, 1))
    );

    let log: Vec<String> = alice
        .recent_actions(10)
        .unwrap()
        .into_iter()
        .map(|record| record.actor_name)
        .collect();
    assert_eq!(log, vec!["Bob".to_string(), "Alice".to_string()]);
}

#[test]
fn test_instances_are_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(utc(2025, 6, 10, 9, 0)));
    let mut first = open(temp_dir.path(), "pico7f", &clock);
    let mut second = open(temp_dir.path(), "pico8f", &clock);

    first.act("resource-ore", Some("Alice")).unwrap();
    second.reload().unwrap();

    assert_eq!(second.state("resource-ore"), Some(&EntityState::default()));
    assert!(second.recent_actions(10).unwrap().is_empty());

    let records = first.recent_actions(10).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action_kind, ActionKind::Collect);
    assert_eq!(records[0].instance_id, "pico7f");
}

#[test]
fn test_out_of_turn_kill_restarts_timer() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(utc(2025, 6, 10, 9, 0)));
    let mut tracker = open(temp_dir.path(), "pico7f", &clock);

    tracker.act("cyan-boss-3", None).unwrap();
    let now = clock.advance(Duration::minutes(10));
    let availability = tracker.state("cyan-boss-3").unwrap().availability(now);
    assert!(!availability.is_eligible_now);
    assert_eq!(availability.time_remaining, Duration::minutes(20));

    // Still on cooldown, but the kill is accepted and the timer restarts
    tracker.act("cyan-boss-3", None).unwrap();
    assert_eq!(
        tracker.state("cyan-boss-3").unwrap().next_spawn_time,
        Some(now + Duration::minutes(30))
    );
    assert_eq!(tracker.recent_actions(10).unwrap().len(), 2);
}

#[test]
fn test_fixed_schedule_kill_keeps_clock() {
    let temp_dir = TempDir::new().unwrap();
    // 10:05 local, just after Red Norte's 10:00 spawn
    let clock = Arc::new(ManualClock::new(utc(2025, 6, 10, 13, 5)));
    let mut tracker = open(temp_dir.path(), "pico7f", &clock);

    let record = tracker.act("red-boss-1", Some("Alice")).unwrap();
    assert_eq!(record.action_kind, ActionKind::Kill);

    let state = tracker.state("red-boss-1").unwrap();
    assert_eq!(state.last_action_time, Some(utc(2025, 6, 10, 13, 5)));
    assert_eq!(state.next_spawn_time, Some(utc(2025, 6, 10, 19, 0)));
}

#[test]
fn test_state_and_log_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(utc(2025, 6, 10, 9, 0)));
    {
        let mut tracker = open(temp_dir.path(), "pico7f", &clock);
        tracker.set_nickname("Alice").unwrap();
        tracker.act("yellow-boss-2", None).unwrap();
        tracker.reserve().unwrap();
    }

    clock.advance(Duration::minutes(5));
    let mut tracker = open(temp_dir.path(), "pico7f", &clock);
    assert_eq!(tracker.nickname(), Some("Alice"));
    assert_eq!(
        tracker.state("yellow-boss-2").unwrap().next_spawn_time,
        Some(utc(2025, 6, 10, 10, 0))
    );
    assert_eq!(tracker.recent_actions(10).unwrap()[0].actor_name, "Alice");

    match tracker.reservation_status().unwrap() {
        respawn::reservation::ReservationStatus::Active {
            holder_name,
            remaining,
        } => {
            assert_eq!(holder_name, "Alice");
            assert_eq!(remaining, Duration::minutes(25));
        }
        other => panic!("expected active reservation, got {:?}", other),
    }
}
