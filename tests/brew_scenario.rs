// Drives the sync engine against a scripted stand-in for `brew`.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use brew_services_tui::app::brew::BrewCli;
use brew_services_tui::app::engine::{EngineHandle, SyncEngine};
use brew_services_tui::app::model::{Availability, ServiceStatus, Snapshot};
use brew_services_tui::app::observer::EngineEvent;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// A fake `brew` that keeps each service's state in `<dir>/state/<name>`.
/// Listing fails while `<dir>/fail-list` exists.
const FAKE_BREW: &str = r#"#!/bin/sh
dir="$(dirname "$0")/state"

set_state() {
  if [ "$1" = "--all" ]; then
    for f in "$dir"/*; do
      if [ -e "$f" ]; then echo "$2" > "$f"; fi
    done
  else
    [ -e "$dir/$1" ] || exit 1
    echo "$2" > "$dir/$1"
  fi
}

[ "$1" = "services" ] || exit 64
case "$2" in
  list)
    [ -e "$(dirname "$0")/fail-list" ] && exit 7
    echo "NAME STATUS USER"
    for f in "$dir"/*; do
      if [ -e "$f" ]; then echo "$(basename "$f") $(cat "$f")"; fi
    done
    ;;
  start|restart) set_state "$3" started ;;
  stop) set_state "$3" stopped ;;
  *) exit 64 ;;
esac
exit 0
"#;

fn install_fake_brew(services: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state");
    std::fs::create_dir(&state).unwrap();
    for (name, status) in services {
        std::fs::write(state.join(name), format!("{status}\n")).unwrap();
    }

    let brew = dir.path().join("brew");
    std::fs::write(&brew, FAKE_BREW).unwrap();
    std::fs::set_permissions(&brew, std::fs::Permissions::from_mode(0o755)).unwrap();
    (dir, brew)
}

async fn run_engine(brew: &Path, f: impl FnOnce(&EngineHandle)) -> Vec<EngineEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (handle, task) = SyncEngine::new(BrewCli::new(brew), tx, "alice").spawn();
    f(&handle);
    drop(handle);
    task.await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn snapshots(events: &[EngineEvent]) -> Vec<Snapshot> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Snapshot(s) => Some(s.clone()),
            EngineEvent::Notice(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn test_list_then_start() {
    let (_dir, brew) = install_fake_brew(&[("nginx", "started"), ("redis", "stopped")]);

    let events = run_engine(&brew, |engine| {
        engine.refresh();
        engine.start("redis");
    })
    .await;
    let snapshots = snapshots(&events);

    assert_eq!(snapshots.len(), 4);
    let listed = &snapshots[1];
    assert!(!listed.loading);
    assert_eq!(listed.find("nginx").map(|s| s.status), Some(ServiceStatus::Running));
    assert_eq!(listed.find("redis").map(|s| s.status), Some(ServiceStatus::Stopped));

    assert!(snapshots[2].loading);
    assert_eq!(snapshots[2].label.as_deref(), Some("Starting redis..."));

    let after = &snapshots[3];
    assert!(!after.loading);
    assert_eq!(after.find("redis").map(|s| s.status), Some(ServiceStatus::Running));
}

#[tokio::test]
async fn test_rejected_command_reports_notice_and_relists() {
    let (_dir, brew) = install_fake_brew(&[("redis", "stopped")]);

    let events = run_engine(&brew, |engine| {
        engine.refresh();
        engine.start("postgresql");
    })
    .await;

    let notices: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Notice(n) => Some(n.title.clone()),
            EngineEvent::Snapshot(_) => None,
        })
        .collect();
    assert_eq!(notices, vec!["Could not start postgresql".to_string()]);

    let snapshots = snapshots(&events);
    let last = snapshots.last().unwrap();
    assert!(!last.loading);
    assert_eq!(last.services.len(), 1);
}

#[tokio::test]
async fn test_failed_listing_keeps_last_snapshot() {
    let (dir, brew) = install_fake_brew(&[("redis", "stopped")]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (handle, task) = SyncEngine::new(BrewCli::new(&brew), tx, "alice").spawn();
    handle.refresh();
    let before = loop {
        match rx.recv().await {
            Some(EngineEvent::Snapshot(s)) if !s.loading => break s,
            Some(_) => continue,
            None => panic!("engine stopped early"),
        }
    };

    std::fs::write(dir.path().join("fail-list"), "").unwrap();
    handle.start("redis");
    drop(handle);
    task.await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let notices: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Notice(n) => Some(n.title.clone()),
            EngineEvent::Snapshot(_) => None,
        })
        .collect();
    assert_eq!(notices, vec!["Could not list services".to_string()]);

    let snapshots = snapshots(&events);
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].label.as_deref(), Some("Starting redis..."));
    assert_eq!(snapshots[1], before);
}

#[tokio::test]
async fn test_stop_all() {
    let (_dir, brew) = install_fake_brew(&[("nginx", "started"), ("redis", "started")]);

    let events = run_engine(&brew, |engine| {
        engine.refresh();
        engine.stop_all();
    })
    .await;

    let snapshots = snapshots(&events);
    assert_eq!(snapshots[2].label.as_deref(), Some("Stopping all..."));
    let last = snapshots.last().unwrap();
    assert_eq!(last.services.len(), 2);
    assert!(last.services.iter().all(|s| s.status == ServiceStatus::Stopped));
}

#[tokio::test]
async fn test_missing_brew_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("brew");

    let events = run_engine(&missing, |engine| engine.refresh()).await;
    let snapshots = snapshots(&events);

    assert_eq!(snapshots.len(), 2);
    assert_eq!(
        snapshots[1].availability,
        Availability::Unavailable { path: missing }
    );
    assert!(snapshots[1].services.is_empty());
}
