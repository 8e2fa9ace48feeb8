//! Concurrency tests for the pillbox binary.
//!
//! These tests verify that multiple processes can safely:
//! - Register regimens at the same time without losing any
//! - Read the store while another process rewrites it
//! - Share the store with a long-running front end that keeps it open

use assert_cmd::Command;
use pillbox_core::{Regimen, RegimenDraft, RegimenStore};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("pillbox"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn add(data_dir: &Path, name: &str) {
    cli()
        .arg("add")
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--name", name, "--dose", "1 tablet", "--every", "12"])
        .args(["--start", "08:00", "--days", "7"])
        .assert()
        .success();
}

fn today_json(data_dir: &Path) -> Vec<serde_json::Value> {
    let output = cli()
        .arg("today")
        .arg("--json")
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("today --json should print a JSON array")
}

#[test]
fn test_sequential_registrations_are_all_kept() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    for i in 0..5 {
        thread::sleep(Duration::from_millis(i * 5));
        add(&data_dir, &format!("Med {}", i));
    }

    let store = std::fs::read_to_string(data_dir.join("regimens.json")).expect("store written");
    let regimens: Vec<serde_json::Value> = serde_json::from_str(&store).unwrap();
    assert_eq!(regimens.len(), 5, "Expected 5 regimens, got {}", regimens.len());

    // Two doses a day for each regimen
    assert_eq!(today_json(&data_dir).len(), 10);
}

#[test]
fn test_readers_never_see_a_torn_store() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    add(&data_dir, "Seed");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                for _ in 0..3 {
                    let schedule = today_json(&data_dir);
                    assert!(!schedule.is_empty(), "Reader saw an empty schedule");
                }
            })
        })
        .collect();

    for i in 0..3 {
        add(&data_dir, &format!("Writer {}", i));
    }

    for reader in readers {
        reader.join().expect("Reader thread panicked");
    }

    assert_eq!(today_json(&data_dir).len(), 8);
}

#[test]
fn test_parallel_registrations_are_all_kept() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let writers: Vec<_> = (0..6)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || add(&data_dir, &format!("Parallel {}", i)))
        })
        .collect();
    for writer in writers {
        writer.join().expect("Writer thread panicked");
    }

    let store = std::fs::read_to_string(data_dir.join("regimens.json")).expect("store written");
    let regimens: Vec<serde_json::Value> = serde_json::from_str(&store).unwrap();
    assert_eq!(regimens.len(), 6, "Expected 6 regimens, got {}", regimens.len());
}

#[test]
fn test_open_desktop_store_does_not_erase_cli_changes() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let store_path = data_dir.join("regimens.json");

    // Opened once and kept, the way the tray holds it for a whole session
    let mut desktop = RegimenStore::open_file(&store_path);

    add(&data_dir, "From CLI");
    let instance_id = today_json(&data_dir)[0]["instance_id"]
        .as_str()
        .unwrap()
        .to_string();
    cli()
        .arg("take")
        .arg(&instance_id)
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    let draft = RegimenDraft {
        name: "From desktop".into(),
        dose: "1 tablet".into(),
        freq_hours: "24".into(),
        start_time: "09:00".into(),
        duration_days: "7".into(),
    };
    desktop.push(Regimen::from_draft(&draft, chrono::Local::now()).unwrap());

    let names: Vec<_> = desktop.regimens().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["From CLI", "From desktop"]);

    let schedule = today_json(&data_dir);
    assert_eq!(schedule.len(), 3);
    assert!(schedule
        .iter()
        .any(|d| d["instance_id"] == instance_id.as_str() && d["is_taken"] == true));
}
