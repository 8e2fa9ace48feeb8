//! Integration tests for the pillbox binary.
//!
//! These tests verify end-to-end behavior including:
//! - Regimen registration and validation
//! - Today's timeline and taking doses
//! - Adherence history and CSV export
//! - Recovery from corrupted data

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("pillbox"))
}

fn add(data_dir: &Path, name: &str, every: &str, start: &str, days: &str) -> assert_cmd::assert::Assert {
    cli()
        .arg("add")
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--name", name, "--dose", "500mg", "--every", every])
        .args(["--start", start, "--days", days])
        .assert()
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
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Medication schedule and dose reminder"));
}

#[test]
fn test_add_persists_regimen() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Amoxicillin", "8", "08:00", "3")
        .success()
        .stdout(predicate::str::contains("Amoxicillin scheduled"));

    let store = fs::read_to_string(data_dir.join("regimens.json")).expect("store written");
    let regimens: Vec<serde_json::Value> = serde_json::from_str(&store).unwrap();
    assert_eq!(regimens.len(), 1);
    assert_eq!(regimens[0]["freqHours"], 8);
    assert_eq!(regimens[0]["startTime"], "08:00");
    assert_eq!(regimens[0]["durationDays"], 3);
    assert!(regimens[0]["takenLog"].as_array().unwrap().is_empty());
}

#[test]
fn test_every_eight_hours_timeline() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Amoxicillin", "8", "08:00", "3").success();

    let schedule = today_json(data_dir);
    let times: Vec<_> = schedule
        .iter()
        .map(|d| d["time_string"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(times, vec!["00:00", "08:00", "16:00"]);
    assert!(schedule.iter().all(|d| d["is_taken"] == false));
}

#[test]
fn test_zero_frequency_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Broken", "0", "08:00", "3")
        .failure()
        .stderr(predicate::str::contains("frequency must be at least 1 hour"));

    assert!(!data_dir.join("regimens.json").exists());
}

#[test]
fn test_unparseable_duration_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Broken", "12", "08:00", "forever")
        .failure()
        .stderr(predicate::str::contains("duration must be a whole number of days"));

    add(data_dir, "Broken", "12", "25:00", "3")
        .failure()
        .stderr(predicate::str::contains("Invalid regimen"));
}

#[test]
fn test_take_marks_dose_and_is_idempotent() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Ibuprofen", "12", "09:00", "5").success();
    let schedule = today_json(data_dir);
    let instance_id = schedule[0]["instance_id"].as_str().unwrap().to_string();

    cli()
        .arg("take")
        .arg(&instance_id)
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("marked as taken"));

    cli()
        .arg("take")
        .arg(&instance_id)
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("already taken"));

    let schedule = today_json(data_dir);
    assert_eq!(schedule[0]["is_taken"], true);
    assert_eq!(schedule[1]["is_taken"], false);

    let store = fs::read_to_string(data_dir.join("regimens.json")).unwrap();
    assert_eq!(store.matches(instance_id.as_str()).count(), 1);
}

#[test]
fn test_take_unknown_dose_is_not_an_error() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("take")
        .arg("nope-Mon Jan 01 2024-08:00")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("nothing recorded"));
}

#[test]
fn test_default_command_shows_timeline() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No doses scheduled for today"));

    add(data_dir, "Vitamin D", "24", "10:30", "30").success();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("10:30"))
        .stdout(predicate::str::contains("Vitamin D"));
}

#[test]
fn test_history_reports_taken_doses() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Metformin", "12", "08:00", "30").success();
    let schedule = today_json(data_dir);
    cli()
        .arg("take")
        .arg(schedule[0]["instance_id"].as_str().unwrap())
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success();

    let output = cli()
        .arg("history")
        .arg("--json")
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();

    assert_eq!(report["stats"]["scheduled"], 2);
    assert_eq!(report["stats"]["taken"], 1);
    let days = report["by_regimen"][0]["days"].as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["doses"][0]["status"], "taken");

    cli()
        .arg("history")
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Metformin"))
        .stdout(predicate::str::contains("1/2 taken"));
}

#[test]
fn test_history_csv_export() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let csv_path = data_dir.join("export").join("adherence.csv");

    add(data_dir, "Vitamin D", "24", "10:30", "30").success();

    cli()
        .arg("history")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--csv")
        .arg(&csv_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("Exported 1 doses"));

    let csv = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "date,time,regimen_id,name,dose,status");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains(",10:30,"));
    assert!(lines[1].contains("Vitamin D"));
}

#[test]
fn test_empty_history() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("history")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No doses scheduled in the last 7 days"));

    cli()
        .arg("history")
        .arg("--days")
        .arg("0")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .failure();
}

#[test]
fn test_corrupted_store_starts_empty() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    fs::write(data_dir.join("regimens.json"), "{ invalid json }}}}").unwrap();

    cli()
        .arg("today")
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No doses scheduled"));

    add(data_dir, "Aspirin", "24", "07:00", "10").success();
    assert_eq!(today_json(data_dir).len(), 1);

    let set_aside = fs::read_to_string(data_dir.join("regimens.json.corrupt")).unwrap();
    assert_eq!(set_aside, "{ invalid json }}}}");
}

#[test]
fn test_bad_record_does_not_cost_valid_regimens() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let start_date = chrono::Local::now().to_rfc3339();
    let store = format!(
        r#"[{{"id":"good","name":"Good","dose":"1","freqHours":24,"startTime":"08:00","durationDays":3,"startDate":"{0}","takenLog":["kept"]}},
            {{"id":"bad","name":"Bad","dose":"1","freqHours":-1,"startTime":"08:00","durationDays":3,"startDate":"{0}","takenLog":[]}}]"#,
        start_date
    );
    fs::write(data_dir.join("regimens.json"), store).unwrap();

    let schedule = today_json(data_dir);
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0]["regimen_id"], "good");

    add(data_dir, "New", "24", "09:00", "3").success();

    let stored = fs::read_to_string(data_dir.join("regimens.json")).unwrap();
    let regimens: Vec<serde_json::Value> = serde_json::from_str(&stored).unwrap();
    let ids: Vec<_> = regimens.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], "good");
    assert_eq!(ids[2], "bad");
    assert_eq!(regimens[0]["takenLog"][0], "kept");
    assert_eq!(regimens[2]["freqHours"], -1);
}

#[test]
fn test_hand_edited_zero_frequency_is_ignored() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let start_date = chrono::Local::now().to_rfc3339();
    let store = format!(
        r#"[{{"id":"1","name":"Bad","dose":"1","freqHours":0,"startTime":"08:00","durationDays":3,"startDate":"{0}","takenLog":[]}},
            {{"id":"2","name":"Good","dose":"1","freqHours":24,"startTime":"08:00","durationDays":3,"startDate":"{0}","takenLog":[]}}]"#,
        start_date
    );
    fs::write(data_dir.join("regimens.json"), store).unwrap();

    let schedule = today_json(data_dir);
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0]["regimen_id"], "2");

    add(data_dir, "Added", "24", "09:00", "3").success();
    let stored = fs::read_to_string(data_dir.join("regimens.json")).unwrap();
    assert!(stored.contains(r#""name":"Bad""#));
    assert_eq!(today_json(data_dir).len(), 2);
}

#[test]
fn test_watch_stops_after_requested_ticks() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add(data_dir, "Omeprazole", "24", "06:00", "14").success();

    cli()
        .arg("watch")
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--ticks", "2", "--interval-secs", "1"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Watching for due doses"))
        .stdout(predicate::str::contains("Omeprazole"));
}

#[test]
fn test_watch_rejects_zero_interval() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("watch")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .args(["--ticks", "1", "--interval-secs", "0"])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .failure();
}
