use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn config_with_store(dir: &Path) -> PathBuf {
    let image = dir.join("eeprom.bin");
    let toml = format!(
        "[storage]\npath = \"{}\"\naddress = 3\npage_size = 64\ncapacity = 256\n",
        image.display().to_string().replace('\\', "/")
    );
    let path = dir.join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn udm(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("udm_cli").unwrap();
    cmd.env_remove("RUST_LOG").arg("--config").arg(cfg);
    cmd
}

#[test]
fn blank_image_reads_the_default() {
    let dir = tempdir().unwrap();
    let cfg = config_with_store(dir.path());
    udm(&cfg)
        .arg("threshold")
        .assert()
        .success()
        .stdout(predicate::str::contains("threshold: 35 cm"));
}

#[test]
fn set_then_show_round_trips_through_the_image() {
    let dir = tempdir().unwrap();
    let cfg = config_with_store(dir.path());

    udm(&cfg)
        .args(["threshold", "--set", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("threshold set to 42 cm (Programmed)"));
    udm(&cfg)
        .args(["threshold", "--set", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(Unchanged)"));
    udm(&cfg)
        .arg("threshold")
        .assert()
        .success()
        .stdout(predicate::str::contains("threshold: 42 cm"));

    let image = fs::read(dir.path().join("eeprom.bin")).unwrap();
    assert_eq!(image.len(), 256);
    assert_eq!(image[3], 42);
    assert!(image.iter().enumerate().all(|(i, b)| i == 3 || *b == 0xFF));
}

#[test]
fn button_changes_in_simulation_are_persisted() {
    let dir = tempdir().unwrap();
    let cfg = config_with_store(dir.path());

    udm(&cfg)
        .args(["threshold", "--set", "42"])
        .assert()
        .success();
    // 42 ticks of PLUS step once; the save lands after the alarm view times out.
    udm(&cfg)
        .args(["simulate", "--ticks", "700", "--press", "plus@1..43"])
        .assert()
        .success()
        .stdout(predicate::str::contains("threshold: 43 cm"))
        .stdout(predicate::str::contains("state: Normal"));
    udm(&cfg)
        .arg("threshold")
        .assert()
        .success()
        .stdout(predicate::str::contains("threshold: 43 cm"));
}

#[test]
fn json_mode_reports_results_and_errors_on_stdout() {
    let dir = tempdir().unwrap();
    let cfg = config_with_store(dir.path());

    let out = udm(&cfg)
        .args(["--json", "threshold", "--set", "12"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["threshold_cm"], 12);
    assert_eq!(v["outcome"], "Programmed");

    let out = udm(&cfg)
        .args(["--json", "simulate", "--ticks", "300", "--object-cm", "100"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["distance"]["meters"], 1);
    assert_eq!(v["distance"]["centimeters"], 0);
    assert_eq!(v["threshold_cm"], 12);
    assert_eq!(v["triggers"], 4);

    let nostore = dir.path().join("plain.toml");
    fs::write(&nostore, "").unwrap();
    let out = udm(&nostore)
        .args(["--json", "threshold"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["reason"], "Config");
    assert_eq!(v["code"], 2);
    assert!(v["message"].as_str().unwrap().contains("storage.path"));
}

#[test]
fn unwritable_image_is_a_storage_error() {
    let dir = tempdir().unwrap();
    // A directory where the image file should be cannot be opened as a file.
    let image = dir.path().join("eeprom.bin");
    fs::create_dir(&image).unwrap();
    let cfg = config_with_store(dir.path());

    udm(&cfg)
        .arg("threshold")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("threshold store failed"));
}
