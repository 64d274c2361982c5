//! Tests for the `pupil-tracker` command line

use pupil_led_tracker::config::DetectorParams;
use std::process::Command;

fn pupil_tracker() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pupil-tracker"))
}

#[test]
fn test_help_lists_options() {
    let output = pupil_tracker().arg("--help").output().unwrap();
    assert!(output.status.success());

    let help = String::from_utf8_lossy(&output.stdout);
    for flag in ["--config", "--overwrite", "--continuity", "--no-video", "--debug", "--write-default-config"] {
        assert!(help.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn test_input_is_required() {
    let output = pupil_tracker().output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_unknown_continuity_rejected() {
    let output = pupil_tracker()
        .args(["movie.avi", "--continuity", "sometimes"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("sometimes"));
}

#[test]
fn test_missing_movie_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = pupil_tracker()
        .arg(dir.path().join("missing.avi"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!dir.path().join("missing_output_data.yml").exists());
}

#[test]
fn test_write_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.yml");

    let status = pupil_tracker()
        .arg("--write-default-config")
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(DetectorParams::from_file(&path).unwrap(), DetectorParams::default());
}
