// SPDX-License-Identifier: MIT

//! End-to-end tests of the parcalc binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

/// Get a command for the parcalc binary, running in `dir`.
fn parcalc(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("parcalc").unwrap();
    cmd.current_dir(dir).env("RUST_LOG", "info");
    cmd
}

#[test]
fn default_paths_process_backend() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("data.txt"), "2\n1 3+4\n2 10/2\n1 5*6\n").unwrap();

    parcalc(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("worker 1 created"))
        .stderr(predicate::str::contains("sending job #2 to worker 1"));

    assert_eq!(
        fs::read_to_string(tmp.path().join("results.txt")).unwrap(),
        "7.000000\n5.000000\n30.000000\n"
    );
}

#[test]
fn thread_backend_with_explicit_paths() {
    let tmp = tempdir().unwrap();
    let config = tmp.path().join("jobs.conf");
    let output = tmp.path().join("out.txt");
    fs::write(&config, "1\n0 2-9\n0 5--3\n").unwrap();

    parcalc(tmp.path())
        .args(["--backend", "thread", "--config"])
        .arg(&config)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("any-worker job #0 activated worker 1"));

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "-7.000000\n8.000000\n"
    );
}

#[test]
fn division_by_zero_is_written_as_special_values() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("data.txt"), "2\n1 1/0\n2 -1/0\n0 0/0\n").unwrap();

    parcalc(tmp.path()).assert().success();

    assert_eq!(
        fs::read_to_string(tmp.path().join("results.txt")).unwrap(),
        "inf\n-inf\nnan\n"
    );
}

#[test]
fn out_of_range_id_is_a_config_error() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("data.txt"), "2\n1 1+1\n3 1+1\n").unwrap();

    parcalc(tmp.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Error in config - data.txt line 3: worker id 3 out of range (0..=2)",
        ));

    assert!(!tmp.path().join("results.txt").exists());
}

#[test]
fn missing_configuration_is_an_io_error() {
    let tmp = tempdir().unwrap();

    parcalc(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error in io - data.txt:"));
}

#[test]
fn empty_configuration_does_nothing() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("data.txt"), "").unwrap();

    parcalc(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("nothing to do"));

    assert!(!tmp.path().join("results.txt").exists());
}

#[test]
fn key_file_with_thread_backend_is_rejected() {
    let tmp = tempdir().unwrap();

    parcalc(tmp.path())
        .args(["--backend", "thread", "--ipc-key-file", "data.txt"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--ipc-key-file may only be used"));
}

#[test]
fn key_file_derived_ipc_objects() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("data.txt"), "3\n3 2*21\n0 1+1\n").unwrap();
    fs::write(tmp.path().join("parcalc.key"), "").unwrap();

    parcalc(tmp.path())
        .args(["--ipc-key-file", "parcalc.key"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(tmp.path().join("results.txt")).unwrap(),
        "42.000000\n2.000000\n"
    );
}
