mod common;

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use ndarray::{Array1, Array3};
use ndarray_npy::write_npy;
use predicates::prelude::*;
use tempfile::TempDir;

fn cortexpack() -> Command {
    let mut cmd = Command::cargo_bin("cortexpack").unwrap();
    cmd.env_remove("CORTEXPACK_FILESTORE").env_remove("RUST_LOG");
    cmd
}

/// A scratch directory with `.npy` arrays and a manifest that uses them.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_npy(
        dir.path().join("anat.npy"),
        &Array3::<f32>::from_elem(common::VOLUME_SHAPE, 1.0),
    )
    .unwrap();
    write_npy(
        dir.path().join("thick.npy"),
        &Array1::<f32>::from_elem(common::VERTICES, 2.0),
    )
    .unwrap();
    write_npy(
        dir.path().join("masked.npy"),
        &Array1::<f32>::from_elem(common::MASKED_VOXELS, 3.0),
    )
    .unwrap();
    fs::write(
        dir.path().join("manifest.json"),
        r#"{"views": {
            "anatomy": {"volume": "anat.npy", "subject": "S1", "xfm": "fullhead", "cmap": "gray"},
            "thickness": {"vertex": "thick.npy", "subject": "S1", "priority": 1},
            "masked": {"volume": "masked.npy", "subject": "S1", "xfm": "fullhead", "mask": "thick"}
        }}"#,
    )
    .unwrap();
    dir
}

fn build(dir: &Path, output: &str) -> PathBuf {
    let out = dir.join(output);
    cortexpack()
        .arg("build")
        .arg(dir.join("manifest.json"))
        .arg("-o")
        .arg(&out)
        .assert()
        .success();
    out
}

fn inspect_json(path: &Path) -> serde_json::Value {
    let output = cortexpack()
        .arg("inspect")
        .arg(path)
        .args(["--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn runs() {
    cortexpack()
        .assert()
        .success()
        .stdout(predicate::str::starts_with("cortexpack "));
}

#[test]
fn outputs_tool_name() {
    cortexpack()
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("cortexpack "));
}

// Build subcommand tests

#[test]
fn build_writes_package() {
    let dir = workspace();
    let out = dir.path().join("out.cpk");
    cortexpack()
        .arg("build")
        .arg(dir.path().join("manifest.json"))
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Built 3 view(s) (3 unique data)"));
    assert!(out.exists());
}

#[test]
fn build_pack_needs_filestore() {
    let dir = workspace();
    cortexpack()
        .arg("build")
        .arg(dir.path().join("manifest.json"))
        .arg("-o")
        .arg(dir.path().join("out.cpk"))
        .arg("--pack")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--filestore"));
}

#[test]
fn build_pack_makes_package_self_contained() {
    let dir = workspace();
    let store = common::filestore();
    let out = dir.path().join("packed.cpk");
    cortexpack()
        .arg("--filestore")
        .arg(store.path())
        .arg("build")
        .arg(dir.path().join("manifest.json"))
        .arg("-o")
        .arg(&out)
        .arg("--pack")
        .assert()
        .success();

    cortexpack()
        .arg("validate")
        .arg(&out)
        .arg("--strict")
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation passed"));
}

#[test]
fn build_reports_bad_manifest() {
    let dir = workspace();
    fs::write(
        dir.path().join("manifest.json"),
        r#"{"views": {"v": {"volume": "anat.npy", "subject": "S1"}}}"#,
    )
    .unwrap();
    cortexpack()
        .arg("build")
        .arg(dir.path().join("manifest.json"))
        .arg("-o")
        .arg(dir.path().join("out.cpk"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid manifest"));
}

// Pack subcommand tests

#[test]
fn pack_in_place_with_env_filestore() {
    let dir = workspace();
    let store = common::filestore();
    let out = build(dir.path(), "out.cpk");

    cortexpack()
        .arg("validate")
        .arg(&out)
        .arg("--strict")
        .assert()
        .failure()
        .stdout(predicate::str::contains("UnpackedSubject"));

    cortexpack()
        .env("CORTEXPACK_FILESTORE", store.path())
        .arg("pack")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Packed 3 view(s)"));

    cortexpack()
        .arg("validate")
        .arg(&out)
        .arg("--strict")
        .assert()
        .success();
}

#[test]
fn pack_reports_missing_subject() {
    let dir = workspace();
    let store = TempDir::new().unwrap();
    let out = build(dir.path(), "out.cpk");

    cortexpack()
        .arg("--filestore")
        .arg(store.path())
        .arg("pack")
        .arg(&out)
        .arg("-o")
        .arg(dir.path().join("packed.cpk"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot pack"));
    assert!(!dir.path().join("packed.cpk").exists());
}

// Merge subcommand tests

#[test]
fn merge_with_prefixes() {
    let dir = workspace();
    let first = build(dir.path(), "first.cpk");
    let second = build(dir.path(), "second.cpk");
    let out = dir.path().join("merged.cpk");

    cortexpack()
        .arg("merge")
        .arg(&first)
        .arg(&second)
        .arg("-o")
        .arg(&out)
        .args(["--prefix", "a_", "--prefix", "b_"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 6 view(s) (3 unique data)"));

    let report = inspect_json(&out);
    assert_eq!(report["summary"]["views"], 6);
    assert_eq!(report["summary"]["unique_data"], 3);
    assert_eq!(report["views"][0]["name"], "a_thickness");
}

#[test]
fn merge_later_inputs_win() {
    let dir = workspace();
    let first = build(dir.path(), "first.cpk");
    let second = build(dir.path(), "second.cpk");
    let out = dir.path().join("merged.cpk");

    cortexpack()
        .arg("merge")
        .arg(&first)
        .arg(&second)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    assert_eq!(inspect_json(&out)["summary"]["views"], 3);
}

#[test]
fn merge_rejects_prefix_count_mismatch() {
    let dir = workspace();
    let first = build(dir.path(), "first.cpk");
    let second = build(dir.path(), "second.cpk");

    cortexpack()
        .arg("merge")
        .arg(&first)
        .arg(&second)
        .arg("-o")
        .arg(dir.path().join("merged.cpk"))
        .args(["--prefix", "a_"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 prefix(es) given for 2 input(s)"));
}

#[test]
fn merge_pack_keeps_packed_subjects() {
    let dir = workspace();
    let store = common::filestore();
    let packed = dir.path().join("packed.cpk");
    cortexpack()
        .arg("--filestore")
        .arg(store.path())
        .arg("build")
        .arg(dir.path().join("manifest.json"))
        .arg("-o")
        .arg(&packed)
        .arg("--pack")
        .assert()
        .success();
    let out = dir.path().join("merged.cpk");

    // No filestore: the subject comes from the packed input.
    cortexpack()
        .arg("merge")
        .arg(&packed)
        .arg("-o")
        .arg(&out)
        .arg("--pack")
        .assert()
        .success();

    cortexpack()
        .arg("validate")
        .arg(&out)
        .arg("--strict")
        .assert()
        .success();
}

// Inspect subcommand tests

#[test]
fn inspect_text_report() {
    let dir = workspace();
    let out = build(dir.path(), "out.cpk");
    cortexpack()
        .arg("inspect")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Package Inspection Report"))
        .stdout(predicate::str::contains("thickness"))
        .stdout(predicate::str::contains("Nothing packed"));
}

#[test]
fn inspect_json_report() {
    let dir = workspace();
    let out = build(dir.path(), "out.cpk");
    let report = inspect_json(&out);

    assert_eq!(report["summary"]["views"], 3);
    assert_eq!(report["views"][0]["name"], "thickness");
    assert_eq!(report["views"][0]["kind"], "vertex");
    assert_eq!(report["views"][1]["name"], "anatomy");
    assert_eq!(report["views"][1]["xfmname"], "fullhead");
    assert_eq!(report["views"][2]["mask"], "named:thick");
}

#[test]
fn inspect_rejects_unknown_output() {
    let dir = workspace();
    let out = build(dir.path(), "out.cpk");
    cortexpack()
        .arg("inspect")
        .arg(&out)
        .args(["--output", "yaml"])
        .assert()
        .failure();
}

// Validate subcommand tests

#[test]
fn validate_warnings_pass_without_strict() {
    let dir = workspace();
    let out = build(dir.path(), "out.cpk");
    cortexpack()
        .arg("validate")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("warning(s)"));
}

#[test]
fn validate_json_output_format() {
    let dir = workspace();
    let out = build(dir.path(), "out.cpk");
    let output = cortexpack()
        .arg("validate")
        .arg(&out)
        .args(["--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["error_count"], 0);
    assert!(report["warning_count"].as_u64().unwrap() >= 1);
    assert_eq!(report["issues"][0]["severity"], "warning");
}

#[test]
fn validate_missing_file_fails() {
    cortexpack()
        .args(["validate", "does/not/exist.cpk"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_rejects_non_package() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.txt");
    fs::write(&path, "not a zip archive").unwrap();
    cortexpack()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read package"));
}
