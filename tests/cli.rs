use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const DUMP: &str = r#"{
    "arrays": [
        { "id": 1, "kind": "array", "owner": 2, "refs": [1],
          "elements": [
            { "key": 0, "value": { "type": "number", "value": 3 } },
            { "key": 1, "value": { "type": "form", "value": 33554450 } }
          ] },
        { "id": 2, "kind": "stringmap", "owner": 1,
          "elements": [
            { "key": "items", "value": { "type": "array", "value": 1 } },
            { "key": "name", "value": { "type": "string", "value": "Lydia" } }
          ] }
    ],
    "strings": [ { "id": 1, "owner": 1, "data": "quest note" } ]
}"#;

fn dynvar() -> Command {
    let mut cmd = Command::cargo_bin("dynvar").unwrap();
    cmd.env_remove("DYNVAR_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn packed_save(dir: &TempDir) -> PathBuf {
    let input = dir.path().join("dump.json");
    let save = dir.path().join("game.sav");
    fs::write(&input, DUMP).unwrap();
    dynvar()
        .arg("pack")
        .arg(&input)
        .arg(&save)
        .assert()
        .success()
        .stdout(predicate::str::contains("Arrays:         2"));
    save
}

fn json_output(args: &[&str], save: &Path) -> serde_json::Value {
    let out = dynvar().args(args).arg(save).arg("--json").output().unwrap();
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).unwrap()
}

#[test]
fn test_pack_then_dump() {
    let dir = TempDir::new().unwrap();
    let save = packed_save(&dir);

    dynvar()
        .arg("dump")
        .arg(&save)
        .assert()
        .success()
        .stdout(predicate::str::contains("Array #2 (StringMap, owner 01, refs [])"))
        .stdout(predicate::str::contains("[\"name\"] : Lydia"))
        .stdout(predicate::str::contains("quest note"));
}

#[test]
fn test_dump_json_matches_input() {
    let dir = TempDir::new().unwrap();
    let save = packed_save(&dir);

    let dumped = json_output(&["dump"], &save);
    let original: serde_json::Value = serde_json::from_str(DUMP).unwrap();
    assert_eq!(dumped["arrays"][1]["elements"], original["arrays"][1]["elements"]);
    assert_eq!(dumped["arrays"][0]["refs"], original["arrays"][0]["refs"]);
    assert_eq!(dumped["strings"][0]["data"], "quest note");
}

#[test]
fn test_check_reports_counts() {
    let dir = TempDir::new().unwrap();
    let save = packed_save(&dir);

    let report = json_output(&["check"], &save);
    assert_eq!(report["check"]["arrays"], 2);
    assert_eq!(report["check"]["strings"], 1);
    assert_eq!(report["check"]["version"], 2);
}

#[test]
fn test_prune_drops_unloaded_module() {
    let dir = TempDir::new().unwrap();
    let save = packed_save(&dir);
    let pruned = dir.path().join("pruned.sav");

    dynvar()
        .arg("prune")
        .arg(&save)
        .arg(&pruned)
        .args(["--modules", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Arrays:         1 (1 dropped)"));

    let report = json_output(&["check"], &pruned);
    assert_eq!(report["check"]["arrays"], 1);

    let dumped = json_output(&["dump"], &pruned);
    let items = &dumped["arrays"][0]["elements"][0];
    assert_eq!(items["key"], "items");
    assert_eq!(items["value"]["value"], 0);
}

#[test]
fn test_check_rejects_corrupt_save() {
    let dir = TempDir::new().unwrap();
    let save = packed_save(&dir);
    let mut bytes = fs::read(&save).unwrap();
    bytes.truncate(bytes.len() / 2);
    let broken = dir.path().join("broken.sav");
    fs::write(&broken, bytes).unwrap();

    dynvar()
        .arg("check")
        .arg(&broken)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed save data"));
}

#[test]
fn test_invalid_modules_list() {
    let dir = TempDir::new().unwrap();
    let save = packed_save(&dir);

    dynvar()
        .arg("dump")
        .arg(&save)
        .args(["--modules", "1=x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --modules"));
}

#[test]
fn test_legacy_config_writes_version_one() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("dynvar.json");
    fs::write(&config, r#"{ "save_version": 1 }"#).unwrap();
    let input = dir.path().join("dump.json");
    let save = dir.path().join("legacy.sav");
    fs::write(&input, DUMP).unwrap();

    dynvar()
        .arg("--config")
        .arg(&config)
        .arg("pack")
        .arg(&input)
        .arg(&save)
        .assert()
        .success();

    let report = json_output(&["check"], &save);
    assert_eq!(report["check"]["version"], 1);
}

#[test]
fn test_pack_rejects_bad_json() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("dump.json");
    fs::write(&input, "{ not json").unwrap();

    dynvar()
        .arg("pack")
        .arg(&input)
        .arg(dir.path().join("out.sav"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a valid dump"));
}
