#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn workspace(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.tanoak"));
    (dir, path)
}

fn create_index(path: &PathBuf) {
    cargo_bin_cmd!("tanoak")
        .arg("create")
        .arg(path)
        .assert()
        .success();
}

#[test]
fn create_insert_search_in_text_mode() {
    let (_dir, index) = workspace("basic");
    create_index(&index);

    cargo_bin_cmd!("tanoak")
        .arg("insert")
        .arg(&index)
        .args(["15", "100"])
        .assert()
        .success();

    let output = cargo_bin_cmd!("tanoak")
        .arg("search")
        .arg(&index)
        .arg("15")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).expect("utf8 stdout");
    assert!(stdout.contains("15 -> 100"), "stdout was {stdout:?}");
}

#[test]
fn search_miss_exits_with_status_one() {
    let (_dir, index) = workspace("miss");
    create_index(&index);
    cargo_bin_cmd!("tanoak")
        .arg("insert")
        .arg(&index)
        .args(["1", "10"])
        .assert()
        .success();

    let assert = cargo_bin_cmd!("tanoak")
        .arg("search")
        .arg(&index)
        .arg("2")
        .assert()
        .failure()
        .code(1);
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).expect("utf8 stderr");
    assert!(stderr.contains("not found"), "stderr was {stderr:?}");
}

#[test]
fn search_reports_json_for_hits_and_misses() {
    let (_dir, index) = workspace("json-search");
    create_index(&index);
    cargo_bin_cmd!("tanoak")
        .arg("insert")
        .arg(&index)
        .args(["15", "100"])
        .assert()
        .success();

    let output = cargo_bin_cmd!("tanoak")
        .args(["--format", "json", "search"])
        .arg(&index)
        .arg("15")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["found"], Value::Bool(true));
    assert_eq!(json["value"], Value::from(100u64));

    let output = cargo_bin_cmd!("tanoak")
        .args(["--format", "json", "search"])
        .arg(&index)
        .arg("2")
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["found"], Value::Bool(false));
    assert!(json["value"].is_null());
}

#[test]
fn load_print_and_stats_work_together() {
    let (dir, index) = workspace("load");
    let csv = dir.path().join("rows.csv");
    fs::write(&csv, "5,50\n3,30\n9,90\n3,999\nbad,row\n").expect("write csv");
    create_index(&index);

    let output = cargo_bin_cmd!("tanoak")
        .args(["--cache-blocks", "2", "load"])
        .arg(&index)
        .arg(&csv)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).expect("utf8 stdout");
    assert!(stdout.contains("loaded 3 pairs"), "stdout was {stdout:?}");
    assert!(
        stdout.contains("1 duplicates") && stdout.contains("1 malformed"),
        "stdout was {stdout:?}"
    );

    let output = cargo_bin_cmd!("tanoak")
        .arg("print")
        .arg(&index)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8(output).unwrap(), "3 -> 30\n5 -> 50\n9 -> 90\n");

    let output = cargo_bin_cmd!("tanoak")
        .args(["--format", "json", "stats"])
        .arg(&index)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["entries"], Value::from(3u64));
    assert_eq!(json["height"], Value::from(1u64));
    assert_eq!(json["block_count"], Value::from(2u64));
    assert!(json["cache"]["misses"].is_number());
    assert!(json["file_size_bytes"].is_number());
}

#[test]
fn stats_text_output_groups_index_and_cache() {
    let (_dir, index) = workspace("stats-text");
    create_index(&index);
    cargo_bin_cmd!("tanoak")
        .arg("insert")
        .arg(&index)
        .args(["5", "50"])
        .assert()
        .success();

    let output = cargo_bin_cmd!("tanoak")
        .arg("stats")
        .arg(&index)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).expect("utf8 stdout");
    assert!(stdout.contains("index\n"), "stdout was {stdout:?}");
    assert!(stdout.contains("cache\n"), "stdout was {stdout:?}");
    assert!(
        stdout.contains("file size  1024 bytes"),
        "stdout was {stdout:?}"
    );
    assert!(stdout.contains("entries    1"), "stdout was {stdout:?}");
    assert!(stdout.contains("writes"), "stdout was {stdout:?}");
}

#[test]
fn extract_writes_csv_and_respects_force() {
    let (dir, index) = workspace("extract");
    let out = dir.path().join("out.csv");
    create_index(&index);
    for (key, value) in [("3", "30"), ("1", "10"), ("2", "20")] {
        cargo_bin_cmd!("tanoak")
            .arg("insert")
            .arg(&index)
            .args([key, value])
            .assert()
            .success();
    }

    cargo_bin_cmd!("tanoak")
        .arg("extract")
        .arg(&index)
        .arg(&out)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&out).unwrap(), "1,10\n2,20\n3,30\n");

    cargo_bin_cmd!("tanoak")
        .arg("extract")
        .arg(&index)
        .arg(&out)
        .assert()
        .failure()
        .code(1);

    cargo_bin_cmd!("tanoak")
        .arg("extract")
        .arg(&index)
        .arg(&out)
        .arg("--force")
        .assert()
        .success();
}

#[test]
fn verify_reports_success_over_json() {
    let (dir, index) = workspace("verify");
    let csv = dir.path().join("rows.csv");
    let rows: String = (1..=60u64).map(|key| format!("{key},{}\n", key * 2)).collect();
    fs::write(&csv, rows).expect("write csv");
    create_index(&index);
    cargo_bin_cmd!("tanoak")
        .arg("load")
        .arg(&index)
        .arg(&csv)
        .assert()
        .success();

    let output = cargo_bin_cmd!("tanoak")
        .args(["--format", "json", "verify"])
        .arg(&index)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["success"], Value::Bool(true));
    assert_eq!(json["findings"], Value::Array(vec![]));
}

#[test]
fn opening_a_foreign_file_fails_and_leaves_it_untouched() {
    let (dir, _) = workspace("foreign");
    let path = dir.path().join("not-an-index.bin");
    let payload = b"NOTANIDX payload that must survive".to_vec();
    fs::write(&path, &payload).expect("write payload");

    let assert = cargo_bin_cmd!("tanoak")
        .arg("search")
        .arg(&path)
        .arg("1")
        .assert()
        .failure()
        .code(1);
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).expect("utf8 stderr");
    assert!(stderr.contains("error:"), "stderr was {stderr:?}");

    assert_eq!(fs::read(&path).unwrap(), payload, "file must be untouched");
}

#[test]
fn create_refuses_overwrite_without_force() {
    let (_dir, index) = workspace("overwrite");
    create_index(&index);
    cargo_bin_cmd!("tanoak")
        .arg("insert")
        .arg(&index)
        .args(["1", "10"])
        .assert()
        .success();

    cargo_bin_cmd!("tanoak")
        .arg("create")
        .arg(&index)
        .assert()
        .failure()
        .code(1);

    cargo_bin_cmd!("tanoak")
        .arg("create")
        .arg(&index)
        .arg("--force")
        .assert()
        .success();

    let output = cargo_bin_cmd!("tanoak")
        .args(["--format", "json", "stats"])
        .arg(&index)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["entries"], Value::from(0u64), "force create starts empty");
}

#[test]
fn config_file_points_the_bare_shell_at_an_index() {
    let (dir, index) = workspace("config");
    let config_path = dir.path().join("cli.toml");
    fs::write(
        &config_path,
        format!(
            "[index]\ndefault = \"{}\"\n\n[cache]\nblocks = 4\n",
            index.display()
        ),
    )
    .expect("write config");

    create_index(&index);
    cargo_bin_cmd!("tanoak")
        .arg("insert")
        .arg(&index)
        .args(["7", "70"])
        .assert()
        .success();

    // No shell argument: the configured default is opened automatically.
    let output = cargo_bin_cmd!("tanoak")
        .arg("--config")
        .arg(&config_path)
        .arg("shell")
        .write_stdin("search 7\nquit\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8(output).unwrap().contains("7 -> 70"));
}

#[test]
fn scripted_shell_session_round_trips() {
    let (dir, _) = workspace("shell");

    let script = "create store.tanoak\ninsert 7 70\ninsert 3 30\nsearch 7\nprint\nquit\n";
    let output = cargo_bin_cmd!("tanoak")
        .arg("shell")
        .current_dir(dir.path())
        .write_stdin(script)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).expect("utf8 stdout");
    assert!(stdout.contains("created store.tanoak"), "stdout was {stdout:?}");
    assert!(stdout.contains("7 -> 70"), "stdout was {stdout:?}");
    assert!(stdout.contains("2 pairs"), "stdout was {stdout:?}");

    // A second session reopens the file by path.
    let output = cargo_bin_cmd!("tanoak")
        .arg("shell")
        .arg("store.tanoak")
        .current_dir(dir.path())
        .write_stdin("search 3\nquit\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(
        String::from_utf8(output).unwrap().contains("3 -> 30"),
        "reopened session must see persisted pairs"
    );
}

#[test]
fn completions_cover_every_subcommand() {
    let output = cargo_bin_cmd!("tanoak")
        .args(["completions", "bash"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let script = String::from_utf8(output).expect("utf8 script");
    for subcommand in ["create", "insert", "search", "load", "extract", "verify"] {
        assert!(script.contains(subcommand), "missing {subcommand}");
    }
}
