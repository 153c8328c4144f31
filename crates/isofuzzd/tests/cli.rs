use std::fs;

use assert_cmd::Command;

fn write_clean_reproducer(dir: &std::path::Path) {
    fs::write(
        dir.join("stmts.sql"),
        "BEGIN;\n\n\
         INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10);\n\n\
         SELECT * FROM t WHERE wkey = 1;\n\n\
         COMMIT;\n\n",
    )
    .unwrap();
    fs::write(dir.join("tid.txt"), "0\n0\n0\n0\n").unwrap();
    // Init, InsertWrite, AfterWriteRead, Init (see Role::as_usage_code)
    fs::write(dir.join("usage.txt"), "0\n3\n6\n0\n").unwrap();
}

#[test]
fn run_against_a_fresh_memory_dut_is_always_clean() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::cargo_bin("isofuzzd")
        .unwrap()
        .arg("run")
        .arg("--seed")
        .arg("7")
        .arg("--reproducer-dir")
        .arg(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code().unwrap(), 0);
}

#[test]
fn reproduce_replays_a_single_transaction_as_clean() {
    let dir = tempfile::tempdir().unwrap();
    write_clean_reproducer(dir.path());

    let output = Command::cargo_bin("isofuzzd").unwrap().arg("reproduce").arg(dir.path()).output().unwrap();
    assert_eq!(output.status.code().unwrap(), 0);
    assert!(String::from_utf8_lossy(&output.stdout).contains("no anomaly"));
}

#[test]
fn reproduce_on_a_missing_directory_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nonexistent");

    let output = Command::cargo_bin("isofuzzd").unwrap().arg("reproduce").arg(&missing).output().unwrap();
    assert_eq!(output.status.code().unwrap(), 2);
}

#[test]
fn minimize_on_a_clean_reproducer_reports_nothing_to_do() {
    let dir = tempfile::tempdir().unwrap();
    write_clean_reproducer(dir.path());
    let out_dir = dir.path().join("out");

    let output = Command::cargo_bin("isofuzzd")
        .unwrap()
        .arg("minimize")
        .arg(dir.path())
        .arg(&out_dir)
        .output()
        .unwrap();
    assert_eq!(output.status.code().unwrap(), 0);
    assert!(String::from_utf8_lossy(&output.stdout).contains("nothing to minimize"));
}
