use std::process::Command;

fn triage(data_dir: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_triage"))
        .args(args)
        .env("TRIAGE_DATA_DIR", data_dir)
        .env("NO_COLOR", "1")
        .output()
        .expect("triage binary should run")
}

#[test]
fn created_event_can_be_inspected() {
    let dir = tempfile::tempdir().expect("tempdir");

    let out = triage(
        dir.path(),
        &["event", "create", "--name", "port scan", "--message", "ids alert 4411"],
    );
    assert!(out.status.success(), "create failed: {:?}", out);
    let stdout = String::from_utf8_lossy(&out.stdout);
    let event_id = stdout
        .lines()
        .find_map(|l| l.strip_prefix("Created event "))
        .expect("create should print the event id")
        .trim()
        .to_string();
    assert!(dir.path().join("triage.db").exists());

    let out = triage(dir.path(), &["inspect", &event_id]);
    assert!(out.status.success(), "inspect failed: {:?}", out);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("port scan"));
    assert!(stdout.contains("pending"));
    assert!(stdout.contains("none yet"));
}

#[test]
fn logs_without_daemon_run_is_not_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = triage(dir.path(), &["logs"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("No daemon log yet"));
}

#[test]
fn help_lists_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = triage(dir.path(), &["help"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    for cmd in ["daemon", "inspect", "resolve", "event create"] {
        assert!(stdout.contains(cmd), "help should mention {}", cmd);
    }
}
