use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

const SAMPLE: &str = "MOULD_OK|Sample|10|5|50|2|2|40|2|5|100|100|100|100|2D|0.5";

// Minimal valid config; profiles land in a per-test flash directory
fn write_valid_config(dir: &tempfile::TempDir, poll_hz: u32) -> PathBuf {
    let toml = format!(
        r#"
[serial]
# unused by the simulated link but must be valid
device = "/dev/null"
baud = 115200

[storage]
dir = "{}"

[runner]
poll_hz = {poll_hz}
query_on_start = true
"#,
        dir.path().join("flash").display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn write_script(dir: &tempfile::TempDir, lines: &[&str]) -> PathBuf {
    let path = dir.path().join("session.txt");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn hmi(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("hmi").unwrap();
    cmd.arg("--log-level").arg("error").arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["health"], 0, "ok: config valid", "stdout")]
#[case(&["run", "--ticks"], 2, "required", "stderr")]
#[case(&["profiles"], 2, "Usage:", "stderr")]
#[case(&["profiles", "list"], 0, "no stored profiles", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, 1000);

    let mut cmd = hmi(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn scripted_run_reports_final_state() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, 1000);
    let script = write_script(
        &dir,
        &[
            "# replayed controller session",
            "STATE|REFILL",
            "ENC|60.5",
            "STATE|READY_TO_INJECT",
            "ENC|70.5",
        ],
    );

    hmi(&cfg)
        .arg("run")
        .arg("--script")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("state=READY_TO_INJECT"))
        .stdout(predicate::str::contains("blocks=1"))
        .stdout(predicate::str::contains("run complete: 4 ticks, 4 lines"));
}

#[rstest]
fn send_profile_in_unsafe_state_exits_with_gate_code() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, 1000);
    let script = write_script(&dir, &[SAMPLE, "STATE|INJECTING"]);

    hmi(&cfg)
        .arg("run")
        .arg("--script")
        .arg(&script)
        .arg("--send-profile")
        .arg("0")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("does not accept parameter writes"));
}

#[rstest]
fn send_profile_in_safe_state_succeeds() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, 1000);
    let script = write_script(&dir, &[SAMPLE, "STATE|READY_TO_INJECT"]);

    hmi(&cfg)
        .arg("run")
        .arg("--script")
        .arg(&script)
        .arg("--send-profile")
        .arg("0")
        .assert()
        .success();
}

#[rstest]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, 0);

    hmi(&cfg)
        .arg("health")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains("runner.poll_hz"));
}

#[rstest]
fn missing_config_file_fails() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("absent.toml");

    hmi(&cfg)
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Something went wrong"));
}

#[rstest]
fn debug_mock_overrides_reported_status() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, 1000);
    let script = write_script(&dir, &["ENC|5", "MOCK|POS|99"]);

    hmi(&cfg)
        .arg("run")
        .arg("--script")
        .arg(&script)
        .arg("--mock")
        .arg("STATE|REFILL")
        .arg("--mock")
        .arg("MOCK|POS|12.5")
        .assert()
        .success()
        .stdout(predicate::str::contains("state=REFILL pos=12.50"));
}

#[rstest]
fn malformed_mock_option_is_rejected() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, 1000);
    let script = write_script(&dir, &["ENC|5"]);

    hmi(&cfg)
        .arg("run")
        .arg("--script")
        .arg(&script)
        .arg("--mock")
        .arg("BOGUS|1")
        .assert()
        .code(1);
}

fn config_with_log_level(dir: &tempfile::TempDir, level: &str) -> PathBuf {
    let toml = format!(
        r#"
[storage]
dir = "{}"

[logging]
level = "{level}"
"#,
        dir.path().join("flash").display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(None, true)]
#[case(Some("error"), false)]
fn log_level_flag_overrides_config(#[case] flag: Option<&str>, #[case] debug_shown: bool) {
    let dir = tempdir().unwrap();
    let cfg = config_with_log_level(&dir, "debug");

    let mut cmd = Command::cargo_bin("hmi").unwrap();
    cmd.env_remove("RUST_LOG").arg("--config").arg(&cfg);
    if let Some(level) = flag {
        cmd.arg("--log-level").arg(level);
    }
    let out = cmd.arg("health").assert().success().get_output().stderr.clone();
    let stderr = String::from_utf8_lossy(&out);
    assert_eq!(stderr.contains("config loaded"), debug_shown, "stderr: {stderr}");
}
