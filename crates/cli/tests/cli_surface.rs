//! Binary-level tests for the `corral` surface.
//!
//! Every invocation points `CORRAL_HOME` at a scratch directory so the
//! real installation is never touched.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn corral(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("corral").unwrap();
    cmd.env("CORRAL_HOME", home);
    cmd
}

#[test]
fn help_lists_the_command_surface() {
    let tmp = tempdir().unwrap();
    corral(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("pull")
                .and(predicate::str::contains("daemon"))
                .and(predicate::str::contains("jobs"))
                .and(predicate::str::contains("drive")),
        );
}

#[test]
fn hidden_subcommands_stay_out_of_help() {
    let tmp = tempdir().unwrap();
    corral(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("_shim").not());
}

#[test]
fn list_on_a_fresh_home_shows_no_versions() {
    let tmp = tempdir().unwrap();
    corral(tmp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("claude: (none)"));
}

#[test]
fn unknown_agent_is_a_fatal_error() {
    let tmp = tempdir().unwrap();
    corral(tmp.path())
        .args(["list", "vim"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown agent"));
}

#[test]
fn use_of_a_non_installed_version_exits_one() {
    let tmp = tempdir().unwrap();
    corral(tmp.path())
        .args(["use", "claude@9.9.9"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn repo_slots_round_trip_through_the_cli() {
    let tmp = tempdir().unwrap();
    corral(tmp.path())
        .args(["repo", "add", "team", "gh:acme/agents-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://github.com/acme/agents-config.git",
        ));

    corral(tmp.path())
        .args(["repo", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("team")
                .and(predicate::str::contains("prio 20")),
        );

    corral(tmp.path())
        .args(["repo", "remove", "team"])
        .assert()
        .success();

    corral(tmp.path())
        .args(["repo", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no repos configured"));
}

#[test]
fn invalid_repo_source_is_rejected() {
    let tmp = tempdir().unwrap();
    corral(tmp.path())
        .args(["repo", "add", "team", "not a source at all"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn invalid_job_file_is_rejected_with_accumulated_errors() {
    let tmp = tempdir().unwrap();
    let job_file = tmp.path().join("bad.yml");
    fs::write(
        &job_file,
        "name: bad\nschedule: nonsense\nagent: claude\nprompt: hi\ntimeout: 9q\n",
    )
    .unwrap();

    corral(tmp.path())
        .args(["jobs", "add"])
        .arg(&job_file)
        .assert()
        .failure()
        .code(1)
        .stderr(
            predicate::str::contains("schedule").and(predicate::str::contains("timeout")),
        );
}

#[test]
fn valid_job_installs_and_lists() {
    let tmp = tempdir().unwrap();
    let job_file = tmp.path().join("nightly.yml");
    fs::write(
        &job_file,
        "name: nightly\nschedule: \"0 3 * * *\"\nagent: claude\nprompt: Summarize {date}\n",
    )
    .unwrap();

    corral(tmp.path())
        .args(["jobs", "add"])
        .arg(&job_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("installed job 'nightly'"));

    corral(tmp.path())
        .args(["jobs", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("nightly").and(predicate::str::contains("0 3 * * *")),
        );

    corral(tmp.path())
        .args(["jobs", "disable", "nightly"])
        .assert()
        .success();
    corral(tmp.path())
        .args(["jobs", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"));
}

#[test]
fn daemon_status_is_not_running_on_a_fresh_home() {
    let tmp = tempdir().unwrap();
    corral(tmp.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn daemon_reload_without_daemon_fails() {
    let tmp = tempdir().unwrap();
    corral(tmp.path())
        .args(["daemon", "reload"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn stale_pid_file_reads_as_not_running() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("daemon.pid"), "4000000").unwrap();
    corral(tmp.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
    assert!(!tmp.path().join("daemon.pid").exists());
}

#[test]
fn drive_add_and_note_lifecycle() {
    let tmp = tempdir().unwrap();
    let drive_file = tmp.path().join("api.md");
    fs::write(&drive_file, "---\nname: api\n---\n# API\n").unwrap();

    corral(tmp.path())
        .args(["drive", "add"])
        .arg(&drive_file)
        .assert()
        .success();

    corral(tmp.path())
        .args(["drive", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("api"));

    corral(tmp.path())
        .args(["drive", "note", "api", "Rate limits", "60 rpm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("note written"));

    // The file drive was promoted.
    assert!(tmp.path().join("drives/api/overview.md").exists());
}

#[test]
fn push_without_a_repo_is_a_one_line_fatal() {
    let tmp = tempdir().unwrap();
    corral(tmp.path())
        .arg("push")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no repo configured"));
}

#[test]
fn project_pin_writes_the_manifest() {
    let tmp = tempdir().unwrap();
    let project = tmp.path().join("project");
    fs::create_dir_all(&project).unwrap();

    corral(tmp.path())
        .current_dir(&project)
        .args(["add", "claude@2.0.14", "--project"])
        .assert()
        .success();

    let manifest = fs::read_to_string(project.join(".agents/agents.yaml")).unwrap();
    assert!(manifest.contains("claude: 2.0.14"));
}
