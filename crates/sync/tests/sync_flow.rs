//! End-to-end sync flow against a fixture repo on disk.

use corral_state::Store;
use corral_sync::{
    AutoAdapter, CommandRunner, Decision, InteractiveAdapter, SyncEngine, SyncOptions,
};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::tempdir;

#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl CommandRunner for RecordingRunner {
    fn run(&self, binary: &str, args: &[String], _home: &Path) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((binary.to_string(), args.to_vec()));
        Ok(())
    }
}

/// Scripted adapter that records which conflicts it was asked about.
struct ScriptedAdapter {
    decisions: Vec<Decision>,
    asked: Vec<String>,
}

impl ScriptedAdapter {
    fn new(decisions: Vec<Decision>) -> Self {
        Self {
            decisions,
            asked: Vec::new(),
        }
    }
}

impl InteractiveAdapter for ScriptedAdapter {
    fn resolve_conflict(&mut self, label: &str) -> anyhow::Result<Decision> {
        self.asked.push(label.to_string());
        Ok(self.decisions.remove(0))
    }
}

fn seed_repo(root: &Path) {
    fs::create_dir_all(root.join("shared/commands")).unwrap();
    fs::write(root.join("shared/commands/debug.md"), "A\n").unwrap();
    fs::write(root.join("shared/commands/ship.md"), "Ship it.\n").unwrap();

    fs::create_dir_all(root.join("skills/tdd")).unwrap();
    fs::write(root.join("skills/tdd/SKILL.md"), "---\ndescription: TDD\n---\n").unwrap();

    fs::create_dir_all(root.join("memory")).unwrap();
    fs::write(root.join("memory/AGENTS.md"), "Be terse.\n").unwrap();

    fs::create_dir_all(root.join("jobs")).unwrap();
    fs::write(
        root.join("jobs/nightly.yml"),
        "name: nightly\nschedule: \"0 3 * * *\"\nagent: claude\nprompt: Summarize {date}\n",
    )
    .unwrap();

    fs::create_dir_all(root.join("drives")).unwrap();
    fs::write(
        root.join("drives/api.md"),
        "---\nname: api\nupdated: 2026-01-01\n---\n# API notes\n",
    )
    .unwrap();

    fs::write(
        root.join("agents.yaml"),
        "mcp:\n  fetch:\n    type: stdio\n    command: uvx\n    args: [mcp-server-fetch]\n    agents: [claude]\n",
    )
    .unwrap();
}

#[test]
fn fresh_sync_installs_everything_as_new() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    seed_repo(&repo);
    let store = Store::at(tmp.path().join("home"));
    let runner = RecordingRunner::default();
    let engine = SyncEngine::new(&store, &runner);

    let outcome = engine
        .sync_repo(&repo, SyncOptions::default(), &mut AutoAdapter::skip_all())
        .unwrap();

    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
    assert!(!outcome.cancelled);
    assert!(store.commands_dir().join("debug.md").exists());
    assert!(store.commands_dir().join("ship.md").exists());
    assert!(store.skills_dir().join("tdd/SKILL.md").exists());
    assert!(store.memory_dir().join("AGENTS.md").exists());
    assert!(store.jobs_dir().join("nightly.yml").exists());
    assert!(store.drives_dir().join("api.md").exists());

    // The manifest's single MCP entry was registered with claude only.
    let calls = runner.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "claude");
    assert!(calls[0].1.contains(&"fetch".to_string()));
}

#[test]
fn crlf_difference_classifies_in_sync() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(repo.join("shared/commands")).unwrap();
    fs::write(repo.join("shared/commands/debug.md"), "A\n").unwrap();
    let store = Store::at(tmp.path().join("home"));
    store.ensure_layout().unwrap();
    fs::write(store.commands_dir().join("debug.md"), "A\r\n").unwrap();

    let runner = RecordingRunner::default();
    let engine = SyncEngine::new(&store, &runner);
    let outcome = engine
        .sync_repo(&repo, SyncOptions::default(), &mut AutoAdapter::skip_all())
        .unwrap();

    assert_eq!(outcome.in_sync, 1);
    assert!(outcome.installed.is_empty());
    assert!(outcome.skipped.is_empty());
    // Local content untouched.
    assert_eq!(
        fs::read_to_string(store.commands_dir().join("debug.md")).unwrap(),
        "A\r\n"
    );
}

#[test]
fn drifted_items_follow_per_item_decisions() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(repo.join("shared/commands")).unwrap();
    fs::write(repo.join("shared/commands/one.md"), "repo one\n").unwrap();
    fs::write(repo.join("shared/commands/two.md"), "repo two\n").unwrap();
    let store = Store::at(tmp.path().join("home"));
    store.ensure_layout().unwrap();
    fs::write(store.commands_dir().join("one.md"), "local one").unwrap();
    fs::write(store.commands_dir().join("two.md"), "local two").unwrap();

    let runner = RecordingRunner::default();
    let engine = SyncEngine::new(&store, &runner);
    let mut adapter = ScriptedAdapter::new(vec![Decision::Overwrite, Decision::Skip]);
    let outcome = engine
        .sync_repo(&repo, SyncOptions::default(), &mut adapter)
        .unwrap();

    assert_eq!(adapter.asked, vec!["command 'one'", "command 'two'"]);
    assert_eq!(outcome.updated, vec!["command 'one'"]);
    assert_eq!(outcome.skipped, vec!["command 'two'"]);
    assert_eq!(
        fs::read_to_string(store.commands_dir().join("one.md")).unwrap(),
        "repo one\n"
    );
    assert_eq!(
        fs::read_to_string(store.commands_dir().join("two.md")).unwrap(),
        "local two"
    );
}

#[test]
fn cancel_all_keeps_new_items_already_installed() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(repo.join("shared/commands")).unwrap();
    fs::write(repo.join("shared/commands/fresh.md"), "fresh\n").unwrap();
    fs::write(repo.join("shared/commands/conflict.md"), "repo\n").unwrap();
    let store = Store::at(tmp.path().join("home"));
    store.ensure_layout().unwrap();
    fs::write(store.commands_dir().join("conflict.md"), "local").unwrap();

    let runner = RecordingRunner::default();
    let engine = SyncEngine::new(&store, &runner);
    let mut adapter = ScriptedAdapter::new(vec![Decision::CancelAll]);
    let outcome = engine
        .sync_repo(&repo, SyncOptions::default(), &mut adapter)
        .unwrap();

    assert!(outcome.cancelled);
    // New item was installed before the conflict loop.
    assert!(store.commands_dir().join("fresh.md").exists());
    // The drifted item stays local.
    assert_eq!(
        fs::read_to_string(store.commands_dir().join("conflict.md")).unwrap(),
        "local"
    );
}

#[test]
fn force_overwrites_and_yes_skips_without_prompting() {
    for (force, yes, expect_repo_content) in [(true, false, true), (false, true, false)] {
        let tmp = tempdir().unwrap();
        let repo = tmp.path().join("repo");
        fs::create_dir_all(repo.join("shared/commands")).unwrap();
        fs::write(repo.join("shared/commands/x.md"), "repo\n").unwrap();
        let store = Store::at(tmp.path().join("home"));
        store.ensure_layout().unwrap();
        fs::write(store.commands_dir().join("x.md"), "local").unwrap();

        let runner = RecordingRunner::default();
        let engine = SyncEngine::new(&store, &runner);
        // A panicking adapter proves the loop was bypassed.
        struct NeverAsk;
        impl InteractiveAdapter for NeverAsk {
            fn resolve_conflict(&mut self, label: &str) -> anyhow::Result<Decision> {
                panic!("should not prompt for {label}");
            }
        }
        let opts = SyncOptions {
            force,
            yes,
            ..Default::default()
        };
        engine.sync_repo(&repo, opts, &mut NeverAsk).unwrap();

        let content = fs::read_to_string(store.commands_dir().join("x.md")).unwrap();
        assert_eq!(content == "repo\n", expect_repo_content);
    }
}

#[test]
fn dry_run_changes_nothing() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    seed_repo(&repo);
    let store = Store::at(tmp.path().join("home"));
    let runner = RecordingRunner::default();
    let engine = SyncEngine::new(&store, &runner);

    let opts = SyncOptions {
        dry_run: true,
        ..Default::default()
    };
    let outcome = engine
        .sync_repo(&repo, opts, &mut AutoAdapter::skip_all())
        .unwrap();

    assert!(!outcome.installed.is_empty());
    assert!(!store.commands_dir().join("debug.md").exists());
    assert!(runner.calls.lock().unwrap().is_empty());
}

#[test]
fn invalid_job_is_rejected_but_sync_continues() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(repo.join("jobs")).unwrap();
    fs::create_dir_all(repo.join("shared/commands")).unwrap();
    fs::write(repo.join("shared/commands/ok.md"), "fine\n").unwrap();
    fs::write(
        repo.join("jobs/broken.yml"),
        "name: broken\nschedule: \"0 3 * * *\"\nagent: cursor\nprompt: hi\ntimeout: nonsense\n",
    )
    .unwrap();

    let store = Store::at(tmp.path().join("home"));
    let runner = RecordingRunner::default();
    let engine = SyncEngine::new(&store, &runner);
    let outcome = engine
        .sync_repo(&repo, SyncOptions::default(), &mut AutoAdapter::skip_all())
        .unwrap();

    assert!(!store.jobs_dir().join("broken.yml").exists());
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("job 'broken'"));
    // The unrelated command still installed.
    assert!(store.commands_dir().join("ok.md").exists());
}

#[test]
fn skip_mcp_suppresses_registration() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    seed_repo(&repo);
    let store = Store::at(tmp.path().join("home"));
    let runner = RecordingRunner::default();
    let engine = SyncEngine::new(&store, &runner);

    let opts = SyncOptions {
        skip_mcp: true,
        ..Default::default()
    };
    engine
        .sync_repo(&repo, opts, &mut AutoAdapter::skip_all())
        .unwrap();
    assert!(runner.calls.lock().unwrap().is_empty());
}

#[test]
fn agent_override_command_does_not_shadow_central_shared_copy() {
    let tmp = tempdir().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(repo.join("shared/commands")).unwrap();
    fs::create_dir_all(repo.join("claude/commands")).unwrap();
    fs::write(repo.join("shared/commands/review.md"), "shared body\n").unwrap();
    fs::write(repo.join("claude/commands/review.md"), "claude body\n").unwrap();

    let store = Store::at(tmp.path().join("home"));
    let runner = RecordingRunner::default();
    let engine = SyncEngine::new(&store, &runner);
    engine
        .sync_repo(&repo, SyncOptions::default(), &mut AutoAdapter::skip_all())
        .unwrap();

    // Central storage holds the shared variant once.
    assert_eq!(
        fs::read_to_string(store.commands_dir().join("review.md")).unwrap(),
        "shared body\n"
    );
}
