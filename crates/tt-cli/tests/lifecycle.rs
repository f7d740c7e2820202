use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn bin(repo: &Path, user: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tt"));
    cmd.arg("--root")
        .arg(repo)
        .env("NO_COLOR", "1")
        .env("TT_CONFIG", repo.join("ttconfig.toml"))
        .env("USER", user)
        .env_remove("USERNAME")
        .env_remove("VISUAL")
        .env("EDITOR", "true")
        .env_remove("RUST_LOG");
    cmd
}

fn run(repo: &Path, args: &[&str]) -> Output {
    let output = bin(repo, "alice").args(args).output().expect("run tt");
    assert!(
        output.status.success(),
        "tt {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

fn list_json(repo: &Path, args: &[&str]) -> Vec<Value> {
    let mut full = vec!["list", "--json"];
    full.extend_from_slice(args);
    let output = run(repo, &full);
    serde_json::from_slice::<Value>(&output.stdout)
        .expect("json")
        .as_array()
        .cloned()
        .expect("array")
}

#[test]
fn init_create_list_resolve_shifts_vids() {
    let repo = TempDir::new().expect("repo");
    run(repo.path(), &["init"]);
    assert!(repo.path().join(".tt").is_dir());

    for desc in ["A", "B", "C"] {
        run(repo.path(), &["create", "-m", desc]);
    }

    let listed = run(repo.path(), &["list"]);
    assert_eq!(
        stdout_lines(&listed),
        vec!["0   L3 T N C", "1   L2 T N B", "2   L1 T N A"]
    );

    let resolved = run(repo.path(), &["resolve", "1"]);
    assert_eq!(stdout_lines(&resolved), vec!["L2 T R B"]);

    let items = list_json(repo.path(), &[]);
    let pairs: Vec<(u64, String)> = items
        .iter()
        .map(|item| {
            (
                item["vid"].as_u64().expect("vid"),
                item["description"].as_str().expect("desc").to_string(),
            )
        })
        .collect();
    assert_eq!(pairs, vec![(0, "C".to_string()), (1, "A".to_string())]);

    let everything = run(repo.path(), &["log", "-a"]);
    assert_eq!(
        stdout_lines(&everything),
        vec!["L3 T N C", "L2 T R B", "L1 T N A"]
    );
}

#[test]
fn advance_and_revert_by_alias_and_uid() {
    let repo = TempDir::new().expect("repo");
    run(repo.path(), &["init"]);
    run(repo.path(), &["push", "-m", "Write docs", "-t", "feature"]);

    assert_eq!(stdout_lines(&run(repo.path(), &["roll"])), vec!["L1 F I Write docs"]);
    assert_eq!(stdout_lines(&run(repo.path(), &["advance", "L1"])), vec!["L1 F R Write docs"]);
    assert_eq!(stdout_lines(&run(repo.path(), &["rollb", "L1"])), vec!["L1 F I Write docs"]);

    let shown = run(repo.path(), &["show", "L1", "--json"]);
    let item: Value = serde_json::from_slice(&shown.stdout).expect("json");
    assert_eq!(item["uid"], "L1");
    assert_eq!(item["kind"], "feature");
    assert_eq!(item["status"], "in_progress");
    assert!(item.get("vid").is_none());
}

#[test]
fn show_prints_long_names_and_full_description() {
    let repo = TempDir::new().expect("repo");
    run(repo.path(), &["init"]);
    run(
        repo.path(),
        &["new", "-t", "bug", "-m", "Crash on save\n\nOnly with unsaved buffers"],
    );

    let shown = run(repo.path(), &["show"]);
    assert_eq!(
        String::from_utf8_lossy(&shown.stdout),
        "L1\nPrivate\nDefect\nNot started\n\nCrash on save\n\nOnly with unsaved buffers\n"
    );
    assert_eq!(stdout_lines(&run(repo.path(), &["list"])), vec!["0   L1 D N Crash on save"]);
}

#[test]
fn amend_updates_fields_and_keeps_the_rest() {
    let repo = TempDir::new().expect("repo");
    run(repo.path(), &["init"]);
    run(repo.path(), &["create", "-m", "draft"]);

    run(repo.path(), &["amend", "0", "-t", "2"]);
    run(repo.path(), &["amend", "id:1", "-m", "  final wording  "]);

    let shown = run(repo.path(), &["show", "L1", "--json"]);
    let item: Value = serde_json::from_slice(&shown.stdout).expect("json");
    assert_eq!(item["kind"], "feature");
    assert_eq!(item["description"], "final wording");
    assert_eq!(item["status"], "not_started");
}

#[test]
fn shared_and_private_listings_are_separate() {
    let repo = TempDir::new().expect("repo");
    run(repo.path(), &["init"]);
    run(repo.path(), &["create", "-m", "mine"]);
    run(repo.path(), &["create", "-g", "-m", "team"]);

    assert_eq!(stdout_lines(&run(repo.path(), &["list"])), vec!["0   L1 T N mine"]);
    assert_eq!(stdout_lines(&run(repo.path(), &["list", "-g"])), vec!["G2 T N team"]);
    assert_eq!(
        stdout_lines(&run(repo.path(), &["list", "-g", "-l"])),
        vec!["G2 T N team", "0   L1 T N mine"]
    );
}

#[test]
fn record_files_are_plain_text_named_by_uid() {
    let repo = TempDir::new().expect("repo");
    run(repo.path(), &["init"]);
    run(repo.path(), &["create", "-g", "-m", "visible"]);

    let text = std::fs::read_to_string(repo.path().join(".tt").join("tasks").join("G1"))
        .expect("record");
    assert!(text.starts_with("tt-record 1\n1\n0\n0\n0\n"));
    assert!(text.ends_with("visible\n"));
}

#[test]
fn create_never_overwrites_when_the_counter_lags() {
    let repo = TempDir::new().expect("repo");
    run(repo.path(), &["init"]);
    run(repo.path(), &["create", "-m", "precious"]);
    std::fs::write(repo.path().join(".tt").join("next_id"), "1\n").expect("rewind");

    run(repo.path(), &["create", "-m", "newer"]);
    let mut descriptions: Vec<String> = list_json(repo.path(), &[])
        .iter()
        .map(|item| item["description"].as_str().expect("desc").to_string())
        .collect();
    descriptions.sort();
    assert_eq!(descriptions, ["newer", "precious"]);
}
