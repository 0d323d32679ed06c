//! Integration tests for the storyloom CLI
//!
//! These tests exercise the full CLI workflow using a temporary database.
//! They verify that commands work end-to-end without mocking.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run storyloom with a specific database path, from inside the temp dir
fn run_storyloom(args: &[&str], db_path: &PathBuf) -> std::process::Output {
    let cwd = db_path.parent().unwrap_or_else(|| Path::new("."));
    Command::new(env!("CARGO_BIN_EXE_storyloom"))
        .args(args)
        .current_dir(cwd)
        .env("STORYLOOM_DB_PATH", db_path)
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env_remove("STORYLOOM_LOG")
        .output()
        .expect("Failed to execute storyloom")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn setup() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    (dir, db)
}

/// Id from a "Created <kind> <id> ..." line
fn created_id(output: &std::process::Output) -> String {
    assert!(output.status.success(), "command failed: {}", stderr(output));
    stdout(output)
        .lines()
        .find(|l| l.starts_with("Created"))
        .and_then(|l| l.split_whitespace().nth(2))
        .map(str::to_string)
        .expect("no Created line")
}

fn add_storylet(title: &str, db: &PathBuf) -> String {
    created_id(&run_storyloom(&["storylet", "add", title], db))
}

// =============================================================================
// Basic Command Tests
// =============================================================================

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_storyloom"))
        .arg("--help")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("storyloom"));
    assert!(out.contains("storylet authoring"));
}

#[test]
fn test_version_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_storyloom"))
        .arg("--version")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    assert!(stdout(&output).contains("storyloom"));
}

// =============================================================================
// Shell Completion Tests
// =============================================================================

#[test]
fn test_completion_zsh() {
    let output = Command::new(env!("CARGO_BIN_EXE_storyloom"))
        .args(["completion", "zsh"])
        .output()
        .expect("Failed to execute");

    assert!(output.status.success(), "completion zsh failed: {}", stderr(&output));
    assert!(stdout(&output).contains("#compdef storyloom"));
}

#[test]
fn test_completion_bash() {
    let output = Command::new(env!("CARGO_BIN_EXE_storyloom"))
        .args(["completion", "bash"])
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    assert!(stdout(&output).contains("_storyloom"));
}

#[test]
fn test_completion_fish() {
    let output = Command::new(env!("CARGO_BIN_EXE_storyloom"))
        .args(["completion", "fish"])
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    assert!(stdout(&output).contains("complete -c storyloom"));
}

// =============================================================================
// Content Commands
// =============================================================================

#[test]
fn test_init_creates_project() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_storyloom"))
        .arg("init")
        .current_dir(dir.path())
        .env_remove("STORYLOOM_DB_PATH")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success(), "init failed: {}", stderr(&output));
    assert!(dir.path().join(".storyloom/storyloom.db").exists());
    assert!(dir.path().join(".storyloom/config.toml").exists());
}

#[test]
fn test_arc_and_storylet_listing() {
    let (_dir, db) = setup();
    let arc_id = created_id(&run_storyloom(&["arc", "add", "Harbor", "-d", "Night at the docks"], &db));
    let in_arc = created_id(&run_storyloom(&["storylet", "add", "Pier", "--arc", &arc_id], &db));
    add_storylet("Elsewhere", &db);

    let arcs = stdout(&run_storyloom(&["arc", "list"], &db));
    assert!(arcs.contains("Harbor"));
    assert!(arcs.contains("(1 storylets)"));

    let scoped = stdout(&run_storyloom(&["storylet", "list", "--arc", &arc_id], &db));
    assert!(scoped.contains(&in_arc));
    assert!(!scoped.contains("Elsewhere"));

    let all = stdout(&run_storyloom(&["storylet", "list"], &db));
    assert!(all.contains("Pier") && all.contains("Elsewhere"));
}

#[test]
fn test_storylet_in_missing_arc_fails() {
    let (_dir, db) = setup();
    let output = run_storyloom(&["storylet", "add", "Lost", "--arc", "no-such-arc"], &db);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("does not exist"));
}

#[test]
fn test_blank_title_rejected() {
    let (_dir, db) = setup();
    let output = run_storyloom(&["storylet", "add", "   "], &db);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Title is required"));
}

#[test]
fn test_storylet_edit() {
    let (_dir, db) = setup();
    let id = add_storylet("Draft", &db);

    let output = run_storyloom(
        &["storylet", "edit", &id, "--title", "Final", "--tag", "night", "--add-choice", "Wait"],
        &db,
    );
    assert!(output.status.success(), "edit failed: {}", stderr(&output));

    let shown = stdout(&run_storyloom(&["storylet", "show", &id], &db));
    assert!(shown.contains("Final"));
    assert!(shown.contains("night"));
    assert!(shown.contains("Wait -> -"));
}

// =============================================================================
// Graph Commands
// =============================================================================

#[test]
fn test_link_writes_choice_once() {
    let (_dir, db) = setup();
    let a = add_storylet("Docks", &db);
    let b = add_storylet("Warehouse", &db);

    let output = run_storyloom(&["link", &a, &b, "--label", "Follow the smuggler"], &db);
    assert!(output.status.success(), "link failed: {}", stderr(&output));
    assert!(stdout(&output).contains("Linked"));

    let shown = stdout(&run_storyloom(&["storylet", "show", &a], &db));
    assert!(shown.contains("Follow the smuggler -> Warehouse"));

    let again = run_storyloom(&["link", &a, &b], &db);
    assert!(again.status.success());
    assert!(stdout(&again).contains("already leads to"));

    let graph = stdout(&run_storyloom(&["graph"], &db));
    assert!(graph.contains("2 nodes, 1 connections"));
    assert!(graph.contains("Docks -> Warehouse"));
}

#[test]
fn test_link_unknown_storylet_fails() {
    let (_dir, db) = setup();
    let a = add_storylet("Docks", &db);
    let output = run_storyloom(&["link", &a, "missing"], &db);
    assert!(!output.status.success());
}

#[test]
fn test_graph_formats() {
    let (_dir, db) = setup();
    let a = add_storylet("Docks", &db);
    let b = add_storylet("Warehouse", &db);
    run_storyloom(&["link", &a, &b], &db);

    let dot = stdout(&run_storyloom(&["graph", "--format", "dot", "--title", "Act One"], &db));
    assert!(dot.starts_with("digraph Storylets {"));
    assert!(dot.contains(&format!("\"node-{}\" -> \"node-{}\"", a, b)));
    assert!(dot.contains("label=\"Act One\";"));

    let json = stdout(&run_storyloom(&["graph", "--format", "json"], &db));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(value["connections"].as_array().unwrap().len(), 1);
}

#[test]
fn test_layout_prints_grid() {
    let (_dir, db) = setup();
    for title in ["One", "Two", "Three", "Four", "Five"] {
        add_storylet(title, &db);
    }
    let out = stdout(&run_storyloom(&["layout"], &db));
    assert_eq!(out.lines().count(), 5);
    // Fifth node wraps to the second row
    assert!(out.lines().nth(4).unwrap().contains("300.0"));
}

// =============================================================================
// Export / Import
// =============================================================================

#[test]
fn test_export_import_round_trip() {
    let (dir, db) = setup();
    let a = add_storylet("Docks", &db);
    let b = add_storylet("Warehouse", &db);
    run_storyloom(&["link", &a, &b], &db);
    run_storyloom(&["clue", "add", "Ledger"], &db);

    let file = dir.path().join("story.json");
    let output = run_storyloom(
        &["export", "-o", file.to_str().unwrap(), "--description", "backup", "--tag", "v1"],
        &db,
    );
    assert!(output.status.success(), "export failed: {}", stderr(&output));

    let fresh = dir.path().join("fresh.db");
    let imported = run_storyloom(&["import", file.to_str().unwrap()], &fresh);
    assert!(imported.status.success(), "import failed: {}", stderr(&imported));
    assert!(stdout(&imported).contains("Imported 2 storylets, 0 arcs, 1 clues, 0 characters"));

    let again = run_storyloom(&["import", file.to_str().unwrap()], &fresh);
    assert!(stdout(&again).contains("Skipped 3 records already present"));

    let shown = stdout(&run_storyloom(&["storylet", "show", &a], &fresh));
    assert!(shown.contains("Continue -> Warehouse"));
}

#[test]
fn test_export_only_selected_collections() {
    let (_dir, db) = setup();
    add_storylet("Docks", &db);
    run_storyloom(&["arc", "add", "Harbor"], &db);

    let json = stdout(&run_storyloom(&["export", "--only", "arcs"], &db));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["version"], "1.0.0");
    assert!(value["data"].get("storylets").is_none());
    assert_eq!(value["data"]["arcs"].as_array().unwrap().len(), 1);
}

#[test]
fn test_import_rejects_future_version() {
    let (dir, db) = setup();
    let file = dir.path().join("future.json");
    std::fs::write(&file, r#"{"version":"2.0.0","data":{}}"#).unwrap();

    let output = run_storyloom(&["import", file.to_str().unwrap()], &db);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unsupported format version"));
}

// =============================================================================
// Minigames
// =============================================================================

#[test]
fn test_play_discovers_clue() {
    let (_dir, db) = setup();
    let clue = created_id(&run_storyloom(&["clue", "add", "Ledger"], &db));
    let next = add_storylet("Reward", &db);

    let output = run_storyloom(&["play", &clue, "memory-match", "--seed", "7", "--success", &next], &db);
    assert!(output.status.success(), "play failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Success memory_match"));
    assert!(out.contains(&next));

    let clues = stdout(&run_storyloom(&["clue", "list"], &db));
    assert!(clues.contains("✓"));
}

#[test]
fn test_play_unknown_kind_fails() {
    let (_dir, db) = setup();
    let clue = created_id(&run_storyloom(&["clue", "add", "Ledger"], &db));
    let output = run_storyloom(&["play", &clue, "chess"], &db);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown minigame"));
}
