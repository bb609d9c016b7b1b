//! CLI smoke tests.

use assert_cmd::Command;

#[test]
fn test_help_lists_commands() {
    let output = Command::cargo_bin("seeclickfix-crawler")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["crawl", "issues", "comments", "stats", "reset"] {
        assert!(stdout.contains(command), "--help missing `{command}`");
    }
}

#[test]
fn test_stats_initializes_an_empty_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("stats.db");

    let output = Command::cargo_bin("seeclickfix-crawler")
        .unwrap()
        .args(["stats", "--db"])
        .arg(&db)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Issues:"));
    assert!(stdout.contains("Comments:"));
    assert!(db.exists());
}

#[test]
fn test_reset_requires_confirmation() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("reset.db");

    let output = Command::cargo_bin("seeclickfix-crawler")
        .unwrap()
        .args(["reset", "--db"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(!output.status.success());

    let output = Command::cargo_bin("seeclickfix-crawler")
        .unwrap()
        .args(["reset", "--yes", "--db"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(db.exists());
}
