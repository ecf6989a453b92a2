// Integration tests are compiled as a separate crate, so these lints don't apply
#![allow(clippy::tests_outside_test_module)]
#![allow(missing_docs)]

mod common;

use std::{fs, process::Command, sync::Arc};

use anyhow::Result;
use common::{create_repo, git, head_revision};
use libdrift::{DiffCapture, DriftError, GitGateway, Quiet};

fn capture() -> DiffCapture {
    DiffCapture::new(Arc::new(GitGateway::default()), Arc::new(Quiet))
}

#[test]
fn test_working_tree_diff_combines_tracked_and_untracked() -> Result<()> {
    let (_temp_dir, repo_path) = create_repo("project")?;
    let capture = capture();

    // One tracked modification (3 added, 1 deleted) and a 5-line untracked
    // file.
    fs::write(
        repo_path.join("README.md"),
        "line one\nline 2a\nline 2b\nline 2c\nline three\n",
    )?;
    fs::write(
        repo_path.join("notes.txt"),
        "alpha\nbeta\ngamma\ndelta\nepsilon\n",
    )?;

    let result = capture.working_tree_diff(&repo_path)?;

    assert_eq!(result.stats.files_changed, 2);
    assert_eq!(result.stats.additions, 8);
    assert_eq!(result.stats.deletions, 1);
    assert!(result.changed_files.contains(&"README.md".to_string()));
    assert!(result.changed_files.contains(&"notes.txt".to_string()));
    assert!(result.before_revision.is_some());
    assert_eq!(result.after_revision, None);
    // The synthesized untracked section is real diff text.
    assert!(result.raw_text.contains("diff --git a/notes.txt b/notes.txt"));
    Ok(())
}

#[test]
fn test_unreadable_untracked_file_counted_without_line_stats() -> Result<()> {
    let (_temp_dir, repo_path) = create_repo("project")?;
    let capture = capture();

    fs::write(repo_path.join("blob.bin"), [0u8, 159, 146, 150])?;

    let result = capture.working_tree_diff(&repo_path)?;
    assert!(result.changed_files.contains(&"blob.bin".to_string()));
    assert_eq!(result.stats.files_changed, 1);
    assert_eq!(result.stats.additions, 0);
    assert_eq!(result.stats.deletions, 0);
    Ok(())
}

#[test]
fn test_clean_tree_has_no_changes() -> Result<()> {
    let (_temp_dir, repo_path) = create_repo("project")?;
    let capture = capture();

    assert!(!capture.has_changes(&repo_path));
    let result = capture.working_tree_diff(&repo_path)?;
    assert_eq!(result.stats.files_changed, 0);

    fs::write(repo_path.join("README.md"), "changed\n")?;
    assert!(capture.has_changes(&repo_path));
    Ok(())
}

#[test]
fn test_not_a_repository() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let capture = capture();

    let err = capture
        .working_tree_diff(temp_dir.path())
        .expect_err("bare directory must be rejected");
    assert!(matches!(err, DriftError::NotARepository { .. }));
    Ok(())
}

#[test]
fn test_revision_range_diff() -> Result<()> {
    let (_temp_dir, repo_path) = create_repo("project")?;
    let capture = capture();
    let first = head_revision(&repo_path)?;

    fs::write(repo_path.join("src.rs"), "fn main() {}\n")?;
    git(&repo_path, &["add", "src.rs"])?;
    git(&repo_path, &["commit", "-m", "Add source file"])?;
    let second = head_revision(&repo_path)?;

    let result = capture.revision_range_diff(&repo_path, &first, Some(&second))?;
    assert_eq!(result.changed_files, vec!["src.rs".to_string()]);
    assert_eq!(result.stats.files_changed, 1);
    assert_eq!(result.stats.additions, 1);
    assert_eq!(result.stats.deletions, 0);
    assert_eq!(result.before_revision.as_deref(), Some(first.as_str()));
    assert_eq!(result.after_revision.as_deref(), Some(second.as_str()));

    // Omitting `to` diffs up to the current revision.
    let defaulted = capture.revision_range_diff(&repo_path, &first, None)?;
    assert_eq!(defaulted.changed_files, result.changed_files);
    Ok(())
}

#[test]
fn test_commit_history_is_newest_first_and_bounded() -> Result<()> {
    let (_temp_dir, repo_path) = create_repo("project")?;
    let capture = capture();

    fs::write(repo_path.join("a.txt"), "a\n")?;
    git(&repo_path, &["add", "a.txt"])?;
    git(&repo_path, &["commit", "-m", "Add a"])?;

    fs::write(repo_path.join("b.txt"), "b\nb\n")?;
    git(&repo_path, &["add", "b.txt"])?;
    git(
        &repo_path,
        &["commit", "-m", "Add b", "-m", "With a body line."],
    )?;

    let records = capture.commit_history(&repo_path, 2, None)?;
    assert_eq!(records.len(), 2);

    // Newest first, with the full multi-line message spliced in.
    assert!(records[0].message.starts_with("Add b"));
    assert!(records[0].message.contains("With a body line."));
    assert_eq!(records[0].stats.additions, 2);
    assert_eq!(records[0].author, "Test User");
    assert!(records[1].message.starts_with("Add a"));
    assert_eq!(records[1].stats.additions, 1);
    Ok(())
}

#[test]
fn test_commit_history_excludes_reachable_commits() -> Result<()> {
    let (_temp_dir, repo_path) = create_repo("project")?;
    let capture = capture();
    let base = head_revision(&repo_path)?;

    fs::write(repo_path.join("a.txt"), "a\n")?;
    git(&repo_path, &["add", "a.txt"])?;
    git(&repo_path, &["commit", "-m", "Add a"])?;

    let records = capture.commit_history(&repo_path, 10, Some(&base))?;
    assert_eq!(records.len(), 1);
    assert!(records[0].message.starts_with("Add a"));
    Ok(())
}

#[test]
fn test_revision_diff_of_initial_commit_has_no_parent() -> Result<()> {
    let (_temp_dir, repo_path) = create_repo("project")?;
    let capture = capture();
    let first = head_revision(&repo_path)?;

    let result = capture.revision_diff(&repo_path, &first)?;
    assert_eq!(result.changed_files, vec!["README.md".to_string()]);
    assert_eq!(result.before_revision, None);
    assert_eq!(result.after_revision.as_deref(), Some(first.as_str()));
    Ok(())
}

#[test]
fn test_revision_diff_of_merge_uses_combined_output() -> Result<()> {
    let (_temp_dir, repo_path) = create_repo("project")?;
    let capture = capture();

    // Conflicting edits to the same line on two branches.
    git(&repo_path, &["checkout", "-b", "feature"])?;
    fs::write(
        repo_path.join("README.md"),
        "line one\nfrom feature\nline three\n",
    )?;
    git(&repo_path, &["commit", "-am", "Edit on feature"])?;

    git(&repo_path, &["checkout", "-"])?;
    fs::write(
        repo_path.join("README.md"),
        "line one\nfrom mainline\nline three\n",
    )?;
    git(&repo_path, &["commit", "-am", "Edit on mainline"])?;

    // The merge conflicts; resolve by hand and commit the merge.
    let merge = Command::new("git")
        .current_dir(&repo_path)
        .args(["merge", "feature"])
        .output()?;
    assert!(!merge.status.success(), "merge should conflict");
    fs::write(
        repo_path.join("README.md"),
        "line one\nresolved\nline three\n",
    )?;
    git(&repo_path, &["add", "README.md"])?;
    git(&repo_path, &["commit", "-m", "Merge feature"])?;
    let merge_rev = head_revision(&repo_path)?;

    let result = capture.revision_diff(&repo_path, &merge_rev)?;
    assert!(result.raw_text.contains("diff --cc README.md"));
    assert_eq!(result.changed_files, vec!["README.md".to_string()]);
    assert_eq!(result.stats.files_changed, 1);
    assert!(result.stats.additions >= 1);
    assert!(result.stats.deletions >= 1);
    assert_eq!(result.after_revision.as_deref(), Some(merge_rev.as_str()));
    Ok(())
}

#[test]
fn test_revision_diff_rejects_unknown_revision() -> Result<()> {
    let (_temp_dir, repo_path) = create_repo("project")?;
    let capture = capture();

    let err = capture
        .revision_diff(&repo_path, "no-such-revision")
        .expect_err("unknown revision must be rejected");
    assert!(matches!(err, DriftError::RevisionError { .. }));
    Ok(())
}
