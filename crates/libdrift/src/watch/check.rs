use std::path::{Path, PathBuf};

use crate::gateway::Gateway;

/// Result of one cheap working-tree validity check.
///
/// The check pipeline threads this three-valued result instead of using
/// errors as control flow: any gateway failure at any step collapses to
/// `Indeterminate`, which the caller retries with backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The working tree definitively has uncommitted or untracked changes.
    Changed,
    /// The working tree is definitively clean.
    Unchanged,
    /// The answer could not be established; retry later.
    Indeterminate,
}

/// Cheaply determine whether the working tree at `root` has changes.
///
/// Steps, short-circuiting on the first hit:
/// 1. confirm `root` is inside a working tree;
/// 2. locate the metadata directory and bail out if an `index.lock` is
///    present (another git operation is in flight; do not race it);
/// 3. refresh the index, ignoring submodules;
/// 4. probe for unstaged modifications via exit code;
/// 5. probe for staged modifications against HEAD via exit code;
/// 6. list untracked files.
pub fn check_working_tree(gateway: &dyn Gateway, root: &Path) -> CheckOutcome {
    match gateway.run(root, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(out) if out.trim() == "true" => {}
        _ => return CheckOutcome::Indeterminate,
    }

    let git_dir = match gateway.run(root, &["rev-parse", "--git-dir"]) {
        Ok(out) => out.trim().to_string(),
        Err(_) => return CheckOutcome::Indeterminate,
    };
    if index_lock_path(root, &git_dir).exists() {
        return CheckOutcome::Indeterminate;
    }

    match gateway.run_exit_code(
        root,
        &["update-index", "-q", "--refresh", "--ignore-submodules"],
    ) {
        Ok(0) => {}
        _ => return CheckOutcome::Indeterminate,
    }

    // For the diff probes, exit 1 means "differences found"; any other
    // non-zero exit is a git failure.
    match gateway.run_exit_code(root, &["diff", "--quiet", "--ignore-submodules"]) {
        Ok(0) => {}
        Ok(1) => return CheckOutcome::Changed,
        _ => return CheckOutcome::Indeterminate,
    }

    match gateway.run_exit_code(
        root,
        &["diff", "--cached", "--quiet", "--ignore-submodules", "HEAD"],
    ) {
        Ok(0) => {}
        Ok(1) => return CheckOutcome::Changed,
        _ => return CheckOutcome::Indeterminate,
    }

    match gateway.run(root, &["ls-files", "--others", "--exclude-standard"]) {
        Ok(out) if !out.trim().is_empty() => CheckOutcome::Changed,
        Ok(_) => CheckOutcome::Unchanged,
        Err(_) => CheckOutcome::Indeterminate,
    }
}

/// Resolve the `index.lock` path from a possibly-relative git-dir answer.
fn index_lock_path(root: &Path, git_dir: &str) -> PathBuf {
    let dir = PathBuf::from(git_dir);
    let dir = if dir.is_absolute() { dir } else { root.join(dir) };
    dir.join("index.lock")
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs, sync::Mutex};

    use super::*;
    use crate::error::{DriftError, Result};

    /// Scripted gateway for driving the check pipeline step by step.
    struct StepGateway {
        /// Canned stdout per command line.
        text: Mutex<HashMap<String, String>>,
        /// Canned exit codes per command line.
        codes: Mutex<HashMap<String, i32>>,
    }

    impl StepGateway {
        fn new() -> Self {
            Self {
                text: Mutex::new(HashMap::new()),
                codes: Mutex::new(HashMap::new()),
            }
        }

        fn text(self, args: &str, out: &str) -> Self {
            self.text
                .lock()
                .expect("lock poisoned")
                .insert(args.into(), out.into());
            self
        }

        fn code(self, args: &str, code: i32) -> Self {
            self.codes
                .lock()
                .expect("lock poisoned")
                .insert(args.into(), code);
            self
        }
    }

    impl Gateway for StepGateway {
        fn run(&self, _cwd: &Path, args: &[&str]) -> Result<String> {
            let key = args.join(" ");
            self.text
                .lock()
                .expect("lock poisoned")
                .get(&key)
                .cloned()
                .ok_or_else(|| DriftError::GitError(format!("no reply for: {key}")))
        }

        fn run_exit_code(&self, _cwd: &Path, args: &[&str]) -> Result<i32> {
            let key = args.join(" ");
            self.codes
                .lock()
                .expect("lock poisoned")
                .get(&key)
                .copied()
                .ok_or_else(|| DriftError::GitError(format!("no reply for: {key}")))
        }
    }

    fn clean_repo() -> StepGateway {
        StepGateway::new()
            .text("rev-parse --is-inside-work-tree", "true\n")
            .text("rev-parse --git-dir", ".git\n")
            .code("update-index -q --refresh --ignore-submodules", 0)
            .code("diff --quiet --ignore-submodules", 0)
            .code("diff --cached --quiet --ignore-submodules HEAD", 0)
            .text("ls-files --others --exclude-standard", "")
    }

    #[test]
    fn test_clean_tree() {
        let root = tempfile::tempdir().expect("tempdir");
        let outcome = check_working_tree(&clean_repo(), root.path());
        assert_eq!(outcome, CheckOutcome::Unchanged);
    }

    #[test]
    fn test_not_a_work_tree_is_indeterminate() {
        let root = tempfile::tempdir().expect("tempdir");
        let gateway = StepGateway::new();
        assert_eq!(
            check_working_tree(&gateway, root.path()),
            CheckOutcome::Indeterminate
        );
    }

    #[test]
    fn test_index_lock_short_circuits() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir(root.path().join(".git")).expect("mkdir");
        fs::write(root.path().join(".git/index.lock"), "").expect("write");

        let outcome = check_working_tree(&clean_repo(), root.path());
        assert_eq!(outcome, CheckOutcome::Indeterminate);
    }

    #[test]
    fn test_unstaged_changes_detected_by_exit_code() {
        let root = tempfile::tempdir().expect("tempdir");
        let gateway = clean_repo().code("diff --quiet --ignore-submodules", 1);
        assert_eq!(check_working_tree(&gateway, root.path()), CheckOutcome::Changed);
    }

    #[test]
    fn test_staged_changes_detected_by_exit_code() {
        let root = tempfile::tempdir().expect("tempdir");
        let gateway = clean_repo().code("diff --cached --quiet --ignore-submodules HEAD", 1);
        assert_eq!(check_working_tree(&gateway, root.path()), CheckOutcome::Changed);
    }

    #[test]
    fn test_untracked_files_mean_changed() {
        let root = tempfile::tempdir().expect("tempdir");
        let gateway = clean_repo().text("ls-files --others --exclude-standard", "new.txt\n");
        assert_eq!(check_working_tree(&gateway, root.path()), CheckOutcome::Changed);
    }

    #[test]
    fn test_diff_probe_failure_is_indeterminate() {
        let root = tempfile::tempdir().expect("tempdir");
        let gateway = clean_repo().code("diff --quiet --ignore-submodules", 129);
        assert_eq!(
            check_working_tree(&gateway, root.path()),
            CheckOutcome::Indeterminate
        );
    }
}
