use std::{collections::HashSet, fs, path::Path, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    error::{DriftError, Result},
    gateway::Gateway,
    output::Output,
    parse::{parse_diff, parse_stat_summary},
    types::{ChangeStats, CommitRecord, DiffResult},
};

/// Default size guard for a single file's diff section.
pub const DEFAULT_MAX_FILE_BYTES: usize = 1024 * 1024;

/// Record separator used in the batched history format.
const RECORD_SEP: char = '\u{1e}';
/// Field separator used in the batched history format.
const FIELD_SEP: char = '\u{1f}';

/// Orchestrates gateway calls to build diff results and commit histories.
///
/// Owns its collaborators by `Arc` so captures can be shared with the
/// watcher and the consuming tool.
pub struct DiffCapture {
    /// Version-control command gateway.
    gateway: Arc<dyn Gateway>,
    /// Message sink for non-fatal diagnostics.
    output: Arc<dyn Output>,
    /// Size guard handed to the diff parser.
    max_file_bytes: usize,
}

impl DiffCapture {
    /// Create a capture engine with the default size guard.
    pub fn new(gateway: Arc<dyn Gateway>, output: Arc<dyn Output>) -> Self {
        Self {
            gateway,
            output,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    /// Override the per-file size guard.
    pub fn with_max_file_bytes(mut self, max_file_bytes: usize) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    /// Confirm `root` is inside a working tree, or fail with
    /// [`DriftError::NotARepository`].
    fn ensure_repository(&self, root: &Path) -> Result<()> {
        match self.gateway.run(root, &["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) if out.trim() == "true" => Ok(()),
            _ => Err(DriftError::NotARepository {
                path: root.to_path_buf(),
            }),
        }
    }

    /// Fetch the current revision id, best-effort. Returns `None` when HEAD
    /// cannot be resolved (e.g. an unborn branch).
    pub fn current_revision(&self, root: &Path) -> Option<String> {
        let out = self.gateway.run(root, &["rev-parse", "HEAD"]).ok()?;
        let trimmed = out.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Whether the working tree has any staged, unstaged, or untracked
    /// changes. Status-oriented: degrades to `false` on gateway failure.
    pub fn has_changes(&self, root: &Path) -> bool {
        match self.gateway.run(root, &["status", "--porcelain"]) {
            Ok(out) => !out.trim().is_empty(),
            Err(e) => {
                self.output.warn(&format!("status check failed: {e}"));
                false
            }
        }
    }

    /// Capture the full uncommitted state of the working tree.
    ///
    /// Combines the tracked diff against the current revision with
    /// synthesized sections for untracked files, so new files show up as
    /// additions. Untracked files that cannot be read as text (binary,
    /// permission denied) are still counted as changed but contribute no
    /// line stats.
    pub fn working_tree_diff(&self, root: &Path) -> Result<DiffResult> {
        self.ensure_repository(root)?;
        let revision = self.current_revision(root);

        let mut raw = match revision {
            Some(_) => self.gateway.run(root, &["diff", "HEAD"])?,
            // No commits yet: everything of interest is untracked.
            None => String::new(),
        };
        if !raw.is_empty() && !raw.ends_with('\n') {
            raw.push('\n');
        }

        let untracked = self
            .gateway
            .run(root, &["ls-files", "--others", "--exclude-standard"])?;
        let mut unreadable = Vec::new();
        for path in untracked.lines().filter(|l| !l.is_empty()) {
            match fs::read(root.join(path)).map(String::from_utf8) {
                Ok(Ok(content)) => raw.push_str(&synthesize_untracked_section(path, &content)),
                Ok(Err(_)) => unreadable.push(path.to_string()),
                Err(e) => {
                    self.output
                        .warn(&format!("cannot read untracked file {path}: {e}"));
                    unreadable.push(path.to_string());
                }
            }
        }

        let parsed = parse_diff(&raw, self.max_file_bytes);
        self.report_skipped(&parsed.skipped);

        let mut changed_files: Vec<String> = parsed.files.iter().map(|f| f.path.clone()).collect();
        changed_files.extend(unreadable);

        let line_stats = parsed.stats();
        Ok(DiffResult {
            raw_text: raw,
            stats: ChangeStats {
                files_changed: changed_files.len(),
                additions: line_stats.additions,
                deletions: line_stats.deletions,
            },
            changed_files,
            before_revision: revision,
            after_revision: None,
        })
    }

    /// Capture the diff between two revisions, defaulting `to` to the
    /// current revision.
    ///
    /// Diff text, file list, and stats come from three independent gateway
    /// calls; a concurrent working-tree mutation between them can yield a
    /// slightly inconsistent triple.
    pub fn revision_range_diff(
        &self,
        root: &Path,
        from: &str,
        to: Option<&str>,
    ) -> Result<DiffResult> {
        self.ensure_repository(root)?;
        let to = to
            .map(str::to_string)
            .or_else(|| self.current_revision(root))
            .unwrap_or_else(|| "HEAD".to_string());

        let raw = self.gateway.run(root, &["diff", from, &to])?;
        let files = self
            .gateway
            .run(root, &["diff", "--name-only", from, &to])?;
        let stat = self
            .gateway
            .run(root, &["diff", "--shortstat", from, &to])?;

        Ok(DiffResult {
            raw_text: raw,
            stats: parse_stat_summary(&stat),
            changed_files: files.lines().filter(|l| !l.is_empty()).map(Into::into).collect(),
            before_revision: Some(from.to_string()),
            after_revision: Some(to),
        })
    }

    /// List commits reachable from HEAD but not from `exclude`, newest
    /// first, at most `limit` entries.
    ///
    /// One batched call fetches hash, author, date, subject, and per-file
    /// numstat lines in a delimiter-safe format; a second NUL-delimited call
    /// fetches full messages, spliced back in by revision id. A genuine VCS
    /// error is fatal; an empty listing is just an empty vector.
    pub fn commit_history(
        &self,
        root: &Path,
        limit: usize,
        exclude: Option<&str>,
    ) -> Result<Vec<CommitRecord>> {
        self.ensure_repository(root)?;
        let range = exclude
            .map(|rev| format!("{rev}..HEAD"))
            .unwrap_or_else(|| "HEAD".to_string());
        let limit_arg = limit.to_string();

        let listing = self.gateway.run(
            root,
            &[
                "log",
                "-n",
                &limit_arg,
                "--numstat",
                "--format=%x1e%H%x1f%an%x1f%at%x1f%s",
                &range,
            ],
        )?;

        let mut records = Vec::new();
        for chunk in listing.split(RECORD_SEP).filter(|c| !c.trim().is_empty()) {
            if let Some(record) = self.parse_history_record(chunk) {
                records.push(record);
            }
        }

        self.splice_full_messages(root, &limit_arg, &range, &mut records);
        Ok(records)
    }

    /// Parse one record of the batched history listing.
    fn parse_history_record(&self, chunk: &str) -> Option<CommitRecord> {
        let mut lines = chunk.lines();
        let header = lines.next()?;
        let fields: Vec<&str> = header.split(FIELD_SEP).collect();
        if fields.len() < 4 {
            self.output
                .warn(&format!("malformed history record: {header}"));
            return None;
        }

        let mut stats = ChangeStats::default();
        for line in lines {
            let mut parts = line.split('\t');
            let (Some(add), Some(del), Some(_path)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            stats.files_changed += 1;
            // Binary files report "-" for both counts.
            stats.additions += add.parse::<usize>().unwrap_or(0);
            stats.deletions += del.parse::<usize>().unwrap_or(0);
        }

        Some(CommitRecord {
            revision: fields[0].to_string(),
            message: fields[3].to_string(),
            authored_at: self.parse_commit_date(fields[2]),
            author: fields[1].to_string(),
            stats,
        })
    }

    /// Parse a unix-seconds author date, falling back to now on garbage.
    fn parse_commit_date(&self, raw: &str) -> DateTime<Utc> {
        let parsed = raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        match parsed {
            Some(when) => when,
            None => {
                self.output
                    .warn(&format!("malformed commit date '{raw}', using current time"));
                Utc::now()
            }
        }
    }

    /// Replace record subjects with full messages from a NUL-delimited
    /// hash+message stream. Degrades to subjects on failure.
    fn splice_full_messages(
        &self,
        root: &Path,
        limit_arg: &str,
        range: &str,
        records: &mut [CommitRecord],
    ) {
        let stream = match self.gateway.run(
            root,
            &["log", "-n", limit_arg, "-z", "--format=%H%n%B", range],
        ) {
            Ok(out) => out,
            Err(e) => {
                self.output
                    .warn(&format!("full message fetch failed, keeping subjects: {e}"));
                return;
            }
        };

        for entry in stream.split('\0').filter(|e| !e.is_empty()) {
            let Some((hash, body)) = entry.split_once('\n') else {
                continue;
            };
            if let Some(record) = records.iter_mut().find(|r| r.revision == hash.trim()) {
                record.message = body.trim_end().to_string();
            }
        }
    }

    /// Capture the diff introduced by a single commit.
    ///
    /// Merge commits are diffed against all parents with combined patch
    /// output, so a merge is never silently empty.
    pub fn revision_diff(&self, root: &Path, revision: &str) -> Result<DiffResult> {
        self.ensure_repository(root)?;
        let full = self
            .gateway
            .run(root, &["rev-parse", "--verify", revision])
            .map_err(|e| DriftError::RevisionError {
                revision: revision.to_string(),
                message: e.to_string(),
            })?
            .trim()
            .to_string();

        let raw = self
            .gateway
            .run(root, &["show", "--format=", "--patch", "--cc", &full])
            .map_err(|e| DriftError::RevisionError {
                revision: revision.to_string(),
                message: e.to_string(),
            })?;

        let parsed = parse_diff(&raw, self.max_file_bytes);
        self.report_skipped(&parsed.skipped);

        let before = self
            .gateway
            .run(root, &["rev-parse", "--verify", &format!("{full}^")])
            .ok()
            .map(|out| out.trim().to_string());

        Ok(DiffResult {
            stats: parsed.stats(),
            changed_files: parsed.files.iter().map(|f| f.path.clone()).collect(),
            raw_text: raw,
            before_revision: before,
            after_revision: Some(full),
        })
    }

    /// Log dropped parser sections as warnings.
    fn report_skipped(&self, skipped: &[String]) {
        for diagnostic in skipped {
            self.output.warn(&format!("dropped diff section: {diagnostic}"));
        }
    }
}

/// Merge multiple diff results into one.
///
/// Raw texts are concatenated with blank-line separators; additions and
/// deletions are summed; `files_changed` counts the set union of changed
/// files so duplicates across results are not double counted. The combined
/// result spans from the first result's `before_revision` to the last's
/// `after_revision`.
pub fn combine_diff_results(results: &[DiffResult]) -> DiffResult {
    let mut combined = DiffResult::default();
    let Some(first) = results.first() else {
        return combined;
    };

    let mut seen = HashSet::new();
    for result in results {
        combined.stats.additions += result.stats.additions;
        combined.stats.deletions += result.stats.deletions;
        for file in &result.changed_files {
            if seen.insert(file.clone()) {
                combined.changed_files.push(file.clone());
            }
        }
    }
    combined.stats.files_changed = combined.changed_files.len();

    combined.raw_text = results
        .iter()
        .map(|r| r.raw_text.trim_end_matches('\n'))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    if !combined.raw_text.is_empty() {
        combined.raw_text.push('\n');
    }

    combined.before_revision = first.before_revision.clone();
    combined.after_revision = results
        .last()
        .and_then(|r| r.after_revision.clone());
    combined
}

/// Build a diff-shaped section presenting an untracked file as all
/// additions.
fn synthesize_untracked_section(path: &str, content: &str) -> String {
    let line_count = content.lines().count();
    let mut section = format!(
        "diff --git a/{path} b/{path}\nnew file mode 100644\n--- /dev/null\n+++ b/{path}\n@@ -0,0 +1,{line_count} @@\n"
    );
    for line in content.lines() {
        section.push('+');
        section.push_str(line);
        section.push('\n');
    }
    section
}
