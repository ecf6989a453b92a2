use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate line and file counts for a diff.
///
/// Derived data: recomputed on each query, never mutated in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    /// Number of files touched by the diff.
    pub files_changed: usize,
    /// Number of added lines.
    pub additions: usize,
    /// Number of deleted lines.
    pub deletions: usize,
}

/// How a file was changed relative to the comparison base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// File exists only on the new side.
    Added,
    /// File exists only on the old side.
    Deleted,
    /// File content changed in place.
    Modified,
    /// File moved; `old_path` records where it came from.
    Renamed,
}

/// One file's worth of parsed diff output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Canonical path: the new path, falling back to the old path for deletes.
    pub path: String,
    /// Previous path, populated for renames.
    pub old_path: Option<String>,
    /// Classification of the change.
    pub kind: ChangeKind,
    /// Whether the diff marked this file as binary. Binary files carry no
    /// line counts: `additions` and `deletions` are always zero.
    pub is_binary: bool,
    /// Added line count.
    pub additions: usize,
    /// Deleted line count.
    pub deletions: usize,
    /// Whether the section exceeded the size guard. When set, only line
    /// counts were gathered and the content fields are empty.
    pub too_large: bool,
    /// Approximate size in bytes of the file's diff section.
    pub approx_size_bytes: usize,
    /// Reconstructed old-side content (deletions plus context lines).
    pub old_content: String,
    /// Reconstructed new-side content (additions plus context lines).
    pub new_content: String,
}

impl FileChange {
    /// Build an empty change record for `path` with the given kind.
    pub(crate) fn new(path: String, old_path: Option<String>, kind: ChangeKind) -> Self {
        Self {
            path,
            old_path,
            kind,
            is_binary: false,
            additions: 0,
            deletions: 0,
            too_large: false,
            approx_size_bytes: 0,
            old_content: String::new(),
            new_content: String::new(),
        }
    }
}

/// A captured diff together with its summary data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// The raw unified-diff text the result was built from.
    pub raw_text: String,
    /// Aggregate counts. Equals the per-file tallies when text and file list
    /// come from one source; callers reconcile when sources differ (e.g.
    /// untracked files merged in separately).
    pub stats: ChangeStats,
    /// Changed file paths, in diff order.
    pub changed_files: Vec<String>,
    /// Revision the diff was computed against, when known.
    pub before_revision: Option<String>,
    /// Revision the diff was computed up to, when known. Empty for a
    /// working-tree diff.
    pub after_revision: Option<String>,
}

/// A single commit in a history listing.
///
/// Immutable once built; histories are ordered newest-first and bounded by
/// the caller-supplied limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full revision hash.
    pub revision: String,
    /// Full commit message, possibly multi-line.
    pub message: String,
    /// Author timestamp.
    pub authored_at: DateTime<Utc>,
    /// Author name.
    pub author: String,
    /// Line and file counts for the commit.
    pub stats: ChangeStats,
}
