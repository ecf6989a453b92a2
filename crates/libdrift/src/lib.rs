#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
//! Core library for tracking local changes in Git working trees.
//!
//! This crate captures working-tree and revision diffs through the `git`
//! binary, parses unified diff text into structured per-file changes, and
//! watches working trees for filesystem activity so interactive tools know
//! when to refresh. The CLI binary in `crates/drift` builds on top of this
//! library.

/// Diff capture and aggregation against a repository.
mod capture;
/// Error type shared across the crate.
mod error;
/// Subprocess gateway to the `git` binary.
mod gateway;
/// Output channel abstractions and implementations.
mod output;
/// Unified diff text parsing.
mod parse;
/// Structured diff and history types.
mod types;
/// Filesystem watching with debounce and validity checks.
pub mod watch;

/// Re-exports for diff capture.
pub use capture::{DEFAULT_MAX_FILE_BYTES, DiffCapture, combine_diff_results};
/// Re-export of the crate error and result alias.
pub use error::{DriftError, Result};
/// Re-exports for the git gateway seam.
pub use gateway::{Gateway, GitGateway};
/// Re-exports for output abstraction and concrete implementations.
pub use output::{Output, Quiet, Terminal};
/// Re-exports for diff parsing.
pub use parse::{ParsedDiff, parse_diff, parse_stat_summary};
/// Re-exports of the structured change types.
pub use types::{ChangeKind, ChangeStats, CommitRecord, DiffResult, FileChange};
