//! Filesystem watching for working trees.
//!
//! A [`ChangeWatcher`] owns OS watch handles for any number of sessions,
//! debounces the raw event stream, runs a cheap git-backed validity check
//! once the tree settles, and publishes [`WatchEvent::NeedsRefresh`] when
//! the check finds definitive changes. Inconclusive checks retry with
//! exponential backoff.

/// The three-valued working-tree validity check.
mod check;
/// The fixed table of event paths that never trigger a check.
mod ignore;
/// The watcher, its dispatch thread, and the handle factory seam.
mod manager;
/// The pure per-session debounce/backoff state machine.
mod session;

pub use check::{CheckOutcome, check_working_tree};
pub use manager::{
    ChangeWatcher, EventCallback, NotifyHandleFactory, WatchEvent, WatchHandle,
    WatchHandleFactory, WatchStats,
};
pub use session::WatcherConfig;
