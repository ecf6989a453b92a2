use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        mpsc::{Receiver, RecvTimeoutError, Sender, channel},
    },
    thread::{self, JoinHandle},
    time::{Instant, SystemTime},
};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::{
    error::{DriftError, Result},
    gateway::Gateway,
    output::Output,
    watch::{
        check::{CheckOutcome, check_working_tree},
        ignore::is_ignored,
        session::{SessionState, WatcherConfig},
    },
};

/// Event published to the watcher's subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The named session's working tree definitively changed; the consumer
    /// should recapture its diff. Emitted at most once per
    /// debounce-and-check cycle.
    NeedsRefresh(String),
}

/// Callback invoked with each raw filesystem event path.
pub type EventCallback = Box<dyn Fn(PathBuf) + Send + Sync>;

/// An open OS watch. Dropping the handle releases the watch.
pub trait WatchHandle: Send {}

/// Creates OS watch handles. Swappable so tests can count open/close
/// without touching the filesystem notification machinery.
pub trait WatchHandleFactory: Send + Sync {
    /// Watch `root` recursively, delivering event paths to `on_event`.
    fn open(&self, root: &Path, on_event: EventCallback) -> Result<Box<dyn WatchHandle>>;
}

/// Production factory backed by the platform's recommended notify watcher.
pub struct NotifyHandleFactory;

/// Handle wrapping a live notify watcher; the watch ends when this drops.
struct NotifyHandle {
    /// Keeps the OS watch alive.
    _watcher: RecommendedWatcher,
}

impl WatchHandle for NotifyHandle {}

impl WatchHandleFactory for NotifyHandleFactory {
    fn open(&self, root: &Path, on_event: EventCallback) -> Result<Box<dyn WatchHandle>> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    for path in event.paths {
                        on_event(path);
                    }
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| DriftError::WatchError(e.to_string()))?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| DriftError::WatchError(e.to_string()))?;
        Ok(Box::new(NotifyHandle { _watcher: watcher }))
    }
}

/// Counts reported by [`ChangeWatcher::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchStats {
    /// Number of sessions currently watched.
    pub total_watched: usize,
    /// Number of sessions with an unresolved refresh cycle.
    pub sessions_needing_refresh: usize,
}

/// One watched working tree.
struct WatchSession {
    /// Root path under watch.
    root: PathBuf,
    /// Debounce/backoff state machine.
    state: SessionState,
    /// Exclusively owned OS watch; replaced wholesale on re-start.
    handle: Box<dyn WatchHandle>,
    /// The session's single reschedulable timer slot.
    deadline: Option<Instant>,
    /// When the last non-ignored event arrived.
    last_activity: SystemTime,
}

/// Messages processed sequentially by the dispatch thread.
enum Dispatch {
    /// Raw filesystem event for a session.
    FsEvent {
        /// Session the event belongs to.
        session_id: String,
        /// Path the OS reported.
        path: PathBuf,
    },
    /// A worker finished a validity check.
    CheckDone {
        /// Session the check ran for.
        session_id: String,
        /// Three-valued check result.
        outcome: CheckOutcome,
    },
    /// Recompute the timer deadline (registry changed).
    Wake,
    /// Tear down the dispatch thread.
    Shutdown,
}

/// Watches working trees and emits [`WatchEvent::NeedsRefresh`] when a
/// debounced validity check finds definitive changes.
///
/// All per-session state transitions happen on one dispatch thread, so a
/// session never sees interleaved mutation; only the slow gateway checks
/// run on worker threads, and their results are discarded if the session
/// was torn down in the meantime.
pub struct ChangeWatcher {
    /// Session registry shared with the dispatch thread.
    sessions: Arc<Mutex<HashMap<String, WatchSession>>>,
    /// Producer side of the dispatch queue.
    dispatch_tx: Sender<Dispatch>,
    /// Creates OS watch handles.
    factory: Arc<dyn WatchHandleFactory>,
    /// Dispatch thread, joined on drop.
    dispatcher: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    /// Create a watcher backed by the platform notify implementation and
    /// default timings. Returns the watcher and the channel on which
    /// refresh events arrive.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        output: Arc<dyn Output>,
    ) -> (Self, Receiver<WatchEvent>) {
        Self::with_parts(
            gateway,
            output,
            Arc::new(NotifyHandleFactory),
            WatcherConfig::default(),
        )
    }

    /// Create a watcher with an explicit handle factory and timing
    /// configuration.
    pub fn with_parts(
        gateway: Arc<dyn Gateway>,
        output: Arc<dyn Output>,
        factory: Arc<dyn WatchHandleFactory>,
        config: WatcherConfig,
    ) -> (Self, Receiver<WatchEvent>) {
        let sessions = Arc::new(Mutex::new(HashMap::new()));
        let (dispatch_tx, dispatch_rx) = channel();
        let (events_tx, events_rx) = channel();

        let dispatcher = Dispatcher {
            sessions: Arc::clone(&sessions),
            rx: dispatch_rx,
            check_tx: dispatch_tx.clone(),
            events_tx,
            gateway,
            output,
            config,
        };
        let thread = thread::spawn(move || dispatcher.run());

        (
            Self {
                sessions,
                dispatch_tx,
                factory,
                dispatcher: Some(thread),
            },
            events_rx,
        )
    }

    /// Start watching `root` for `session_id`.
    ///
    /// If the session is already being watched, its previous OS handle is
    /// stopped first and replaced; exactly one handle per session id exists
    /// at any time.
    pub fn start_watching(&self, session_id: &str, root: &Path) -> Result<()> {
        let old = self
            .sessions
            .lock()
            .expect("session registry poisoned")
            .remove(session_id);
        drop(old);

        let dispatch_tx = self.dispatch_tx.clone();
        let id_for_events = session_id.to_string();
        let handle = self.factory.open(
            root,
            Box::new(move |path| {
                #[allow(clippy::let_underscore_must_use)]
                let _ = dispatch_tx.send(Dispatch::FsEvent {
                    session_id: id_for_events.clone(),
                    path,
                });
            }),
        )?;

        self.sessions
            .lock()
            .expect("session registry poisoned")
            .insert(
                session_id.to_string(),
                WatchSession {
                    root: root.to_path_buf(),
                    state: SessionState::new(),
                    handle,
                    deadline: None,
                    last_activity: SystemTime::now(),
                },
            );
        #[allow(clippy::let_underscore_must_use)]
        let _ = self.dispatch_tx.send(Dispatch::Wake);
        Ok(())
    }

    /// Stop watching a session, releasing its OS handle and cancelling any
    /// pending timer. Returns whether the session existed.
    pub fn stop_watching(&self, session_id: &str) -> bool {
        let removed = self
            .sessions
            .lock()
            .expect("session registry poisoned")
            .remove(session_id);
        removed.is_some()
    }

    /// Stop watching every session.
    pub fn stop_all(&self) {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .clear();
    }

    /// Snapshot of the registry.
    pub fn stats(&self) -> WatchStats {
        let sessions = self.sessions.lock().expect("session registry poisoned");
        WatchStats {
            total_watched: sessions.len(),
            sessions_needing_refresh: sessions
                .values()
                .filter(|s| s.state.needs_refresh())
                .count(),
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        #[allow(clippy::let_underscore_must_use)]
        let _ = self.dispatch_tx.send(Dispatch::Shutdown);
        if let Some(thread) = self.dispatcher.take() {
            #[allow(clippy::let_underscore_must_use)]
            let _ = thread.join();
        }
    }
}

/// Owns the sequential event loop: timers, fs events, and check results.
struct Dispatcher {
    /// Session registry shared with the public API.
    sessions: Arc<Mutex<HashMap<String, WatchSession>>>,
    /// Consumer side of the dispatch queue.
    rx: Receiver<Dispatch>,
    /// Sender handed to check workers for result delivery.
    check_tx: Sender<Dispatch>,
    /// Subscriber channel for refresh events.
    events_tx: Sender<WatchEvent>,
    /// Gateway used by validity checks.
    gateway: Arc<dyn Gateway>,
    /// Diagnostics sink.
    output: Arc<dyn Output>,
    /// Debounce/backoff timings.
    config: WatcherConfig,
}

impl Dispatcher {
    /// Process messages until shutdown, firing due timers in between.
    fn run(self) {
        loop {
            let message = match self.next_deadline() {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        self.fire_due_timers();
                        continue;
                    }
                    match self.rx.recv_timeout(deadline - now) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Timeout) => {
                            self.fire_due_timers();
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
                None => match self.rx.recv() {
                    Ok(message) => message,
                    Err(_) => return,
                },
            };

            match message {
                Dispatch::FsEvent { session_id, path } => self.handle_fs_event(&session_id, &path),
                Dispatch::CheckDone {
                    session_id,
                    outcome,
                } => self.handle_check_done(session_id, outcome),
                Dispatch::Wake => {}
                Dispatch::Shutdown => return,
            }
        }
    }

    /// Earliest armed timer across all sessions.
    fn next_deadline(&self) -> Option<Instant> {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .values()
            .filter_map(|s| s.deadline)
            .min()
    }

    /// Apply one filesystem event to its session.
    fn handle_fs_event(&self, session_id: &str, path: &Path) {
        if is_ignored(path) {
            return;
        }
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        // Events for stopped sessions are discarded.
        let Some(session) = sessions.get_mut(session_id) else {
            return;
        };
        session.last_activity = SystemTime::now();
        if let Some(delay) = session.state.on_fs_event(&self.config) {
            session.deadline = Some(Instant::now() + delay);
        }
    }

    /// Fire every due timer, launching checks where the state machine asks
    /// for one.
    fn fire_due_timers(&self) {
        let now = Instant::now();
        let mut to_check = Vec::new();
        {
            let mut sessions = self.sessions.lock().expect("session registry poisoned");
            for (id, session) in sessions.iter_mut() {
                if session.deadline.is_some_and(|d| d <= now) {
                    session.deadline = None;
                    if session.state.on_timer_fire() {
                        to_check.push((id.clone(), session.root.clone()));
                    }
                }
            }
        }

        for (session_id, root) in to_check {
            let gateway = Arc::clone(&self.gateway);
            let tx = self.check_tx.clone();
            thread::spawn(move || {
                let outcome = check_working_tree(gateway.as_ref(), &root);
                #[allow(clippy::let_underscore_must_use)]
                let _ = tx.send(Dispatch::CheckDone {
                    session_id,
                    outcome,
                });
            });
        }
    }

    /// Resolve a finished check against its session, if it still exists.
    fn handle_check_done(&self, session_id: String, outcome: CheckOutcome) {
        let resolution = {
            let mut sessions = self.sessions.lock().expect("session registry poisoned");
            // The session may have been torn down while the check ran; the
            // stale result is discarded.
            let Some(session) = sessions.get_mut(&session_id) else {
                return;
            };
            let resolution = session.state.on_check_result(outcome, &self.config);
            if let Some(delay) = resolution.rearm {
                session.deadline = Some(Instant::now() + delay);
            }
            resolution
        };

        if outcome == CheckOutcome::Indeterminate {
            self.output.warn(&format!(
                "change check inconclusive for session {session_id}, retrying"
            ));
        }
        if resolution.emit_refresh {
            #[allow(clippy::let_underscore_must_use)]
            let _ = self.events_tx.send(WatchEvent::NeedsRefresh(session_id));
        }
    }
}
