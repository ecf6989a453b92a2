use std::{cmp, time::Duration};

use crate::watch::check::CheckOutcome;

/// Timing knobs for debounce and backoff.
#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    /// Quiet period after the last filesystem event before checking.
    pub debounce: Duration,
    /// First retry delay after an inconclusive check.
    pub backoff_base: Duration,
    /// Upper bound for the retry delay.
    pub backoff_max: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1500),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }
}

/// Where a session currently is in its refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing pending; waiting for a filesystem event.
    Idle,
    /// Events seen; waiting for the quiet period to elapse.
    Debouncing,
    /// A validity check is in flight.
    Checking,
    /// The last check was inconclusive; waiting to retry.
    Backoff,
}

/// What the driver must do after a check resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CheckResolution {
    /// Emit `needs-refresh` for this session.
    pub emit_refresh: bool,
    /// Re-arm the session's timer slot with this delay.
    pub rearm: Option<Duration>,
}

/// Pure per-session state machine: Idle → Debouncing → Checking →
/// (Idle | Backoff → Checking).
///
/// The machine owns no timers or threads; it reports the delays to arm and
/// the driver owns the single reschedulable timer slot per session.
#[derive(Debug)]
pub(crate) struct SessionState {
    /// Current phase.
    phase: Phase,
    /// Whether events arrived that the current or next check must account
    /// for.
    pending_refresh: bool,
    /// Consecutive inconclusive checks.
    error_streak: u32,
}

impl SessionState {
    /// Fresh idle session.
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Idle,
            pending_refresh: false,
            error_streak: 0,
        }
    }

    /// A (non-ignored) filesystem event arrived. Returns the debounce delay
    /// to (re)arm, or `None` when the existing timer must be left alone.
    pub(crate) fn on_fs_event(&mut self, config: &WatcherConfig) -> Option<Duration> {
        match self.phase {
            Phase::Idle | Phase::Debouncing => {
                self.phase = Phase::Debouncing;
                self.pending_refresh = true;
                Some(config.debounce)
            }
            // Mid-check or backing off: note the event; the pending flag
            // forces another cycle once the current one resolves.
            Phase::Checking | Phase::Backoff => {
                self.pending_refresh = true;
                None
            }
        }
    }

    /// The session's timer fired. Returns `true` when a check must start.
    pub(crate) fn on_timer_fire(&mut self) -> bool {
        match self.phase {
            Phase::Debouncing | Phase::Backoff => {
                self.phase = Phase::Checking;
                // The check observes everything up to now.
                self.pending_refresh = false;
                true
            }
            Phase::Idle | Phase::Checking => false,
        }
    }

    /// A check finished with `outcome`.
    pub(crate) fn on_check_result(
        &mut self,
        outcome: CheckOutcome,
        config: &WatcherConfig,
    ) -> CheckResolution {
        match outcome {
            CheckOutcome::Changed | CheckOutcome::Unchanged => {
                self.error_streak = 0;
                let rearm = if self.pending_refresh {
                    // Events landed mid-check; run another cycle.
                    self.phase = Phase::Debouncing;
                    Some(config.debounce)
                } else {
                    self.phase = Phase::Idle;
                    None
                };
                CheckResolution {
                    emit_refresh: outcome == CheckOutcome::Changed,
                    rearm,
                }
            }
            CheckOutcome::Indeterminate => {
                self.error_streak += 1;
                self.pending_refresh = true;
                self.phase = Phase::Backoff;
                CheckResolution {
                    emit_refresh: false,
                    rearm: Some(backoff_delay(self.error_streak, config)),
                }
            }
        }
    }

    /// Whether the session has an unresolved refresh in flight.
    pub(crate) fn needs_refresh(&self) -> bool {
        self.pending_refresh || self.phase != Phase::Idle
    }
}

/// Exponential backoff delay for the given failure streak:
/// `min(base · 2^(streak−1), max)`.
pub(crate) fn backoff_delay(streak: u32, config: &WatcherConfig) -> Duration {
    let factor = 1u32.checked_shl(streak.saturating_sub(1)).unwrap_or(u32::MAX);
    cmp::min(config.backoff_base.saturating_mul(factor), config.backoff_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WatcherConfig {
        WatcherConfig::default()
    }

    #[test]
    fn test_events_rearm_debounce() {
        let cfg = config();
        let mut state = SessionState::new();

        assert_eq!(state.on_fs_event(&cfg), Some(cfg.debounce));
        // Repeated events keep restarting the same trailing-edge timer.
        assert_eq!(state.on_fs_event(&cfg), Some(cfg.debounce));
        assert_eq!(state.on_fs_event(&cfg), Some(cfg.debounce));

        assert!(state.on_timer_fire());
        // Only one check per window: a second fire is a no-op.
        assert!(!state.on_timer_fire());
    }

    #[test]
    fn test_definitive_result_returns_to_idle() {
        let cfg = config();
        let mut state = SessionState::new();
        state.on_fs_event(&cfg);
        state.on_timer_fire();

        let res = state.on_check_result(CheckOutcome::Changed, &cfg);
        assert!(res.emit_refresh);
        assert_eq!(res.rearm, None);
        assert!(!state.needs_refresh());

        state.on_fs_event(&cfg);
        state.on_timer_fire();
        let res = state.on_check_result(CheckOutcome::Unchanged, &cfg);
        assert!(!res.emit_refresh);
        assert!(!state.needs_refresh());
    }

    #[test]
    fn test_event_during_check_forces_another_cycle() {
        let cfg = config();
        let mut state = SessionState::new();
        state.on_fs_event(&cfg);
        state.on_timer_fire();

        // Mid-check events do not arm a timer, only the pending flag.
        assert_eq!(state.on_fs_event(&cfg), None);

        let res = state.on_check_result(CheckOutcome::Unchanged, &cfg);
        assert_eq!(res.rearm, Some(cfg.debounce));
        assert!(state.needs_refresh());
    }

    #[test]
    fn test_backoff_delays_double_up_to_cap() {
        let cfg = config();
        let mut state = SessionState::new();
        state.on_fs_event(&cfg);
        state.on_timer_fire();

        let delays: Vec<Duration> = (0..3)
            .map(|_| {
                let res = state.on_check_result(CheckOutcome::Indeterminate, &cfg);
                assert!(!res.emit_refresh);
                assert!(state.on_timer_fire());
                res.rearm.expect("backoff must rearm")
            })
            .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn test_backoff_caps_at_max() {
        let cfg = config();
        assert_eq!(backoff_delay(1, &cfg), Duration::from_secs(1));
        assert_eq!(backoff_delay(5, &cfg), Duration::from_secs(16));
        assert_eq!(backoff_delay(6, &cfg), Duration::from_secs(30));
        assert_eq!(backoff_delay(40, &cfg), Duration::from_secs(30));
    }

    #[test]
    fn test_definitive_result_resets_streak() {
        let cfg = config();
        let mut state = SessionState::new();
        state.on_fs_event(&cfg);
        state.on_timer_fire();

        state.on_check_result(CheckOutcome::Indeterminate, &cfg);
        state.on_timer_fire();
        state.on_check_result(CheckOutcome::Indeterminate, &cfg);
        state.on_timer_fire();

        // A definitive answer clears the streak and returns to idle; the
        // re-check consumed the pending flag when it started.
        let res = state.on_check_result(CheckOutcome::Unchanged, &cfg);
        assert_eq!(res.rearm, None);
        assert!(!state.needs_refresh());

        // The next inconclusive cycle starts the backoff ladder over.
        state.on_fs_event(&cfg);
        state.on_timer_fire();
        let res = state.on_check_result(CheckOutcome::Indeterminate, &cfg);
        assert_eq!(res.rearm, Some(Duration::from_secs(1)));
    }
}
