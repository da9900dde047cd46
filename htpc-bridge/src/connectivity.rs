//! Host reachability state machine.
//!
//! Starts at `Unknown`, then flips between `Connected` and `Disconnected`
//! driven by poll and probe results. A single dropped packet must not flap
//! the UI, so the downgrade only happens after consecutive failures.
//! Going `Disconnected` never clears cached telemetry; it marks it stale
//! and gates every command that needs a live agent (Wake-on-LAN excepted).

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Unknown,
    Connected,
    Disconnected,
}

struct Inner {
    state: ConnectivityState,
    consecutive_failures: u32,
}

pub struct ConnectivityTracker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
}

impl ConnectivityTracker {
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 2;

    pub fn new(failure_threshold: u32) -> Self {
        ConnectivityTracker {
            inner: Mutex::new(Inner {
                state: ConnectivityState::Unknown,
                consecutive_failures: 0,
            }),
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.inner.lock().state
    }

    /// Commands that go through the agent are refused while disconnected;
    /// only the Wake-on-LAN broadcast stays available.
    pub fn agent_commands_blocked(&self) -> bool {
        self.state() == ConnectivityState::Disconnected
    }

    pub fn record_success(&self) -> ConnectivityState {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;
        if inner.state != ConnectivityState::Connected {
            info!("Host reachable, connectivity -> Connected");
            inner.state = ConnectivityState::Connected;
        }
        inner.state
    }

    pub fn record_failure(&self) -> ConnectivityState {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold
            && inner.state != ConnectivityState::Disconnected
        {
            warn!(
                "{} consecutive failures, connectivity -> Disconnected",
                inner.consecutive_failures
            );
            inner.state = ConnectivityState::Disconnected;
        }
        inner.state
    }
}

impl Default for ConnectivityTracker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FAILURE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let tracker = ConnectivityTracker::default();
        assert_eq!(tracker.state(), ConnectivityState::Unknown);
        assert!(!tracker.agent_commands_blocked());
    }

    #[test]
    fn test_single_failure_does_not_flap() {
        let tracker = ConnectivityTracker::default();
        tracker.record_success();
        assert_eq!(tracker.record_failure(), ConnectivityState::Connected);
        assert_eq!(tracker.record_failure(), ConnectivityState::Disconnected);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let tracker = ConnectivityTracker::default();
        tracker.record_failure();
        tracker.record_success();
        // streak restarted: one more failure is not enough
        assert_eq!(tracker.record_failure(), ConnectivityState::Connected);
        assert_eq!(tracker.record_failure(), ConnectivityState::Disconnected);
    }

    #[test]
    fn test_recovery_after_disconnect() {
        let tracker = ConnectivityTracker::default();
        tracker.record_failure();
        tracker.record_failure();
        assert!(tracker.agent_commands_blocked());

        assert_eq!(tracker.record_success(), ConnectivityState::Connected);
        assert!(!tracker.agent_commands_blocked());
    }

    #[test]
    fn test_unknown_can_go_straight_down() {
        let tracker = ConnectivityTracker::default();
        tracker.record_failure();
        assert_eq!(tracker.state(), ConnectivityState::Unknown);
        tracker.record_failure();
        assert_eq!(tracker.state(), ConnectivityState::Disconnected);
    }
}
