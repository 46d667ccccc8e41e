//! Local network reachability. The host platform reports connectivity
//! transitions; the session watches them and force-disconnects on loss.

use serde::Serialize;
use tokio::sync::watch;

/// Connectivity snapshot as reported by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReachabilityStatus {
    pub connected: bool,
    /// Platform connection type, e.g. "wifi", "cellular", "none"
    pub connection_type: String,
}

impl ReachabilityStatus {
    pub fn wifi() -> Self {
        Self { connected: true, connection_type: "wifi".to_string() }
    }

    pub fn offline() -> Self {
        Self { connected: false, connection_type: "none".to_string() }
    }
}

/// Source of connectivity state. Implemented by the host platform bridge;
/// the shipped [`SimulatedReachability`] stands in for it in tests and demos.
pub trait ReachabilityMonitor: Send + Sync {
    /// Current connectivity state.
    fn current(&self) -> ReachabilityStatus;

    /// Watch for transitions. Each receiver observes every change that
    /// happens after it subscribes.
    fn subscribe(&self) -> watch::Receiver<ReachabilityStatus>;
}

/// Reachability source with host-togglable state.
pub struct SimulatedReachability {
    tx: watch::Sender<ReachabilityStatus>,
}

impl SimulatedReachability {
    pub fn new(initial: ReachabilityStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Start online on wifi, the common case for a phone on the home network.
    pub fn online() -> Self {
        Self::new(ReachabilityStatus::wifi())
    }

    pub fn set_status(&self, status: ReachabilityStatus) {
        // send_replace keeps working even with no active receivers
        self.tx.send_replace(status);
    }

    pub fn go_offline(&self) {
        self.set_status(ReachabilityStatus::offline());
    }

    pub fn go_online(&self) {
        self.set_status(ReachabilityStatus::wifi());
    }
}

impl ReachabilityMonitor for SimulatedReachability {
    fn current(&self) -> ReachabilityStatus {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<ReachabilityStatus> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let monitor = SimulatedReachability::online();
        assert!(monitor.current().connected);
        assert_eq!(monitor.current().connection_type, "wifi");
    }

    #[tokio::test]
    async fn test_subscriber_sees_transition() {
        let monitor = SimulatedReachability::online();
        let mut rx = monitor.subscribe();

        monitor.go_offline();
        rx.changed().await.unwrap();
        assert!(!rx.borrow().connected);

        monitor.go_online();
        rx.changed().await.unwrap();
        assert!(rx.borrow().connected);
    }

    #[test]
    fn test_toggle_without_subscribers() {
        let monitor = SimulatedReachability::online();
        monitor.go_offline();
        assert!(!monitor.current().connected);
    }
}
