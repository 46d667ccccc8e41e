//! Device discovery. Scans the local network for controllable TVs and pushes
//! the result set to the session over a channel. At most one scan runs at a
//! time; cancellation is deterministic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::device::TvDevice;
use crate::error::{RemoteError, Result};
use crate::protocol::Brand;
use crate::reachability::ReachabilityMonitor;

/// Discovery state for status queries
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryStatus {
    pub scanning: bool,
    pub last_scan_time: Option<i64>,
    pub device_count: u32,
    pub last_error: Option<String>,
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub scan_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { scan_timeout_ms: 10_000 }
    }
}

/// Outcome of one scan, delivered to the session's consumer task.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Finite result set; replaces the previous discovered list wholesale
    Completed(Vec<TvDevice>),
    Failed(String),
}

/// Network search seam that produces candidate devices.
///
/// A real implementation would issue SSDP/mDNS queries per brand; the
/// shipped [`SimulatedScanner`] returns fixture devices after a delay.
#[async_trait]
pub trait DeviceScanner: Send + Sync {
    async fn scan(&self) -> Result<Vec<TvDevice>>;
}

/// Scanner stand-in yielding a fixed device set after a configurable delay.
pub struct SimulatedScanner {
    delay: Duration,
    devices: Vec<TvDevice>,
}

impl SimulatedScanner {
    pub fn new(delay: Duration, devices: Vec<TvDevice>) -> Self {
        Self { delay, devices }
    }

    /// Demo device set used by the default simulated scanner.
    pub fn fixture_devices() -> Vec<TvDevice> {
        vec![
            TvDevice::new("samsung-tv-1", "Samsung TV (Living Room)", Brand::Samsung)
                .with_address("192.168.1.101".parse().expect("fixture address")),
            TvDevice::new("lg-tv-1", "LG TV (Bedroom)", Brand::Lg)
                .with_address("192.168.1.102".parse().expect("fixture address")),
            TvDevice::new("sony-tv-1", "Sony Bravia (Office)", Brand::Sony)
                .with_address("192.168.1.103".parse().expect("fixture address")),
        ]
    }
}

impl Default for SimulatedScanner {
    fn default() -> Self {
        // Default matches a realistic multicast search window
        Self::new(Duration::from_millis(2000), Self::fixture_devices())
    }
}

#[async_trait]
impl DeviceScanner for SimulatedScanner {
    async fn scan(&self) -> Result<Vec<TvDevice>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.devices.clone())
    }
}

struct EngineState {
    status: DiscoveryStatus,
    /// Bumped by every start and stop; an in-flight scan task only reports
    /// its result if the epoch still matches the one it was started with.
    epoch: u64,
}

/// Runs scans and reports outcomes. One scan in flight at most; a second
/// `start_scan` while scanning is a no-op.
pub struct DiscoveryEngine {
    state: Arc<RwLock<EngineState>>,
    scanner: Arc<dyn DeviceScanner>,
    monitor: Arc<dyn ReachabilityMonitor>,
    outcome_tx: UnboundedSender<ScanOutcome>,
    config: DiscoveryConfig,
}

impl DiscoveryEngine {
    pub fn new(
        scanner: Arc<dyn DeviceScanner>,
        monitor: Arc<dyn ReachabilityMonitor>,
        outcome_tx: UnboundedSender<ScanOutcome>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState {
                status: DiscoveryStatus {
                    scanning: false,
                    last_scan_time: None,
                    device_count: 0,
                    last_error: None,
                },
                epoch: 0,
            })),
            scanner,
            monitor,
            outcome_tx,
            config,
        }
    }

    /// Current discovery status
    pub async fn status(&self) -> DiscoveryStatus {
        self.state.read().await.status.clone()
    }

    pub async fn is_scanning(&self) -> bool {
        self.state.read().await.status.scanning
    }

    /// Start a scan. No-op while a scan is already in flight or when the
    /// network is unreachable; the latter is recorded in `last_error`
    /// instead of being raised to the caller.
    pub async fn start_scan(&self) {
        let epoch = {
            let mut state = self.state.write().await;
            if state.status.scanning {
                debug!("ignoring start_scan: {}", RemoteError::ScanInProgress);
                return;
            }
            if !self.monitor.current().connected {
                warn!("cannot scan for devices: {}", RemoteError::NetworkUnreachable);
                state.status.last_error = Some(RemoteError::NetworkUnreachable.to_string());
                return;
            }
            state.epoch += 1;
            state.status.scanning = true;
            state.status.last_error = None;
            state.epoch
        };

        let state = self.state.clone();
        let scanner = self.scanner.clone();
        let outcome_tx = self.outcome_tx.clone();
        let timeout = Duration::from_millis(self.config.scan_timeout_ms);

        tokio::spawn(async move {
            let result = tokio::time::timeout(timeout, scanner.scan()).await;

            let mut state = state.write().await;
            if state.epoch != epoch {
                // Cancelled or superseded; no completion event may fire
                debug!("discarding result of cancelled scan");
                return;
            }
            state.status.scanning = false;
            state.status.last_scan_time = Some(chrono::Utc::now().timestamp());

            match result {
                Ok(Ok(devices)) => {
                    state.status.device_count = devices.len() as u32;
                    debug!(count = devices.len(), "scan completed");
                    let _ = outcome_tx.send(ScanOutcome::Completed(devices));
                }
                Ok(Err(e)) => {
                    state.status.last_error = Some(e.to_string());
                    warn!(error = %e, "scan failed");
                    let _ = outcome_tx.send(ScanOutcome::Failed(e.to_string()));
                }
                Err(_) => {
                    let reason = RemoteError::Timeout.to_string();
                    state.status.last_error = Some(reason.clone());
                    warn!("scan timed out");
                    let _ = outcome_tx.send(ScanOutcome::Failed(reason));
                }
            }
        });
    }

    /// Cancel an in-flight scan. `scanning` flips false immediately and the
    /// cancelled scan's completion event is suppressed. Idempotent.
    pub async fn stop_scan(&self) {
        let mut state = self.state.write().await;
        if state.status.scanning {
            state.epoch += 1;
            state.status.scanning = false;
            debug!("scan cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reachability::SimulatedReachability;
    use tokio::sync::mpsc;

    fn engine_with(
        scanner: SimulatedScanner,
        monitor: SimulatedReachability,
    ) -> (DiscoveryEngine, mpsc::UnboundedReceiver<ScanOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = DiscoveryEngine::new(
            Arc::new(scanner),
            Arc::new(monitor),
            tx,
            DiscoveryConfig::default(),
        );
        (engine, rx)
    }

    #[tokio::test]
    async fn test_scan_completes_with_fixture_devices() {
        let scanner = SimulatedScanner::new(Duration::ZERO, SimulatedScanner::fixture_devices());
        let (engine, mut rx) = engine_with(scanner, SimulatedReachability::online());

        engine.start_scan().await;
        match rx.recv().await.unwrap() {
            ScanOutcome::Completed(devices) => {
                assert_eq!(devices.len(), 3);
                assert_eq!(devices[0].id, "samsung-tv-1");
            }
            other => panic!("expected completion, got {:?}", other),
        }

        let status = engine.status().await;
        assert!(!status.scanning);
        assert_eq!(status.device_count, 3);
        assert!(status.last_scan_time.is_some());
    }

    #[tokio::test]
    async fn test_second_start_scan_is_noop() {
        let scanner = SimulatedScanner::new(
            Duration::from_millis(50),
            SimulatedScanner::fixture_devices(),
        );
        let (engine, mut rx) = engine_with(scanner, SimulatedReachability::online());

        engine.start_scan().await;
        assert!(engine.is_scanning().await);
        engine.start_scan().await;

        // Exactly one completion arrives
        assert!(matches!(rx.recv().await, Some(ScanOutcome::Completed(_))));
        assert!(!engine.is_scanning().await);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_scan_suppresses_completion() {
        let scanner = SimulatedScanner::new(
            Duration::from_millis(50),
            SimulatedScanner::fixture_devices(),
        );
        let (engine, mut rx) = engine_with(scanner, SimulatedReachability::online());

        engine.start_scan().await;
        engine.stop_scan().await;
        assert!(!engine.is_scanning().await);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_scan_idempotent_when_idle() {
        let (engine, _rx) =
            engine_with(SimulatedScanner::default(), SimulatedReachability::online());
        engine.stop_scan().await;
        assert!(!engine.is_scanning().await);
    }

    #[tokio::test]
    async fn test_scan_declined_when_unreachable() {
        let monitor = SimulatedReachability::online();
        monitor.go_offline();
        let scanner = SimulatedScanner::new(Duration::ZERO, SimulatedScanner::fixture_devices());
        let (engine, mut rx) = engine_with(scanner, monitor);

        engine.start_scan().await;
        assert!(!engine.is_scanning().await);
        assert_eq!(
            engine.status().await.last_error.as_deref(),
            Some("network is not reachable")
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_scan_after_stop_starts_fresh() {
        let scanner = SimulatedScanner::new(
            Duration::from_millis(30),
            SimulatedScanner::fixture_devices(),
        );
        let (engine, mut rx) = engine_with(scanner, SimulatedReachability::online());

        engine.start_scan().await;
        engine.stop_scan().await;
        engine.start_scan().await;

        // Only the second scan reports
        assert!(matches!(rx.recv().await, Some(ScanOutcome::Completed(_))));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());
    }
}
