//! Connection session state machine. At most one device session is active at
//! a time: connect issues a pairing challenge, a verified code completes the
//! session, commands are gated on the connected state, and a reachability
//! loss preempts everything back to disconnected.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::device::TvDevice;
use crate::discovery::{
    DeviceScanner, DiscoveryConfig, DiscoveryEngine, DiscoveryStatus, ScanOutcome,
};
use crate::error::RemoteError;
use crate::events::{EventBus, Subscription};
use crate::protocol::Command;
use crate::reachability::{ReachabilityMonitor, ReachabilityStatus};
use crate::transport::CommandTransport;

/// Session connection states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub connect_timeout_ms: u64,
    pub send_timeout_ms: u64,
    pub discovery: DiscoveryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            send_timeout_ms: 5_000,
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// A pairing challenge issued at connect time and not yet answered.
#[derive(Debug, Clone)]
struct PendingPairing {
    device: TvDevice,
    expected_code: String,
}

#[derive(Default)]
struct SessionState {
    status: ConnectionStatus,
    discovered_devices: Vec<TvDevice>,
    connected_device: Option<TvDevice>,
    pending_pairing: Option<PendingPairing>,
}

/// The single long-lived session object. Construct one per app and hand it
/// by reference to every consumer; all state mutation funnels through its
/// methods.
///
/// Invariants: `connected_device` is set iff the status is `Connected`, and
/// a pending pairing exists iff the status is `Connecting` with an issued
/// challenge.
pub struct TvSession {
    state: Arc<RwLock<SessionState>>,
    bus: EventBus,
    discovery: DiscoveryEngine,
    transport: Arc<dyn CommandTransport>,
    monitor: Arc<dyn ReachabilityMonitor>,
    config: SessionConfig,
}

impl TvSession {
    pub fn new(
        scanner: Arc<dyn DeviceScanner>,
        transport: Arc<dyn CommandTransport>,
        monitor: Arc<dyn ReachabilityMonitor>,
        config: SessionConfig,
    ) -> Self {
        let state = Arc::new(RwLock::new(SessionState::default()));
        let bus = EventBus::new();

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let discovery = DiscoveryEngine::new(
            scanner,
            monitor.clone(),
            outcome_tx,
            config.discovery.clone(),
        );

        Self::spawn_scan_consumer(state.clone(), bus.clone(), outcome_rx);
        Self::spawn_reachability_watch(
            state.clone(),
            bus.clone(),
            transport.clone(),
            monitor.subscribe(),
        );

        Self { state, bus, discovery, transport, monitor, config }
    }

    // ---- read surface ----

    pub async fn status(&self) -> ConnectionStatus {
        self.state.read().await.status
    }

    /// Snapshot of the most recent scan's result set.
    pub async fn discovered_devices(&self) -> Vec<TvDevice> {
        self.state.read().await.discovered_devices.clone()
    }

    pub async fn connected_device(&self) -> Option<TvDevice> {
        self.state.read().await.connected_device.clone()
    }

    /// The device a pairing challenge is outstanding for, if any. The UI
    /// uses this to name the device in its code-entry prompt.
    pub async fn pending_device(&self) -> Option<TvDevice> {
        self.state
            .read()
            .await
            .pending_pairing
            .as_ref()
            .map(|p| p.device.clone())
    }

    pub async fn is_scanning(&self) -> bool {
        self.discovery.is_scanning().await
    }

    pub async fn discovery_status(&self) -> DiscoveryStatus {
        self.discovery.status().await
    }

    pub fn reachability(&self) -> ReachabilityStatus {
        self.monitor.current()
    }

    /// Subscribe to connection status changes.
    pub fn subscribe_status(&self) -> Subscription<ConnectionStatus> {
        self.bus.subscribe_status()
    }

    /// Subscribe to device-list changes. The current list is replayed to the
    /// new subscriber immediately.
    pub async fn subscribe_devices(&self) -> Subscription<Vec<TvDevice>> {
        // Registering under the state lock keeps the replay snapshot and the
        // subscriber insert atomic with respect to list replacement
        let state = self.state.read().await;
        self.bus.subscribe_devices(state.discovered_devices.clone())
    }

    // ---- discovery ----

    pub async fn start_scan(&self) {
        self.discovery.start_scan().await;
    }

    pub async fn stop_scan(&self) {
        self.discovery.stop_scan().await;
    }

    // ---- session operations ----

    /// Connect to a discovered device and issue its pairing challenge.
    ///
    /// Returns true once the challenge is outstanding; the session then
    /// stays in `Connecting` until [`TvSession::verify_pairing_code`]
    /// resolves it. Connecting while a session is already active tears the
    /// old session down first, preserving the single-active-session rule.
    pub async fn connect_to_device(&self, device_id: &str) -> bool {
        let device = {
            let state = self.state.read().await;
            match state
                .discovered_devices
                .iter()
                .find(|d| d.id == device_id)
            {
                Some(device) => device.clone(),
                None => {
                    let cause = RemoteError::UnknownDevice(device_id.to_string());
                    error!(error = %cause, "connect rejected");
                    return false;
                }
            }
        };

        let active = {
            let state = self.state.read().await;
            matches!(
                state.status,
                ConnectionStatus::Connecting | ConnectionStatus::Connected
            )
        };
        if active {
            self.disconnect().await;
        }

        {
            let mut state = self.state.write().await;
            Self::update_status(&mut state, &self.bus, ConnectionStatus::Connecting);
        }
        info!(device = %device.id, address = ?device.address, "connecting");

        let handshake = async {
            self.transport.connect(&device).await?;
            self.transport.start_pairing(&device).await
        };
        let deadline = Duration::from_millis(self.config.connect_timeout_ms);

        match tokio::time::timeout(deadline, handshake).await {
            Ok(Ok(code)) => {
                {
                    let mut state = self.state.write().await;
                    if state.status == ConnectionStatus::Connecting {
                        state.pending_pairing =
                            Some(PendingPairing { device, expected_code: code });
                        return true;
                    }
                }
                // Reachability loss or teardown preempted the handshake; the
                // channel it opened must not outlive the discarded challenge
                debug!(device = %device.id, "connect preempted, discarding challenge");
                self.teardown_channel(&device).await;
                false
            }
            Ok(Err(e)) => {
                self.fail_connect(&device, e).await;
                false
            }
            Err(elapsed) => {
                self.fail_connect(&device, elapsed.into()).await;
                false
            }
        }
    }

    /// Answer the outstanding pairing challenge.
    ///
    /// An exact match completes the session; anything else (including a call
    /// with no challenge outstanding) clears the pairing state and returns
    /// false. There is no retry against a consumed challenge.
    pub async fn verify_pairing_code(&self, code: &str) -> bool {
        let rejected = {
            let mut state = self.state.write().await;
            let Some(pending) = state.pending_pairing.take() else {
                let cause = RemoteError::pairing("no pairing in progress");
                warn!(error = %cause, "verification rejected");
                return false;
            };

            if pending.expected_code == code {
                info!(device = %pending.device.id, "paired");
                state.connected_device = Some(pending.device);
                Self::update_status(&mut state, &self.bus, ConnectionStatus::Connected);
                return true;
            }

            let cause = RemoteError::pairing("code mismatch");
            warn!(device = %pending.device.id, error = %cause, "pairing rejected");
            Self::update_status(&mut state, &self.bus, ConnectionStatus::Disconnected);
            pending.device
        };

        // The channel opened at connect time dies with the failed pairing
        self.teardown_channel(&rejected).await;
        false
    }

    /// Send a logical command to the connected device.
    ///
    /// Rejected locally whenever the session is not connected; the transport
    /// is never reached in that case. Delivery failure leaves the session
    /// state untouched.
    pub async fn send_command(&self, command: Command) -> bool {
        let device = {
            let state = self.state.read().await;
            if state.status != ConnectionStatus::Connected {
                warn!(%command, status = %state.status, "command rejected, not connected");
                return false;
            }
            let Some(device) = state.connected_device.clone() else {
                // unreachable by invariant, but degrade instead of panicking
                error!("connected status without a connected device");
                return false;
            };
            device
        };

        let wire_code = device.protocol.wire_code(command);
        debug!(device = %device.id, %command, wire_code, "sending command");

        let deadline = Duration::from_millis(self.config.send_timeout_ms);
        match tokio::time::timeout(deadline, self.transport.send(&device, command, wire_code))
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(device = %device.id, %command, error = %e, "command delivery failed");
                false
            }
            Err(_) => {
                error!(device = %device.id, %command, "command delivery timed out");
                false
            }
        }
    }

    /// Tear down the current session. No-op when already disconnected; an
    /// `Error` status resets to `Disconnected`.
    pub async fn disconnect(&self) {
        let device = {
            let mut state = self.state.write().await;
            match state.status {
                ConnectionStatus::Connected => {
                    let device = state.connected_device.take();
                    Self::update_status(&mut state, &self.bus, ConnectionStatus::Disconnected);
                    device
                }
                ConnectionStatus::Connecting => {
                    let device = state.pending_pairing.take().map(|p| p.device);
                    Self::update_status(&mut state, &self.bus, ConnectionStatus::Disconnected);
                    device
                }
                ConnectionStatus::Error => {
                    Self::update_status(&mut state, &self.bus, ConnectionStatus::Disconnected);
                    None
                }
                ConnectionStatus::Disconnected => None,
            }
        };

        if let Some(device) = device {
            self.teardown_channel(&device).await;
            info!(device = %device.id, "disconnected");
        }
    }

    // ---- internals ----

    fn update_status(state: &mut SessionState, bus: &EventBus, status: ConnectionStatus) {
        state.status = status;
        bus.publish_status(status);
    }

    /// Best-effort channel teardown; local state is already clean.
    async fn teardown_channel(&self, device: &TvDevice) {
        if let Err(e) = self.transport.disconnect(device).await {
            debug!(device = %device.id, error = %e, "transport teardown failed");
        }
    }

    async fn fail_connect(&self, device: &TvDevice, cause: RemoteError) {
        error!(device = %device.id, error = %cause, "connect failed");
        {
            let mut state = self.state.write().await;
            if state.status == ConnectionStatus::Connecting {
                state.pending_pairing = None;
                Self::update_status(&mut state, &self.bus, ConnectionStatus::Error);
            }
        }
        // The channel may be half-open after a failed handshake
        self.teardown_channel(device).await;
    }

    /// Applies completed scans to the shared device list and fans the new
    /// list out to observers.
    fn spawn_scan_consumer(
        state: Arc<RwLock<SessionState>>,
        bus: EventBus,
        mut outcome_rx: UnboundedReceiver<ScanOutcome>,
    ) {
        tokio::spawn(async move {
            while let Some(outcome) = outcome_rx.recv().await {
                match outcome {
                    ScanOutcome::Completed(devices) => {
                        let mut state = state.write().await;
                        state.discovered_devices = devices;
                        info!(
                            count = state.discovered_devices.len(),
                            "scan completed, device list replaced"
                        );
                        bus.publish_devices(&state.discovered_devices);
                    }
                    ScanOutcome::Failed(reason) => {
                        warn!(%reason, "scan failed");
                    }
                }
            }
        });
    }

    /// Forces a disconnect when connectivity drops while a session is
    /// connecting or connected. Fires once per loss event.
    fn spawn_reachability_watch(
        state: Arc<RwLock<SessionState>>,
        bus: EventBus,
        transport: Arc<dyn CommandTransport>,
        mut reachability_rx: watch::Receiver<ReachabilityStatus>,
    ) {
        tokio::spawn(async move {
            while reachability_rx.changed().await.is_ok() {
                let connected = reachability_rx.borrow_and_update().connected;
                if connected {
                    continue;
                }
                let device = {
                    let mut state = state.write().await;
                    match state.status {
                        ConnectionStatus::Connecting | ConnectionStatus::Connected => {
                            warn!("network lost, forcing disconnect");
                            let device = state
                                .connected_device
                                .take()
                                .or_else(|| state.pending_pairing.take().map(|p| p.device));
                            Self::update_status(
                                &mut state,
                                &bus,
                                ConnectionStatus::Disconnected,
                            );
                            device
                        }
                        _ => None,
                    }
                };
                // A handshake still in flight tears its own channel down
                // when it sees the preemption; only settled channels are
                // closed here
                if let Some(device) = device {
                    if let Err(e) = transport.disconnect(&device).await {
                        debug!(device = %device.id, error = %e, "transport teardown failed");
                    }
                }
            }
        });
    }
}
