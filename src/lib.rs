//! tv-remote-core
//!
//! Connection and session core for a local-network TV remote control.
//!
//! The crate owns everything between the remote UI and the device transport:
//!
//! - `protocol`: brand command tables (logical command -> wire code)
//! - `device`: the discovered-device model
//! - `discovery`: cancellable network scans behind a scanner seam
//! - `session`: the connect / pair / send / disconnect state machine
//! - `events`: status and device-list fan-out to observers
//! - `reachability`: connectivity monitoring that preempts sessions
//! - `transport`: the device transport seam with a simulated implementation
//!
//! Real discovery and transport protocols plug in through the
//! [`discovery::DeviceScanner`], [`transport::CommandTransport`] and
//! [`reachability::ReachabilityMonitor`] traits; the shipped simulations
//! satisfy the same contracts with configurable delays and fixture data.

pub mod device;
pub mod discovery;
pub mod error;
pub mod events;
pub mod protocol;
pub mod reachability;
pub mod session;
pub mod transport;

// Re-export the surface an embedding app touches day to day
pub use device::TvDevice;
pub use discovery::{DeviceScanner, DiscoveryConfig, DiscoveryStatus, SimulatedScanner};
pub use error::{RemoteError, Result};
pub use events::Subscription;
pub use protocol::{Brand, Command, ProtocolTable};
pub use reachability::{ReachabilityMonitor, ReachabilityStatus, SimulatedReachability};
pub use session::{ConnectionStatus, SessionConfig, TvSession};
pub use transport::{CommandTransport, SimulatedTransport};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
