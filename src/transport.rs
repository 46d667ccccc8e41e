//! Command transport seam. The session talks to devices only through
//! [`CommandTransport`]; a real implementation would keep a WebSocket or HTTP
//! session per brand, while [`SimulatedTransport`] resolves after a
//! configurable delay and records every frame it would have sent.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::device::TvDevice;
use crate::error::{RemoteError, Result};
use crate::protocol::{Brand, Command};

/// App name announced to devices during connect/pairing
const APP_NAME: &str = "TvRemoteCore";

/// Device-facing operations the session depends on.
///
/// Implementations must be safe to call from spawned tasks. Every operation
/// is expected to resolve or fail; the session wraps each call in its own
/// timeout, so an implementation does not need to enforce deadlines itself.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Open a control channel to the device.
    async fn connect(&self, device: &TvDevice) -> Result<()>;

    /// Begin the pairing handshake. The device generates and displays a
    /// short numeric code; the returned value is the code the session must
    /// later match against user input.
    async fn start_pairing(&self, device: &TvDevice) -> Result<String>;

    /// Deliver one wire command to the device.
    async fn send(&self, device: &TvDevice, command: Command, wire_code: &str) -> Result<()>;

    /// Tear the control channel down. Must not fail loudly on an already
    /// closed channel.
    async fn disconnect(&self, device: &TvDevice) -> Result<()>;
}

/// One frame the simulated transport would have put on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct SentFrame {
    pub device_id: String,
    pub command: Command,
    pub wire_code: String,
    pub payload: serde_json::Value,
}

/// Transport stand-in with configurable latency.
///
/// Frames are recorded instead of transmitted, and the pairing code a device
/// "displays" is exposed through [`SimulatedTransport::last_pairing_code`] so
/// hosts and tests can read it the way a user would read the TV screen.
pub struct SimulatedTransport {
    delay: Duration,
    frames: Mutex<Vec<SentFrame>>,
    last_pairing_code: Mutex<Option<String>>,
    fail_next_connect: AtomicBool,
    disconnects: AtomicUsize,
}

impl SimulatedTransport {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            frames: Mutex::new(Vec::new()),
            last_pairing_code: Mutex::new(None),
            fail_next_connect: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Frames recorded so far, oldest first.
    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.frames.lock().expect("frame log lock poisoned").clone()
    }

    /// The code the most recent pairing handshake put on the device screen.
    pub fn last_pairing_code(&self) -> Option<String> {
        self.last_pairing_code
            .lock()
            .expect("pairing code lock poisoned")
            .clone()
    }

    /// Make the next `connect` call fail with a transport error.
    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::SeqCst);
    }

    /// How many times `disconnect` has been called.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Build the envelope a real transport would send for this brand.
    fn build_payload(device: &TvDevice, wire_code: &str) -> serde_json::Value {
        match device.brand {
            // Samsung Tizen remote channel message
            Brand::Samsung => serde_json::json!({
                "channel": format!(
                    "/api/v2/channels/samsung.remote.control?name={}",
                    BASE64.encode(APP_NAME)
                ),
                "method": "ms.remote.control",
                "params": {
                    "Cmd": "Click",
                    "DataOfCmd": wire_code,
                    "Option": "false",
                    "TypeOfRemote": "SendRemoteKey"
                }
            }),
            // webOS button input
            Brand::Lg => serde_json::json!({
                "type": "button",
                "name": wire_code,
            }),
            // Bravia IRCC payload
            Brand::Sony => serde_json::json!({
                "irccCode": wire_code,
            }),
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        // Default approximates a real websocket handshake on a LAN
        Self::new(Duration::from_millis(1500))
    }
}

#[async_trait]
impl CommandTransport for SimulatedTransport {
    async fn connect(&self, device: &TvDevice) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        if self.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err(RemoteError::transport(format!(
                "simulated connect failure for {}",
                device.id
            )));
        }
        debug!(device = %device.id, "simulated control channel open");
        Ok(())
    }

    async fn start_pairing(&self, device: &TvDevice) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        let code = format!("{:04}", rand::thread_rng().gen_range(0..10_000));
        debug!(device = %device.id, "device displaying pairing code");
        *self
            .last_pairing_code
            .lock()
            .expect("pairing code lock poisoned") = Some(code.clone());
        Ok(code)
    }

    async fn send(&self, device: &TvDevice, command: Command, wire_code: &str) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        let frame = SentFrame {
            device_id: device.id.clone(),
            command,
            wire_code: wire_code.to_string(),
            payload: Self::build_payload(device, wire_code),
        };
        debug!(device = %device.id, %command, wire_code, "simulated frame sent");
        self.frames.lock().expect("frame log lock poisoned").push(frame);
        Ok(())
    }

    async fn disconnect(&self, device: &TvDevice) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        debug!(device = %device.id, "simulated control channel closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> SimulatedTransport {
        SimulatedTransport::new(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_pairing_code_is_four_digits() {
        let transport = instant();
        let device = TvDevice::new("samsung-tv-1", "Samsung TV", Brand::Samsung);

        let code = transport.start_pairing(&device).await.unwrap();
        assert_eq!(code.len(), 4);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(transport.last_pairing_code(), Some(code));
    }

    #[tokio::test]
    async fn test_send_records_frame() {
        let transport = instant();
        let device = TvDevice::new("samsung-tv-1", "Samsung TV", Brand::Samsung);

        transport
            .send(&device, Command::Power, "KEY_POWER")
            .await
            .unwrap();

        let frames = transport.sent_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].wire_code, "KEY_POWER");
        assert_eq!(frames[0].payload["method"], "ms.remote.control");
        assert_eq!(frames[0].payload["params"]["DataOfCmd"], "KEY_POWER");
    }

    #[tokio::test]
    async fn test_samsung_channel_carries_base64_app_name() {
        let transport = instant();
        let device = TvDevice::new("samsung-tv-1", "Samsung TV", Brand::Samsung);

        transport
            .send(&device, Command::Mute, "KEY_MUTE")
            .await
            .unwrap();

        let channel = transport.sent_frames()[0].payload["channel"]
            .as_str()
            .unwrap()
            .to_string();
        let encoded = channel.rsplit("name=").next().unwrap();
        assert_eq!(BASE64.decode(encoded).unwrap(), APP_NAME.as_bytes());
    }

    #[tokio::test]
    async fn test_brand_specific_payloads() {
        let transport = instant();
        let lg = TvDevice::new("lg-tv-1", "LG TV", Brand::Lg);
        let sony = TvDevice::new("sony-tv-1", "Sony Bravia", Brand::Sony);

        transport.send(&lg, Command::Home, "HOME").await.unwrap();
        transport
            .send(&sony, Command::Power, "AAAAAQAAAAEAAAAVAw==")
            .await
            .unwrap();

        let frames = transport.sent_frames();
        assert_eq!(frames[0].payload["type"], "button");
        assert_eq!(frames[0].payload["name"], "HOME");
        assert_eq!(frames[1].payload["irccCode"], "AAAAAQAAAAEAAAAVAw==");
    }

    #[tokio::test]
    async fn test_fail_next_connect_fires_once() {
        let transport = instant();
        let device = TvDevice::new("lg-tv-1", "LG TV", Brand::Lg);

        transport.fail_next_connect();
        assert!(transport.connect(&device).await.is_err());
        assert!(transport.connect(&device).await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_count_tracks_calls() {
        let transport = instant();
        let device = TvDevice::new("sony-tv-1", "Sony Bravia", Brand::Sony);

        assert_eq!(transport.disconnect_count(), 0);
        transport.disconnect(&device).await.unwrap();
        transport.disconnect(&device).await.unwrap();
        assert_eq!(transport.disconnect_count(), 2);
    }
}
