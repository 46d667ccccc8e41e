//! Discoverable TV device model.

use std::net::IpAddr;

use serde::Serialize;

use crate::protocol::{self, Brand, ProtocolTable};

/// A television found on the local network.
///
/// Constructed by the discovery engine and immutable afterwards; the whole
/// discovered set is replaced on each completed scan. Observers get shared
/// read-only clones.
#[derive(Debug, Clone, Serialize)]
pub struct TvDevice {
    /// Stable id, unique within a discovered set
    pub id: String,
    /// Display name shown by the UI
    pub name: String,
    pub brand: Brand,
    /// Network locator; absent until discovery resolves it
    pub address: Option<IpAddr>,
    /// Command table for the brand, resolved at discovery time
    #[serde(skip)]
    pub protocol: &'static ProtocolTable,
}

impl TvDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, brand: Brand) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            brand,
            address: None,
            protocol: protocol::resolve(brand),
        }
    }

    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Command;

    #[test]
    fn test_device_resolves_protocol_at_construction() {
        let device = TvDevice::new("samsung-tv-1", "Samsung TV (Living Room)", Brand::Samsung);
        assert_eq!(device.protocol.wire_code(Command::Power), "KEY_POWER");
        assert!(device.address.is_none());
    }

    #[test]
    fn test_with_address() {
        let device = TvDevice::new("sony-tv-1", "Sony Bravia (Office)", Brand::Sony)
            .with_address("192.168.1.103".parse().unwrap());
        assert_eq!(device.address.unwrap().to_string(), "192.168.1.103");
    }

    #[test]
    fn test_device_serializes_without_protocol_table() {
        let device = TvDevice::new("lg-tv-1", "LG TV (Bedroom)", Brand::Lg);
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["brand"], "lg");
        assert!(json.get("protocol").is_none());
    }
}
