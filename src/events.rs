//! Event fan-out for session observers. Two independent channels: connection
//! status changes and device-list changes. UI layers subscribe instead of
//! polling session fields.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::device::TvDevice;
use crate::session::ConnectionStatus;

struct BusInner {
    next_id: u64,
    status: HashMap<u64, UnboundedSender<ConnectionStatus>>,
    devices: HashMap<u64, UnboundedSender<Vec<TvDevice>>>,
}

/// Subscriber registry for session events.
///
/// Each subscriber drains its own unbounded channel, so delivery never blocks
/// the session and a subscriber dropping mid-fanout cannot skip or
/// double-deliver to the others. Events are sent in mutation order.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 0,
                status: HashMap::new(),
                devices: HashMap::new(),
            })),
        }
    }

    /// Subscribe to connection status changes. No replay: the first event a
    /// new subscriber sees is the next status transition.
    pub fn subscribe_status(&self) -> Subscription<ConnectionStatus> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.inner.lock().expect("event bus lock poisoned");
            let id = inner.next_id;
            inner.next_id += 1;
            inner.status.insert(id, tx);
            id
        };
        Subscription { id, bus: self.clone(), rx }
    }

    /// Subscribe to device-list changes. The current list is replayed to the
    /// new subscriber immediately, before any future change event.
    pub fn subscribe_devices(&self, current: Vec<TvDevice>) -> Subscription<Vec<TvDevice>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.inner.lock().expect("event bus lock poisoned");
            let id = inner.next_id;
            inner.next_id += 1;
            let _ = tx.send(current);
            inner.devices.insert(id, tx);
            id
        };
        Subscription { id, bus: self.clone(), rx }
    }

    /// Fan a status change out to all status subscribers.
    pub(crate) fn publish_status(&self, status: ConnectionStatus) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        inner.status.retain(|id, tx| {
            let alive = tx.send(status).is_ok();
            if !alive {
                debug!(subscriber = id, "dropping dead status subscriber");
            }
            alive
        });
    }

    /// Fan the current device list out to all device-list subscribers.
    pub(crate) fn publish_devices(&self, devices: &[TvDevice]) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        inner.devices.retain(|id, tx| {
            let alive = tx.send(devices.to_vec()).is_ok();
            if !alive {
                debug!(subscriber = id, "dropping dead device subscriber");
            }
            alive
        });
    }

    fn remove(&self, id: u64) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        inner.status.remove(&id);
        inner.devices.remove(&id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one subscriber. Dropping it unsubscribes; explicit
/// `unsubscribe` is idempotent and safe at any time.
pub struct Subscription<T> {
    id: u64,
    bus: EventBus,
    rx: UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next event. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(&self) {
        self.bus.remove(self.id);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.bus.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Brand;

    fn fixture_devices() -> Vec<TvDevice> {
        vec![
            TvDevice::new("samsung-tv-1", "Samsung TV (Living Room)", Brand::Samsung),
            TvDevice::new("lg-tv-1", "LG TV (Bedroom)", Brand::Lg),
        ]
    }

    #[tokio::test]
    async fn test_status_fanout_in_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_status();

        bus.publish_status(ConnectionStatus::Connecting);
        bus.publish_status(ConnectionStatus::Connected);

        assert_eq!(sub.recv().await, Some(ConnectionStatus::Connecting));
        assert_eq!(sub.recv().await, Some(ConnectionStatus::Connected));
    }

    #[tokio::test]
    async fn test_status_subscribers_get_no_replay() {
        let bus = EventBus::new();
        bus.publish_status(ConnectionStatus::Connected);

        let mut sub = bus.subscribe_status();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_device_subscriber_gets_replay_first() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_devices(fixture_devices());

        // Replay arrives before any later publish
        bus.publish_devices(&[]);
        let first = sub.recv().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, "samsung-tv-1");
        let second = sub.recv().await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let sub = bus.subscribe_status();
        sub.unsubscribe();
        sub.unsubscribe();

        // A later publish must not panic or deliver to the removed channel
        bus.publish_status(ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_break_fanout() {
        let bus = EventBus::new();
        let dropped = bus.subscribe_status();
        let mut kept = bus.subscribe_status();
        drop(dropped);

        bus.publish_status(ConnectionStatus::Connecting);
        assert_eq!(kept.recv().await, Some(ConnectionStatus::Connecting));
    }

    #[tokio::test]
    async fn test_independent_channels() {
        let bus = EventBus::new();
        let mut status_sub = bus.subscribe_status();
        let mut device_sub = bus.subscribe_devices(Vec::new());

        bus.publish_devices(&fixture_devices());
        bus.publish_status(ConnectionStatus::Connecting);

        // Device subscriber sees replay + update, status subscriber only status
        assert!(device_sub.recv().await.unwrap().is_empty());
        assert_eq!(device_sub.recv().await.unwrap().len(), 2);
        assert_eq!(status_sub.recv().await, Some(ConnectionStatus::Connecting));
        assert!(status_sub.try_recv().is_none());
    }
}
