//! Per-device subscriber registry
//!
//! Maps a device id to the ordered list of callbacks interested in it.
//! Dispatch hands each callback to the executor in registration order and
//! returns immediately; whether a callback succeeds is invisible to the
//! sender of the event.
//!
//! Registering the same consumer twice for one device is allowed and yields
//! two deliveries per event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dirigera_api::DeviceId;
use parking_lot::RwLock;
use serde_json::Value;

use crate::executor::Executor;

/// Callback receiving the body of an update event
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Token identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Entry {
    id: SubscriberId,
    callback: EventCallback,
}

/// Thread-safe device id → callbacks registry
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<DeviceId, Vec<Entry>>>,
    next_id: AtomicU64,
    executor: Arc<dyn Executor>,
}

impl SubscriberRegistry {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            executor,
        }
    }

    /// Append a callback to the device's list, creating the list if absent
    pub fn register(&self, device_id: DeviceId, callback: EventCallback) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut subscribers = self.subscribers.write();
        let entries = subscribers.entry(device_id.clone()).or_default();
        entries.push(Entry { id, callback });

        tracing::debug!(
            "Registered {} for device {} ({} subscriber(s))",
            id,
            device_id,
            entries.len()
        );
        id
    }

    /// Remove one registration; returns false if the token is unknown
    ///
    /// A device left without subscribers is dropped from the registry, so
    /// later dispatches for it report no delivery.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();

        let Some(device_id) = subscribers
            .iter()
            .find(|(_, entries)| entries.iter().any(|e| e.id == id))
            .map(|(device_id, _)| device_id.clone())
        else {
            return false;
        };

        if let Some(entries) = subscribers.get_mut(&device_id) {
            entries.retain(|e| e.id != id);
            if entries.is_empty() {
                subscribers.remove(&device_id);
            }
        }

        tracing::debug!("Unregistered {} from device {}", id, device_id);
        true
    }

    /// Hand `payload` to every callback registered for `device_id`
    ///
    /// Returns true if at least one callback was scheduled. Callbacks are
    /// submitted in registration order; the registry lock is released before
    /// any of them is submitted, so callbacks may register or unregister.
    pub fn dispatch(&self, device_id: &DeviceId, payload: Value) -> bool {
        let callbacks: Vec<EventCallback> = match self.subscribers.read().get(device_id) {
            Some(entries) if !entries.is_empty() => {
                entries.iter().map(|e| Arc::clone(&e.callback)).collect()
            }
            _ => return false,
        };

        tracing::trace!(
            "Dispatching update for {} to {} subscriber(s)",
            device_id,
            callbacks.len()
        );

        let payload = Arc::new(payload);
        for callback in callbacks {
            let payload = Arc::clone(&payload);
            self.executor
                .execute(Box::new(move || callback(payload.as_ref())));
        }

        true
    }

    pub fn subscriber_count(&self, device_id: &DeviceId) -> usize {
        self.subscribers
            .read()
            .get(device_id)
            .map_or(0, Vec::len)
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.subscribers.read().keys().cloned().collect()
    }
}
