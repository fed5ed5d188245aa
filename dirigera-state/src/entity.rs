//! Consumers known to the hub, and their availability
//!
//! Availability is a property of the connection, not of any device's data:
//! when the event stream comes or goes, every known entity is told, whether
//! or not it has ever received an update.
//!
//! The hub only keeps [`Weak`] handles. An entity that the host drops simply
//! stops being notified; the hub does not need to know about teardown order.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use dirigera_api::{DeviceId, DeviceRecord};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::executor::Executor;

/// A consumer that renders one device (or one facet of it)
pub trait HubEntity: Send + Sync {
    /// Unique id of this entity; several entities may share a device
    fn entity_id(&self) -> &str;

    /// Device whose update events this entity consumes
    fn device_id(&self) -> &DeviceId;

    /// Connection availability changed
    fn set_available(&self, available: bool);

    /// An update event arrived for [`device_id`](Self::device_id)
    fn handle_update(&self, body: &Value);
}

/// Entity id → weak entity handle
#[derive(Default)]
pub struct EntityRegistry {
    entities: RwLock<HashMap<String, Weak<dyn HubEntity>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember an entity; an entity with the same id is replaced
    pub fn insert(&self, entity: &Arc<dyn HubEntity>) {
        self.entities
            .write()
            .insert(entity.entity_id().to_string(), Arc::downgrade(entity));
    }

    pub fn remove(&self, entity_id: &str) -> bool {
        self.entities.write().remove(entity_id).is_some()
    }

    /// Number of entities still alive
    pub fn len(&self) -> usize {
        self.entities
            .read()
            .values()
            .filter(|e| e.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedule `set_available(available)` on every live entity
    ///
    /// Handles whose entity has been dropped are pruned on the way.
    pub fn broadcast_availability(&self, available: bool, executor: &dyn Executor) {
        let live: Vec<Arc<dyn HubEntity>> = {
            let mut entities = self.entities.write();
            entities.retain(|_, weak| weak.strong_count() > 0);
            entities.values().filter_map(Weak::upgrade).collect()
        };

        tracing::debug!(
            "Hub {} for {} entit(ies)",
            if available { "available" } else { "unavailable" },
            live.len()
        );

        for entity in live {
            executor.execute(Box::new(move || entity.set_available(available)));
        }
    }
}

/// Mutable view of one device held by a [`DeviceEntity`]
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub record: DeviceRecord,
    pub available: bool,
}

/// Ready-made entity that mirrors one device record
///
/// Each update event is patched into the record in place. Reachability
/// reported by the device (`isReachable`) also drives availability, as a
/// device can drop off the hub while the hub's own stream stays up.
pub struct DeviceEntity {
    entity_id: String,
    device_id: DeviceId,
    state: Mutex<DeviceState>,
}

impl DeviceEntity {
    pub fn new(record: DeviceRecord) -> Self {
        Self::with_entity_id(record.id.to_string(), record)
    }

    /// Use a distinct entity id, e.g. `"<device>-temp"` for one reading of
    /// a multi-sensor
    pub fn with_entity_id(entity_id: impl Into<String>, record: DeviceRecord) -> Self {
        let available = record.is_reachable;
        Self {
            entity_id: entity_id.into(),
            device_id: record.id.clone(),
            state: Mutex::new(DeviceState { record, available }),
        }
    }

    /// Copy of the current state
    pub fn state(&self) -> DeviceState {
        self.state.lock().clone()
    }

    pub fn record(&self) -> DeviceRecord {
        self.state.lock().record.clone()
    }

    pub fn is_available(&self) -> bool {
        self.state.lock().available
    }
}

impl HubEntity for DeviceEntity {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    fn handle_update(&self, body: &Value) {
        let mut state = self.state.lock();
        match state.record.apply_update(body) {
            Ok(()) => {
                if body.get("isReachable").and_then(Value::as_bool).is_some() {
                    state.available = state.record.is_reachable;
                }
            }
            Err(e) => {
                tracing::debug!("Ignoring update for {}: {}", self.entity_id, e);
            }
        }
    }
}
