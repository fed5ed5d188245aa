//! Device snapshot cache
//!
//! Holds the most recent full device listing. The worker builds a complete
//! [`Snapshot`] off to the side and swaps it in under one write lock, so a
//! reader sees either the previous listing or the new one, never a mix.

use std::collections::HashMap;
use std::sync::Arc;

use dirigera_api::{DeviceId, DeviceRecord, DeviceType};
use parking_lot::RwLock;
use serde_json::Value;

/// The cached full device listing as of one fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Device id to placement tag, for every device that reports one
    pub locations: HashMap<DeviceId, String>,
    pub environment_sensors: Vec<DeviceRecord>,
    pub open_close_sensors: Vec<DeviceRecord>,
}

impl Snapshot {
    /// Build a snapshot from one `/devices` response
    ///
    /// Devices that fail to decode are skipped with a warning; the rest of the
    /// listing is still usable. Locations are collected for every device type.
    pub fn from_raw(devices: &[Value]) -> Self {
        let mut snapshot = Snapshot::default();

        for raw in devices {
            let record = match DeviceRecord::from_value(raw) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        "Skipping undecodable device {:?}: {}",
                        raw.get("id"),
                        e
                    );
                    continue;
                }
            };

            if let Some(location) = &record.location {
                snapshot
                    .locations
                    .insert(record.id.clone(), location.clone());
            }

            match record.device_type {
                DeviceType::EnvironmentSensor => snapshot.environment_sensors.push(record),
                DeviceType::OpenCloseSensor => snapshot.open_close_sensors.push(record),
                DeviceType::Other(_) => {}
            }
        }

        snapshot
    }

    /// Number of sensors held, across both families
    pub fn device_count(&self) -> usize {
        self.environment_sensors.len() + self.open_close_sensors.len()
    }

    /// Look up a cached sensor of either family by id
    pub fn device(&self, id: &DeviceId) -> Option<&DeviceRecord> {
        self.environment_sensors
            .iter()
            .chain(self.open_close_sensors.iter())
            .find(|record| &record.id == id)
    }
}

/// Thread-safe holder for the current [`Snapshot`]
///
/// `None` until the first successful fetch, which lets readers tell "never
/// populated" apart from "populated but empty".
#[derive(Debug, Default)]
pub struct SnapshotCache {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a complete snapshot
    pub fn replace(&self, snapshot: Snapshot) {
        *self.current.write() = Some(Arc::new(snapshot));
    }

    /// The current snapshot, shared
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    pub fn is_populated(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn location(&self, id: &DeviceId) -> Option<String> {
        self.current.read().as_ref()?.locations.get(id).cloned()
    }

    pub fn environment_sensors(&self) -> Option<Vec<DeviceRecord>> {
        self.current
            .read()
            .as_ref()
            .map(|snapshot| snapshot.environment_sensors.clone())
    }

    pub fn open_close_sensors(&self) -> Option<Vec<DeviceRecord>> {
        self.current
            .read()
            .as_ref()
            .map(|snapshot| snapshot.open_close_sensors.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing() -> Vec<Value> {
        vec![
            json!({
                "id": "env-1",
                "deviceType": "environmentSensor",
                "customIcon": "placement_living",
                "attributes": { "customName": "Living", "currentTemperature": 21.0 }
            }),
            json!({
                "id": "door-1",
                "deviceType": "openCloseSensor",
                "customIcon": "placement_door",
                "attributes": { "customName": "Front", "isOpen": false }
            }),
            json!({
                "id": "light-1",
                "deviceType": "light",
                "customIcon": "lighting_ceiling_lamp"
            }),
            json!({ "deviceType": "openCloseSensor" }),
        ]
    }

    #[test]
    fn test_from_raw_partitions_by_type() {
        let snapshot = Snapshot::from_raw(&listing());

        assert_eq!(snapshot.environment_sensors.len(), 1);
        assert_eq!(snapshot.open_close_sensors.len(), 1);
        assert_eq!(snapshot.device_count(), 2);
        assert_eq!(snapshot.environment_sensors[0].id.as_str(), "env-1");
        assert_eq!(snapshot.open_close_sensors[0].id.as_str(), "door-1");
    }

    #[test]
    fn test_from_raw_collects_locations_for_all_devices() {
        let snapshot = Snapshot::from_raw(&listing());

        assert_eq!(snapshot.locations.len(), 3);
        assert_eq!(
            snapshot.locations.get(&DeviceId::new("light-1")).map(String::as_str),
            Some("lighting_ceiling_lamp")
        );
    }

    #[test]
    fn test_never_populated_is_distinct_from_empty() {
        let cache = SnapshotCache::new();
        assert!(!cache.is_populated());
        assert_eq!(cache.environment_sensors(), None);
        assert_eq!(cache.open_close_sensors(), None);
        assert_eq!(cache.location(&DeviceId::new("env-1")), None);

        cache.replace(Snapshot::default());
        assert!(cache.is_populated());
        assert_eq!(cache.environment_sensors(), Some(Vec::new()));
        assert_eq!(cache.open_close_sensors(), Some(Vec::new()));
    }

    #[test]
    fn test_replace_swaps_whole_listing() {
        let cache = SnapshotCache::new();
        cache.replace(Snapshot::from_raw(&listing()));
        let first = cache.snapshot().unwrap();

        cache.replace(Snapshot::from_raw(&[json!({
            "id": "door-2",
            "deviceType": "openCloseSensor"
        })]));

        assert_eq!(first.device_count(), 2);
        assert_eq!(cache.environment_sensors(), Some(Vec::new()));
        assert_eq!(cache.open_close_sensors().unwrap()[0].id.as_str(), "door-2");
        assert_eq!(cache.location(&DeviceId::new("door-1")), None);
    }

    #[test]
    fn test_device_lookup() {
        let snapshot = Snapshot::from_raw(&listing());
        assert!(snapshot.device(&DeviceId::new("door-1")).is_some());
        assert!(snapshot.device(&DeviceId::new("light-1")).is_none());
    }
}
