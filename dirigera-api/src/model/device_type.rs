//! Device type tag

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `deviceType` tag reported by the hub
///
/// Only the sensor families this crate caches get their own variant; every
/// other tag is preserved in `Other` so it round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceType {
    EnvironmentSensor,
    OpenCloseSensor,
    Other(String),
}

impl DeviceType {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceType::EnvironmentSensor => "environmentSensor",
            DeviceType::OpenCloseSensor => "openCloseSensor",
            DeviceType::Other(tag) => tag,
        }
    }
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Other(String::new())
    }
}

impl From<String> for DeviceType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "environmentSensor" => DeviceType::EnvironmentSensor,
            "openCloseSensor" => DeviceType::OpenCloseSensor,
            _ => DeviceType::Other(tag),
        }
    }
}

impl From<&str> for DeviceType {
    fn from(tag: &str) -> Self {
        DeviceType::from(tag.to_string())
    }
}

impl From<DeviceType> for String {
    fn from(device_type: DeviceType) -> Self {
        device_type.as_str().to_string()
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
