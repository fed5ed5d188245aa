//! Device records as reported by the hub

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{DeviceId, DeviceType};
use crate::error::{ApiError, Result};
use crate::naming::split_name_location;

/// Type-specific attribute payload of a device
///
/// Every field is optional. Environment sensors routinely omit readings they
/// do not support (an indoor sensor without a PM2.5 cell, for example), and a
/// missing reading is simply `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAttributes {
    pub custom_name: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub firmware_version: Option<String>,
    pub hardware_version: Option<String>,
    pub serial_number: Option<String>,
    pub battery_percentage: Option<u8>,

    /// Open/close sensors
    pub is_open: Option<bool>,

    /// Environment sensors
    pub current_temperature: Option<f64>,
    #[serde(rename = "currentRH")]
    pub current_rh: Option<f64>,
    #[serde(rename = "currentPM25")]
    pub current_pm25: Option<f64>,
    #[serde(rename = "maxMeasuredPM25")]
    pub max_measured_pm25: Option<f64>,
    #[serde(rename = "minMeasuredPM25")]
    pub min_measured_pm25: Option<f64>,
    pub voc_index: Option<f64>,
}

/// A hub-reported device
///
/// Records are replaced wholesale on every full snapshot fetch. Between
/// fetches, consumers patch their own copy with [`DeviceRecord::apply_update`]
/// as partial update events arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: DeviceId,

    #[serde(default)]
    pub device_type: DeviceType,

    /// Last known placement tag (`placement_door`, `placement_window`, ...)
    #[serde(rename = "customIcon", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default)]
    pub is_reachable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<FixedOffset>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: DeviceAttributes,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl DeviceRecord {
    /// Decode a record from the raw JSON the hub returns for `/devices`
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn is_environment_sensor(&self) -> bool {
        self.device_type == DeviceType::EnvironmentSensor
    }

    pub fn is_open_close_sensor(&self) -> bool {
        self.device_type == DeviceType::OpenCloseSensor
    }

    /// The custom name with any leading `[tag]` stripped
    pub fn display_name(&self) -> Option<String> {
        self.attributes
            .custom_name
            .as_deref()
            .map(|name| split_name_location(name).0)
    }

    /// Patch the record in place from a partial update body
    ///
    /// The body has the event payload shape: `id`, optional `customIcon`,
    /// `isReachable`, `lastSeen` and a partial `attributes` object. Keys that
    /// are absent or `null` leave the current value untouched. The update is
    /// decoded into a copy first, so a malformed field leaves the record as it
    /// was.
    pub fn apply_update(&mut self, body: &Value) -> Result<()> {
        let update = body
            .as_object()
            .ok_or_else(|| ApiError::Parse("update body is not an object".to_string()))?;

        if let Some(id) = update.get("id").and_then(Value::as_str) {
            if id != self.id.as_str() {
                return Err(ApiError::DeviceMismatch {
                    expected: self.id.to_string(),
                    actual: id.to_string(),
                });
            }
        }

        let mut patched = self.clone();

        if let Some(icon) = update.get("customIcon").and_then(Value::as_str) {
            patched.location = Some(icon.to_string());
        }

        if let Some(reachable) = update.get("isReachable").and_then(Value::as_bool) {
            patched.is_reachable = reachable;
        }

        if let Some(last_seen) = update.get("lastSeen").filter(|v| !v.is_null()) {
            patched.last_seen = Some(serde_json::from_value(last_seen.clone())?);
        }

        if let Some(Value::Object(changes)) = update.get("attributes") {
            let mut merged = serde_json::to_value(&patched.attributes)?;
            if let Value::Object(current) = &mut merged {
                for (key, value) in changes.iter().filter(|(_, v)| !v.is_null()) {
                    current.insert(key.clone(), value.clone());
                }
            }
            patched.attributes = serde_json::from_value(merged)?;
        }

        *self = patched;
        Ok(())
    }
}
