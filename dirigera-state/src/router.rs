//! Event stream routing
//!
//! Every inbound frame is expected to look like
//! `{"type": "...", "data": {"id": "<device>", ...}}`. The `data` object is
//! forwarded verbatim to the subscribers of `data.id`; frames without that
//! shape are discarded.

use dirigera_api::DeviceId;
use serde_json::Value;

use crate::registry::SubscriberRegistry;

/// Extract the target device and body from one stream frame
///
/// Returns `None` for unparseable JSON, a missing or empty `data` envelope,
/// and a missing or empty `data.id`.
pub fn parse_event(text: &str) -> Option<(DeviceId, Value)> {
    let mut message: Value = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!("Discarding unparseable event: {}", e);
            return None;
        }
    };

    let data = match message.get_mut("data").map(Value::take) {
        Some(Value::Object(map)) if !map.is_empty() => Value::Object(map),
        _ => {
            tracing::debug!("Discarding event without data envelope");
            return None;
        }
    };

    let id = match data.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => DeviceId::new(id),
        _ => {
            tracing::debug!("Discarding event without target id");
            return None;
        }
    };

    Some((id, data))
}

/// Parse one stream frame and dispatch it to the device's subscribers
///
/// Returns true if the event reached at least one subscriber. Malformed
/// frames and events for devices nobody subscribed to are dropped.
pub fn route_event(registry: &SubscriberRegistry, text: &str) -> bool {
    let Some((device_id, body)) = parse_event(text) else {
        return false;
    };

    let delivered = registry.dispatch(&device_id, body);
    if !delivered {
        tracing::trace!("No subscribers for {}, event dropped", device_id);
    }
    delivered
}
