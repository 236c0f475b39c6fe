//! Broadcast-ready events.
//!
//! Wire shape: `{"kind": "...", "payload": {...}, "timestamp": "..."}`.

use crate::error::CoreResult;
use crate::reading::Reading;
use crate::snapshot::{AppInfo, BoardInfo, Capabilities, PinDefinition, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Pin,
    Wifi,
    Bluetooth,
    System,
    Custom,
    Meta,
    Snapshot,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pin => "pin",
            EventKind::Wifi => "wifi",
            EventKind::Bluetooth => "bluetooth",
            EventKind::System => "system",
            EventKind::Custom => "custom",
            EventKind::Meta => "meta",
            EventKind::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the `meta` event sent when a subscriber joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaPayload {
    pub board: BoardInfo,
    pub app: AppInfo,
    pub timestamp: DateTime<Utc>,
    pub enabled: Capabilities,
    pub gpio_schema: BTreeMap<u8, PinDefinition>,
}

impl MetaPayload {
    pub fn from_snapshot(snapshot: &Snapshot, enabled: Capabilities) -> Self {
        Self {
            board: snapshot.board.clone(),
            app: snapshot.app.clone(),
            timestamp: Utc::now(),
            enabled,
            gpio_schema: snapshot.gpio_schema.clone(),
        }
    }
}

/// Outward representation of a committed reading, or a synthetic
/// `meta`/`snapshot` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    /// Commit sequence of the reading this event came from; 0 for synthetic events.
    #[serde(skip)]
    pub seq: u64,
}

impl Event {
    /// Build the event for a reading committed at `seq`.
    ///
    /// Interface sets are not broadcast on their own and yield `None`.
    pub fn from_reading(reading: &Reading, seq: u64) -> CoreResult<Option<Self>> {
        let (kind, payload) = match reading {
            Reading::Pin(r) => (EventKind::Pin, serde_json::to_value(r)?),
            Reading::Wifi(r) => (EventKind::Wifi, serde_json::to_value(r)?),
            Reading::Bluetooth(r) => (EventKind::Bluetooth, serde_json::to_value(r)?),
            Reading::System(r) => (EventKind::System, serde_json::to_value(r)?),
            Reading::Custom(r) => (EventKind::Custom, serde_json::to_value(r)?),
            Reading::InterfaceSet(_) => return Ok(None),
        };
        Ok(Some(Self {
            kind,
            payload,
            timestamp: reading.timestamp(),
            seq,
        }))
    }

    pub fn meta(meta: &MetaPayload) -> CoreResult<Self> {
        Ok(Self {
            kind: EventKind::Meta,
            payload: serde_json::to_value(meta)?,
            timestamp: meta.timestamp,
            seq: 0,
        })
    }

    pub fn snapshot(snapshot: &Snapshot) -> CoreResult<Self> {
        Ok(Self {
            kind: EventKind::Snapshot,
            payload: serde_json::to_value(snapshot)?,
            timestamp: Utc::now(),
            seq: 0,
        })
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.kind, EventKind::Meta | EventKind::Snapshot)
    }

    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{CustomEntry, InterfaceSet, PinState};
    use serde_json::json;

    #[test]
    fn test_pin_event_wire_shape() {
        let pin = PinState::new(17, 1).with_label("button");
        let ts = pin.timestamp;
        let event = Event::from_reading(&Reading::Pin(pin), 3).unwrap().unwrap();
        assert_eq!(event.seq, 3);
        assert_eq!(event.timestamp, ts);

        let v: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(v["kind"], "pin");
        assert_eq!(v["payload"]["pin"], 17);
        assert_eq!(v["payload"]["label"], "button");
        assert!(v["timestamp"].is_string());
        assert!(v.get("seq").is_none());
    }

    #[test]
    fn test_interface_set_has_no_event() {
        let reading = Reading::InterfaceSet(InterfaceSet::new(vec![]));
        assert!(Event::from_reading(&reading, 1).unwrap().is_none());
    }

    #[test]
    fn test_custom_event_payload() {
        let reading = Reading::Custom(CustomEntry::new("x", json!({"b": 2})));
        let event = Event::from_reading(&reading, 1).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::Custom);
        assert_eq!(event.payload["name"], "x");
        assert_eq!(event.payload["payload"], json!({"b": 2}));
    }

    #[test]
    fn test_meta_event() {
        let snap = Snapshot::default();
        let caps = Capabilities {
            gpio: false,
            ..Capabilities::default()
        };
        let event = Event::meta(&MetaPayload::from_snapshot(&snap, caps)).unwrap();
        assert!(event.is_synthetic());
        assert_eq!(event.seq, 0);
        assert_eq!(event.payload["enabled"]["gpio"], false);
        assert_eq!(event.payload["enabled"]["system_health"], true);
        assert_eq!(event.payload["app"]["debugger_version"], "unknown");
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(EventKind::Snapshot).unwrap(), "snapshot");
        assert_eq!(EventKind::Bluetooth.to_string(), "bluetooth");
    }
}
