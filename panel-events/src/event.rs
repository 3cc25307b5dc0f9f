//! Dashboard event wire format.
//!
//! Events are serialized as JSON objects with a `type` discriminator and
//! framed for Server-Sent Events as `data: <json>\n\n`.

use panel_core::{now_ms, Params};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Refresh settings echoed to clients with every automatic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    /// Seconds between automatic updates.
    pub interval: u64,
    /// Whether components are picked at random.
    pub random_mode: bool,
}

/// Messages pushed to dashboard subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// Keep-alive emitted when a subscriber's queue stays empty.
    Heartbeat { timestamp: i64 },

    /// Manual update pushed through the update endpoint.
    Update {
        #[serde(rename = "componentId")]
        component_id: String,
        params: Params,
        timestamp: i64,
    },

    /// Update chosen by the refresh coordinator.
    AutoUpdate {
        #[serde(rename = "componentId")]
        component_id: String,
        params: Params,
        timestamp: i64,
        server_config: ServerSnapshot,
    },
}

impl DashboardEvent {
    pub fn heartbeat() -> Self {
        Self::Heartbeat { timestamp: now_ms() }
    }

    pub fn update(component_id: impl Into<String>, params: Params) -> Self {
        Self::Update {
            component_id: component_id.into(),
            params,
            timestamp: now_ms(),
        }
    }

    /// Automatic refresh of `component_id`, flagged with `auto_refresh: true`.
    pub fn auto_update(component_id: impl Into<String>, server_config: ServerSnapshot) -> Self {
        let mut params = Params::new();
        params.insert("auto_refresh".to_string(), json!(true));
        Self::AutoUpdate {
            component_id: component_id.into(),
            params,
            timestamp: now_ms(),
            server_config,
        }
    }

    /// Get the event type as a string for logging and metric labels.
    pub fn event_type(&self) -> &'static str {
        match self {
            DashboardEvent::Heartbeat { .. } => "heartbeat",
            DashboardEvent::Update { .. } => "update",
            DashboardEvent::AutoUpdate { .. } => "auto_update",
        }
    }

    /// Component targeted by the event, if any.
    pub fn component_id(&self) -> Option<&str> {
        match self {
            DashboardEvent::Heartbeat { .. } => None,
            DashboardEvent::Update { component_id, .. }
            | DashboardEvent::AutoUpdate { component_id, .. } => Some(component_id),
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            DashboardEvent::Heartbeat { timestamp }
            | DashboardEvent::Update { timestamp, .. }
            | DashboardEvent::AutoUpdate { timestamp, .. } => *timestamp,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Frame the event as a Server-Sent Events message.
    pub fn to_sse_frame(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_wire_shape() {
        let event = DashboardEvent::Heartbeat { timestamp: 42 };
        assert_eq!(event.to_json(), json!({"type": "heartbeat", "timestamp": 42}));

        let frame = event.to_sse_frame();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        let body: Value = serde_json::from_str(frame.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(body, event.to_json());
    }

    #[test]
    fn test_update_wire_shape() {
        let mut params = Params::new();
        params.insert("range".to_string(), json!("1d"));
        let event = DashboardEvent::Update {
            component_id: "chart1".to_string(),
            params,
            timestamp: 7,
        };
        assert_eq!(
            event.to_json(),
            json!({"type": "update", "componentId": "chart1", "params": {"range": "1d"}, "timestamp": 7})
        );
        assert_eq!(event.component_id(), Some("chart1"));
    }

    #[test]
    fn test_auto_update_wire_shape() {
        let event = DashboardEvent::auto_update(
            "table2",
            ServerSnapshot {
                interval: 30,
                random_mode: true,
            },
        );
        let json = event.to_json();
        assert_eq!(json["type"], "auto_update");
        assert_eq!(json["componentId"], "table2");
        assert_eq!(json["params"], json!({"auto_refresh": true}));
        assert_eq!(json["server_config"], json!({"interval": 30, "random_mode": true}));
        assert!(json["timestamp"].as_i64().unwrap() > 0);
        assert_eq!(event.event_type(), "auto_update");
    }

    #[test]
    fn test_event_deserializes() -> Result<(), serde_json::Error> {
        let event: DashboardEvent =
            serde_json::from_str(r#"{"type":"update","componentId":"c","params":{},"timestamp":1}"#)?;
        assert_eq!(event.event_type(), "update");
        assert_eq!(event.timestamp(), 1);
        Ok(())
    }
}
