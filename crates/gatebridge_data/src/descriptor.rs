use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::signal::Signal;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    In,
    Out,
}

/// A port as described by the host when a gate is registered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    pub id: String,
    pub dir: PortDirection,
    pub bits: u32,
}

/// A port handed to the engine, carrying its resolved initial value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePort {
    pub id: String,
    pub dir: PortDirection,
    pub signal: Signal,
}

/// One end of a link: a gate and one of its ports.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkEnd {
    pub id: String,
    pub port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet: Option<String>,
}

impl LinkEnd {
    pub fn new(id: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            port: port.into(),
            magnet: None,
        }
    }
}

/// Binds a subcircuit port to the io gate inside the subcircuit's graph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IoBinding {
    pub port: String,
    pub io_id: String,
}

/// Opaque gate parameters.
///
/// The bridge passes these through untouched; the accessors cover the keys
/// the reference engine reads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct GateParams(pub Map<String, Value>);

impl GateParams {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Gate type name, e.g. `"And"` or `"Memory"`.
    pub fn kind(&self) -> Option<&str> {
        self.get("type").and_then(Value::as_str)
    }

    /// Propagation delay in ticks, zero when absent.
    pub fn propagation(&self) -> u64 {
        self.get("propagation").and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn bits(&self) -> Option<u32> {
        self.u32_field("bits")
    }

    /// Number of words of a memory gate.
    pub fn words(&self) -> Option<u32> {
        self.u32_field("words")
    }

    fn u32_field(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }
}

impl From<Value> for GateParams {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_port_descriptor_from_host_shape() {
        let port: PortDescriptor =
            serde_json::from_value(json!({ "id": "a", "dir": "in", "bits": 1 })).expect("parse");
        assert_eq!(port.dir, PortDirection::In);
        assert_eq!(port.bits, 1);
    }

    #[test]
    fn test_gate_params_accessors() {
        let params = GateParams::from(json!({
            "type": "Memory",
            "propagation": 2,
            "bits": 8,
            "words": 16,
        }));
        assert_eq!(params.kind(), Some("Memory"));
        assert_eq!(params.propagation(), 2);
        assert_eq!(params.bits(), Some(8));
        assert_eq!(params.words(), Some(16));
    }

    #[test]
    fn test_gate_params_non_object_is_empty() {
        let params = GateParams::from(json!(null));
        assert!(params.0.is_empty());
        assert_eq!(params.propagation(), 0);
    }

    #[test]
    fn test_link_end_magnet_optional() {
        let end: LinkEnd =
            serde_json::from_value(json!({ "id": "g", "port": "out" })).expect("parse");
        assert_eq!(end, LinkEnd::new("g", "out"));
    }
}
