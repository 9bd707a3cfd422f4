use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::signal::WireSignal;

/// An inbound command exactly as the host sent it: `{ type, arg?, args?, data? }`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RawCommand {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
    /// Raw module image for module-load commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RawCommand {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            arg: None,
            args: None,
            data: None,
        }
    }

    /// The payload as positional parameters: a single `arg` becomes a
    /// one-element list, `args` is taken as-is, neither yields no parameters.
    pub fn into_positional(self) -> Vec<Value> {
        match (self.arg, self.args) {
            (Some(arg), _) => vec![arg],
            (None, Some(args)) => args,
            (None, None) => Vec::new(),
        }
    }
}

/// Port name to encoded signal for one gate.
pub type PortMap = BTreeMap<String, WireSignal>;

/// `[graphId, gateId, portMap]`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UpdateEntry(pub String, pub String, pub PortMap);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    MemChange,
}

/// `[address, signal]`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemoryWrite(pub u32, pub WireSignal);

/// Messages sent from the bridge to the host, serialized as `{ type, args }`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "args", rename_all = "camelCase")]
pub enum HostMessage {
    /// `[tick, hasPendingEvents, updateBatch]`
    Update(u64, bool, Vec<UpdateEntry>),
    /// `[graphId, gateId, "memChange", [address, signal]]`
    GateTrigger(String, String, TriggerKind, MemoryWrite),
    /// `[monitorId, tick, signal, stopOnTrigger, oneShot]`
    MonitorValue(u64, u64, WireSignal, bool, bool),
    /// `[alarmId, tick, stopOnAlarm]`
    AlarmReached(u64, u64, bool),
    /// `[requestId, response]`
    Ack(u64, Value),
    InitFinish,
    FetchWasm,
}

impl HostMessage {
    /// The `type` tag this message carries on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            HostMessage::Update(..) => "update",
            HostMessage::GateTrigger(..) => "gateTrigger",
            HostMessage::MonitorValue(..) => "monitorValue",
            HostMessage::AlarmReached(..) => "alarmReached",
            HostMessage::Ack(..) => "ack",
            HostMessage::InitFinish => "initFinish",
            HostMessage::FetchWasm => "fetchWasm",
        }
    }
}
