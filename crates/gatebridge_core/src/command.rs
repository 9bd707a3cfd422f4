//! The closed set of commands a host can send.
//!
//! Every inbound [`RawCommand`] is decoded into a [`Command`] variant with a
//! typed payload. The payload is read positionally: a single `arg` is the
//! first parameter, `args` spreads into the parameter list.

use std::collections::BTreeMap;

use gatebridge_data::{GateParams, LinkEnd, PortDescriptor, RawCommand, Signal, WireSignal};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::engine::MonitorRequest;
use crate::error::{BridgeError, Result};
use crate::registration::{GateRegistration, SignalMap, SubcircuitRegistration};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Module image for the engine.
    Fetch(Vec<u8>),
    /// Instantiate the loader's builtin engine.
    LoadBuiltin,
    /// Replay queued commands and make sure updates are flushed.
    RunStart,
    Start,
    Stop { request_id: u64, flush: bool },
    /// Pause evaluation only; the flush cadence keeps running.
    UpdaterStop,
    Ping { request_id: u64, flush: bool },
    UpdateGates { request_id: u64, flush: bool },
    UpdateGatesNext { request_id: u64, flush: bool },

    Interval(u32),
    AddGraph(String),
    AddGate(GateRegistration),
    AddSubcircuit(SubcircuitRegistration),
    AddLink {
        graph_id: String,
        link_id: String,
        from: LinkEnd,
        to: LinkEnd,
    },
    RemoveLink { graph_id: String, link_id: String },
    RemoveGate { graph_id: String, gate_id: String },
    ObserveGraph(String),
    UnobserveGraph(String),
    ChangeInput {
        graph_id: String,
        gate_id: String,
        signal: Signal,
    },
    ManualMemChange {
        graph_id: String,
        gate_id: String,
        address: u32,
        data: Signal,
    },
    Monitor(MonitorRequest),
    Unmonitor(u64),
    Alarm {
        tick: u64,
        alarm_id: u64,
        stop_on_alarm: bool,
    },
    Unalarm(u64),

    /// A `type` this bridge does not know. Dispatching it does nothing, so
    /// hosts speaking a newer or older protocol keep working.
    Unknown(String),
}

impl Command {
    /// Wire name of the command.
    pub fn kind(&self) -> &str {
        match self {
            Command::Fetch(_) => "fetch",
            Command::LoadBuiltin => "nodeJs",
            Command::RunStart => "runStart",
            Command::Start => "start",
            Command::Stop { .. } => "stop",
            Command::UpdaterStop => "updater_stop",
            Command::Ping { .. } => "ping",
            Command::UpdateGates { .. } => "updateGates",
            Command::UpdateGatesNext { .. } => "updateGatesNext",
            Command::Interval(_) => "interval",
            Command::AddGraph(_) => "addGraph",
            Command::AddGate(_) => "addGate",
            Command::AddSubcircuit(_) => "addSubcircuit",
            Command::AddLink { .. } => "addLink",
            Command::RemoveLink { .. } => "removeLink",
            Command::RemoveGate { .. } => "removeGate",
            Command::ObserveGraph(_) => "observeGraph",
            Command::UnobserveGraph(_) => "unobserveGraph",
            Command::ChangeInput { .. } => "changeInput",
            Command::ManualMemChange { .. } => "manualMemChange",
            Command::Monitor(_) => "monitor",
            Command::Unmonitor(_) => "unmonitor",
            Command::Alarm { .. } => "alarm",
            Command::Unalarm(_) => "unalarm",
            Command::Unknown(name) => name.as_str(),
        }
    }

    /// Module-load commands are handled before the queue.
    pub fn is_module_load(&self) -> bool {
        matches!(self, Command::Fetch(_) | Command::LoadBuiltin)
    }
}

/// Positional parameter reader for one command.
struct Params {
    command: String,
    values: std::vec::IntoIter<Value>,
    index: usize,
}

impl Params {
    fn new(command: &str, values: Vec<Value>) -> Self {
        Self {
            command: command.to_string(),
            values: values.into_iter(),
            index: 0,
        }
    }

    fn next<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        self.index += 1;
        let value = self.values.next().ok_or_else(|| {
            BridgeError::malformed(
                &self.command,
                format!("missing argument {} ({})", self.index, name),
            )
        })?;
        self.parse(name, value)
    }

    /// Like `next`, but an absent or `null` parameter yields `default`.
    fn next_or<T: DeserializeOwned>(&mut self, name: &str, default: T) -> Result<T> {
        self.index += 1;
        match self.values.next() {
            None | Some(Value::Null) => Ok(default),
            Some(value) => self.parse(name, value),
        }
    }

    fn parse<T: DeserializeOwned>(&self, name: &str, value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|e| {
            BridgeError::malformed(
                &self.command,
                format!("argument {} ({}): {}", self.index, name, e),
            )
        })
    }

    fn signal(&mut self, name: &str) -> Result<Signal> {
        self.next::<WireSignal>(name).map(Signal::from)
    }

    fn handshake(&mut self) -> Result<(u64, bool)> {
        let request_id = self.next("requestId")?;
        let flush = self.next_or("sendUpdates", false)?;
        Ok((request_id, flush))
    }
}

impl TryFrom<RawCommand> for Command {
    type Error = BridgeError;

    fn try_from(raw: RawCommand) -> Result<Self> {
        let kind = raw.kind.clone();

        if kind == "fetch" {
            let image = raw
                .data
                .or(raw.arg)
                .ok_or_else(|| BridgeError::malformed("fetch", "missing module image"))?;
            let bytes: Vec<u8> = serde_json::from_value(image)
                .map_err(|e| BridgeError::malformed("fetch", e.to_string()))?;
            return Ok(Command::Fetch(bytes));
        }

        let mut p = Params::new(&kind, raw.into_positional());
        let command = match kind.as_str() {
            "nodeJs" => Command::LoadBuiltin,
            "runStart" => Command::RunStart,
            "start" => Command::Start,
            "updater_stop" => Command::UpdaterStop,
            "stop" => {
                let (request_id, flush) = p.handshake()?;
                Command::Stop { request_id, flush }
            }
            "ping" => {
                let (request_id, flush) = p.handshake()?;
                Command::Ping { request_id, flush }
            }
            "updateGates" => {
                let (request_id, flush) = p.handshake()?;
                Command::UpdateGates { request_id, flush }
            }
            "updateGatesNext" => {
                let (request_id, flush) = p.handshake()?;
                Command::UpdateGatesNext { request_id, flush }
            }
            "interval" => Command::Interval(p.next("ms")?),
            "addGraph" => Command::AddGraph(p.next("graphId")?),
            "addGate" => Command::AddGate(GateRegistration {
                graph_id: p.next("graphId")?,
                gate_id: p.next("gateId")?,
                params: p.next_or("gateParams", GateParams::default())?,
                ports: p.next::<Vec<PortDescriptor>>("ports")?,
                input_signals: p.next_or("inputSignals", SignalMap::new())?,
                output_signals: p.next_or("outputSignals", SignalMap::new())?,
            }),
            "addSubcircuit" => Command::AddSubcircuit(SubcircuitRegistration {
                graph_id: p.next("graphId")?,
                gate_id: p.next("gateId")?,
                subcircuit_id: p.next("subcircuitId")?,
                io_map: p.next::<BTreeMap<String, String>>("ioMap")?,
            }),
            "addLink" => Command::AddLink {
                graph_id: p.next("graphId")?,
                link_id: p.next("linkId")?,
                from: p.next("from")?,
                to: p.next("to")?,
            },
            "removeLink" => Command::RemoveLink {
                graph_id: p.next("graphId")?,
                link_id: p.next("linkId")?,
            },
            "removeGate" => Command::RemoveGate {
                graph_id: p.next("graphId")?,
                gate_id: p.next("gateId")?,
            },
            "observeGraph" => Command::ObserveGraph(p.next("graphId")?),
            "unobserveGraph" => Command::UnobserveGraph(p.next("graphId")?),
            "changeInput" => Command::ChangeInput {
                graph_id: p.next("graphId")?,
                gate_id: p.next("gateId")?,
                signal: p.signal("signal")?,
            },
            "manualMemChange" => Command::ManualMemChange {
                graph_id: p.next("graphId")?,
                gate_id: p.next("gateId")?,
                address: p.next("address")?,
                data: p.signal("data")?,
            },
            "monitor" => Command::Monitor(MonitorRequest {
                graph_id: p.next("graphId")?,
                gate_id: p.next("gateId")?,
                port: p.next("port")?,
                monitor_id: p.next("monitorId")?,
                trigger_values: p
                    .next_or::<Option<Vec<WireSignal>>>("triggerValues", None)?
                    .map(|values| values.into_iter().map(Signal::from).collect()),
                stop_on_trigger: p.next_or("stopOnTrigger", false)?,
                one_shot: p.next_or("oneShot", false)?,
            }),
            "unmonitor" => Command::Unmonitor(p.next("monitorId")?),
            "alarm" => Command::Alarm {
                tick: p.next("tick")?,
                alarm_id: p.next("alarmId")?,
                stop_on_alarm: p.next_or("stopOnAlarm", false)?,
            },
            "unalarm" => Command::Unalarm(p.next("alarmId")?),
            _ => Command::Unknown(kind),
        };
        Ok(command)
    }
}
