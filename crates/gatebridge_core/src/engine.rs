//! Calling convention between the bridge and a simulation engine.
//!
//! The engine is an opaque, stateful backend. The bridge holds exactly one
//! [`Engine`] for its lifetime and is its only caller, so implementations
//! need no internal locking.

use async_trait::async_trait;
use gatebridge_data::{EnginePort, GateParams, IoBinding, LinkEnd, Signal};

use crate::error::{EngineResult, Result};

/// A value watch registered by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorRequest {
    pub graph_id: String,
    pub gate_id: String,
    pub port: String,
    pub monitor_id: u64,
    /// Fire only when the port takes one of these values; every change otherwise.
    pub trigger_values: Option<Vec<Signal>>,
    pub stop_on_trigger: bool,
    pub one_shot: bool,
}

/// Something the engine noticed while sampling monitors.
///
/// These reach the host as soon as they are sampled, not with the next
/// update batch.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    MonitorTriggered {
        monitor_id: u64,
        tick: u64,
        signal: Signal,
        stop_on_trigger: bool,
        one_shot: bool,
    },
    AlarmReached {
        alarm_id: u64,
        tick: u64,
        stop_on_alarm: bool,
    },
    MemoryChanged {
        graph_id: String,
        gate_id: String,
        address: u32,
        data: Signal,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortChange {
    pub port: String,
    pub signal: Signal,
}

/// Changed output ports of one gate since the last report.
#[derive(Debug, Clone, PartialEq)]
pub struct GateChange {
    pub graph_id: String,
    pub gate_id: String,
    pub ports: Vec<PortChange>,
}

/// Raw change list handed over on every flush.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineUpdates {
    pub tick: u64,
    pub pending_events: bool,
    pub changes: Vec<GateChange>,
}

/// Operations the bridge can invoke on a simulation engine.
pub trait Engine: Send {
    /// Tick interval in milliseconds.
    fn interval(&self) -> u32;
    fn set_interval(&mut self, ms: u32);
    /// Current simulation tick.
    fn tick(&self) -> u64;

    fn add_graph(&mut self, graph_id: &str) -> EngineResult<()>;
    fn add_gate(
        &mut self,
        graph_id: &str,
        gate_id: &str,
        params: GateParams,
        ports: Vec<EnginePort>,
    ) -> EngineResult<()>;
    fn add_subcircuit(
        &mut self,
        graph_id: &str,
        gate_id: &str,
        subcircuit_id: &str,
        io_map: Vec<IoBinding>,
    ) -> EngineResult<()>;
    fn add_link(
        &mut self,
        graph_id: &str,
        link_id: &str,
        from: LinkEnd,
        to: LinkEnd,
    ) -> EngineResult<()>;
    fn remove_link(&mut self, graph_id: &str, link_id: &str) -> EngineResult<()>;
    fn remove_gate(&mut self, graph_id: &str, gate_id: &str) -> EngineResult<()>;

    fn observe_graph(&mut self, graph_id: &str) -> EngineResult<()>;
    fn unobserve_graph(&mut self, graph_id: &str) -> EngineResult<()>;

    /// Drives the output of an input gate.
    fn change_input(&mut self, graph_id: &str, gate_id: &str, signal: Signal) -> EngineResult<()>;
    fn manual_mem_change(
        &mut self,
        graph_id: &str,
        gate_id: &str,
        address: u32,
        data: Signal,
    ) -> EngineResult<()>;

    fn monitor(&mut self, request: MonitorRequest) -> EngineResult<()>;
    fn unmonitor(&mut self, monitor_id: u64) -> EngineResult<()>;
    fn alarm(&mut self, tick: u64, alarm_id: u64, stop_on_alarm: bool) -> EngineResult<()>;
    fn unalarm(&mut self, alarm_id: u64) -> EngineResult<()>;

    /// Advances simulation by one tick. Returns the number of events processed.
    fn update_gates(&mut self) -> EngineResult<u32>;
    /// Jumps to the next tick that has scheduled work and processes it.
    fn update_gates_next(&mut self) -> EngineResult<u32>;
    /// Samples monitors, alarms and gate triggers raised since the last call.
    fn post_monitors(&mut self) -> Vec<EngineEvent>;
    /// Takes the changes accumulated since the last call.
    fn take_updates(&mut self) -> EngineUpdates;
}

/// Instantiates an engine from a module image.
///
/// `None` asks for the loader's builtin engine.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn instantiate(&self, module: Option<Vec<u8>>) -> Result<Box<dyn Engine>>;
}
