//! Reference engine that keeps signal bookkeeping without evaluating gates.
//!
//! It stores per-port state, moves output values along links after the
//! source gate's propagation delay, reports changed outputs of observed
//! graphs, and raises monitor, alarm and memory triggers. Gate logic is
//! left to real engines; here outputs only change when the host drives them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use gatebridge_data::{EnginePort, GateParams, IoBinding, LinkEnd, PortDirection, Signal};

use crate::config::EngineConfig;
use crate::engine::{
    Engine, EngineEvent, EngineLoader, EngineUpdates, GateChange, MonitorRequest, PortChange,
};
use crate::error::{BridgeError, EngineError, EngineResult, Result};

type GateKey = (String, String);

#[derive(Debug, Default)]
struct GateLedger {
    params: GateParams,
    inputs: BTreeMap<String, Signal>,
    outputs: BTreeMap<String, Signal>,
    memory: Option<MemoryLedger>,
    subcircuit: Option<(String, Vec<IoBinding>)>,
}

/// Sparse memory contents. Unwritten words read as zero.
#[derive(Debug, Default)]
struct MemoryLedger {
    words: u32,
    cells: BTreeMap<u32, Signal>,
}

#[derive(Debug, Clone)]
struct Link {
    from: LinkEnd,
    to: LinkEnd,
}

#[derive(Debug, Default)]
struct GraphLedger {
    gates: BTreeMap<String, GateLedger>,
    links: BTreeMap<String, Link>,
    observed: bool,
}

/// A signal in flight along a link.
#[derive(Debug, Clone)]
struct Delivery {
    graph_id: String,
    link_id: String,
    gate_id: String,
    port: String,
    signal: Signal,
}

#[derive(Debug, Clone, Copy)]
struct Alarm {
    tick: u64,
    stop_on_alarm: bool,
}

#[derive(Debug)]
pub struct LedgerEngine {
    interval_ms: u32,
    tick: u64,
    graphs: HashMap<String, GraphLedger>,
    schedule: BTreeMap<u64, Vec<Delivery>>,
    dirty_order: Vec<GateKey>,
    dirty_ports: HashMap<GateKey, BTreeSet<String>>,
    monitors: BTreeMap<u64, MonitorRequest>,
    alarms: BTreeMap<u64, Alarm>,
    events: Vec<EngineEvent>,
}

impl Default for LedgerEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default().default_interval_ms)
    }
}

impl LedgerEngine {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            tick: 0,
            graphs: HashMap::new(),
            schedule: BTreeMap::new(),
            dirty_order: Vec::new(),
            dirty_ports: HashMap::new(),
            monitors: BTreeMap::new(),
            alarms: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    fn graph(&self, graph_id: &str) -> EngineResult<&GraphLedger> {
        self.graphs
            .get(graph_id)
            .ok_or_else(|| EngineError::UnknownGraph(graph_id.to_string()))
    }

    fn graph_mut(&mut self, graph_id: &str) -> EngineResult<&mut GraphLedger> {
        self.graphs
            .get_mut(graph_id)
            .ok_or_else(|| EngineError::UnknownGraph(graph_id.to_string()))
    }

    fn gate(&self, graph_id: &str, gate_id: &str) -> EngineResult<&GateLedger> {
        self.graph(graph_id)?
            .gates
            .get(gate_id)
            .ok_or_else(|| EngineError::unknown_gate(graph_id, gate_id))
    }

    fn gate_mut(&mut self, graph_id: &str, gate_id: &str) -> EngineResult<&mut GateLedger> {
        self.graph_mut(graph_id)?
            .gates
            .get_mut(gate_id)
            .ok_or_else(|| EngineError::unknown_gate(graph_id, gate_id))
    }

    #[cfg(test)]
    fn input(&self, graph_id: &str, gate_id: &str, port: &str) -> Option<&Signal> {
        self.gate(graph_id, gate_id).ok()?.inputs.get(port)
    }

    #[cfg(test)]
    fn subcircuit_of(&self, graph_id: &str, gate_id: &str) -> Option<(&str, &[IoBinding])> {
        let gate = self.gate(graph_id, gate_id).ok()?;
        gate.subcircuit
            .as_ref()
            .map(|(id, io)| (id.as_str(), io.as_slice()))
    }

    fn mark_dirty(&mut self, graph_id: &str, gate_id: &str, port: &str) {
        if !self.graphs.get(graph_id).is_some_and(|g| g.observed) {
            return;
        }
        let key = (graph_id.to_string(), gate_id.to_string());
        if !self.dirty_ports.contains_key(&key) {
            self.dirty_order.push(key.clone());
        }
        self.dirty_ports
            .entry(key)
            .or_default()
            .insert(port.to_string());
    }

    fn forget_dirty(&mut self, keep: impl Fn(&GateKey) -> bool) {
        self.dirty_order.retain(|k| keep(k));
        self.dirty_ports.retain(|k, _| keep(k));
    }

    fn set_output(
        &mut self,
        graph_id: &str,
        gate_id: &str,
        port: &str,
        signal: Signal,
    ) -> EngineResult<()> {
        let gate = self.gate_mut(graph_id, gate_id)?;
        let propagation = gate.params.propagation();
        let slot = gate
            .outputs
            .get_mut(port)
            .ok_or_else(|| EngineError::UnknownPort {
                gate: gate_id.to_string(),
                port: port.to_string(),
                dir: "output",
            })?;
        if *slot == signal {
            return Ok(());
        }
        *slot = signal.clone();

        self.mark_dirty(graph_id, gate_id, port);
        self.check_monitors(graph_id, gate_id, port, &signal);

        // Delays past the end of time never arrive.
        let at = self.tick.saturating_add(propagation);
        let targets: Vec<(String, LinkEnd)> = self
            .graph(graph_id)?
            .links
            .iter()
            .filter(|(_, l)| l.from.id == gate_id && l.from.port == port)
            .map(|(id, l)| (id.clone(), l.to.clone()))
            .collect();
        for (link_id, to) in targets {
            self.schedule.entry(at).or_default().push(Delivery {
                graph_id: graph_id.to_string(),
                link_id,
                gate_id: to.id,
                port: to.port,
                signal: signal.clone(),
            });
        }
        Ok(())
    }

    fn check_monitors(&mut self, graph_id: &str, gate_id: &str, port: &str, signal: &Signal) {
        let mut spent = Vec::new();
        for (id, m) in &self.monitors {
            if m.graph_id != graph_id || m.gate_id != gate_id || m.port != port {
                continue;
            }
            let hit = m
                .trigger_values
                .as_ref()
                .map_or(true, |values| values.contains(signal));
            if !hit {
                continue;
            }
            self.events.push(EngineEvent::MonitorTriggered {
                monitor_id: *id,
                tick: self.tick,
                signal: signal.clone(),
                stop_on_trigger: m.stop_on_trigger,
                one_shot: m.one_shot,
            });
            if m.one_shot {
                spent.push(*id);
            }
        }
        for id in spent {
            self.monitors.remove(&id);
        }
    }

    fn deliver_due(&mut self) -> u32 {
        let due = match self.tick.checked_add(1) {
            Some(next) => {
                let later = self.schedule.split_off(&next);
                std::mem::replace(&mut self.schedule, later)
            }
            None => std::mem::take(&mut self.schedule),
        };
        let mut count = 0;
        for delivery in due.into_values().flatten() {
            // A gate or port removed while a value was in flight drops it.
            if let Ok(gate) = self.gate_mut(&delivery.graph_id, &delivery.gate_id) {
                if let Some(slot) = gate.inputs.get_mut(&delivery.port) {
                    *slot = delivery.signal;
                    count += 1;
                }
            }
        }
        count
    }

    /// Drops in-flight values whose link no longer exists.
    fn prune_in_flight(&mut self) {
        let graphs = &self.graphs;
        for deliveries in self.schedule.values_mut() {
            deliveries.retain(|d| {
                graphs
                    .get(&d.graph_id)
                    .is_some_and(|g| g.links.contains_key(&d.link_id))
            });
        }
        self.schedule.retain(|_, deliveries| !deliveries.is_empty());
    }

    fn fire_due_alarms(&mut self) {
        let tick = self.tick;
        let due: Vec<u64> = self
            .alarms
            .iter()
            .filter(|(_, a)| a.tick <= tick)
            .map(|(id, _)| *id)
            .collect();
        for id in due {
            if let Some(alarm) = self.alarms.remove(&id) {
                self.events.push(EngineEvent::AlarmReached {
                    alarm_id: id,
                    tick,
                    stop_on_alarm: alarm.stop_on_alarm,
                });
            }
        }
    }
}

impl Engine for LedgerEngine {
    fn interval(&self) -> u32 {
        self.interval_ms
    }

    fn set_interval(&mut self, ms: u32) {
        self.interval_ms = ms;
    }

    fn tick(&self) -> u64 {
        self.tick
    }

    fn add_graph(&mut self, graph_id: &str) -> EngineResult<()> {
        if self.graphs.contains_key(graph_id) {
            return Err(EngineError::duplicate("graph", graph_id));
        }
        self.graphs
            .insert(graph_id.to_string(), GraphLedger::default());
        Ok(())
    }

    fn add_gate(
        &mut self,
        graph_id: &str,
        gate_id: &str,
        params: GateParams,
        ports: Vec<EnginePort>,
    ) -> EngineResult<()> {
        let graph = self.graph_mut(graph_id)?;
        if graph.gates.contains_key(gate_id) {
            return Err(EngineError::duplicate("gate", gate_id));
        }
        let mut gate = GateLedger::default();
        for port in ports {
            match port.dir {
                PortDirection::In => gate.inputs.insert(port.id, port.signal),
                PortDirection::Out => gate.outputs.insert(port.id, port.signal),
            };
        }
        if params.kind() == Some("Memory") {
            gate.memory = Some(MemoryLedger {
                words: params.words().unwrap_or(0),
                cells: BTreeMap::new(),
            });
        }
        gate.params = params;
        graph.gates.insert(gate_id.to_string(), gate);
        Ok(())
    }

    fn add_subcircuit(
        &mut self,
        graph_id: &str,
        gate_id: &str,
        subcircuit_id: &str,
        io_map: Vec<IoBinding>,
    ) -> EngineResult<()> {
        let inner = self.graph(subcircuit_id)?;
        if let Some(missing) = io_map.iter().find(|b| !inner.gates.contains_key(&b.io_id)) {
            return Err(EngineError::unknown_gate(subcircuit_id, &missing.io_id));
        }
        let gate = self.gate_mut(graph_id, gate_id)?;
        gate.subcircuit = Some((subcircuit_id.to_string(), io_map));
        Ok(())
    }

    fn add_link(
        &mut self,
        graph_id: &str,
        link_id: &str,
        from: LinkEnd,
        to: LinkEnd,
    ) -> EngineResult<()> {
        let graph = self.graph(graph_id)?;
        if graph.links.contains_key(link_id) {
            return Err(EngineError::duplicate("link", link_id));
        }
        let source = self.gate(graph_id, &from.id)?;
        let value = source
            .outputs
            .get(&from.port)
            .cloned()
            .ok_or_else(|| EngineError::UnknownPort {
                gate: from.id.clone(),
                port: from.port.clone(),
                dir: "output",
            })?;
        let target = self.gate_mut(graph_id, &to.id)?;
        let slot = target
            .inputs
            .get_mut(&to.port)
            .ok_or_else(|| EngineError::UnknownPort {
                gate: to.id.clone(),
                port: to.port.clone(),
                dir: "input",
            })?;
        *slot = value;
        self.graph_mut(graph_id)?
            .links
            .insert(link_id.to_string(), Link { from, to });
        Ok(())
    }

    fn remove_link(&mut self, graph_id: &str, link_id: &str) -> EngineResult<()> {
        if self.graph_mut(graph_id)?.links.remove(link_id).is_none() {
            return Err(EngineError::UnknownLink {
                graph: graph_id.to_string(),
                link: link_id.to_string(),
            });
        }
        self.prune_in_flight();
        Ok(())
    }

    fn remove_gate(&mut self, graph_id: &str, gate_id: &str) -> EngineResult<()> {
        let graph = self.graph_mut(graph_id)?;
        if graph.gates.remove(gate_id).is_none() {
            return Err(EngineError::unknown_gate(graph_id, gate_id));
        }
        graph
            .links
            .retain(|_, l| l.from.id != gate_id && l.to.id != gate_id);
        self.monitors
            .retain(|_, m| !(m.graph_id == graph_id && m.gate_id == gate_id));
        self.forget_dirty(|(g, id)| !(g == graph_id && id == gate_id));
        self.prune_in_flight();
        Ok(())
    }

    fn observe_graph(&mut self, graph_id: &str) -> EngineResult<()> {
        let graph = self.graph_mut(graph_id)?;
        graph.observed = true;
        let outputs: Vec<(String, String)> = graph
            .gates
            .iter()
            .flat_map(|(gate_id, g)| g.outputs.keys().map(move |p| (gate_id.clone(), p.clone())))
            .collect();
        for (gate_id, port) in outputs {
            self.mark_dirty(graph_id, &gate_id, &port);
        }
        Ok(())
    }

    fn unobserve_graph(&mut self, graph_id: &str) -> EngineResult<()> {
        self.graph_mut(graph_id)?.observed = false;
        self.forget_dirty(|(g, _)| g != graph_id);
        Ok(())
    }

    fn change_input(&mut self, graph_id: &str, gate_id: &str, signal: Signal) -> EngineResult<()> {
        self.set_output(graph_id, gate_id, "out", signal)
    }

    fn manual_mem_change(
        &mut self,
        graph_id: &str,
        gate_id: &str,
        address: u32,
        data: Signal,
    ) -> EngineResult<()> {
        let gate = self.gate_mut(graph_id, gate_id)?;
        let memory = gate
            .memory
            .as_mut()
            .ok_or_else(|| EngineError::NotAMemory(gate_id.to_string()))?;
        if address >= memory.words {
            return Err(EngineError::AddressOutOfRange {
                gate: gate_id.to_string(),
                address,
                words: memory.words as usize,
            });
        }
        memory.cells.insert(address, data.clone());
        self.events.push(EngineEvent::MemoryChanged {
            graph_id: graph_id.to_string(),
            gate_id: gate_id.to_string(),
            address,
            data,
        });
        Ok(())
    }

    fn monitor(&mut self, request: MonitorRequest) -> EngineResult<()> {
        let gate = self.gate(&request.graph_id, &request.gate_id)?;
        if !gate.outputs.contains_key(&request.port) {
            return Err(EngineError::UnknownPort {
                gate: request.gate_id.clone(),
                port: request.port.clone(),
                dir: "output",
            });
        }
        self.monitors.insert(request.monitor_id, request);
        Ok(())
    }

    fn unmonitor(&mut self, monitor_id: u64) -> EngineResult<()> {
        self.monitors.remove(&monitor_id);
        Ok(())
    }

    fn alarm(&mut self, tick: u64, alarm_id: u64, stop_on_alarm: bool) -> EngineResult<()> {
        self.alarms.insert(
            alarm_id,
            Alarm {
                tick,
                stop_on_alarm,
            },
        );
        Ok(())
    }

    fn unalarm(&mut self, alarm_id: u64) -> EngineResult<()> {
        self.alarms.remove(&alarm_id);
        Ok(())
    }

    fn update_gates(&mut self) -> EngineResult<u32> {
        let count = self.deliver_due();
        self.tick = self.tick.saturating_add(1);
        self.fire_due_alarms();
        Ok(count)
    }

    fn update_gates_next(&mut self) -> EngineResult<u32> {
        if let Some(&next) = self.schedule.keys().next() {
            self.tick = self.tick.max(next);
        }
        self.update_gates()
    }

    fn post_monitors(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn take_updates(&mut self) -> EngineUpdates {
        let order = std::mem::take(&mut self.dirty_order);
        let mut dirty = std::mem::take(&mut self.dirty_ports);
        let changes = order
            .into_iter()
            .filter_map(|key| {
                let changed = dirty.remove(&key)?;
                let gate = self.gate(&key.0, &key.1).ok()?;
                let ports = changed
                    .into_iter()
                    .filter_map(|port| {
                        let signal = gate.outputs.get(&port)?.clone();
                        Some(PortChange { port, signal })
                    })
                    .collect();
                Some(GateChange {
                    graph_id: key.0,
                    gate_id: key.1,
                    ports,
                })
            })
            .collect();
        EngineUpdates {
            tick: self.tick,
            pending_events: !self.schedule.is_empty(),
            changes,
        }
    }
}

/// Loader for [`LedgerEngine`].
///
/// Any non-empty module image is accepted; the image itself is not inspected.
#[derive(Debug, Clone, Default)]
pub struct LedgerLoader {
    config: EngineConfig,
}

impl LedgerLoader {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineLoader for LedgerLoader {
    async fn instantiate(&self, module: Option<Vec<u8>>) -> Result<Box<dyn Engine>> {
        match module {
            Some(image) if image.is_empty() => {
                return Err(BridgeError::load("empty module image"));
            }
            Some(image) => tracing::info!(bytes = image.len(), "instantiating ledger engine"),
            None => tracing::info!("instantiating builtin ledger engine"),
        }
        Ok(Box::new(LedgerEngine::new(self.config.default_interval_ms)))
    }
}
