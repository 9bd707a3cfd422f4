pub mod macros;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gatebridge_core::engine::{EngineEvent, EngineUpdates, MonitorRequest};
use gatebridge_core::error::EngineResult;
use gatebridge_core::{Bridge, BridgeConfig, BridgeError, Engine, EngineLoader, LedgerEngine, Outbox, Result};
use gatebridge_data::{EnginePort, GateParams, HostMessage, IoBinding, LinkEnd, RawCommand, Signal};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

pub type CallLog = Arc<Mutex<Vec<String>>>;
/// Ports exactly as they reached `add_gate`, per `(graph, gate)`.
pub type PortLog = Arc<Mutex<Vec<(String, String, Vec<EnginePort>)>>>;

/// [`LedgerEngine`] that records every mutating call it receives.
pub struct RecordingEngine {
    inner: LedgerEngine,
    calls: CallLog,
    ports: PortLog,
}

impl RecordingEngine {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Engine for RecordingEngine {
    fn interval(&self) -> u32 {
        self.inner.interval()
    }
    fn set_interval(&mut self, ms: u32) {
        self.record(format!("interval {ms}"));
        self.inner.set_interval(ms)
    }
    fn tick(&self) -> u64 {
        self.inner.tick()
    }
    fn add_graph(&mut self, graph_id: &str) -> EngineResult<()> {
        self.record(format!("addGraph {graph_id}"));
        self.inner.add_graph(graph_id)
    }
    fn add_gate(
        &mut self,
        graph_id: &str,
        gate_id: &str,
        params: GateParams,
        ports: Vec<EnginePort>,
    ) -> EngineResult<()> {
        self.record(format!("addGate {graph_id} {gate_id}"));
        self.ports
            .lock()
            .unwrap()
            .push((graph_id.to_string(), gate_id.to_string(), ports.clone()));
        self.inner.add_gate(graph_id, gate_id, params, ports)
    }
    fn add_subcircuit(
        &mut self,
        graph_id: &str,
        gate_id: &str,
        subcircuit_id: &str,
        io_map: Vec<IoBinding>,
    ) -> EngineResult<()> {
        self.record(format!("addSubcircuit {graph_id} {gate_id} {subcircuit_id}"));
        self.inner.add_subcircuit(graph_id, gate_id, subcircuit_id, io_map)
    }
    fn add_link(&mut self, graph_id: &str, link_id: &str, from: LinkEnd, to: LinkEnd) -> EngineResult<()> {
        self.record(format!("addLink {graph_id} {link_id}"));
        self.inner.add_link(graph_id, link_id, from, to)
    }
    fn remove_link(&mut self, graph_id: &str, link_id: &str) -> EngineResult<()> {
        self.record(format!("removeLink {graph_id} {link_id}"));
        self.inner.remove_link(graph_id, link_id)
    }
    fn remove_gate(&mut self, graph_id: &str, gate_id: &str) -> EngineResult<()> {
        self.record(format!("removeGate {graph_id} {gate_id}"));
        self.inner.remove_gate(graph_id, gate_id)
    }
    fn observe_graph(&mut self, graph_id: &str) -> EngineResult<()> {
        self.record(format!("observeGraph {graph_id}"));
        self.inner.observe_graph(graph_id)
    }
    fn unobserve_graph(&mut self, graph_id: &str) -> EngineResult<()> {
        self.record(format!("unobserveGraph {graph_id}"));
        self.inner.unobserve_graph(graph_id)
    }
    fn change_input(&mut self, graph_id: &str, gate_id: &str, signal: Signal) -> EngineResult<()> {
        self.record(format!("changeInput {graph_id} {gate_id}"));
        self.inner.change_input(graph_id, gate_id, signal)
    }
    fn manual_mem_change(&mut self, graph_id: &str, gate_id: &str, address: u32, data: Signal) -> EngineResult<()> {
        self.record(format!("manualMemChange {graph_id} {gate_id} {address}"));
        self.inner.manual_mem_change(graph_id, gate_id, address, data)
    }
    fn monitor(&mut self, request: MonitorRequest) -> EngineResult<()> {
        self.record(format!("monitor {}", request.monitor_id));
        self.inner.monitor(request)
    }
    fn unmonitor(&mut self, monitor_id: u64) -> EngineResult<()> {
        self.record(format!("unmonitor {monitor_id}"));
        self.inner.unmonitor(monitor_id)
    }
    fn alarm(&mut self, tick: u64, alarm_id: u64, stop_on_alarm: bool) -> EngineResult<()> {
        self.record(format!("alarm {alarm_id}"));
        self.inner.alarm(tick, alarm_id, stop_on_alarm)
    }
    fn unalarm(&mut self, alarm_id: u64) -> EngineResult<()> {
        self.record(format!("unalarm {alarm_id}"));
        self.inner.unalarm(alarm_id)
    }
    fn update_gates(&mut self) -> EngineResult<u32> {
        self.record("updateGates".to_string());
        self.inner.update_gates()
    }
    fn update_gates_next(&mut self) -> EngineResult<u32> {
        self.record("updateGatesNext".to_string());
        self.inner.update_gates_next()
    }
    fn post_monitors(&mut self) -> Vec<EngineEvent> {
        self.inner.post_monitors()
    }
    fn take_updates(&mut self) -> EngineUpdates {
        self.inner.take_updates()
    }
}

pub struct RecordingLoader {
    calls: CallLog,
    ports: PortLog,
    interval_ms: u32,
}

#[async_trait]
impl EngineLoader for RecordingLoader {
    async fn instantiate(&self, module: Option<Vec<u8>>) -> Result<Box<dyn Engine>> {
        if module.is_some_and(|image| image.is_empty()) {
            return Err(BridgeError::load("empty module image"));
        }
        Ok(Box::new(RecordingEngine {
            inner: LedgerEngine::new(self.interval_ms),
            calls: Arc::clone(&self.calls),
            ports: Arc::clone(&self.ports),
        }))
    }
}

pub struct BridgeBuilder {
    config: BridgeConfig,
}

#[allow(dead_code)]
impl BridgeBuilder {
    pub fn new() -> Self {
        let mut config = BridgeConfig::default();
        config.lifecycle.request_module_on_boot = false;
        Self { config }
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut BridgeConfig),
    {
        modifier(&mut self.config);
        self
    }

    pub fn spawn(self) -> BridgeHarness {
        let calls = CallLog::default();
        let ports = PortLog::default();
        let loader = RecordingLoader {
            calls: Arc::clone(&calls),
            ports: Arc::clone(&ports),
            interval_ms: self.config.engine.default_interval_ms,
        };
        let (outbox, rx) = Outbox::channel();
        let (tx, inbound) = mpsc::unbounded_channel();
        let bridge = Bridge::new(&self.config, Arc::new(loader), outbox);
        BridgeHarness {
            tx,
            rx,
            calls,
            ports,
            handle: tokio::spawn(bridge.run(inbound)),
        }
    }
}

pub struct BridgeHarness {
    tx: UnboundedSender<RawCommand>,
    rx: UnboundedReceiver<HostMessage>,
    calls: CallLog,
    ports: PortLog,
    handle: JoinHandle<Result<()>>,
}

#[allow(dead_code)]
impl BridgeHarness {
    /// Sends one host command given as its JSON form.
    pub fn send(&self, command: Value) {
        let raw: RawCommand = serde_json::from_value(command).expect("valid raw command");
        self.tx.send(raw).expect("bridge alive");
    }

    /// Instantiates the builtin engine and waits for `initFinish`.
    pub async fn load(&mut self) {
        self.send(serde_json::json!({ "type": "nodeJs" }));
        assert_eq!(self.next().await, HostMessage::InitFinish);
    }

    pub async fn next(&mut self) -> HostMessage {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for host message")
            .expect("outbox closed")
    }

    /// Next message that is not a periodic update.
    pub async fn next_non_update(&mut self) -> HostMessage {
        loop {
            match self.next().await {
                HostMessage::Update(..) => continue,
                other => return other,
            }
        }
    }

    /// Collects everything received within `window`.
    pub async fn collect_for(&mut self, window: Duration) -> Vec<HostMessage> {
        let mut out = Vec::new();
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(msg)) = tokio::time::timeout_at(deadline, self.rx.recv()).await {
            out.push(msg);
        }
        out
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Resolved ports of every gate registered so far.
    pub fn registered_ports(&self) -> Vec<(String, String, Vec<EnginePort>)> {
        self.ports.lock().unwrap().clone()
    }

    /// Closes the inbound channel and waits for the bridge to stop.
    pub async fn close(self) {
        drop(self.tx);
        self.handle.await.expect("bridge task").expect("bridge run");
    }
}

#[allow(dead_code)]
pub fn wire_bit(value: u32) -> Value {
    serde_json::json!({ "_bits": 1, "_avec": [value], "_bvec": [value] })
}
