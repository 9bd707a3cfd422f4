//! Maps host gate and subcircuit descriptors onto engine registration calls.

use std::collections::BTreeMap;

use gatebridge_data::{
    EnginePort, GateParams, IoBinding, PortDescriptor, PortDirection, Signal, WireSignal,
};

use crate::engine::Engine;
use crate::error::{BridgeError, Result};

/// Host signal maps keyed by port id.
pub type SignalMap = BTreeMap<String, WireSignal>;

/// An `addGate` request.
#[derive(Debug, Clone, PartialEq)]
pub struct GateRegistration {
    pub graph_id: String,
    pub gate_id: String,
    pub params: GateParams,
    pub ports: Vec<PortDescriptor>,
    pub input_signals: SignalMap,
    pub output_signals: SignalMap,
}

impl GateRegistration {
    /// Resolves every port's initial value: inputs from `input_signals`,
    /// outputs from `output_signals`. The width always comes from the
    /// descriptor.
    pub fn resolve_ports(&self) -> Result<Vec<EnginePort>> {
        self.ports
            .iter()
            .map(|port| {
                let (source, dir) = match port.dir {
                    PortDirection::In => (&self.input_signals, "input"),
                    PortDirection::Out => (&self.output_signals, "output"),
                };
                let wire = source
                    .get(&port.id)
                    .ok_or_else(|| BridgeError::MissingPortSignal {
                        gate: self.gate_id.clone(),
                        port: port.id.clone(),
                        dir,
                    })?;
                Ok(EnginePort {
                    id: port.id.clone(),
                    dir: port.dir,
                    signal: Signal::new(port.bits, wire.avec.clone(), wire.bvec.clone()),
                })
            })
            .collect()
    }
}

/// An `addSubcircuit` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubcircuitRegistration {
    pub graph_id: String,
    pub gate_id: String,
    pub subcircuit_id: String,
    pub io_map: BTreeMap<String, String>,
}

impl SubcircuitRegistration {
    /// `{port, io_id}` pairs in port-name order.
    pub fn io_bindings(&self) -> Vec<IoBinding> {
        self.io_map
            .iter()
            .map(|(port, io_id)| IoBinding {
                port: port.clone(),
                io_id: io_id.clone(),
            })
            .collect()
    }
}

pub fn register_gate(engine: &mut dyn Engine, request: GateRegistration) -> Result<()> {
    let ports = request.resolve_ports()?;
    tracing::debug!(
        graph = %request.graph_id,
        gate = %request.gate_id,
        ports = ports.len(),
        "registering gate"
    );
    engine.add_gate(&request.graph_id, &request.gate_id, request.params, ports)?;
    Ok(())
}

pub fn register_subcircuit(engine: &mut dyn Engine, request: SubcircuitRegistration) -> Result<()> {
    let io_map = request.io_bindings();
    engine.add_subcircuit(
        &request.graph_id,
        &request.gate_id,
        &request.subcircuit_id,
        io_map,
    )?;
    Ok(())
}
