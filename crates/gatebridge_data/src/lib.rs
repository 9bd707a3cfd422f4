//! # Gatebridge Data
//!
//! Plain data shared by the bridge and its hosts: multi-valued logic signals,
//! gate/port/link descriptors and the JSON shapes exchanged with the host.

/// Gate, port, link and subcircuit descriptors supplied by the host
pub mod descriptor;
/// Multi-valued logic signals and their wire encoding
pub mod signal;
/// Inbound command and outbound message shapes
pub mod wire;

pub use descriptor::{EnginePort, GateParams, IoBinding, LinkEnd, PortDescriptor, PortDirection};
pub use signal::{decode, encode, word_count, Signal, WireSignal};
pub use wire::{HostMessage, MemoryWrite, PortMap, RawCommand, TriggerKind, UpdateEntry};
