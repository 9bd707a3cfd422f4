//! Gatebridge: a message bridge between a host UI and a logic-circuit
//! simulation engine, with a stdio transport.

pub mod host;

pub use gatebridge_core as core;
pub use gatebridge_data as data;
