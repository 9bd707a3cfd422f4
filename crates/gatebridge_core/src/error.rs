//! Error types for the bridge.
//!
//! Two layers: [`EngineError`] for failures raised by the simulation engine,
//! and [`BridgeError`] for everything the bridge itself can reject. Engine
//! errors travel through the bridge unmodified.

use thiserror::Error;

/// Failures raised by an engine operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown graph {0}")]
    UnknownGraph(String),

    #[error("graph {graph} has no gate {gate}")]
    UnknownGate { graph: String, gate: String },

    #[error("gate {gate} has no {dir} port {port}")]
    UnknownPort {
        gate: String,
        port: String,
        dir: &'static str,
    },

    #[error("graph {graph} has no link {link}")]
    UnknownLink { graph: String, link: String },

    #[error("{kind} {id} already exists")]
    Duplicate { kind: &'static str, id: String },

    #[error("gate {0} is not a memory")]
    NotAMemory(String),

    #[error("address {address} out of range for memory {gate} ({words} words)")]
    AddressOutOfRange {
        gate: String,
        address: u32,
        words: usize,
    },
}

impl EngineError {
    #[must_use]
    pub fn unknown_gate<G: Into<String>, I: Into<String>>(graph: G, gate: I) -> Self {
        Self::UnknownGate {
            graph: graph.into(),
            gate: gate.into(),
        }
    }

    #[must_use]
    pub fn duplicate<S: Into<String>>(kind: &'static str, id: S) -> Self {
        Self::Duplicate {
            kind,
            id: id.into(),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Main error type for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A command whose payload does not have the expected shape
    #[error("malformed {command} payload: {reason}")]
    MalformedPayload { command: String, reason: String },

    /// A registered port whose initial value was not supplied by the host
    #[error("gate {gate}: no initial signal for {dir} port {port}")]
    MissingPortSignal {
        gate: String,
        port: String,
        dir: &'static str,
    },

    /// The engine rejected an operation
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// An engine command reached dispatch before an engine existed
    #[error("{0}: engine not instantiated")]
    NotReady(String),

    /// The engine module could not be instantiated
    #[error("engine load failed: {0}")]
    Load(String),
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    #[must_use]
    pub fn malformed<C: Into<String>, R: Into<String>>(command: C, reason: R) -> Self {
        Self::MalformedPayload {
            command: command.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn load<S: Into<String>>(msg: S) -> Self {
        Self::Load(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::malformed("addGate", "missing argument 3");
        assert_eq!(
            err.to_string(),
            "malformed addGate payload: missing argument 3"
        );
    }

    #[test]
    fn test_not_ready_names_the_command() {
        let err = BridgeError::NotReady("addGraph".into());
        assert_eq!(err.to_string(), "addGraph: engine not instantiated");
    }

    #[test]
    fn test_engine_error_passes_through() {
        let err: BridgeError = EngineError::UnknownGraph("top".into()).into();
        assert!(matches!(err, BridgeError::Engine(EngineError::UnknownGraph(_))));
        assert_eq!(err.to_string(), "engine error: unknown graph top");
    }
}
