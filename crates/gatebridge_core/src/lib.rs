//! # Gatebridge Core
//!
//! Message bridge between a host UI and a logic-circuit simulation engine.
//!
//! The host talks to the bridge with JSON commands (`{type, arg?, args?}`)
//! and receives updates, monitor and alarm notifications, and request
//! acknowledgements back. This crate contains:
//! - The typed command set and its positional decoding
//! - Lifecycle handling: module request, engine instantiation, queued replay
//! - The tick and flush activities and the flush/acknowledge handshake
//! - The [`Engine`](engine::Engine) seam and a bookkeeping implementation
//!
//! ## Example
//!
//! ```
//! use gatebridge_core::command::Command;
//! use gatebridge_data::RawCommand;
//! use serde_json::json;
//!
//! let raw: RawCommand = serde_json::from_value(json!({
//!     "type": "ping",
//!     "args": [7, true]
//! })).unwrap();
//! let command = Command::try_from(raw).unwrap();
//! assert_eq!(command, Command::Ping { request_id: 7, flush: true });
//! ```

/// Event loop tying inbound commands, loading and timers together
pub mod bridge;
/// Host command set and payload decoding
pub mod command;
/// Configuration management for cadences, lifecycle and logging
pub mod config;
/// Lifecycle state machine and command routing
pub mod dispatcher;
/// Engine and loader traits
pub mod engine;
/// Error types
pub mod error;
/// Engine output to host message conversion
pub mod format;
/// Bookkeeping engine without gate evaluation
pub mod ledger;
/// Outbound channel to the host
pub mod outbox;
/// Gate and subcircuit registration
pub mod registration;
/// Tick and flush activities
pub mod scheduler;

pub use bridge::Bridge;
pub use command::Command;
pub use config::BridgeConfig;
pub use dispatcher::{Dispatcher, Lifecycle};
pub use engine::{Engine, EngineLoader};
pub use error::{BridgeError, EngineError, Result};
pub use ledger::{LedgerEngine, LedgerLoader};
pub use outbox::Outbox;
