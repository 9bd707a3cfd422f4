//! Configuration for the bridge.
//!
//! Strongly-typed sections mapped onto a TOML file. Missing sections and
//! keys fall back to the `Default` values.
//!
//! ## Example `gatebridge.toml`
//!
//! ```toml
//! [scheduler]
//! flush_interval_ms = 25
//!
//! [engine]
//! default_interval_ms = 10
//!
//! [lifecycle]
//! request_module_on_boot = true
//! drain = "on_load"
//!
//! [logging]
//! filter = "gatebridge=info"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cadence of the two recurring activities.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period of the update flush, independent of the engine interval.
    pub flush_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 25,
        }
    }
}

impl SchedulerConfig {
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Tick interval a fresh engine reports until the host changes it.
    pub default_interval_ms: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 10,
        }
    }
}

/// When commands queued before the engine became ready are replayed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// As soon as the engine is instantiated.
    #[default]
    OnLoad,
    /// When the host sends `runStart`.
    OnRunStart,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Emit `fetchWasm` at boot to ask the host for the engine module.
    pub request_module_on_boot: bool,
    pub drain: DrainPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            request_module_on_boot: true,
            drain: DrainPolicy::OnLoad,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "gatebridge=info,gatebridge_core=info".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct BridgeConfig {
    pub scheduler: SchedulerConfig,
    pub engine: EngineConfig,
    pub lifecycle: LifecycleConfig,
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Validates all configuration parameters.
    ///
    /// # Validation Rules
    /// - Both cadences must be positive
    /// - The flush cadence must stay under one minute
    /// - The logging filter must not be empty
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.scheduler.flush_interval_ms > 0,
            "Flush interval must be positive"
        );
        anyhow::ensure!(
            self.scheduler.flush_interval_ms <= 60_000,
            "Flush interval too large (max 60000 ms)"
        );
        anyhow::ensure!(
            self.engine.default_interval_ms > 0,
            "Default engine interval must be positive"
        );
        anyhow::ensure!(
            !self.logging.filter.trim().is_empty(),
            "Logging filter must not be empty"
        );
        Ok(())
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`. Returns `None` when the file does
    /// not exist; a file that fails to parse or validate is an error.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content)
                .map(Some)
                .map_err(|e| e.context(format!("invalid config {}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.scheduler).as_bytes());
        hasher.update(format!("{:?}", self.engine).as_bytes());
        hasher.update(format!("{:?}", self.lifecycle).as_bytes());
        hex::encode(hasher.finalize())
    }
}
