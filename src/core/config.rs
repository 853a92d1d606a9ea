//! Configuration parsing and validation.
//!
//! Engine configuration is loaded from TOML. Every replica of a partition
//! must run with the same `[engine]` section, since the transaction size
//! limit decides which replicated entries are rejected.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// State machine behavior.
    #[serde(default)]
    pub engine: EngineSection,

    /// Snapshot cadence.
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// State machine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Partition label used in logs and metrics.
    #[serde(default = "default_partition_id")]
    pub partition_id: String,

    /// Maximum number of updates in one transaction (0 = unbounded).
    #[serde(default)]
    pub max_transaction_updates: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            partition_id: default_partition_id(),
            max_transaction_updates: 0,
        }
    }
}

/// Snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Number of applied entries between snapshots.
    #[serde(default = "default_snapshot_interval_entries")]
    pub interval_entries: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval_entries: default_snapshot_interval_entries(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions

fn default_partition_id() -> String {
    "default".to_string()
}

fn default_snapshot_interval_entries() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Transaction size limit, or `None` when unbounded.
    pub fn transaction_limit(&self) -> Option<usize> {
        match self.engine.max_transaction_updates {
            0 => None,
            limit => Some(limit),
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_engine()?;
        self.validate_snapshot()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_engine(&self) -> Result<()> {
        if self.engine.partition_id.trim().is_empty() {
            anyhow::bail!("engine.partition_id must not be empty");
        }
        Ok(())
    }

    fn validate_snapshot(&self) -> Result<()> {
        if self.snapshot.interval_entries == 0 {
            anyhow::bail!("snapshot.interval_entries must be > 0");
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}
