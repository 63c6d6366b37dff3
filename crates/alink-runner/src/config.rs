//! Adapter configuration.
//!
//! Loaded from YAML; every field has a default so an empty file (or no file
//! at all) gives a working adapter.
//!
//! ```yaml
//! mem_log_size: 500
//! log_ping: false
//! device_version: 107
//! debug_loco: 9999
//! scheduler_period_ms: 100
//! idle_strategy: poll
//! function_banks:
//!   32: [1, 2, 3, 4, 0]
//! debug_functions:
//!   0: view_stats
//!   28: exit
//! cvs:
//!   1: 3
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::functions::DebugAction;
use crate::multiplexer::IdleStrategy;

/// Most functions a single bank can carry: one per bit of the state byte.
pub const MAX_BANK_FUNCTIONS: usize = 8;

/// Runtime configuration for the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterConfig {
    /// Character budget of the in-memory log.
    pub mem_log_size: usize,
    /// Log every ping request.
    pub log_ping: bool,
    /// Version byte reported in the version reply.
    pub device_version: u8,
    /// Address whose function commands drive the debug actions.
    pub debug_loco: u16,
    /// Longest wait, in milliseconds, before due scheduled work runs while
    /// the link is idle.
    pub scheduler_period_ms: u64,
    /// How idle time is shared with the scheduler.
    pub idle_strategy: IdleStrategy,
    /// Function ids per bank, lowest state bit first.
    pub function_banks: BTreeMap<u8, Vec<u8>>,
    /// Actions bound to functions of the debug loco.
    pub debug_functions: BTreeMap<u8, DebugAction>,
    /// Initial CV register values.
    pub cvs: BTreeMap<u8, u8>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            mem_log_size: 500,
            log_ping: false,
            device_version: 107,
            debug_loco: 9999,
            scheduler_period_ms: 100,
            idle_strategy: IdleStrategy::Poll,
            function_banks: BTreeMap::from([
                (0x20, vec![1, 2, 3, 4, 0]),
                (0x21, vec![5, 6, 7, 8]),
                (0x22, vec![9, 10, 11, 12]),
                (0x23, (13..=20).collect()),
                (0x28, (21..=28).collect()),
            ]),
            debug_functions: BTreeMap::from([
                (0, DebugAction::ViewStats),
                (28, DebugAction::Exit),
            ]),
            cvs: BTreeMap::from([
                (1, 3),
                (3, 5),
                (4, 5),
                (7, 100),
                (8, 255),
                (10, 128),
                (29, 6),
            ]),
        }
    }
}

impl AdapterConfig {
    /// Load and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate YAML config text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AdapterConfig = if text.trim().is_empty() {
            AdapterConfig::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values the adapter cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler_period_ms must be greater than zero".into(),
            ));
        }
        if self.mem_log_size == 0 {
            return Err(ConfigError::Invalid(
                "mem_log_size must be greater than zero".into(),
            ));
        }
        for (bank, functions) in &self.function_banks {
            if functions.len() > MAX_BANK_FUNCTIONS {
                return Err(ConfigError::Invalid(format!(
                    "function bank 0x{:02X} maps {} functions, at most {} fit in a state byte",
                    bank,
                    functions.len(),
                    MAX_BANK_FUNCTIONS
                )));
            }
        }
        Ok(())
    }

    pub fn idle_period(&self) -> Duration {
        Duration::from_millis(self.scheduler_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::default();
        assert_eq!(config.mem_log_size, 500);
        assert_eq!(config.device_version, 107);
        assert_eq!(config.debug_loco, 9999);
        assert_eq!(config.idle_period(), Duration::from_millis(100));
        assert_eq!(config.function_banks[&0x20], vec![1, 2, 3, 4, 0]);
        assert_eq!(config.function_banks[&0x28].len(), 8);
        assert_eq!(config.cvs[&29], 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_text_gives_defaults() {
        assert_eq!(
            AdapterConfig::from_yaml_str("").unwrap(),
            AdapterConfig::default()
        );
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let config = AdapterConfig::from_yaml_str(
            "log_ping: true\nidle_strategy: ticker\ndebug_functions:\n  5: exit\n",
        )
        .unwrap();
        assert!(config.log_ping);
        assert_eq!(config.idle_strategy, IdleStrategy::Ticker);
        assert_eq!(config.debug_functions.len(), 1);
        assert_eq!(config.debug_functions[&5], DebugAction::Exit);
        assert_eq!(config.mem_log_size, 500);
    }

    #[test]
    fn test_function_banks_from_yaml() {
        let config = AdapterConfig::from_yaml_str("function_banks:\n  32: [0, 1]\n").unwrap();
        assert_eq!(config.function_banks.len(), 1);
        assert_eq!(config.function_banks[&32], vec![0, 1]);
    }

    #[test]
    fn test_rejects_zero_period() {
        let error = AdapterConfig::from_yaml_str("scheduler_period_ms: 0").unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_log_budget() {
        assert!(AdapterConfig::from_yaml_str("mem_log_size: 0").is_err());
    }

    #[test]
    fn test_rejects_oversized_bank() {
        let error =
            AdapterConfig::from_yaml_str("function_banks:\n  32: [0, 1, 2, 3, 4, 5, 6, 7, 8]\n")
                .unwrap_err();
        assert!(error.to_string().contains("0x20"));
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert!(matches!(
            AdapterConfig::from_yaml_str("mem_log: 5"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let error = AdapterConfig::load("/nonexistent/alink.yaml").unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
