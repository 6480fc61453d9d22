use std::{cell::RefCell, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{constants::DEFAULT_COIN_PRECISION, precision, tracing::Tracer};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid chain config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid coin precision {0}: must be non-zero and divide 10^18")]
    InvalidPrecision(u64),
}

/// Host-ledger settings the dispatcher needs for value bridging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChainConfig {
    /// Native units per coin, e.g. 10^8.
    pub coin_precision: u64,
    /// Chain id announced on the Ethereum-compatible submission path.
    #[serde(rename = "evmChainID")]
    pub evm_chain_id: i32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            coin_precision: DEFAULT_COIN_PRECISION,
            evm_chain_id: 0,
        }
    }
}

impl ChainConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ChainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if precision::precision_ratio(self.coin_precision).is_err() {
            return Err(ConfigError::InvalidPrecision(self.coin_precision));
        }
        Ok(())
    }
}

/// Per-instance execution switches.
#[derive(Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VMConfig {
    /// Enables the tracer for top-level calls.
    pub debug: bool,
    /// Refuses every nested call (depth > 0) without executing it.
    pub no_recursion: bool,
    #[serde(skip)]
    pub tracer: Option<Rc<RefCell<dyn Tracer>>>,
}

impl fmt::Debug for VMConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VMConfig")
            .field("debug", &self.debug)
            .field("no_recursion", &self.no_recursion)
            .field("tracer", &self.tracer.is_some())
            .finish()
    }
}

impl VMConfig {
    pub fn with_tracer(tracer: Rc<RefCell<dyn Tracer>>) -> Self {
        Self {
            debug: true,
            no_recursion: false,
            tracer: Some(tracer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_config_reads_host_keys_and_defaults() {
        let config = ChainConfig::from_json(r#"{"evmChainID": 3999}"#).unwrap();
        assert_eq!(config.evm_chain_id, 3999);
        assert_eq!(config.coin_precision, DEFAULT_COIN_PRECISION);

        let config = ChainConfig::from_json(r#"{"coinPrecision": 10000, "evmChainID": 1}"#).unwrap();
        assert_eq!(config.coin_precision, 10_000);
    }

    #[test]
    fn chain_config_rejects_unusable_precision() {
        assert!(matches!(
            ChainConfig::from_json(r#"{"coinPrecision": 0}"#),
            Err(ConfigError::InvalidPrecision(0))
        ));
        assert!(matches!(
            ChainConfig::from_json(r#"{"coinPrecision": 3}"#),
            Err(ConfigError::InvalidPrecision(3))
        ));
        assert!(matches!(
            ChainConfig::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn vm_config_deserializes_switches() {
        let config: VMConfig = serde_json::from_str(r#"{"noRecursion": true, "debug": true}"#)
            .unwrap();
        assert!(config.debug);
        assert!(config.no_recursion);
        assert!(config.tracer.is_none());
    }
}
