//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use pidbg_core::{AppInfo, BoardInfo, Capabilities, PinDefinition, ThresholdConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Smallest per-subscriber buffer: the `meta` and `snapshot` join events must fit.
pub const MIN_SUBSCRIBER_BUFFER: usize = 2;

/// Engine configuration.
///
/// Only the queue sizes come from the config file; the rest is filled in by
/// the binary at startup and stays fixed for the engine's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the ordered reading intake.
    pub intake_capacity: usize,
    /// Bounded outbound buffer per subscriber.
    pub subscriber_buffer: usize,
    #[serde(skip)]
    pub thresholds: ThresholdConfig,
    #[serde(skip)]
    pub capabilities: Capabilities,
    #[serde(skip)]
    pub board: BoardInfo,
    #[serde(skip)]
    pub app: AppInfo,
    #[serde(skip)]
    pub gpio_schema: BTreeMap<u8, PinDefinition>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intake_capacity: 1024,
            subscriber_buffer: 256,
            thresholds: ThresholdConfig::default(),
            capabilities: Capabilities::default(),
            board: BoardInfo::default(),
            app: AppInfo::default(),
            gpio_schema: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.intake_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "intake_capacity must be at least 1".to_string(),
            ));
        }
        if self.subscriber_buffer < MIN_SUBSCRIBER_BUFFER {
            return Err(EngineError::InvalidConfig(format!(
                "subscriber_buffer must be at least {MIN_SUBSCRIBER_BUFFER}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.intake_capacity, 1024);
        assert_eq!(cfg.subscriber_buffer, 256);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_tiny_buffers() {
        let cfg = EngineConfig {
            subscriber_buffer: 1,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));

        let cfg = EngineConfig {
            intake_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"subscriber_buffer": 8}"#).unwrap();
        assert_eq!(cfg.subscriber_buffer, 8);
        assert_eq!(cfg.intake_capacity, 1024);
    }
}
