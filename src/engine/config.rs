//! Engine configuration.
//!
//! Recognized options match §6's Configuration table exactly. Config is
//! supplied once at construction and never mutated during a run, mirroring
//! `performance::config::PerfConfig`'s `#[serde(default = ...)]` style in
//! the teacher crate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retracement at which a leg becomes formed.
    #[serde(default = "default_formation_threshold")]
    pub formation_threshold: Decimal,

    /// Proportion of leg range beyond pivot that decisively invalidates.
    #[serde(default = "default_invalidation_threshold")]
    pub invalidation_threshold: Decimal,

    /// Multiple of range that marks terminal completion.
    #[serde(default = "default_completion_multiple")]
    pub completion_multiple: Decimal,

    /// Time/range ratio bound for the proximity pruner.
    #[serde(default = "default_proximity_threshold")]
    pub proximity_threshold: Decimal,

    /// Range multiple of stagnation that triggers staleness.
    #[serde(default = "default_staleness_multiple")]
    pub staleness_multiple: Decimal,

    /// Price quantization unit. Instrument-specific; no default.
    pub tick_size: Decimal,
}

fn default_formation_threshold() -> Decimal {
    Decimal::new(382, 3) // 0.382
}

fn default_invalidation_threshold() -> Decimal {
    Decimal::new(382, 3)
}

fn default_completion_multiple() -> Decimal {
    Decimal::new(2, 0)
}

fn default_proximity_threshold() -> Decimal {
    Decimal::new(3, 2) // 0.03
}

fn default_staleness_multiple() -> Decimal {
    Decimal::new(2, 0)
}

impl EngineConfig {
    /// Build a config with every threshold at its §6 default, for the
    /// given instrument tick size.
    pub fn with_tick_size(tick_size: Decimal) -> Self {
        Self {
            formation_threshold: default_formation_threshold(),
            invalidation_threshold: default_invalidation_threshold(),
            completion_multiple: default_completion_multiple(),
            proximity_threshold: default_proximity_threshold(),
            staleness_multiple: default_staleness_multiple(),
            tick_size,
        }
    }

    /// Parse a config from a TOML document (CLI `--config` convenience;
    /// grounded in `core-config`'s `toml` + `serde` loader and the
    /// teacher's own `toml` dependency).
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let cfg: Self = toml::from_str(s).map_err(|e| EngineError::ConfigurationError {
            detail: format!("invalid config TOML: {e}"),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate at construction time per §7 (`ConfigurationError`).
    pub fn validate(&self) -> Result<(), EngineError> {
        let checks: &[(&str, Decimal)] = &[
            ("formation_threshold", self.formation_threshold),
            ("invalidation_threshold", self.invalidation_threshold),
            ("completion_multiple", self.completion_multiple),
            ("proximity_threshold", self.proximity_threshold),
            ("staleness_multiple", self.staleness_multiple),
        ];
        for (name, value) in checks {
            if *value <= Decimal::ZERO {
                return Err(EngineError::ConfigurationError {
                    detail: format!("{name} must be positive, got {value}"),
                });
            }
        }
        if self.tick_size <= Decimal::ZERO {
            return Err(EngineError::ConfigurationError {
                detail: format!("tick_size must be positive, got {}", self.tick_size),
            });
        }
        Ok(())
    }
}
