//! Engine configuration and run result types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::signal::DEFAULT_BAND_TOLERANCE;
use crate::domain::TradeRecord;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 1_000_000.0;
pub const DEFAULT_COMMISSION_RATE: f64 = 0.00125;

/// Invalid engine configuration.
#[derive(Debug, Error, PartialEq)]
pub enum EngineConfigError {
    #[error("initial_capital must be finite and > 0, got {0}")]
    InitialCapital(f64),
    #[error("commission_rate must be in [0, 1), got {0}")]
    CommissionRate(f64),
    #[error("band_tolerance must be in [0, 1), got {0}")]
    BandTolerance(f64),
    #[error("max_positions_per_side must be >= 1 when set")]
    ZeroCapacity,
}

/// Settings threaded through every simulation run. No process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Proportional fee charged on entry notional and again on exit notional.
    pub commission_rate: f64,
    /// Band proximity: long condition uses `lower × (1 + tol)`, short uses `upper × (1 − tol)`.
    pub band_tolerance: f64,
    /// `None` stacks without limit; `Some(1)` is the exclusive single-position model.
    pub max_positions_per_side: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            commission_rate: DEFAULT_COMMISSION_RATE,
            band_tolerance: DEFAULT_BAND_TOLERANCE,
            max_positions_per_side: None,
        }
    }
}

impl EngineConfig {
    pub fn new(initial_capital: f64, commission_rate: f64) -> Self {
        Self {
            initial_capital,
            commission_rate,
            ..Self::default()
        }
    }

    /// Single-position variant: at most one open long and one open short.
    pub fn exclusive(mut self) -> Self {
        self.max_positions_per_side = Some(1);
        self
    }

    pub fn validate(&self) -> Result<(), EngineConfigError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(EngineConfigError::InitialCapital(self.initial_capital));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return Err(EngineConfigError::CommissionRate(self.commission_rate));
        }
        if !(0.0..1.0).contains(&self.band_tolerance) {
            return Err(EngineConfigError::BandTolerance(self.band_tolerance));
        }
        if self.max_positions_per_side == Some(0) {
            return Err(EngineConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

/// Result of a completed simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Portfolio value per bar, seeded with the initial capital (len = bars + 1).
    pub equity_curve: Vec<f64>,
    /// Simple per-bar returns (len = bars).
    pub returns: Vec<f64>,
    /// Cash balance after each bar (len = bars).
    pub cash_curve: Vec<f64>,
    /// Closed positions, in close order.
    pub trades: Vec<TradeRecord>,
    pub total_fees: f64,
    pub bar_count: usize,
    /// Positions still open after the last bar; they stay marked to market.
    pub open_longs: usize,
    pub open_shorts: usize,
}

impl SimulationResult {
    /// Profitable / not per closed position, in close order.
    pub fn trade_outcomes(&self) -> Vec<bool> {
        self.trades.iter().map(TradeRecord::is_winner).collect()
    }

    pub fn initial_value(&self) -> f64 {
        self.equity_curve.first().copied().unwrap_or(0.0)
    }

    pub fn final_value(&self) -> f64 {
        self.equity_curve.last().copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = EngineConfig::default();
        assert_eq!(c.initial_capital, 1_000_000.0);
        assert_eq!(c.commission_rate, 0.00125);
        assert_eq!(c.band_tolerance, 0.01);
        assert_eq!(c.max_positions_per_side, None);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn exclusive_sets_capacity_one() {
        assert_eq!(
            EngineConfig::default().exclusive().max_positions_per_side,
            Some(1)
        );
    }

    #[test]
    fn invalid_configs_rejected() {
        let c = EngineConfig::new(0.0, 0.001);
        assert_eq!(c.validate(), Err(EngineConfigError::InitialCapital(0.0)));

        let c = EngineConfig::new(1000.0, -0.1);
        assert_eq!(c.validate(), Err(EngineConfigError::CommissionRate(-0.1)));

        let c = EngineConfig {
            max_positions_per_side: Some(0),
            ..EngineConfig::default()
        };
        assert_eq!(c.validate(), Err(EngineConfigError::ZeroCapacity));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let c: EngineConfig = serde_json::from_str(r#"{"commission_rate": 0.0}"#).unwrap();
        assert_eq!(c.commission_rate, 0.0);
        assert_eq!(c.initial_capital, DEFAULT_INITIAL_CAPITAL);
    }
}
