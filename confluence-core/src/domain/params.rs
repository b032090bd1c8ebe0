//! StrategyParams — the immutable parameter set every simulation run receives.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunable strategy parameters.
///
/// `take_profit` and `stop_loss` are fractions of the entry notional
/// (0.05 = 5%). They are turned into absolute notional thresholds once, when a
/// position is opened. The RSI and Bollinger windows configure the indicator
/// precompute stage; the engine itself only reads the RSI thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    /// Shares per new entry (fractional allowed, strictly positive).
    pub shares: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub rsi_window: usize,
    pub rsi_lower: f64,
    pub rsi_upper: f64,
    pub bb_window: usize,
    /// Bollinger deviation multiplier.
    pub bb_std: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            shares: 1.0,
            take_profit: 0.05,
            stop_loss: 0.02,
            rsi_window: 14,
            rsi_lower: 45.0,
            rsi_upper: 55.0,
            bb_window: 20,
            bb_std: 2.0,
        }
    }
}

/// Invalid parameter set.
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("shares must be finite and > 0, got {0}")]
    NonPositiveShares(f64),
    #[error("{name} must be finite and >= 0, got {value}")]
    NegativeFraction { name: &'static str, value: f64 },
    #[error("stop_loss must be < 1.0 for long positions, got {0}")]
    StopLossTooWide(f64),
    #[error("rsi thresholds must satisfy 0 <= lower <= upper <= 100, got {lower}/{upper}")]
    RsiThresholds { lower: f64, upper: f64 },
    #[error("{name} window must be >= 1")]
    ZeroWindow { name: &'static str },
    #[error("bb_std must be finite and > 0, got {0}")]
    NonPositiveBandWidth(f64),
}

impl StrategyParams {
    /// Check every field against its admissible domain.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.shares.is_finite() && self.shares > 0.0) {
            return Err(ParamsError::NonPositiveShares(self.shares));
        }
        for (name, value) in [("take_profit", self.take_profit), ("stop_loss", self.stop_loss)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ParamsError::NegativeFraction { name, value });
            }
        }
        if self.stop_loss >= 1.0 {
            return Err(ParamsError::StopLossTooWide(self.stop_loss));
        }
        if !(0.0..=100.0).contains(&self.rsi_lower)
            || !(0.0..=100.0).contains(&self.rsi_upper)
            || self.rsi_lower > self.rsi_upper
        {
            return Err(ParamsError::RsiThresholds {
                lower: self.rsi_lower,
                upper: self.rsi_upper,
            });
        }
        if self.rsi_window == 0 {
            return Err(ParamsError::ZeroWindow { name: "rsi" });
        }
        if self.bb_window == 0 {
            return Err(ParamsError::ZeroWindow { name: "bollinger" });
        }
        if !(self.bb_std.is_finite() && self.bb_std > 0.0) {
            return Err(ParamsError::NonPositiveBandWidth(self.bb_std));
        }
        Ok(())
    }

    /// Copy with `take_profit` scaled by `factor`.
    pub fn with_take_profit_scaled(&self, factor: f64) -> Self {
        Self {
            take_profit: self.take_profit * factor,
            ..*self
        }
    }

    /// Copy with `stop_loss` scaled by `factor`.
    pub fn with_stop_loss_scaled(&self, factor: f64) -> Self {
        Self {
            stop_loss: self.stop_loss * factor,
            ..*self
        }
    }
}
