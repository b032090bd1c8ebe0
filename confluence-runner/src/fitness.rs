//! Fitness policy — how one metrics set collapses into an optimizer score.

use serde::{Deserialize, Serialize};

use crate::metrics::PerformanceMetrics;

/// Score returned for a parameter set that never traded or broke exactly even.
pub const NO_TRADE_PENALTY: f64 = -1.0e6;

/// Which metric (or composite) the optimizer maximizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectivePolicy {
    #[default]
    Calmar,
    Sharpe,
    /// total_return + weight × sharpe
    ReturnPlusSharpe { weight: f64 },
}

impl ObjectivePolicy {
    /// Score a metrics set. Total return of exactly zero earns the penalty.
    pub fn score(&self, metrics: &PerformanceMetrics) -> f64 {
        if metrics.total_return == 0.0 {
            return NO_TRADE_PENALTY;
        }
        match self {
            Self::Calmar => metrics.calmar,
            Self::Sharpe => metrics.sharpe,
            Self::ReturnPlusSharpe { weight } => metrics.total_return + weight * metrics.sharpe,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Calmar => "calmar",
            Self::Sharpe => "sharpe",
            Self::ReturnPlusSharpe { .. } => "return_plus_sharpe",
        }
    }
}
