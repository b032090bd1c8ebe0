//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or return sequence in,
//! scalar out. Divide-by-zero cases resolve to a documented fallback and never
//! produce an error, NaN, or infinity.

use std::collections::BTreeMap;

use confluence_core::engine::SimulationResult;
use serde::{Deserialize, Serialize};

/// Bars per year for 5-minute sampling: 12 × 24 × 365.
pub const FIVE_MINUTE_BARS_PER_YEAR: f64 = 105_120.0;

/// Fewer returns than this short-circuits to the zeroed metrics set.
pub const MIN_RETURNS: usize = 5;

const STD_EPSILON: f64 = 1e-15;

/// Aggregate performance metrics for a single simulation run.
///
/// Fallbacks: Sharpe, Sortino and Calmar are 0.0 when their denominator is
/// zero; win rate is 0.0 with no trades; max drawdown is 0.0 for a
/// non-decreasing curve.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub final_value: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    /// Positive fraction of the running peak (0.15 = 15% drawdown).
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Percentage of profitable closed positions (0–100).
    pub win_rate: f64,
    pub trade_count: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from the three engine sequences.
    ///
    /// `equity_curve` is expected to be seeded with the initial value.
    /// With fewer than [`MIN_RETURNS`] returns only `final_value` and
    /// `trade_count` are populated.
    pub fn compute(
        equity_curve: &[f64],
        returns: &[f64],
        trade_outcomes: &[bool],
        bars_per_year: f64,
    ) -> Self {
        let final_value = equity_curve.last().copied().unwrap_or(0.0);
        if returns.len() < MIN_RETURNS {
            return Self::insufficient(final_value, trade_outcomes.len());
        }

        let total = total_return(equity_curve);
        let annualized = annualized_return(total, bars_per_year, returns.len());
        let dd = max_drawdown(equity_curve);
        Self {
            final_value,
            total_return: total,
            annualized_return: annualized,
            max_drawdown: dd,
            sharpe: sharpe_ratio(returns, bars_per_year),
            sortino: sortino_ratio(returns, bars_per_year),
            calmar: calmar_ratio(annualized, dd),
            win_rate: win_rate(trade_outcomes),
            trade_count: trade_outcomes.len(),
        }
    }

    pub fn from_simulation(result: &SimulationResult, bars_per_year: f64) -> Self {
        Self::compute(
            &result.equity_curve,
            &result.returns,
            &result.trade_outcomes(),
            bars_per_year,
        )
    }

    /// Zeroed set for inputs too short to carry statistical meaning.
    pub fn insufficient(final_value: f64, trade_count: usize) -> Self {
        Self {
            final_value,
            trade_count,
            ..Self::default()
        }
    }

    /// Named view of every metric, in stable key order.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("final_value", self.final_value),
            ("total_return", self.total_return),
            ("annualized_return", self.annualized_return),
            ("max_drawdown", self.max_drawdown),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("calmar", self.calmar),
            ("win_rate", self.win_rate),
            ("trade_count", self.trade_count as f64),
        ])
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: final / initial − 1.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if initial > 0.0 => last / initial - 1.0,
        _ => 0.0,
    }
}

/// Geometric annualization: (1 + total)^(bars_per_year / bar_count) − 1.
///
/// A total loss (or worse) annualizes to −1.0.
pub fn annualized_return(total_return: f64, bars_per_year: f64, bar_count: usize) -> f64 {
    if bar_count == 0 || bars_per_year <= 0.0 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(bars_per_year / bar_count as f64) - 1.0
}

/// Maximum drawdown as a positive fraction of the running peak.
///
/// Returns 0.0 if the curve never falls below a previous peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for &value in equity_curve {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }
    max_dd
}

/// Annualized Sharpe ratio: mean / sample stdev × √bars_per_year.
///
/// Returns 0.0 for zero variance or fewer than 2 returns.
pub fn sharpe_ratio(returns: &[f64], bars_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < STD_EPSILON {
        return 0.0;
    }
    mean_f64(returns) / std * bars_per_year.sqrt()
}

/// Annualized Sortino ratio: mean / sample stdev of the negative returns.
///
/// Returns 0.0 when fewer than 2 negative returns exist or their spread is zero.
pub fn sortino_ratio(returns: &[f64], bars_per_year: f64) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.len() < 2 {
        return 0.0;
    }
    let downside_std = std_dev(&downside);
    if downside_std < STD_EPSILON {
        return 0.0;
    }
    mean_f64(returns) / downside_std * bars_per_year.sqrt()
}

/// Calmar ratio: annualized return / max drawdown. 0.0 without drawdown.
pub fn calmar_ratio(annualized_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown <= 0.0 {
        return 0.0;
    }
    annualized_return / max_drawdown
}

/// Percentage of profitable outcomes. 0.0 with no trades.
pub fn win_rate(outcomes: &[bool]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let winners = outcomes.iter().filter(|&&w| w).count();
    winners as f64 / outcomes.len() as f64 * 100.0
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive values: v[t] / v[t−1] − 1.
pub fn simple_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
