//! Robustness check: perturb the exit fractions of a parameter set and
//! re-measure.
//!
//! `take_profit` and `stop_loss` are scaled one at a time by each factor;
//! everything else stays at the baseline. The unscaled run is reported once
//! per parameter.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use confluence_core::domain::{Bar, StrategyParams};

use crate::objective::ObjectiveFunction;

/// −20%, baseline, +20%.
pub const DEFAULT_FACTORS: [f64; 3] = [0.8, 1.0, 1.2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityParam {
    TakeProfit,
    StopLoss,
}

impl SensitivityParam {
    pub const ALL: [Self; 2] = [Self::TakeProfit, Self::StopLoss];

    pub fn label(&self) -> &'static str {
        match self {
            Self::TakeProfit => "TP",
            Self::StopLoss => "SL",
        }
    }

    fn apply(&self, params: &StrategyParams, factor: f64) -> StrategyParams {
        match self {
            Self::TakeProfit => params.with_take_profit_scaled(factor),
            Self::StopLoss => params.with_stop_loss_scaled(factor),
        }
    }

    fn value(&self, params: &StrategyParams) -> f64 {
        match self {
            Self::TakeProfit => params.take_profit,
            Self::StopLoss => params.stop_loss,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRow {
    pub parameter: SensitivityParam,
    /// `ORIGINAL` for the baseline, otherwise the signed change (`-20.0%`).
    pub variation: String,
    pub value: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe: f64,
}

/// Label for a scale factor.
pub fn variation_label(factor: f64) -> String {
    if (factor - 1.0).abs() < 1e-12 {
        "ORIGINAL".to_string()
    } else {
        format!("{:+.1}%", (factor - 1.0) * 100.0)
    }
}

/// Run every (parameter, factor) variant on `bars`.
///
/// Rows come back grouped by parameter in factor order, with duplicate
/// labels removed.
pub fn run_sensitivity(
    bars: &[Bar],
    baseline: &StrategyParams,
    objective: &ObjectiveFunction,
    factors: &[f64],
) -> Vec<SensitivityRow> {
    let mut cases: Vec<(SensitivityParam, f64, String)> = Vec::new();
    for param in SensitivityParam::ALL {
        for &factor in factors {
            let label = variation_label(factor);
            if !cases.iter().any(|(p, _, l)| *p == param && *l == label) {
                cases.push((param, factor, label));
            }
        }
    }

    let rows: Vec<SensitivityRow> = cases
        .into_par_iter()
        .map(|(parameter, factor, variation)| {
            let params = parameter.apply(baseline, factor);
            let m = objective.evaluate(&params, bars);
            SensitivityRow {
                parameter,
                variation,
                value: parameter.value(&params),
                total_return: m.total_return,
                max_drawdown: m.max_drawdown,
                sharpe: m.sharpe,
            }
        })
        .collect();

    info!(rows = rows.len(), bars = bars.len(), "sensitivity analysis done");
    rows
}
