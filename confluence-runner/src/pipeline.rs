//! Single runs and train/test evaluation.
//!
//! `simulate_bars` measures one parameter set on one bar set. `train_test`
//! optimizes on a train series, then runs the winner once on an unseen test
//! series and keeps everything the artifact layer persists.

use serde::{Deserialize, Serialize};
use tracing::info;

use confluence_core::domain::{Bar, StrategyParams};
use confluence_core::engine::{run_simulation, IndicatorError, IndicatorSettings, SimulationResult};

use crate::metrics::PerformanceMetrics;
use crate::objective::{Dataset, ObjectiveFunction};
use crate::period_returns::{timestamped_equity, EquityPoint, ReturnTables};
use crate::search::{Optimizer, ParamSpace};

/// Walk-forward windows use small indices; the full train set gets its own
/// random stream.
pub const FINAL_SEARCH_WINDOW: u64 = u64::MAX;

/// One simulated parameter set with its derived reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub params: StrategyParams,
    pub result: SimulationResult,
    pub metrics: PerformanceMetrics,
    pub equity: Vec<EquityPoint>,
    pub period_returns: ReturnTables,
}

pub fn simulate_bars(
    bars: &[Bar],
    params: &StrategyParams,
    objective: &ObjectiveFunction,
) -> RunOutcome {
    let result = run_simulation(bars, params, &objective.engine);
    let metrics = PerformanceMetrics::from_simulation(&result, objective.bars_per_year);
    let equity = timestamped_equity(bars, &result);
    let period_returns = ReturnTables::compute(&equity);
    RunOutcome {
        params: *params,
        result,
        metrics,
        equity,
        period_returns,
    }
}

/// Enrich when needed, then simulate.
pub fn simulate_dataset(
    data: Dataset<'_>,
    params: &StrategyParams,
    objective: &ObjectiveFunction,
) -> Result<RunOutcome, IndicatorError> {
    let bars = data.to_bars(&IndicatorSettings::from_params(params))?;
    Ok(simulate_bars(&bars, params, objective))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainTestOutcome {
    pub optimizer: String,
    pub trials: usize,
    pub best_params: StrategyParams,
    pub train_score: f64,
    pub test: RunOutcome,
}

/// Optimize on `train`, evaluate the best parameters on `test`.
pub fn train_test(
    train: Dataset<'_>,
    test: Dataset<'_>,
    objective: &ObjectiveFunction,
    optimizer: &dyn Optimizer,
    space: &ParamSpace,
) -> Result<TrainTestOutcome, IndicatorError> {
    let outcome = optimizer.optimize(space, FINAL_SEARCH_WINDOW, &|params: &StrategyParams| {
        objective.score_dataset(params, train)
    });
    info!(
        optimizer = optimizer.name(),
        trials = outcome.trials.len(),
        best_score = outcome.best_score,
        "train optimization done"
    );

    let test_run = simulate_dataset(test, &outcome.best_params, objective)?;
    info!(
        bars = test_run.result.bar_count,
        total_return = test_run.metrics.total_return,
        calmar = test_run.metrics.calmar,
        trades = test_run.metrics.trade_count,
        "test evaluation done"
    );

    Ok(TrainTestOutcome {
        optimizer: optimizer.name().to_string(),
        trials: outcome.trials.len(),
        best_params: outcome.best_params,
        train_score: outcome.best_score,
        test: test_run,
    })
}
