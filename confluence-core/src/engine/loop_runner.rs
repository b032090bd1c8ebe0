//! Bar-by-bar simulation loop.
//!
//! Three phases per bar, in fixed order:
//! 1. Exit evaluation: close every position whose stop-loss or take-profit
//!    boundary the close price crosses
//! 2. Entry evaluation: vote on the bar, open at most one new position
//! 3. Valuation: mark to market, append to the equity curve, record the return
//!
//! The loop is sequential and allocation-light; all state is local to one call.

use crate::components::signal::{ConfluenceSignal, EntrySignal, SignalEvaluator};
use crate::domain::{Bar, PositionSide, StrategyParams};

use super::accounting::PositionLedger;
use super::state::{EngineConfig, SimulationResult};

/// Run the confluence strategy over `bars`.
///
/// Pure: identical inputs always produce identical outputs.
pub fn run_simulation(
    bars: &[Bar],
    params: &StrategyParams,
    config: &EngineConfig,
) -> SimulationResult {
    let signal = ConfluenceSignal::from_params(params, config.band_tolerance);
    run_simulation_with(bars, &signal, params, config)
}

/// Run the loop with an arbitrary entry signal.
pub fn run_simulation_with(
    bars: &[Bar],
    signal: &dyn SignalEvaluator,
    params: &StrategyParams,
    config: &EngineConfig,
) -> SimulationResult {
    let mut ledger = PositionLedger::from_config(config);
    let mut trades = Vec::new();

    let mut equity_curve = Vec::with_capacity(bars.len() + 1);
    let mut returns = Vec::with_capacity(bars.len());
    let mut cash_curve = Vec::with_capacity(bars.len());
    equity_curve.push(config.initial_capital);
    let mut prev_value = config.initial_capital;

    for (bar_index, bar) in bars.iter().enumerate() {
        let price = bar.close;

        // Phase 1: exits
        trades.extend(ledger.close_triggered(price, bar_index));

        // Phase 2: entries
        let side = match signal.evaluate(bar) {
            EntrySignal::EnterLong => Some(PositionSide::Long),
            EntrySignal::EnterShort => Some(PositionSide::Short),
            EntrySignal::None => None,
        };
        if let Some(side) = side {
            ledger.try_open(side, price, params, bar_index);
        }

        // Phase 3: valuation
        let value = ledger.verify_value(price);
        let ret = if prev_value > 0.0 {
            value / prev_value - 1.0
        } else {
            0.0
        };
        equity_curve.push(value);
        returns.push(ret);
        cash_curve.push(ledger.cash());
        prev_value = value;
    }

    SimulationResult {
        equity_curve,
        returns,
        cash_curve,
        trades,
        total_fees: ledger.fees_paid(),
        bar_count: bars.len(),
        open_longs: ledger.longs().len(),
        open_shorts: ledger.shorts().len(),
    }
}
