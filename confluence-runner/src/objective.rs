//! Objective function — (parameters, bar slice) → scalar score.
//!
//! The optimizer calls this an arbitrary number of times, in any order and from
//! any thread. Every call builds its own ledger; the bar slice is read-only.

use std::borrow::Cow;
use std::ops::Range;

use confluence_core::domain::{Bar, PriceBar, StrategyParams};
use confluence_core::engine::{
    enrich, run_simulation, EngineConfig, IndicatorError, IndicatorSettings,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fitness::{ObjectivePolicy, NO_TRADE_PENALTY};
use crate::metrics::{PerformanceMetrics, FIVE_MINUTE_BARS_PER_YEAR};

/// Data a simulation can be scored on.
///
/// `Prices` are enriched per call with the candidate's own indicator windows.
/// A whole slice loses its first rows to indicator warmup; [`Dataset::window_bars`]
/// instead warms up on the prices preceding the window.
#[derive(Debug, Clone, Copy)]
pub enum Dataset<'a> {
    Bars(&'a [Bar]),
    Prices(&'a [PriceBar]),
}

impl<'a> Dataset<'a> {
    pub fn len(&self) -> usize {
        match self {
            Self::Bars(bars) => bars.len(),
            Self::Prices(prices) => prices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolved bars covering `range`.
    ///
    /// Raw prices are enriched over `range` extended backwards by the
    /// indicator warmup (as far as the series allows), then cut back to rows
    /// at or after `range.start`. Callers pass in-bounds ranges.
    pub fn window_bars(
        &self,
        range: Range<usize>,
        settings: &IndicatorSettings,
    ) -> Result<Cow<'a, [Bar]>, IndicatorError> {
        match *self {
            Self::Bars(bars) => Ok(Cow::Borrowed(&bars[range])),
            Self::Prices(prices) => {
                if range.is_empty() {
                    return Ok(Cow::Owned(Vec::new()));
                }
                let first = prices[range.start].timestamp;
                let from = range.start.saturating_sub(settings.warmup());
                let mut bars = enrich(&prices[from..range.end], settings)?;
                bars.retain(|b| b.timestamp >= first);
                Ok(Cow::Owned(bars))
            }
        }
    }

    /// Resolved bars: copied as-is, or enriched with `settings` when raw.
    pub fn to_bars(&self, settings: &IndicatorSettings) -> Result<Vec<Bar>, IndicatorError> {
        match *self {
            Self::Bars(bars) => Ok(bars.to_vec()),
            Self::Prices(prices) => enrich(prices, settings),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveFunction {
    pub engine: EngineConfig,
    pub bars_per_year: f64,
    pub policy: ObjectivePolicy,
}

impl Default for ObjectiveFunction {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            bars_per_year: FIVE_MINUTE_BARS_PER_YEAR,
            policy: ObjectivePolicy::default(),
        }
    }
}

impl ObjectiveFunction {
    pub fn new(engine: EngineConfig, bars_per_year: f64, policy: ObjectivePolicy) -> Self {
        Self {
            engine,
            bars_per_year,
            policy,
        }
    }

    /// Simulate and compute metrics without collapsing them to a score.
    pub fn evaluate(&self, params: &StrategyParams, bars: &[Bar]) -> PerformanceMetrics {
        let result = run_simulation(bars, params, &self.engine);
        PerformanceMetrics::from_simulation(&result, self.bars_per_year)
    }

    /// Score `params` on already-enriched bars.
    pub fn score(&self, params: &StrategyParams, bars: &[Bar]) -> f64 {
        self.policy.score(&self.evaluate(params, bars))
    }

    /// Score `params` on raw prices, computing indicators with the parameter
    /// set's own RSI and Bollinger windows. Invalid windows score the penalty.
    pub fn score_prices(&self, params: &StrategyParams, prices: &[PriceBar]) -> f64 {
        match enrich(prices, &IndicatorSettings::from_params(params)) {
            Ok(bars) => self.score(params, &bars),
            Err(err) => {
                debug!(%err, "indicator settings rejected");
                NO_TRADE_PENALTY
            }
        }
    }

    pub fn score_dataset(&self, params: &StrategyParams, data: Dataset<'_>) -> f64 {
        match data {
            Dataset::Bars(bars) => self.score(params, bars),
            Dataset::Prices(prices) => self.score_prices(params, prices),
        }
    }

    /// Score `params` on `range` of `data`, warming raw prices up on the
    /// preceding rows. Invalid windows score the penalty.
    pub fn score_window(
        &self,
        params: &StrategyParams,
        data: Dataset<'_>,
        range: Range<usize>,
    ) -> f64 {
        match data.window_bars(range, &IndicatorSettings::from_params(params)) {
            Ok(bars) => self.score(params, &bars),
            Err(err) => {
                debug!(%err, "indicator settings rejected");
                NO_TRADE_PENALTY
            }
        }
    }

    /// Metrics on `range` of `data`; see [`Self::score_window`].
    pub fn evaluate_window(
        &self,
        params: &StrategyParams,
        data: Dataset<'_>,
        range: Range<usize>,
    ) -> PerformanceMetrics {
        match data.window_bars(range, &IndicatorSettings::from_params(params)) {
            Ok(bars) => self.evaluate(params, &bars),
            Err(_) => PerformanceMetrics::insufficient(self.engine.initial_capital, 0),
        }
    }

    /// Metrics on either kind of data. Unusable indicator windows on raw
    /// prices yield the zeroed metrics set.
    pub fn evaluate_dataset(&self, params: &StrategyParams, data: Dataset<'_>) -> PerformanceMetrics {
        match data {
            Dataset::Bars(bars) => self.evaluate(params, bars),
            Dataset::Prices(prices) => {
                match enrich(prices, &IndicatorSettings::from_params(params)) {
                    Ok(bars) => self.evaluate(params, &bars),
                    Err(_) => PerformanceMetrics::insufficient(self.engine.initial_capital, 0),
                }
            }
        }
    }
}
