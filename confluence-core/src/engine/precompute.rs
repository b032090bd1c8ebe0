//! Indicator precomputation: raw closes → indicator-augmented bars.
//!
//! All series are computed once over the full close sequence before the bar
//! loop begins. Rows whose indicator columns are still in warmup (NaN) are
//! dropped, so the output satisfies the engine's fully-resolved bar contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::components::indicator::Indicator;
use crate::domain::{Bar, PriceBar, StrategyParams};
use crate::indicators::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::indicators::{Bollinger, Macd, Rsi};

/// Invalid indicator settings.
#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("{name} period must be >= 1")]
    ZeroPeriod { name: &'static str },
    #[error("macd fast period ({fast}) must be shorter than slow period ({slow})")]
    MacdPeriods { fast: usize, slow: usize },
    #[error("bollinger multiplier must be finite and > 0, got {0}")]
    BandMultiplier(f64),
}

/// Windows and multipliers of the three indicator families.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub rsi_window: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_window: usize,
    pub bb_std: f64,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self::from_params(&StrategyParams::default())
    }
}

impl IndicatorSettings {
    /// RSI and Bollinger settings from the parameter set, MACD at 12/26/9.
    pub fn from_params(params: &StrategyParams) -> Self {
        Self {
            rsi_window: params.rsi_window,
            macd_fast: DEFAULT_FAST,
            macd_slow: DEFAULT_SLOW,
            macd_signal: DEFAULT_SIGNAL,
            bb_window: params.bb_window,
            bb_std: params.bb_std,
        }
    }

    pub fn validate(&self) -> Result<(), IndicatorError> {
        for (name, period) in [
            ("rsi", self.rsi_window),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bollinger", self.bb_window),
        ] {
            if period == 0 {
                return Err(IndicatorError::ZeroPeriod { name });
            }
        }
        if self.macd_fast >= self.macd_slow {
            return Err(IndicatorError::MacdPeriods {
                fast: self.macd_fast,
                slow: self.macd_slow,
            });
        }
        if !(self.bb_std.is_finite() && self.bb_std > 0.0) {
            return Err(IndicatorError::BandMultiplier(self.bb_std));
        }
        Ok(())
    }

    /// The indicator instances these settings describe, one per output column.
    pub fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![
            Box::new(Rsi::new(self.rsi_window)),
            Box::new(Macd::line(self.macd_fast, self.macd_slow, self.macd_signal)),
            Box::new(Macd::signal(self.macd_fast, self.macd_slow, self.macd_signal)),
            Box::new(Bollinger::lower(self.bb_window, self.bb_std)),
            Box::new(Bollinger::upper(self.bb_window, self.bb_std)),
        ]
    }

    /// Leading rows every clean series loses to indicator lookback.
    pub fn warmup(&self) -> usize {
        compute_warmup(&self.indicators())
    }
}

/// Compute the warmup length from a set of indicators.
///
/// The warmup is the maximum lookback across all indicators: the number of
/// leading rows `enrich` drops from a clean price series.
pub fn compute_warmup(indicators: &[Box<dyn Indicator>]) -> usize {
    indicators.iter().map(|i| i.lookback()).max().unwrap_or(0)
}

/// Compute every indicator column over `prices` and keep only resolved rows.
pub fn enrich(prices: &[PriceBar], settings: &IndicatorSettings) -> Result<Vec<Bar>, IndicatorError> {
    settings.validate()?;

    let warmup = settings.warmup();
    if prices.len() <= warmup {
        debug!(input = prices.len(), warmup, "series shorter than indicator warmup");
        return Ok(Vec::new());
    }

    let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
    let rsi = Rsi::new(settings.rsi_window).compute(&closes);
    let (macd, macd_signal) = Macd::both(
        settings.macd_fast,
        settings.macd_slow,
        settings.macd_signal,
        &closes,
    );
    let bb_lower = Bollinger::lower(settings.bb_window, settings.bb_std).compute(&closes);
    let bb_upper = Bollinger::upper(settings.bb_window, settings.bb_std).compute(&closes);

    let bars: Vec<Bar> = prices
        .iter()
        .enumerate()
        .map(|(i, p)| Bar {
            timestamp: p.timestamp,
            close: p.close,
            rsi: rsi[i],
            macd: macd[i],
            macd_signal: macd_signal[i],
            bb_lower: bb_lower[i],
            bb_upper: bb_upper[i],
        })
        .filter(Bar::is_resolved)
        .collect();

    debug!(
        input = prices.len(),
        output = bars.len(),
        warmup,
        dropped = prices.len() - bars.len(),
        "indicator precompute"
    );
    Ok(bars)
}
