//! Entry signal — a 2-of-3 majority vote over RSI, MACD and Bollinger conditions.
//!
//! Signals are portfolio-agnostic: they see one bar and fixed thresholds, never
//! cash or open positions.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, StrategyParams};

/// Minimum number of agreeing conditions for a signal to fire.
pub const MAJORITY: u8 = 2;

/// Default Bollinger tolerance: long condition uses `lower × 1.01`, short uses `upper × 0.99`.
pub const DEFAULT_BAND_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrySignal {
    None,
    EnterLong,
    EnterShort,
}

/// Thresholds the vote is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    pub rsi_lower: f64,
    pub rsi_upper: f64,
    /// Fractional slack applied to the Bollinger bands.
    pub band_tolerance: f64,
}

impl SignalThresholds {
    pub fn new(params: &StrategyParams, band_tolerance: f64) -> Self {
        Self {
            rsi_lower: params.rsi_lower,
            rsi_upper: params.rsi_upper,
            band_tolerance,
        }
    }
}

/// Number of bullish and bearish conditions that hold on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteTally {
    pub bullish: u8,
    pub bearish: u8,
}

impl VoteTally {
    /// Count the three conditions on each side.
    ///
    /// Bullish: RSI below the lower threshold, MACD above its signal line,
    /// close at or below the tolerated lower band.
    /// Bearish: RSI above the upper threshold, MACD below its signal line,
    /// close at or above the tolerated upper band.
    pub fn count(bar: &Bar, thresholds: &SignalThresholds) -> Self {
        let momentum = bar.macd_diff();
        let bullish = [
            bar.rsi < thresholds.rsi_lower,
            momentum > 0.0,
            bar.close <= bar.bb_lower * (1.0 + thresholds.band_tolerance),
        ];
        let bearish = [
            bar.rsi > thresholds.rsi_upper,
            momentum < 0.0,
            bar.close >= bar.bb_upper * (1.0 - thresholds.band_tolerance),
        ];
        Self {
            bullish: bullish.iter().filter(|&&c| c).count() as u8,
            bearish: bearish.iter().filter(|&&c| c).count() as u8,
        }
    }

    /// Long wins ties: if both sides reach a majority the result is `EnterLong`.
    pub fn decide(&self) -> EntrySignal {
        if self.bullish >= MAJORITY {
            EntrySignal::EnterLong
        } else if self.bearish >= MAJORITY {
            EntrySignal::EnterShort
        } else {
            EntrySignal::None
        }
    }
}

/// Trait for per-bar entry signals.
pub trait SignalEvaluator: Send + Sync {
    fn name(&self) -> &str;

    /// Evaluate one bar. Must be pure.
    fn evaluate(&self, bar: &Bar) -> EntrySignal;
}

/// The RSI / MACD / Bollinger confluence vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfluenceSignal {
    thresholds: SignalThresholds,
}

impl ConfluenceSignal {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }

    pub fn from_params(params: &StrategyParams, band_tolerance: f64) -> Self {
        Self::new(SignalThresholds::new(params, band_tolerance))
    }

    pub fn thresholds(&self) -> &SignalThresholds {
        &self.thresholds
    }
}

impl SignalEvaluator for ConfluenceSignal {
    fn name(&self) -> &str {
        "confluence_vote"
    }

    fn evaluate(&self, bar: &Bar) -> EntrySignal {
        VoteTally::count(bar, &self.thresholds).decide()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(close: f64, rsi: f64, macd_diff: f64, lower: f64, upper: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            close,
            rsi,
            macd: macd_diff,
            macd_signal: 0.0,
            bb_lower: lower,
            bb_upper: upper,
        }
    }

    fn signal() -> ConfluenceSignal {
        ConfluenceSignal::from_params(&StrategyParams::default(), DEFAULT_BAND_TOLERANCE)
    }

    #[test]
    fn neutral_bar_is_none() {
        // RSI 50, flat MACD, price mid-band
        let b = bar(100.0, 50.0, 0.0, 90.0, 110.0);
        assert_eq!(signal().evaluate(&b), EntrySignal::None);
    }

    #[test]
    fn two_bullish_conditions_enter_long() {
        // RSI 40 < 45 and MACD positive; price far above lower band
        let b = bar(100.0, 40.0, 1.5, 80.0, 120.0);
        assert_eq!(signal().evaluate(&b), EntrySignal::EnterLong);
    }

    #[test]
    fn one_bullish_condition_is_not_enough() {
        let b = bar(100.0, 40.0, 0.0, 80.0, 120.0);
        let tally = VoteTally::count(&b, signal().thresholds());
        assert_eq!(tally.bullish, 1);
        assert_eq!(signal().evaluate(&b), EntrySignal::None);
    }

    #[test]
    fn band_tolerance_widens_long_condition() {
        // close 100.5 is above the lower band 100 but within 1%
        let b = bar(100.5, 40.0, -1.0, 100.0, 130.0);
        let tally = VoteTally::count(&b, signal().thresholds());
        assert_eq!(tally.bullish, 2);
        let strict = ConfluenceSignal::from_params(&StrategyParams::default(), 0.0);
        assert_eq!(strict.evaluate(&b), EntrySignal::None);
    }

    #[test]
    fn close_exactly_at_band_counts() {
        let b = bar(100.0, 40.0, -1.0, 100.0, 130.0);
        let strict = ConfluenceSignal::from_params(&StrategyParams::default(), 0.0);
        assert_eq!(strict.evaluate(&b), EntrySignal::EnterLong);
    }

    #[test]
    fn two_bearish_conditions_enter_short() {
        // RSI 60 > 55 and MACD negative
        let b = bar(100.0, 60.0, -2.0, 80.0, 120.0);
        assert_eq!(signal().evaluate(&b), EntrySignal::EnterShort);
    }

    #[test]
    fn upper_band_and_rsi_enter_short() {
        let b = bar(119.0, 70.0, 0.5, 80.0, 120.0);
        assert_eq!(signal().evaluate(&b), EntrySignal::EnterShort);
    }

    #[test]
    fn long_wins_simultaneous_majorities() {
        // Collapsed bands put the close at both bands; overlapping RSI thresholds
        // make RSI satisfy both sides.
        let params = StrategyParams {
            rsi_lower: 60.0,
            rsi_upper: 40.0,
            ..Default::default()
        };
        let s = ConfluenceSignal::from_params(&params, 0.0);
        let b = bar(100.0, 50.0, 0.0, 100.0, 100.0);
        let tally = VoteTally::count(&b, s.thresholds());
        assert_eq!(tally.bullish, 2);
        assert_eq!(tally.bearish, 2);
        assert_eq!(s.evaluate(&b), EntrySignal::EnterLong);
    }
}
