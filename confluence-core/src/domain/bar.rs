//! Bar — one sampling interval of price plus its resolved indicator columns.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Raw price observation, the input of the indicator precompute stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub close: f64,
}

/// Indicator-augmented bar consumed by the simulation.
///
/// Bars are immutable once produced. A sequence handed to the engine is
/// time-ordered, has no duplicate timestamps, and every field is resolved:
/// rows with insufficient indicator lookback are dropped upstream.
///
/// When only a precomputed MACD difference is available, store it in `macd`
/// and leave `macd_signal` at zero; the engine only reads [`Bar::macd_diff`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub bb_lower: f64,
    pub bb_upper: f64,
}

impl Bar {
    /// MACD momentum: line minus signal line.
    pub fn macd_diff(&self) -> f64 {
        self.macd - self.macd_signal
    }

    /// True when the close and every indicator column hold a finite value.
    pub fn is_resolved(&self) -> bool {
        [
            self.close,
            self.rsi,
            self.macd,
            self.macd_signal,
            self.bb_lower,
            self.bb_upper,
        ]
        .iter()
        .all(|v| v.is_finite())
            && self.close > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(0, 5, 0)
                .unwrap(),
            close: 60_000.0,
            rsi: 41.0,
            macd: 12.5,
            macd_signal: 10.0,
            bb_lower: 59_800.0,
            bb_upper: 60_400.0,
        }
    }

    #[test]
    fn macd_diff_is_line_minus_signal() {
        assert!((sample_bar().macd_diff() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn resolved_bar() {
        assert!(sample_bar().is_resolved());
    }

    #[test]
    fn nan_indicator_is_unresolved() {
        let mut bar = sample_bar();
        bar.rsi = f64::NAN;
        assert!(!bar.is_resolved());
    }

    #[test]
    fn non_positive_close_is_unresolved() {
        let mut bar = sample_bar();
        bar.close = 0.0;
        assert!(!bar.is_resolved());
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
