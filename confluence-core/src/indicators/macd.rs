//! Moving Average Convergence Divergence (MACD).
//!
//! Line:   EMA(close, fast) - EMA(close, slow)
//! Signal: EMA(line, signal)
//! Lookback: slow - 1 for the line, slow + signal - 2 for the signal.

use super::ema::ema_of_series;
use crate::components::indicator::Indicator;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// Which MACD output to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Line,
    Signal,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    fn with_line(fast: usize, slow: usize, signal: usize, line: MacdLine) -> Self {
        let (fast, slow, signal) = (fast.max(1), slow.max(1), signal.max(1));
        let label = match line {
            MacdLine::Line => "line",
            MacdLine::Signal => "signal",
        };
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("macd_{label}_{fast}_{slow}_{signal}"),
        }
    }

    pub fn line(fast: usize, slow: usize, signal: usize) -> Self {
        Self::with_line(fast, slow, signal, MacdLine::Line)
    }

    pub fn signal(fast: usize, slow: usize, signal: usize) -> Self {
        Self::with_line(fast, slow, signal, MacdLine::Signal)
    }

    /// Line and signal in one pass; the signal is derived from the line.
    pub fn both(fast: usize, slow: usize, signal: usize, closes: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let line = macd_line(closes, fast.max(1), slow.max(1));
        let sig = ema_of_series(&line, signal.max(1));
        (line, sig)
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::line(DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
    }
}

fn macd_line(closes: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    let fast_ema = ema_of_series(closes, fast);
    let slow_ema = ema_of_series(closes, slow);
    fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect()
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        let line = self.fast.max(self.slow) - 1;
        match self.line {
            MacdLine::Line => line,
            MacdLine::Signal => line + self.signal - 1,
        }
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let line = macd_line(closes, self.fast, self.slow);
        match self.line {
            MacdLine::Line => line,
            MacdLine::Signal => ema_of_series(&line, self.signal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn macd_constant_prices_is_zero() {
        let closes = [50.0; 60];
        let (line, signal) = Macd::both(12, 26, 9, &closes);
        assert_approx(line[59], 0.0, DEFAULT_EPSILON);
        assert_approx(signal[59], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn macd_warmup_matches_lookback() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let line_ind = Macd::line(12, 26, 9);
        let sig_ind = Macd::signal(12, 26, 9);
        let line = line_ind.compute(&closes);
        let sig = sig_ind.compute(&closes);
        assert_eq!(line_ind.lookback(), 25);
        assert_eq!(sig_ind.lookback(), 33);
        assert!(line[24].is_nan());
        assert!(!line[25].is_nan());
        assert!(sig[32].is_nan());
        assert!(!sig[33].is_nan());
    }

    #[test]
    fn macd_rising_prices_line_positive() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let line = Macd::default().compute(&closes);
        assert!(line[59] > 0.0);
    }

    #[test]
    fn macd_both_matches_separate_instances() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let (_, sig) = Macd::both(12, 26, 9, &closes);
        let sep_sig = Macd::signal(12, 26, 9).compute(&closes);
        for i in 0..50 {
            assert_eq!(sig[i].is_nan(), sep_sig[i].is_nan());
            if !sig[i].is_nan() {
                assert_approx(sig[i], sep_sig[i], DEFAULT_EPSILON);
            }
        }
    }
}
