//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! Bands are separate Indicator instances:
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1.

use crate::components::indicator::Indicator;

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    fn with_band(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        let period = period.max(1);
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Upper)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Middle)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Lower)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let n = closes.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period {
            return result;
        }

        for i in (self.period - 1)..n {
            let window = &closes[i + 1 - self.period..=i];
            if window.iter().any(|v| v.is_nan()) {
                continue;
            }

            let mean = window.iter().sum::<f64>() / self.period as f64;
            let variance =
                window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.period as f64;
            let stddev = variance.sqrt();

            result[i] = match self.band {
                BollingerBand::Upper => mean + self.multiplier * stddev,
                BollingerBand::Middle => mean,
                BollingerBand::Lower => mean - self.multiplier * stddev,
            };
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn bollinger_constant_prices_collapse() {
        let closes = [100.0; 5];
        let upper = Bollinger::upper(3, 2.0).compute(&closes);
        let lower = Bollinger::lower(3, 2.0).compute(&closes);
        assert_approx(upper[4], 100.0, DEFAULT_EPSILON);
        assert_approx(lower[4], 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_known_values() {
        // window [1, 2, 3]: mean 2, population variance 2/3
        let closes = [1.0, 2.0, 3.0];
        let sd = (2.0_f64 / 3.0).sqrt();
        assert_approx(Bollinger::upper(3, 2.0).compute(&closes)[2], 2.0 + 2.0 * sd, 1e-12);
        assert_approx(Bollinger::middle(3, 2.0).compute(&closes)[2], 2.0, 1e-12);
        assert_approx(Bollinger::lower(3, 2.0).compute(&closes)[2], 2.0 - 2.0 * sd, 1e-12);
    }

    #[test]
    fn bollinger_warmup_is_nan() {
        let result = Bollinger::lower(3, 2.0).compute(&[1.0, 2.0, 3.0, 4.0]);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!(!result[2].is_nan());
    }

    #[test]
    fn bollinger_lookback() {
        assert_eq!(Bollinger::upper(20, 2.0).lookback(), 19);
    }
}
