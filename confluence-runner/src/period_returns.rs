//! Calendar period returns from a timestamped equity curve.
//!
//! Each period's value is the last observation inside it; its return is the
//! percent change against the previous period's value. The first period
//! reports 0. Periods without observations are skipped.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use confluence_core::domain::Bar;
use confluence_core::engine::SimulationResult;

/// One point of the persisted equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub portfolio_value: f64,
}

/// Pair every processed bar with the value recorded after it.
///
/// The seed value (before the first bar) has no timestamp and is omitted.
pub fn timestamped_equity(bars: &[Bar], result: &SimulationResult) -> Vec<EquityPoint> {
    bars.iter()
        .zip(result.equity_curve.iter().skip(1))
        .map(|(bar, &portfolio_value)| EquityPoint {
            timestamp: bar.timestamp,
            portfolio_value,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Monthly,
    Quarterly,
    Annual,
}

impl Period {
    fn key(&self, ts: &NaiveDateTime) -> (i32, u32) {
        match self {
            Self::Monthly => (ts.year(), ts.month()),
            Self::Quarterly => (ts.year(), (ts.month() - 1) / 3 + 1),
            Self::Annual => (ts.year(), 0),
        }
    }

    fn label(&self, (year, sub): (i32, u32)) -> String {
        match self {
            Self::Monthly => format!("{year}-{sub:02}"),
            Self::Quarterly => format!("Q{sub} {year}"),
            Self::Annual => format!("{year}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReturn {
    pub period: String,
    pub end_value: f64,
    /// Percent change vs. the previous period (5.0 = +5%).
    pub return_pct: f64,
}

/// Period returns over a time-ordered curve.
pub fn period_returns(points: &[EquityPoint], period: Period) -> Vec<PeriodReturn> {
    let mut closes: Vec<((i32, u32), f64)> = Vec::new();
    for p in points {
        let key = period.key(&p.timestamp);
        match closes.last_mut() {
            Some((last_key, value)) if *last_key == key => *value = p.portfolio_value,
            _ => closes.push((key, p.portfolio_value)),
        }
    }

    let mut prev: Option<f64> = None;
    closes
        .into_iter()
        .map(|(key, end_value)| {
            let return_pct = match prev {
                Some(p) if p > 0.0 => (end_value / p - 1.0) * 100.0,
                _ => 0.0,
            };
            prev = Some(end_value);
            PeriodReturn {
                period: period.label(key),
                end_value,
                return_pct,
            }
        })
        .collect()
}

/// Percent return from the first to the last point.
pub fn total_return_pct(points: &[EquityPoint]) -> f64 {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if first.portfolio_value > 0.0 => {
            (last.portfolio_value / first.portfolio_value - 1.0) * 100.0
        }
        _ => 0.0,
    }
}

/// The full tabular report: monthly, quarterly, annual, and total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnTables {
    pub monthly: Vec<PeriodReturn>,
    pub quarterly: Vec<PeriodReturn>,
    pub annual: Vec<PeriodReturn>,
    pub total_pct: f64,
}

impl ReturnTables {
    pub fn compute(points: &[EquityPoint]) -> Self {
        Self {
            monthly: period_returns(points, Period::Monthly),
            quarterly: period_returns(points, Period::Quarterly),
            annual: period_returns(points, Period::Annual),
            total_pct: total_return_pct(points),
        }
    }
}
