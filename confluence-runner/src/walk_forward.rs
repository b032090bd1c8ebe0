//! Walk-forward validation: train/test window generation and out-of-sample
//! evaluation.
//!
//! Windows are forward-only: every test range starts at or after the end of
//! its train range. Two policies:
//!
//! - `Rolling`: fixed train/test lengths, start advances by `step`; stops as
//!   soon as `start + train + test` exceeds the sequence length.
//! - `Splits { n }`: the sequence is cut into `n + 1` equal chunks; window k
//!   trains on chunks `0..=k` and tests on chunk `k + 1`.
//!
//! Too little data is not an error: the window sequence is simply empty.

use std::ops::Range;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use confluence_core::domain::StrategyParams;

use crate::metrics::PerformanceMetrics;
use crate::objective::{Dataset, ObjectiveFunction};
use crate::search::{Optimizer, ParamSpace};

// ─── Configuration ───────────────────────────────────────────────────

/// Minutes per 5-minute bar.
pub const FIVE_MINUTES: u64 = 5;
/// 30 days of minutes (8,640 five-minute bars).
pub const MONTH_MINUTES: u64 = 30 * 24 * 60;
/// 7 days of minutes (2,016 five-minute bars).
pub const WEEK_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Error, PartialEq)]
pub enum WalkForwardError {
    #[error("{name} length must be at least one bar")]
    ZeroLength { name: &'static str },
    #[error("bar interval must be > 0 minutes")]
    ZeroInterval,
    #[error("split count must be >= 1")]
    ZeroSplits,
}

/// Train, test and step lengths in bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLengths {
    train: usize,
    test: usize,
    step: usize,
}

impl Default for WindowLengths {
    /// One month train, one week test, one week step at 5-minute bars.
    fn default() -> Self {
        Self {
            train: 8_640,
            test: 2_016,
            step: 2_016,
        }
    }
}

impl WindowLengths {
    pub fn new(train: usize, test: usize, step: usize) -> Result<Self, WalkForwardError> {
        for (name, value) in [("train", train), ("test", test), ("step", step)] {
            if value == 0 {
                return Err(WalkForwardError::ZeroLength { name });
            }
        }
        Ok(Self { train, test, step })
    }

    /// Convert calendar durations (minutes) into bar counts at a fixed
    /// sampling interval. Partial bars are truncated.
    pub fn from_durations(
        train_minutes: u64,
        test_minutes: u64,
        step_minutes: u64,
        bar_minutes: u64,
    ) -> Result<Self, WalkForwardError> {
        if bar_minutes == 0 {
            return Err(WalkForwardError::ZeroInterval);
        }
        let bars = |minutes: u64| usize::try_from(minutes / bar_minutes).unwrap_or(usize::MAX);
        Self::new(bars(train_minutes), bars(test_minutes), bars(step_minutes))
    }

    pub fn train(&self) -> usize {
        self.train
    }

    pub fn test(&self) -> usize {
        self.test
    }

    pub fn step(&self) -> usize {
        self.step
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowPolicy {
    #[default]
    Rolling,
    Splits {
        n: usize,
    },
}

// ─── Window generation ───────────────────────────────────────────────

/// One (train, test) pair of half-open bar index ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub index: usize,
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Generator of walk-forward windows over a sequence of `len` bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkForwardPartitioner {
    len: usize,
    lengths: WindowLengths,
    policy: WindowPolicy,
}

impl WalkForwardPartitioner {
    pub fn rolling(len: usize, lengths: WindowLengths) -> Self {
        Self {
            len,
            lengths,
            policy: WindowPolicy::Rolling,
        }
    }

    pub fn splits(len: usize, n: usize) -> Result<Self, WalkForwardError> {
        if n == 0 {
            return Err(WalkForwardError::ZeroSplits);
        }
        Ok(Self {
            len,
            lengths: WindowLengths::default(),
            policy: WindowPolicy::Splits { n },
        })
    }

    pub fn with_policy(
        len: usize,
        lengths: WindowLengths,
        policy: WindowPolicy,
    ) -> Result<Self, WalkForwardError> {
        match policy {
            WindowPolicy::Rolling => Ok(Self::rolling(len, lengths)),
            WindowPolicy::Splits { n } => Self::splits(len, n),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// A fresh pass over the windows. Each call restarts from the first window.
    pub fn windows(&self) -> Windows {
        Windows {
            partitioner: *self,
            next_index: 0,
        }
    }
}

impl IntoIterator for &WalkForwardPartitioner {
    type Item = WindowSpec;
    type IntoIter = Windows;

    fn into_iter(self) -> Windows {
        self.windows()
    }
}

/// Lazy window iterator. Cloning it forks the pass at its current position.
#[derive(Debug, Clone)]
pub struct Windows {
    partitioner: WalkForwardPartitioner,
    next_index: usize,
}

impl Windows {
    fn window_at(&self, index: usize) -> Option<WindowSpec> {
        let WalkForwardPartitioner {
            len,
            lengths,
            policy,
        } = self.partitioner;

        let (train, test) = match policy {
            WindowPolicy::Rolling => {
                let start = index.checked_mul(lengths.step)?;
                let train_end = start.checked_add(lengths.train)?;
                let test_end = train_end.checked_add(lengths.test)?;
                if test_end > len {
                    return None;
                }
                (start..train_end, train_end..test_end)
            }
            WindowPolicy::Splits { n } => {
                let chunk = len / (n + 1);
                if index >= n || chunk == 0 {
                    return None;
                }
                let train_end = (index + 1) * chunk;
                (0..train_end, train_end..train_end + chunk)
            }
        };
        Some(WindowSpec { index, train, test })
    }
}

impl Iterator for Windows {
    type Item = WindowSpec;

    fn next(&mut self) -> Option<WindowSpec> {
        let window = self.window_at(self.next_index)?;
        self.next_index += 1;
        Some(window)
    }
}

// ─── Orchestration ───────────────────────────────────────────────────

/// Outcome of one optimized window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub index: usize,
    pub train: Range<usize>,
    pub test: Range<usize>,
    pub best_params: StrategyParams,
    pub train_score: f64,
    pub test_metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub windows: Vec<WindowResult>,
    pub mean_test_calmar: f64,
    pub mean_test_sharpe: f64,
    /// Π(1 + test total return) − 1 across windows, in window order.
    pub compounded_test_return: f64,
}

impl WalkForwardReport {
    pub fn from_windows(windows: Vec<WindowResult>) -> Self {
        let n = windows.len();
        let mean = |f: fn(&WindowResult) -> f64| {
            if n == 0 {
                0.0
            } else {
                windows.iter().map(f).sum::<f64>() / n as f64
            }
        };
        let mean_test_calmar = mean(|w| w.test_metrics.calmar);
        let mean_test_sharpe = mean(|w| w.test_metrics.sharpe);
        let compounded_test_return = windows
            .iter()
            .map(|w| 1.0 + w.test_metrics.total_return)
            .product::<f64>()
            - 1.0;
        Self {
            windows,
            mean_test_calmar,
            mean_test_sharpe,
            compounded_test_return,
        }
    }
}

/// Optimize on every train range, evaluate the winner on its test range.
///
/// Windows are independent and run concurrently; results come back in
/// window order. Windows reaching past the end of `data` (a partitioner
/// sized for a longer series) are skipped with a warning. With raw prices,
/// each range is warmed up on the rows preceding it.
pub fn run_walk_forward(
    data: Dataset<'_>,
    partitioner: &WalkForwardPartitioner,
    objective: &ObjectiveFunction,
    optimizer: &dyn Optimizer,
    space: &ParamSpace,
) -> WalkForwardReport {
    let (specs, out_of_range): (Vec<WindowSpec>, Vec<WindowSpec>) = partitioner
        .windows()
        .partition(|spec| spec.test.end <= data.len());
    if !out_of_range.is_empty() {
        warn!(
            bars = data.len(),
            partitioner_len = partitioner.len(),
            skipped = out_of_range.len(),
            "walk-forward windows extend past the data; skipped"
        );
    }
    if specs.is_empty() {
        warn!(
            bars = data.len(),
            policy = ?partitioner.policy(),
            "walk-forward configuration yields zero windows"
        );
        return WalkForwardReport::from_windows(Vec::new());
    }

    let windows: Vec<WindowResult> = specs
        .into_par_iter()
        .map(|spec| {
            let outcome =
                optimizer.optimize(space, spec.index as u64, &|params: &StrategyParams| {
                    objective.score_window(params, data, spec.train.clone())
                });
            let test_metrics =
                objective.evaluate_window(&outcome.best_params, data, spec.test.clone());

            info!(
                window = spec.index,
                train = ?spec.train,
                test = ?spec.test,
                best_score = outcome.best_score,
                test_calmar = test_metrics.calmar,
                "walk-forward window done"
            );
            WindowResult {
                index: spec.index,
                train: spec.train,
                test: spec.test,
                best_params: outcome.best_params,
                train_score: outcome.best_score,
                test_metrics,
            }
        })
        .collect();

    let report = WalkForwardReport::from_windows(windows);
    info!(
        windows = report.windows.len(),
        mean_test_calmar = report.mean_test_calmar,
        mean_test_sharpe = report.mean_test_sharpe,
        compounded_test_return = report.compounded_test_return,
        "walk-forward finished"
    );
    report
}
