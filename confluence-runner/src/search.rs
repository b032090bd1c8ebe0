//! Parameter search: the optimizer side of the objective boundary.
//!
//! A [`ParamSpace`] bounds every tunable field; an [`Optimizer`] proposes
//! parameter sets, scores them through a caller-supplied closure, and reports
//! the best. [`RandomSearch`] samples independently and uniformly, so all
//! trials run in parallel.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use confluence_core::domain::StrategyParams;

use crate::rng::TrialSeeds;

/// Trials per walk-forward window.
pub const DEFAULT_WINDOW_TRIALS: usize = 100;
/// Trials for a full-train-set optimization.
pub const DEFAULT_FINAL_TRIALS: usize = 150;

#[derive(Debug, Error, PartialEq)]
pub enum SearchError {
    #[error("range for {name} is empty or not finite: [{low}, {high}]")]
    EmptyRange {
        name: &'static str,
        low: f64,
        high: f64,
    },
    #[error("sampled parameters are invalid: {0}")]
    InvalidBounds(#[from] confluence_core::domain::ParamsError),
}

// ─── Ranges ──────────────────────────────────────────────────────────

/// Inclusive float range. `low == high` fixes the field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub low: f64,
    pub high: f64,
}

impl FloatRange {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn fixed(value: f64) -> Self {
        Self::new(value, value)
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.high > self.low {
            rng.gen_range(self.low..=self.high)
        } else {
            self.low
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.low..=self.high).contains(&value)
    }

    fn check(&self, name: &'static str) -> Result<(), SearchError> {
        if self.low.is_finite() && self.high.is_finite() && self.low <= self.high {
            Ok(())
        } else {
            Err(SearchError::EmptyRange {
                name,
                low: self.low,
                high: self.high,
            })
        }
    }
}

/// Inclusive integer range for indicator windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub low: usize,
    pub high: usize,
}

impl IntRange {
    pub fn new(low: usize, high: usize) -> Self {
        Self { low, high }
    }

    pub fn fixed(value: usize) -> Self {
        Self::new(value, value)
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        if self.high > self.low {
            rng.gen_range(self.low..=self.high)
        } else {
            self.low
        }
    }

    pub fn contains(&self, value: usize) -> bool {
        (self.low..=self.high).contains(&value)
    }

    /// True when the range admits a single value.
    pub fn is_fixed(&self) -> bool {
        self.low >= self.high
    }

    fn check(&self, name: &'static str) -> Result<(), SearchError> {
        if self.low <= self.high {
            Ok(())
        } else {
            Err(SearchError::EmptyRange {
                name,
                low: self.low as f64,
                high: self.high as f64,
            })
        }
    }
}

// ─── Parameter space ─────────────────────────────────────────────────

/// Per-field search ranges.
///
/// By default the indicator windows and RSI thresholds are fixed, matching
/// bars enriched once up front; only sizing and exit fractions are searched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamSpace {
    pub shares: FloatRange,
    pub take_profit: FloatRange,
    pub stop_loss: FloatRange,
    pub rsi_window: IntRange,
    pub rsi_lower: FloatRange,
    pub rsi_upper: FloatRange,
    pub bb_window: IntRange,
    pub bb_std: FloatRange,
}

impl Default for ParamSpace {
    fn default() -> Self {
        let base = StrategyParams::default();
        Self {
            shares: FloatRange::new(0.5, 10.0),
            take_profit: FloatRange::new(0.01, 0.15),
            stop_loss: FloatRange::new(0.005, 0.10),
            rsi_window: IntRange::fixed(base.rsi_window),
            rsi_lower: FloatRange::fixed(base.rsi_lower),
            rsi_upper: FloatRange::fixed(base.rsi_upper),
            bb_window: IntRange::fixed(base.bb_window),
            bb_std: FloatRange::fixed(base.bb_std),
        }
    }
}

impl ParamSpace {
    /// A space containing exactly `params`.
    pub fn fixed(params: &StrategyParams) -> Self {
        Self {
            shares: FloatRange::fixed(params.shares),
            take_profit: FloatRange::fixed(params.take_profit),
            stop_loss: FloatRange::fixed(params.stop_loss),
            rsi_window: IntRange::fixed(params.rsi_window),
            rsi_lower: FloatRange::fixed(params.rsi_lower),
            rsi_upper: FloatRange::fixed(params.rsi_upper),
            bb_window: IntRange::fixed(params.bb_window),
            bb_std: FloatRange::fixed(params.bb_std),
        }
    }

    /// Copy whose fixed indicator windows (RSI window, Bollinger window and
    /// width) take the values of `params`. Searched ranges are untouched.
    ///
    /// Bars enriched once with `params` then match every sampled candidate.
    pub fn anchored_to(&self, params: &StrategyParams) -> Self {
        let mut space = *self;
        if space.rsi_window.is_fixed() {
            space.rsi_window = IntRange::fixed(params.rsi_window);
        }
        if space.bb_window.is_fixed() {
            space.bb_window = IntRange::fixed(params.bb_window);
        }
        if space.bb_std.low >= space.bb_std.high {
            space.bb_std = FloatRange::fixed(params.bb_std);
        }
        space
    }

    /// Whether a search over this space changes indicator columns, so bars
    /// must be re-enriched per trial.
    pub fn varies_indicators(&self) -> bool {
        !(self.rsi_window.is_fixed()
            && self.bb_window.is_fixed()
            && self.bb_std.low >= self.bb_std.high)
    }

    /// Every range is non-empty and both corners yield valid parameters.
    pub fn validate(&self) -> Result<(), SearchError> {
        self.shares.check("shares")?;
        self.take_profit.check("take_profit")?;
        self.stop_loss.check("stop_loss")?;
        self.rsi_window.check("rsi_window")?;
        self.rsi_lower.check("rsi_lower")?;
        self.rsi_upper.check("rsi_upper")?;
        self.bb_window.check("bb_window")?;
        self.bb_std.check("bb_std")?;

        let low = StrategyParams {
            shares: self.shares.low,
            take_profit: self.take_profit.low,
            stop_loss: self.stop_loss.low,
            rsi_window: self.rsi_window.low,
            rsi_lower: self.rsi_lower.low,
            rsi_upper: self.rsi_upper.low.max(self.rsi_lower.low),
            bb_window: self.bb_window.low,
            bb_std: self.bb_std.low,
        };
        let high = StrategyParams {
            shares: self.shares.high,
            take_profit: self.take_profit.high,
            stop_loss: self.stop_loss.high,
            rsi_window: self.rsi_window.high,
            rsi_lower: self.rsi_lower.high.min(self.rsi_upper.high),
            rsi_upper: self.rsi_upper.high,
            bb_window: self.bb_window.high,
            bb_std: self.bb_std.high,
        };
        low.validate()?;
        high.validate()?;
        Ok(())
    }

    /// Draw one parameter set. RSI thresholds are reordered if they cross.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> StrategyParams {
        let shares = self.shares.sample(rng);
        let take_profit = self.take_profit.sample(rng);
        let stop_loss = self.stop_loss.sample(rng);
        let rsi_window = self.rsi_window.sample(rng);
        let a = self.rsi_lower.sample(rng);
        let b = self.rsi_upper.sample(rng);
        let bb_window = self.bb_window.sample(rng);
        let bb_std = self.bb_std.sample(rng);
        StrategyParams {
            shares,
            take_profit,
            stop_loss,
            rsi_window,
            rsi_lower: a.min(b),
            rsi_upper: a.max(b),
            bb_window,
            bb_std,
        }
    }

    pub fn contains(&self, p: &StrategyParams) -> bool {
        self.shares.contains(p.shares)
            && self.take_profit.contains(p.take_profit)
            && self.stop_loss.contains(p.stop_loss)
            && self.rsi_window.contains(p.rsi_window)
            && self.bb_window.contains(p.bb_window)
            && self.bb_std.contains(p.bb_std)
    }
}

// ─── Optimizer ───────────────────────────────────────────────────────

/// One evaluated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub index: usize,
    pub params: StrategyParams,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best_params: StrategyParams,
    pub best_score: f64,
    /// Every trial in index order.
    pub trials: Vec<Trial>,
}

impl SearchOutcome {
    /// Pick the highest score; ties go to the lowest trial index and NaN
    /// loses to any number. Returns `None` for an empty trial list.
    pub fn from_trials(trials: Vec<Trial>) -> Option<Self> {
        let mut best: Option<&Trial> = None;
        for t in trials.iter().filter(|t| !t.score.is_nan()) {
            if best.map_or(true, |b| t.score > b.score) {
                best = Some(t);
            }
        }
        let best = best.or_else(|| trials.first())?;
        let (best_params, best_score) = (best.params, best.score);
        Some(Self {
            best_params,
            best_score,
            trials,
        })
    }
}

/// Proposes parameter sets and returns the best-scoring one.
///
/// `window` scopes the random stream so each walk-forward window draws its own
/// candidates. `score` must be pure; it may be called from several threads.
pub trait Optimizer: Send + Sync {
    fn name(&self) -> &str;

    fn optimize(
        &self,
        space: &ParamSpace,
        window: u64,
        score: &(dyn Fn(&StrategyParams) -> f64 + Sync),
    ) -> SearchOutcome;
}

/// Uniform independent sampling, all trials in parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomSearch {
    trials: usize,
    seeds: TrialSeeds,
}

impl RandomSearch {
    const SCOPE: &'static str = "random_search";

    /// At least one trial is always run.
    pub fn new(trials: usize, seed: u64) -> Self {
        Self {
            trials: trials.max(1),
            seeds: TrialSeeds::new(seed),
        }
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Candidate `trial` of `window`, identical on every call.
    pub fn candidate(&self, space: &ParamSpace, window: u64, trial: usize) -> StrategyParams {
        let mut rng = self.seeds.rng_for(Self::SCOPE, window, trial as u64);
        space.sample(&mut rng)
    }
}

impl Optimizer for RandomSearch {
    fn name(&self) -> &str {
        "random_search"
    }

    fn optimize(
        &self,
        space: &ParamSpace,
        window: u64,
        score: &(dyn Fn(&StrategyParams) -> f64 + Sync),
    ) -> SearchOutcome {
        let trials: Vec<Trial> = (0..self.trials)
            .into_par_iter()
            .map(|index| {
                let params = self.candidate(space, window, index);
                let value = score(&params);
                debug!(window, trial = index, score = value, "trial scored");
                Trial {
                    index,
                    params,
                    score: value,
                }
            })
            .collect();

        // trials >= 1, so an outcome always exists
        let outcome = SearchOutcome::from_trials(trials).unwrap_or_else(|| SearchOutcome {
            best_params: StrategyParams::default(),
            best_score: f64::NEG_INFINITY,
            trials: Vec::new(),
        });
        info!(
            window,
            trials = self.trials,
            best_score = outcome.best_score,
            "random search finished"
        );
        outcome
    }
}
