//! Serializable run configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [engine]
//! commission_rate = 0.00125
//! max_positions_per_side = 1
//!
//! [metrics]
//! bars_per_year = 105120
//!
//! [objective]
//! policy = { kind = "return_plus_sharpe", weight = 0.01 }
//!
//! [walk_forward]
//! train_minutes = 43200
//! policy = { kind = "rolling" }
//!
//! [search]
//! seed = 7
//! window_trials = 100
//! space.take_profit = { low = 0.01, high = 0.10 }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use confluence_core::domain::{ParamsError, StrategyParams};
use confluence_core::engine::{EngineConfig, EngineConfigError};

use crate::fitness::ObjectivePolicy;
use crate::metrics::FIVE_MINUTE_BARS_PER_YEAR;
use crate::objective::ObjectiveFunction;
use crate::search::{
    ParamSpace, RandomSearch, SearchError, DEFAULT_FINAL_TRIALS, DEFAULT_WINDOW_TRIALS,
};
use crate::walk_forward::{
    WalkForwardError, WindowLengths, WindowPolicy, FIVE_MINUTES, MONTH_MINUTES, WEEK_MINUTES,
};

/// Unique identifier for a run configuration (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("[engine] {0}")]
    Engine(#[from] EngineConfigError),
    #[error("[params] {0}")]
    Params(#[from] ParamsError),
    #[error("[search] {0}")]
    Search(#[from] SearchError),
    #[error("[walk_forward] {0}")]
    WalkForward(#[from] WalkForwardError),
    #[error("[metrics] bars_per_year must be finite and > 0, got {0}")]
    BarsPerYear(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub bars_per_year: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            bars_per_year: FIVE_MINUTE_BARS_PER_YEAR,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveConfig {
    pub policy: ObjectivePolicy,
}

/// Window lengths as calendar durations; explicit bar counts take precedence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    pub bar_minutes: u64,
    pub train_minutes: u64,
    pub test_minutes: u64,
    pub step_minutes: u64,
    pub train_bars: Option<usize>,
    pub test_bars: Option<usize>,
    pub step_bars: Option<usize>,
    pub policy: WindowPolicy,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            bar_minutes: FIVE_MINUTES,
            train_minutes: MONTH_MINUTES,
            test_minutes: WEEK_MINUTES,
            step_minutes: WEEK_MINUTES,
            train_bars: None,
            test_bars: None,
            step_bars: None,
            policy: WindowPolicy::Rolling,
        }
    }
}

impl WalkForwardConfig {
    pub fn lengths(&self) -> Result<WindowLengths, WalkForwardError> {
        let from_minutes = WindowLengths::from_durations(
            self.train_minutes,
            self.test_minutes,
            self.step_minutes,
            self.bar_minutes,
        );
        match (self.train_bars, self.test_bars, self.step_bars) {
            (Some(train), Some(test), Some(step)) => WindowLengths::new(train, test, step),
            (train, test, step) => {
                let base = from_minutes?;
                WindowLengths::new(
                    train.unwrap_or(base.train()),
                    test.unwrap_or(base.test()),
                    step.unwrap_or(base.step()),
                )
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub seed: u64,
    /// Trials per walk-forward window.
    pub window_trials: usize,
    /// Trials for a full train-set optimization.
    pub final_trials: usize,
    pub space: ParamSpace,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            window_trials: DEFAULT_WINDOW_TRIALS,
            final_trials: DEFAULT_FINAL_TRIALS,
            space: ParamSpace::default(),
        }
    }
}

/// Serializable configuration for one invocation.
///
/// `params` is the baseline parameter set used by `simulate` and
/// `sensitivity` when no optimized set is supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub engine: EngineConfig,
    pub params: StrategyParams,
    pub metrics: MetricsConfig,
    pub objective: ObjectiveConfig,
    pub walk_forward: WalkForwardConfig,
    pub search: SearchConfig,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.params.validate()?;
        if !(self.metrics.bars_per_year.is_finite() && self.metrics.bars_per_year > 0.0) {
            return Err(ConfigError::BarsPerYear(self.metrics.bars_per_year));
        }
        self.walk_forward.lengths()?;
        if let WindowPolicy::Splits { n: 0 } = self.walk_forward.policy {
            return Err(WalkForwardError::ZeroSplits.into());
        }
        self.search_space().validate()?;
        Ok(())
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share the same RunId, which names
    /// their artifact directory.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }

    pub fn objective(&self) -> ObjectiveFunction {
        ObjectiveFunction::new(
            self.engine,
            self.metrics.bars_per_year,
            self.objective.policy,
        )
    }

    /// The configured search space with its fixed indicator windows taken
    /// from `[params]`, the windows bars are enriched with.
    pub fn search_space(&self) -> ParamSpace {
        self.search.space.anchored_to(&self.params)
    }

    pub fn window_search(&self) -> RandomSearch {
        RandomSearch::new(self.search.window_trials, self.search.seed)
    }

    pub fn final_search(&self) -> RandomSearch {
        RandomSearch::new(self.search.final_trials, self.search.seed)
    }
}
