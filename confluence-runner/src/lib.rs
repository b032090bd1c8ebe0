//! Confluence Runner — scoring, validation and persistence around the engine.
//!
//! This crate builds on `confluence-core` to provide:
//! - Performance metrics and the scalar objective the optimizer maximizes
//! - Random-search parameter optimization with per-trial deterministic seeds
//! - Walk-forward partitioning and orchestration
//! - Train/test evaluation, sensitivity analysis, period-return tables
//! - TOML run configuration, CSV bar loading, CSV/JSON artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod metrics;
pub mod objective;
pub mod period_returns;
pub mod pipeline;
pub mod rng;
pub mod search;
pub mod sensitivity;
pub mod walk_forward;

pub use config::{ConfigError, RunConfig, RunId};
pub use data_loader::{load_csv, LoadError, LoadOptions, LoadedData, SeriesData};
pub use export::{write_artifacts, Artifacts};
pub use fitness::{ObjectivePolicy, NO_TRADE_PENALTY};
pub use metrics::PerformanceMetrics;
pub use objective::{Dataset, ObjectiveFunction};
pub use period_returns::{EquityPoint, Period, PeriodReturn, ReturnTables};
pub use pipeline::{simulate_bars, simulate_dataset, train_test, RunOutcome, TrainTestOutcome};
pub use search::{Optimizer, ParamSpace, RandomSearch, SearchError, SearchOutcome};
pub use sensitivity::{run_sensitivity, SensitivityParam, SensitivityRow};
pub use walk_forward::{
    run_walk_forward, WalkForwardError, WalkForwardPartitioner, WalkForwardReport, WindowLengths,
    WindowPolicy, WindowResult, WindowSpec,
};
