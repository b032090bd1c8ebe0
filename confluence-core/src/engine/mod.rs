//! Simulation engine: bar loop, position ledger, and indicator precompute.
//!
//! The engine consumes fully-resolved bars and runs the three-phase loop
//! (exits, entries, valuation) per bar. See [`loop_runner`].

pub mod accounting;
pub mod loop_runner;
pub mod precompute;
pub mod state;

pub use accounting::PositionLedger;
pub use loop_runner::{run_simulation, run_simulation_with};
pub use precompute::{compute_warmup, enrich, IndicatorError, IndicatorSettings};
pub use state::{EngineConfig, EngineConfigError, SimulationResult};
