//! Strategy components: the entry signal and the indicator trait.

pub mod indicator;
pub mod signal;

pub use indicator::Indicator;
pub use signal::{ConfluenceSignal, EntrySignal, SignalEvaluator, SignalThresholds, VoteTally};
