//! Indicator trait.
//!
//! Indicators are pure functions: close series in, numeric series out. They are
//! precomputed once before the bar loop; the engine never recomputes them.

/// Trait for indicators.
///
/// Output has the same length as the input. The first `lookback()` values are
/// `f64::NAN` (warmup).
///
/// # Look-ahead contamination guard
/// No value at index t may depend on closes after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading values that are undefined.
    fn lookback(&self) -> usize;

    fn compute(&self, closes: &[f64]) -> Vec<f64>;
}
