//! Domain types for the confluence engine.

pub mod bar;
pub mod params;
pub mod position;
pub mod trade;

pub use bar::{Bar, PriceBar};
pub use params::{ParamsError, StrategyParams};
pub use position::{ExitReason, Position, PositionSide};
pub use trade::TradeRecord;
