//! Position — one open long or short lot with thresholds frozen at entry.

use serde::{Deserialize, Serialize};

use super::params::StrategyParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

/// An open position.
///
/// Take-profit and stop-loss are absolute notional (long) or liability (short)
/// values computed once from the parameter set at entry. Fields are private so
/// the thresholds cannot be rewritten after construction.
///
/// A short posts collateral equal to its entry notional (1:1, no leverage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    side: PositionSide,
    shares: f64,
    entry_price: f64,
    entry_notional: f64,
    take_profit: f64,
    stop_loss: f64,
    collateral: f64,
    entry_bar: usize,
    entry_fee: f64,
}

impl Position {
    /// Open a position at `price`, freezing the thresholds from `params`.
    ///
    /// Long: stop = notional × (1 − stop_loss), target = notional × (1 + take_profit).
    /// Short: stop = notional × (1 + stop_loss), target = notional × (1 − take_profit).
    pub fn open(
        side: PositionSide,
        price: f64,
        params: &StrategyParams,
        entry_bar: usize,
        entry_fee: f64,
    ) -> Self {
        let shares = params.shares;
        let entry_notional = shares * price;
        let (take_profit, stop_loss, collateral) = match side {
            PositionSide::Long => (
                entry_notional * (1.0 + params.take_profit),
                entry_notional * (1.0 - params.stop_loss),
                0.0,
            ),
            PositionSide::Short => (
                entry_notional * (1.0 - params.take_profit),
                entry_notional * (1.0 + params.stop_loss),
                entry_notional,
            ),
        };
        Self {
            side,
            shares,
            entry_price: price,
            entry_notional,
            take_profit,
            stop_loss,
            collateral,
            entry_bar,
            entry_fee,
        }
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    pub fn shares(&self) -> f64 {
        self.shares
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn entry_notional(&self) -> f64 {
        self.entry_notional
    }

    /// Absolute take-profit boundary (notional for longs, liability for shorts).
    pub fn take_profit(&self) -> f64 {
        self.take_profit
    }

    /// Absolute stop-loss boundary (notional for longs, liability for shorts).
    pub fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    /// Cash posted against a short; zero for longs.
    pub fn collateral(&self) -> f64 {
        self.collateral
    }

    pub fn entry_bar(&self) -> usize {
        self.entry_bar
    }

    pub fn entry_fee(&self) -> f64 {
        self.entry_fee
    }

    /// Current notional (long) or liability (short): price × shares.
    pub fn current_notional(&self, price: f64) -> f64 {
        price * self.shares
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (price - self.entry_price) * self.shares,
            PositionSide::Short => (self.entry_price - price) * self.shares,
        }
    }

    /// Mark-to-market contribution to portfolio value.
    ///
    /// Long: current notional. Short: collateral + unrealized PnL.
    pub fn mark_value(&self, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => self.current_notional(price),
            PositionSide::Short => self.collateral + self.unrealized_pnl(price),
        }
    }

    /// The exit this price triggers, if any.
    pub fn exit_trigger(&self, price: f64) -> Option<ExitReason> {
        let current = self.current_notional(price);
        match self.side {
            PositionSide::Long => {
                if current <= self.stop_loss {
                    Some(ExitReason::StopLoss)
                } else if current >= self.take_profit {
                    Some(ExitReason::TakeProfit)
                } else {
                    None
                }
            }
            PositionSide::Short => {
                if current >= self.stop_loss {
                    Some(ExitReason::StopLoss)
                } else if current <= self.take_profit {
                    Some(ExitReason::TakeProfit)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> StrategyParams {
        StrategyParams {
            shares: 2.0,
            take_profit: 0.10,
            stop_loss: 0.05,
            ..Default::default()
        }
    }

    #[test]
    fn long_thresholds() {
        let pos = Position::open(PositionSide::Long, 100.0, &params(), 3, 0.25);
        assert_eq!(pos.entry_notional(), 200.0);
        assert!((pos.take_profit() - 220.0).abs() < 1e-9);
        assert!((pos.stop_loss() - 190.0).abs() < 1e-9);
        assert_eq!(pos.collateral(), 0.0);
        assert_eq!(pos.entry_bar(), 3);
    }

    #[test]
    fn short_thresholds_are_mirrored() {
        let pos = Position::open(PositionSide::Short, 100.0, &params(), 0, 0.0);
        assert!((pos.take_profit() - 180.0).abs() < 1e-9);
        assert!((pos.stop_loss() - 210.0).abs() < 1e-9);
        assert_eq!(pos.collateral(), 200.0);
    }

    #[test]
    fn long_exit_triggers() {
        let pos = Position::open(PositionSide::Long, 100.0, &params(), 0, 0.0);
        assert_eq!(pos.exit_trigger(100.0), None);
        assert_eq!(pos.exit_trigger(95.0), Some(ExitReason::StopLoss));
        assert_eq!(pos.exit_trigger(94.0), Some(ExitReason::StopLoss));
        assert_eq!(pos.exit_trigger(110.0), Some(ExitReason::TakeProfit));
    }

    #[test]
    fn short_exit_triggers() {
        let pos = Position::open(PositionSide::Short, 100.0, &params(), 0, 0.0);
        assert_eq!(pos.exit_trigger(100.0), None);
        assert_eq!(pos.exit_trigger(105.0), Some(ExitReason::StopLoss));
        assert_eq!(pos.exit_trigger(90.0), Some(ExitReason::TakeProfit));
    }

    #[test]
    fn short_mark_value_is_collateral_plus_pnl() {
        let pos = Position::open(PositionSide::Short, 100.0, &params(), 0, 0.0);
        // 200 collateral + (100 - 96) * 2
        assert!((pos.mark_value(96.0) - 208.0).abs() < 1e-9);
        assert!((pos.unrealized_pnl(103.0) + 6.0).abs() < 1e-9);
    }

    #[test]
    fn long_mark_value_is_notional() {
        let pos = Position::open(PositionSide::Long, 100.0, &params(), 0, 0.0);
        assert!((pos.mark_value(104.0) - 208.0).abs() < 1e-9);
    }
}
