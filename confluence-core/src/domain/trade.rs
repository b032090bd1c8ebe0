//! TradeRecord — a closed position.

use serde::{Deserialize, Serialize};

use super::position::{ExitReason, PositionSide};

/// A completed round trip: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: PositionSide,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_price: f64,
    pub entry_notional: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_price: f64,
    /// Close notional (long) or liability (short) at exit.
    pub exit_notional: f64,
    pub exit_reason: ExitReason,

    pub shares: f64,

    // ── PnL ──
    /// Price PnL before fees.
    pub gross_pnl: f64,
    pub entry_fee: f64,
    pub exit_fee: f64,
    pub net_pnl: f64,
}

impl TradeRecord {
    /// Trade outcome: a long is profitable when it closes above its entry
    /// notional, a short when its PnL is positive. Fees are not netted.
    pub fn is_winner(&self) -> bool {
        self.gross_pnl > 0.0
    }

    /// Total commission paid over the round trip.
    pub fn fees(&self) -> f64 {
        self.entry_fee + self.exit_fee
    }

    pub fn bars_held(&self) -> usize {
        self.exit_bar.saturating_sub(self.entry_bar)
    }
}
