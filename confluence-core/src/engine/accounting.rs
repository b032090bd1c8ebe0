//! PositionLedger — cash, open positions per side, and commission accounting.
//!
//! Cash moves only through [`PositionLedger::try_open`] and
//! [`PositionLedger::close_triggered`]:
//!
//! - Long entry debits `notional × (1 + c)`; exit credits `notional × (1 − c)`.
//! - Short entry posts `notional` as collateral and pays `notional × c`; exit
//!   credits `collateral + pnl − liability × c`.
//!
//! Portfolio value is `cash + Σ long notional + Σ (short collateral + pnl)`.

use crate::domain::{ExitReason, Position, PositionSide, StrategyParams, TradeRecord};
use crate::engine::state::EngineConfig;

#[derive(Debug, Clone)]
pub struct PositionLedger {
    initial_cash: f64,
    cash: f64,
    commission_rate: f64,
    max_per_side: Option<usize>,
    longs: Vec<Position>,
    shorts: Vec<Position>,
    fees_paid: f64,
    realized_pnl: f64,
}

impl PositionLedger {
    pub fn new(initial_cash: f64, commission_rate: f64, max_per_side: Option<usize>) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            commission_rate,
            max_per_side,
            longs: Vec::new(),
            shorts: Vec::new(),
            fees_paid: 0.0,
            realized_pnl: 0.0,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.initial_capital,
            config.commission_rate,
            config.max_positions_per_side,
        )
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    /// Net PnL (after both fees) of every closed position.
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn longs(&self) -> &[Position] {
        &self.longs
    }

    pub fn shorts(&self) -> &[Position] {
        &self.shorts
    }

    pub fn open_count(&self) -> usize {
        self.longs.len() + self.shorts.len()
    }

    fn side_at_capacity(&self, side: PositionSide) -> bool {
        let open = match side {
            PositionSide::Long => self.longs.len(),
            PositionSide::Short => self.shorts.len(),
        };
        self.max_per_side.is_some_and(|cap| open >= cap)
    }

    /// Open a position if the side has capacity and cash covers
    /// `notional × (1 + commission)`. Returns whether the entry was taken.
    ///
    /// Insufficient cash is a silent skip, not an error.
    pub fn try_open(
        &mut self,
        side: PositionSide,
        price: f64,
        params: &StrategyParams,
        bar_index: usize,
    ) -> bool {
        if self.side_at_capacity(side) {
            return false;
        }

        let notional = params.shares * price;
        let fee = notional * self.commission_rate;
        let required = notional + fee;
        if self.cash < required {
            return false;
        }

        self.cash -= required;
        self.fees_paid += fee;
        let position = Position::open(side, price, params, bar_index, fee);
        match side {
            PositionSide::Long => self.longs.push(position),
            PositionSide::Short => self.shorts.push(position),
        }
        true
    }

    /// Close every position whose stop-loss or take-profit boundary `price`
    /// crosses. Longs are settled before shorts; within a side, in open order.
    pub fn close_triggered(&mut self, price: f64, bar_index: usize) -> Vec<TradeRecord> {
        let mut closed = drain_triggered(&mut self.longs, price);
        closed.extend(drain_triggered(&mut self.shorts, price));

        closed
            .into_iter()
            .map(|(position, reason)| self.settle(position, reason, price, bar_index))
            .collect()
    }

    fn settle(
        &mut self,
        position: Position,
        reason: ExitReason,
        price: f64,
        bar_index: usize,
    ) -> TradeRecord {
        let exit_notional = position.current_notional(price);
        let exit_fee = exit_notional * self.commission_rate;
        let gross_pnl = position.unrealized_pnl(price);

        let credit = match position.side() {
            PositionSide::Long => exit_notional - exit_fee,
            PositionSide::Short => position.collateral() + gross_pnl - exit_fee,
        };
        self.cash += credit;
        self.fees_paid += exit_fee;
        let net_pnl = gross_pnl - position.entry_fee() - exit_fee;
        self.realized_pnl += net_pnl;

        TradeRecord {
            side: position.side(),
            entry_bar: position.entry_bar(),
            entry_price: position.entry_price(),
            entry_notional: position.entry_notional(),
            exit_bar: bar_index,
            exit_price: price,
            exit_notional,
            exit_reason: reason,
            shares: position.shares(),
            gross_pnl,
            entry_fee: position.entry_fee(),
            exit_fee,
            net_pnl,
        }
    }

    /// Mark-to-market value: cash plus every open position's contribution.
    pub fn portfolio_value(&self, price: f64) -> f64 {
        self.cash
            + self
                .longs
                .iter()
                .chain(&self.shorts)
                .map(|p| p.mark_value(price))
                .sum::<f64>()
    }

    /// Value reconstructed from PnL alone: initial cash, plus realized net
    /// PnL, plus unrealized PnL less the entry fee of every open position.
    pub fn value_from_pnl(&self, price: f64) -> f64 {
        let open: f64 = self
            .longs
            .iter()
            .chain(&self.shorts)
            .map(|p| p.unrealized_pnl(price) - p.entry_fee())
            .sum();
        self.initial_cash + self.realized_pnl + open
    }

    /// Current value, checked in debug builds against [`Self::value_from_pnl`].
    ///
    /// Panics in debug mode if cash movements and PnL disagree.
    pub fn verify_value(&self, price: f64) -> f64 {
        let value = self.portfolio_value(price);
        debug_assert!(
            {
                let expected = self.value_from_pnl(price);
                (value - expected).abs() < 1e-6 * expected.abs().max(1.0)
            },
            "accounting identity violated: value={value}, from_pnl={}, cash={}",
            self.value_from_pnl(price),
            self.cash
        );
        value
    }
}

/// Two-phase close: decide for every position first, then remove the
/// triggered ones, preserving the order of both groups.
fn drain_triggered(positions: &mut Vec<Position>, price: f64) -> Vec<(Position, ExitReason)> {
    let decisions: Vec<Option<ExitReason>> =
        positions.iter().map(|p| p.exit_trigger(price)).collect();
    if decisions.iter().all(Option::is_none) {
        return Vec::new();
    }

    let mut closed = Vec::new();
    let mut kept = Vec::with_capacity(positions.len());
    for (position, decision) in positions.drain(..).zip(decisions) {
        match decision {
            Some(reason) => closed.push((position, reason)),
            None => kept.push(position),
        }
    }
    *positions = kept;
    closed
}
