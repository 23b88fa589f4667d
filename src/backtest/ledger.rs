//! Bankroll and settled-bet ledger owned by a single backtest run.
//!
//! Money is held as `Decimal` so that the final balance equals the initial
//! balance plus the sum of recorded payouts exactly.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::types::{ConfidenceTier, Selection, Signal, SignalKind};

/// Decimal places kept on stakes and payouts.
pub const MONEY_DP: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BetResult {
    Win,
    Loss,
    /// Settled at zero net payout.
    Push,
}

impl fmt::Display for BetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetResult::Win => write!(f, "win"),
            BetResult::Loss => write!(f, "loss"),
            BetResult::Push => write!(f, "push"),
        }
    }
}

/// One settled bet.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub signal_id: Uuid,
    pub event_id: String,
    pub kind: SignalKind,
    pub selection: Selection,
    pub tier: ConfidenceTier,
    pub stake: Decimal,
    pub odds: f64,
    pub expected_value: f64,
    pub result: BetResult,
    /// Net change to the bankroll: positive on a win, `-stake` on a loss.
    pub payout: Decimal,
    pub balance_after: Decimal,
    pub placed_at: DateTime<Utc>,
    pub settled_at: DateTime<Utc>,
}

/// Net payout for a settled stake.
///
/// A win credits `stake * (odds - 1) * (1 - commission)`, a loss debits the
/// stake and a push pays nothing. `None` when the win is not representable.
pub fn settlement_payout(
    stake: Decimal,
    odds: f64,
    result: BetResult,
    commission_rate: Decimal,
) -> Option<Decimal> {
    match result {
        BetResult::Win => {
            let net_odds = Decimal::from_f64(odds - 1.0)?;
            let payout = stake
                .checked_mul(net_odds)?
                .checked_mul(Decimal::ONE - commission_rate)?;
            Some(payout.round_dp(MONEY_DP))
        }
        BetResult::Loss => Some(-stake),
        BetResult::Push => Some(Decimal::ZERO),
    }
}

#[derive(Debug, Clone)]
pub struct BankrollState {
    initial: Decimal,
    balance: Decimal,
    peak: Decimal,
    ledger: Vec<LedgerEntry>,
}

impl BankrollState {
    pub fn new(initial: Decimal) -> Self {
        Self {
            initial,
            balance: initial,
            peak: initial,
            ledger: Vec::new(),
        }
    }

    /// Restore the initial balance and empty the ledger.
    pub fn reset(&mut self) {
        self.balance = self.initial;
        self.peak = self.initial;
        self.ledger.clear();
    }

    pub fn initial(&self) -> Decimal {
        self.initial
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn peak(&self) -> Decimal {
        self.peak
    }

    pub fn ledger(&self) -> &[LedgerEntry] {
        &self.ledger
    }

    /// Settle a bet on `signal` and append it to the ledger. Returns `None`,
    /// leaving the bankroll untouched, if the payout or new balance overflows.
    pub fn settle(
        &mut self,
        signal: &Signal,
        stake: Decimal,
        result: BetResult,
        commission_rate: Decimal,
    ) -> Option<&LedgerEntry> {
        let payout = settlement_payout(stake, signal.odds, result, commission_rate)?;
        self.balance = self.balance.checked_add(payout)?;
        if self.balance > self.peak {
            self.peak = self.balance;
        }

        self.ledger.push(LedgerEntry {
            signal_id: signal.id,
            event_id: signal.event_id.clone(),
            kind: signal.kind,
            selection: signal.selection,
            tier: signal.confidence_tier,
            stake,
            odds: signal.odds,
            expected_value: signal.expected_value,
            result,
            payout,
            balance_after: self.balance,
            placed_at: signal.generated_at,
            settled_at: Utc::now(),
        });
        self.ledger.last()
    }
}
