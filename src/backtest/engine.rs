//! Single-run backtest engine.
//!
//! Replays signals in the supplied order against known outcomes, sizing each
//! stake from the current balance and settling it into the ledger. The engine
//! moves `Idle → Running → Completed`; a completed engine must be `reset()`
//! before it can run again.

use rust_decimal::prelude::*;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use super::ledger::{BankrollState, BetResult, MONEY_DP};
use super::metrics::{tier_breakdown, BacktestReport, SummaryMetrics};
use crate::config::BacktestConfig;
use crate::types::{EngineError, EventStatus, Outcomes, Selection, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    Completed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Running => write!(f, "running"),
            EngineState::Completed => write!(f, "completed"),
        }
    }
}

/// Signals that were not placed, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    /// No result known for the event.
    pub no_outcome: usize,
    /// Result known but the event is not finished or has no winner.
    pub unfinished: usize,
    /// Stake after clamping fell below `min_bet_size`.
    pub below_min_stake: usize,
    /// Non-finite or non-positive stake fraction, or odds <= 1.
    pub malformed: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.no_outcome + self.unfinished + self.below_min_stake + self.malformed
    }
}

/// Monetary bet limits converted once at construction.
#[derive(Debug, Clone, Copy)]
struct Limits {
    commission_rate: Decimal,
    min_bet: Decimal,
    max_bet: Decimal,
    max_exposure: Decimal,
}

impl Limits {
    fn from_config(config: &BacktestConfig) -> Result<Self, EngineError> {
        Ok(Self {
            commission_rate: to_decimal("backtest.commission_rate", config.commission_rate)?,
            min_bet: to_decimal("backtest.min_bet_size", config.min_bet_size)?,
            max_bet: to_decimal("backtest.max_bet_size", config.max_bet_size)?,
            max_exposure: to_decimal("backtest.max_bankroll_exposure", config.max_bankroll_exposure)?,
        })
    }
}

pub struct BacktestEngine {
    config: BacktestConfig,
    limits: Limits,
    state: EngineState,
    bankroll: BankrollState,
    skips: SkipCounts,
    processed: usize,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let limits = Limits::from_config(&config)?;
        let initial = to_decimal("backtest.initial_bankroll", config.initial_bankroll)?.round_dp(MONEY_DP);
        Ok(Self {
            config,
            limits,
            state: EngineState::Idle,
            bankroll: BankrollState::new(initial),
            skips: SkipCounts::default(),
            processed: 0,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn bankroll(&self) -> &BankrollState {
        &self.bankroll
    }

    /// Back to `Idle` with the initial balance and an empty ledger.
    pub fn reset(&mut self) {
        self.bankroll.reset();
        self.skips = SkipCounts::default();
        self.processed = 0;
        self.state = EngineState::Idle;
    }

    pub fn run(&mut self, signals: &[Signal], outcomes: &Outcomes) -> Result<BacktestReport, EngineError> {
        self.run_sequence(signals, outcomes)
    }

    /// Replay signals in iteration order. Used directly by Monte Carlo
    /// trials with a shuffled order.
    pub fn run_sequence<'a, I>(&mut self, signals: I, outcomes: &Outcomes) -> Result<BacktestReport, EngineError>
    where
        I: IntoIterator<Item = &'a Signal>,
    {
        if self.state != EngineState::Idle {
            return Err(EngineError::InvalidState {
                expected: EngineState::Idle.to_string(),
                actual: self.state.to_string(),
            });
        }
        self.state = EngineState::Running;

        for signal in signals {
            self.processed += 1;
            self.process(signal, outcomes);
        }

        self.state = EngineState::Completed;
        let report = self.report();

        debug!(
            bets = report.summary.total_bets,
            skipped = report.skips.total(),
            final_bankroll = format!("{:.2}", report.summary.final_bankroll),
            roi = format!("{:+.2}%", report.summary.roi),
            "Backtest complete"
        );
        Ok(report)
    }

    fn process(&mut self, signal: &Signal, outcomes: &Outcomes) {
        let Some(result) = outcomes.get(&signal.event_id) else {
            debug!(event_id = %signal.event_id, "No outcome, signal skipped");
            self.skips.no_outcome += 1;
            return;
        };
        let winner = match result.winner {
            Some(winner) if result.status == EventStatus::Finished => winner,
            _ => {
                debug!(event_id = %signal.event_id, status = %result.status, "Event not finished, signal skipped");
                self.skips.unfinished += 1;
                return;
            }
        };

        let fraction = signal.stake.mean_fraction();
        let sized = Decimal::from_f64(fraction).filter(|f| *f > Decimal::ZERO);
        let Some(fraction) = sized.filter(|_| signal.odds.is_finite() && signal.odds > 1.0) else {
            warn!(
                signal_id = %signal.id,
                event_id = %signal.event_id,
                fraction,
                odds = signal.odds,
                "Malformed signal skipped"
            );
            self.skips.malformed += 1;
            return;
        };

        let Some(stake) = self.stake_for(fraction) else {
            debug!(
                event_id = %signal.event_id,
                balance = %self.bankroll.balance(),
                "Stake below minimum, signal skipped"
            );
            self.skips.below_min_stake += 1;
            return;
        };

        // Arbitrage settles as a push regardless of the winner.
        let bet_result = match signal.selection {
            Selection::Arbitrage => BetResult::Push,
            Selection::Competitor(side) if side == winner => BetResult::Win,
            Selection::Competitor(_) => BetResult::Loss,
        };

        let Some(entry) = self.bankroll.settle(signal, stake, bet_result, self.limits.commission_rate) else {
            warn!(
                signal_id = %signal.id,
                event_id = %signal.event_id,
                stake = %stake,
                odds = signal.odds,
                "Payout overflows the bankroll, signal skipped"
            );
            self.skips.malformed += 1;
            return;
        };
        debug!(
            event_id = %entry.event_id,
            stake = %entry.stake,
            odds = entry.odds,
            result = %entry.result,
            payout = %entry.payout,
            balance = %entry.balance_after,
            "Bet settled"
        );
    }

    /// Balance × fraction, clamped to the bet limits and then to the exposure
    /// cap. `None` when the result is below the minimum bet.
    fn stake_for(&self, fraction: Decimal) -> Option<Decimal> {
        let balance = self.bankroll.balance();
        let limits = &self.limits;

        let stake = balance
            .checked_mul(fraction)
            .unwrap_or(Decimal::MAX)
            .round_dp(MONEY_DP)
            .max(limits.min_bet)
            .min(limits.max_bet);
        let cap = (balance * limits.max_exposure)
            .round_dp_with_strategy(MONEY_DP, RoundingStrategy::ToZero);
        let stake = stake.min(cap);

        if stake < limits.min_bet || stake <= Decimal::ZERO {
            None
        } else {
            Some(stake)
        }
    }

    fn report(&self) -> BacktestReport {
        let ledger = self.bankroll.ledger();
        BacktestReport {
            summary: SummaryMetrics::from_ledger(self.bankroll.initial(), ledger, self.limits.commission_rate),
            tiers: tier_breakdown(ledger),
            skips: self.skips,
            signals_processed: self.processed,
            config: self.config.clone(),
            ledger: ledger.to_vec(),
        }
    }
}

fn to_decimal(field: &'static str, value: f64) -> Result<Decimal, EngineError> {
    Decimal::from_f64(value).ok_or_else(|| EngineError::InvalidConfig {
        field,
        reason: format!("{value} is not representable as a money amount"),
    })
}
