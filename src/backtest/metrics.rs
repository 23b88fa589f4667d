//! Summary metrics over a settled ledger.
//!
//! Rate and ratio computations never fail: empty ledgers and zero
//! denominators yield 0, and profit factor is `f64::INFINITY` when there were
//! winnings but no losses.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::fmt;

use super::engine::SkipCounts;
use super::ledger::{BetResult, LedgerEntry};
use crate::config::BacktestConfig;
use crate::types::ConfidenceTier;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub initial_bankroll: Decimal,
    pub final_bankroll: Decimal,
    pub peak_bankroll: Decimal,
    pub net_profit: Decimal,
    pub total_staked: Decimal,
    pub commission_paid: Decimal,
    pub total_bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    /// Wins over all settled bets, pushes included in the denominator.
    pub win_rate: f64,
    /// Percent return on the initial bankroll.
    pub roi: f64,
    /// Percent net profit over total staked.
    pub yield_pct: f64,
    /// Largest peak-to-trough decline as a fraction of the running peak.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub profit_factor: f64,
    pub average_odds: f64,
    pub average_ev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierBreakdown {
    pub tier: ConfidenceTier,
    pub bets: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub total_payout: Decimal,
    pub average_payout: Decimal,
}

/// Outcome of one completed backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub summary: SummaryMetrics,
    /// High, medium then low; tiers without bets are omitted.
    pub tiers: Vec<TierBreakdown>,
    pub skips: SkipCounts,
    pub signals_processed: usize,
    pub config: BacktestConfig,
    pub ledger: Vec<LedgerEntry>,
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

impl SummaryMetrics {
    pub fn from_ledger(initial: Decimal, ledger: &[LedgerEntry], commission_rate: Decimal) -> Self {
        let final_bankroll = ledger.last().map(|e| e.balance_after).unwrap_or(initial);

        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut pushes = 0usize;
        let mut total_staked = Decimal::ZERO;
        let mut winning_stakes = Decimal::ZERO;
        for entry in ledger {
            total_staked += entry.stake;
            match entry.result {
                BetResult::Win => {
                    wins += 1;
                    winning_stakes += entry.stake;
                }
                BetResult::Loss => losses += 1,
                BetResult::Push => pushes += 1,
            }
        }

        let total_bets = ledger.len();
        let net_profit = final_bankroll - initial;
        let n = total_bets as f64;

        Self {
            initial_bankroll: initial,
            final_bankroll,
            peak_bankroll: peak_bankroll(initial, ledger),
            net_profit,
            total_staked,
            commission_paid: (winning_stakes * commission_rate).round_dp(2),
            total_bets,
            wins,
            losses,
            pushes,
            win_rate: ratio(wins as f64, n),
            roi: percent(net_profit, initial),
            yield_pct: percent(net_profit, total_staked),
            max_drawdown: max_drawdown(initial, ledger),
            sharpe_ratio: sharpe_ratio(ledger),
            profit_factor: profit_factor(ledger),
            average_odds: ratio(ledger.iter().map(|e| e.odds).sum(), n),
            average_ev: ratio(ledger.iter().map(|e| e.expected_value).sum(), n),
        }
    }
}

/// Per-tier counts and payouts, in `ConfidenceTier::ALL` order.
pub fn tier_breakdown(ledger: &[LedgerEntry]) -> Vec<TierBreakdown> {
    ConfidenceTier::ALL
        .iter()
        .filter_map(|&tier| {
            let entries: Vec<&LedgerEntry> = ledger.iter().filter(|e| e.tier == tier).collect();
            if entries.is_empty() {
                return None;
            }
            let bets = entries.len();
            let wins = entries.iter().filter(|e| e.result == BetResult::Win).count();
            let total_payout: Decimal = entries.iter().map(|e| e.payout).sum();
            Some(TierBreakdown {
                tier,
                bets,
                wins,
                win_rate: ratio(wins as f64, bets as f64),
                total_payout,
                average_payout: (total_payout / Decimal::from(bets)).round_dp(2),
            })
        })
        .collect()
}

/// Running peak starts at the initial bankroll.
pub fn max_drawdown(initial: Decimal, ledger: &[LedgerEntry]) -> f64 {
    let mut peak = initial;
    let mut worst = 0.0_f64;
    for entry in ledger {
        if entry.balance_after > peak {
            peak = entry.balance_after;
        }
        if peak > Decimal::ZERO {
            let dd = ((peak - entry.balance_after) / peak).to_f64().unwrap_or(0.0);
            worst = worst.max(dd);
        }
    }
    worst
}

fn peak_bankroll(initial: Decimal, ledger: &[LedgerEntry]) -> Decimal {
    ledger
        .iter()
        .map(|e| e.balance_after)
        .fold(initial, |peak, b| peak.max(b))
}

/// Mean over population standard deviation of per-bet bankroll deltas.
pub fn sharpe_ratio(ledger: &[LedgerEntry]) -> f64 {
    if ledger.len() < 2 {
        return 0.0;
    }
    let deltas: Vec<f64> = ledger.iter().map(|e| e.payout.to_f64().unwrap_or(0.0)).collect();
    let n = deltas.len() as f64;
    let mean = deltas.iter().sum::<f64>() / n;
    let variance = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if std_dev < 1e-10 {
        return 0.0;
    }
    mean / std_dev
}

/// Gross winnings over gross losses.
pub fn profit_factor(ledger: &[LedgerEntry]) -> f64 {
    let gross_win: Decimal = ledger
        .iter()
        .filter(|e| e.payout > Decimal::ZERO)
        .map(|e| e.payout)
        .sum();
    let gross_loss: Decimal = ledger
        .iter()
        .filter(|e| e.payout < Decimal::ZERO)
        .map(|e| -e.payout)
        .sum();

    if gross_loss.is_zero() {
        return if gross_win.is_zero() { 0.0 } else { f64::INFINITY };
    }
    (gross_win / gross_loss).to_f64().unwrap_or(0.0)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn percent(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator.is_zero() {
        return 0.0;
    }
    (numerator / denominator * dec!(100)).to_f64().unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Text report
// ---------------------------------------------------------------------------

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        let profit_factor = if s.profit_factor.is_infinite() {
            "inf".to_string()
        } else {
            format!("{:.2}", s.profit_factor)
        };

        writeln!(f, "BACKTEST REPORT")?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "Bankroll")?;
        writeln!(f, "  Initial:        {:.2}", s.initial_bankroll)?;
        writeln!(f, "  Final:          {:.2}", s.final_bankroll)?;
        writeln!(f, "  Peak:           {:.2}", s.peak_bankroll)?;
        writeln!(f, "  Net profit:     {:+.2}", s.net_profit)?;
        writeln!(f, "  ROI:            {:+.2}%", s.roi)?;
        writeln!(f, "Betting")?;
        writeln!(
            f,
            "  Bets:           {} ({} won, {} lost, {} push)",
            s.total_bets, s.wins, s.losses, s.pushes
        )?;
        writeln!(f, "  Win rate:       {:.1}%", s.win_rate * 100.0)?;
        writeln!(f, "  Total staked:   {:.2}", s.total_staked)?;
        writeln!(f, "  Yield:          {:+.2}%", s.yield_pct)?;
        writeln!(f, "  Average odds:   {:.2}", s.average_odds)?;
        writeln!(f, "  Average EV:     {:+.2}%", s.average_ev * 100.0)?;
        writeln!(f, "  Commission:     {:.2}", s.commission_paid)?;
        writeln!(f, "Risk")?;
        writeln!(f, "  Max drawdown:   {:.2}%", s.max_drawdown * 100.0)?;
        writeln!(f, "  Sharpe ratio:   {:.3}", s.sharpe_ratio)?;
        writeln!(f, "  Profit factor:  {profit_factor}")?;

        if !self.tiers.is_empty() {
            writeln!(f, "By confidence tier")?;
            for t in &self.tiers {
                writeln!(
                    f,
                    "  {:<7} {:>4} bets  {:>5.1}% won  payout {:+.2} (avg {:+.2})",
                    t.tier.to_string(),
                    t.bets,
                    t.win_rate * 100.0,
                    t.total_payout,
                    t.average_payout,
                )?;
            }
        }

        write!(
            f,
            "Skipped: {} (no outcome {}, unfinished {}, below min stake {}, malformed {})",
            self.skips.total(),
            self.skips.no_outcome,
            self.skips.unfinished,
            self.skips.below_min_stake,
            self.skips.malformed,
        )
    }
}
