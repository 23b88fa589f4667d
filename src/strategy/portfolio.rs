//! Aggregate exposure over a list of signals.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{ConfidenceTier, Signal, SignalKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_signals: usize,
    pub value_bets: usize,
    pub arbitrage: usize,
    pub by_tier: BTreeMap<ConfidenceTier, usize>,
    /// Money committed if every signal were placed at its recommended stake.
    pub total_stake: f64,
    pub max_stake: f64,
    pub average_ev: f64,
    pub average_odds: f64,
    /// Mean model probability across value bets.
    pub average_probability: f64,
    /// Sum of stake fractions.
    pub portfolio_risk: f64,
    /// Total stake as a percentage of the bankroll.
    pub stake_percentage: f64,
}

impl PortfolioSummary {
    /// Summarise `signals` against `bankroll`. Empty input yields zeros.
    pub fn from_signals(signals: &[Signal], bankroll: f64) -> Self {
        if signals.is_empty() {
            return Self::default();
        }

        let n = signals.len() as f64;
        let mut summary = Self {
            total_signals: signals.len(),
            ..Self::default()
        };

        let mut probability_sum = 0.0;
        let mut probability_count = 0usize;

        for signal in signals {
            match signal.kind {
                SignalKind::ValueBet => summary.value_bets += 1,
                SignalKind::Arbitrage => summary.arbitrage += 1,
            }
            *summary.by_tier.entry(signal.confidence_tier).or_insert(0) += 1;

            let fraction = signal.stake.total_fraction();
            let stake = fraction * bankroll;
            summary.portfolio_risk += fraction;
            summary.total_stake += stake;
            summary.max_stake = summary.max_stake.max(stake);
            summary.average_ev += signal.expected_value;
            summary.average_odds += signal.odds;

            if let Some(p) = signal.model_probability {
                probability_sum += p;
                probability_count += 1;
            }
        }

        summary.average_ev /= n;
        summary.average_odds /= n;
        if probability_count > 0 {
            summary.average_probability = probability_sum / probability_count as f64;
        }
        if bankroll > 0.0 {
            summary.stake_percentage = summary.total_stake / bankroll * 100.0;
        }
        summary
    }

    pub fn tier_count(&self, tier: ConfidenceTier) -> usize {
        self.by_tier.get(&tier).copied().unwrap_or(0)
    }
}

impl fmt::Display for PortfolioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PORTFOLIO")?;
        writeln!(
            f,
            "  Signals:        {} ({} value, {} arbitrage)",
            self.total_signals, self.value_bets, self.arbitrage
        )?;
        for tier in ConfidenceTier::ALL {
            writeln!(f, "  {:<15} {}", format!("{tier}:"), self.tier_count(*tier))?;
        }
        writeln!(
            f,
            "  Total stake:    {:.2} ({:.1}% of bankroll)",
            self.total_stake, self.stake_percentage
        )?;
        writeln!(f, "  Max stake:      {:.2}", self.max_stake)?;
        writeln!(f, "  Average EV:     {:+.2}%", self.average_ev * 100.0)?;
        writeln!(f, "  Average odds:   {:.2}", self.average_odds)?;
        write!(f, "  Portfolio risk: {:.3}", self.portfolio_risk)
    }
}
