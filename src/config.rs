//! Configuration loading from TOML.
//!
//! Reads `matchpoint.toml` and deserializes into strongly-typed structs,
//! one per component. Each component takes only its own section, and every
//! section validates itself so that bad thresholds are rejected when the
//! component is built rather than surfacing mid-run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

use crate::types::{ConfidenceTier, EngineError, EventTier};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub scoring: ScoringConfig,
    pub signals: DetectorConfig,
    pub filter: FilterConfig,
    pub backtest: BacktestConfig,
    pub monte_carlo: MonteCarloConfig,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Confidence scoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// EV at which the EV term saturates.
    pub ev_ceiling: f64,
    /// Kelly fraction at which the Kelly term saturates.
    pub kelly_ceiling: f64,
    pub ev_weight: f64,
    pub kelly_weight: f64,
    pub probability_weight: f64,
    pub event_class_weight: f64,
    /// Weighted-score cut-off for the high tier (not a probability).
    pub high_threshold: f64,
    pub medium_threshold: f64,
    /// Event-class term value per tier name (see `EventTier::as_str`).
    pub tier_weights: HashMap<String, f64>,
    /// Used for tiers missing from `tier_weights`.
    pub neutral_tier_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let tier_weights = [
            (EventTier::Major, 1.0),
            (EventTier::Premier, 0.8),
            (EventTier::Standard, 0.6),
            (EventTier::Minor, 0.4),
        ]
        .into_iter()
        .map(|(tier, w)| (tier.as_str().to_string(), w))
        .collect();

        Self {
            ev_ceiling: 0.20,
            kelly_ceiling: 0.10,
            ev_weight: 0.4,
            kelly_weight: 0.3,
            probability_weight: 0.2,
            event_class_weight: 0.1,
            high_threshold: 0.15,
            medium_threshold: 0.08,
            tier_weights,
            neutral_tier_weight: 0.5,
        }
    }
}

impl ScoringConfig {
    /// Event-class weight for a tier, falling back to the neutral weight.
    pub fn tier_weight(&self, tier: EventTier) -> f64 {
        self.tier_weights
            .get(tier.as_str())
            .copied()
            .unwrap_or(self.neutral_tier_weight)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        positive("scoring.ev_ceiling", self.ev_ceiling)?;
        positive("scoring.kelly_ceiling", self.kelly_ceiling)?;
        non_negative("scoring.ev_weight", self.ev_weight)?;
        non_negative("scoring.kelly_weight", self.kelly_weight)?;
        non_negative("scoring.probability_weight", self.probability_weight)?;
        non_negative("scoring.event_class_weight", self.event_class_weight)?;
        let total = self.ev_weight + self.kelly_weight + self.probability_weight + self.event_class_weight;
        if total <= 0.0 {
            return Err(invalid("scoring.weights", "term weights must not all be zero"));
        }
        non_negative("scoring.medium_threshold", self.medium_threshold)?;
        non_negative("scoring.high_threshold", self.high_threshold)?;
        if self.high_threshold < self.medium_threshold {
            return Err(invalid(
                "scoring.high_threshold",
                format!(
                    "high threshold {} is below medium threshold {}",
                    self.high_threshold, self.medium_threshold
                ),
            ));
        }
        non_negative("scoring.neutral_tier_weight", self.neutral_tier_weight)?;
        for (name, weight) in &self.tier_weights {
            if !EventTier::ALL.iter().any(|tier| tier.as_str() == name) {
                return Err(invalid(
                    "scoring.tier_weights",
                    format!("unknown event tier '{name}'"),
                ));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(invalid(
                    "scoring.tier_weights",
                    format!("weight for '{name}' must be a non-negative number, got {weight}"),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Signal detection
// ---------------------------------------------------------------------------

/// Signal detection and stake sizing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum EV for a value bet (0.05 = 5% edge per unit staked).
    pub min_ev_threshold: f64,
    /// Kelly fraction must be strictly above this.
    pub min_kelly_threshold: f64,
    /// Fractional Kelly damping (0.5 = half Kelly).
    pub kelly_fraction: f64,
    /// Absolute stake cap as a fraction of bankroll (0.05 = 5%).
    pub max_stake_percent: f64,
    /// Implied-probability sum below which an arbitrage is flagged.
    pub arbitrage_margin_ceiling: f64,
    /// Fixed confidence score given to arbitrage signals.
    pub arbitrage_confidence: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_ev_threshold: 0.05,
            min_kelly_threshold: 0.0,
            kelly_fraction: 0.5,
            max_stake_percent: 0.05,
            arbitrage_margin_ceiling: 0.98,
            arbitrage_confidence: 0.95,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        finite("signals.min_ev_threshold", self.min_ev_threshold)?;
        non_negative("signals.min_kelly_threshold", self.min_kelly_threshold)?;
        unit_interval("signals.kelly_fraction", self.kelly_fraction)?;
        unit_interval("signals.max_stake_percent", self.max_stake_percent)?;
        unit_interval("signals.arbitrage_margin_ceiling", self.arbitrage_margin_ceiling)?;
        if !(0.0..=1.0).contains(&self.arbitrage_confidence) {
            return Err(invalid(
                "signals.arbitrage_confidence",
                format!("must be within [0, 1], got {}", self.arbitrage_confidence),
            ));
        }
        Ok(())
    }
}

/// Default bounds for `SignalFilter` when built from config.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_tier: ConfidenceTier,
    pub min_ev: f64,
    /// Checked against the larger arbitrage leg, which is near half the
    /// bankroll. Value-bet stakes are already capped by `max_stake_percent`.
    pub max_stake: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_tier: ConfidenceTier::Low,
            min_ev: 0.0,
            max_stake: 1.0,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        finite("filter.min_ev", self.min_ev)?;
        non_negative("filter.max_stake", self.max_stake)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Backtesting
// ---------------------------------------------------------------------------

/// Backtest bankroll and settlement configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_bankroll: f64,
    /// Commission charged on winnings (0.05 = 5%).
    pub commission_rate: f64,
    pub min_bet_size: f64,
    pub max_bet_size: f64,
    /// Hard ceiling on a stake as a fraction of the current balance.
    pub max_bankroll_exposure: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: 10_000.0,
            commission_rate: 0.05,
            min_bet_size: 10.0,
            max_bet_size: 1_000.0,
            max_bankroll_exposure: 0.95,
        }
    }
}

/// Upper bound for configured money amounts, far below `Decimal::MAX`.
pub const MAX_MONEY_AMOUNT: f64 = 1e15;

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        positive("backtest.initial_bankroll", self.initial_bankroll)?;
        at_most("backtest.initial_bankroll", self.initial_bankroll, MAX_MONEY_AMOUNT)?;
        non_negative("backtest.commission_rate", self.commission_rate)?;
        if self.commission_rate >= 1.0 {
            return Err(invalid(
                "backtest.commission_rate",
                format!("must be below 1.0, got {}", self.commission_rate),
            ));
        }
        non_negative("backtest.min_bet_size", self.min_bet_size)?;
        positive("backtest.max_bet_size", self.max_bet_size)?;
        at_most("backtest.max_bet_size", self.max_bet_size, MAX_MONEY_AMOUNT)?;
        if self.max_bet_size < self.min_bet_size {
            return Err(invalid(
                "backtest.max_bet_size",
                format!(
                    "max bet {} is below min bet {}",
                    self.max_bet_size, self.min_bet_size
                ),
            ));
        }
        unit_interval("backtest.max_bankroll_exposure", self.max_bankroll_exposure)?;
        Ok(())
    }
}

/// Monte Carlo batch configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub trials: usize,
    /// Base seed; trial `i` uses `seed + i`. Random when absent.
    pub seed: Option<u64>,
    /// Worker threads; defaults to the available parallelism.
    pub workers: Option<usize>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            trials: 1_000,
            seed: None,
            workers: None,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.trials == 0 {
            return Err(invalid("monte_carlo.trials", "must run at least one trial"));
        }
        if self.workers == Some(0) {
            return Err(invalid("monte_carlo.workers", "worker count must be positive"));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.scoring.validate()?;
        self.signals.validate()?;
        self.filter.validate()?;
        self.backtest.validate()?;
        self.monte_carlo.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn invalid(field: &'static str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, format!("must be finite, got {value}")))
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), EngineError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive, got {value}")))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), EngineError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must not be negative, got {value}")))
    }
}

fn at_most(field: &'static str, value: f64, limit: f64) -> Result<(), EngineError> {
    if value <= limit {
        Ok(())
    } else {
        Err(invalid(field, format!("must be at most {limit}, got {value}")))
    }
}

/// (0, 1]
fn unit_interval(field: &'static str, value: f64) -> Result<(), EngineError> {
    positive(field, value)?;
    if value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be at most 1.0, got {value}")))
    }
}
