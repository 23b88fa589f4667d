//! Confidence scoring.
//!
//! Weighted sum of four terms, each normalised to [0, 1]:
//!
//! - EV relative to `ev_ceiling`
//! - Kelly fraction relative to `kelly_ceiling`
//! - probability moderation (balanced matchups over near-certainties)
//! - event-class weight from the tier table
//!
//! The resulting score is bucketed into a tier. Tier thresholds are weighted
//! scores, not probabilities.

use tracing::debug;

use crate::config::ScoringConfig;
use crate::types::{ConfidenceTier, EngineError, EventTier};

/// Individual term values before weighting. Kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub ev_term: f64,
    pub kelly_term: f64,
    pub probability_term: f64,
    pub event_class_term: f64,
    pub score: f64,
    pub tier: ConfidenceTier,
}

pub struct SignalScorer {
    config: ScoringConfig,
}

impl SignalScorer {
    /// Build a scorer, rejecting invalid ceilings, weights or thresholds.
    pub fn new(config: ScoringConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Score a candidate and return the score and its tier.
    pub fn score(
        &self,
        expected_value: f64,
        kelly: f64,
        implied_probability: f64,
        tier: EventTier,
    ) -> (f64, ConfidenceTier) {
        let breakdown = self.breakdown(expected_value, kelly, implied_probability, tier);
        (breakdown.score, breakdown.tier)
    }

    pub fn breakdown(
        &self,
        expected_value: f64,
        kelly: f64,
        implied_probability: f64,
        tier: EventTier,
    ) -> ScoreBreakdown {
        let cfg = &self.config;

        let ev_term = clip(expected_value / cfg.ev_ceiling);
        let kelly_term = clip(kelly / cfg.kelly_ceiling);
        let probability_term = moderation(implied_probability);
        let event_class_term = clip(cfg.tier_weight(tier));

        let score = clip(
            cfg.ev_weight * ev_term
                + cfg.kelly_weight * kelly_term
                + cfg.probability_weight * probability_term
                + cfg.event_class_weight * event_class_term,
        );
        let tier_bucket = self.tier_for(score);

        debug!(
            score = format!("{score:.3}"),
            tier = %tier_bucket,
            ev_term = format!("{ev_term:.2}"),
            kelly_term = format!("{kelly_term:.2}"),
            probability_term = format!("{probability_term:.2}"),
            event_class_term = format!("{event_class_term:.2}"),
            "Signal scored"
        );

        ScoreBreakdown {
            ev_term,
            kelly_term,
            probability_term,
            event_class_term,
            score,
            tier: tier_bucket,
        }
    }

    /// Bucket a weighted score.
    pub fn tier_for(&self, score: f64) -> ConfidenceTier {
        if score >= self.config.high_threshold {
            ConfidenceTier::High
        } else if score >= self.config.medium_threshold {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// 1.0 inside [0.2, 0.8]; outside, `1 - 2|0.5 - p|`.
fn moderation(probability: f64) -> f64 {
    if !probability.is_finite() {
        return 0.0;
    }
    if (0.2..=0.8).contains(&probability) {
        1.0
    } else {
        clip(1.0 - 2.0 * (0.5 - probability).abs())
    }
}

/// Clamp into [0, 1]; NaN becomes 0.
fn clip(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
