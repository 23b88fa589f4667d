//! Signal detection, ranking and filtering.
//!
//! Scans priced events with a model estimate and emits at most one signal
//! per event: the best value bet, or an arbitrage when neither side offers
//! value but the book is underround.

use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use super::scoring::SignalScorer;
use super::valuation;
use crate::config::{DetectorConfig, FilterConfig};
use crate::types::{
    ConfidenceTier, EngineError, Event, PriorityTier, Selection, Side, Signal, SignalKind,
    StakeRecommendation,
};

/// Ranks at or above these get high / medium priority.
const HIGH_PRIORITY_RANK: usize = 5;
const MEDIUM_PRIORITY_RANK: usize = 15;

// ---------------------------------------------------------------------------
// Skip log
// ---------------------------------------------------------------------------

/// Why an event (or one side of it) produced no signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// One or both competitors have no quoted odds.
    MissingOdds,
    /// No model estimate, or no probability for one competitor.
    MissingEstimate,
    /// Probability outside (0, 1).
    InvalidProbability { side: Side, probability: f64 },
    /// Odds or derived EV/Kelly not usable for this side.
    NumericDegenerate { side: Side },
    /// Complete data, but no side cleared the thresholds and no arbitrage.
    NoEdge,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingOdds => write!(f, "missing odds"),
            SkipReason::MissingEstimate => write!(f, "missing model estimate"),
            SkipReason::InvalidProbability { side, probability } => {
                write!(f, "invalid probability {probability} for {side}")
            }
            SkipReason::NumericDegenerate { side } => write!(f, "degenerate odds for {side}"),
            SkipReason::NoEdge => write!(f, "no edge"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkipRecord {
    pub event_id: String,
    pub reason: SkipReason,
}

/// Result of one detection pass.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// One signal per qualifying event, in input order (not yet ranked).
    pub signals: Vec<Signal>,
    /// Skip records; an event can contribute more than one.
    pub skipped: Vec<SkipRecord>,
    pub events_scanned: usize,
}

impl Detection {
    /// Distinct events with at least one skip record.
    pub fn skipped_events(&self) -> usize {
        self.skipped
            .iter()
            .map(|s| s.event_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn skip_count(&self, matches: impl Fn(&SkipReason) -> bool) -> usize {
        self.skipped.iter().filter(|s| matches(&s.reason)).count()
    }

    /// Events dropped for missing odds or estimates.
    pub fn incomplete_count(&self) -> usize {
        self.skip_count(|r| matches!(r, SkipReason::MissingOdds | SkipReason::MissingEstimate))
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

pub struct SignalDetector {
    config: DetectorConfig,
    scorer: SignalScorer,
}

impl SignalDetector {
    pub fn new(config: DetectorConfig, scorer: SignalScorer) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config, scorer })
    }

    /// Scan events and emit at most one signal per event.
    pub fn detect(&self, events: &[Event]) -> Detection {
        let mut detection = Detection {
            events_scanned: events.len(),
            ..Detection::default()
        };

        for event in events {
            if let Some(signal) = self.evaluate_event(event, &mut detection.skipped) {
                detection.signals.push(signal);
            }
        }

        info!(
            events = detection.events_scanned,
            signals = detection.signals.len(),
            arbitrage = detection.signals.iter().filter(|s| s.is_arbitrage()).count(),
            skipped = detection.skipped.len(),
            "Signal detection complete"
        );

        detection
    }

    fn evaluate_event(&self, event: &Event, skipped: &mut Vec<SkipRecord>) -> Option<Signal> {
        let mut skip = |reason: SkipReason| {
            debug!(event_id = %event.id, reason = %reason, "Event side skipped");
            skipped.push(SkipRecord {
                event_id: event.id.clone(),
                reason,
            });
        };

        let Some(estimate) = event.estimate else {
            skip(SkipReason::MissingEstimate);
            return None;
        };
        let Some((odds_first, odds_second)) = event.odds.pair() else {
            skip(SkipReason::MissingOdds);
            return None;
        };
        let (Some(p_first), Some(p_second)) = (estimate.first, estimate.second) else {
            skip(SkipReason::MissingEstimate);
            return None;
        };

        let mut candidates: Vec<Signal> = Vec::with_capacity(2);
        for (side, odds, probability) in [
            (Side::First, odds_first, p_first),
            (Side::Second, odds_second, p_second),
        ] {
            if !(probability > 0.0 && probability < 1.0) {
                skip(SkipReason::InvalidProbability { side, probability });
                continue;
            }
            if !odds.is_finite() || odds <= 1.0 {
                skip(SkipReason::NumericDegenerate { side });
                continue;
            }
            match self.value_bet(event, side, odds, probability) {
                Ok(Some(signal)) => candidates.push(signal),
                Ok(None) => {}
                Err(reason) => skip(reason),
            }
        }

        if candidates.is_empty() {
            if let Some(arb) = self.arbitrage(event, odds_first, odds_second) {
                candidates.push(arb);
            }
        }

        // Best candidate by (confidence, EV); first wins an exact tie.
        let best = candidates.into_iter().min_by(compare_signals);
        if best.is_none() {
            skip(SkipReason::NoEdge);
        }
        best
    }

    /// Build a value-bet signal for one side if it clears the EV and Kelly
    /// thresholds.
    fn value_bet(
        &self,
        event: &Event,
        side: Side,
        odds: f64,
        probability: f64,
    ) -> Result<Option<Signal>, SkipReason> {
        let ev = valuation::expected_value(probability, odds);
        let kelly = valuation::kelly_fraction(probability, odds);
        if !ev.is_finite() || !kelly.is_finite() {
            return Err(SkipReason::NumericDegenerate { side });
        }

        if ev < self.config.min_ev_threshold || kelly <= self.config.min_kelly_threshold {
            return Ok(None);
        }

        let implied = valuation::implied_probability(odds);
        let fraction = (kelly * self.config.kelly_fraction).min(self.config.max_stake_percent);
        let (confidence_score, confidence_tier) = self.scorer.score(ev, kelly, implied, event.tier);

        debug!(
            event_id = %event.id,
            side = %side,
            odds,
            ev = format!("{:.2}%", ev * 100.0),
            kelly = format!("{:.2}%", kelly * 100.0),
            stake = format!("{:.2}%", fraction * 100.0),
            confidence = format!("{confidence_score:.3}"),
            "Value bet candidate"
        );

        Ok(Some(Signal {
            id: Uuid::new_v4(),
            event_id: event.id.clone(),
            selection: Selection::Competitor(side),
            competitor: Some(event.competitor(side).to_string()),
            opponent: Some(event.competitor(side.opposite()).to_string()),
            tier: event.tier,
            kind: SignalKind::ValueBet,
            odds,
            market_odds: (
                event.odds_for(Side::First).unwrap_or(odds),
                event.odds_for(Side::Second).unwrap_or(odds),
            ),
            implied_probability: implied,
            model_probability: Some(probability),
            expected_value: ev,
            kelly_fraction: kelly,
            stake: StakeRecommendation::Single { fraction },
            guaranteed_profit: None,
            confidence_score,
            confidence_tier,
            generated_at: Utc::now(),
            rank: None,
            priority: None,
        }))
    }

    /// Arbitrage when the implied sum is below the configured ceiling.
    fn arbitrage(&self, event: &Event, odds_first: f64, odds_second: f64) -> Option<Signal> {
        if odds_first <= 1.0 || odds_second <= 1.0 {
            return None;
        }
        let implied_sum = valuation::implied_sum(odds_first, odds_second);
        if !implied_sum.is_finite() || implied_sum >= self.config.arbitrage_margin_ceiling {
            return None;
        }

        let first = 1.0 / (odds_first * implied_sum);
        let second = 1.0 / (odds_second * implied_sum);
        let guaranteed_profit = 1.0 - implied_sum;
        let confidence_score = self.config.arbitrage_confidence;

        debug!(
            event_id = %event.id,
            implied_sum = format!("{implied_sum:.4}"),
            profit = format!("{:.2}%", guaranteed_profit * 100.0),
            "Arbitrage detected"
        );

        Some(Signal {
            id: Uuid::new_v4(),
            event_id: event.id.clone(),
            selection: Selection::Arbitrage,
            competitor: None,
            opponent: None,
            tier: event.tier,
            kind: SignalKind::Arbitrage,
            odds: 1.0 / implied_sum,
            market_odds: (odds_first, odds_second),
            implied_probability: implied_sum,
            model_probability: None,
            expected_value: guaranteed_profit,
            kelly_fraction: 0.0,
            stake: StakeRecommendation::Split { first, second },
            guaranteed_profit: Some(guaranteed_profit),
            confidence_score,
            confidence_tier: self.scorer.tier_for(confidence_score),
            generated_at: Utc::now(),
            rank: None,
            priority: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Descending by confidence score, then by expected value.
pub fn compare_signals(a: &Signal, b: &Signal) -> Ordering {
    b.confidence_score
        .total_cmp(&a.confidence_score)
        .then_with(|| b.expected_value.total_cmp(&a.expected_value))
}

/// Stable sort by (confidence, EV) descending and assign 1-based rank and
/// priority tier. Re-ranking a ranked list leaves its order unchanged.
pub fn rank_signals(mut signals: Vec<Signal>) -> Vec<Signal> {
    signals.sort_by(compare_signals);
    for (i, signal) in signals.iter_mut().enumerate() {
        let rank = i + 1;
        signal.rank = Some(rank);
        signal.priority = Some(priority_for_rank(rank));
    }
    signals
}

pub fn priority_for_rank(rank: usize) -> PriorityTier {
    if rank <= HIGH_PRIORITY_RANK {
        PriorityTier::High
    } else if rank <= MEDIUM_PRIORITY_RANK {
        PriorityTier::Medium
    } else {
        PriorityTier::Low
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Bounds a signal must satisfy to be kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalFilter {
    pub min_tier: ConfidenceTier,
    pub min_ev: f64,
    /// Max stake fraction; the larger leg is checked for arbitrage.
    pub max_stake: f64,
}

impl SignalFilter {
    pub fn new(min_tier: ConfidenceTier, min_ev: f64, max_stake: f64) -> Self {
        Self {
            min_tier,
            min_ev,
            max_stake,
        }
    }

    pub fn accepts(&self, signal: &Signal) -> bool {
        signal.confidence_tier >= self.min_tier
            && signal.expected_value >= self.min_ev
            && signal.stake.max_fraction() <= self.max_stake
    }

    /// Keep signals that satisfy every bound, preserving order.
    pub fn apply(&self, signals: &[Signal]) -> Vec<Signal> {
        let kept: Vec<Signal> = signals.iter().filter(|s| self.accepts(s)).cloned().collect();
        debug!(
            kept = kept.len(),
            dropped = signals.len() - kept.len(),
            min_tier = %self.min_tier,
            "Signals filtered"
        );
        kept
    }
}

impl From<&FilterConfig> for SignalFilter {
    fn from(cfg: &FilterConfig) -> Self {
        Self::new(cfg.min_tier, cfg.min_ev, cfg.max_stake)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::types::{EventStatus, EventTier, MarketOdds, ModelEstimate};

    // ---- helpers -----------------------------------------------------------

    fn make_event(id: &str, odds: (f64, f64), probs: (f64, f64)) -> Event {
        Event {
            id: id.to_string(),
            first: format!("{id}-A"),
            second: format!("{id}-B"),
            tier: EventTier::Standard,
            category: None,
            scheduled_at: Utc::now(),
            status: EventStatus::Scheduled,
            odds: MarketOdds::new(odds.0, odds.1),
            estimate: Some(ModelEstimate::new(probs.0, probs.1)),
            winner: None,
        }
    }

    fn make_detector() -> SignalDetector {
        make_detector_with(DetectorConfig::default())
    }

    fn make_detector_with(config: DetectorConfig) -> SignalDetector {
        let scorer = SignalScorer::new(ScoringConfig::default()).unwrap();
        SignalDetector::new(config, scorer).unwrap()
    }

    fn make_signal(id: &str, confidence: f64, ev: f64, tier: ConfidenceTier, stake: f64) -> Signal {
        Signal {
            id: Uuid::new_v4(),
            event_id: id.to_string(),
            selection: Selection::Competitor(Side::First),
            competitor: Some("A".into()),
            opponent: Some("B".into()),
            tier: EventTier::Standard,
            kind: SignalKind::ValueBet,
            odds: 2.0,
            market_odds: (2.0, 1.9),
            implied_probability: 0.5,
            model_probability: Some(0.55),
            expected_value: ev,
            kelly_fraction: 0.1,
            stake: StakeRecommendation::Single { fraction: stake },
            guaranteed_profit: None,
            confidence_score: confidence,
            confidence_tier: tier,
            generated_at: Utc::now(),
            rank: None,
            priority: None,
        }
    }

    // ---- detection ---------------------------------------------------------

    #[test]
    fn test_value_bet_stake_capped() {
        let detector = make_detector();
        // p=0.60 @ 2.00: EV 0.20, Kelly 0.20, half Kelly 0.10 capped at 0.05
        let events = vec![make_event("m1", (2.00, 1.80), (0.60, 0.40))];
        let detection = detector.detect(&events);

        assert_eq!(detection.signals.len(), 1);
        let s = &detection.signals[0];
        assert_eq!(s.kind, SignalKind::ValueBet);
        assert_eq!(s.selection, Selection::Competitor(Side::First));
        assert!((s.expected_value - 0.20).abs() < 1e-12);
        assert!((s.kelly_fraction - 0.20).abs() < 1e-12);
        assert_eq!(s.stake, StakeRecommendation::Single { fraction: 0.05 });
        assert_eq!(s.competitor.as_deref(), Some("m1-A"));
        assert_eq!(s.opponent.as_deref(), Some("m1-B"));
        assert_eq!(s.model_probability, Some(0.60));
    }

    #[test]
    fn test_uncapped_stake_is_fractional_kelly() {
        let detector = make_detector_with(DetectorConfig {
            max_stake_percent: 0.5,
            ..DetectorConfig::default()
        });
        let detection = detector.detect(&[make_event("m1", (2.00, 1.80), (0.60, 0.40))]);
        let fraction = detection.signals[0].stake.max_fraction();
        assert!((fraction - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_ev_below_threshold_no_value_bet() {
        let detector = make_detector();
        // EV = 0.52*2.0-1 = 0.04 < 0.05; implied sum 0.5+0.5263 -> no arb
        let detection = detector.detect(&[make_event("m1", (2.00, 1.90), (0.52, 0.48))]);
        assert!(detection.signals.is_empty());
        assert_eq!(detection.skip_count(|r| *r == SkipReason::NoEdge), 1);
    }

    #[test]
    fn test_no_arbitrage_above_ceiling() {
        let detector = make_detector();
        // Fair-priced estimate so no value bet; implied sum 0.9903 > 0.98
        let detection = detector.detect(&[make_event("m1", (1.80, 2.30), (0.55, 0.45))]);
        assert!(detection.signals.is_empty());
    }

    #[test]
    fn test_arbitrage_emitted_below_ceiling() {
        let detector = make_detector();
        // Probabilities chosen so neither side reaches 5% EV
        let detection = detector.detect(&[make_event("m1", (2.10, 2.20), (0.49, 0.47))]);
        assert_eq!(detection.signals.len(), 1);
        let s = &detection.signals[0];
        assert_eq!(s.kind, SignalKind::Arbitrage);
        assert_eq!(s.selection, Selection::Arbitrage);
        assert!(s.model_probability.is_none());
        assert!((s.guaranteed_profit.unwrap() - 0.0693).abs() < 1e-3);
        assert_eq!(s.confidence_score, 0.95);
        assert_eq!(s.confidence_tier, ConfidenceTier::High);

        match s.stake {
            StakeRecommendation::Split { first, second } => {
                assert!((first + second - 1.0).abs() < 1e-9);
                // Shorter odds take the larger allocation
                assert!(first > second);
            }
            other => panic!("expected split stake, got {other:?}"),
        }
    }

    #[test]
    fn test_arbitrage_not_checked_when_value_bet_exists() {
        let detector = make_detector();
        // Underround book, but the first side has clear value
        let detection = detector.detect(&[make_event("m1", (2.10, 2.20), (0.60, 0.40))]);
        assert_eq!(detection.signals.len(), 1);
        assert_eq!(detection.signals[0].kind, SignalKind::ValueBet);
    }

    #[test]
    fn test_one_signal_per_event_highest_confidence() {
        let detector = make_detector_with(DetectorConfig {
            min_ev_threshold: 0.01,
            ..DetectorConfig::default()
        });
        // Both sides have an edge against a generous book; second side's edge is larger
        let detection = detector.detect(&[make_event("m1", (2.20, 2.40), (0.47, 0.50))]);
        assert_eq!(detection.signals.len(), 1);
        assert_eq!(detection.signals[0].selection, Selection::Competitor(Side::Second));
    }

    #[test]
    fn test_missing_fields_skipped_not_fatal() {
        let detector = make_detector();

        let mut no_estimate = make_event("no_est", (2.0, 1.8), (0.6, 0.4));
        no_estimate.estimate = None;

        let mut no_odds = make_event("no_odds", (2.0, 1.8), (0.6, 0.4));
        no_odds.odds.second = None;

        let mut half_estimate = make_event("half", (2.0, 1.8), (0.6, 0.4));
        half_estimate.estimate = Some(ModelEstimate {
            first: Some(0.6),
            second: None,
        });

        let good = make_event("good", (2.0, 1.8), (0.6, 0.4));

        let detection = detector.detect(&[no_estimate, no_odds, half_estimate, good]);
        assert_eq!(detection.events_scanned, 4);
        assert_eq!(detection.signals.len(), 1);
        assert_eq!(detection.signals[0].event_id, "good");
        assert_eq!(detection.incomplete_count(), 3);
    }

    #[test]
    fn test_degenerate_odds_do_not_abort_batch() {
        let detector = make_detector();
        let bad = make_event("bad", (1.0, f64::NAN), (0.6, 0.4));
        let good = make_event("good", (2.0, 1.8), (0.6, 0.4));

        let detection = detector.detect(&[bad, good]);
        assert_eq!(detection.signals.len(), 1);
        assert_eq!(
            detection.skip_count(|r| matches!(r, SkipReason::NumericDegenerate { .. })),
            2
        );
    }

    #[test]
    fn test_invalid_probability_skipped() {
        let detector = make_detector();
        let detection = detector.detect(&[make_event("m1", (2.0, 1.8), (1.2, -0.2))]);
        assert!(detection.signals.is_empty());
        assert_eq!(
            detection.skip_count(|r| matches!(r, SkipReason::InvalidProbability { .. })),
            2
        );
        assert_eq!(detection.skipped.len(), 3);
        assert_eq!(detection.skipped_events(), 1);
    }

    #[test]
    fn test_detector_rejects_bad_config() {
        let scorer = SignalScorer::new(ScoringConfig::default()).unwrap();
        let result = SignalDetector::new(
            DetectorConfig {
                kelly_fraction: 0.0,
                ..DetectorConfig::default()
            },
            scorer,
        );
        assert!(result.is_err());
    }

    // ---- ranking -----------------------------------------------------------

    #[test]
    fn test_rank_orders_by_confidence_then_ev() {
        let signals = vec![
            make_signal("low", 0.30, 0.10, ConfidenceTier::High, 0.02),
            make_signal("tie_low_ev", 0.80, 0.06, ConfidenceTier::High, 0.02),
            make_signal("tie_high_ev", 0.80, 0.12, ConfidenceTier::High, 0.02),
        ];
        let ranked = rank_signals(signals);
        let ids: Vec<_> = ranked.iter().map(|s| s.event_id.as_str()).collect();
        assert_eq!(ids, vec!["tie_high_ev", "tie_low_ev", "low"]);
        assert_eq!(ranked[0].rank, Some(1));
        assert_eq!(ranked[2].rank, Some(3));
    }

    #[test]
    fn test_rerank_is_stable() {
        let signals: Vec<_> = (0..6)
            .map(|i| make_signal(&format!("s{i}"), 0.5, 0.1, ConfidenceTier::High, 0.02))
            .collect();
        let once = rank_signals(signals);
        let twice = rank_signals(once.clone());
        assert_eq!(once, twice);
        let ids: Vec<_> = twice.iter().map(|s| s.event_id.clone()).collect();
        assert_eq!(ids, vec!["s0", "s1", "s2", "s3", "s4", "s5"]);
    }

    #[test]
    fn test_priority_tiers_by_rank() {
        assert_eq!(priority_for_rank(1), PriorityTier::High);
        assert_eq!(priority_for_rank(5), PriorityTier::High);
        assert_eq!(priority_for_rank(6), PriorityTier::Medium);
        assert_eq!(priority_for_rank(15), PriorityTier::Medium);
        assert_eq!(priority_for_rank(16), PriorityTier::Low);
    }

    // ---- filtering ---------------------------------------------------------

    #[test]
    fn test_filter_drops_out_of_bounds() {
        let signals = vec![
            make_signal("keep", 0.5, 0.10, ConfidenceTier::High, 0.03),
            make_signal("low_tier", 0.5, 0.10, ConfidenceTier::Low, 0.03),
            make_signal("low_ev", 0.5, 0.01, ConfidenceTier::High, 0.03),
            make_signal("big_stake", 0.5, 0.10, ConfidenceTier::High, 0.08),
        ];
        let filter = SignalFilter::new(ConfidenceTier::Medium, 0.05, 0.05);
        let kept = filter.apply(&signals);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].event_id, "keep");
    }

    #[test]
    fn test_filter_checks_largest_arbitrage_leg() {
        let mut arb = make_signal("arb", 0.95, 0.07, ConfidenceTier::High, 0.0);
        arb.kind = SignalKind::Arbitrage;
        arb.stake = StakeRecommendation::Split { first: 0.51, second: 0.49 };

        assert!(SignalFilter::new(ConfidenceTier::Low, 0.0, 0.6).accepts(&arb));
        assert!(!SignalFilter::new(ConfidenceTier::Low, 0.0, 0.5).accepts(&arb));
    }

    #[test]
    fn test_filter_idempotent() {
        let signals = vec![
            make_signal("a", 0.9, 0.10, ConfidenceTier::High, 0.03),
            make_signal("b", 0.1, 0.02, ConfidenceTier::Low, 0.01),
            make_signal("c", 0.4, 0.07, ConfidenceTier::Medium, 0.06),
            make_signal("d", 0.6, 0.09, ConfidenceTier::Medium, 0.04),
        ];
        let filter = SignalFilter::new(ConfidenceTier::Medium, 0.05, 0.05);
        let once = filter.apply(&signals);
        let twice = filter.apply(&once);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }
}
