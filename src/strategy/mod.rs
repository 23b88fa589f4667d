//! Strategy engine: valuation, confidence scoring, signal detection and
//! portfolio summary.

pub mod detector;
pub mod portfolio;
pub mod scoring;
pub mod valuation;

use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::types::{EngineError, Event, Signal};
use detector::{rank_signals, SignalDetector, SignalFilter};
use portfolio::PortfolioSummary;
use scoring::SignalScorer;

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// Output of one pipeline pass.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    /// Ranked signals that passed the filter, best first.
    pub signals: Vec<Signal>,
    pub portfolio: PortfolioSummary,
    pub events_scanned: usize,
    /// Signals before filtering.
    pub detected: usize,
    /// Events that produced no signal.
    pub skipped: usize,
    pub filtered_out: usize,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Pipelines detection → ranking → filtering → portfolio summary.
pub struct StrategyPipeline {
    detector: SignalDetector,
}

impl StrategyPipeline {
    pub fn new(detector: SignalDetector) -> Self {
        Self { detector }
    }

    /// Build the scorer and detector from their config sections.
    pub fn from_config(config: &AppConfig) -> Result<Self, EngineError> {
        let scorer = SignalScorer::new(config.scoring.clone())?;
        let detector = SignalDetector::new(config.signals.clone(), scorer)?;
        Ok(Self::new(detector))
    }

    /// Run the full pipeline over a batch of events.
    ///
    /// Filtering happens after ranking, so ranks reflect the full detected
    /// set and kept signals retain their original rank.
    pub fn recommend(&self, events: &[Event], filter: &SignalFilter, bankroll: f64) -> Recommendations {
        let detection = self.detector.detect(events);
        let detected = detection.signals.len();
        let skipped = detection.skipped_events();

        let ranked = rank_signals(detection.signals);
        let signals = filter.apply(&ranked);
        let portfolio = PortfolioSummary::from_signals(&signals, bankroll);

        info!(
            events = detection.events_scanned,
            detected,
            kept = signals.len(),
            skipped,
            total_stake = format!("{:.2}", portfolio.total_stake),
            "Recommendations ready"
        );

        Recommendations {
            filtered_out: detected - signals.len(),
            signals,
            portfolio,
            events_scanned: detection.events_scanned,
            detected,
            skipped,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
