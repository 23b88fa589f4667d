//! Shared types for the MATCHPOINT engine.
//!
//! Events and model estimates come in from upstream collaborators already
//! cleaned; signals, ledger entries and reports are produced here. Every
//! strategy and backtest module depends on these types, so they carry no
//! behaviour beyond simple accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Competitors and events
// ---------------------------------------------------------------------------

/// Which of the two competitors in an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    First,
    Second,
}

impl Side {
    /// The other competitor.
    pub fn opposite(&self) -> Self {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::First => write!(f, "FIRST"),
            Side::Second => write!(f, "SECOND"),
        }
    }
}

/// Lifecycle of a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Live,
    Finished,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Scheduled => write!(f, "scheduled"),
            EventStatus::Live => write!(f, "live"),
            EventStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Event classification used for the event-class confidence weight.
///
/// Tennis maps naturally: grand slams are `Major`, masters events `Premier`,
/// 500/250 tour events `Standard`, challengers and futures `Minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTier {
    Major,
    Premier,
    Standard,
    Minor,
    Unclassified,
}

impl EventTier {
    pub const ALL: &'static [EventTier] = &[
        EventTier::Major,
        EventTier::Premier,
        EventTier::Standard,
        EventTier::Minor,
        EventTier::Unclassified,
    ];

    /// Key used in the `[scoring.tier_weights]` config table.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTier::Major => "major",
            EventTier::Premier => "premier",
            EventTier::Standard => "standard",
            EventTier::Minor => "minor",
            EventTier::Unclassified => "unclassified",
        }
    }
}

impl Default for EventTier {
    fn default() -> Self {
        EventTier::Unclassified
    }
}

impl fmt::Display for EventTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Case-insensitive parse; anything unrecognised is `Unclassified`, never an
/// error, since tournament tags come from loosely curated upstream feeds.
impl std::str::FromStr for EventTier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tier = match s.trim().to_lowercase().as_str() {
            "major" | "grand_slam" | "grand slam" | "slam" => EventTier::Major,
            "premier" | "masters" | "masters_1000" | "wta_1000" => EventTier::Premier,
            "standard" | "atp_500" | "atp_250" | "wta_500" | "wta_250" => EventTier::Standard,
            "minor" | "challenger" | "itf" | "futures" => EventTier::Minor,
            _ => EventTier::Unclassified,
        };
        Ok(tier)
    }
}

/// Decimal odds quoted for each competitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketOdds {
    pub first: Option<f64>,
    pub second: Option<f64>,
}

impl MarketOdds {
    pub fn new(first: f64, second: f64) -> Self {
        Self {
            first: Some(first),
            second: Some(second),
        }
    }

    pub fn get(&self, side: Side) -> Option<f64> {
        match side {
            Side::First => self.first,
            Side::Second => self.second,
        }
    }

    /// Both quotes, if both are present.
    pub fn pair(&self) -> Option<(f64, f64)> {
        Some((self.first?, self.second?))
    }
}

/// Externally estimated win probability per competitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelEstimate {
    pub first: Option<f64>,
    pub second: Option<f64>,
}

impl ModelEstimate {
    pub fn new(first: f64, second: f64) -> Self {
        Self {
            first: Some(first),
            second: Some(second),
        }
    }

    pub fn get(&self, side: Side) -> Option<f64> {
        match side {
            Side::First => self.first,
            Side::Second => self.second,
        }
    }
}

/// A cleaned two-competitor event with its market and (optionally) a model
/// estimate and known outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub first: String,
    pub second: String,
    #[serde(default)]
    pub tier: EventTier,
    /// Surface or other free-form category tag.
    #[serde(default)]
    pub category: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub status: EventStatus,
    #[serde(default)]
    pub odds: MarketOdds,
    #[serde(default)]
    pub estimate: Option<ModelEstimate>,
    #[serde(default)]
    pub winner: Option<Side>,
}

impl Event {
    pub fn competitor(&self, side: Side) -> &str {
        match side {
            Side::First => &self.first,
            Side::Second => &self.second,
        }
    }

    pub fn odds_for(&self, side: Side) -> Option<f64> {
        self.odds.get(side)
    }

    pub fn probability_for(&self, side: Side) -> Option<f64> {
        self.estimate.and_then(|e| e.get(side))
    }

    pub fn is_finished(&self) -> bool {
        self.status == EventStatus::Finished
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} vs {} ({}, {})", self.id, self.first, self.second, self.tier, self.status)
    }
}

// ---------------------------------------------------------------------------
// Outcomes lookup
// ---------------------------------------------------------------------------

/// Known result of an event, as reported by the results collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResult {
    pub winner: Option<Side>,
    pub status: EventStatus,
}

impl EventResult {
    pub fn finished(winner: Side) -> Self {
        Self {
            winner: Some(winner),
            status: EventStatus::Finished,
        }
    }
}

/// Results lookup keyed by event id. Read-only once built; shared across
/// Monte Carlo trials by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcomes {
    results: HashMap<String, EventResult>,
}

impl Outcomes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect results from events that already carry a winner or status.
    pub fn from_events(events: &[Event]) -> Self {
        let results = events
            .iter()
            .filter(|e| e.winner.is_some() || e.is_finished())
            .map(|e| {
                (
                    e.id.clone(),
                    EventResult {
                        winner: e.winner,
                        status: e.status,
                    },
                )
            })
            .collect();
        Self { results }
    }

    pub fn insert(&mut self, event_id: impl Into<String>, result: EventResult) {
        self.results.insert(event_id.into(), result);
    }

    pub fn get(&self, event_id: &str) -> Option<&EventResult> {
        self.results.get(event_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl FromIterator<(String, EventResult)> for Outcomes {
    fn from_iter<I: IntoIterator<Item = (String, EventResult)>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    ValueBet,
    Arbitrage,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::ValueBet => write!(f, "value_bet"),
            SignalKind::Arbitrage => write!(f, "arbitrage"),
        }
    }
}

/// What the signal backs: one competitor, or both sides of an arbitrage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Competitor(Side),
    Arbitrage,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Competitor(side) => write!(f, "{side}"),
            Selection::Arbitrage => write!(f, "ARBITRAGE"),
        }
    }
}

/// Discretised confidence bucket. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub const ALL: &'static [ConfidenceTier] =
        &[ConfidenceTier::High, ConfidenceTier::Medium, ConfidenceTier::Low];
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceTier::Low => write!(f, "low"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for ConfidenceTier {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(ConfidenceTier::Low),
            "medium" => Ok(ConfidenceTier::Medium),
            "high" => Ok(ConfidenceTier::High),
            other => Err(EngineError::InvalidConfig {
                field: "confidence_tier",
                reason: format!("unknown tier '{other}'"),
            }),
        }
    }
}

/// Presentation priority assigned by ranking. Not a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityTier::Low => write!(f, "low"),
            PriorityTier::Medium => write!(f, "medium"),
            PriorityTier::High => write!(f, "high"),
        }
    }
}

/// Recommended stake as a fraction of bankroll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StakeRecommendation {
    Single { fraction: f64 },
    /// Arbitrage allocation across both sides; fractions sum to 1.
    Split { first: f64, second: f64 },
}

impl StakeRecommendation {
    /// Largest single allocation (used by stake-cap filters).
    pub fn max_fraction(&self) -> f64 {
        match *self {
            StakeRecommendation::Single { fraction } => fraction,
            StakeRecommendation::Split { first, second } => first.max(second),
        }
    }

    /// Fraction used when sizing a monetary stake in a backtest.
    pub fn mean_fraction(&self) -> f64 {
        match *self {
            StakeRecommendation::Single { fraction } => fraction,
            StakeRecommendation::Split { first, second } => (first + second) / 2.0,
        }
    }

    /// Sum of allocations (the portfolio exposure of the signal).
    pub fn total_fraction(&self) -> f64 {
        match *self {
            StakeRecommendation::Single { fraction } => fraction,
            StakeRecommendation::Split { first, second } => first + second,
        }
    }
}

/// A ranked betting recommendation derived from one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub event_id: String,
    pub selection: Selection,
    /// Backed competitor; `None` for arbitrage.
    pub competitor: Option<String>,
    pub opponent: Option<String>,
    pub tier: EventTier,
    pub kind: SignalKind,
    /// Odds of the selection. For arbitrage, the effective combined odds
    /// `1 / implied_sum`.
    pub odds: f64,
    pub market_odds: (f64, f64),
    /// Implied probability of the selection; implied sum for arbitrage.
    pub implied_probability: f64,
    pub model_probability: Option<f64>,
    /// EV per unit stake; the guaranteed profit for arbitrage.
    pub expected_value: f64,
    pub kelly_fraction: f64,
    pub stake: StakeRecommendation,
    pub guaranteed_profit: Option<f64>,
    pub confidence_score: f64,
    pub confidence_tier: ConfidenceTier,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub rank: Option<usize>,
    #[serde(default)]
    pub priority: Option<PriorityTier>,
}

impl Signal {
    pub fn is_arbitrage(&self) -> bool {
        self.kind == SignalKind::Arbitrage
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = self.rank.map(|r| format!("#{r} ")).unwrap_or_default();
        let who = self.competitor.as_deref().unwrap_or("both sides");
        write!(
            f,
            "{rank}{} {} on {who} @ {:.2} | EV {:+.1}% | stake {:.2}% | confidence {:.2} ({})",
            self.event_id,
            self.kind,
            self.odds,
            self.expected_value * 100.0,
            self.stake.max_fraction() * 100.0,
            self.confidence_score,
            self.confidence_tier,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Engine errors. Per-item data problems are skips, not errors; only
/// misconfiguration and misuse of the engine lifecycle surface here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid configuration ({field}): {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("Invalid engine state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
