//! Synthetic outcomes for dry runs without a results feed.
//!
//! Winners are drawn from margin-free implied probabilities, so a strategy
//! with no real edge should break even before commission.

use rand::Rng;
use tracing::debug;

use crate::strategy::valuation;
use crate::types::{Event, EventResult, EventStatus, Outcomes, Side};

#[derive(Debug, Clone, Copy)]
pub struct OutcomeSimulator {
    /// Keep real results for events that are already finished with a winner.
    pub keep_known: bool,
}

impl Default for OutcomeSimulator {
    fn default() -> Self {
        Self { keep_known: true }
    }
}

impl OutcomeSimulator {
    /// One finished result per event. Events missing either quote are a coin
    /// flip.
    pub fn simulate<R: Rng + ?Sized>(&self, events: &[Event], rng: &mut R) -> Outcomes {
        let mut outcomes = Outcomes::new();
        let mut sampled = 0usize;

        for event in events {
            if self.keep_known && event.is_finished() {
                if let Some(winner) = event.winner {
                    outcomes.insert(event.id.clone(), EventResult::finished(winner));
                    continue;
                }
            }

            let p_first = match event.odds.pair() {
                Some((first, second)) => valuation::fair_probabilities(first, second).0,
                None => 0.5,
            };
            let winner = if rng.gen::<f64>() < p_first {
                Side::First
            } else {
                Side::Second
            };
            outcomes.insert(
                event.id.clone(),
                EventResult {
                    winner: Some(winner),
                    status: EventStatus::Finished,
                },
            );
            sampled += 1;
        }

        debug!(events = events.len(), sampled, "Outcomes synthesised");
        outcomes
    }
}
