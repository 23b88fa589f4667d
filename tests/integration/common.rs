use chrono::{Duration, TimeZone, Utc};

use matchpoint::types::{
    Event, EventResult, EventStatus, EventTier, MarketOdds, ModelEstimate, Outcomes, Side,
};

/// A deterministic slate of priced events: a mix of value bets, fair
/// prices, one underround book and a few incomplete records.
pub fn make_slate() -> Vec<Event> {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
    let tiers = [
        EventTier::Major,
        EventTier::Premier,
        EventTier::Standard,
        EventTier::Minor,
    ];

    let mut events: Vec<Event> = (0..24)
        .map(|i| {
            let odds_first = 1.5 + (i % 6) as f64 * 0.25;
            let odds_second = 1.0 / (1.06 - 1.0 / odds_first);
            // Every other event has a model edge on the first competitor
            let edge = if i % 2 == 0 { 0.08 } else { 0.0 };
            let p_first = (1.0 / odds_first / 1.06 + edge).min(0.95);
            make_event(
                &format!("ev{i:02}"),
                tiers[i % tiers.len()],
                start + Duration::hours(i as i64),
                (odds_first, odds_second),
                Some((p_first, 1.0 - p_first)),
            )
        })
        .collect();

    events.push(make_event(
        "arb",
        EventTier::Standard,
        start,
        (2.10, 2.20),
        Some((0.49, 0.47)),
    ));

    events.push(make_event("no_estimate", EventTier::Minor, start, (1.8, 2.0), None));

    let mut no_odds = make_event("no_odds", EventTier::Minor, start, (1.8, 2.0), Some((0.7, 0.3)));
    no_odds.odds = MarketOdds { first: Some(1.8), second: None };
    events.push(no_odds);

    events
}

pub fn make_event(
    id: &str,
    tier: EventTier,
    scheduled_at: chrono::DateTime<Utc>,
    odds: (f64, f64),
    probs: Option<(f64, f64)>,
) -> Event {
    Event {
        id: id.to_string(),
        first: format!("{id} first"),
        second: format!("{id} second"),
        tier,
        category: Some("hard".to_string()),
        scheduled_at,
        status: EventStatus::Scheduled,
        odds: MarketOdds::new(odds.0, odds.1),
        estimate: probs.map(|(a, b)| ModelEstimate::new(a, b)),
        winner: None,
    }
}

/// Fixed results: the first competitor wins two events in three.
pub fn make_outcomes(events: &[Event]) -> Outcomes {
    events
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let winner = if i % 3 == 2 { Side::Second } else { Side::First };
            (e.id.clone(), EventResult::finished(winner))
        })
        .collect()
}
