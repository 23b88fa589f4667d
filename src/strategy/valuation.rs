//! Expected value and Kelly sizing.
//!
//! Pure functions over (model probability, decimal odds). Degenerate
//! inputs return a 0.0 sentinel instead of failing:
//!
//! ```text
//! EV    = p * odds - 1
//! Kelly = (p * odds - 1) / (odds - 1) = EV / (odds - 1)
//! ```

/// Expected fractional return of a unit stake. 0.0 when `odds <= 1` or
/// either input is not finite.
pub fn expected_value(probability: f64, odds: f64) -> f64 {
    if !probability.is_finite() || !odds.is_finite() || odds <= 1.0 {
        return 0.0;
    }
    probability * odds - 1.0
}

/// Full Kelly fraction of bankroll. Never negative: 0.0 when the bet has
/// no edge, when `odds <= 1`, or when the result is not finite.
pub fn kelly_fraction(probability: f64, odds: f64) -> f64 {
    if !probability.is_finite() || !odds.is_finite() || odds <= 1.0 {
        return 0.0;
    }
    let kelly = (probability * odds - 1.0) / (odds - 1.0);
    if kelly.is_finite() && kelly > 0.0 {
        kelly
    } else {
        0.0
    }
}

/// Break-even probability at the given odds. 0.0 when `odds <= 1`.
pub fn implied_probability(odds: f64) -> f64 {
    if !odds.is_finite() || odds <= 1.0 {
        return 0.0;
    }
    1.0 / odds
}

/// Sum of both sides' implied probabilities (the book's overround).
pub fn implied_sum(first_odds: f64, second_odds: f64) -> f64 {
    implied_probability(first_odds) + implied_probability(second_odds)
}

/// Bookmaker margin: how far the implied sum exceeds 1. Negative values
/// indicate an arbitrage.
pub fn bookmaker_margin(first_odds: f64, second_odds: f64) -> f64 {
    implied_sum(first_odds, second_odds) - 1.0
}

/// Margin-free probabilities: implied probabilities normalised to sum to 1.
/// Falls back to `(0.5, 0.5)` when neither side has valid odds.
pub fn fair_probabilities(first_odds: f64, second_odds: f64) -> (f64, f64) {
    let p1 = implied_probability(first_odds);
    let p2 = implied_probability(second_odds);
    let total = p1 + p2;
    if total <= 0.0 {
        return (0.5, 0.5);
    }
    (p1 / total, p2 / total)
}
