//! Kelly criterion sizing for decimal odds

/// Edge of a unit bet: `p·(b−1) − (1−p)`
pub fn edge(probability: f64, decimal_odds: f64) -> f64 {
    probability * (decimal_odds - 1.0) - (1.0 - probability)
}

/// Bankroll fraction that maximises long-run growth, clamped at zero
///
/// Odds of 1.0 or less pay nothing and never get a stake.
pub fn kelly_fraction(probability: f64, decimal_odds: f64) -> f64 {
    let net_odds = decimal_odds - 1.0;
    if net_odds.is_nan() || net_odds <= 0.0 || !probability.is_finite() {
        return 0.0;
    }
    (edge(probability, decimal_odds) / net_odds).max(0.0)
}

/// Expected profit of `stake` at the given probability and odds
pub fn expected_value(stake: f64, probability: f64, decimal_odds: f64) -> f64 {
    stake * edge(probability, decimal_odds)
}
