//! Elo rating system for player strength estimation
//!
//! Ratings are a strict left-to-right fold over the ledger: replaying the same
//! matches in the same order always gives bit-identical ratings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::Ledger;
use crate::{MatchRecord, PlayerId, Side};

/// Elo rating configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloConfig {
    /// Starting rating for unseen players
    pub initial_rating: f64,
    /// K-factor: how much ratings change per match
    pub k_factor: f64,
    /// Rating difference at which the stronger player is a 10:1 favourite
    pub factor: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        EloConfig {
            initial_rating: 1500.0,
            k_factor: 32.0,
            factor: 400.0,
        }
    }
}

/// Ratings of both players as they stood before a match was applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreMatchElo {
    pub rating_1: f64,
    pub rating_2: f64,
    /// Probability that `player_1` wins, from the pre-match ratings
    pub prob_player_1: f64,
}

/// Elo rating table
#[derive(Debug, Clone)]
pub struct EloTable {
    ratings: HashMap<PlayerId, f64>,
    config: EloConfig,
}

impl Default for EloTable {
    fn default() -> Self {
        Self::new(EloConfig::default())
    }
}

impl EloTable {
    pub fn new(config: EloConfig) -> Self {
        EloTable {
            ratings: HashMap::new(),
            config,
        }
    }

    /// Restore a table from persisted ratings
    pub fn from_ratings(config: EloConfig, ratings: impl IntoIterator<Item = (PlayerId, f64)>) -> Self {
        EloTable {
            ratings: ratings.into_iter().collect(),
            config,
        }
    }

    pub fn config(&self) -> &EloConfig {
        &self.config
    }

    /// Current rating for a player (initial rating if unseen)
    pub fn get_rating(&self, player: &PlayerId) -> f64 {
        self.ratings
            .get(player)
            .copied()
            .unwrap_or(self.config.initial_rating)
    }

    /// Probability that a player rated `rating_a` beats one rated `rating_b`
    pub fn win_probability(&self, rating_a: f64, rating_b: f64) -> f64 {
        1.0 / (1.0 + 10.0_f64.powf((rating_b - rating_a) / self.config.factor))
    }

    /// Win probability for `a` against `b` at the current ratings
    pub fn predict(&self, a: &PlayerId, b: &PlayerId) -> f64 {
        self.win_probability(self.get_rating(a), self.get_rating(b))
    }

    /// Both current ratings and the resulting win probability for `a`
    pub fn pre_match(&self, a: &PlayerId, b: &PlayerId) -> PreMatchElo {
        let rating_1 = self.get_rating(a);
        let rating_2 = self.get_rating(b);
        PreMatchElo {
            rating_1,
            rating_2,
            prob_player_1: self.win_probability(rating_1, rating_2),
        }
    }

    /// Update both ratings after `a` played `b`; `a_won` is the result for `a`
    pub fn apply_result(&mut self, a: &PlayerId, b: &PlayerId, a_won: bool) {
        let rating_a = self.get_rating(a);
        let rating_b = self.get_rating(b);
        let prob_a = self.win_probability(rating_a, rating_b);
        let result = if a_won { 1.0 } else { 0.0 };

        let new_a = rating_a + self.config.k_factor * (result - prob_a);
        let new_b = rating_b + self.config.k_factor * ((1.0 - result) - (1.0 - prob_a));

        self.ratings.insert(a.clone(), new_a);
        self.ratings.insert(b.clone(), new_b);
    }

    fn apply_match(&mut self, record: &MatchRecord) {
        self.apply_result(
            record.player_1(),
            record.player_2(),
            record.winner == Side::PlayerOne,
        );
    }

    /// Apply every ledger match in chronological order
    pub fn replay(&mut self, ledger: &Ledger) {
        for record in ledger.iter() {
            self.apply_match(record);
        }
        log::debug!(
            "Elo replay over {} matches, {} rated players",
            ledger.len(),
            self.ratings.len()
        );
    }

    /// Same fold as [`EloTable::replay`], recording each match's pre-update ratings
    pub fn replay_recording(&mut self, ledger: &Ledger) -> Vec<PreMatchElo> {
        ledger
            .iter()
            .map(|record| {
                let snapshot = self.pre_match(record.player_1(), record.player_2());
                self.apply_match(record);
                snapshot
            })
            .collect()
    }

    pub fn ratings(&self) -> impl Iterator<Item = (&PlayerId, f64)> {
        self.ratings.iter().map(|(p, r)| (p, *r))
    }

    /// Number of rated players
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::Fixture;

    fn make_match(p1: &str, p2: &str, winner: Side, offset: i64) -> MatchRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset);
        MatchRecord::new(Fixture::new(date, p1.into(), p2.into()), winner)
    }

    fn sample_ledger() -> Ledger {
        Ledger::from_records(vec![
            make_match("A", "B", Side::PlayerOne, 0),
            make_match("B", "A", Side::PlayerOne, 10),
            make_match("A", "B", Side::PlayerOne, 20),
            make_match("C", "A", Side::PlayerTwo, 20),
            make_match("B", "C", Side::PlayerTwo, 30),
        ])
    }

    #[test]
    fn test_initial_ratings() {
        let elo = EloTable::default();
        assert_eq!(elo.get_rating(&PlayerId::new("A")), 1500.0);
        assert_eq!(elo.get_rating(&PlayerId::new("Nobody")), 1500.0);
    }

    #[test]
    fn test_equal_ratings_are_even() {
        let elo = EloTable::default();
        assert_eq!(elo.win_probability(1500.0, 1500.0), 0.5);
        assert_eq!(elo.win_probability(2100.0, 2100.0), 0.5);
    }

    #[test]
    fn test_factor_gives_ten_to_one() {
        let elo = EloTable::default();
        let p = elo.win_probability(1900.0, 1500.0);
        assert!((p - 10.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_first_match_update() {
        let mut elo = EloTable::default();
        let a = PlayerId::new("A");
        let b = PlayerId::new("B");
        elo.apply_result(&a, &b, true);
        assert!((elo.get_rating(&a) - 1516.0).abs() < 1e-9);
        assert!((elo.get_rating(&b) - 1484.0).abs() < 1e-9);
    }

    #[test]
    fn test_winner_gains_loser_drops() {
        let mut elo = EloTable::default();
        let a = PlayerId::new("A");
        let b = PlayerId::new("B");
        elo.apply_result(&a, &b, true);
        elo.apply_result(&a, &b, true);
        let (ra, rb) = (elo.get_rating(&a), elo.get_rating(&b));
        elo.apply_result(&a, &b, true);
        assert!(elo.get_rating(&a) > ra);
        assert!(elo.get_rating(&b) < rb);

        // An upset moves ratings the other way
        let (ra, rb) = (elo.get_rating(&a), elo.get_rating(&b));
        elo.apply_result(&a, &b, false);
        assert!(elo.get_rating(&a) < ra);
        assert!(elo.get_rating(&b) > rb);
    }

    #[test]
    fn test_update_is_zero_sum() {
        let mut elo = EloTable::default();
        elo.replay(&sample_ledger());
        let total: f64 = elo.ratings().map(|(_, r)| r).sum();
        assert!((total - 1500.0 * elo.len() as f64).abs() < 1e-9);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let mut first = EloTable::default();
        first.replay(&sample_ledger());
        let mut second = EloTable::default();
        second.replay(&sample_ledger());
        for player in ["A", "B", "C"] {
            let p = PlayerId::new(player);
            assert_eq!(first.get_rating(&p).to_bits(), second.get_rating(&p).to_bits());
        }
    }

    #[test]
    fn test_replay_recording_matches_replay() {
        let ledger = sample_ledger();
        let mut plain = EloTable::default();
        plain.replay(&ledger);

        let mut recorded = EloTable::default();
        let snapshots = recorded.replay_recording(&ledger);
        assert_eq!(snapshots.len(), ledger.len());
        assert_eq!(snapshots[0].prob_player_1, 0.5);
        assert_eq!(snapshots[0].rating_1, 1500.0);
        // Second match is B (1484) vs A (1516)
        assert!((snapshots[1].rating_1 - 1484.0).abs() < 1e-9);
        assert!(snapshots[1].prob_player_1 < 0.5);

        for player in ["A", "B", "C"] {
            let p = PlayerId::new(player);
            assert_eq!(plain.get_rating(&p), recorded.get_rating(&p));
        }
    }

    #[test]
    fn test_predict_favours_stronger_player() {
        let mut elo = EloTable::default();
        for _ in 0..5 {
            elo.apply_result(&PlayerId::new("A"), &PlayerId::new("B"), true);
        }
        let p = elo.predict(&PlayerId::new("A"), &PlayerId::new("B"));
        assert!(p > 0.5);
        let q = elo.predict(&PlayerId::new("B"), &PlayerId::new("A"));
        assert!((p + q - 1.0).abs() < 1e-12);
    }
}
