//! Recency-weighted player form
//!
//! One date-ordered result log per player, with windowing and decay applied
//! at query time. Every query for date `D` only looks at matches dated
//! strictly before `D`, so a match never contributes to its own features.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::Ledger;
use crate::PlayerId;

/// Form query parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    /// Most-recent matches considered by the fixed-window queries
    pub window: usize,
    /// Decay rate per day for the weighted form score
    pub decay_alpha: f64,
    /// Lookback horizon in days for the weighted form score
    pub horizon_days: i64,
    /// Lookback in days for the match-density count
    pub density_days: i64,
}

impl Default for FormConfig {
    fn default() -> Self {
        FormConfig {
            window: 5,
            decay_alpha: 0.1,
            horizon_days: 180,
            density_days: 30,
        }
    }
}

/// One past result for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormEntry {
    pub date: NaiveDate,
    pub won: bool,
    pub games_won: Option<u32>,
    pub games_lost: Option<u32>,
}

impl FormEntry {
    fn win_flag(&self) -> u32 {
        u32::from(self.won)
    }
}

/// Rolling statistics over a player's most recent matches
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecentStats {
    /// Share of the last `window` matches won (0.0 without history)
    pub win_rate: f64,
    /// Mean games won minus games lost over the scored matches in the window
    pub avg_games_diff: Option<f64>,
    /// Matches played in the `density_days` before the query date
    pub matches_in_density_window: usize,
}

/// Per-player result logs built from the ledger
#[derive(Debug, Clone, Default)]
pub struct FormTracker {
    history: HashMap<PlayerId, Vec<FormEntry>>,
}

impl FormTracker {
    /// Group the ledger by player, one ascending result log each
    pub fn build(ledger: &Ledger) -> Self {
        let mut history: HashMap<PlayerId, Vec<FormEntry>> = HashMap::new();
        for record in ledger.iter() {
            for player in [record.player_1(), record.player_2()] {
                let games = record.games_for(player);
                history.entry(player.clone()).or_default().push(FormEntry {
                    date: record.date(),
                    won: record.winner_id() == player,
                    games_won: games.map(|(won, _)| won),
                    games_lost: games.map(|(_, lost)| lost),
                });
            }
        }
        FormTracker { history }
    }

    /// Restore a tracker from persisted logs; each log is re-sorted by date
    pub fn from_history(history: impl IntoIterator<Item = (PlayerId, Vec<FormEntry>)>) -> Self {
        let history = history
            .into_iter()
            .map(|(player, mut entries)| {
                entries.sort_by_key(|e| e.date);
                (player, entries)
            })
            .collect();
        FormTracker { history }
    }

    /// Entries for a player dated strictly before `as_of`
    fn before(&self, player: &PlayerId, as_of: NaiveDate) -> &[FormEntry] {
        match self.history.get(player) {
            Some(entries) => {
                let end = entries.partition_point(|e| e.date < as_of);
                &entries[..end]
            }
            None => &[],
        }
    }

    /// Wins among the last `k` matches before `as_of`
    pub fn query_fixed_window(&self, player: &PlayerId, as_of: NaiveDate, k: usize) -> u32 {
        let past = self.before(player, as_of);
        let start = past.len().saturating_sub(k);
        past[start..].iter().map(FormEntry::win_flag).sum()
    }

    /// Sum of `exp(-alpha * age)` over wins aged 1..=horizon days
    pub fn query_decayed(
        &self,
        player: &PlayerId,
        as_of: NaiveDate,
        alpha: f64,
        horizon_days: i64,
    ) -> f64 {
        self.before(player, as_of)
            .iter()
            .rev()
            .map(|e| ((as_of - e.date).num_days(), e))
            .take_while(|(age, _)| *age <= horizon_days)
            .filter(|(age, e)| *age > 0 && e.won)
            .map(|(age, _)| (-alpha * age as f64).exp())
            .sum()
    }

    /// Win rate, games differential and match density before `as_of`
    pub fn recent_stats(
        &self,
        player: &PlayerId,
        as_of: NaiveDate,
        window: usize,
        density_days: i64,
    ) -> RecentStats {
        let past = self.before(player, as_of);
        let recent = &past[past.len().saturating_sub(window)..];

        let win_rate = if recent.is_empty() {
            0.0
        } else {
            recent.iter().map(FormEntry::win_flag).sum::<u32>() as f64 / recent.len() as f64
        };

        let diffs: Vec<f64> = recent
            .iter()
            .filter_map(|e| Some(e.games_won? as f64 - e.games_lost? as f64))
            .collect();
        let avg_games_diff = if diffs.is_empty() {
            None
        } else {
            Some(diffs.iter().sum::<f64>() / diffs.len() as f64)
        };

        let matches_in_density_window = past
            .iter()
            .rev()
            .take_while(|e| (as_of - e.date).num_days() <= density_days)
            .count();

        RecentStats {
            win_rate,
            avg_games_diff,
            matches_in_density_window,
        }
    }

    /// Full result log for a player (empty for unknown players)
    pub fn history(&self, player: &PlayerId) -> &[FormEntry] {
        self.history.get(player).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerId> {
        self.history.keys()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
