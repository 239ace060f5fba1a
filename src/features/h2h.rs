//! Head-to-head win counts between pairs of players

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::Ledger;
use crate::{MatchRecord, PlayerId};

/// Order-independent key for two players (lexicographically smaller name first)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    first: PlayerId,
    second: PlayerId,
}

impl PairKey {
    /// Canonical key for two players; `(a, b)` and `(b, a)` give the same key
    pub fn new(a: &PlayerId, b: &PlayerId) -> Self {
        if a <= b {
            PairKey {
                first: a.clone(),
                second: b.clone(),
            }
        } else {
            PairKey {
                first: b.clone(),
                second: a.clone(),
            }
        }
    }

    pub fn first(&self) -> &PlayerId {
        &self.first
    }

    pub fn second(&self) -> &PlayerId {
        &self.second
    }
}

/// Cumulative wins for each player of a canonical pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct H2HEntry {
    pub first_wins: u32,
    pub second_wins: u32,
}

impl H2HEntry {
    pub fn total(&self) -> u32 {
        self.first_wins + self.second_wins
    }
}

/// Head-to-head index, built by one forward pass over the ledger
#[derive(Debug, Clone, Default)]
pub struct H2HIndex {
    entries: HashMap<PairKey, H2HEntry>,
}

impl H2HIndex {
    /// Count every match in the ledger
    pub fn build(ledger: &Ledger) -> Self {
        Self::from_matches(ledger.iter())
    }

    /// Count only matches dated strictly before `cutoff`
    pub fn build_before(ledger: &Ledger, cutoff: NaiveDate) -> Self {
        Self::from_matches(ledger.iter().take_while(|m| m.date() < cutoff))
    }

    fn from_matches<'a>(matches: impl Iterator<Item = &'a MatchRecord>) -> Self {
        let mut index = H2HIndex::default();
        for record in matches {
            index.record(record);
        }
        index
    }

    /// Count one more completed match
    pub fn record(&mut self, record: &MatchRecord) {
        let key = PairKey::new(record.player_1(), record.player_2());
        let entry = self.entries.entry(key).or_default();
        // Increment whichever canonical slot holds the winner
        if record.winner_id() <= record.loser_id() {
            entry.first_wins += 1;
        } else {
            entry.second_wins += 1;
        }
    }

    /// Restore an index from persisted entries
    pub fn from_entries(entries: impl IntoIterator<Item = (PairKey, H2HEntry)>) -> Self {
        H2HIndex {
            entries: entries.into_iter().collect(),
        }
    }

    /// Wins `(for a, for b)`, oriented to the caller's argument order
    ///
    /// Pairs that never met return `(0, 0)`.
    pub fn lookup(&self, a: &PlayerId, b: &PlayerId) -> (u32, u32) {
        let key = PairKey::new(a, b);
        let entry = self.entries.get(&key).copied().unwrap_or_default();
        if key.first() == a {
            (entry.first_wins, entry.second_wins)
        } else {
            (entry.second_wins, entry.first_wins)
        }
    }

    /// Number of completed matches between two players
    pub fn total_matches(&self, a: &PlayerId, b: &PlayerId) -> u32 {
        self.entries
            .get(&PairKey::new(a, b))
            .map(|e| e.total())
            .unwrap_or(0)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&PairKey, &H2HEntry)> {
        self.entries.iter()
    }

    /// Number of distinct pairs that have met
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
