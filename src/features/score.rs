//! Score-derived outcome features
//!
//! Total games and first-set winner parsed from a textual set-by-set score
//! such as `"6-4 3-6 7-6(5)"`. Anything unparseable is reported as missing.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Side;

fn set_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)-(\d+)").expect("valid set pattern"))
}

fn first_set_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)-(\d+)(?:\(\d+\))?$").expect("valid set pattern"))
}

/// Per-set game counts `(player_1, player_2)`
///
/// `None` when no set is found or any set count does not fit a `u32`.
pub fn parse_sets(score: &str) -> Option<Vec<(u32, u32)>> {
    let sets = set_pattern()
        .captures_iter(score)
        .map(|caps| Some((caps[1].parse().ok()?, caps[2].parse().ok()?)))
        .collect::<Option<Vec<(u32, u32)>>>()?;

    if sets.is_empty() {
        None
    } else {
        Some(sets)
    }
}

/// Games `(player_1, player_2)` summed over all sets; `None` on overflow
pub fn total_games_by_side(score: &str) -> Option<(u32, u32)> {
    parse_sets(score)?
        .iter()
        .try_fold((0u32, 0u32), |(one, two), (g1, g2)| {
            Some((one.checked_add(*g1)?, two.checked_add(*g2)?))
        })
}

/// Total games played across all sets
pub fn parse_score(score: &str) -> Option<u32> {
    let (one, two) = total_games_by_side(score)?;
    one.checked_add(two)
}

/// Winner of the first set, judged from the first whitespace-separated token
///
/// A level first token (e.g. `"6-6"`) is malformed for a completed set and
/// yields `None`.
pub fn first_set_winner(score: &str) -> Option<Side> {
    let token = score.split_whitespace().next()?;
    let caps = first_set_pattern().captures(token)?;
    let one: u32 = caps[1].parse().ok()?;
    let two: u32 = caps[2].parse().ok()?;
    match one.cmp(&two) {
        std::cmp::Ordering::Greater => Some(Side::PlayerOne),
        std::cmp::Ordering::Less => Some(Side::PlayerTwo),
        std::cmp::Ordering::Equal => None,
    }
}

/// Four-game bucket of the total games in a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GamesClass {
    pub low: u32,
}

impl GamesClass {
    pub const MIN: u32 = 15;
    pub const MAX: u32 = 38;
    const WIDTH: u32 = 4;

    pub fn high(&self) -> u32 {
        self.low + Self::WIDTH - 1
    }

    /// All buckets, lowest first
    pub fn all() -> Vec<GamesClass> {
        (Self::MIN..=Self::MAX)
            .step_by(Self::WIDTH as usize)
            .map(|low| GamesClass { low })
            .collect()
    }
}

impl fmt::Display for GamesClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high())
    }
}

/// Bucket for a total-games count; totals outside 15..=38 have no class
///
/// Buckets are closed on both label edges, so 19 is `19-22` and 39 has no
/// class. The source scripts binned with right-closed intervals
/// (`(15, 19]`, ..., `(35, 39]`, lowest edge included), which put 19 in
/// `15-18` and 39 in `35-38`; this crate does not reproduce that offset.
pub fn games_class(total_games: u32) -> Option<GamesClass> {
    if !(GamesClass::MIN..=GamesClass::MAX).contains(&total_games) {
        return None;
    }
    let offset = (total_games - GamesClass::MIN) / GamesClass::WIDTH;
    Some(GamesClass {
        low: GamesClass::MIN + offset * GamesClass::WIDTH,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_games() {
        assert_eq!(parse_score("6-4 6-3"), Some(19));
        assert_eq!(parse_score("6-4 3-6 7-6(5)"), Some(32));
        assert_eq!(parse_score("7-6(3) 6-7(8) 6-4 4-6 6-3"), Some(55));
    }

    #[test]
    fn test_malformed_score_is_missing() {
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("W/O"), None);
        assert_eq!(parse_score("retired"), None);
    }

    #[test]
    fn test_oversized_set_counts_are_missing() {
        assert_eq!(parse_score("4000000000-4000000000"), None);
        assert_eq!(parse_score("3000000000-1 3000000000-1"), None);
        assert_eq!(total_games_by_side("3000000000-1 3000000000-1"), None);
    }

    #[test]
    fn test_unparseable_set_invalidates_score() {
        assert_eq!(parse_sets("6-4 99999999999-3"), None);
        assert_eq!(parse_score("6-4 99999999999-3"), None);
        assert_eq!(parse_sets("6-4 3-6"), Some(vec![(6, 4), (3, 6)]));
    }

    #[test]
    fn test_retirement_counts_played_games() {
        assert_eq!(parse_score("6-3 2-1 ret."), Some(12));
    }

    #[test]
    fn test_first_set_winner() {
        assert_eq!(first_set_winner("6-4 3-6 6-2"), Some(Side::PlayerOne));
        assert_eq!(first_set_winner("3-6 6-4 6-2"), Some(Side::PlayerTwo));
        assert_eq!(first_set_winner("6-7(4) 6-4 6-2"), Some(Side::PlayerTwo));
    }

    #[test]
    fn test_first_set_winner_missing() {
        assert_eq!(first_set_winner(""), None);
        assert_eq!(first_set_winner("W/O"), None);
        assert_eq!(first_set_winner("6-6"), None);
        assert_eq!(first_set_winner("six-four"), None);
    }

    #[test]
    fn test_games_class_buckets() {
        assert_eq!(games_class(15).unwrap().to_string(), "15-18");
        assert_eq!(games_class(18).unwrap().to_string(), "15-18");
        assert_eq!(games_class(19).unwrap().to_string(), "19-22");
        assert_eq!(games_class(38).unwrap().to_string(), "35-38");
        assert_eq!(games_class(14), None);
        assert_eq!(games_class(39), None);
        assert_eq!(GamesClass::all().len(), 6);
    }
}
