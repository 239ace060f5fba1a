//! Feature enrichment for a single match row
//!
//! Pure functions of a fixture and the pre-built indices. Features whose
//! source columns are missing are left out, so the vector is variable-width;
//! a probability model declares which features it needs.

use rayon::prelude::*;
use std::fmt;

use super::elo::{EloConfig, EloTable, PreMatchElo};
use super::form::{FormConfig, FormTracker};
use super::h2h::H2HIndex;
use crate::data::Ledger;
use crate::Fixture;

/// Every feature enrichment can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    RankDiff,
    PtsDiff,
    AvgRank,
    OddsRatio,
    BookFav,
    OddsDiff,
    RoundOrdinal,
    H2hP1,
    H2hP2,
    H2hDiff,
    WinsLast5P1,
    WinsLast5P2,
    FormDiff,
    FormScoreP1,
    FormScoreP2,
    FormScoreDiff,
    WinRateP1,
    WinRateP2,
    WinRateDiff,
    AvgGamesDiffDiff,
    MatchesLast30dP1,
    MatchesLast30dP2,
    MatchesLast30dDiff,
    EloP1,
    EloP2,
    EloDiff,
    EloProbP1,
}

impl Feature {
    pub const COUNT: usize = 27;

    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::RankDiff,
        Feature::PtsDiff,
        Feature::AvgRank,
        Feature::OddsRatio,
        Feature::BookFav,
        Feature::OddsDiff,
        Feature::RoundOrdinal,
        Feature::H2hP1,
        Feature::H2hP2,
        Feature::H2hDiff,
        Feature::WinsLast5P1,
        Feature::WinsLast5P2,
        Feature::FormDiff,
        Feature::FormScoreP1,
        Feature::FormScoreP2,
        Feature::FormScoreDiff,
        Feature::WinRateP1,
        Feature::WinRateP2,
        Feature::WinRateDiff,
        Feature::AvgGamesDiffDiff,
        Feature::MatchesLast30dP1,
        Feature::MatchesLast30dP2,
        Feature::MatchesLast30dDiff,
        Feature::EloP1,
        Feature::EloP2,
        Feature::EloDiff,
        Feature::EloProbP1,
    ];

    /// Column name used in exported tables and fitted-model files
    pub fn name(&self) -> &'static str {
        match self {
            Feature::RankDiff => "Rank_Diff",
            Feature::PtsDiff => "Pts_Diff",
            Feature::AvgRank => "Avg_Rank",
            Feature::OddsRatio => "Odds_Ratio",
            Feature::BookFav => "Book_Fav",
            Feature::OddsDiff => "Odds_Diff",
            Feature::RoundOrdinal => "Round_Ordinal",
            Feature::H2hP1 => "H2H_P1",
            Feature::H2hP2 => "H2H_P2",
            Feature::H2hDiff => "H2H_Diff",
            Feature::WinsLast5P1 => "Wins_Last5_P1",
            Feature::WinsLast5P2 => "Wins_Last5_P2",
            Feature::FormDiff => "Form_Diff",
            Feature::FormScoreP1 => "Form_Score_P1",
            Feature::FormScoreP2 => "Form_Score_P2",
            Feature::FormScoreDiff => "Form_Score_Diff",
            Feature::WinRateP1 => "WinRate_Last5_P1",
            Feature::WinRateP2 => "WinRate_Last5_P2",
            Feature::WinRateDiff => "WinRate_Diff",
            Feature::AvgGamesDiffDiff => "AvgGamesDiff_Diff",
            Feature::MatchesLast30dP1 => "Matches_Last30D_P1",
            Feature::MatchesLast30dP2 => "Matches_Last30D_P2",
            Feature::MatchesLast30dDiff => "Matches_Last30D_Diff",
            Feature::EloP1 => "Elo_P1",
            Feature::EloP2 => "Elo_P2",
            Feature::EloDiff => "Elo_Diff",
            Feature::EloProbP1 => "Elo_Prob_P1",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.iter().copied().find(|f| f.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived features for one match row; absent entries were not computable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    values: [Option<f64>; Feature::COUNT],
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.values[feature.index()] = Some(value);
    }

    fn set_opt(&mut self, feature: Feature, value: Option<f64>) {
        self.values[feature.index()] = value;
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.get(feature).is_some()
    }

    /// Present features in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL
            .iter()
            .filter_map(|f| self.get(*f).map(|v| (*f, v)))
    }

    /// Number of present features
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values for the requested features in order, or the first missing one
    pub fn select(&self, features: &[Feature]) -> std::result::Result<Vec<f64>, Feature> {
        features
            .iter()
            .map(|f| self.get(*f).ok_or(*f))
            .collect()
    }
}

/// Ordinal of a competition round; unknown labels are missing
pub fn round_ordinal(round: &str) -> Option<u8> {
    match round.trim() {
        "1st Round" => Some(1),
        "2nd Round" => Some(2),
        "3rd Round" => Some(3),
        "4th Round" => Some(4),
        "Quarterfinal" | "Quarterfinals" => Some(5),
        "Semifinal" | "Semifinals" => Some(6),
        "Final" | "The Final" => Some(7),
        _ => None,
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Compute the feature vector for one fixture
///
/// Reads the indices but never updates them; Elo features are only emitted
/// when a rating table is supplied.
pub fn enrich(
    fixture: &Fixture,
    h2h: &H2HIndex,
    form: &FormTracker,
    elo: Option<&EloTable>,
    config: &FormConfig,
) -> FeatureVector {
    let mut fv = FeatureVector::default();
    let (p1, p2) = (&fixture.player_1, &fixture.player_2);

    // Rankings
    if let (Some(r1), Some(r2)) = (fixture.rank_1, fixture.rank_2) {
        fv.set(Feature::RankDiff, r1 as f64 - r2 as f64);
        fv.set(Feature::AvgRank, (r1 as f64 + r2 as f64) / 2.0);
    }
    if let (Some(pts1), Some(pts2)) = (fixture.points_1, fixture.points_2) {
        fv.set(Feature::PtsDiff, pts1 as f64 - pts2 as f64);
    }

    // Bookmaker odds
    if let (Some(o1), Some(o2)) = (positive(fixture.odds_1), positive(fixture.odds_2)) {
        fv.set(Feature::OddsRatio, o1 / o2);
        fv.set(Feature::BookFav, if o1 < o2 { 1.0 } else { 0.0 });
        fv.set(Feature::OddsDiff, (o1 - o2).abs());
    }

    fv.set_opt(
        Feature::RoundOrdinal,
        fixture.round.as_deref().and_then(round_ordinal).map(f64::from),
    );

    // Head-to-head, oriented to player_1 / player_2
    let (h1, h2) = h2h.lookup(p1, p2);
    fv.set(Feature::H2hP1, h1 as f64);
    fv.set(Feature::H2hP2, h2 as f64);
    fv.set(Feature::H2hDiff, h1 as f64 - h2 as f64);

    // Form: fixed-window win count and decayed score
    let wins_1 = form.query_fixed_window(p1, fixture.date, config.window);
    let wins_2 = form.query_fixed_window(p2, fixture.date, config.window);
    fv.set(Feature::WinsLast5P1, wins_1 as f64);
    fv.set(Feature::WinsLast5P2, wins_2 as f64);
    fv.set(Feature::FormDiff, wins_1 as f64 - wins_2 as f64);

    let score_1 = form.query_decayed(p1, fixture.date, config.decay_alpha, config.horizon_days);
    let score_2 = form.query_decayed(p2, fixture.date, config.decay_alpha, config.horizon_days);
    fv.set(Feature::FormScoreP1, score_1);
    fv.set(Feature::FormScoreP2, score_2);
    fv.set(Feature::FormScoreDiff, score_1 - score_2);

    // Rolling win rate, games differential and schedule density
    let stats_1 = form.recent_stats(p1, fixture.date, config.window, config.density_days);
    let stats_2 = form.recent_stats(p2, fixture.date, config.window, config.density_days);
    fv.set(Feature::WinRateP1, stats_1.win_rate);
    fv.set(Feature::WinRateP2, stats_2.win_rate);
    fv.set(Feature::WinRateDiff, stats_1.win_rate - stats_2.win_rate);
    if let (Some(g1), Some(g2)) = (stats_1.avg_games_diff, stats_2.avg_games_diff) {
        fv.set(Feature::AvgGamesDiffDiff, g1 - g2);
    }
    let (m1, m2) = (
        stats_1.matches_in_density_window as f64,
        stats_2.matches_in_density_window as f64,
    );
    fv.set(Feature::MatchesLast30dP1, m1);
    fv.set(Feature::MatchesLast30dP2, m2);
    fv.set(Feature::MatchesLast30dDiff, m1 - m2);

    if let Some(table) = elo {
        set_elo(&mut fv, &table.pre_match(p1, p2));
    }

    fv
}

fn set_elo(fv: &mut FeatureVector, elo: &PreMatchElo) {
    fv.set(Feature::EloP1, elo.rating_1);
    fv.set(Feature::EloP2, elo.rating_2);
    fv.set(Feature::EloDiff, elo.rating_1 - elo.rating_2);
    fv.set(Feature::EloProbP1, elo.prob_player_1);
}

/// Feature vectors for every ledger match, each built only from its past
///
/// Head-to-head counts include matches dated strictly before the row. Elo
/// features are the ratings as they stood just before the row was applied,
/// so earlier matches on the same day are already folded in. One vector per
/// record, in ledger order.
pub fn enrich_history(
    ledger: &Ledger,
    elo_config: EloConfig,
    config: &FormConfig,
) -> Vec<FeatureVector> {
    let form = FormTracker::build(ledger);
    let snapshots = EloTable::new(elo_config).replay_recording(ledger);
    let records = ledger.records();

    let mut h2h = H2HIndex::default();
    let mut counted = 0;
    records
        .iter()
        .zip(&snapshots)
        .map(|(record, elo)| {
            while counted < records.len() && records[counted].date() < record.date() {
                h2h.record(&records[counted]);
                counted += 1;
            }
            let mut fv = enrich(&record.fixture, &h2h, &form, None, config);
            set_elo(&mut fv, elo);
            fv
        })
        .collect()
}

/// Enrich many fixtures in parallel; output order matches input order
pub fn enrich_all(
    fixtures: &[Fixture],
    h2h: &H2HIndex,
    form: &FormTracker,
    elo: Option<&EloTable>,
    config: &FormConfig,
) -> Vec<FeatureVector> {
    fixtures
        .par_iter()
        .map(|fixture| enrich(fixture, h2h, form, elo, config))
        .collect()
}
