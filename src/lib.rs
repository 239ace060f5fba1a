//! Tennis match forecasting
//!
//! Point-in-time player statistics (head-to-head, recent form, Elo) computed
//! from a chronological match ledger, feature enrichment for a probability
//! model, and a Kelly-criterion bankroll simulator.

pub mod data;
pub mod features;
pub mod predict;
pub mod staking;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use features::elo::EloConfig;
pub use features::enrich::Feature;
pub use features::form::FormConfig;
pub use staking::simulator::StakingConfig;

/// Unique identifier for a player (the name as published by the match source)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(name: impl Into<String>) -> Self {
        PlayerId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(name: &str) -> Self {
        PlayerId(name.to_string())
    }
}

/// One side of a match row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    PlayerOne,
    PlayerTwo,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::PlayerOne => Side::PlayerTwo,
            Side::PlayerTwo => Side::PlayerOne,
        }
    }

    /// Binary class label: 1 when `player_1` is on this side
    pub fn label(self) -> u8 {
        match self {
            Side::PlayerOne => 1,
            Side::PlayerTwo => 0,
        }
    }
}

/// Playing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Surface {
    Hard,
    Clay,
    Grass,
    Carpet,
}

impl Surface {
    pub fn name(&self) -> &'static str {
        match self {
            Surface::Hard => "Hard",
            Surface::Clay => "Clay",
            Surface::Grass => "Grass",
            Surface::Carpet => "Carpet",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "hard" => Some(Surface::Hard),
            "clay" => Some(Surface::Clay),
            "grass" => Some(Surface::Grass),
            "carpet" => Some(Surface::Carpet),
            _ => None,
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A match row without a result: everything known before play starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub date: NaiveDate,
    pub player_1: PlayerId,
    pub player_2: PlayerId,
    pub tournament: Option<String>,
    pub series: Option<String>,
    pub court: Option<String>,
    pub surface: Option<Surface>,
    pub round: Option<String>,
    pub best_of: Option<u8>,
    pub rank_1: Option<u32>,
    pub rank_2: Option<u32>,
    pub points_1: Option<u32>,
    pub points_2: Option<u32>,
    /// Decimal odds offered on `player_1`
    pub odds_1: Option<f64>,
    /// Decimal odds offered on `player_2`
    pub odds_2: Option<f64>,
}

impl Fixture {
    /// Fixture with only the mandatory columns filled in
    pub fn new(date: NaiveDate, player_1: PlayerId, player_2: PlayerId) -> Self {
        Fixture {
            date,
            player_1,
            player_2,
            tournament: None,
            series: None,
            court: None,
            surface: None,
            round: None,
            best_of: None,
            rank_1: None,
            rank_2: None,
            points_1: None,
            points_2: None,
            odds_1: None,
            odds_2: None,
        }
    }

    pub fn player(&self, side: Side) -> &PlayerId {
        match side {
            Side::PlayerOne => &self.player_1,
            Side::PlayerTwo => &self.player_2,
        }
    }

    pub fn odds(&self, side: Side) -> Option<f64> {
        match side {
            Side::PlayerOne => self.odds_1,
            Side::PlayerTwo => self.odds_2,
        }
    }

    /// Which side a player is on, if they play in this match
    pub fn side_of(&self, player: &PlayerId) -> Option<Side> {
        if *player == self.player_1 {
            Some(Side::PlayerOne)
        } else if *player == self.player_2 {
            Some(Side::PlayerTwo)
        } else {
            None
        }
    }
}

/// A completed match from the ledger
///
/// The winner is stored as a side of the fixture, so it is always one of the
/// two players. Records are never mutated once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub fixture: Fixture,
    pub winner: Side,
    pub score: Option<String>,
}

impl MatchRecord {
    pub fn new(fixture: Fixture, winner: Side) -> Self {
        MatchRecord {
            fixture,
            winner,
            score: None,
        }
    }

    pub fn with_score(mut self, score: impl Into<String>) -> Self {
        self.score = Some(score.into());
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.fixture.date
    }

    pub fn player_1(&self) -> &PlayerId {
        &self.fixture.player_1
    }

    pub fn player_2(&self) -> &PlayerId {
        &self.fixture.player_2
    }

    pub fn winner_id(&self) -> &PlayerId {
        self.fixture.player(self.winner)
    }

    pub fn loser_id(&self) -> &PlayerId {
        self.fixture.player(self.winner.other())
    }

    /// Check if the given player won this match
    pub fn did_win(&self, player: &PlayerId) -> Option<bool> {
        self.fixture.side_of(player).map(|side| side == self.winner)
    }

    /// Get the opponent for a given player
    pub fn opponent(&self, player: &PlayerId) -> Option<&PlayerId> {
        self.fixture
            .side_of(player)
            .map(|side| self.fixture.player(side.other()))
    }

    /// Games (won, lost) by a player across all sets, when the score parses
    pub fn games_for(&self, player: &PlayerId) -> Option<(u32, u32)> {
        let side = self.fixture.side_of(player)?;
        let (one, two) = features::score::total_games_by_side(self.score.as_deref()?)?;
        match side {
            Side::PlayerOne => Some((one, two)),
            Side::PlayerTwo => Some((two, one)),
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum TennisError {
    #[error("Malformed record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    #[error("Match dated {date} appended after {last}; the ledger is date-ordered")]
    OutOfOrder { date: NaiveDate, last: NaiveDate },

    #[error("No valid matches in the ledger - import match data first")]
    EmptyLedger,

    #[error("Oracle {oracle} requires feature {feature} which is missing for this row")]
    MissingFeature { oracle: String, feature: Feature },

    #[error("Oracle contract violation: {0}")]
    OracleContractViolation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TennisError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub elo: EloConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub staking: StakingConfig,
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub matches_csv: String,
    pub model_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            database_path: "data/tennis.db".to_string(),
            matches_csv: "data/atp_tennis.csv".to_string(),
            model_path: "models/logistic.json".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TennisError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| TennisError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check numeric settings that would otherwise poison the folds
    pub fn validate(&self) -> Result<()> {
        if !self.elo.factor.is_finite() || self.elo.factor <= 0.0 {
            return Err(TennisError::Config(format!(
                "elo.factor must be positive, got {}",
                self.elo.factor
            )));
        }
        if !self.elo.k_factor.is_finite() || !self.elo.initial_rating.is_finite() {
            return Err(TennisError::Config(
                "elo.k_factor and elo.initial_rating must be finite".to_string(),
            ));
        }
        if !self.form.decay_alpha.is_finite() {
            return Err(TennisError::Config(format!(
                "form.decay_alpha must be finite, got {}",
                self.form.decay_alpha
            )));
        }
        self.staking.validate()
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TennisError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_match(p1: &str, p2: &str, winner: Side, score: Option<&str>) -> MatchRecord {
        let fixture = Fixture::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            PlayerId::new(p1),
            PlayerId::new(p2),
        );
        let record = MatchRecord::new(fixture, winner);
        match score {
            Some(s) => record.with_score(s),
            None => record,
        }
    }

    #[test]
    fn test_winner_and_opponent() {
        let m = make_match("Nadal R.", "Federer R.", Side::PlayerTwo, None);
        assert_eq!(m.winner_id().as_str(), "Federer R.");
        assert_eq!(m.loser_id().as_str(), "Nadal R.");
        assert_eq!(m.did_win(&PlayerId::new("Federer R.")), Some(true));
        assert_eq!(m.did_win(&PlayerId::new("Nadal R.")), Some(false));
        assert_eq!(m.did_win(&PlayerId::new("Murray A.")), None);
        assert_eq!(
            m.opponent(&PlayerId::new("Nadal R.")),
            Some(&PlayerId::new("Federer R."))
        );
    }

    #[test]
    fn test_games_for_each_side() {
        let m = make_match("A", "B", Side::PlayerOne, Some("6-4 3-6 7-6(5)"));
        assert_eq!(m.games_for(&PlayerId::new("A")), Some((16, 16)));
        let m = make_match("A", "B", Side::PlayerOne, Some("6-2 6-3"));
        assert_eq!(m.games_for(&PlayerId::new("A")), Some((12, 5)));
        assert_eq!(m.games_for(&PlayerId::new("B")), Some((5, 12)));
        assert_eq!(m.games_for(&PlayerId::new("C")), None);
    }

    #[test]
    fn test_surface_names() {
        assert_eq!(Surface::from_name("clay"), Some(Surface::Clay));
        assert_eq!(Surface::from_name(" Hard "), Some(Surface::Hard));
        assert_eq!(Surface::from_name("Ice"), None);
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.elo.k_factor, 32.0);
        assert_eq!(parsed.form.window, 5);
        assert_eq!(parsed.staking.starting_bankroll, 100.0);
    }

    #[test]
    fn test_load_rejects_nan_staking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        std::fs::write(path, "[staking]\nstarting_bankroll = 100.0\nkelly_multiplier = 1.0\nmax_stake_fraction = nan\n").unwrap();
        assert!(matches!(Config::load(path), Err(TennisError::Config(_))));

        std::fs::write(path, "[staking]\nstarting_bankroll = 100.0\nkelly_multiplier = nan\nmax_stake_fraction = 0.5\n").unwrap();
        assert!(matches!(Config::load(path), Err(TennisError::Config(_))));

        std::fs::write(path, "[staking]\nstarting_bankroll = 100.0\nkelly_multiplier = 0.5\nmax_stake_fraction = 0.5\n").unwrap();
        assert_eq!(Config::load(path).unwrap().staking.kelly_multiplier, 0.5);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[elo]\ninitial_rating = 1600.0\nk_factor = 20.0\nfactor = 400.0\n").unwrap();
        assert_eq!(parsed.elo.initial_rating, 1600.0);
        assert_eq!(parsed.form.horizon_days, 180);
    }
}
