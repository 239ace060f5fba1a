//! Match-source providers
//!
//! A provider returns raw rows; validation into ledger records happens in
//! [`RawMatch::to_record`] so every source goes through the same checks.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Fixture, MatchRecord, PlayerId, Result, Surface, TennisError};

/// One match row as supplied by a provider, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMatch {
    pub tournament: Option<String>,
    pub date: Option<String>,
    pub series: Option<String>,
    pub court: Option<String>,
    pub surface: Option<String>,
    pub round: Option<String>,
    pub best_of: Option<f64>,
    pub player_1: Option<String>,
    pub player_2: Option<String>,
    pub winner: Option<String>,
    pub rank_1: Option<f64>,
    pub rank_2: Option<f64>,
    pub pts_1: Option<f64>,
    pub pts_2: Option<f64>,
    pub odd_1: Option<f64>,
    pub odd_2: Option<f64>,
    pub score: Option<String>,
}

/// Parse a source date (`2024-01-15` or `2024-01-15 00:00:00`)
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// The source writes -1 (or 0) for unknown ranks, points and odds
fn positive_count(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as u32)
}

fn positive_odds(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

impl RawMatch {
    /// Build an upcoming-match row; `row` is only used in error reports
    pub fn to_fixture(&self, row: usize) -> Result<Fixture> {
        let malformed = |reason: String| TennisError::MalformedRecord { row, reason };

        let date_text = non_empty(&self.date).ok_or_else(|| malformed("missing date".into()))?;
        let date = parse_date(date_text)
            .ok_or_else(|| malformed(format!("unparseable date '{}'", date_text)))?;

        let player_1 = non_empty(&self.player_1).ok_or_else(|| malformed("missing Player_1".into()))?;
        let player_2 = non_empty(&self.player_2).ok_or_else(|| malformed("missing Player_2".into()))?;
        if player_1 == player_2 {
            return Err(malformed(format!("{} listed on both sides", player_1)));
        }

        let mut fixture = Fixture::new(date, PlayerId::new(player_1), PlayerId::new(player_2));
        fixture.tournament = non_empty(&self.tournament).map(str::to_string);
        fixture.series = non_empty(&self.series).map(str::to_string);
        fixture.court = non_empty(&self.court).map(str::to_string);
        fixture.surface = non_empty(&self.surface).and_then(Surface::from_name);
        fixture.round = non_empty(&self.round).map(str::to_string);
        fixture.best_of = self
            .best_of
            .filter(|b| *b == 3.0 || *b == 5.0)
            .map(|b| b as u8);
        fixture.rank_1 = positive_count(self.rank_1);
        fixture.rank_2 = positive_count(self.rank_2);
        fixture.points_1 = positive_count(self.pts_1);
        fixture.points_2 = positive_count(self.pts_2);
        fixture.odds_1 = positive_odds(self.odd_1);
        fixture.odds_2 = positive_odds(self.odd_2);
        Ok(fixture)
    }

    /// Validate a completed match; the winner must be one of the two players
    pub fn to_record(&self, row: usize) -> Result<MatchRecord> {
        let fixture = self.to_fixture(row)?;
        let winner = non_empty(&self.winner).ok_or_else(|| TennisError::MalformedRecord {
            row,
            reason: "missing Winner".into(),
        })?;

        let side = fixture
            .side_of(&PlayerId::new(winner))
            .ok_or_else(|| TennisError::MalformedRecord {
                row,
                reason: format!(
                    "winner '{}' is neither {} nor {}",
                    winner, fixture.player_1, fixture.player_2
                ),
            })?;

        let record = MatchRecord::new(fixture, side);
        Ok(match non_empty(&self.score) {
            Some(score) => record.with_score(score),
            None => record,
        })
    }

    /// Raw form of a validated record, as stored by persistent sources
    pub fn from_record(record: &MatchRecord) -> Self {
        let fx = &record.fixture;
        RawMatch {
            tournament: fx.tournament.clone(),
            date: Some(fx.date.format("%Y-%m-%d").to_string()),
            series: fx.series.clone(),
            court: fx.court.clone(),
            surface: fx.surface.map(|s| s.name().to_string()),
            round: fx.round.clone(),
            best_of: fx.best_of.map(f64::from),
            player_1: Some(fx.player_1.to_string()),
            player_2: Some(fx.player_2.to_string()),
            winner: Some(record.winner_id().to_string()),
            rank_1: fx.rank_1.map(f64::from),
            rank_2: fx.rank_2.map(f64::from),
            pts_1: fx.points_1.map(f64::from),
            pts_2: fx.points_2.map(f64::from),
            odd_1: fx.odds_1,
            odd_2: fx.odds_2,
            score: record.score.clone(),
        }
    }
}

/// Supplier of historical match rows
pub trait MatchSource {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// All rows the source holds, in source order
    fn fetch_matches(&self) -> Result<Vec<RawMatch>>;
}

/// ATP-style CSV export (`Tournament, Date, ..., Odd_2, Score`)
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        CsvSource {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Convert a loaded frame into raw rows; absent columns read as missing
    pub fn dataframe_to_rows(df: &DataFrame) -> Result<Vec<RawMatch>> {
        let height = df.height();

        let tournament = string_column(df, "Tournament", height)?;
        let date = string_column(df, "Date", height)?;
        let series = string_column(df, "Series", height)?;
        let court = string_column(df, "Court", height)?;
        let surface = string_column(df, "Surface", height)?;
        let round = string_column(df, "Round", height)?;
        let best_of = float_column(df, "Best of", height)?;
        let player_1 = string_column(df, "Player_1", height)?;
        let player_2 = string_column(df, "Player_2", height)?;
        let winner = string_column(df, "Winner", height)?;
        let rank_1 = float_column(df, "Rank_1", height)?;
        let rank_2 = float_column(df, "Rank_2", height)?;
        let pts_1 = float_column(df, "Pts_1", height)?;
        let pts_2 = float_column(df, "Pts_2", height)?;
        let odd_1 = float_column(df, "Odd_1", height)?;
        let odd_2 = float_column(df, "Odd_2", height)?;
        let score = string_column(df, "Score", height)?;

        let rows = (0..height)
            .map(|i| RawMatch {
                tournament: tournament[i].clone(),
                date: date[i].clone(),
                series: series[i].clone(),
                court: court[i].clone(),
                surface: surface[i].clone(),
                round: round[i].clone(),
                best_of: best_of[i],
                player_1: player_1[i].clone(),
                player_2: player_2[i].clone(),
                winner: winner[i].clone(),
                rank_1: rank_1[i],
                rank_2: rank_2[i],
                pts_1: pts_1[i],
                pts_2: pts_2[i],
                odd_1: odd_1[i],
                odd_2: odd_2[i],
                score: score[i].clone(),
            })
            .collect();

        Ok(rows)
    }
}

impl MatchSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_matches(&self) -> Result<Vec<RawMatch>> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(self.path.clone()))?
            .finish()?;

        log::info!(
            "Loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            self.path.display()
        );

        Self::dataframe_to_rows(&df)
    }
}

fn string_column(df: &DataFrame, name: &str, height: usize) -> Result<Vec<Option<String>>> {
    let Ok(column) = df.column(name) else {
        log::debug!("Column {} absent, reading as missing", name);
        return Ok(vec![None; height]);
    };
    let column = column.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn float_column(df: &DataFrame, name: &str, height: usize) -> Result<Vec<Option<f64>>> {
    let Ok(column) = df.column(name) else {
        log::debug!("Column {} absent, reading as missing", name);
        return Ok(vec![None; height]);
    };
    let column = column.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}
