//! SQLite store for the match ledger and index snapshots

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::ledger::Ledger;
use super::source::{parse_date, MatchSource, RawMatch};
use crate::features::elo::{EloConfig, EloTable};
use crate::features::form::{FormEntry, FormTracker};
use crate::features::h2h::{H2HEntry, H2HIndex, PairKey};
use crate::{PlayerId, Result, TennisError};

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                tournament TEXT,
                series TEXT,
                court TEXT,
                surface TEXT,
                round TEXT,
                best_of INTEGER,
                player_1 TEXT NOT NULL,
                player_2 TEXT NOT NULL,
                winner TEXT NOT NULL,
                rank_1 INTEGER,
                rank_2 INTEGER,
                pts_1 INTEGER,
                pts_2 INTEGER,
                odd_1 REAL,
                odd_2 REAL,
                score TEXT,
                UNIQUE(date, player_1, player_2)
            );

            CREATE TABLE IF NOT EXISTS h2h (
                player_a TEXT NOT NULL,
                player_b TEXT NOT NULL,
                wins_a INTEGER NOT NULL,
                wins_b INTEGER NOT NULL,
                PRIMARY KEY (player_a, player_b)
            );

            CREATE TABLE IF NOT EXISTS form (
                player TEXT NOT NULL,
                seq INTEGER NOT NULL,
                date TEXT NOT NULL,
                won INTEGER NOT NULL,
                games_won INTEGER,
                games_lost INTEGER,
                PRIMARY KEY (player, seq)
            );

            CREATE TABLE IF NOT EXISTS elo (
                player TEXT PRIMARY KEY,
                rating REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(date);
            CREATE INDEX IF NOT EXISTS idx_matches_players ON matches(player_1, player_2);
            "#,
        )?;
        Ok(())
    }

    // ==================== Match Operations ====================

    /// Insert or update every ledger match, returning the number written
    pub fn save_ledger(&self, ledger: &Ledger) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO matches (date, tournament, series, court, surface, round, best_of,
                                     player_1, player_2, winner, rank_1, rank_2, pts_1, pts_2,
                                     odd_1, odd_2, score)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                ON CONFLICT(date, player_1, player_2) DO UPDATE SET
                    winner = excluded.winner,
                    score = COALESCE(excluded.score, score),
                    odd_1 = COALESCE(excluded.odd_1, odd_1),
                    odd_2 = COALESCE(excluded.odd_2, odd_2)
                "#,
            )?;
            for record in ledger {
                let fx = &record.fixture;
                stmt.execute(params![
                    fx.date.format("%Y-%m-%d").to_string(),
                    fx.tournament,
                    fx.series,
                    fx.court,
                    fx.surface.map(|s| s.name()),
                    fx.round,
                    fx.best_of,
                    fx.player_1.as_str(),
                    fx.player_2.as_str(),
                    record.winner_id().as_str(),
                    fx.rank_1,
                    fx.rank_2,
                    fx.points_1,
                    fx.points_2,
                    fx.odds_1,
                    fx.odds_2,
                    record.score,
                ])?;
                count += 1;
            }
        }
        tx.commit()?;
        log::debug!("Saved {} matches", count);
        Ok(count)
    }

    /// Stored matches as raw rows, in date then insertion order
    pub fn get_all_matches(&self) -> Result<Vec<RawMatch>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, tournament, series, court, surface, round, best_of,
                    player_1, player_2, winner, rank_1, rank_2, pts_1, pts_2,
                    odd_1, odd_2, score
             FROM matches
             ORDER BY date, id",
        )?;

        let rows = stmt
            .query_map([], Self::row_to_raw)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Rebuild the ledger from stored matches
    pub fn load_ledger(&self) -> Result<Ledger> {
        Ledger::from_source(self)
    }

    fn row_to_raw(row: &rusqlite::Row) -> rusqlite::Result<RawMatch> {
        let best_of: Option<i64> = row.get(6)?;
        let rank_1: Option<i64> = row.get(10)?;
        let rank_2: Option<i64> = row.get(11)?;
        let pts_1: Option<i64> = row.get(12)?;
        let pts_2: Option<i64> = row.get(13)?;
        Ok(RawMatch {
            date: row.get(0)?,
            tournament: row.get(1)?,
            series: row.get(2)?,
            court: row.get(3)?,
            surface: row.get(4)?,
            round: row.get(5)?,
            best_of: best_of.map(|v| v as f64),
            player_1: row.get(7)?,
            player_2: row.get(8)?,
            winner: row.get(9)?,
            rank_1: rank_1.map(|v| v as f64),
            rank_2: rank_2.map(|v| v as f64),
            pts_1: pts_1.map(|v| v as f64),
            pts_2: pts_2.map(|v| v as f64),
            odd_1: row.get(14)?,
            odd_2: row.get(15)?,
            score: row.get(16)?,
        })
    }

    // ==================== Index Snapshots ====================

    /// Replace the stored head-to-head snapshot
    pub fn save_h2h(&self, index: &H2HIndex) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM h2h", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO h2h (player_a, player_b, wins_a, wins_b) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (key, entry) in index.entries() {
                stmt.execute(params![
                    key.first().as_str(),
                    key.second().as_str(),
                    entry.first_wins,
                    entry.second_wins,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_h2h(&self) -> Result<H2HIndex> {
        let mut stmt = self
            .conn
            .prepare("SELECT player_a, player_b, wins_a, wins_b FROM h2h")?;

        let entries = stmt
            .query_map([], |row| {
                let a = PlayerId(row.get(0)?);
                let b = PlayerId(row.get(1)?);
                let wins_a: u32 = row.get(2)?;
                let wins_b: u32 = row.get(3)?;
                // Re-canonicalise in case the row was written out of order
                let key = PairKey::new(&a, &b);
                let entry = if key.first() == &a {
                    H2HEntry {
                        first_wins: wins_a,
                        second_wins: wins_b,
                    }
                } else {
                    H2HEntry {
                        first_wins: wins_b,
                        second_wins: wins_a,
                    }
                };
                Ok((key, entry))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(H2HIndex::from_entries(entries))
    }

    /// Replace the stored form snapshot
    pub fn save_form(&self, tracker: &FormTracker) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM form", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO form (player, seq, date, won, games_won, games_lost)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for player in tracker.players() {
                for (seq, entry) in tracker.history(player).iter().enumerate() {
                    stmt.execute(params![
                        player.as_str(),
                        seq as i64,
                        entry.date.format("%Y-%m-%d").to_string(),
                        entry.won,
                        entry.games_won,
                        entry.games_lost,
                    ])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_form(&self) -> Result<FormTracker> {
        let mut stmt = self.conn.prepare(
            "SELECT player, date, won, games_won, games_lost FROM form ORDER BY player, seq",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let player: String = row.get(0)?;
                let date: String = row.get(1)?;
                let won: bool = row.get(2)?;
                let games_won: Option<u32> = row.get(3)?;
                let games_lost: Option<u32> = row.get(4)?;
                Ok((player, date, won, games_won, games_lost))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut history: Vec<(PlayerId, Vec<FormEntry>)> = Vec::new();
        for (player, date, won, games_won, games_lost) in rows {
            let date = parse_date(&date)
                .ok_or_else(|| TennisError::Parse(format!("Bad form date '{}' for {}", date, player)))?;
            let entry = FormEntry {
                date,
                won,
                games_won,
                games_lost,
            };
            match history.last_mut() {
                Some((last, entries)) if last.as_str() == player => entries.push(entry),
                _ => history.push((PlayerId(player), vec![entry])),
            }
        }

        Ok(FormTracker::from_history(history))
    }

    /// Replace the stored Elo ratings
    pub fn save_elo(&self, table: &EloTable) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM elo", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO elo (player, rating) VALUES (?1, ?2)")?;
            for (player, rating) in table.ratings() {
                stmt.execute(params![player.as_str(), rating])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_elo(&self, config: EloConfig) -> Result<EloTable> {
        let mut stmt = self.conn.prepare("SELECT player, rating FROM elo")?;
        let ratings = stmt
            .query_map([], |row| Ok((PlayerId(row.get(0)?), row.get::<_, f64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(EloTable::from_ratings(config, ratings))
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let match_count = count("SELECT COUNT(*) FROM matches")?;
        let player_count = count(
            "SELECT COUNT(*) FROM (SELECT player_1 FROM matches UNION SELECT player_2 FROM matches)",
        )?;
        let h2h_pairs = count("SELECT COUNT(*) FROM h2h")?;
        let form_players = count("SELECT COUNT(DISTINCT player) FROM form")?;
        let rated_players = count("SELECT COUNT(*) FROM elo")?;

        let min_date: Option<String> = self
            .conn
            .query_row("SELECT MIN(date) FROM matches", [], |row| row.get(0))
            .optional()?
            .flatten();

        let max_date: Option<String> = self
            .conn
            .query_row("SELECT MAX(date) FROM matches", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            match_count,
            player_count,
            h2h_pairs,
            form_players,
            rated_players,
            earliest_match: min_date.as_deref().and_then(parse_date),
            latest_match: max_date.as_deref().and_then(parse_date),
        })
    }
}

impl MatchSource for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn fetch_matches(&self) -> Result<Vec<RawMatch>> {
        self.get_all_matches()
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub match_count: usize,
    pub player_count: usize,
    pub h2h_pairs: usize,
    pub form_players: usize,
    pub rated_players: usize,
    pub earliest_match: Option<NaiveDate>,
    pub latest_match: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fixture, MatchRecord, Side, Surface};

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn make_match(p1: &str, p2: &str, winner: Side, offset: i64) -> MatchRecord {
        MatchRecord::new(Fixture::new(day(offset), p1.into(), p2.into()), winner)
            .with_score("6-4 6-3")
    }

    fn sample_ledger() -> Ledger {
        Ledger::from_records(vec![
            make_match("A", "B", Side::PlayerOne, 0),
            make_match("B", "A", Side::PlayerOne, 10),
            make_match("A", "B", Side::PlayerOne, 20),
            make_match("C", "A", Side::PlayerTwo, 20),
        ])
    }

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.match_count, 0);
        assert_eq!(stats.player_count, 0);
        assert_eq!(stats.earliest_match, None);
    }

    #[test]
    fn test_empty_database_has_no_ledger() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(db.load_ledger(), Err(TennisError::EmptyLedger)));
    }

    #[test]
    fn test_ledger_roundtrip() {
        let db = Database::in_memory().unwrap();
        let mut ledger = sample_ledger();
        let mut extra = make_match("D", "E", Side::PlayerTwo, 30);
        extra.fixture.surface = Some(Surface::Grass);
        extra.fixture.rank_1 = Some(12);
        extra.fixture.odds_2 = Some(2.4);
        extra.fixture.round = Some("Final".to_string());
        ledger.append(extra).unwrap();

        assert_eq!(db.save_ledger(&ledger).unwrap(), 5);
        let loaded = db.load_ledger().unwrap();
        assert_eq!(loaded, ledger);

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.match_count, 5);
        assert_eq!(stats.player_count, 5);
        assert_eq!(stats.earliest_match, Some(day(0)));
        assert_eq!(stats.latest_match, Some(day(30)));
    }

    #[test]
    fn test_save_ledger_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.save_ledger(&sample_ledger()).unwrap();
        db.save_ledger(&sample_ledger()).unwrap();
        assert_eq!(db.get_stats().unwrap().match_count, 4);
    }

    #[test]
    fn test_h2h_snapshot_roundtrip() {
        let db = Database::in_memory().unwrap();
        let index = H2HIndex::build(&sample_ledger());
        db.save_h2h(&index).unwrap();
        let loaded = db.load_h2h().unwrap();
        let (a, b) = (PlayerId::new("A"), PlayerId::new("B"));
        assert_eq!(loaded.lookup(&b, &a), (1, 2));
        assert_eq!(loaded.len(), index.len());
        assert_eq!(db.get_stats().unwrap().h2h_pairs, 2);
    }

    #[test]
    fn test_form_snapshot_roundtrip() {
        let db = Database::in_memory().unwrap();
        let tracker = FormTracker::build(&sample_ledger());
        db.save_form(&tracker).unwrap();
        let loaded = db.load_form().unwrap();
        for player in ["A", "B", "C"] {
            let p = PlayerId::new(player);
            assert_eq!(loaded.history(&p), tracker.history(&p));
        }
        assert_eq!(
            loaded.query_fixed_window(&PlayerId::new("A"), day(21), 5),
            tracker.query_fixed_window(&PlayerId::new("A"), day(21), 5)
        );
    }

    #[test]
    fn test_elo_snapshot_roundtrip() {
        let db = Database::in_memory().unwrap();
        let mut table = EloTable::default();
        table.replay(&sample_ledger());
        db.save_elo(&table).unwrap();
        let loaded = db.load_elo(EloConfig::default()).unwrap();
        for player in ["A", "B", "C", "Unseen"] {
            let p = PlayerId::new(player);
            assert_eq!(loaded.get_rating(&p), table.get_rating(&p));
        }
        assert_eq!(db.get_stats().unwrap().rated_players, 3);
    }
}
