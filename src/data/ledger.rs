//! Chronological match ledger
//!
//! The ledger is the single source every index is built from. Records are
//! kept sorted by date; matches on the same date keep their source order so
//! order-dependent folds (Elo, bankroll) are reproducible.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use super::source::{MatchSource, RawMatch};
use crate::{MatchRecord, PlayerId, Result, TennisError};

/// Outcome of validating a batch of raw rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub total_rows: usize,
    pub accepted: usize,
    /// `(row index, reason)` for every excluded row
    pub rejected: Vec<(usize, String)>,
}

impl IngestReport {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Append-only, date-ordered sequence of completed matches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    records: Vec<MatchRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    /// Sort records by date; ties keep their input order
    pub fn from_records(mut records: Vec<MatchRecord>) -> Self {
        records.sort_by_key(|r| r.date());
        Ledger { records }
    }

    /// Validate raw rows, excluding (and logging) malformed ones
    pub fn ingest(rows: Vec<RawMatch>) -> (Self, IngestReport) {
        let mut report = IngestReport {
            total_rows: rows.len(),
            ..Default::default()
        };

        let mut records = Vec::with_capacity(rows.len());
        for (row, raw) in rows.iter().enumerate() {
            match raw.to_record(row) {
                Ok(record) => records.push(record),
                Err(TennisError::MalformedRecord { row, reason }) => {
                    log::warn!("Skipping row {}: {}", row, reason);
                    report.rejected.push((row, reason));
                }
                Err(e) => {
                    log::warn!("Skipping row {}: {}", row, e);
                    report.rejected.push((row, e.to_string()));
                }
            }
        }
        report.accepted = records.len();

        if report.rejected_count() > 0 {
            log::warn!(
                "Excluded {} of {} rows as malformed",
                report.rejected_count(),
                report.total_rows
            );
        }

        (Ledger::from_records(records), report)
    }

    /// Fetch and validate every row of a source
    ///
    /// A source with no valid match is an error: nothing can be built from it.
    pub fn from_source(source: &dyn MatchSource) -> Result<Self> {
        let rows = source.fetch_matches()?;
        let (ledger, report) = Ledger::ingest(rows);
        log::info!(
            "Ingested {} matches from {} ({} rejected)",
            report.accepted,
            source.name(),
            report.rejected_count()
        );
        if ledger.is_empty() {
            return Err(TennisError::EmptyLedger);
        }
        Ok(ledger)
    }

    /// Append a newer match; earlier dates are rejected
    pub fn append(&mut self, record: MatchRecord) -> Result<()> {
        if let Some(last) = self.last_date() {
            if record.date() < last {
                return Err(TennisError::OutOfOrder {
                    date: record.date(),
                    last,
                });
            }
        }
        self.records.push(record);
        Ok(())
    }

    /// Matches dated strictly before `date`
    pub fn before(&self, date: NaiveDate) -> Ledger {
        let end = self.records.partition_point(|r| r.date() < date);
        Ledger {
            records: self.records[..end].to_vec(),
        }
    }

    /// Matches dated within `[start, end]`
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Ledger {
        let lo = self.records.partition_point(|r| r.date() < start);
        let hi = self.records.partition_point(|r| r.date() <= end);
        Ledger {
            records: self.records[lo..hi.max(lo)].to_vec(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date())
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date())
    }

    /// Every player that appears in the ledger
    pub fn players(&self) -> BTreeSet<&PlayerId> {
        self.records
            .iter()
            .flat_map(|r| [r.player_1(), r.player_2()])
            .collect()
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a MatchRecord;
    type IntoIter = std::slice::Iter<'a, MatchRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fixture, Side};

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn make_match(p1: &str, p2: &str, offset: i64) -> MatchRecord {
        MatchRecord::new(Fixture::new(day(offset), p1.into(), p2.into()), Side::PlayerOne)
    }

    fn raw(p1: &str, p2: &str, winner: &str, date: &str) -> RawMatch {
        RawMatch {
            date: Some(date.to_string()),
            player_1: Some(p1.to_string()),
            player_2: Some(p2.to_string()),
            winner: Some(winner.to_string()),
            ..Default::default()
        }
    }

    struct VecSource(Vec<RawMatch>);

    impl MatchSource for VecSource {
        fn name(&self) -> &str {
            "memory"
        }

        fn fetch_matches(&self) -> Result<Vec<RawMatch>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_sort_is_stable_for_same_day() {
        let ledger = Ledger::from_records(vec![
            make_match("C", "D", 5),
            make_match("A", "B", 1),
            make_match("E", "F", 5),
            make_match("G", "H", 5),
        ]);
        let order: Vec<&str> = ledger.iter().map(|r| r.player_1().as_str()).collect();
        assert_eq!(order, vec!["A", "C", "E", "G"]);
    }

    #[test]
    fn test_ingest_excludes_and_counts_malformed() {
        let rows = vec![
            raw("A", "B", "A", "2024-01-03"),
            raw("A", "B", "Z", "2024-01-02"),
            raw("B", "C", "C", "not a date"),
            raw("C", "A", "A", "2024-01-01"),
        ];
        let (ledger, report) = Ledger::ingest(rows);
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected_count(), 2);
        assert_eq!(report.rejected[0].0, 1);
        assert_eq!(report.rejected[1].0, 2);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.first_date(), Some(day(0)));
    }

    #[test]
    fn test_from_source_requires_valid_rows() {
        let source = VecSource(vec![raw("A", "B", "C", "2024-01-01")]);
        assert!(matches!(
            Ledger::from_source(&source),
            Err(TennisError::EmptyLedger)
        ));

        let source = VecSource(vec![raw("A", "B", "B", "2024-01-01")]);
        assert_eq!(Ledger::from_source(&source).unwrap().len(), 1);
    }

    #[test]
    fn test_append_rejects_earlier_dates() {
        let mut ledger = Ledger::from_records(vec![make_match("A", "B", 10)]);
        ledger.append(make_match("A", "C", 10)).unwrap();
        ledger.append(make_match("B", "C", 12)).unwrap();
        let err = ledger.append(make_match("C", "D", 11)).unwrap_err();
        assert!(matches!(err, TennisError::OutOfOrder { .. }));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_before_and_between() {
        let ledger = Ledger::from_records(vec![
            make_match("A", "B", 0),
            make_match("A", "C", 10),
            make_match("B", "C", 10),
            make_match("C", "D", 20),
        ]);
        assert_eq!(ledger.before(day(10)).len(), 1);
        assert_eq!(ledger.before(day(11)).len(), 3);
        assert_eq!(ledger.between(day(10), day(20)).len(), 3);
        assert_eq!(ledger.between(day(10), day(10)).len(), 2);
        assert!(ledger.between(day(21), day(30)).is_empty());
        assert!(ledger.between(day(20), day(5)).is_empty());
    }

    #[test]
    fn test_players() {
        let ledger = Ledger::from_records(vec![make_match("A", "B", 0), make_match("B", "C", 1)]);
        assert_eq!(ledger.players().len(), 3);
    }
}
