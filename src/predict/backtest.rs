//! Walk-forward backtest
//!
//! Indices are frozen at the start of the test window: every match inside the
//! window is scored from history dated strictly before `start`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::metrics::EvaluationMetrics;
use super::oracle::ProbabilityOracle;
use super::prediction::{predict_fixture, MatchPrediction};
use crate::data::Ledger;
use crate::features::elo::EloTable;
use crate::features::enrich::enrich_all;
use crate::features::form::FormTracker;
use crate::features::h2h::H2HIndex;
use crate::staking::simulator::{simulate, BankrollSummary, BetCandidate, StakeStep};
use crate::{Config, Fixture, Result, Side, TennisError};

/// Everything a backtest run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub oracle: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Matches the indices were built from
    pub history_matches: usize,
    pub predictions: Vec<MatchPrediction>,
    pub steps: Vec<StakeStep>,
    pub summary: BankrollSummary,
    pub metrics: EvaluationMetrics,
}

/// Score and stake every match dated within `[start, end]`
pub fn run_backtest(
    ledger: &Ledger,
    oracle: &dyn ProbabilityOracle,
    config: &Config,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BacktestReport> {
    let history = ledger.before(start);
    let window = ledger.between(start, end);
    if window.is_empty() {
        return Err(TennisError::EmptyLedger);
    }

    log::info!(
        "Backtest {} to {}: {} history matches, {} test matches",
        start,
        end,
        history.len(),
        window.len()
    );

    let h2h = H2HIndex::build_before(ledger, start);
    let form = FormTracker::build(&history);
    let mut elo = EloTable::new(config.elo.clone());
    elo.replay(&history);

    let fixtures: Vec<Fixture> = window.iter().map(|r| r.fixture.clone()).collect();
    let features = enrich_all(&fixtures, &h2h, &form, Some(&elo), &config.form);

    let predictions = fixtures
        .iter()
        .zip(&features)
        .map(|(fixture, fv)| predict_fixture(fixture, fv, oracle))
        .collect::<Result<Vec<_>>>()?;

    let candidates: Vec<BetCandidate> = window
        .iter()
        .zip(&predictions)
        .map(|(record, pred)| {
            BetCandidate::for_fixture(&record.fixture, pred.prob_player_1, Some(record.winner))
        })
        .collect();
    let steps = simulate(&candidates, &config.staking)?;
    let summary = BankrollSummary::from_steps(&steps, config.staking.starting_bankroll);

    let metrics = EvaluationMetrics::from_outcomes(
        window
            .iter()
            .zip(&predictions)
            .map(|(record, pred)| (pred.prob_player_1, record.winner == Side::PlayerOne)),
    );

    log::info!("{}", metrics);
    log::info!(
        "Bankroll {:.2} -> {:.2} over {} bets (ROI {:.2}%)",
        summary.starting_bankroll,
        summary.final_bankroll,
        summary.bets_placed,
        summary.roi * 100.0
    );

    Ok(BacktestReport {
        oracle: oracle.name().to_string(),
        start,
        end,
        history_matches: history.len(),
        predictions,
        steps,
        summary,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::enrich::{Feature, FeatureVector};
    use crate::predict::oracle::EloOracle;
    use crate::MatchRecord;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn make_match(p1: &str, p2: &str, winner: Side, offset: i64, odds: (f64, f64)) -> MatchRecord {
        let mut fixture = Fixture::new(day(offset), p1.into(), p2.into());
        fixture.odds_1 = Some(odds.0);
        fixture.odds_2 = Some(odds.1);
        MatchRecord::new(fixture, winner)
    }

    fn sample_ledger() -> Ledger {
        Ledger::from_records(vec![
            make_match("A", "B", Side::PlayerOne, 0, (1.9, 1.9)),
            make_match("A", "C", Side::PlayerOne, 2, (1.9, 1.9)),
            make_match("A", "D", Side::PlayerOne, 4, (1.9, 1.9)),
            make_match("A", "B", Side::PlayerOne, 10, (2.2, 1.7)),
            make_match("B", "A", Side::PlayerOne, 11, (2.5, 1.5)),
            make_match("E", "F", Side::PlayerTwo, 12, (1.8, 2.0)),
        ])
    }

    #[test]
    fn test_backtest_uses_frozen_history() {
        let ledger = sample_ledger();
        let config = Config::default();
        let report = run_backtest(&ledger, &EloOracle, &config, day(10), day(20)).unwrap();

        assert_eq!(report.history_matches, 3);
        assert_eq!(report.predictions.len(), 3);
        assert_eq!(report.steps.len(), 3);

        // Both A-B rows see the same frozen ratings
        let p0 = report.predictions[0].prob_player_1;
        let p1 = report.predictions[1].prob_player_2;
        assert!((p0 - p1).abs() < 1e-12);
        assert!(p0 > 0.5);

        // E and F have no history, so the third row is a coin flip
        assert!((report.predictions[2].prob_player_1 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_backtest_bankroll_and_metrics() {
        let ledger = sample_ledger();
        let config = Config::default();
        let report = run_backtest(&ledger, &EloOracle, &config, day(10), day(20)).unwrap();

        let gains: f64 = report.steps.iter().filter_map(|s| s.realized_gain).sum();
        assert!((report.summary.final_bankroll - (100.0 + gains)).abs() < 1e-9);
        assert_eq!(report.metrics.count, 3);
        // A wins day 10 (picked), loses day 11 (picked), the coin flip picks E who loses
        assert!((report.metrics.accuracy() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.oracle, "elo");
    }

    #[test]
    fn test_backtest_h2h_ignores_window_matches() {
        struct H2HOracle;

        impl ProbabilityOracle for H2HOracle {
            fn name(&self) -> &str {
                "h2h"
            }
            fn required_features(&self) -> &[Feature] {
                &[Feature::H2hP1, Feature::H2hP2]
            }
            fn class_labels(&self) -> &[u8] {
                &[0, 1]
            }
            fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>> {
                let h1 = features.get(Feature::H2hP1).unwrap_or(0.0);
                let h2 = features.get(Feature::H2hP2).unwrap_or(0.0);
                let p = (h1 + 1.0) / (h1 + h2 + 2.0);
                Ok(vec![1.0 - p, p])
            }
        }

        let report =
            run_backtest(&sample_ledger(), &H2HOracle, &Config::default(), day(10), day(20)).unwrap();
        // Only the day 0 A-B match counts for both window rows
        assert!((report.predictions[0].prob_player_1 - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.predictions[1].prob_player_1 - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.predictions[2].prob_player_1, 0.5);
    }

    #[test]
    fn test_backtest_empty_window() {
        let ledger = sample_ledger();
        let result = run_backtest(&ledger, &EloOracle, &Config::default(), day(50), day(60));
        assert!(matches!(result, Err(TennisError::EmptyLedger)));
    }

    #[test]
    fn test_backtest_rejects_bad_oracle_output() {
        struct Broken;

        impl ProbabilityOracle for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn required_features(&self) -> &[Feature] {
                &[]
            }
            fn class_labels(&self) -> &[u8] {
                &[0, 1]
            }
            fn predict_proba(&self, _features: &FeatureVector) -> Result<Vec<f64>> {
                Ok(vec![-0.5, 1.5])
            }
        }

        let result = run_backtest(&sample_ledger(), &Broken, &Config::default(), day(10), day(20));
        assert!(matches!(result, Err(TennisError::OracleContractViolation(_))));
    }
}
