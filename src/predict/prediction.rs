//! Match predictions from frozen indices and a probability oracle

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::oracle::{player_one_probability, ProbabilityOracle};
use crate::data::Ledger;
use crate::features::elo::{EloConfig, EloTable};
use crate::features::enrich::{enrich, enrich_all, Feature, FeatureVector};
use crate::features::form::{FormConfig, FormTracker};
use crate::features::h2h::H2HIndex;
use crate::{Fixture, PlayerId, Result};

/// Forecast for one fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPrediction {
    pub date: NaiveDate,
    pub player_1: PlayerId,
    pub player_2: PlayerId,
    pub prob_player_1: f64,
    pub prob_player_2: f64,
    pub predicted_winner: PlayerId,
    /// Distance from a coin flip, 0 to 100
    pub confidence: f64,
    /// Pre-match Elo probability for `player_1`, when Elo was available
    pub elo_prob: Option<f64>,
}

impl MatchPrediction {
    /// Wrap an oracle probability; `player_1` is the pick at exactly 0.5
    pub fn from_probability(fixture: &Fixture, prob_player_1: f64, elo_prob: Option<f64>) -> Self {
        let predicted_winner = if prob_player_1 >= 0.5 {
            fixture.player_1.clone()
        } else {
            fixture.player_2.clone()
        };
        MatchPrediction {
            date: fixture.date,
            player_1: fixture.player_1.clone(),
            player_2: fixture.player_2.clone(),
            prob_player_1,
            prob_player_2: 1.0 - prob_player_1,
            predicted_winner,
            confidence: (prob_player_1 - 0.5).abs() * 200.0,
            elo_prob,
        }
    }
}

/// Score one already-enriched fixture
pub fn predict_fixture(
    fixture: &Fixture,
    features: &FeatureVector,
    oracle: &dyn ProbabilityOracle,
) -> Result<MatchPrediction> {
    let p = player_one_probability(oracle, features)?;
    Ok(MatchPrediction::from_probability(
        fixture,
        p,
        features.get(Feature::EloProbP1),
    ))
}

/// Indices frozen at a point in time, plus the oracle that scores them
pub struct Predictor {
    h2h: H2HIndex,
    form: FormTracker,
    elo: EloTable,
    form_config: FormConfig,
    oracle: Box<dyn ProbabilityOracle>,
}

impl Predictor {
    pub fn new(
        h2h: H2HIndex,
        form: FormTracker,
        elo: EloTable,
        form_config: FormConfig,
        oracle: Box<dyn ProbabilityOracle>,
    ) -> Self {
        Predictor {
            h2h,
            form,
            elo,
            form_config,
            oracle,
        }
    }

    /// Build every index from the full ledger
    pub fn from_ledger(
        ledger: &Ledger,
        elo_config: EloConfig,
        form_config: FormConfig,
        oracle: Box<dyn ProbabilityOracle>,
    ) -> Self {
        let mut elo = EloTable::new(elo_config);
        elo.replay(ledger);
        Predictor::new(
            H2HIndex::build(ledger),
            FormTracker::build(ledger),
            elo,
            form_config,
            oracle,
        )
    }

    /// Build every index from matches dated strictly before `date`
    pub fn as_of(
        ledger: &Ledger,
        date: NaiveDate,
        elo_config: EloConfig,
        form_config: FormConfig,
        oracle: Box<dyn ProbabilityOracle>,
    ) -> Self {
        Predictor::from_ledger(&ledger.before(date), elo_config, form_config, oracle)
    }

    pub fn oracle(&self) -> &dyn ProbabilityOracle {
        self.oracle.as_ref()
    }

    pub fn features(&self, fixture: &Fixture) -> FeatureVector {
        enrich(fixture, &self.h2h, &self.form, Some(&self.elo), &self.form_config)
    }

    pub fn predict_fixture(&self, fixture: &Fixture) -> Result<MatchPrediction> {
        predict_fixture(fixture, &self.features(fixture), self.oracle())
    }

    /// Enrich in parallel, then score in input order
    pub fn predict_all(&self, fixtures: &[Fixture]) -> Result<Vec<MatchPrediction>> {
        let features = enrich_all(
            fixtures,
            &self.h2h,
            &self.form,
            Some(&self.elo),
            &self.form_config,
        );
        fixtures
            .iter()
            .zip(&features)
            .map(|(fixture, fv)| predict_fixture(fixture, fv, self.oracle()))
            .collect()
    }
}
