//! Probability oracles: already-fitted models mapping a feature vector to
//! class probabilities
//!
//! An oracle declares the features it needs and the label order of its
//! output; [`player_one_probability`] enforces both before a probability is
//! handed to the staking simulator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::features::enrich::{Feature, FeatureVector};
use crate::{Result, TennisError};

/// Label meaning "`player_1` wins"
pub const PLAYER_ONE_LABEL: u8 = 1;

const SUM_TOLERANCE: f64 = 1e-6;

/// A fitted model producing class probabilities for one match row
pub trait ProbabilityOracle: Send + Sync {
    fn name(&self) -> &str;

    /// Features that must be present in every vector passed to `predict_proba`
    fn required_features(&self) -> &[Feature];

    /// Class label for each position of the `predict_proba` output
    fn class_labels(&self) -> &[u8];

    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>>;
}

/// Probability that `player_1` wins, checked against the oracle's contract
pub fn player_one_probability(
    oracle: &dyn ProbabilityOracle,
    features: &FeatureVector,
) -> Result<f64> {
    if let Some(missing) = oracle
        .required_features()
        .iter()
        .find(|f| !features.contains(**f))
    {
        return Err(TennisError::MissingFeature {
            oracle: oracle.name().to_string(),
            feature: *missing,
        });
    }

    let labels = oracle.class_labels();
    let index = match labels.iter().position(|l| *l == PLAYER_ONE_LABEL) {
        Some(i) if labels.iter().filter(|l| **l == PLAYER_ONE_LABEL).count() == 1 => i,
        _ => {
            return Err(TennisError::OracleContractViolation(format!(
                "{} declares labels {:?}; exactly one must be {}",
                oracle.name(),
                labels,
                PLAYER_ONE_LABEL
            )))
        }
    };

    let proba = oracle.predict_proba(features)?;
    if proba.len() != labels.len() {
        return Err(TennisError::OracleContractViolation(format!(
            "{} returned {} probabilities for {} labels",
            oracle.name(),
            proba.len(),
            labels.len()
        )));
    }
    if let Some(bad) = proba
        .iter()
        .find(|p| !p.is_finite() || !(0.0..=1.0).contains(*p))
    {
        return Err(TennisError::OracleContractViolation(format!(
            "{} returned probability {} outside [0, 1]",
            oracle.name(),
            bad
        )));
    }
    let total: f64 = proba.iter().sum();
    if (total - 1.0).abs() > SUM_TOLERANCE {
        return Err(TennisError::OracleContractViolation(format!(
            "{} probabilities sum to {}",
            oracle.name(),
            total
        )));
    }

    Ok(proba[index])
}

/// Spread `p` (for label 1) over the declared label order
fn binary_proba(labels: &[u8], p: f64) -> Vec<f64> {
    labels
        .iter()
        .map(|l| if *l == PLAYER_ONE_LABEL { p } else { 1.0 - p })
        .collect()
}

/// Uses the pre-match Elo win probability directly
#[derive(Debug, Clone, Default)]
pub struct EloOracle;

impl EloOracle {
    const REQUIRED: [Feature; 1] = [Feature::EloProbP1];
    const LABELS: [u8; 2] = [0, 1];
}

impl ProbabilityOracle for EloOracle {
    fn name(&self) -> &str {
        "elo"
    }

    fn required_features(&self) -> &[Feature] {
        &Self::REQUIRED
    }

    fn class_labels(&self) -> &[u8] {
        &Self::LABELS
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let p = features
            .get(Feature::EloProbP1)
            .ok_or_else(|| TennisError::MissingFeature {
                oracle: self.name().to_string(),
                feature: Feature::EloProbP1,
            })?;
        Ok(binary_proba(&Self::LABELS, p))
    }
}

/// On-disk form of a fitted logistic model
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogisticModelFile {
    #[serde(default = "default_name")]
    name: String,
    intercept: f64,
    /// Column name -> coefficient
    weights: BTreeMap<String, f64>,
    #[serde(default = "default_labels")]
    class_labels: Vec<u8>,
}

fn default_name() -> String {
    "logistic".to_string()
}

fn default_labels() -> Vec<u8> {
    vec![0, 1]
}

/// Fitted logistic regression over named features
#[derive(Debug, Clone)]
pub struct LogisticOracle {
    name: String,
    intercept: f64,
    features: Vec<Feature>,
    weights: Vec<f64>,
    class_labels: Vec<u8>,
}

impl LogisticOracle {
    pub fn new(intercept: f64, weights: Vec<(Feature, f64)>) -> Self {
        let (features, weights) = weights.into_iter().unzip();
        LogisticOracle {
            name: default_name(),
            intercept,
            features,
            weights,
            class_labels: default_labels(),
        }
    }

    /// Parse a fitted model; unknown feature names are a configuration error
    pub fn from_json(json: &str) -> Result<Self> {
        let file: LogisticModelFile = serde_json::from_str(json)?;

        let mut features = Vec::with_capacity(file.weights.len());
        let mut weights = Vec::with_capacity(file.weights.len());
        for (column, weight) in &file.weights {
            let feature = Feature::from_name(column).ok_or_else(|| {
                TennisError::Config(format!("Model {} uses unknown feature '{}'", file.name, column))
            })?;
            features.push(feature);
            weights.push(*weight);
        }

        Ok(LogisticOracle {
            name: file.name,
            intercept: file.intercept,
            features,
            weights,
            class_labels: file.class_labels,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TennisError::Config(format!("Failed to read model {}: {}", path.display(), e))
        })?;
        let oracle = Self::from_json(&json)?;
        log::info!(
            "Loaded model {} with {} features from {}",
            oracle.name,
            oracle.features.len(),
            path.display()
        );
        Ok(oracle)
    }

    pub fn to_json(&self) -> Result<String> {
        let file = LogisticModelFile {
            name: self.name.clone(),
            intercept: self.intercept,
            weights: self
                .features
                .iter()
                .zip(&self.weights)
                .map(|(f, w)| (f.name().to_string(), *w))
                .collect(),
            class_labels: self.class_labels.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl ProbabilityOracle for LogisticOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_features(&self) -> &[Feature] {
        &self.features
    }

    fn class_labels(&self) -> &[u8] {
        &self.class_labels
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let values = features
            .select(&self.features)
            .map_err(|feature| TennisError::MissingFeature {
                oracle: self.name.clone(),
                feature,
            })?;
        let z = self.intercept
            + values
                .iter()
                .zip(&self.weights)
                .map(|(x, w)| x * w)
                .sum::<f64>();
        let p = 1.0 / (1.0 + (-z).exp());
        Ok(binary_proba(&self.class_labels, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elo_vector(p: f64) -> FeatureVector {
        let mut fv = FeatureVector::default();
        fv.set(Feature::EloProbP1, p);
        fv
    }

    /// Oracle returning a fixed output, for contract checks
    struct Fixed {
        labels: Vec<u8>,
        output: Vec<f64>,
    }

    impl ProbabilityOracle for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn required_features(&self) -> &[Feature] {
            &[]
        }

        fn class_labels(&self) -> &[u8] {
            &self.labels
        }

        fn predict_proba(&self, _features: &FeatureVector) -> Result<Vec<f64>> {
            Ok(self.output.clone())
        }
    }

    #[test]
    fn test_elo_oracle_passes_probability_through() {
        let p = player_one_probability(&EloOracle, &elo_vector(0.73)).unwrap();
        assert!((p - 0.73).abs() < 1e-12);
    }

    #[test]
    fn test_missing_required_feature() {
        let err = player_one_probability(&EloOracle, &FeatureVector::default()).unwrap_err();
        match err {
            TennisError::MissingFeature { oracle, feature } => {
                assert_eq!(oracle, "elo");
                assert_eq!(feature, Feature::EloProbP1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_label_order_is_respected() {
        let oracle = Fixed {
            labels: vec![1, 0],
            output: vec![0.8, 0.2],
        };
        let p = player_one_probability(&oracle, &FeatureVector::default()).unwrap();
        assert!((p - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_contract_violations() {
        let cases = [
            (vec![0, 1], vec![-0.2, 1.2]),
            (vec![0, 1], vec![0.5]),
            (vec![0, 1], vec![0.5, 0.6]),
            (vec![0, 0], vec![0.5, 0.5]),
            (vec![0, 1], vec![f64::NAN, 0.5]),
        ];
        for (labels, output) in cases {
            let oracle = Fixed { labels, output };
            assert!(matches!(
                player_one_probability(&oracle, &FeatureVector::default()),
                Err(TennisError::OracleContractViolation(_))
            ));
        }
    }

    #[test]
    fn test_logistic_from_json() {
        let json = r#"{
            "intercept": 0.0,
            "weights": { "Elo_Diff": 0.01, "H2H_Diff": 0.5 },
            "class_labels": [1, 0]
        }"#;
        let oracle = LogisticOracle::from_json(json).unwrap();
        assert_eq!(oracle.name(), "logistic");
        assert_eq!(oracle.required_features().len(), 2);

        let mut fv = FeatureVector::default();
        fv.set(Feature::EloDiff, 100.0);
        fv.set(Feature::H2hDiff, -2.0);
        // z = 1.0 - 1.0 = 0
        let p = player_one_probability(&oracle, &fv).unwrap();
        assert!((p - 0.5).abs() < 1e-12);

        fv.set(Feature::H2hDiff, 0.0);
        let p = player_one_probability(&oracle, &fv).unwrap();
        assert!((p - 1.0 / (1.0 + (-1.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_rejects_unknown_column() {
        let json = r#"{ "intercept": 0.1, "weights": { "Surface_Clay": 1.0 } }"#;
        assert!(matches!(
            LogisticOracle::from_json(json),
            Err(TennisError::Config(_))
        ));
    }

    #[test]
    fn test_logistic_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("logistic.json");
        let oracle = LogisticOracle::new(-0.2, vec![(Feature::RankDiff, -0.01), (Feature::FormDiff, 0.3)]);
        oracle.save(&path).unwrap();

        let loaded = LogisticOracle::load(&path).unwrap();
        let mut fv = FeatureVector::default();
        fv.set(Feature::RankDiff, -40.0);
        fv.set(Feature::FormDiff, 2.0);
        let a = player_one_probability(&oracle, &fv).unwrap();
        let b = player_one_probability(&loaded, &fv).unwrap();
        assert!((a - b).abs() < 1e-12);
        assert!(a > 0.5);
    }
}
