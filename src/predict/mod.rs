//! Probability oracles, match predictions and walk-forward backtests

pub mod backtest;
pub mod metrics;
pub mod oracle;
pub mod prediction;

pub use backtest::{run_backtest, BacktestReport};
pub use metrics::EvaluationMetrics;
pub use oracle::{player_one_probability, EloOracle, LogisticOracle, ProbabilityOracle};
pub use prediction::{predict_fixture, MatchPrediction, Predictor};
