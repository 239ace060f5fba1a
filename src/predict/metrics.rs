//! Probability-quality metrics over matches with known outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

const CLIP: f64 = 1e-15;

/// Running accuracy, log loss and Brier score for `player_1` probabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Number of scored matches
    pub count: usize,
    /// Matches where the side with probability >= 0.5 won
    pub correct: usize,
    pub log_loss_sum: f64,
    pub squared_error_sum: f64,
}

impl EvaluationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(prob_player_1, player_1_won)` pairs
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = (f64, bool)>) -> Self {
        let mut metrics = Self::new();
        for (p, won) in outcomes {
            metrics.update(p, won);
        }
        metrics
    }

    /// Add one scored match
    pub fn update(&mut self, prob_player_1: f64, player_1_won: bool) {
        let y = if player_1_won { 1.0 } else { 0.0 };
        let p = prob_player_1.clamp(CLIP, 1.0 - CLIP);

        self.count += 1;
        if (prob_player_1 >= 0.5) == player_1_won {
            self.correct += 1;
        }
        self.log_loss_sum -= y * p.ln() + (1.0 - y) * (1.0 - p).ln();
        self.squared_error_sum += (prob_player_1 - y).powi(2);
    }

    pub fn accuracy(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.correct as f64 / self.count as f64
        }
    }

    pub fn log_loss(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.log_loss_sum / self.count as f64
        }
    }

    pub fn brier_score(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.squared_error_sum / self.count as f64
        }
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Acc: {:.2}% | Log loss: {:.4} | Brier: {:.4} | n={}",
            self.accuracy() * 100.0,
            self.log_loss(),
            self.brier_score(),
            self.count
        )
    }
}
