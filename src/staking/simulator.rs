//! Sequential bankroll simulation
//!
//! The bankroll is a strict left-to-right fold: each stake is sized from the
//! bankroll left by the previous step, so candidates must arrive in a fixed
//! order (chronological in a backtest).

use serde::{Deserialize, Serialize};

use super::kelly::{expected_value, kelly_fraction};
use crate::{Fixture, Result, Side, TennisError};

/// Bankroll and stake-sizing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    pub starting_bankroll: f64,
    /// Multiplier on the full Kelly fraction (0.5 = half Kelly)
    pub kelly_multiplier: f64,
    /// Largest single stake as a fraction of the current bankroll
    pub max_stake_fraction: f64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        StakingConfig {
            starting_bankroll: 100.0,
            kelly_multiplier: 1.0,
            max_stake_fraction: 1.0,
        }
    }
}

impl StakingConfig {
    /// Reject non-finite or negative sizing parameters
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("starting_bankroll", self.starting_bankroll),
            ("kelly_multiplier", self.kelly_multiplier),
            ("max_stake_fraction", self.max_stake_fraction),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(TennisError::Config(format!(
                    "staking.{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// One bet opportunity: the backed side's probability, its odds and, once
/// known, whether that side won
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetCandidate {
    pub probability: f64,
    pub odds: Option<f64>,
    pub won: Option<bool>,
}

impl BetCandidate {
    pub fn new(probability: f64, odds: Option<f64>, won: Option<bool>) -> Self {
        BetCandidate {
            probability,
            odds,
            won,
        }
    }

    /// Back the predicted winner of a fixture
    ///
    /// `player_1` is backed when `prob_player_1 >= 0.5`, otherwise
    /// `player_2` at `1 - prob_player_1`.
    pub fn for_fixture(fixture: &Fixture, prob_player_1: f64, winner: Option<Side>) -> Self {
        let side = if prob_player_1 >= 0.5 {
            Side::PlayerOne
        } else {
            Side::PlayerTwo
        };
        let probability = match side {
            Side::PlayerOne => prob_player_1,
            Side::PlayerTwo => 1.0 - prob_player_1,
        };
        BetCandidate {
            probability,
            odds: fixture.odds(side),
            won: winner.map(|w| w == side),
        }
    }
}

/// Recorded result of one simulation step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StakeStep {
    pub index: usize,
    pub probability: f64,
    pub odds: Option<f64>,
    pub stake: f64,
    pub expected_value: f64,
    /// `None` when the outcome is unknown; the bankroll does not move then
    pub realized_gain: Option<f64>,
    pub bankroll_before: f64,
    pub bankroll_after: f64,
}

impl StakeStep {
    pub fn is_bet(&self) -> bool {
        self.stake > 0.0
    }

    pub fn is_settled(&self) -> bool {
        self.realized_gain.is_some()
    }
}

fn check_probability(index: usize, probability: f64) -> Result<()> {
    if probability.is_finite() && (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(TennisError::OracleContractViolation(format!(
            "probability {} at step {} is outside [0, 1]",
            probability, index
        )))
    }
}

/// Run the staking fold over candidates in the given order
///
/// A probability outside `[0, 1]` aborts the run rather than being clamped.
pub fn simulate(candidates: &[BetCandidate], config: &StakingConfig) -> Result<Vec<StakeStep>> {
    config.validate()?;
    let mut bankroll = config.starting_bankroll;
    let mut steps = Vec::with_capacity(candidates.len());

    for (index, candidate) in candidates.iter().enumerate() {
        check_probability(index, candidate.probability)?;

        let (stake, ev) = match candidate.odds {
            Some(odds) if bankroll > 0.0 => {
                let fraction = (kelly_fraction(candidate.probability, odds)
                    * config.kelly_multiplier)
                    .clamp(0.0, config.max_stake_fraction.clamp(0.0, 1.0));
                let stake = bankroll * fraction;
                (stake, expected_value(stake, candidate.probability, odds))
            }
            _ => (0.0, 0.0),
        };

        let realized_gain = candidate.won.map(|won| match (won, candidate.odds) {
            (true, Some(odds)) => stake * (odds - 1.0),
            (false, _) => -stake,
            (true, None) => 0.0,
        });

        let bankroll_before = bankroll;
        if let Some(gain) = realized_gain {
            bankroll += gain;
        }

        steps.push(StakeStep {
            index,
            probability: candidate.probability,
            odds: candidate.odds,
            stake,
            expected_value: ev,
            realized_gain,
            bankroll_before,
            bankroll_after: bankroll,
        });
    }

    log::debug!(
        "Simulated {} steps: bankroll {:.2} -> {:.2}",
        steps.len(),
        config.starting_bankroll,
        bankroll
    );

    Ok(steps)
}

/// Aggregate view of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankrollSummary {
    pub starting_bankroll: f64,
    pub final_bankroll: f64,
    /// Sum of settled stakes
    pub total_staked: f64,
    pub profit: f64,
    /// Profit over total staked (0 when nothing was staked)
    pub roi: f64,
    /// Settled bets with a positive stake
    pub bets_placed: usize,
    pub bets_won: usize,
    /// Bets sized but still awaiting an outcome
    pub bets_pending: usize,
    /// Largest peak-to-trough fall of the bankroll
    pub max_drawdown: f64,
    /// `max_drawdown` relative to the peak it fell from
    pub max_drawdown_pct: f64,
}

impl BankrollSummary {
    pub fn from_steps(steps: &[StakeStep], starting_bankroll: f64) -> Self {
        let settled: Vec<&StakeStep> = steps.iter().filter(|s| s.is_bet() && s.is_settled()).collect();
        let total_staked: f64 = settled.iter().map(|s| s.stake).sum();
        let bets_won = settled
            .iter()
            .filter(|s| s.realized_gain.unwrap_or(0.0) > 0.0)
            .count();
        let bets_pending = steps.iter().filter(|s| s.is_bet() && !s.is_settled()).count();

        let final_bankroll = steps.last().map(|s| s.bankroll_after).unwrap_or(starting_bankroll);
        let profit = final_bankroll - starting_bankroll;
        let roi = if total_staked > 0.0 {
            profit / total_staked
        } else {
            0.0
        };

        let mut peak = starting_bankroll;
        let mut max_drawdown = 0.0;
        let mut max_drawdown_pct = 0.0;
        for step in steps {
            peak = f64::max(peak, step.bankroll_after);
            let drawdown = peak - step.bankroll_after;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                max_drawdown_pct = if peak > 0.0 { drawdown / peak } else { 0.0 };
            }
        }

        BankrollSummary {
            starting_bankroll,
            final_bankroll,
            total_staked,
            profit,
            roi,
            bets_placed: settled.len(),
            bets_won,
            bets_pending,
            max_drawdown,
            max_drawdown_pct,
        }
    }
}
