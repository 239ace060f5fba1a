//! Kelly staking and bankroll simulation

pub mod kelly;
pub mod simulator;

pub use kelly::{expected_value, kelly_fraction};
pub use simulator::{simulate, BankrollSummary, BetCandidate, StakeStep, StakingConfig};
