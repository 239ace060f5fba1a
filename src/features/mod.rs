//! Point-in-time player statistics and feature enrichment
//!
//! Indices are built once from the ledger and only read afterwards.

pub mod elo;
pub mod enrich;
pub mod form;
pub mod h2h;
pub mod score;

pub use elo::{EloTable, PreMatchElo};
pub use enrich::{enrich, enrich_all, enrich_history, FeatureVector};
pub use form::{FormEntry, FormTracker, RecentStats};
pub use h2h::{H2HEntry, H2HIndex, PairKey};
