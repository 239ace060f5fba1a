//! Match data ingestion and storage
//!
//! Match-source providers, the chronological ledger, and the SQLite store.

pub mod database;
pub mod ledger;
pub mod source;

pub use database::{Database, DatabaseStats};
pub use ledger::{IngestReport, Ledger};
pub use source::{CsvSource, MatchSource, RawMatch};
