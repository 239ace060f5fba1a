//! Tennis Prediction CLI
//!
//! Point-in-time player statistics, match forecasts and Kelly backtests.

use clap::{Parser, Subcommand};
use tennis::{Config, Result};

#[derive(Parser)]
#[command(name = "tennis")]
#[command(about = "Tennis match forecasting with Kelly bankroll simulation", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Index snapshot commands
    Index {
        #[command(subcommand)]
        action: IndexCommands,
    },
    /// Predict a single match
    Predict {
        /// Player 1 name, as written in the match data
        #[arg(long)]
        p1: String,
        /// Player 2 name
        #[arg(long)]
        p2: String,
        /// Match date (defaults to today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        rank1: Option<u32>,
        #[arg(long)]
        rank2: Option<u32>,
        #[arg(long)]
        pts1: Option<u32>,
        #[arg(long)]
        pts2: Option<u32>,
        /// Decimal odds on player 1
        #[arg(long)]
        odd1: Option<f64>,
        /// Decimal odds on player 2
        #[arg(long)]
        odd2: Option<f64>,
        /// Round label, e.g. "Quarterfinals"
        #[arg(long)]
        round: Option<String>,
        #[arg(long)]
        surface: Option<String>,
        /// Probability model
        #[arg(long, default_value = "elo")]
        oracle: OracleKind,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Walk-forward backtest over a date window
    Backtest {
        /// First date of the test window
        #[arg(long)]
        from: String,
        /// Last date of the test window (defaults to the last ledger date)
        #[arg(long)]
        to: Option<String>,
        /// Probability model
        #[arg(long, default_value = "elo")]
        oracle: OracleKind,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import matches from an ATP-style CSV
    Import {
        /// CSV path (defaults to data.matches_csv)
        csv: Option<String>,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum IndexCommands {
    /// Rebuild head-to-head, form and Elo snapshots from the stored ledger
    Build,
}

#[derive(Clone, Debug)]
enum OracleKind {
    Elo,
    Logistic,
}

impl std::str::FromStr for OracleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elo" => Ok(OracleKind::Elo),
            "logistic" => Ok(OracleKind::Logistic),
            _ => Err(format!("Unknown oracle: {}. Use elo or logistic.", s)),
        }
    }
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Import { csv } => commands::data_import(&config, csv),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Index { action } => match action {
            IndexCommands::Build => commands::index_build(&config),
        },
        Commands::Predict {
            p1,
            p2,
            date,
            rank1,
            rank2,
            pts1,
            pts2,
            odd1,
            odd2,
            round,
            surface,
            oracle,
            format,
        } => {
            let args = commands::PredictArgs {
                p1,
                p2,
                date,
                rank1,
                rank2,
                pts1,
                pts2,
                odd1,
                odd2,
                round,
                surface,
            };
            commands::predict(&config, args, oracle, format)
        }
        Commands::Backtest {
            from,
            to,
            oracle,
            format,
        } => commands::backtest(&config, &from, to.as_deref(), oracle, format),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use chrono::NaiveDate;
    use tennis::data::source::parse_date;
    use tennis::data::{CsvSource, Database, Ledger};
    use tennis::features::{EloTable, FormTracker, H2HIndex};
    use tennis::predict::{
        run_backtest, EloOracle, LogisticOracle, MatchPrediction, Predictor, ProbabilityOracle,
    };
    use tennis::{Fixture, PlayerId, Surface, TennisError};

    pub struct PredictArgs {
        pub p1: String,
        pub p2: String,
        pub date: Option<String>,
        pub rank1: Option<u32>,
        pub rank2: Option<u32>,
        pub pts1: Option<u32>,
        pub pts2: Option<u32>,
        pub odd1: Option<f64>,
        pub odd2: Option<f64>,
        pub round: Option<String>,
        pub surface: Option<String>,
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        // Create data directory
        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("models")?;
        println!("Created data/ and models/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'tennis data import <CSV>' to load match data");
        println!("  3. Run 'tennis index build' to build the player indices");
        println!("  4. Run 'tennis predict --p1 \"Player A\" --p2 \"Player B\"' to make predictions");

        Ok(())
    }

    fn date_arg(text: &str) -> Result<NaiveDate> {
        parse_date(text).ok_or_else(|| TennisError::Parse(format!("Invalid date: {}", text)))
    }

    fn load_oracle(config: &Config, kind: &OracleKind) -> Result<Box<dyn ProbabilityOracle>> {
        Ok(match kind {
            OracleKind::Elo => Box::new(EloOracle),
            OracleKind::Logistic => Box::new(LogisticOracle::load(&config.data.model_path)?),
        })
    }

    pub fn data_import(config: &Config, csv: Option<String>) -> Result<()> {
        let path = csv.unwrap_or_else(|| config.data.matches_csv.clone());
        println!("Importing matches from {}...", path);

        let ledger = Ledger::from_source(&CsvSource::new(&path))?;
        let db = Database::open(&config.data.database_path)?;
        let count = db.save_ledger(&ledger)?;
        println!("Stored {} matches in database", count);

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:      {}", config.data.database_path);
        println!("  Matches:   {}", stats.match_count);
        println!("  Players:   {}", stats.player_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_match, stats.latest_match) {
            println!("  Range:     {} to {}", earliest, latest);
        }
        println!("  H2H pairs: {}", stats.h2h_pairs);
        println!("  Form logs: {}", stats.form_players);
        println!("  Rated:     {}", stats.rated_players);

        Ok(())
    }

    pub fn index_build(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let ledger = db.load_ledger()?;
        println!("Building indices from {} matches...", ledger.len());

        let h2h = H2HIndex::build(&ledger);
        let form = FormTracker::build(&ledger);
        let mut elo = EloTable::new(config.elo.clone());
        elo.replay(&ledger);

        db.save_h2h(&h2h)?;
        db.save_form(&form)?;
        db.save_elo(&elo)?;

        println!(
            "Saved {} head-to-head pairs, {} form logs, {} ratings",
            h2h.len(),
            form.len(),
            elo.len()
        );

        Ok(())
    }

    /// Stored snapshots, rebuilt from the ledger when none have been saved
    ///
    /// Snapshots cover the whole ledger, so a date on or before the last
    /// stored match is predicted from indices rebuilt from earlier matches only.
    fn load_predictor(
        config: &Config,
        date: NaiveDate,
        oracle: Box<dyn ProbabilityOracle>,
    ) -> Result<Predictor> {
        let db = Database::open(&config.data.database_path)?;
        let latest = db.get_stats()?.latest_match;
        let elo = db.load_elo(config.elo.clone())?;

        if latest.is_some_and(|last| date <= last) || elo.is_empty() {
            log::info!("Building indices from matches before {}", date);
            let ledger = db.load_ledger()?;
            return Ok(Predictor::as_of(
                &ledger,
                date,
                config.elo.clone(),
                config.form.clone(),
                oracle,
            ));
        }
        Ok(Predictor::new(
            db.load_h2h()?,
            db.load_form()?,
            elo,
            config.form.clone(),
            oracle,
        ))
    }

    pub fn predict(
        config: &Config,
        args: PredictArgs,
        oracle: OracleKind,
        format: OutputFormat,
    ) -> Result<()> {
        let date = match args.date.as_deref() {
            Some(text) => date_arg(text)?,
            None => chrono::Local::now().date_naive(),
        };

        let mut fixture = Fixture::new(date, PlayerId::new(args.p1), PlayerId::new(args.p2));
        fixture.rank_1 = args.rank1;
        fixture.rank_2 = args.rank2;
        fixture.points_1 = args.pts1;
        fixture.points_2 = args.pts2;
        fixture.odds_1 = args.odd1;
        fixture.odds_2 = args.odd2;
        fixture.round = args.round;
        fixture.surface = args.surface.as_deref().and_then(Surface::from_name);

        let predictor = load_predictor(config, date, load_oracle(config, &oracle)?)?;
        let prediction = predictor.predict_fixture(&fixture)?;

        match format {
            OutputFormat::Table => print!("{}", format_prediction(&prediction)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&prediction)?),
            OutputFormat::Csv => {
                println!("{}", CSV_HEADER);
                println!("{}", csv_row(&prediction));
            }
        }

        Ok(())
    }

    pub fn backtest(
        config: &Config,
        from: &str,
        to: Option<&str>,
        oracle: OracleKind,
        format: OutputFormat,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let ledger = db.load_ledger()?;

        let start = date_arg(from)?;
        let end = match to {
            Some(text) => date_arg(text)?,
            None => ledger.last_date().ok_or(TennisError::EmptyLedger)?,
        };

        let oracle = load_oracle(config, &oracle)?;
        let report = run_backtest(&ledger, oracle.as_ref(), config, start, end)?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Csv => {
                println!("{},stake,realized_gain,bankroll", CSV_HEADER);
                for (pred, step) in report.predictions.iter().zip(&report.steps) {
                    println!(
                        "{},{:.4},{},{:.4}",
                        csv_row(pred),
                        step.stake,
                        step.realized_gain.map(|g| format!("{:.4}", g)).unwrap_or_default(),
                        step.bankroll_after
                    );
                }
            }
            OutputFormat::Table => {
                let s = &report.summary;
                println!("Backtest: {} to {} ({})", report.start, report.end, report.oracle);
                println!("───────────────────────────────");
                println!("  History matches: {}", report.history_matches);
                println!("  Test matches:    {}", report.predictions.len());
                println!("  {}", report.metrics);
                println!();
                println!("  Bankroll:     {:.2} -> {:.2}", s.starting_bankroll, s.final_bankroll);
                println!("  Bets placed:  {} ({} won)", s.bets_placed, s.bets_won);
                println!("  Total staked: {:.2}", s.total_staked);
                println!("  Profit:       {:.2}", s.profit);
                println!("  ROI:          {:.2}%", s.roi * 100.0);
                println!(
                    "  Max drawdown: {:.2} ({:.1}%)",
                    s.max_drawdown,
                    s.max_drawdown_pct * 100.0
                );
            }
        }

        Ok(())
    }

    const CSV_HEADER: &str =
        "date,player_1,player_2,prob_player_1,prob_player_2,predicted_winner,confidence,elo_prob";

    fn csv_row(p: &MatchPrediction) -> String {
        format!(
            "{},{},{},{:.4},{:.4},{},{:.1},{}",
            p.date,
            p.player_1,
            p.player_2,
            p.prob_player_1,
            p.prob_player_2,
            p.predicted_winner,
            p.confidence,
            p.elo_prob.map(|e| format!("{:.4}", e)).unwrap_or_default()
        )
    }

    fn format_prediction(p: &MatchPrediction) -> String {
        let mut out = String::new();
        out.push_str(&format!("{} vs {} ({})\n", p.player_1, p.player_2, p.date));
        out.push_str("───────────────────────────────\n");
        out.push_str(&format!("  {:<24} {:>6.1}%\n", p.player_1.as_str(), p.prob_player_1 * 100.0));
        out.push_str(&format!("  {:<24} {:>6.1}%\n", p.player_2.as_str(), p.prob_player_2 * 100.0));
        out.push_str(&format!("  Predicted winner: {}\n", p.predicted_winner));
        out.push_str(&format!("  Confidence:       {:.1}\n", p.confidence));
        if let Some(elo) = p.elo_prob {
            out.push_str(&format!("  Elo probability:  {:.1}%\n", elo * 100.0));
        }
        out
    }
}
