//! F1 Predict CLI - Command-line interface for race-winner predictions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use f1predict::assumptions::Assumptions;
use f1predict::config::AppConfig;
use f1predict::data::catalog::{known_drivers, known_tracks};
use f1predict::data::features::write_feature_table;
use f1predict::data::{FeatureEngineering, HistoricalData, HistoryIndex};
use f1predict::models::{PredictionResult, RaceRequest};
use f1predict::predictor::RacePredictor;
use f1predict::store::ModelStore;
use f1predict::training::{train_models, StrategyRegistry};

#[derive(Parser)]
#[command(name = "f1predict")]
#[command(author, version, about = "F1 race-winner prediction CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Historical data CSV (overrides configuration)
    #[arg(long, global = true)]
    data: Option<String>,

    /// Model directory (overrides configuration)
    #[arg(long, global = true)]
    models: Option<String>,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the feature table from historical data
    Features {
        /// Output CSV (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Train every enabled strategy and save the best model
    Train,

    /// Predict win probabilities for one race
    Predict {
        /// Track name (e.g. Monaco)
        #[arg(short, long)]
        track: String,

        /// Driver abbreviations, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        drivers: Vec<String>,

        /// Expected qualifying position as DRIVER=POS (repeatable)
        #[arg(short, long = "qualifying", value_parser = parse_qualifying)]
        qualifying: Vec<(String, u32)>,

        /// Assumptions JSON file
        #[arg(short, long)]
        assumptions: Option<PathBuf>,
    },

    /// Predict a list of races from a JSON file
    Season {
        /// JSON array of {"track", "drivers", "qualifying_positions"}
        #[arg(short, long)]
        races: PathBuf,

        /// Assumptions JSON file shared by every race
        #[arg(short, long)]
        assumptions: Option<PathBuf>,
    },

    /// List known tracks
    Tracks,

    /// List known drivers
    Drivers,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(data) = cli.data {
        config.paths.data = data;
    }
    if let Some(models) = cli.models {
        config.paths.models = models;
    }

    let Some(command) = cli.command else {
        println!("Use --help for usage information.");
        return Ok(());
    };

    match command {
        Commands::Features { output } => build_features(&config, output.as_deref())?,
        Commands::Train => train(&config)?,
        Commands::Predict {
            track,
            drivers,
            qualifying,
            assumptions,
        } => {
            let qualifying_positions: HashMap<String, u32> = qualifying.into_iter().collect();
            let race = RaceRequest {
                track,
                drivers,
                qualifying_positions,
            };
            predict_race(&config, &race, assumptions.as_deref())?;
        }
        Commands::Season { races, assumptions } => {
            predict_season(&config, &races, assumptions.as_deref())?;
        }
        Commands::Tracks => list_catalog(&config, "Tracks", HistoryIndex::tracks, known_tracks)?,
        Commands::Drivers => {
            list_catalog(&config, "Drivers", HistoryIndex::drivers, known_drivers)?
        }
    }

    Ok(())
}

/// Parse a `DRIVER=POS` pair
fn parse_qualifying(pair: &str) -> Result<(String, u32), String> {
    let (driver, position) = pair
        .split_once('=')
        .ok_or_else(|| format!("expected DRIVER=POS, got '{}'", pair))?;
    let driver = driver.trim();
    if driver.is_empty() {
        return Err(format!("missing driver in '{}'", pair));
    }
    let position: u32 = position
        .trim()
        .parse()
        .map_err(|_| format!("invalid position in '{}'", pair))?;
    if position == 0 {
        return Err(format!("position must be at least 1 in '{}'", pair));
    }
    Ok((driver.to_string(), position))
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    Ok(pb)
}

fn load_history(path: &str) -> Result<HistoricalData> {
    HistoricalData::load(path).with_context(|| format!("Failed to load CSV from {:?}", path))
}

fn load_assumptions(path: Option<&Path>) -> Result<Option<Assumptions>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let value: serde_json::Value = serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse JSON from {:?}", path))?;
    let assumptions = Assumptions::from_json(value)
        .with_context(|| format!("Invalid assumptions in {:?}", path))?;
    Ok(Some(assumptions))
}

fn build_features(config: &AppConfig, output: Option<&Path>) -> Result<()> {
    let pb = spinner("Building features...")?;
    let history = load_history(&config.paths.data)?;
    let table = FeatureEngineering::create_ml_features(history.records());
    pb.finish_and_clear();

    match output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
            let mut writer = BufWriter::new(file);
            write_feature_table(&table, &mut writer)
                .and_then(|()| writer.flush())
                .with_context(|| format!("Failed to write {:?}", path))?;
            println!(
                "{} {} rows ({} wins) to {:?}",
                "Wrote".green(),
                table.len(),
                table.iter().filter(|r| r.won).count(),
                path
            );
        }
        None => {
            let stdout = io::stdout();
            write_feature_table(&table, stdout.lock())
                .context("Failed to write feature table")?;
        }
    }

    Ok(())
}

fn train(config: &AppConfig) -> Result<()> {
    println!("{}", "Strategies:".yellow().bold());
    for status in StrategyRegistry::from_config(&config.training).statuses() {
        let state = match (status.available, status.enabled) {
            (false, _) => "unavailable".red(),
            (true, false) => "disabled".dimmed(),
            (true, true) => "enabled".green(),
        };
        println!("  {:<20} {}", status.name, state);
    }
    println!();

    let pb = spinner("Loading historical data...")?;
    let history = load_history(&config.paths.data)?;
    pb.set_message(format!("Building features from {} records...", history.len()));
    let table = FeatureEngineering::create_ml_features(history.records());
    pb.set_message(format!("Training on {} rows...", table.len()));
    let outcome = train_models(&table, &config.training).context("Training failed")?;
    pb.finish_and_clear();

    println!("{}", "Results:".yellow().bold());
    println!("{:<20} {:>10} {:>10}", "Model", "Accuracy", "AUC");
    println!("{}", "-".repeat(42));
    for (i, trained) in outcome.models.iter().enumerate() {
        let line = format!(
            "{:<20} {:>10.4} {:>10.4}",
            trained.name, trained.metrics.accuracy, trained.metrics.auc
        );
        if i == outcome.best {
            println!("{} {}", line.bold(), "(best)".green());
        } else {
            println!("{}", line);
        }
    }
    println!();

    let store = ModelStore::new(&config.paths.models);
    let metadata = store
        .save(&outcome)
        .with_context(|| format!("Failed to save models to {:?}", store.dir()))?;
    println!(
        "{} {} to {:?}",
        "Saved".green(),
        metadata.best_model,
        store.dir()
    );

    Ok(())
}

fn load_predictor(config: &AppConfig) -> Result<RacePredictor> {
    let pb = spinner("Loading model...")?;
    let predictor = RacePredictor::load(&config.paths.models, &config.paths.data)
        .with_context(|| format!("Failed to load model from {:?}", config.paths.models))?;
    pb.finish_and_clear();
    Ok(predictor)
}

fn predict_race(
    config: &AppConfig,
    race: &RaceRequest,
    assumptions: Option<&Path>,
) -> Result<()> {
    let assumptions = load_assumptions(assumptions)?;
    let predictor = load_predictor(config)?;

    println!(
        "{}: {} ({} drivers, model {})",
        "Predicting".green(),
        race.track,
        race.drivers.len(),
        predictor.model_name()
    );
    println!();

    let predictions = predictor
        .predict_race(
            &race.drivers,
            &race.track,
            &race.qualifying_positions,
            assumptions.as_ref(),
        )
        .with_context(|| format!("Prediction failed for {}", race.track))?;

    print_predictions(&predictions);
    Ok(())
}

fn predict_season(
    config: &AppConfig,
    races_path: &Path,
    assumptions: Option<&Path>,
) -> Result<()> {
    let file =
        File::open(races_path).with_context(|| format!("Failed to open {:?}", races_path))?;
    let races: Vec<RaceRequest> = serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse races from {:?}", races_path))?;
    let assumptions = load_assumptions(assumptions)?;
    let predictor = load_predictor(config)?;

    let pb = spinner(&format!("Predicting {} races...", races.len()))?;
    let results = predictor
        .predict_season(&races, assumptions.as_ref())
        .context("Season prediction failed")?;
    pb.finish_and_clear();

    for (race, predictions) in split_by_race(&races, &results) {
        println!("{}", race.track.yellow().bold());
        print_predictions(predictions);
        println!();
    }

    Ok(())
}

/// Pair each race with its slice of the concatenated season results
///
/// A race yields one result per listed driver.
fn split_by_race<'a>(
    races: &'a [RaceRequest],
    results: &'a [PredictionResult],
) -> Vec<(&'a RaceRequest, &'a [PredictionResult])> {
    let mut rest = results;
    races
        .iter()
        .map(|race| {
            let (head, tail) = rest.split_at(race.drivers.len().min(rest.len()));
            rest = tail;
            (race, head)
        })
        .collect()
}

fn print_predictions(predictions: &[PredictionResult]) {
    println!("{:>4} {:<8} {:>6} {:>10}", "Rank", "Driver", "Grid", "Win %");
    println!("{}", "-".repeat(31));
    for (rank, p) in predictions.iter().enumerate() {
        let line = format!(
            "{:>4} {:<8} {:>6} {:>9.2}%",
            rank + 1,
            p.driver,
            p.qualifying_position,
            p.win_probability
        );
        if rank == 0 {
            println!("{}", line.green().bold());
        } else {
            println!("{}", line);
        }
    }
}

fn list_catalog(
    config: &AppConfig,
    title: &str,
    from_history: fn(&HistoryIndex) -> Vec<String>,
    merge: fn(&[String]) -> Vec<String>,
) -> Result<()> {
    let history = HistoricalData::load_or_empty(&config.paths.data)
        .with_context(|| format!("Failed to load CSV from {:?}", config.paths.data))?;
    let index = HistoryIndex::new(history.into_records());
    let names = merge(&from_history(&index));

    println!("{} ({})", title.yellow().bold(), names.len());
    let mut stdout = io::stdout().lock();
    for name in names {
        writeln!(stdout, "  {}", name)?;
    }
    Ok(())
}
