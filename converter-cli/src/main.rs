//! # Currency Converter CLI
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Open the key-value store and the preset registry
//! - Start a converter session over the HTTP rate source
//! - Apply one command and flush pending writes

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use converter_engine::{
    ConversionEngine, ConverterSession, PRESETS_PERSIST_DELAY, PresetRegistry, RateCacheManager,
    share,
};
use converter_store::{Storage, build_store};
use converter_types::{CurrencyCode, Line, PresetId, RateSource, RatesState};
use exchange_rates::{convert_rounded, format_amount, parse_amount};
use rates_client::HttpRateSource;

use config::Config;

#[derive(Parser)]
#[command(name = "converter")]
#[command(author, version, about = "Live currency converter", long_about = None)]
struct Cli {
    /// Preset to operate on (defaults to the active preset)
    #[arg(long, global = true)]
    preset: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Converter(ConverterCommands),
    /// Preset management
    Preset {
        #[command(subcommand)]
        action: PresetCommands,
    },
}

#[derive(Subcommand)]
enum ConverterCommands {
    /// List exchange rates
    Rates {
        /// Revalidate even if the cached rates are fresh
        #[arg(long)]
        refresh: bool,
    },
    /// Convert a single amount
    Convert {
        amount: String,
        from: String,
        to: String,
    },
    /// Show the converter lines
    Show,
    /// Add a line in an unused currency
    Add,
    /// Remove a line
    Delete { code: String },
    /// Set the amount of a line
    Amount { code: String, amount: String },
    /// Change the currency of a line
    Currency { code: String, new: String },
    /// Move a line; the first line is the base
    Move { from: usize, to: usize },
    /// Print a share link query
    Share,
    /// Replace the lines with those of a share link
    Import { query: String },
}

#[derive(Subcommand)]
enum PresetCommands {
    /// Create a new preset
    Create { name: String },
    /// List presets
    List,
    /// Rename a preset
    Rename { id: String, name: String },
    /// Delete a preset and its lines
    Delete { id: String },
    /// Select the active preset (omit the id for the default converter)
    Select { id: Option<String> },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,converter_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_code(s: &str) -> Result<CurrencyCode> {
    CurrencyCode::new(s).with_context(|| format!("Invalid currency code: {:?}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing::debug!(?config, "Configuration loaded");

    let storage = build_store(&config.store_url)?;
    let mut presets = PresetRegistry::load(storage.clone(), PRESETS_PERSIST_DELAY);

    let result = match cli.command {
        Commands::Preset { action } => run_preset(&mut presets, action),
        Commands::Converter(command) => {
            let converter = match cli.preset {
                Some(id) => {
                    let id = PresetId::from(id);
                    if presets.get(&id).is_none() {
                        anyhow::bail!("Unknown preset: {}", id);
                    }
                    Some(id)
                }
                None => presets.active_id().cloned(),
            };
            run_converter(&config, &storage, converter, command).await
        }
    };

    presets.flush();
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Converter commands
// ─────────────────────────────────────────────────────────────────────────────

async fn run_converter(
    config: &Config,
    storage: &Storage,
    converter: Option<PresetId>,
    command: ConverterCommands,
) -> Result<()> {
    let source = HttpRateSource::new(&config.rates_api_url);
    tracing::debug!(url = source.url(), "Using HTTP rate source");
    let rates = RateCacheManager::new(source, storage.clone(), config.rates_settings());
    let engine = ConversionEngine::new(storage.clone(), config.converter_settings());
    let session = ConverterSession::new(rates, engine);

    session.start(converter).await;
    if matches!(command, ConverterCommands::Rates { refresh: true }) {
        session.rates().refresh();
    }
    let state = session.settled().await;
    if !state.error_message().is_empty() {
        eprintln!("! {}", state.error_message());
    }

    let result = apply(&session, command, &state).await;
    session.shutdown().await;
    result
}

async fn apply<S: RateSource>(
    session: &ConverterSession<S>,
    command: ConverterCommands,
    rates: &RatesState,
) -> Result<()> {
    let mut engine = session.engine().lock().await;

    match command {
        ConverterCommands::Rates { .. } => {
            let table = rates
                .rates
                .as_deref()
                .context("Exchange rates are not available")?;
            for (code, rate) in table.iter() {
                println!("{:<8} {}", code, rate);
            }
            if let Some(fetched_at) = rates.fetched_at {
                println!("fetched {}", fetched_at.to_rfc3339());
            }
            return Ok(());
        }
        ConverterCommands::Convert { amount, from, to } => {
            let table = rates
                .usable_rates()
                .context("Exchange rates are not available")?;
            let (from, to) = (parse_code(&from)?, parse_code(&to)?);
            for code in [&from, &to] {
                if !table.contains(code.as_str()) {
                    anyhow::bail!("No exchange rate for {}", code);
                }
            }
            let amount = parse_amount(&amount);
            let converted = convert_rounded(amount, &from, &to, table);
            println!(
                "{} {} = {} {}",
                display_amount(amount),
                from,
                display_amount(converted),
                to
            );
            return Ok(());
        }
        ConverterCommands::Show => {}
        ConverterCommands::Add => {
            let added = engine.add_line(rates)?;
            println!("✓ Added {}", added);
        }
        ConverterCommands::Delete { code } => {
            engine.delete_line(&parse_code(&code)?)?;
        }
        ConverterCommands::Amount { code, amount } => {
            engine.change_amount(&parse_code(&code)?, parse_amount(&amount), rates)?;
        }
        ConverterCommands::Currency { code, new } => {
            engine.change_currency(&parse_code(&code)?, &parse_code(&new)?, rates)?;
        }
        ConverterCommands::Move { from, to } => {
            engine.move_line(from, to)?;
        }
        ConverterCommands::Share => {
            println!("?{}", share::encode(engine.lines()));
            return Ok(());
        }
        ConverterCommands::Import { query } => {
            engine.import_shared(&share::decode(&query), rates)?;
        }
    }

    print_lines(engine.lines());
    Ok(())
}

fn print_lines(lines: &[Line]) {
    for (index, line) in lines.iter().enumerate() {
        let marker = if index == 0 { "*" } else { " " };
        println!(
            "{} {:>2}  {:<8} {}",
            marker,
            index,
            line.currency,
            display_amount(line.amount)
        );
    }
}

fn display_amount(amount: f64) -> String {
    let formatted = format_amount(amount);
    if formatted.is_empty() {
        "0".to_string()
    } else {
        formatted
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Preset commands
// ─────────────────────────────────────────────────────────────────────────────

fn run_preset(presets: &mut PresetRegistry, action: PresetCommands) -> Result<()> {
    match action {
        PresetCommands::Create { name } => {
            let preset = presets.create(&name)?;
            println!("✓ Created preset {} ({})", preset.name, preset.id);
        }
        PresetCommands::List => {
            let active = presets.active_id();
            for preset in presets.list() {
                let marker = if Some(&preset.id) == active { "*" } else { " " };
                println!("{} {}  {}", marker, preset.id, preset.name);
            }
        }
        PresetCommands::Rename { id, name } => {
            presets.rename(&PresetId::from(id), &name)?;
            println!("✓ Preset renamed");
        }
        PresetCommands::Delete { id } => {
            let removed = presets.delete(&PresetId::from(id))?;
            println!("✓ Deleted preset {}", removed.name);
        }
        PresetCommands::Select { id } => {
            let id = id.map(PresetId::from);
            presets.select(id.as_ref())?;
            match id {
                Some(id) => println!("✓ Selected preset {}", id),
                None => println!("✓ Selected the default converter"),
            }
        }
    }
    Ok(())
}
