//! pqext: inspect the interception layer without a database.
//!
//! # Usage
//!
//! ```bash
//! # Replay a recorded result through the in-place bytea decoder
//! pqext replay users.json --driver bytea-hex --strategy in-place
//!
//! # Expand JSON envelope columns, print as JSON
//! pqext replay profiles.json --driver envelope --format json
//!
//! # Show the effective configuration
//! pqext config
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use pqext::driver::builtin;
use pqext::prelude::*;
use pqext::replay::ReplayClient;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pqext")]
#[command(version)]
#[command(about = "Encryption-aware PostgreSQL client interception", long_about = None)]
#[command(after_help = "EXAMPLES:
    pqext replay users.json --driver bytea-hex --strategy in-place
    pqext replay profiles.json --driver envelope --format json
    pqext config")]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recorded result fixture through a connection
    Replay {
        /// JSON fixture file
        fixture: PathBuf,

        /// Mapping strategy (defaults to the configured one)
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Driver to attach
        #[arg(short, long, value_enum, default_value = "passthrough")]
        driver: DriverArg,

        /// Query text recorded as sent
        #[arg(short, long, default_value = "SELECT * FROM replay")]
        query: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Show the effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    InPlace,
    Rebuild,
}

impl From<StrategyArg> for MappingStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::InPlace => MappingStrategy::InPlace,
            StrategyArg::Rebuild => MappingStrategy::Rebuild,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DriverArg {
    /// No driver at all
    None,
    Passthrough,
    Identity,
    ByteaHex,
    Envelope,
}

impl DriverArg {
    fn builtin_name(self) -> Option<&'static str> {
        match self {
            DriverArg::None => None,
            DriverArg::Passthrough => Some("passthrough"),
            DriverArg::Identity => Some("identity"),
            DriverArg::ByteaHex => Some("bytea-hex"),
            DriverArg::Envelope => Some("envelope"),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match &cli.command {
        Commands::Replay {
            fixture,
            strategy,
            driver,
            query,
            format,
        } => replay(fixture, *strategy, *driver, query, *format),
        Commands::Config => show_config(),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pqext=debug" } else { "pqext=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn replay(
    fixture: &Path,
    strategy: Option<StrategyArg>,
    driver: DriverArg,
    query: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (mut config, _) = InterceptorConfig::load()?;
    if let Some(strategy) = strategy {
        config.strategy = strategy.into();
    }

    let client = ReplayClient::from_file(fixture)
        .with_context(|| format!("failed to load fixture {}", fixture.display()))?;

    let mut conn = match driver.builtin_name() {
        Some(name) => {
            let factory = move |_: &str| -> Result<Box<dyn Driver>, DriverError> {
                builtin(name).ok_or_else(|| DriverError::Uninitialized(name.to_string()))
            };
            Connection::open(client, &factory, config)
        }
        None => Connection::unwrapped(client, config),
    };

    eprintln!(
        "{} {} {} {}",
        "Strategy:".dimmed(),
        conn.config().strategy.to_string().cyan(),
        "Driver:".dimmed(),
        conn.driver_handle()
            .map_or("none", DriverHandle::driver_name)
            .cyan()
    );

    let results = conn.query(query)?;
    if results.is_empty() {
        println!("{}", "(no results)".dimmed());
    }
    for result in &results {
        match format {
            OutputFormat::Table => print_table(result),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&to_json(result))?),
        }
    }
    Ok(())
}

fn show_config() -> anyhow::Result<()> {
    let (config, path) = InterceptorConfig::load()?;
    match path {
        Some(path) => println!("{} {}", "Loaded from:".dimmed(), path.display().to_string().cyan()),
        None => println!("{}", "No config file found; using defaults".dimmed()),
    }
    println!("{}", config.to_toml_string()?);
    Ok(())
}

fn display_cell(value: Option<&[u8]>) -> String {
    match value {
        Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        None => "NULL".to_string(),
    }
}

fn print_table(result: &ResultSet) {
    if let Some(message) = result.error_message() {
        println!("{} {:?}: {}", "✗".red(), result.status(), message);
        return;
    }
    if result.column_count() == 0 {
        println!("{} {:?}", "✓".green(), result.status());
        return;
    }

    let headers: Vec<&str> = result.schema().names().collect();
    let rows: Vec<Vec<String>> = result
        .rows()
        .map(|row| (0..row.len()).map(|i| display_cell(row.get_bytes(i))).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<w$}", h, w = *w).bold().to_string())
        .collect();
    println!("{}", header_line.join(" │ "));

    let separator: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", separator.join("─┼─").dimmed());

    for (r, row) in rows.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(c, (cell, w))| {
                let padded = format!("{:<w$}", cell, w = *w);
                if result.is_null(r, c) {
                    padded.dimmed().to_string()
                } else {
                    padded
                }
            })
            .collect();
        println!("{}", line.join(" │ "));
    }

    println!(
        "{}",
        format!("({} rows, {} columns)", result.row_count(), result.column_count()).dimmed()
    );
}

fn to_json(result: &ResultSet) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = result
        .rows()
        .map(|row| {
            let object: serde_json::Map<String, serde_json::Value> = result
                .schema()
                .names()
                .enumerate()
                .map(|(i, name)| {
                    let value = row
                        .get_bytes(i)
                        .map(|b| serde_json::Value::String(String::from_utf8_lossy(b).into_owned()))
                        .unwrap_or(serde_json::Value::Null);
                    (name.to_string(), value)
                })
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();

    serde_json::json!({
        "status": format!("{:?}", result.status()),
        "error": result.error_message(),
        "columns": result.schema().names().collect::<Vec<_>>(),
        "types": result.fields().iter().map(|f| f.type_oid).collect::<Vec<_>>(),
        "formats": result.fields().iter().map(|f| f.format.code()).collect::<Vec<_>>(),
        "rows": rows,
    })
}
