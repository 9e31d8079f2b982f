//! Put credit spread scanner CLI.
//!
//! # Usage
//!
//! ```bash
//! # Set API token
//! export TRADIER_TOKEN=your-token
//!
//! # Scan the default watchlist
//! spread-scanner scan
//!
//! # Scan a few tickers with the fixed-width preset and save the report
//! spread-scanner scan --tickers SPY,QQQ,IWM --preset fixed --output results/scan.json
//!
//! # Screen a saved chain snapshot offline
//! spread-scanner screen --snapshot data/spy.json --date 2026-10-19
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::info;

use spread_scanner::analytics::{best_by_expiration, rank_candidates, top_candidates};
use spread_scanner::{
    OptionsSnapshot, ScanConfig, Scanner, SpreadCandidate, SpreadScreener, SpreadScreenerConfig,
    TradierClient,
};

const SEPARATOR: &str = "============================================================";

/// Put credit spread scanner CLI.
#[derive(Parser)]
#[command(name = "spread-scanner")]
#[command(about = "Find delta-targeted put credit spreads and rank them by expected value")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a watchlist against live market data
    Scan {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Comma-separated list of tickers (overrides the watchlist)
        #[arg(long)]
        tickers: Option<String>,

        /// Screening preset (overrides the config's screener section)
        #[arg(long, value_enum)]
        preset: Option<Preset>,

        /// Number of trades in the summary
        #[arg(long, default_value_t = 3)]
        top: usize,

        /// Trades listed per expiration in the by-expiration view
        #[arg(long, default_value_t = 10)]
        per_date: usize,

        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Screen a saved options snapshot without network access
    Screen {
        /// Snapshot JSON (one snapshot or a list)
        #[arg(long)]
        snapshot: PathBuf,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Screening preset (overrides the config's screener section)
        #[arg(long, value_enum)]
        preset: Option<Preset>,

        /// Valuation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Number of trades in the summary
        #[arg(long, default_value_t = 3)]
        top: usize,

        /// Trades listed per expiration in the by-expiration view
        #[arg(long, default_value_t = 10)]
        per_date: usize,

        /// Write the ranked candidates as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// Nearest-delta match with price-tiered widths
    Nearest,
    /// Fixed $5 width, midpoint pricing, positive EV only
    Fixed,
}

impl Preset {
    fn screener_config(self) -> SpreadScreenerConfig {
        match self {
            Self::Nearest => SpreadScreenerConfig::nearest_match(),
            Self::Fixed => SpreadScreenerConfig::fixed_width(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Many(Vec<OptionsSnapshot>),
    One(OptionsSnapshot),
}

fn load_config(path: Option<&Path>, preset: Option<Preset>) -> Result<ScanConfig> {
    let mut config = match path {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScanConfig::default(),
    };
    if let Some(preset) = preset {
        config.screener = preset.screener_config();
    }
    Ok(config)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("\nSaved to {}", path.display());
    Ok(())
}

fn print_candidates(candidates: &[SpreadCandidate], today: NaiveDate) {
    if candidates.is_empty() {
        println!("\nNo trades found.");
        return;
    }

    println!(
        "\n{:<6} {:<10} {:>4} {:>9} {:>13} {:>5} {:>6} {:>7} {:>7} {:>6} {:>7} {:>7}",
        "Ticker", "Expiry", "DTE", "Price", "Spread", "OTM%", "Delta", "Credit", "Risk", "Win%",
        "ROI%", "EV"
    );
    println!("{}", "-".repeat(102));
    for c in candidates {
        println!(
            "{:<6} {:<10} {:>4} {:>9.2} {:>13} {:>5.1} {:>6.2} {:>7.2} {:>7.2} {:>6.1} {:>7.1} {:>7.2}",
            c.ticker,
            c.expiration_date,
            c.days_to_expiration(today),
            c.underlying_price,
            c.to_string(),
            c.distance_pct(),
            c.short_delta,
            c.net_credit,
            c.max_risk,
            c.win_probability * 100.0,
            c.roi * 100.0,
            c.expected_value
        );
    }
}

fn print_best_by_expiration(candidates: &[SpreadCandidate], dates: usize, per_date: usize) {
    let grouped = best_by_expiration(candidates, per_date);
    if grouped.is_empty() {
        return;
    }
    println!("\nBest trades by expiration:");
    for (expiration, best) in grouped.iter().take(dates) {
        let picks: Vec<String> = best
            .iter()
            .map(|c| format!("{} {} (EV {:.2})", c.ticker, c, c.expected_value))
            .collect();
        println!("  {}: {}", expiration, picks.join(", "));
    }
}

async fn cmd_scan(
    config_path: Option<PathBuf>,
    tickers: Option<String>,
    preset: Option<Preset>,
    top: usize,
    per_date: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let token =
        std::env::var("TRADIER_TOKEN").context("TRADIER_TOKEN environment variable not set")?;

    let config = load_config(config_path.as_deref(), preset)?;
    let ticker_list: Vec<String> = match tickers {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect(),
        None => config.tickers(),
    };

    let client = TradierClient::with_config(token, &config.provider);
    let scanner = Scanner::new(client, config);
    let today = Local::now().date_naive();

    println!("{}", SEPARATOR);
    println!("Put Credit Spread Scan ({})", today);
    println!("{}", SEPARATOR);
    println!("  Tickers: {}", ticker_list.len());
    println!("  Expirations: {:?}", scanner.config().expirations);
    println!("  Target delta: {:.2}", scanner.config().screener.target_delta);

    let pb = ProgressBar::new(ticker_list.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let report = scanner
        .scan_tickers_with(&ticker_list, today, |ticker| {
            pb.inc(1);
            pb.set_message(ticker.to_string());
        })
        .await;
    pb.finish_and_clear();

    info!(
        "{} requests, {} chains evaluated",
        scanner.provider().request_count(),
        report.chains_evaluated
    );

    print_candidates(&report.candidates, today);
    print_best_by_expiration(&report.candidates, 8, per_date);

    if !report.issues.is_empty() {
        println!("\nSkipped {} provider errors:", report.issues.len());
        for issue in &report.issues {
            match issue.expiration {
                Some(exp) => println!("  {} {}: {}", issue.ticker, exp, issue.error),
                None => println!("  {}: {}", issue.ticker, issue.error),
            }
        }
    }

    println!("\n{}", SEPARATOR);
    println!("{}", report.summary(top).trim_end());
    println!("{}", SEPARATOR);

    if let Some(path) = output {
        write_json(&path, &report)?;
    }

    Ok(())
}

fn cmd_screen(
    snapshot_path: PathBuf,
    config_path: Option<PathBuf>,
    preset: Option<Preset>,
    date: Option<String>,
    top: usize,
    per_date: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref(), preset)?;
    let today = match date {
        Some(d) => NaiveDate::parse_from_str(&d, "%Y-%m-%d").context("Invalid date format")?,
        None => Local::now().date_naive(),
    };

    let content = fs::read_to_string(&snapshot_path)
        .with_context(|| format!("Failed to read {}", snapshot_path.display()))?;
    let snapshots = match serde_json::from_str::<SnapshotFile>(&content)
        .context("Failed to parse snapshot JSON")?
    {
        SnapshotFile::Many(list) => list,
        SnapshotFile::One(snapshot) => vec![snapshot],
    };

    let screener = SpreadScreener::new(config.screener.clone());
    let mut candidates: Vec<SpreadCandidate> = Vec::new();
    for snapshot in &snapshots {
        if snapshot.underlying_price < config.min_underlying_price {
            info!(
                "Skipping {} (price {} below minimum)",
                snapshot.ticker, snapshot.underlying_price
            );
            continue;
        }
        candidates.extend(screener.screen_snapshot(snapshot, &config.expirations, today));
    }
    rank_candidates(&mut candidates);

    println!("{}", SEPARATOR);
    println!("Offline Screen ({} snapshots, as of {})", snapshots.len(), today);
    println!("  Quotes: {}", snapshots.iter().map(|s| s.total_quotes()).sum::<usize>());
    println!("{}", SEPARATOR);

    print_candidates(&candidates, today);
    print_best_by_expiration(&candidates, 8, per_date);

    println!("\nFound {} opportunities.", candidates.len());
    for c in top_candidates(&candidates, top) {
        println!(
            "  {} {}: {} | Win: {:.1}% | Credit: ${:.2}",
            c.ticker,
            c.expiration_date,
            c,
            c.win_probability * 100.0,
            c.net_credit
        );
    }

    if let Some(path) = output {
        write_json(&path, &candidates)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spread_scanner=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            config,
            tickers,
            preset,
            top,
            per_date,
            output,
        } => {
            cmd_scan(config, tickers, preset, top, per_date, output).await?;
        }
        Commands::Screen {
            snapshot,
            config,
            preset,
            date,
            top,
            per_date,
            output,
        } => {
            cmd_screen(snapshot, config, preset, date, top, per_date, output)?;
        }
    }

    Ok(())
}
