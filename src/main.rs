//! Monetary Correction CLI
//!
//! Calculates corrected awards for every claimant of a case and maintains
//! the local index cache.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use log::info;
use monetary_correction::aggregate::write_breakdown_csv;
use monetary_correction::claims::{load_case, load_claimants_csv, CaseParameters};
use monetary_correction::config::{BatchConfig, CacheConfig, DEFAULT_CACHE_PATH};
use monetary_correction::dates::{format_br_date, parse_br_date};
use monetary_correction::{
    BatchRunner, BcbClient, ClaimantResult, CorrectionIndex, GrandTotals, IndexCache,
    IndexSource, InterestPolicy, StaticSource,
};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "monetary-correction")]
#[command(version, about = "Monetary correction and moratory interest for judgment awards")]
struct Cli {
    /// Index cache file
    #[arg(long, global = true, default_value = DEFAULT_CACHE_PATH)]
    cache: PathBuf,

    /// Use cached index data only
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Calculate every claimant of a case
    Calculate(CalculateArgs),

    /// Show what the index cache holds
    CacheInfo,

    /// Empty the index cache
    CacheClear,

    /// Fetch the last five years of IPCA, INPC, IGP-M and SELIC into the cache
    Preload,

    /// Check that the central bank API answers and show the latest values of an index
    Probe(ProbeArgs),
}

#[derive(Args)]
struct CalculateArgs {
    /// Case file (extraction JSON)
    case: PathBuf,

    /// Claimant list (CSV) replacing the claimants of the case file
    #[arg(long)]
    claimants: Option<PathBuf>,

    /// Calculation date (DD/MM/YYYY). Defaults to the case's date, then today.
    #[arg(long, value_parser = parse_br_date)]
    date: Option<NaiveDate>,

    /// Correction index overriding the case's
    #[arg(long)]
    index: Option<CorrectionIndex>,

    /// Interest policy overriding the case's (1_PORCENTO, SELIC, SELIC_MENOS_IPCA)
    #[arg(long)]
    interest: Option<InterestPolicy>,

    /// Refetch index series even if the cache is fresh
    #[arg(long)]
    refresh: bool,

    /// Claimants calculated at the same time
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Write the monthly breakdown to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Args)]
struct ProbeArgs {
    /// Index to show
    #[arg(long, default_value_t = CorrectionIndex::Ipca)]
    index: CorrectionIndex,

    /// Number of latest values to show (at most 20)
    #[arg(long, default_value_t = 3)]
    latest: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Calculate(args) => calculate(&cli, args).await,
        Command::CacheInfo => cache_info(&cli).await,
        Command::CacheClear => {
            let cache = open_cache(&cli).await?;
            cache.clear().await.context("Failed to clear index cache")?;
            println!("Index cache cleared ({})", cli.cache.display());
            Ok(())
        }
        Command::Preload => {
            let cache = open_cache(&cli).await?;
            let loaded = cache.preload(today()).await;
            cache.flush().await.context("Failed to save index cache")?;
            println!("Preloaded {} of 4 indices", loaded);
            Ok(())
        }
        Command::Probe(args) => probe(args).await,
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn open_cache(cli: &Cli) -> Result<IndexCache> {
    let source: Arc<dyn IndexSource> = if cli.offline {
        Arc::new(StaticSource::offline())
    } else {
        Arc::new(BcbClient::new().context("Failed to build HTTP client")?)
    };
    let config = CacheConfig {
        path: Some(cli.cache.clone()),
        ..CacheConfig::default()
    };
    IndexCache::open(source, config)
        .await
        .with_context(|| format!("Failed to open index cache {}", cli.cache.display()))
}

async fn calculate(cli: &Cli, args: &CalculateArgs) -> Result<()> {
    let case = load_case(&args.case)
        .with_context(|| format!("Failed to load case {}", args.case.display()))?;

    let mut parameters = case.parameters.clone();
    if let Some(index) = args.index {
        parameters.index = index;
    }
    if let Some(policy) = args.interest {
        parameters.policy = policy;
    }

    let claimants = match &args.claimants {
        Some(path) => load_claimants_csv(path)
            .with_context(|| format!("Failed to load claimants {}", path.display()))?,
        None => case.claimants.clone(),
    };
    let end = match args.date.or(case.calculation_date) {
        Some(date) => date,
        None => {
            let date = today();
            info!("No calculation date given; using today ({})", format_br_date(date));
            date
        }
    };

    let cache = Arc::new(open_cache(cli).await?);
    if args.refresh {
        cache.expire_all().await;
    }

    let runner = BatchRunner::with_config(
        cache.clone(),
        BatchConfig {
            concurrency: args.concurrency,
        },
    );
    let outcome = runner.run(&claimants, &parameters, end).await;
    cache.flush().await.context("Failed to save index cache")?;
    let results = outcome.context("Calculation failed")?;

    let totals = GrandTotals::from_results(&results);
    print_report(&parameters, end, &results, &totals);

    if let Some(path) = &args.csv {
        let file = File::create(path)
            .with_context(|| format!("Unable to create {}", path.display()))?;
        write_breakdown_csv(&results, file).context("Failed to write breakdown CSV")?;
        println!("\nBreakdown written to: {}", path.display());
    }

    Ok(())
}

async fn cache_info(cli: &Cli) -> Result<()> {
    let cache = open_cache(cli).await?;
    let entries = cache.info().await;
    if entries.is_empty() {
        println!("Index cache is empty ({})", cli.cache.display());
        return Ok(());
    }

    println!("{:<8} {:>8}  {}", "Index", "Records", "Updated");
    println!("{}", "-".repeat(40));
    for entry in entries {
        println!(
            "{:<8} {:>8}  {}",
            entry.index,
            entry.records,
            entry.updated_at.with_timezone(&Local).format("%d/%m/%Y %H:%M")
        );
    }
    Ok(())
}

async fn probe(args: &ProbeArgs) -> Result<()> {
    let client = BcbClient::new().context("Failed to build HTTP client")?;
    if !client.probe().await {
        println!("Central bank API: offline");
        return Ok(());
    }
    println!("Central bank API: online");

    let latest = client
        .fetch_latest(args.index, args.latest)
        .await
        .with_context(|| format!("Failed to fetch latest {} values", args.index))?;
    println!("\n{}", args.index.display_name());
    for point in &latest {
        println!("  {}  {:>8.4}%", format_br_date(point.date), point.value);
    }
    Ok(())
}

/// `R$ 1.234,56`
fn format_brl(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, cents % 100)
}

fn print_report(
    parameters: &CaseParameters,
    end: NaiveDate,
    results: &[ClaimantResult],
    totals: &GrandTotals,
) {
    println!("Monetary Correction v{}", env!("CARGO_PKG_VERSION"));
    println!("==========================\n");

    if let Some(number) = &parameters.process_number {
        println!("Process: {}", number);
    }
    if let Some(chamber) = &parameters.chamber {
        println!("Chamber: {}", chamber);
    }
    if let Some(court) = &parameters.court {
        println!("Court: {}", court);
    }
    println!("Calculation date: {}", format_br_date(end));
    println!("Default index: {}", parameters.index.display_name());
    println!("Default interest: {}", parameters.policy.display_name());
    println!();

    println!(
        "{:<28} {:<14} {:>16} {:>10} {:>16} {:>10} {:>16} {:>16}",
        "Claimant", "Part", "Principal", "Factor", "Corrected", "Interest%", "Interest", "Total"
    );
    println!("{}", "-".repeat(134));

    for result in results {
        for portion in result.portions() {
            println!(
                "{:<28} {:<14} {:>16} {:>10.6} {:>16} {:>9.2}% {:>16} {:>16}",
                result.claimant.name,
                portion.portion.label(),
                format_brl(portion.principal),
                portion.accumulation_factor,
                format_brl(portion.corrected),
                portion.interest_percentage * 100.0,
                format_brl(portion.interest),
                format_brl(portion.total),
            );
        }
        if result.portions().len() > 1 {
            println!(
                "{:<28} {:<14} {:>16} {:>10.6} {:>16} {:>9.2}% {:>16} {:>16}",
                "",
                "Subtotal",
                format_brl(result.principal),
                result.accumulation_factor,
                format_brl(result.corrected),
                result.interest_percentage * 100.0,
                format_brl(result.interest),
                format_brl(result.total),
            );
        }
    }

    println!("{}", "-".repeat(134));
    println!("\nSummary:");
    println!("  Claimants: {}", totals.claimants);
    println!("  Principal: {}", format_brl(totals.principal));
    println!("  Corrected: {}", format_brl(totals.corrected));
    println!("  Interest: {}", format_brl(totals.interest));
    if totals.has_split() {
        println!("  Material damages: {}", format_brl(totals.material));
        println!("  Moral damages: {}", format_brl(totals.moral));
    }
    println!("  Grand total: {}", format_brl(totals.total));
}
