//! CLI over the analyzer:
//!   opsight --input operations.xlsx summary --date "2021-12-31 23:59:59"
//!   opsight --input operations.csv category --category Супермаркеты --date 31.12.2021
//!   opsight --input operations.csv invest --month 2021-12 --limit 50
//!
//! Results go to STDOUT as JSON, logs to STDERR.

use anyhow::{Context, Result, bail};
use chrono::{Local, Timelike};
use clap::{Arg, ArgAction, ArgMatches, Command};
use opsight::config::{ApiConfig, UserSettings};
use opsight::loader::load_operations;
use opsight::market::MarketClient;
use opsight::reports::{ReportNaming, report_end, spending_by_category, write_report};
use opsight::{Operation, investment_bank, views};
use rust_decimal::Decimal;
use serde::Serialize;
use std::{env, io, path::PathBuf, str::FromStr};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

fn cli() -> Command {
    Command::new("opsight")
        .about("Summaries, category reports and round-up savings from a bank operations export")
        .arg(
            Arg::new("input")
                .long("input")
                .global(true)
                .value_name("FILE")
                .help("Operations export, .xlsx or CSV (defaults to $PATH_FILE)"),
        )
        .arg(
            Arg::new("delimiter")
                .long("delimiter")
                .global(true)
                .value_name("CHAR")
                .default_value(",")
                .help("CSV field delimiter (ignored for workbooks)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("summary")
                .about("Greeting, cards, top expenses, currency rates and stock prices")
                .arg(
                    Arg::new("date")
                        .long("date")
                        .required(true)
                        .value_name("YYYY-MM-DD HH:MM:SS"),
                )
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .value_name("FILE")
                        .default_value("user_settings.json"),
                ),
        )
        .subcommand(
            Command::new("category")
                .about("Expenses in one category over the last three months")
                .arg(Arg::new("category").long("category").required(true))
                .arg(Arg::new("date").long("date").value_name("DD.MM.YYYY"))
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_name("FILE")
                        .help("Report file (generated name in the current directory otherwise)"),
                ),
        )
        .subcommand(
            Command::new("invest")
                .about("Round-up savings for one month")
                .arg(Arg::new("month").long("month").required(true).value_name("YYYY-MM"))
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_name("N"),
                ),
        )
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    // ---------------------------------------------------------------- logging
    // send all tracing output to STDERR, keeping STDOUT clean for JSON
    let level = if matches.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    // ---------------------------------------------------------------- ingest
    let in_path = matches
        .get_one::<String>("input")
        .map(PathBuf::from)
        .or_else(|| env::var_os("PATH_FILE").map(PathBuf::from));
    let Some(in_path) = in_path else {
        bail!("no input: pass --input FILE or set PATH_FILE");
    };
    let delimiter = match matches.get_one::<String>("delimiter").map(|d| d.as_bytes()) {
        Some([b]) => *b,
        _ => bail!("--delimiter must be a single ASCII character"),
    };
    let ops = load_operations(&in_path, delimiter)?;

    // ---------------------------------------------------------------- dispatch
    match matches.subcommand() {
        Some(("summary", sub)) => run_summary(&ops, sub),
        Some(("category", sub)) => run_category(&ops, sub),
        Some(("invest", sub)) => run_invest(&ops, sub),
        _ => bail!("unknown command"),
    }
}

fn run_summary(ops: &[Operation], sub: &ArgMatches) -> Result<()> {
    let target = sub.get_one::<String>("date").context("--date is required")?;
    let settings_path = sub
        .get_one::<String>("settings")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("user_settings.json"));
    let settings = UserSettings::load_or_default(&settings_path)?;
    let market = MarketClient::new(ApiConfig::from_env(), settings);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    let (rates, stocks) = rt.block_on(async { (market.currency_rates().await, market.stock_prices().await) });

    let summary = views::build_summary(ops, target, Local::now().hour(), rates, stocks);
    emit(&summary)
}

fn run_category(ops: &[Operation], sub: &ArgMatches) -> Result<()> {
    let category = sub.get_one::<String>("category").context("--category is required")?;
    let now = Local::now().naive_local();
    let end = report_end(sub.get_one::<String>("date").map(String::as_str), now)?;

    let rows = spending_by_category(ops, category, end);

    let naming = match sub.get_one::<String>("report") {
        Some(p) => ReportNaming::Fixed(PathBuf::from(p)),
        None => ReportNaming::Generated(PathBuf::from(".")),
    };
    // a failed write does not lose the result
    if let Err(e) = write_report("spending_by_category", &rows, &naming, now) {
        error!("{e:#}");
    }
    emit(&rows)
}

fn run_invest(ops: &[Operation], sub: &ArgMatches) -> Result<()> {
    let month = sub.get_one::<String>("month").context("--month is required")?;
    let raw_limit = sub.get_one::<String>("limit").context("--limit is required")?;
    let limit = Decimal::from_str(raw_limit.trim()).with_context(|| format!("--limit {raw_limit:?} is not a number"))?;

    let investment = investment_bank(month, ops, limit);
    info!("Round-up savings for {month}: {investment:.2}");
    emit(&Investment {
        month,
        limit,
        investment,
    })
}

#[derive(Serialize)]
struct Investment<'a> {
    month: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    limit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    investment: Decimal,
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}
