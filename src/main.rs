use achievements::{AchievementEvaluator, StaticCatalog};
use analytics::end_of_day;
use anyhow::{Context, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::{Config, init_tracing, load_config_from};
use core_types::{Account, Instrument, OrderSide, SimulationParams};
use database::{DbRepository, Store, connect, run_migrations};
use executor::OrderExecutor;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use portfolio::PortfolioService;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// The main entry point for the tradesim application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config_from(&cli.config).context("Failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging).context("Failed to initialise logging")?;

    let pool = connect(&config.database)
        .await
        .context("Failed to connect to the database")?;

    if matches!(cli.command, Commands::Migrate) {
        run_migrations(&pool).await.context("Failed to run database migrations")?;
        println!("Migrations applied.");
        pool.close().await;
        return Ok(());
    }

    let repo = Arc::new(DbRepository::new(pool));
    let result = run(cli.command, repo.clone(), &config).await;
    repo.close().await;
    result
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A stock trading simulator: synthetic prices, atomic orders, P&L reconstruction.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path of the configuration file (it may be absent).
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the embedded database migrations.
    Migrate,
    /// Open a new account with a starting cash balance.
    CreateAccount {
        #[arg(long)]
        balance: Decimal,
    },
    /// Register a tradable instrument.
    CreateInstrument(CreateInstrumentArgs),
    /// Generate and store simulated daily history for one or more instruments.
    Simulate(SimulateArgs),
    /// Execute a market order at the instrument's current price.
    Order(OrderArgs),
    /// Realized profit and loss (FIFO) within an optional date window.
    Pnl {
        #[arg(long)]
        account: Uuid,
        /// First day of the window (format: YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day of the window, inclusive (format: YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// End-of-day holdings value for every day in a range.
    Valuation {
        #[arg(long)]
        account: Uuid,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        json: bool,
    },
    /// Open positions marked to current prices.
    Holdings {
        #[arg(long)]
        account: Uuid,
    },
    /// Recompute and store the account's cached portfolio value.
    RefreshValue {
        #[arg(long)]
        account: Uuid,
    },
}

#[derive(Parser)]
struct CreateInstrumentArgs {
    /// Ticker symbol (stored upper-case).
    #[arg(long)]
    symbol: String,
    #[arg(long)]
    price: Decimal,
    /// Daily volatility, in (0, 1).
    #[arg(long)]
    volatility: Option<Decimal>,
    /// Probability of a jump day, in (0, 1).
    #[arg(long)]
    jump_probability: Option<Decimal>,
    /// Largest jump multiplier, in (1, 2].
    #[arg(long)]
    max_jump_multiplier: Option<Decimal>,
    #[arg(long)]
    price_cap: Option<Decimal>,
}

#[derive(Parser)]
struct SimulateArgs {
    /// Symbols to simulate. Repeat the flag for several instruments.
    #[arg(long = "symbol", required = true)]
    symbols: Vec<String>,
    /// Number of days ending today. Defaults to `simulation.default_days`.
    #[arg(long)]
    days: Option<u32>,
    /// RNG seed. Defaults to `simulation.seed`, else OS entropy.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Parser)]
struct OrderArgs {
    #[arg(long)]
    account: Uuid,
    #[arg(long)]
    symbol: String,
    /// BUY or SELL.
    #[arg(long)]
    side: OrderSide,
    #[arg(long)]
    quantity: i64,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn run(command: Commands, repo: Arc<DbRepository>, config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = repo;
    match command {
        Commands::Migrate => Ok(()),
        Commands::CreateAccount { balance } => {
            if balance < Decimal::ZERO {
                bail!("Initial balance must not be negative, got {balance}");
            }
            let account = Account::new(balance);
            store.create_account(&account).await?;
            println!("Created account {} with balance {}", account.account_id, account.balance);
            Ok(())
        }
        Commands::CreateInstrument(args) => handle_create_instrument(args, store).await,
        Commands::Simulate(args) => handle_simulate(args, store, config).await,
        Commands::Order(args) => handle_order(args, store, config).await,
        Commands::Pnl {
            account,
            from,
            to,
            json,
        } => {
            let window_start = from.map_or(DateTime::<Utc>::MIN_UTC, |d| d.and_time(NaiveTime::MIN).and_utc());
            let window_end = to.map_or(DateTime::<Utc>::MAX_UTC, end_of_day);
            let report = PortfolioService::new(store)
                .realized_pnl(account, window_start, window_end)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            let mut table = Table::new();
            table.set_header(vec!["Time", "Instrument", "Qty", "Sell", "FIFO cost", "P&L", "Unmatched"]);
            for trade in &report.trades {
                table.add_row(vec![
                    trade.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                    trade.instrument_id.to_string(),
                    trade.quantity.to_string(),
                    trade.sell_price.to_string(),
                    trade.cost_basis.round_dp(4).to_string(),
                    trade.realized_pnl.round_dp(2).to_string(),
                    trade.unmatched_quantity.to_string(),
                ]);
            }
            println!("{table}");
            println!(
                "Total realized: {}  profitable: {}  unprofitable: {}  win rate: {}%",
                report.total_realized_pnl.round_dp(2),
                report.profitable_count,
                report.unprofitable_count,
                report.win_rate_pct.round_dp(2)
            );
            Ok(())
        }
        Commands::Valuation { account, from, to, json } => {
            let series = PortfolioService::new(store).daily_series(account, from, to).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&series)?);
                return Ok(());
            }

            let mut table = Table::new();
            table.set_header(vec!["Date", "Holdings value"]);
            for point in &series {
                table.add_row(vec![point.date.to_string(), point.total_value.round_dp(2).to_string()]);
            }
            println!("{table}");
            Ok(())
        }
        Commands::Holdings { account } => {
            let holdings = PortfolioService::new(store).holdings(account).await?;
            let mut table = Table::new();
            table.set_header(vec!["Symbol", "Qty", "Avg cost", "Price", "Market value", "Unrealized"]);
            for holding in &holdings {
                table.add_row(vec![
                    holding.symbol.clone(),
                    holding.quantity.to_string(),
                    holding.average_cost.round_dp(4).to_string(),
                    holding.current_price.to_string(),
                    holding.market_value.round_dp(2).to_string(),
                    holding.unrealized_pnl.round_dp(2).to_string(),
                ]);
            }
            println!("{table}");
            Ok(())
        }
        Commands::RefreshValue { account } => {
            let value = PortfolioService::new(store).refresh_portfolio_value(account).await?;
            println!("Portfolio value of {account}: {}", value.round_dp(2));
            Ok(())
        }
    }
}

async fn handle_create_instrument(args: CreateInstrumentArgs, store: Arc<dyn Store>) -> anyhow::Result<()> {
    let defaults = SimulationParams::default();
    let params = SimulationParams {
        volatility: args.volatility.unwrap_or(defaults.volatility),
        jump_probability: args.jump_probability.unwrap_or(defaults.jump_probability),
        max_jump_multiplier: args.max_jump_multiplier.unwrap_or(defaults.max_jump_multiplier),
        price_cap: args.price_cap,
    };
    let instrument = Instrument::new(&args.symbol, args.price, params)?;
    store.create_instrument(&instrument).await?;
    println!("Created instrument {} ({})", instrument.symbol, instrument.instrument_id);
    Ok(())
}

async fn resolve_instrument(store: &dyn Store, symbol: &str) -> anyhow::Result<Instrument> {
    store
        .find_instrument_by_symbol(symbol)
        .await?
        .with_context(|| format!("Unknown instrument symbol {symbol}"))
}

/// Seeds history for every requested symbol concurrently, one RNG per symbol.
async fn handle_simulate(args: SimulateArgs, store: Arc<dyn Store>, config: &Config) -> anyhow::Result<()> {
    let days = args.days.unwrap_or(config.simulation.default_days);
    let seed = args.seed.or(config.simulation.seed);

    let mut instruments = Vec::with_capacity(args.symbols.len());
    for symbol in &args.symbols {
        instruments.push(resolve_instrument(store.as_ref(), symbol).await?);
    }

    let progress_bar = ProgressBar::new(instruments.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let tasks = instruments.iter().enumerate().map(|(index, instrument)| {
        let store = store.clone();
        let pb = progress_bar.clone();
        async move {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
                None => StdRng::from_os_rng(),
            };
            let result = simulator::seed_history(store.as_ref(), instrument.instrument_id, days, &mut rng).await;
            pb.inc(1);
            pb.set_message(format!("{} done", instrument.symbol));
            (instrument.symbol.clone(), result)
        }
    });
    let results = join_all(tasks).await;
    progress_bar.finish_with_message("Simulation complete!");

    let mut table = Table::new();
    table.set_header(vec!["Symbol", "Days", "First close", "Last close", "Jumps"]);
    let mut failures = 0;
    for (symbol, result) in results {
        match result {
            Ok(observations) => {
                let first = observations.first().map(|o| o.price.to_string()).unwrap_or_default();
                let last = observations.last().map(|o| o.price.to_string()).unwrap_or_default();
                let jumps = observations.iter().filter(|o| o.was_jump).count();
                table.add_row(vec![symbol, observations.len().to_string(), first, last, jumps.to_string()]);
            }
            Err(e) => {
                failures += 1;
                tracing::error!(error = %e, %symbol, "Simulation failed.");
            }
        }
    }
    println!("{table}");

    if failures > 0 {
        bail!("{failures} instrument(s) failed to simulate");
    }
    Ok(())
}

async fn handle_order(args: OrderArgs, store: Arc<dyn Store>, config: &Config) -> anyhow::Result<()> {
    let instrument = resolve_instrument(store.as_ref(), &args.symbol).await?;
    let executor = OrderExecutor::new(store.clone());

    let receipt = executor
        .execute_order(args.account, instrument.instrument_id, args.side, args.quantity)
        .await?;
    println!(
        "{} {} {} @ {} = {} (transaction {})",
        receipt.side, receipt.quantity, instrument.symbol, receipt.price, receipt.total_amount, receipt.transaction_id
    );

    // The process exits right after this command, which would cut a detached hook
    // short, so achievements are evaluated inline here.
    if !config.achievements.is_empty() {
        let catalog = Arc::new(StaticCatalog::new(config.achievements.clone()));
        let evaluator = AchievementEvaluator::new(Arc::new(PortfolioService::new(store)), catalog.clone(), catalog);
        match evaluator.evaluate(args.account).await {
            Ok(codes) if !codes.is_empty() => println!("Achievements met: {}", codes.join(", ")),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Achievement evaluation failed."),
        }
    }
    Ok(())
}
