use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::{Balance, Order, OrderKind, Side};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use trading_engine::executor::twap::delay_from_secs;
use trading_engine::executor::{
    BatchReport, ExecutionHandle, ExecutionResult, FailurePolicy, GridMode, GridPlan, OrderIntent,
    StepBias, TwapPlan,
};
use trading_engine::{logging, AppConfig, BinanceFuturesClient, DryRunClient, ExchangeClient, OrderExecutor};

#[derive(Parser)]
#[command(name = "trading-engine")]
#[command(about = "Order execution engine for Binance USDⓈ-M futures")]
struct Cli {
    /// TOML config file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Acknowledge orders locally instead of sending them to the exchange
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place a single order
    Order {
        #[arg(short, long)]
        symbol: String,
        #[arg(long)]
        side: Side,
        #[arg(short = 't', long = "type", default_value = "MARKET")]
        kind: OrderKind,
        #[arg(short, long)]
        quantity: Decimal,
        #[arg(short, long)]
        price: Option<Decimal>,
        #[arg(long)]
        stop_price: Option<Decimal>,
    },
    /// Split a quantity into equal slices submitted over time
    Twap {
        #[arg(short, long)]
        symbol: String,
        #[arg(long)]
        side: Side,
        #[arg(short = 't', long = "type", default_value = "MARKET")]
        kind: OrderKind,
        /// Total quantity across all slices
        #[arg(short, long)]
        quantity: Decimal,
        #[arg(short, long)]
        intervals: u32,
        /// Seconds between slices
        #[arg(short, long, default_value = "0")]
        delay: f64,
        /// Price of the first slice
        #[arg(short, long)]
        price: Option<Decimal>,
        #[arg(long, default_value = "0")]
        price_step: Decimal,
        /// Stop price of the first slice
        #[arg(long)]
        stop_price: Option<Decimal>,
        #[arg(long, default_value = "0")]
        stop_step: Decimal,
        /// Walk prices down for BUY and up for SELL
        #[arg(long)]
        against_side: bool,
        #[arg(long)]
        stop_on_failure: bool,
    },
    /// Place a ladder of limit orders around a base price
    Grid {
        #[arg(short, long)]
        symbol: String,
        /// BUY, SELL or BOTH
        #[arg(long)]
        side: GridMode,
        #[arg(short, long)]
        base_price: Decimal,
        /// Quantity per level
        #[arg(short, long)]
        quantity: Decimal,
        #[arg(short = 'n', long)]
        size: u32,
        /// Offset per level, in percent of the base price
        #[arg(long)]
        stop_percent: Decimal,
        #[arg(short, long, default_value = "0")]
        delay: f64,
        #[arg(long)]
        stop_on_failure: bool,
    },
    /// Cancel an open order
    Cancel {
        #[arg(short, long)]
        symbol: String,
        #[arg(short, long)]
        order_id: i64,
    },
    /// List open orders, or every order for a symbol with --all
    Orders {
        #[arg(short, long)]
        symbol: Option<String>,
        #[arg(long)]
        all: bool,
    },
    Balance {
        #[arg(short, long)]
        asset: Option<String>,
    },
    /// List perpetual contracts for a quote asset
    Symbols {
        #[arg(short, long, default_value = "USDT")]
        quote: String,
    },
    Position {
        #[arg(short, long)]
        symbol: String,
    },
    Ping,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging)?;

    let client: Arc<dyn ExchangeClient> = if cli.dry_run {
        Arc::new(DryRunClient::new(&config.exchange.client_order_id_prefix))
    } else {
        if config.credentials.is_none() {
            warn!("No API credentials set; signed requests will fail");
        }
        Arc::new(
            BinanceFuturesClient::new(&config.exchange, config.credentials.as_ref())
                .context("Failed to create exchange client")?,
        )
    };
    info!("Starting Trading Engine ({})", client.exchange_name());

    let executor = OrderExecutor::new(client, &config.executor);
    run(cli.command, &executor).await
}

async fn run(command: Commands, executor: &OrderExecutor) -> Result<()> {
    match command {
        Commands::Order {
            symbol,
            side,
            kind,
            quantity,
            price,
            stop_price,
        } => {
            let mut intent = OrderIntent::new(symbol, side, kind, quantity);
            intent.price = price;
            intent.stop_price = stop_price;

            let order = executor.place(&intent).await?;
            print_orders(&[order]);
        }
        Commands::Twap {
            symbol,
            side,
            kind,
            quantity,
            intervals,
            delay,
            price,
            price_step,
            stop_price,
            stop_step,
            against_side,
            stop_on_failure,
        } => {
            let mut plan = TwapPlan::new(symbol, side, kind, quantity, intervals)
                .with_delay(delay_from_secs(delay)?)
                .with_failure_policy(failure_policy(stop_on_failure));
            if let Some(price) = price {
                plan = plan.with_price(price, price_step);
            }
            if let Some(stop_price) = stop_price {
                plan = plan.with_stop_price(stop_price, stop_step);
            }
            if against_side {
                plan = plan.with_step_bias(StepBias::AgainstSide);
            }

            let report = wait_with_ctrl_c(executor.spawn_twap(plan)?).await?;
            finish(report)?;
        }
        Commands::Grid {
            symbol,
            side,
            base_price,
            quantity,
            size,
            stop_percent,
            delay,
            stop_on_failure,
        } => {
            let plan = GridPlan::new(symbol, side, base_price, quantity, size, stop_percent)
                .with_delay(delay_from_secs(delay)?)
                .with_failure_policy(failure_policy(stop_on_failure));

            let report = wait_with_ctrl_c(executor.spawn_grid(plan)?).await?;
            finish(report)?;
        }
        Commands::Cancel { symbol, order_id } => {
            let order = executor.cancel_order(&symbol, order_id).await?;
            print_orders(&[order]);
        }
        Commands::Orders { symbol, all } => {
            let orders = match (symbol.as_deref(), all) {
                (Some(symbol), true) => executor.all_orders(symbol).await?,
                (None, true) => bail!("--all needs --symbol"),
                (symbol, false) => executor.open_orders(symbol).await?,
            };
            print_orders(&orders);
        }
        Commands::Balance { asset } => {
            let balances = match asset {
                Some(asset) => match executor.balance(&asset).await? {
                    Some(balance) => vec![balance],
                    None => bail!("No balance for {}", asset.to_uppercase()),
                },
                None => executor.balances().await?,
            };
            print_balances(&balances);
        }
        Commands::Symbols { quote } => {
            let pairs = executor.tradable_pairs(&quote).await?;
            for pair in &pairs {
                println!("{}", pair);
            }
            println!("{} perpetual contracts quoted in {}", pairs.len(), quote.to_uppercase());
        }
        Commands::Position { symbol } => {
            let position = executor.position(&symbol).await?;
            println!("{} {}", symbol.to_uppercase(), position.normalize());
        }
        Commands::Ping => {
            executor.ping().await?;
            println!("pong from {}", executor.client().exchange_name());
        }
    }

    Ok(())
}

fn failure_policy(stop_on_failure: bool) -> FailurePolicy {
    if stop_on_failure {
        FailurePolicy::StopOnFailure
    } else {
        FailurePolicy::Continue
    }
}

/// Joins a running plan; the first Ctrl-C stops further submissions.
async fn wait_with_ctrl_c(handle: ExecutionHandle) -> Result<BatchReport> {
    let cancel = handle.cancel_handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, cancelling remaining orders");
            cancel.cancel();
        }
    });

    let report = handle.join().await.context("Execution task failed")?;
    watcher.abort();
    Ok(report)
}

/// Prints the report, then fails unless every planned order was placed.
fn finish(report: BatchReport) -> Result<()> {
    print_report(&report);
    report.into_result()?;
    Ok(())
}

fn print_orders(orders: &[Order]) {
    if orders.is_empty() {
        println!("No orders");
        return;
    }

    println!(
        "{:<12} {:<12} {:<5} {:<12} {:>14} {:>14} {:>14} {:<16} {:<19}",
        "ORDER ID", "SYMBOL", "SIDE", "TYPE", "PRICE", "QTY", "FILLED", "STATUS", "UPDATED"
    );
    for order in orders {
        println!(
            "{:<12} {:<12} {:<5} {:<12} {:>14} {:>14} {:>14} {:<16} {:<19}",
            order.order_id,
            order.symbol,
            order.side.as_str(),
            order.order_type,
            order.price.normalize().to_string(),
            order.orig_qty.normalize().to_string(),
            order.executed_qty.normalize().to_string(),
            order.status.as_str(),
            order.updated_at_display()
        );
    }
}

fn print_report(report: &BatchReport) {
    println!("{:>3}  {:<44} {:<8} {}", "#", "REQUEST", "RESULT", "DETAIL");
    for (i, result) in report.results().iter().enumerate() {
        let (label, detail) = match result {
            ExecutionResult::Placed { order, .. } => (
                "PLACED",
                format!(
                    "id {} {} filled {}",
                    order.order_id,
                    order.status.as_str(),
                    order.executed_qty.normalize()
                ),
            ),
            ExecutionResult::Failed { error, .. } => ("FAILED", error.to_string()),
            ExecutionResult::Skipped { reason, .. } => ("SKIPPED", reason.to_string()),
        };
        println!(
            "{:>3}  {:<44} {:<8} {}",
            i + 1,
            result.request().to_string(),
            label,
            detail
        );
    }
    println!("{}/{} orders placed", report.placed_count(), report.len());
}

fn print_balances(balances: &[Balance]) {
    println!(
        "{:<8} {:>18} {:>18} {:>18} {:>18}",
        "ASSET", "BALANCE", "AVAILABLE", "MAX WITHDRAW", "UNREALIZED PNL"
    );
    for b in balances {
        println!(
            "{:<8} {:>18} {:>18} {:>18} {:>18}",
            b.asset,
            b.balance.normalize().to_string(),
            b.available_balance.normalize().to_string(),
            b.max_withdraw_amount.normalize().to_string(),
            b.cross_un_pnl.normalize().to_string()
        );
    }
}
