use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flashloan_arb::application::Simulation;
use flashloan_arb::shared::config::SimulationConfig;
use flashloan_arb::shared::utils::format_amount;

#[derive(Parser, Debug)]
#[command(version, about = "Flash-loan arbitrage simulator over two constant-product venues")]
struct Args {
    /// Path to config file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// Amount to borrow (in borrow asset units, overrides config)
    #[arg(long)]
    amount: Option<f64>,

    /// Slippage tolerance in basis points (overrides config)
    #[arg(long)]
    slippage_bps: Option<u32>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut cfg = SimulationConfig::from_file(&args.config)?;
    // CLI has higher priority than the config file
    if let Some(amount) = args.amount {
        cfg.trade.amount = amount;
    }
    if let Some(slippage_bps) = args.slippage_bps {
        cfg.engine.slippage_bps = slippage_bps;
    }
    cfg.validate()?;

    let simulation = Simulation::from_config(&cfg).await?;
    let report = simulation.run().await;

    if args.json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    let asset = &simulation.borrow_asset;
    info!("Outcome: {:?}", report.outcome);
    if let Some(error) = &report.error {
        info!("Reason: {}", error);
    }
    for (symbol, before) in &report.balances_before.balances {
        let decimals = simulation
            .engine
            .assets()
            .by_symbol(symbol)
            .map(|a| a.decimals)
            .unwrap_or(asset.decimals);
        info!(
            "{}: {} -> {}",
            symbol,
            format_amount(*before, decimals),
            format_amount(report.balances_after.get(symbol), decimals)
        );
    }
    Ok(())
}
