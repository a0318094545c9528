mod cli;
mod error;
mod mine;
mod params;
mod plan;
mod tick;

use std::sync::atomic::AtomicBool;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use {
    cli::{Command, Launchkit},
    mine::{AddressMiningRequest, Miner, MiningOptions, TokenMiner, guess_token_address},
    params::{DEFAULT_GRADUATION_LIQUIDITY, DefaultValueParams, LaunchQuote, PoolParams},
    plan::{LaunchConfig, LaunchPlan},
    tick::{TickPriceCalculator, compute_tick_price, round_tick_to_nearest_tick},
};

/// Entry point for the launchkit deployment toolkit.
///
/// Prices launch and graduation market caps as concentrated-liquidity pool
/// ticks and mines CREATE2 salts so that a launchpad token sorts below its
/// funding token. Results are printed to stdout, logs go to stderr.
///
/// # Error
///
/// Returns an error if any input is malformed, a tick falls outside the pool
/// range, or the salt search runs out of attempts.
fn main() -> anyhow::Result<()> {
    let cli = Launchkit::parse();
    init_logging(&cli.log_level);

    // Never raised by the CLI itself; the search simply runs to completion
    // or exhaustion.
    let cancel = AtomicBool::new(false);

    match cli.command {
        Command::Tick {
            market_cap,
            quote_price,
            decimals,
            tick_spacing,
        } => {
            let tick = compute_tick_price(market_cap, quote_price, decimals, tick_spacing)?;
            println!("{tick}");
        }
        Command::Round { tick, tick_spacing } => {
            println!("{}", round_tick_to_nearest_tick(tick, tick_spacing)?);
        }
        Command::Params {
            quote_price,
            preset,
            launch_cap,
            graduation_cap,
            decimals,
            tick_spacing,
            fee,
            upper_max_tick,
        } => {
            // Start from the adapter's pool settings and apply any overrides
            let defaults = preset.pool();
            let pool = PoolParams {
                tick_spacing: tick_spacing.unwrap_or(defaults.tick_spacing),
                fee: fee.unwrap_or(defaults.fee),
                upper_max_tick: upper_max_tick.unwrap_or(defaults.upper_max_tick),
            };
            let quote = LaunchQuote {
                launch_cap_usd: launch_cap,
                graduation_cap_usd: graduation_cap,
                quote_price_usd: quote_price,
                quote_decimals: decimals,
            };
            let params = DefaultValueParams::compute(
                &TickPriceCalculator::default(),
                &quote,
                &pool,
                DEFAULT_GRADUATION_LIQUIDITY,
            )?;
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
        Command::Mine {
            launchpad,
            reference,
            deployer,
            name,
            symbol,
            init_code,
            max_attempts,
            seed,
        } => {
            let request = AddressMiningRequest {
                launchpad,
                init_code: init_code.resolve()?,
                reference,
                deployer,
                name,
                symbol,
            };
            let options = MiningOptions {
                max_attempts,
                seed,
                ..MiningOptions::default()
            };
            let mined = guess_token_address(&request, &options, &cancel)?;

            // Output the discovered salt and resulting token address
            println!("Found salt {:?} ==> {:?}", mined.salt, mined.address);
        }
        Command::Address {
            launchpad,
            deployer,
            name,
            symbol,
            salt,
            init_code,
        } => {
            let miner =
                TokenMiner::new(launchpad, &init_code.resolve()?, deployer, &name, &symbol)?;
            println!("{:?}", miner.compute_address(&salt));
        }
        Command::Plan { config } => {
            let config = LaunchConfig::from_file(&config)?;
            let plan = LaunchPlan::build(&config, &cancel)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
    }

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("launchkit={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
