use std::path::PathBuf;

use alloy_primitives::{Address, B256};

use crate::{
    error::{Result, parse_address},
    mine::{DEFAULT_MAX_ATTEMPTS, InitCode},
    params::AdapterPreset,
    plan::init_code_from,
};

/// Command-line interface for launchkit.
///
/// launchkit prepares token launches on concentrated-liquidity launchpads:
/// it prices launch and graduation market caps as pool ticks and mines
/// CREATE2 salts that place new tokens below their funding token.
#[derive(Clone, Debug, clap::Parser)]
#[command(
    name = "launchkit",
    about = "Tick pricing and token address mining for concentrated-liquidity launchpads."
)]
pub(super) struct Launchkit {
    /// Log level for launchkit itself. `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    pub(super) log_level: String,

    #[command(subcommand)]
    pub(super) command: Command,
}

#[derive(Clone, Debug, clap::Subcommand)]
pub(super) enum Command {
    /// Computes the pool tick for a fully diluted market cap.
    Tick {
        /// Target market cap in USD.
        market_cap: f64,

        /// Price of the quote token in USD.
        quote_price: f64,

        /// Decimals of the quote token.
        #[arg(short, long, default_value_t = 18)]
        decimals: u32,

        #[arg(short = 's', long, default_value_t = 200)]
        tick_spacing: i32,
    },

    /// Rounds a tick to the nearest multiple of a tick spacing.
    Round {
        #[arg(allow_negative_numbers = true)]
        tick: i32,

        tick_spacing: i32,
    },

    /// Computes the per-adapter default launch parameters.
    Params {
        /// Price of the quote token in USD.
        quote_price: f64,

        /// Adapter whose pool settings apply.
        #[arg(short, long, value_enum, default_value_t = AdapterPreset::Pancake)]
        preset: AdapterPreset,

        /// Market cap in USD the token launches at.
        #[arg(long, default_value_t = 5_000.0)]
        launch_cap: f64,

        /// Market cap in USD the token graduates at.
        #[arg(long, default_value_t = 69_000.0)]
        graduation_cap: f64,

        /// Decimals of the quote token.
        #[arg(short, long, default_value_t = 18)]
        decimals: u32,

        /// Overrides the preset's tick spacing.
        #[arg(long)]
        tick_spacing: Option<i32>,

        /// Overrides the preset's pool fee.
        #[arg(long)]
        fee: Option<u32>,

        /// Overrides the preset's upper max tick.
        #[arg(long)]
        upper_max_tick: Option<i32>,
    },

    /// Mines a salt that deploys a launchpad token below a reference token.
    Mine {
        /// Address of the launchpad contract performing the deployment.
        #[arg(value_parser = parse_address)]
        launchpad: Address,

        /// Token the mined address must sort below, usually the funding token.
        #[arg(value_parser = parse_address)]
        reference: Address,

        /// Address creating the token.
        #[arg(value_parser = parse_address)]
        deployer: Address,

        /// Token name.
        name: String,

        /// Token symbol.
        symbol: String,

        #[command(flatten)]
        init_code: InitCodeArgs,

        /// Gives up after this many salts.
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u64,

        /// Seeds the salt stream for a reproducible search.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Recomputes the address a previously mined salt deploys a token to.
    Address {
        #[arg(value_parser = parse_address)]
        launchpad: Address,

        #[arg(value_parser = parse_address)]
        deployer: Address,

        name: String,

        symbol: String,

        /// Salt as passed to the launchpad.
        salt: B256,

        #[command(flatten)]
        init_code: InitCodeArgs,
    },

    /// Computes ticks and mines a salt for the launch described in a TOML file.
    Plan {
        /// Path to the launch config.
        config: PathBuf,
    },
}

/// Where the token's init code comes from.
#[derive(Clone, Debug, clap::Args)]
#[group(required = true, multiple = false)]
pub(super) struct InitCodeArgs {
    /// Hex creation bytecode, without constructor arguments.
    #[arg(long)]
    pub(super) bytecode: Option<String>,

    /// Hardhat artifact holding the creation bytecode.
    #[arg(long)]
    pub(super) artifact: Option<PathBuf>,

    /// Keccak256 of the complete init code.
    #[arg(long)]
    pub(super) init_code_hash: Option<String>,
}

impl InitCodeArgs {
    pub(super) fn resolve(&self) -> Result<InitCode> {
        init_code_from(
            self.bytecode.as_deref(),
            self.artifact.as_deref(),
            self.init_code_hash.as_deref(),
        )
    }
}

#[test]
fn test_cli_is_well_formed() {
    use clap::CommandFactory;

    Launchkit::command().debug_assert();
}

#[test]
fn test_mine_rejects_short_address() {
    use clap::Parser;

    let parsed = Launchkit::try_parse_from([
        "launchkit",
        "mine",
        "0xc0ffee0000000000000000000000000000000001",
        "0xbb4cdb9cbd36b01bd1cbaebf2de08d9173bc09",
        "0xb0a8169d471051130cc458e4862b7fd0008cdf82",
        "Test Token",
        "TEST",
        "--bytecode",
        "0x6080604052",
    ]);
    assert!(parsed.is_err());
}

#[test]
fn test_round_accepts_negative_tick() {
    use clap::Parser;

    let parsed = Launchkit::try_parse_from(["launchkit", "round", "-301", "200"]).unwrap();
    assert!(matches!(
        parsed.command,
        Command::Round {
            tick: -301,
            tick_spacing: 200
        }
    ));
}
