//! Launch plans: everything the launchpad's `createAndBuy` needs, computed
//! offline from a TOML description of the token.

use std::{
    path::{Path, PathBuf},
    sync::atomic::AtomicBool,
};

use alloy_primitives::{Address, B256, Bytes, U256};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{Error, Result, parse_address, parse_hex},
    mine::{
        AddressMiningRequest, DEFAULT_MAX_ATTEMPTS, InitCode, MiningOptions, guess_token_address,
    },
    params::{AdapterPreset, LaunchQuote, LaunchTicks, PoolParams, as_decimal},
    tick::{SupplyConvention, TickPriceCalculator},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LaunchConfig {
    /// Launchpad proxy that deploys the token.
    pub(crate) launchpad: String,
    pub(crate) deployer: String,
    /// Quote token the launch is paired with.
    pub(crate) funding_token: String,
    #[serde(default)]
    pub(crate) adapter: Option<AdapterPreset>,
    pub(crate) quote_price_usd: f64,
    #[serde(default = "default_quote_decimals")]
    pub(crate) quote_decimals: u32,
    pub(crate) token: TokenConfig,
    pub(crate) market_cap: MarketCapConfig,
    #[serde(default)]
    pub(crate) pool: PoolOverrides,
    #[serde(default)]
    pub(crate) supply: SupplyConfig,
    #[serde(default)]
    pub(crate) mining: MiningConfig,

    /// Directory relative artifact paths resolve against.
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TokenConfig {
    pub(crate) name: String,
    pub(crate) symbol: String,
    #[serde(default)]
    pub(crate) metadata: String,
    /// Decimal base units; defaults to the whole supply.
    #[serde(default)]
    pub(crate) limit_per_wallet: Option<String>,
    #[serde(default)]
    pub(crate) bytecode: Option<String>,
    #[serde(default)]
    pub(crate) artifact: Option<PathBuf>,
    #[serde(default)]
    pub(crate) init_code_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MarketCapConfig {
    pub(crate) launch_usd: f64,
    pub(crate) graduation_usd: f64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PoolOverrides {
    pub(crate) tick_spacing: Option<i32>,
    pub(crate) fee: Option<u32>,
    pub(crate) upper_max_tick: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SupplyConfig {
    /// Decimal base units.
    pub(crate) total_supply: Option<String>,
    pub(crate) cap_precision: Option<u64>,
    pub(crate) ratio_decimals: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MiningConfig {
    pub(crate) max_attempts: Option<u64>,
    pub(crate) batch_size: Option<u64>,
    pub(crate) seed: Option<u64>,
}

fn default_quote_decimals() -> u32 {
    18
}

impl LaunchConfig {
    /// Load configuration from file
    pub(crate) fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading launch config {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing launch config {}", path.display()))?;

        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(config)
    }

    /// Preset pool settings with explicit overrides applied.
    pub(crate) fn pool(&self) -> Result<PoolParams> {
        let preset = self.adapter.map(AdapterPreset::pool);
        let overrides = &self.pool;

        let missing = |field: &str| {
            Error::Config(format!("pool.{field} is required when no adapter preset is set"))
        };

        Ok(PoolParams {
            tick_spacing: overrides
                .tick_spacing
                .or(preset.map(|p| p.tick_spacing))
                .ok_or_else(|| missing("tick_spacing"))?,
            fee: overrides
                .fee
                .or(preset.map(|p| p.fee))
                .ok_or_else(|| missing("fee"))?,
            upper_max_tick: overrides
                .upper_max_tick
                .or(preset.map(|p| p.upper_max_tick))
                .ok_or_else(|| missing("upper_max_tick"))?,
        })
    }

    pub(crate) fn calculator(&self) -> Result<TickPriceCalculator> {
        let defaults = SupplyConvention::default();
        let total_supply = match &self.supply.total_supply {
            Some(raw) => parse_amount("supply.total_supply", raw)?,
            None => defaults.total_supply,
        };
        TickPriceCalculator::new(SupplyConvention {
            total_supply,
            cap_precision: self.supply.cap_precision.unwrap_or(defaults.cap_precision),
            ratio_decimals: self.supply.ratio_decimals.unwrap_or(defaults.ratio_decimals),
        })
    }

    pub(crate) fn init_code(&self) -> Result<InitCode> {
        let artifact = self.token.artifact.as_ref().map(|p| self.base_dir.join(p));
        init_code_from(
            self.token.bytecode.as_deref(),
            artifact.as_deref(),
            self.token.init_code_hash.as_deref(),
        )
    }

    pub(crate) fn mining_options(&self) -> MiningOptions {
        let defaults = MiningOptions::default();
        MiningOptions {
            max_attempts: self.mining.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            batch_size: self.mining.batch_size.unwrap_or(defaults.batch_size),
            seed: self.mining.seed,
            ..defaults
        }
    }
}

/// Builds init code from exactly one of creation bytecode, a Hardhat
/// artifact, or a precomputed init code hash.
pub(crate) fn init_code_from(
    bytecode: Option<&str>,
    artifact: Option<&Path>,
    init_code_hash: Option<&str>,
) -> Result<InitCode> {
    match (bytecode, artifact, init_code_hash) {
        (Some(hex), None, None) => Ok(InitCode::Creation(Bytes::from(parse_hex(hex)?))),
        (None, Some(path), None) => read_artifact(path).map(InitCode::Creation),
        (None, None, Some(hex)) => {
            let raw = parse_hex(hex)?;
            if raw.len() != 32 {
                return Err(Error::InvalidInitCode(format!(
                    "init code hash must be 32 bytes, got {}",
                    raw.len()
                )));
            }
            Ok(InitCode::Hash(B256::from_slice(&raw)))
        }
        (None, None, None) => Err(Error::InvalidInitCode(
            "one of bytecode, artifact or init code hash is required".into(),
        )),
        _ => Err(Error::InvalidInitCode(
            "bytecode, artifact and init code hash are mutually exclusive".into(),
        )),
    }
}

#[derive(Deserialize)]
struct HardhatArtifact {
    bytecode: String,
}

/// Reads the creation bytecode out of a Hardhat artifact.
pub(crate) fn read_artifact(path: &Path) -> Result<Bytes> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    let artifact: HardhatArtifact = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    Ok(Bytes::from(parse_hex(&artifact.bytecode)?))
}

fn parse_amount(field: &str, raw: &str) -> Result<U256> {
    raw.parse::<U256>()
        .map_err(|e| Error::Config(format!("{field}: {raw} is not an amount: {e}")))
}

/// Arguments of the launchpad's `createAndBuy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateParams {
    pub(crate) funding_token: Address,
    #[serde(serialize_with = "as_decimal")]
    pub(crate) limit_per_wallet: U256,
    pub(crate) metadata: String,
    pub(crate) name: String,
    pub(crate) salt: B256,
    pub(crate) symbol: String,
    #[serde(flatten)]
    pub(crate) ticks: LaunchTicks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LaunchPlan {
    pub(crate) token: CreateParams,
    /// Where the launchpad will deploy the token.
    pub(crate) computed_address: Address,
    pub(crate) salt_hash: B256,
    pub(crate) attempts: u64,
}

impl LaunchPlan {
    pub(crate) fn build(config: &LaunchConfig, cancel: &AtomicBool) -> Result<Self> {
        let launchpad = parse_address(&config.launchpad)?;
        let deployer = parse_address(&config.deployer)?;
        let funding_token = parse_address(&config.funding_token)?;

        let calc = config.calculator()?;
        let pool = config.pool()?;
        let quote = LaunchQuote {
            launch_cap_usd: config.market_cap.launch_usd,
            graduation_cap_usd: config.market_cap.graduation_usd,
            quote_price_usd: config.quote_price_usd,
            quote_decimals: config.quote_decimals,
        };
        let ticks = LaunchTicks::compute(&calc, &quote, &pool)?;

        info!(
            launch_tick = ticks.launch_tick,
            graduation_tick = ticks.graduation_tick,
            upper_max_tick = ticks.upper_max_tick,
            tick_spacing = pool.tick_spacing,
            "computed launch ticks"
        );

        let limit_per_wallet = match &config.token.limit_per_wallet {
            Some(raw) => parse_amount("token.limit_per_wallet", raw)?,
            None => calc.supply().total_supply,
        };

        let request = AddressMiningRequest {
            launchpad,
            init_code: config.init_code()?,
            reference: funding_token,
            deployer,
            name: config.token.name.clone(),
            symbol: config.token.symbol.clone(),
        };
        let mined = guess_token_address(&request, &config.mining_options(), cancel)?;

        Ok(Self {
            token: CreateParams {
                funding_token,
                limit_per_wallet,
                metadata: config.token.metadata.clone(),
                name: request.name,
                salt: mined.salt,
                symbol: request.symbol,
                ticks,
            },
            computed_address: mined.address,
            salt_hash: mined.salt_hash,
            attempts: mined.attempts,
        })
    }
}

#[cfg(test)]
const NILE_CONFIG: &str = r#"
launchpad = "0xc0ffee0000000000000000000000000000000001"
deployer = "0xb0a8169d471051130cc458e4862b7fd0008cdf82"
funding_token = "0xe5d7c2a44ffddf6b295a15c148167daaaf5cf34f"
adapter = "ramses"
quote_price_usd = 1800.0

[token]
name = "Test Token"
symbol = "TEST"
metadata = '{"image":"https://i.imgur.com/56aQaCV.png"}'
artifact = "TokenTemplate.json"

[market_cap]
launch_usd = 67000
graduation_usd = 69000

[mining]
seed = 11
batch_size = 128
"#;

#[cfg(test)]
fn write_config(dir: &Path, body: &str) -> PathBuf {
    std::fs::write(
        dir.join("TokenTemplate.json"),
        r#"{"contractName":"TokenTemplate","bytecode":"0x6080604052"}"#,
    )
    .unwrap();
    let path = dir.join("launch.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_plan_from_file() {
    use crate::mine::{Miner, TokenMiner};

    let dir = tempfile::tempdir().unwrap();
    let config = LaunchConfig::from_file(&write_config(dir.path(), NILE_CONFIG)).unwrap();
    let plan = LaunchPlan::build(&config, &AtomicBool::new(false)).unwrap();

    assert_eq!(
        plan.token.ticks,
        LaunchTicks {
            launch_tick: -171_000,
            graduation_tick: -170_500,
            upper_max_tick: 887_000,
        }
    );
    assert!(plan.computed_address < plan.token.funding_token);
    assert_eq!(
        plan.token.limit_per_wallet,
        U256::from(1_000_000_000u128 * 10u128.pow(18))
    );

    let request = AddressMiningRequest {
        launchpad: parse_address(&config.launchpad).unwrap(),
        init_code: config.init_code().unwrap(),
        reference: plan.token.funding_token,
        deployer: parse_address(&config.deployer).unwrap(),
        name: "Test Token".into(),
        symbol: "TEST".into(),
    };
    assert_eq!(
        TokenMiner::from_request(&request)
            .unwrap()
            .compute_address(&plan.token.salt),
        plan.computed_address
    );

    // Same seed, same salt.
    let again = LaunchPlan::build(&config, &AtomicBool::new(false)).unwrap();
    assert_eq!(again, plan);
}

#[test]
fn test_plan_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    let config = LaunchConfig::from_file(&write_config(dir.path(), NILE_CONFIG)).unwrap();
    let plan = LaunchPlan::build(&config, &AtomicBool::new(false)).unwrap();
    let json = serde_json::to_value(&plan).unwrap();

    let token = &json["token"];
    assert_eq!(token["launchTick"], -171_000);
    assert_eq!(token["graduationTick"], -170_500);
    assert_eq!(token["upperMaxTick"], 887_000);
    assert_eq!(token["limitPerWallet"], "1000000000000000000000000000");
    assert_eq!(token["symbol"], "TEST");
    assert!(json["computedAddress"].is_string());
    assert!(token["salt"].is_string());
}

#[test]
fn test_pool_requires_preset_or_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let body = NILE_CONFIG.replace("adapter = \"ramses\"\n", "");
    let config = LaunchConfig::from_file(&write_config(dir.path(), &body)).unwrap();
    assert!(matches!(config.pool(), Err(Error::Config(_))));

    let body =
        format!("{body}\n[pool]\ntick_spacing = 100\nfee = 5000\nupper_max_tick = 887200\n");
    let config = LaunchConfig::from_file(&write_config(dir.path(), &body)).unwrap();
    assert_eq!(
        config.pool().unwrap(),
        PoolParams {
            tick_spacing: 100,
            fee: 5_000,
            upper_max_tick: 887_200,
        }
    );
}

#[test]
fn test_bad_funding_token_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let body = NILE_CONFIG.replace(
        "0xe5d7c2a44ffddf6b295a15c148167daaaf5cf34f",
        "0xe5d7c2a44ffddf6b295a15c148167daaaf5c",
    );
    let config = LaunchConfig::from_file(&write_config(dir.path(), &body)).unwrap();
    assert!(matches!(
        LaunchPlan::build(&config, &AtomicBool::new(false)),
        Err(Error::InvalidAddressFormat(_))
    ));
}

#[test]
fn test_unknown_field_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let body = NILE_CONFIG.replace("quote_price_usd", "quote_price");
    assert!(LaunchConfig::from_file(&write_config(dir.path(), &body)).is_err());
}

#[test]
fn test_init_code_sources_are_exclusive() {
    assert!(matches!(
        init_code_from(Some("0x60"), None, Some(format!("0x{}", "11".repeat(32)).as_str())),
        Err(Error::InvalidInitCode(_))
    ));
    assert!(matches!(
        init_code_from(None, None, None),
        Err(Error::InvalidInitCode(_))
    ));
    assert!(matches!(
        init_code_from(None, None, Some("0x1111")),
        Err(Error::InvalidInitCode(_))
    ));
    assert_eq!(
        init_code_from(None, None, Some("22".repeat(32).as_str())).unwrap(),
        InitCode::Hash(B256::repeat_byte(0x22))
    );
}
