use alloy_primitives::U256;
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    error::{Error, Result},
    tick::{MAX_TICK, MIN_TICK, TickPriceCalculator, TickPriceQuery, round_tick_to_nearest_tick},
};

/// Liquidity the launchpad seeds at graduation: 800M tokens.
pub(crate) const DEFAULT_GRADUATION_LIQUIDITY: U256 =
    U256::from_limbs([0xe640_6697_2000_0000, 0x0295_be96, 0, 0]);

/// Concentrated-liquidity DEX forks the launchpad has adapters for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AdapterPreset {
    /// PancakeSwap v3 on BSC, 1% tier.
    Pancake,
    /// Thena on BSC, 0.3% tier.
    Thena,
    /// Ramses forks (Nile on Linea), 1% tier.
    Ramses,
}

/// Pool settings a launch is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolParams {
    pub(crate) tick_spacing: i32,
    /// Pool fee in hundredths of a basis point.
    pub(crate) fee: u32,
    /// Highest tick liquidity is spread to, before alignment.
    pub(crate) upper_max_tick: i32,
}

impl AdapterPreset {
    pub(crate) fn pool(self) -> PoolParams {
        match self {
            Self::Pancake => PoolParams {
                tick_spacing: 200,
                fee: 10_000,
                upper_max_tick: 887_000,
            },
            Self::Thena => PoolParams {
                tick_spacing: 60,
                fee: 3_000,
                upper_max_tick: 88_740,
            },
            Self::Ramses => PoolParams {
                tick_spacing: 500,
                fee: 10_000,
                upper_max_tick: 887_220,
            },
        }
    }
}

/// Market caps bracketing the bonding phase, priced in a quote token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LaunchQuote {
    pub(crate) launch_cap_usd: f64,
    pub(crate) graduation_cap_usd: f64,
    pub(crate) quote_price_usd: f64,
    pub(crate) quote_decimals: u32,
}

/// Tick triple a token is launched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LaunchTicks {
    pub(crate) launch_tick: i32,
    pub(crate) graduation_tick: i32,
    pub(crate) upper_max_tick: i32,
}

impl LaunchTicks {
    /// Computes aligned launch, graduation and upper ticks.
    ///
    /// Graduation is bumped one spacing above launch when both caps land on
    /// the same tick, since the launchpad rejects an empty bonding range.
    pub(crate) fn compute(
        calc: &TickPriceCalculator,
        quote: &LaunchQuote,
        pool: &PoolParams,
    ) -> Result<Self> {
        let query = |market_cap_usd| TickPriceQuery {
            market_cap_usd,
            quote_price_usd: quote.quote_price_usd,
            quote_decimals: quote.quote_decimals,
            tick_spacing: pool.tick_spacing,
        };

        let launch_tick = calc.compute_tick_price(&query(quote.launch_cap_usd))?;
        let mut graduation_tick = calc.compute_tick_price(&query(quote.graduation_cap_usd))?;
        if graduation_tick == launch_tick {
            graduation_tick += pool.tick_spacing;
        }
        let upper_max_tick = round_tick_to_nearest_tick(pool.upper_max_tick, pool.tick_spacing)?;

        let ticks = Self {
            launch_tick,
            graduation_tick,
            upper_max_tick,
        };
        ticks.validate()?;
        Ok(ticks)
    }

    fn validate(&self) -> Result<()> {
        if self.launch_tick < MIN_TICK {
            return Err(Error::InvalidInput(format!(
                "launch tick {} is below the pool minimum {MIN_TICK}",
                self.launch_tick
            )));
        }
        if self.graduation_tick < self.launch_tick {
            return Err(Error::InvalidInput(format!(
                "graduation tick {} is below launch tick {}",
                self.graduation_tick, self.launch_tick
            )));
        }
        if self.upper_max_tick < self.graduation_tick {
            return Err(Error::InvalidInput(format!(
                "upper max tick {} is below graduation tick {}",
                self.upper_max_tick, self.graduation_tick
            )));
        }
        if self.upper_max_tick > MAX_TICK {
            return Err(Error::InvalidInput(format!(
                "upper max tick {} exceeds the pool maximum {MAX_TICK}",
                self.upper_max_tick
            )));
        }
        Ok(())
    }
}

/// Per-adapter defaults the launchpad applies to new tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DefaultValueParams {
    #[serde(flatten)]
    pub(crate) ticks: LaunchTicks,
    pub(crate) fee: u32,
    pub(crate) tick_spacing: i32,
    #[serde(serialize_with = "as_decimal")]
    pub(crate) graduation_liquidity: U256,
}

impl DefaultValueParams {
    pub(crate) fn compute(
        calc: &TickPriceCalculator,
        quote: &LaunchQuote,
        pool: &PoolParams,
        graduation_liquidity: U256,
    ) -> Result<Self> {
        Ok(Self {
            ticks: LaunchTicks::compute(calc, quote, pool)?,
            fee: pool.fee,
            tick_spacing: pool.tick_spacing,
            graduation_liquidity,
        })
    }
}

/// Token amounts leave the tool as decimal strings; JSON numbers lose
/// precision past 2^53.
pub(crate) fn as_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[cfg(test)]
fn bnb_quote() -> LaunchQuote {
    LaunchQuote {
        launch_cap_usd: 5_000.0,
        graduation_cap_usd: 69_000.0,
        quote_price_usd: 618.0,
        quote_decimals: 18,
    }
}

#[test]
fn test_graduation_liquidity_constant() {
    assert_eq!(
        DEFAULT_GRADUATION_LIQUIDITY,
        U256::from(800_000_000u128 * 10u128.pow(18))
    );
}

#[test]
fn test_default_params_for_bsc_adapters() {
    let calc = TickPriceCalculator::default();

    let pancake = DefaultValueParams::compute(
        &calc,
        &bnb_quote(),
        &AdapterPreset::Pancake.pool(),
        DEFAULT_GRADUATION_LIQUIDITY,
    )
    .unwrap();
    assert_eq!(
        pancake.ticks,
        LaunchTicks {
            launch_tick: -186_400,
            graduation_tick: -160_000,
            upper_max_tick: 887_000,
        }
    );
    assert_eq!(pancake.fee, 10_000);

    let thena = DefaultValueParams::compute(
        &calc,
        &bnb_quote(),
        &AdapterPreset::Thena.pool(),
        DEFAULT_GRADUATION_LIQUIDITY,
    )
    .unwrap();
    assert_eq!(
        thena.ticks,
        LaunchTicks {
            launch_tick: -186_360,
            graduation_tick: -160_080,
            upper_max_tick: 88_740,
        }
    );
    assert_eq!(thena.tick_spacing, 60);
}

#[test]
fn test_graduation_bumped_when_caps_share_a_tick() {
    // $67k and $69k at ETH $1800 both round to -171000 on a 500 spacing.
    let quote = LaunchQuote {
        launch_cap_usd: 67_000.0,
        graduation_cap_usd: 69_000.0,
        quote_price_usd: 1_800.0,
        quote_decimals: 18,
    };
    let ticks = LaunchTicks::compute(
        &TickPriceCalculator::default(),
        &quote,
        &AdapterPreset::Ramses.pool(),
    )
    .unwrap();
    assert_eq!(ticks.launch_tick, -171_000);
    assert_eq!(ticks.graduation_tick, -170_500);
    assert_eq!(ticks.upper_max_tick, 887_000);
}

#[test]
fn test_reversed_caps_rejected() {
    let quote = LaunchQuote {
        launch_cap_usd: 69_000.0,
        graduation_cap_usd: 5_000.0,
        ..bnb_quote()
    };
    assert!(matches!(
        LaunchTicks::compute(
            &TickPriceCalculator::default(),
            &quote,
            &AdapterPreset::Pancake.pool()
        ),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_upper_tick_past_pool_maximum_rejected() {
    let pool = PoolParams {
        tick_spacing: 60,
        fee: 3_000,
        upper_max_tick: MAX_TICK,
    };
    assert!(matches!(
        LaunchTicks::compute(&TickPriceCalculator::default(), &bnb_quote(), &pool),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_default_params_json_shape() {
    let params = DefaultValueParams::compute(
        &TickPriceCalculator::default(),
        &bnb_quote(),
        &AdapterPreset::Pancake.pool(),
        DEFAULT_GRADUATION_LIQUIDITY,
    )
    .unwrap();
    let json = serde_json::to_value(params).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "launchTick": -186400,
            "graduationTick": -160000,
            "upperMaxTick": 887000,
            "fee": 10000,
            "tickSpacing": 200,
            "graduationLiquidity": "800000000000000000000000000",
        })
    );
}
