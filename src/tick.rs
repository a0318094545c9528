use alloy_primitives::U256;

use crate::error::{Error, Result};

/// Lowest tick a Uniswap V3 style pool can represent.
pub(crate) const MIN_TICK: i32 = -887272;
/// Highest tick a Uniswap V3 style pool can represent.
pub(crate) const MAX_TICK: i32 = -MIN_TICK;

/// 2^96, the scale of a Q64.96 square-root price.
const Q96: f64 = 79228162514264337593543950336.0;

/// Token supply convention the market cap is measured against.
///
/// The default is the launchpad's canonical token: one billion units with
/// 18 decimals, a market cap truncated to thousandths of a quote token, and
/// the price ratio carried with 18 decimals before the square root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SupplyConvention {
    /// Total base-token supply in base units.
    pub(crate) total_supply: U256,
    /// Fixed-point factor applied to the quote amount before truncation.
    pub(crate) cap_precision: u64,
    /// Decimals carried by the price ratio. Must be even so the square
    /// root can be descaled exactly.
    pub(crate) ratio_decimals: u32,
}

impl Default for SupplyConvention {
    fn default() -> Self {
        Self {
            total_supply: U256::from(1_000_000_000u128 * 10u128.pow(18)),
            cap_precision: 1000,
            ratio_decimals: 18,
        }
    }
}

/// Inputs for a single market cap to tick conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TickPriceQuery {
    pub(crate) market_cap_usd: f64,
    pub(crate) quote_price_usd: f64,
    pub(crate) quote_decimals: u32,
    pub(crate) tick_spacing: i32,
}

/// Converts fully diluted market caps into pool ticks.
///
/// Token amounts are carried in 256-bit integers; only the square root and
/// the logarithm run in `f64`. The order of operations is load-bearing:
/// deployed launchpads were configured with ticks computed exactly this way.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TickPriceCalculator {
    supply: SupplyConvention,
}

impl TickPriceCalculator {
    pub(crate) fn new(supply: SupplyConvention) -> Result<Self> {
        if supply.total_supply.is_zero() {
            return Err(Error::InvalidInput("total supply must be non-zero".into()));
        }
        if supply.cap_precision == 0 {
            return Err(Error::InvalidInput("cap precision must be non-zero".into()));
        }
        if supply.ratio_decimals % 2 != 0 {
            return Err(Error::InvalidInput(format!(
                "ratio decimals must be even, got {}",
                supply.ratio_decimals
            )));
        }
        pow10(supply.ratio_decimals)?;
        Ok(Self { supply })
    }

    pub(crate) fn supply(&self) -> &SupplyConvention {
        &self.supply
    }

    /// Returns the tick, aligned to `tick_spacing`, at which the token's
    /// fully diluted value equals `market_cap_usd`.
    ///
    /// The result is not clamped to [`MIN_TICK`, `MAX_TICK`].
    pub(crate) fn compute_tick_price(&self, query: &TickPriceQuery) -> Result<i32> {
        if !(query.quote_price_usd.is_finite() && query.quote_price_usd > 0.0) {
            return Err(Error::InvalidInput(format!(
                "quote price must be positive, got {}",
                query.quote_price_usd
            )));
        }
        if !(query.market_cap_usd.is_finite() && query.market_cap_usd >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "market cap must be non-negative, got {}",
                query.market_cap_usd
            )));
        }
        if query.tick_spacing <= 0 {
            return Err(Error::InvalidInput(format!(
                "tick spacing must be positive, got {}",
                query.tick_spacing
            )));
        }

        let market_cap_in_quote = query.market_cap_usd / query.quote_price_usd;
        let scaled_cap = u256_from_f64(
            (market_cap_in_quote * self.supply.cap_precision as f64).floor(),
        )?;

        let quote_supply = scaled_cap
            .checked_mul(pow10(query.quote_decimals)?)
            .ok_or_else(|| overflow("quote supply"))?
            / U256::from(self.supply.cap_precision);

        let sqrt_price_ratio = quote_supply
            .checked_mul(pow10(self.supply.ratio_decimals)?)
            .ok_or_else(|| overflow("price ratio"))?
            / self.supply.total_supply;

        let sqrt_price_x96 = u256_from_f64((f64_from_u256(sqrt_price_ratio).sqrt() * Q96).floor())?
            / pow10(self.supply.ratio_decimals / 2)?;
        if sqrt_price_x96.is_zero() {
            return Err(Error::InvalidInput(format!(
                "market cap {} is too small to price, sqrt price is zero",
                query.market_cap_usd
            )));
        }

        let tick = ((f64_from_u256(sqrt_price_x96) / Q96).ln() / 1.0001f64.sqrt().ln()).floor();
        if !tick.is_finite() || tick < f64::from(i32::MIN) || tick > f64::from(i32::MAX) {
            return Err(Error::InvalidInput(format!("tick {tick} is not representable")));
        }

        round_tick_to_nearest_tick(tick as i32, query.tick_spacing)
    }
}

/// Computes a tick with the default supply convention.
pub(crate) fn compute_tick_price(
    market_cap_usd: f64,
    quote_price_usd: f64,
    quote_decimals: u32,
    tick_spacing: i32,
) -> Result<i32> {
    TickPriceCalculator::default().compute_tick_price(&TickPriceQuery {
        market_cap_usd,
        quote_price_usd,
        quote_decimals,
        tick_spacing,
    })
}

/// Rounds `tick` to the nearest multiple of `tick_spacing`, ties toward
/// positive infinity.
pub(crate) fn round_tick_to_nearest_tick(tick: i32, tick_spacing: i32) -> Result<i32> {
    if tick_spacing <= 0 {
        return Err(Error::InvalidInput(format!(
            "tick spacing must be positive, got {tick_spacing}"
        )));
    }
    let (tick, spacing) = (i64::from(tick), i64::from(tick_spacing));
    let rounded = (2 * tick + spacing).div_euclid(2 * spacing) * spacing;
    i32::try_from(rounded)
        .map_err(|_| Error::InvalidInput(format!("rounded tick {rounded} overflows i32")))
}

fn pow10(exp: u32) -> Result<U256> {
    U256::from(10u64)
        .checked_pow(U256::from(exp))
        .ok_or_else(|| overflow("10^decimals"))
}

fn overflow(what: &str) -> Error {
    Error::InvalidInput(format!("{what} overflows 256 bits"))
}

// Both conversions go through decimal text, which is exact for integral
// floats and correctly rounded for the way back.
fn u256_from_f64(value: f64) -> Result<U256> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(format!("{value} is not a non-negative amount")));
    }
    format!("{value:.0}")
        .parse::<U256>()
        .map_err(|_| overflow(&format!("{value:e}")))
}

fn f64_from_u256(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(f64::INFINITY)
}

#[test]
fn test_launch_and_graduation_ticks_on_pancake_spacing() {
    let launch = compute_tick_price(5000.0, 650.0, 18, 200).unwrap();
    let graduation = compute_tick_price(69000.0, 650.0, 18, 200).unwrap();
    assert_eq!(launch % 200, 0);
    assert_eq!(graduation % 200, 0);
    assert!(graduation > launch);
    assert_eq!(launch, -186800);
    assert_eq!(graduation, -160600);
}

#[test]
fn test_ticks_match_recorded_default_params() {
    // BNB at $618, as pushed to the BSC launchpad for both adapters.
    assert_eq!(compute_tick_price(5000.0, 618.0, 18, 200).unwrap(), -186400);
    assert_eq!(compute_tick_price(69000.0, 618.0, 18, 200).unwrap(), -160000);
    assert_eq!(compute_tick_price(5000.0, 618.0, 18, 60).unwrap(), -186360);
    assert_eq!(compute_tick_price(69000.0, 618.0, 18, 60).unwrap(), -160080);
}

#[test]
fn test_small_quote_decimals() {
    assert_eq!(compute_tick_price(5000.0, 1.0, 6, 60).unwrap(), -398400);
}

#[test]
fn test_rejects_bad_inputs() {
    for (cap, price, spacing) in [
        (5000.0, 0.0, 200),
        (5000.0, -1.0, 200),
        (5000.0, f64::NAN, 200),
        (-1.0, 650.0, 200),
        (f64::INFINITY, 650.0, 200),
        (5000.0, 650.0, 0),
        (5000.0, 650.0, -60),
    ] {
        assert!(
            matches!(
                compute_tick_price(cap, price, 18, spacing),
                Err(Error::InvalidInput(_))
            ),
            "{cap} {price} {spacing}"
        );
    }
}

#[test]
fn test_zero_market_cap_is_out_of_log_domain() {
    assert!(matches!(
        compute_tick_price(0.0, 650.0, 18, 200),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_decimals_overflow() {
    assert!(matches!(
        compute_tick_price(5000.0, 650.0, 90, 200),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_round_tick_ties_go_up() {
    assert_eq!(round_tick_to_nearest_tick(250, 200).unwrap(), 200);
    assert_eq!(round_tick_to_nearest_tick(300, 200).unwrap(), 400);
    assert_eq!(round_tick_to_nearest_tick(-300, 200).unwrap(), -200);
    assert_eq!(round_tick_to_nearest_tick(-301, 200).unwrap(), -400);
    assert_eq!(round_tick_to_nearest_tick(887220, 500).unwrap(), 887000);
    assert_eq!(round_tick_to_nearest_tick(887272, 60).unwrap(), 887280);
}

#[test]
fn test_calculator_rejects_odd_ratio_decimals() {
    let supply = SupplyConvention {
        ratio_decimals: 17,
        ..SupplyConvention::default()
    };
    assert!(TickPriceCalculator::new(supply).is_err());
}

#[test]
fn test_larger_supply_lowers_the_tick() {
    let query = TickPriceQuery {
        market_cap_usd: 69000.0,
        quote_price_usd: 650.0,
        quote_decimals: 18,
        tick_spacing: 1,
    };
    let default = TickPriceCalculator::default().compute_tick_price(&query).unwrap();
    let tenfold = TickPriceCalculator::new(SupplyConvention {
        total_supply: U256::from(10_000_000_000u128 * 10u128.pow(18)),
        ..SupplyConvention::default()
    })
    .unwrap()
    .compute_tick_price(&query)
    .unwrap();
    // A tenfold supply divides the price by ten: about 23027 ticks.
    assert!((default - tenfold - 23027).abs() <= 1, "{default} {tenfold}");
}

#[cfg(test)]
proptest::proptest! {
    #[test]
    fn prop_tick_is_aligned(
        cap in 1.0f64..1e9,
        price in 0.01f64..1e5,
        spacing in 1i32..1000,
    ) {
        if let Ok(tick) = compute_tick_price(cap, price, 18, spacing) {
            proptest::prop_assert_eq!(tick % spacing, 0);
        }
    }

    #[test]
    fn prop_rounding_is_idempotent(tick in MIN_TICK..=MAX_TICK, spacing in 1i32..20_000) {
        let once = round_tick_to_nearest_tick(tick, spacing).unwrap();
        proptest::prop_assert_eq!(round_tick_to_nearest_tick(once, spacing).unwrap(), once);
        proptest::prop_assert!((once - tick).abs() * 2 <= spacing);
    }

    #[test]
    fn prop_tick_is_monotonic_in_market_cap(
        cap in 10.0f64..1e8,
        bump in 0.0f64..1e8,
        price in 1.0f64..5000.0,
        spacing in proptest::sample::select(vec![1i32, 10, 60, 200, 500]),
    ) {
        let low = compute_tick_price(cap, price, 18, spacing).unwrap();
        let high = compute_tick_price(cap + bump, price, 18, spacing).unwrap();
        proptest::prop_assert!(high >= low);
    }
}
