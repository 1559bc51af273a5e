//! Constant product AMM math (x·y=k) on UI-unit reserves

use crate::direction::{Direction, Unit};
use crate::error::PricingError;

/// Basis points scale (10,000 bps = 100%)
pub const BPS_SCALE: f64 = 10_000.0;

/// Pool reserves in UI units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reserves {
    pub base: f64,
    pub quote: f64,
}

impl Reserves {
    pub fn new(base: f64, quote: f64) -> Self {
        Self { base, quote }
    }

    /// Pool reference price: base tokens per quote token
    pub fn mid_price(&self) -> Result<f64, PricingError> {
        check_reserves(self.base, self.quote)?;
        Ok(self.base / self.quote)
    }
}

/// Result of one constant-product trade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapAmounts {
    /// Input after the swap fee is taken off
    pub effective_amount_in: f64,
    /// Output token amount
    pub amount_out: f64,
}

#[inline]
fn check_reserves(a: f64, b: f64) -> Result<(), PricingError> {
    // NaN fails the comparison too
    if !(a > 0.0 && b > 0.0) {
        return Err(PricingError::ZeroReserve);
    }
    Ok(())
}

/// Quote a trade of `amount_in` against the pool
///
/// With fee on input:
/// - Δin_net = Δin * (1 - fee)
/// - k = r_in * r_out
/// - Δout = r_out - k / (r_in + Δin_net)
pub fn quote(
    reserve_in: f64,
    reserve_out: f64,
    amount_in: f64,
    fee_bps: u64,
) -> Result<SwapAmounts, PricingError> {
    check_reserves(reserve_in, reserve_out)?;
    if !(amount_in > 0.0) {
        return Err(PricingError::NonPositiveAmount);
    }

    let effective_amount_in = amount_in - amount_in * (fee_bps as f64 / BPS_SCALE);

    let k = reserve_in * reserve_out;
    let amount_out = reserve_out - k / (reserve_in + effective_amount_in);

    Ok(SwapAmounts {
        effective_amount_in,
        amount_out,
    })
}

/// Price of a trade together with the pool reference price
///
/// For both directions `amount_out` is denominated in the token received and
/// `effective_amount_in` in the token paid:
///
/// | direction    | `amount_out` | `effective_amount_in` |
/// |--------------|--------------|-----------------------|
/// | `SpendBase`  | quote tokens | base tokens           |
/// | `SpendQuote` | base tokens  | quote tokens          |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    /// Trade-implied price in the requested unit
    pub price: f64,
    /// Pool reference price in the requested unit
    pub mid_price: f64,
    pub amount_out: f64,
    pub effective_amount_in: f64,
}

impl PriceQuote {
    /// `(price, mid_price, amount_out, effective_amount_in)`
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (
            self.price,
            self.mid_price,
            self.amount_out,
            self.effective_amount_in,
        )
    }
}

/// Quote `amount_in` in `direction` and express the prices in `unit`
///
/// Prices are computed base-denominated (base per quote) and inverted once
/// for `Unit::Quote`, so the two units are exact reciprocals.
pub fn price_quote(
    reserves: Reserves,
    amount_in: f64,
    direction: Direction,
    unit: Unit,
    fee_bps: u64,
) -> Result<PriceQuote, PricingError> {
    let mid = reserves.mid_price()?;

    let (swap, base_amount, quote_amount) = match direction {
        Direction::SpendBase => {
            let s = quote(reserves.base, reserves.quote, amount_in, fee_bps)?;
            (s, s.effective_amount_in, s.amount_out)
        }
        Direction::SpendQuote => {
            let s = quote(reserves.quote, reserves.base, amount_in, fee_bps)?;
            (s, s.amount_out, s.effective_amount_in)
        }
    };

    let price = base_amount / quote_amount;

    let (price, mid_price) = match unit {
        Unit::Base => (price, mid),
        Unit::Quote => (1.0 / price, 1.0 / mid),
    };

    Ok(PriceQuote {
        price,
        mid_price,
        amount_out: swap.amount_out,
        effective_amount_in: swap.effective_amount_in,
    })
}
