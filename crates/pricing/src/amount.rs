//! Conversion between UI amounts and on-chain integer amounts

/// UI amount to integer units, truncating toward zero
///
/// Negative and NaN inputs saturate to 0; amounts past `u64::MAX` saturate
/// at `u64::MAX`.
///
/// Truncation also keeps binary floating point error: `2.01` with 9
/// decimals is `2_009_999_999`, not `2_010_000_000`. Round the amount first
/// if the exact decimal value matters.
#[inline]
pub fn to_raw_amount(amount: f64, decimals: u8) -> u64 {
    (amount * 10f64.powi(i32::from(decimals))) as u64
}

/// Integer units to UI amount
#[inline]
pub fn from_raw_amount(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(i32::from(decimals))
}
