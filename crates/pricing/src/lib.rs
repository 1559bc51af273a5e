//! Constant-product pricing over pool reserves (x·y=k)
//!
//! Reserves and amounts are UI-unit floats (raw amount / 10^decimals).
//! Conversions to and from the integer units used on the wire live in
//! [`amount`].

pub mod amount;
pub mod direction;
pub mod error;
pub mod math;

pub use amount::{from_raw_amount, to_raw_amount};
pub use direction::{Direction, Unit};
pub use error::PricingError;
pub use math::{price_quote, quote, PriceQuote, Reserves, SwapAmounts, BPS_SCALE};
