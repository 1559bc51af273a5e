//! Versioned record schemas for the AMM v4 pool and the order-book market
//!
//! Each schema is built once on first use. The length checks in
//! [`SchemaBuilder::build`](crate::SchemaBuilder::build) run against
//! constants here, so a failure is a bug in this file.

use std::sync::LazyLock;

use crate::schema::{BitOrder, Schema};

pub const POOL_V4_LEN: usize = 752;
pub const MARKET_V2_LEN: usize = 388;
pub const SWAP_BASE_IN_V4_LEN: usize = 17;
pub const SIMULATE_INFO_V4_LEN: usize = 2;

/// Flag names of the market `account_flags` container, in declaration order
pub const MARKET_ACCOUNT_FLAGS: [&str; 7] = [
    "initialized",
    "market",
    "open_orders",
    "request_queue",
    "event_queue",
    "bids",
    "asks",
];

/// AMM v4 liquidity pool state
pub static POOL_V4: LazyLock<Schema> = LazyLock::new(|| {
    Schema::builder("pool-v4")
        .u64("status")
        .u64("nonce")
        .u64("max_order")
        .u64("depth")
        .u64("base_decimal")
        .u64("quote_decimal")
        .u64("state")
        .u64("reset_flag")
        .u64("min_size")
        .u64("vol_max_cut_ratio")
        .u64("amount_wave_ratio")
        .u64("base_lot_size")
        .u64("quote_lot_size")
        .u64("min_price_multiplier")
        .u64("max_price_multiplier")
        .u64("system_decimal_value")
        .u64("min_separate_numerator")
        .u64("min_separate_denominator")
        .u64("trade_fee_numerator")
        .u64("trade_fee_denominator")
        .u64("pnl_numerator")
        .u64("pnl_denominator")
        .u64("swap_fee_numerator")
        .u64("swap_fee_denominator")
        .u64("base_need_take_pnl")
        .u64("quote_need_take_pnl")
        .u64("quote_total_pnl")
        .u64("base_total_pnl")
        .u64("pool_open_time")
        .u64("punish_pc_amount")
        .u64("punish_coin_amount")
        .u64("orderbook_to_init_time")
        .u128("swap_base_in_amount")
        .u128("swap_quote_out_amount")
        .u64("swap_base2_quote_fee")
        .u128("swap_quote_in_amount")
        .u128("swap_base_out_amount")
        .u64("swap_quote2_base_fee")
        .address("base_vault")
        .address("quote_vault")
        .address("base_mint")
        .address("quote_mint")
        .address("lp_mint")
        .address("open_orders")
        .address("market_id")
        .address("market_program_id")
        .address("target_orders")
        .address("withdraw_queue")
        .address("lp_vault")
        .address("owner")
        .u64("lp_reserve")
        .padding(24)
        .build(POOL_V4_LEN)
        .expect("pool-v4 layout is 752 bytes")
});

/// Order-book market state
///
/// `account_flags` stores its first flag in the lowest bit of the
/// little-endian container, so a new market reads `03 00 ..` at offset 5.
pub static MARKET_V2: LazyLock<Schema> = LazyLock::new(|| {
    Schema::builder("market-v2")
        .padding(5)
        .flags("account_flags", 64, BitOrder::Lsb0, &MARKET_ACCOUNT_FLAGS)
        .address("own_address")
        .u64("vault_signer_nonce")
        .address("base_mint")
        .address("quote_mint")
        .address("base_vault")
        .u64("base_deposits_total")
        .u64("base_fees_accrued")
        .address("quote_vault")
        .u64("quote_deposits_total")
        .u64("quote_fees_accrued")
        .u64("quote_dust_threshold")
        .address("request_queue")
        .address("event_queue")
        .address("bids")
        .address("asks")
        .u64("base_lot_size")
        .u64("quote_lot_size")
        .u64("fee_rate_bps")
        .u64("referrer_rebates_accrued")
        .padding(7)
        .build(MARKET_V2_LEN)
        .expect("market-v2 layout is 388 bytes")
});

/// Payload of the pool's swap-base-in instruction
pub static SWAP_BASE_IN_V4: LazyLock<Schema> = LazyLock::new(|| {
    Schema::builder("swap-base-in-v4")
        .u8("instruction")
        .u64("amount_in")
        .u64("min_amount_out")
        .build(SWAP_BASE_IN_V4_LEN)
        .expect("swap-base-in-v4 payload is 17 bytes")
});

/// Payload of the pool's simulate-info instruction
pub static SIMULATE_INFO_V4: LazyLock<Schema> = LazyLock::new(|| {
    Schema::builder("simulate-info-v4")
        .u8("instruction")
        .u8("simulate_type")
        .build(SIMULATE_INFO_V4_LEN)
        .expect("simulate-info-v4 payload is 2 bytes")
});
