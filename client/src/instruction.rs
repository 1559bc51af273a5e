//! AMM v4 instruction builders

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use soldex_layout::{
    encode,
    schemas::{SIMULATE_INFO_V4, SWAP_BASE_IN_V4},
    Record, Value,
};

use crate::error::SwapError;

/// Instruction discriminator for SwapBaseIn
pub const SWAP_BASE_IN: u8 = 9;

/// Instruction discriminator for SimulateInfo
pub const SIMULATE_INFO: u8 = 12;

/// SimulateInfo variant that logs pool data
pub const SIMULATE_POOL_DATA: u8 = 0;

/// Pool and market accounts a swap touches
///
/// Vaults are in the pool record's own order, independent of which side
/// the client treats as quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapAccounts {
    pub amm_id: Pubkey,
    pub amm_authority: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub pool_base_vault: Pubkey,
    pub pool_quote_vault: Pubkey,
    pub lp_mint: Pubkey,
    pub market_program_id: Pubkey,
    pub market_id: Pubkey,
    pub market_bids: Pubkey,
    pub market_asks: Pubkey,
    pub market_event_queue: Pubkey,
    pub market_base_vault: Pubkey,
    pub market_quote_vault: Pubkey,
    pub market_vault_signer: Pubkey,
}

/// Build swap_base_in instruction
///
/// The 18 accounts are positional; the program rejects any other order or
/// signer/writable combination.
#[allow(clippy::too_many_arguments)]
pub fn build_swap_instruction(
    amm_program: &Pubkey,
    token_program: &Pubkey,
    accounts: &SwapAccounts,
    source: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount_in: u64,
    min_amount_out: u64,
) -> Result<Instruction, SwapError> {
    let data = encode(
        &SWAP_BASE_IN_V4,
        &Record::new()
            .with("instruction", Value::Unsigned(SWAP_BASE_IN.into()))
            .with("amount_in", Value::Unsigned(amount_in.into()))
            .with("min_amount_out", Value::Unsigned(min_amount_out.into())),
    )?;

    let accounts = vec![
        AccountMeta::new_readonly(*token_program, false),
        AccountMeta::new(accounts.amm_id, false),
        AccountMeta::new_readonly(accounts.amm_authority, false),
        AccountMeta::new(accounts.open_orders, false),
        AccountMeta::new(accounts.target_orders, false),
        AccountMeta::new(accounts.pool_base_vault, false),
        AccountMeta::new(accounts.pool_quote_vault, false),
        AccountMeta::new_readonly(accounts.market_program_id, false),
        AccountMeta::new(accounts.market_id, false),
        AccountMeta::new(accounts.market_bids, false),
        AccountMeta::new(accounts.market_asks, false),
        AccountMeta::new(accounts.market_event_queue, false),
        AccountMeta::new(accounts.market_base_vault, false),
        AccountMeta::new(accounts.market_quote_vault, false),
        AccountMeta::new_readonly(accounts.market_vault_signer, false),
        AccountMeta::new(*source, false),
        AccountMeta::new(*destination, false),
        AccountMeta::new_readonly(*owner, true),
    ];

    Ok(Instruction {
        program_id: *amm_program,
        accounts,
        data,
    })
}

/// Build simulate_info instruction asking the pool to log its state
///
/// Only meaningful under simulation; every account is read-only.
pub fn build_probe_instruction(
    amm_program: &Pubkey,
    accounts: &SwapAccounts,
) -> Result<Instruction, SwapError> {
    let data = encode(
        &SIMULATE_INFO_V4,
        &Record::new()
            .with("instruction", Value::Unsigned(SIMULATE_INFO.into()))
            .with("simulate_type", Value::Unsigned(SIMULATE_POOL_DATA.into())),
    )?;

    let accounts = [
        accounts.amm_id,
        accounts.amm_authority,
        accounts.open_orders,
        accounts.pool_base_vault,
        accounts.pool_quote_vault,
        accounts.lp_mint,
        accounts.market_id,
        accounts.market_event_queue,
    ]
    .into_iter()
    .map(|key| AccountMeta::new_readonly(key, false))
    .collect();

    Ok(Instruction {
        program_id: *amm_program,
        accounts,
        data,
    })
}
