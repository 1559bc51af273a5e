//! Pool handle: a resolved AMM v4 pool and its order-book market

use log::{debug, info};
use solana_sdk::{program_pack::Pack, pubkey::Pubkey};
use soldex_layout::{
    decode,
    schemas::{MARKET_V2, POOL_V4},
    Record,
};
use soldex_pricing::{from_raw_amount, price_quote, to_raw_amount, Direction, PriceQuote, Reserves, Unit};

use crate::addresses::ProgramAddresses;
use crate::error::SwapError;
use crate::instruction::SwapAccounts;
use crate::transport::Transport;

/// Fee applied when the pool record carries no swap fee ratio (0.25%)
pub const DEFAULT_FEE_BPS: u64 = 25;

const LP_MINT_SEED: &[u8] = b"lp_mint_associated_seed";

/// Mint, vault and decimals of one side of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSide {
    pub mint: Pubkey,
    pub vault: Pubkey,
    pub decimals: u8,
}

/// LP mint address the AMM program derives for a market
pub fn derive_lp_mint(amm_program: &Pubkey, market_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[amm_program.as_ref(), market_id.as_ref(), LP_MINT_SEED],
        amm_program,
    )
    .0
}

/// Vault balances of both sides in UI units
pub fn fetch_reserves(
    transport: &dyn Transport,
    base: &TokenSide,
    quote: &TokenSide,
) -> Result<Reserves, SwapError> {
    let base = transport.fetch_token_balance(&base.vault)?;
    let quote = transport.fetch_token_balance(&quote.vault)?;
    Ok(Reserves::new(
        from_raw_amount(base.amount, base.decimals),
        from_raw_amount(quote.amount, quote.decimals),
    ))
}

fn address(record: &Record, field: &str) -> Result<Pubkey, SwapError> {
    Ok(Pubkey::new_from_array(record.address(field)?))
}

/// A pool resolved from chain state
///
/// The quote side is always the settlement mint; if the pool lists it as
/// base, mint, vault and decimals of both sides are swapped together at
/// load time. Balances change only through [`PoolHandle::refresh_balances`].
#[derive(Debug, Clone)]
pub struct PoolHandle {
    programs: ProgramAddresses,
    pool: Record,
    market: Record,
    accounts: SwapAccounts,
    base: TokenSide,
    quote: TokenSide,
    fee_bps: u64,
    reserves: Reserves,
}

impl PoolHandle {
    /// Fetch and decode the pool and its market, then take a balance snapshot
    pub fn load(
        transport: &dyn Transport,
        programs: ProgramAddresses,
        amm_id: Pubkey,
    ) -> Result<Self, SwapError> {
        let pool = decode(&POOL_V4, &transport.fetch_account_data(&amm_id)?)?;

        let market_id = address(&pool, "market_id")?;
        let market = decode(&MARKET_V2, &transport.fetch_account_data(&market_id)?)?;

        let market_base_vault = address(&market, "base_vault")?;
        let vault_signer = spl_token::state::Account::unpack(
            &transport.fetch_account_data(&market_base_vault)?,
        )?
        .owner;

        let accounts = SwapAccounts {
            amm_id,
            amm_authority: programs.amm_authority,
            open_orders: address(&pool, "open_orders")?,
            target_orders: address(&pool, "target_orders")?,
            pool_base_vault: address(&pool, "base_vault")?,
            pool_quote_vault: address(&pool, "quote_vault")?,
            lp_mint: address(&pool, "lp_mint")?,
            market_program_id: address(&pool, "market_program_id")?,
            market_id,
            market_bids: address(&market, "bids")?,
            market_asks: address(&market, "asks")?,
            market_event_queue: address(&market, "event_queue")?,
            market_base_vault,
            market_quote_vault: address(&market, "quote_vault")?,
            market_vault_signer: vault_signer,
        };

        let base_balance = transport.fetch_token_balance(&accounts.pool_base_vault)?;
        let quote_balance = transport.fetch_token_balance(&accounts.pool_quote_vault)?;

        let mut base = TokenSide {
            mint: address(&pool, "base_mint")?,
            vault: accounts.pool_base_vault,
            decimals: base_balance.decimals,
        };
        let mut quote = TokenSide {
            mint: address(&pool, "quote_mint")?,
            vault: accounts.pool_quote_vault,
            decimals: quote_balance.decimals,
        };
        let mut reserves = Reserves::new(
            from_raw_amount(base_balance.amount, base_balance.decimals),
            from_raw_amount(quote_balance.amount, quote_balance.decimals),
        );

        if base.mint == programs.settlement_mint {
            debug!("pool {} lists the settlement mint as base; swapping sides", amm_id);
            std::mem::swap(&mut base, &mut quote);
            std::mem::swap(&mut reserves.base, &mut reserves.quote);
        }
        if quote.mint != programs.settlement_mint {
            return Err(SwapError::UnsupportedQuoteAsset { mint: quote.mint });
        }

        let fee_bps = match pool.u64("swap_fee_denominator")? {
            0 => DEFAULT_FEE_BPS,
            denominator => pool.u64("swap_fee_numerator")?.saturating_mul(10_000) / denominator,
        };

        info!(
            "resolved pool {}: base {} ({} decimals), quote {} ({} decimals), fee {} bps",
            amm_id, base.mint, base.decimals, quote.mint, quote.decimals, fee_bps
        );

        Ok(Self {
            programs,
            pool,
            market,
            accounts,
            base,
            quote,
            fee_bps,
            reserves,
        })
    }

    /// Re-read both vault balances
    pub fn refresh_balances(&mut self, transport: &dyn Transport) -> Result<Reserves, SwapError> {
        let reserves = fetch_reserves(transport, &self.base, &self.quote)?;
        self.set_reserves(reserves);
        Ok(reserves)
    }

    /// Replace the snapshot with reserves fetched elsewhere
    pub(crate) fn set_reserves(&mut self, reserves: Reserves) {
        self.reserves = reserves;
        debug!(
            "pool {} reserves: base {} quote {}",
            self.accounts.amm_id, reserves.base, reserves.quote
        );
    }

    /// Quote a trade against the latest snapshot
    ///
    /// `amount_out` is in the token received, `effective_amount_in` in the
    /// token paid, whatever `unit` the prices are expressed in.
    pub fn quote(
        &self,
        amount_in: f64,
        direction: Direction,
        unit: Unit,
    ) -> Result<PriceQuote, SwapError> {
        Ok(price_quote(self.reserves, amount_in, direction, unit, self.fee_bps)?)
    }

    pub fn to_base_units(&self, amount: f64) -> u64 {
        to_raw_amount(amount, self.base.decimals)
    }

    pub fn from_base_units(&self, raw: u64) -> f64 {
        from_raw_amount(raw, self.base.decimals)
    }

    pub fn to_quote_units(&self, amount: f64) -> u64 {
        to_raw_amount(amount, self.quote.decimals)
    }

    pub fn from_quote_units(&self, raw: u64) -> f64 {
        from_raw_amount(raw, self.quote.decimals)
    }

    pub fn amm_id(&self) -> Pubkey {
        self.accounts.amm_id
    }

    pub fn programs(&self) -> &ProgramAddresses {
        &self.programs
    }

    pub fn accounts(&self) -> &SwapAccounts {
        &self.accounts
    }

    /// Decoded pool-v4 record
    pub fn pool_state(&self) -> &Record {
        &self.pool
    }

    /// Decoded market-v2 record
    pub fn market_state(&self) -> &Record {
        &self.market
    }

    /// Traded token side
    pub fn base(&self) -> &TokenSide {
        &self.base
    }

    /// Settlement side
    pub fn quote_side(&self) -> &TokenSide {
        &self.quote
    }

    pub fn lp_mint(&self) -> Pubkey {
        self.accounts.lp_mint
    }

    pub fn fee_bps(&self) -> u64 {
        self.fee_bps
    }

    pub fn reserves(&self) -> Reserves {
        self.reserves
    }
}
