//! Swap orchestration: quote, assemble, sign, submit, confirm

use log::{debug, info};
use serde::Deserialize;
use solana_sdk::signature::{Keypair, Signature, Signer};
use soldex_pricing::{Direction, Unit};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::SwapError;
use crate::live::reference_price;
use crate::plan::PlanBuilder;
use crate::pool::PoolHandle;
use crate::retry::{retry_bounded, Retried};
use crate::transport::Transport;

/// Prefix of the log line the pool emits for a pool data simulation
pub const PROBE_LOG_PREFIX: &str = "Program log: GetPoolData: ";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapSettings {
    /// Priority fee in micro-lamports per compute unit
    pub compute_unit_price: u64,
    pub compute_unit_limit: u32,
    pub confirm_timeout: Duration,
    /// Trade size behind [`Swapper::current_price`]
    pub virtual_amount: f64,
    /// Wait before the first LP probe retry
    pub retry_backoff: Duration,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            compute_unit_price: 25_000,
            compute_unit_limit: 600_000,
            confirm_timeout: Duration::from_secs(60),
            virtual_amount: 1.0,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl From<&Config> for SwapSettings {
    fn from(config: &Config) -> Self {
        Self {
            compute_unit_price: config.compute_unit_price,
            compute_unit_limit: config.compute_unit_limit,
            confirm_timeout: config.confirm_timeout(),
            virtual_amount: config.virtual_amount,
            retry_backoff: config.lp_probe_backoff(),
        }
    }
}

/// A submitted swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReceipt {
    pub signature: Signature,
    /// Whether confirmation arrived within the timeout
    pub confirmed: bool,
    /// Raw units paid
    pub amount_in: u64,
    /// Raw units the swap must at least return
    pub min_amount_out: u64,
}

/// LP token supply split reported by a pool data simulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LpSupply {
    /// LP supply the pool accounts for
    pub total: u64,
    /// Part of `total` no longer circulating (burnt or never minted out)
    pub locked: u64,
    pub locked_ratio: f64,
}

#[derive(Deserialize)]
struct PoolData {
    pool_lp_supply: u64,
}

/// Extract `pool_lp_supply` from simulation logs
pub fn parse_pool_lp_supply(logs: &[String]) -> Result<u64, SwapError> {
    let line = logs
        .iter()
        .find_map(|line| line.strip_prefix(PROBE_LOG_PREFIX))
        .ok_or_else(|| SwapError::MissingProbeLog {
            logs: logs.to_vec(),
        })?;

    let data: PoolData =
        serde_json::from_str(line).map_err(|e| SwapError::MalformedProbeLog(e.to_string()))?;
    Ok(data.pool_lp_supply)
}

/// Trades against one pool
pub struct Swapper {
    transport: Arc<dyn Transport>,
    pool: PoolHandle,
    settings: SwapSettings,
}

impl Swapper {
    pub fn new(transport: Arc<dyn Transport>, pool: PoolHandle, settings: SwapSettings) -> Self {
        Self {
            transport,
            pool,
            settings,
        }
    }

    pub fn pool(&self) -> &PoolHandle {
        &self.pool
    }

    pub fn refresh(&mut self) -> Result<(), SwapError> {
        self.pool.refresh_balances(self.transport.as_ref())?;
        Ok(())
    }

    /// Spend `amount_in` of the settlement asset on the base token
    ///
    /// `slippage` is the accepted shortfall against the quoted output, as a
    /// fraction (0.01 = 1%).
    pub fn buy(
        &mut self,
        amount_in: f64,
        slippage: f64,
        payer: &Keypair,
    ) -> Result<SwapReceipt, SwapError> {
        check_slippage(slippage)?;
        self.refresh()?;

        let quote = self.pool.quote(amount_in, Direction::SpendQuote, Unit::Base)?;
        let amount_in = self.pool.to_quote_units(amount_in);
        let min_amount_out = self.pool.to_base_units(quote.amount_out * (1.0 - slippage));

        let mut builder = PlanBuilder::new(&self.pool, payer.pubkey());
        builder.compute_budget(self.settings.compute_unit_price, self.settings.compute_unit_limit)?;
        builder.append_buy(amount_in, min_amount_out, self.transport.as_ref())?;
        self.submit(builder, payer, amount_in, min_amount_out)
    }

    /// Sell `amount_in` of the base token for the settlement asset
    pub fn sell(
        &mut self,
        amount_in: f64,
        slippage: f64,
        payer: &Keypair,
    ) -> Result<SwapReceipt, SwapError> {
        check_slippage(slippage)?;
        self.refresh()?;

        let quote = self.pool.quote(amount_in, Direction::SpendBase, Unit::Base)?;
        let amount_in = self.pool.to_base_units(amount_in);
        let min_amount_out = self.pool.to_quote_units(quote.amount_out * (1.0 - slippage));

        let mut builder = PlanBuilder::new(&self.pool, payer.pubkey());
        builder.compute_budget(self.settings.compute_unit_price, self.settings.compute_unit_limit)?;
        builder.append_sell(amount_in, min_amount_out)?;
        self.submit(builder, payer, amount_in, min_amount_out)
    }

    fn submit(
        &self,
        builder: PlanBuilder<'_>,
        payer: &Keypair,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<SwapReceipt, SwapError> {
        let blockhash = self.transport.fetch_latest_blockhash()?;
        let transaction = builder.finish(blockhash)?.sign(payer)?;

        let signature = self.transport.submit_transaction(&transaction)?;
        info!("swap submitted: {}", signature);

        let confirmed = self
            .transport
            .confirm_transaction(&signature, self.settings.confirm_timeout)?;
        if confirmed {
            info!("swap confirmed: {}", signature);
        } else {
            info!("swap {} not confirmed within {:?}", signature, self.settings.confirm_timeout);
        }

        Ok(SwapReceipt {
            signature,
            confirmed,
            amount_in,
            min_amount_out,
        })
    }

    /// Simulate a pool data probe and split the LP supply into locked and
    /// circulating parts
    pub fn pool_lp_supply(&self, signer: &Keypair) -> Result<LpSupply, SwapError> {
        let mut builder = PlanBuilder::new(&self.pool, signer.pubkey());
        builder.append_probe()?;
        let transaction = builder
            .finish(self.transport.fetch_latest_blockhash()?)?
            .sign(signer)?;

        let logs = self.transport.simulate_transaction(&transaction)?;
        let total = parse_pool_lp_supply(&logs)?;
        let circulating = self.transport.fetch_token_supply(&self.pool.lp_mint())?.amount;

        let locked = total.saturating_sub(circulating);
        let locked_ratio = if total == 0 {
            0.0
        } else {
            locked as f64 / total as f64
        };
        debug!(
            "pool {} lp supply {} (locked {}, ratio {})",
            self.pool.amm_id(),
            total,
            locked,
            locked_ratio
        );

        Ok(LpSupply {
            total,
            locked,
            locked_ratio,
        })
    }

    /// [`Swapper::pool_lp_supply`] ratio with up to `max_retries` retries
    ///
    /// Blocks the calling thread for the backoff between attempts.
    pub fn lp_locked_ratio(&self, signer: &Keypair, max_retries: u32) -> Retried<f64> {
        retry_bounded(max_retries, self.settings.retry_backoff, |_| {
            self.pool_lp_supply(signer).map(|s| s.locked_ratio)
        })
    }

    /// Mid price (base per quote) on the latest snapshot
    pub fn current_price(&self) -> Result<f64, SwapError> {
        reference_price(&self.pool, self.settings.virtual_amount)
    }
}

fn check_slippage(slippage: f64) -> Result<(), SwapError> {
    if (0.0..1.0).contains(&slippage) {
        Ok(())
    } else {
        Err(SwapError::InvalidSlippage(slippage))
    }
}
