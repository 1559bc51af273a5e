//! Transaction plan assembly
//!
//! A [`PlanBuilder`] appends instructions in execution order and is consumed
//! by [`PlanBuilder::finish`], which compiles a v0 message. The resulting
//! [`TransactionPlan`] is signed once and handed to the transport.

use log::debug;
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction,
    transaction::VersionedTransaction,
};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::create_associated_token_account,
};

use crate::error::SwapError;
use crate::instruction::{build_probe_instruction, build_swap_instruction};
use crate::pool::PoolHandle;
use crate::transport::Transport;

/// Base58 characters of a fresh pubkey used as the ephemeral account seed
const SEED_LEN: usize = 32;

/// Ordered instruction list under construction
pub struct PlanBuilder<'a> {
    pool: &'a PoolHandle,
    payer: Pubkey,
    instructions: Vec<Instruction>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(pool: &'a PoolHandle, payer: Pubkey) -> Self {
        Self {
            pool,
            payer,
            instructions: Vec::new(),
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Priority fee and compute unit limit; only allowed on an empty plan
    pub fn compute_budget(&mut self, unit_price: u64, unit_limit: u32) -> Result<(), SwapError> {
        if !self.instructions.is_empty() {
            return Err(SwapError::BudgetNotFirst);
        }
        self.instructions
            .push(ComputeBudgetInstruction::set_compute_unit_price(unit_price));
        self.instructions
            .push(ComputeBudgetInstruction::set_compute_unit_limit(unit_limit));
        Ok(())
    }

    /// Buy the base token with `amount_in` lamports of the settlement asset
    ///
    /// The lamports are wrapped in an ephemeral token account created from
    /// a random seed and closed back to the payer after the swap. The
    /// destination associated account is only created if the payer holds no
    /// token account for the base mint yet.
    pub fn append_buy(
        &mut self,
        amount_in: u64,
        min_amount_out: u64,
        transport: &dyn Transport,
    ) -> Result<(), SwapError> {
        let programs = self.pool.programs();
        let token_program = programs.token_program;
        let base_mint = self.pool.base().mint;

        let rent = transport.fetch_rent_exempt_minimum(spl_token::state::Account::LEN)?;

        let seed = ephemeral_seed();
        let source = Pubkey::create_with_seed(&self.payer, &seed, &token_program)?;
        self.instructions.push(system_instruction::create_account_with_seed(
            &self.payer,
            &source,
            &self.payer,
            &seed,
            rent.saturating_add(amount_in),
            spl_token::state::Account::LEN as u64,
            &token_program,
        ));
        self.instructions.push(spl_token::instruction::initialize_account(
            &token_program,
            &source,
            &programs.settlement_mint,
            &self.payer,
        )?);

        let destination =
            get_associated_token_address_with_program_id(&self.payer, &base_mint, &token_program);
        if !transport.token_account_exists(&self.payer, &base_mint)? {
            debug!("payer has no {} account; creating {}", base_mint, destination);
            self.instructions.push(create_associated_token_account(
                &self.payer,
                &self.payer,
                &base_mint,
                &token_program,
            ));
        }

        self.push_swap(&source, &destination, amount_in, min_amount_out)?;
        self.push_close(&source)?;
        debug!("appended buy: {} in, {} min out", amount_in, min_amount_out);
        Ok(())
    }

    /// Sell `amount_in` base units for the settlement asset
    ///
    /// The settlement associated account is always created and closed after
    /// the swap, which unwraps the proceeds to the payer.
    pub fn append_sell(&mut self, amount_in: u64, min_amount_out: u64) -> Result<(), SwapError> {
        let token_program = self.pool.programs().token_program;
        let base_mint = self.pool.base().mint;
        let quote_mint = self.pool.quote_side().mint;

        let source =
            get_associated_token_address_with_program_id(&self.payer, &base_mint, &token_program);
        let destination =
            get_associated_token_address_with_program_id(&self.payer, &quote_mint, &token_program);

        self.instructions.push(create_associated_token_account(
            &self.payer,
            &self.payer,
            &quote_mint,
            &token_program,
        ));
        self.push_swap(&source, &destination, amount_in, min_amount_out)?;
        self.push_close(&destination)?;
        debug!("appended sell: {} in, {} min out", amount_in, min_amount_out);
        Ok(())
    }

    /// Read-only instruction that makes the pool log its state; simulate only
    pub fn append_probe(&mut self) -> Result<(), SwapError> {
        self.instructions.push(build_probe_instruction(
            &self.pool.programs().amm_program,
            self.pool.accounts(),
        )?);
        Ok(())
    }

    fn push_swap(
        &mut self,
        source: &Pubkey,
        destination: &Pubkey,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<(), SwapError> {
        let programs = self.pool.programs();
        self.instructions.push(build_swap_instruction(
            &programs.amm_program,
            &programs.token_program,
            self.pool.accounts(),
            source,
            destination,
            &self.payer,
            amount_in,
            min_amount_out,
        )?);
        Ok(())
    }

    fn push_close(&mut self, account: &Pubkey) -> Result<(), SwapError> {
        self.instructions.push(spl_token::instruction::close_account(
            &self.pool.programs().token_program,
            account,
            &self.payer,
            &self.payer,
            &[],
        )?);
        Ok(())
    }

    /// Compile the instructions against `recent_blockhash`
    pub fn finish(self, recent_blockhash: Hash) -> Result<TransactionPlan, SwapError> {
        let message = v0::Message::try_compile(&self.payer, &self.instructions, &[], recent_blockhash)?;
        debug!(
            "compiled plan: {} instructions, {} accounts",
            self.instructions.len(),
            message.account_keys.len()
        );
        Ok(TransactionPlan {
            payer: self.payer,
            instructions: self.instructions,
            message,
        })
    }
}

fn ephemeral_seed() -> String {
    Keypair::new().pubkey().to_string()[..SEED_LEN].to_string()
}

/// Compiled, immutable instruction list
#[derive(Debug, Clone)]
pub struct TransactionPlan {
    payer: Pubkey,
    instructions: Vec<Instruction>,
    message: v0::Message,
}

impl TransactionPlan {
    pub fn payer(&self) -> Pubkey {
        self.payer
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn message(&self) -> &v0::Message {
        &self.message
    }

    /// Sign with the payer; the plan is consumed
    pub fn sign(self, payer: &Keypair) -> Result<VersionedTransaction, SwapError> {
        if payer.pubkey() != self.payer {
            return Err(SwapError::SignerMismatch {
                expected: self.payer,
                actual: payer.pubkey(),
            });
        }
        Ok(VersionedTransaction::try_new(
            VersionedMessage::V0(self.message),
            &[payer],
        )?)
    }
}
