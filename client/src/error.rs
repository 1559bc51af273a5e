//! Client errors

use solana_sdk::{
    message::CompileError, program_error::ProgramError, pubkey::PubkeyError,
    pubkey::Pubkey, signer::SignerError,
};
use soldex_layout::LayoutError;
use soldex_pricing::PricingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// The pool's quote side is not the configured settlement mint
    #[error("unsupported quote asset {mint}")]
    UnsupportedQuoteAsset { mint: Pubkey },

    #[error("simulation logs carry no pool data line ({} lines)", logs.len())]
    MissingProbeLog { logs: Vec<String> },

    #[error("malformed pool data log: {0}")]
    MalformedProbeLog(String),

    /// Network or RPC failure; the only kind the bounded retry repeats
    #[error("{operation} failed: {message}")]
    TransientFetch {
        operation: &'static str,
        message: String,
    },

    #[error("token program: {0}")]
    Token(#[from] ProgramError),

    #[error("seed address derivation: {0}")]
    Seed(#[from] PubkeyError),

    #[error("slippage must be within [0, 1), got {0}")]
    InvalidSlippage(f64),

    #[error("compute budget directives must come before any other instruction")]
    BudgetNotFirst,

    #[error("message compile: {0}")]
    Compile(#[from] CompileError),

    #[error("signing: {0}")]
    Signing(#[from] SignerError),

    #[error("plan was built for payer {expected}, signer is {actual}")]
    SignerMismatch { expected: Pubkey, actual: Pubkey },
}

impl SwapError {
    pub fn transient(operation: &'static str, err: impl std::fmt::Display) -> Self {
        SwapError::TransientFetch {
            operation,
            message: err.to_string(),
        }
    }

    /// Whether repeating the call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, SwapError::TransientFetch { .. })
    }
}
