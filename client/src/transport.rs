//! Interfaces to the network the client depends on
//!
//! Everything the client reads from or sends to the cluster goes through
//! these traits so the same code runs against RPC or an in-memory mock.

use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::SwapError;

/// Token amount as reported by the token program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount {
    pub amount: u64,
    pub decimals: u8,
}

/// Request/response calls against the cluster
pub trait Transport: Send + Sync {
    /// Raw account data
    fn fetch_account_data(&self, address: &Pubkey) -> Result<Vec<u8>, SwapError>;

    /// Balance of a token account
    fn fetch_token_balance(&self, token_account: &Pubkey) -> Result<TokenAmount, SwapError>;

    fn fetch_latest_blockhash(&self) -> Result<Hash, SwapError>;

    /// Lamports an account of `data_len` bytes needs to be rent exempt
    fn fetch_rent_exempt_minimum(&self, data_len: usize) -> Result<u64, SwapError>;

    /// Whether `owner` already holds any token account for `mint`
    fn token_account_exists(&self, owner: &Pubkey, mint: &Pubkey) -> Result<bool, SwapError>;

    fn submit_transaction(&self, transaction: &VersionedTransaction)
        -> Result<Signature, SwapError>;

    /// Wait up to `timeout` for the signature to confirm
    fn confirm_transaction(
        &self,
        signature: &Signature,
        timeout: Duration,
    ) -> Result<bool, SwapError>;

    /// Simulate without signature verification and return the program logs
    fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Vec<String>, SwapError>;

    /// Circulating supply of a mint
    fn fetch_token_supply(&self, mint: &Pubkey) -> Result<TokenAmount, SwapError>;
}

/// One account change; the payload is not needed, only the fact it changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountNotification {
    pub slot: u64,
}

/// Cancels a live subscription
pub trait SubscriptionHandle: Send {
    fn unsubscribe(self: Box<Self>) -> Result<(), SwapError>;
}

pub struct FeedSubscription {
    pub updates: mpsc::UnboundedReceiver<AccountNotification>,
    pub handle: Box<dyn SubscriptionHandle>,
}

/// Source of account change notifications
pub trait AccountFeed: Send + Sync {
    fn subscribe(&self, address: &Pubkey) -> Result<FeedSubscription, SwapError>;
}
