//! [`Transport`] and [`AccountFeed`] over the Solana RPC and pubsub clients

use log::{debug, warn};
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    pubsub_client::PubsubClient,
    rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcSimulateTransactionConfig},
    rpc_request::TokenAccountsFilter,
};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::error::SwapError;
use crate::transport::{
    AccountFeed, AccountNotification, FeedSubscription, SubscriptionHandle, TokenAmount, Transport,
};

const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How often the forwarding thread checks for a stop request
const FEED_POLL_INTERVAL: Duration = Duration::from_millis(200);

fn parse_amount(
    operation: &'static str,
    amount: &str,
    decimals: u8,
) -> Result<TokenAmount, SwapError> {
    let amount = amount
        .parse()
        .map_err(|e| SwapError::transient(operation, format!("bad amount {amount:?}: {e}")))?;
    Ok(TokenAmount { amount, decimals })
}

/// Blocking JSON-RPC transport
pub struct RpcTransport {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcTransport {
    pub fn new(rpc_url: String, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url, commitment),
            commitment,
        }
    }
}

impl Transport for RpcTransport {
    fn fetch_account_data(&self, address: &Pubkey) -> Result<Vec<u8>, SwapError> {
        self.client
            .get_account_data(address)
            .map_err(|e| SwapError::transient("get_account", e))
    }

    fn fetch_token_balance(&self, token_account: &Pubkey) -> Result<TokenAmount, SwapError> {
        let balance = self
            .client
            .get_token_account_balance(token_account)
            .map_err(|e| SwapError::transient("get_token_account_balance", e))?;
        parse_amount("get_token_account_balance", &balance.amount, balance.decimals)
    }

    fn fetch_latest_blockhash(&self) -> Result<Hash, SwapError> {
        self.client
            .get_latest_blockhash()
            .map_err(|e| SwapError::transient("get_latest_blockhash", e))
    }

    fn fetch_rent_exempt_minimum(&self, data_len: usize) -> Result<u64, SwapError> {
        self.client
            .get_minimum_balance_for_rent_exemption(data_len)
            .map_err(|e| SwapError::transient("get_minimum_balance_for_rent_exemption", e))
    }

    fn token_account_exists(&self, owner: &Pubkey, mint: &Pubkey) -> Result<bool, SwapError> {
        let accounts = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::Mint(*mint))
            .map_err(|e| SwapError::transient("get_token_accounts_by_owner", e))?;
        Ok(!accounts.is_empty())
    }

    fn submit_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, SwapError> {
        self.client
            .send_transaction(transaction)
            .map_err(|e| SwapError::transient("send_transaction", e))
    }

    fn confirm_transaction(
        &self,
        signature: &Signature,
        timeout: Duration,
    ) -> Result<bool, SwapError> {
        let deadline = Instant::now() + timeout;
        loop {
            let confirmed = self
                .client
                .confirm_transaction_with_commitment(signature, self.commitment)
                .map_err(|e| SwapError::transient("confirm_transaction", e))?
                .value;
            if confirmed {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(CONFIRM_POLL_INTERVAL);
        }
    }

    fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Vec<String>, SwapError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.commitment),
            ..RpcSimulateTransactionConfig::default()
        };
        let result = self
            .client
            .simulate_transaction_with_config(transaction, config)
            .map_err(|e| SwapError::transient("simulate_transaction", e))?
            .value;

        if let Some(err) = &result.err {
            debug!("simulation reported {}", err);
        }
        Ok(result.logs.unwrap_or_default())
    }

    fn fetch_token_supply(&self, mint: &Pubkey) -> Result<TokenAmount, SwapError> {
        let supply = self
            .client
            .get_token_supply(mint)
            .map_err(|e| SwapError::transient("get_token_supply", e))?;
        parse_amount("get_token_supply", &supply.amount, supply.decimals)
    }
}

/// Account change feed over the websocket pubsub endpoint
///
/// Each subscription owns a thread that holds the websocket and forwards
/// change notifications into the subscription channel.
pub struct PubsubFeed {
    ws_url: String,
    commitment: CommitmentConfig,
}

impl PubsubFeed {
    pub fn new(ws_url: String, commitment: CommitmentConfig) -> Self {
        Self { ws_url, commitment }
    }
}

struct PubsubHandle {
    stop: Arc<AtomicBool>,
    forwarder: JoinHandle<Result<(), SwapError>>,
}

impl SubscriptionHandle for PubsubHandle {
    fn unsubscribe(self: Box<Self>) -> Result<(), SwapError> {
        self.stop.store(true, Ordering::SeqCst);
        self.forwarder
            .join()
            .map_err(|_| SwapError::transient("account_unsubscribe", "feed thread panicked"))?
    }
}

impl AccountFeed for PubsubFeed {
    fn subscribe(&self, address: &Pubkey) -> Result<FeedSubscription, SwapError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));

        let ws_url = self.ws_url.clone();
        let address = *address;
        let config = RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            commitment: Some(self.commitment),
            ..RpcAccountInfoConfig::default()
        };
        let thread_stop = Arc::clone(&stop);

        let forwarder = thread::Builder::new()
            .name(format!("feed-{}", address))
            .spawn(move || {
                let (mut subscription, updates) =
                    match PubsubClient::account_subscribe(&ws_url, &address, Some(config)) {
                        Ok(pair) => {
                            let _ = ready_tx.send(Ok(()));
                            pair
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(SwapError::transient("account_subscribe", e)));
                            return Ok(());
                        }
                    };

                while !thread_stop.load(Ordering::SeqCst) {
                    match updates.recv_timeout(FEED_POLL_INTERVAL) {
                        Ok(response) => {
                            let notification = AccountNotification {
                                slot: response.context.slot,
                            };
                            if tx.send(notification).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.is_timeout() => {}
                        Err(_) => {
                            warn!("account feed for {} disconnected", address);
                            break;
                        }
                    }
                }
                // ends the receiver side of the subscription channel
                drop(tx);

                subscription
                    .send_unsubscribe()
                    .map_err(|e| SwapError::transient("account_unsubscribe", e))?;
                subscription
                    .shutdown()
                    .map_err(|_| SwapError::transient("account_unsubscribe", "socket thread panicked"))
            })
            .map_err(|e| SwapError::transient("account_subscribe", e))?;

        ready_rx
            .recv()
            .map_err(|e| SwapError::transient("account_subscribe", e))??;
        debug!("subscribed to account {}", address);

        Ok(FeedSubscription {
            updates: rx,
            handle: Box::new(PubsubHandle { stop, forwarder }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(
            parse_amount("get_token_supply", "1119806588206", 6).unwrap(),
            TokenAmount {
                amount: 1_119_806_588_206,
                decimals: 6
            }
        );

        let err = parse_amount("get_token_supply", "1.5", 6).unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().starts_with("get_token_supply failed"));
    }
}
