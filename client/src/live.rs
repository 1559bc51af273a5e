//! Live price loop
//!
//! A producer task moves account change notifications from the feed into a
//! bounded drop-oldest queue. The consumer coalesces whatever is pending,
//! refreshes the vault balances, republishes the price and then sleeps out
//! the rest of the minimum refresh interval.

use log::{debug, info, warn};
use soldex_pricing::{Direction, Unit};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::SwapError;
use crate::pool::{fetch_reserves, PoolHandle};
use crate::queue::NotificationQueue;
use crate::transport::{AccountFeed, AccountNotification, FeedSubscription, Transport};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveConfig {
    /// Pending notifications kept before the oldest is dropped
    pub queue_capacity: usize,
    /// Minimum time between the starts of two refreshes
    pub min_refresh_interval: Duration,
    /// Trade size used to compute the published price
    pub virtual_amount: f64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            min_refresh_interval: Duration::from_millis(100),
            virtual_amount: 1.0,
        }
    }
}

/// Mid price (base per quote) for a virtual trade on the current snapshot
pub fn reference_price(pool: &PoolHandle, virtual_amount: f64) -> Result<f64, SwapError> {
    Ok(pool
        .quote(virtual_amount, Direction::SpendQuote, Unit::Base)?
        .mid_price)
}

/// Handle to a running live price loop
pub struct PriceWatcher {
    price: watch::Receiver<f64>,
    cancel: CancellationToken,
    task: JoinHandle<PoolHandle>,
}

impl PriceWatcher {
    /// Subscribe to the pool account and start the loop
    ///
    /// Must be called within a tokio runtime of either flavor. Transport
    /// calls inside the loop run on the blocking pool, so a transport may
    /// block the calling thread. The subscription itself is opened on the
    /// caller's thread. The loop stops when `cancel` fires or the feed ends.
    pub fn spawn(
        pool: PoolHandle,
        transport: Arc<dyn Transport>,
        feed: &dyn AccountFeed,
        config: LiveConfig,
        cancel: CancellationToken,
    ) -> Result<Self, SwapError> {
        let initial = reference_price(&pool, config.virtual_amount)?;
        let subscription = feed.subscribe(&pool.amm_id())?;
        let (tx, rx) = watch::channel(initial);

        info!("watching pool {} (initial price {})", pool.amm_id(), initial);
        let task = tokio::spawn(run(pool, transport, subscription, config, cancel.clone(), tx));

        Ok(Self {
            price: rx,
            cancel,
            task,
        })
    }

    /// Latest published price
    pub fn price(&self) -> f64 {
        *self.price.borrow()
    }

    /// Receiver that wakes on every price change
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.price.clone()
    }

    /// Cancel the loop and wait for it to release the subscription
    ///
    /// Returns the pool handle with its last refreshed balances.
    pub async fn stop(self) -> Option<PoolHandle> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the loop to finish on its own
    pub async fn join(self) -> Option<PoolHandle> {
        match self.task.await {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("price loop task failed: {}", e);
                None
            }
        }
    }
}

async fn run(
    mut pool: PoolHandle,
    transport: Arc<dyn Transport>,
    subscription: FeedSubscription,
    config: LiveConfig,
    cancel: CancellationToken,
    price: watch::Sender<f64>,
) -> PoolHandle {
    let FeedSubscription {
        mut updates,
        handle,
    } = subscription;
    let queue = Arc::new(NotificationQueue::<AccountNotification>::new(config.queue_capacity));

    let producer_cancel = cancel.child_token();
    let producer = {
        let queue = Arc::clone(&queue);
        let cancel = producer_cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = updates.recv() => match next {
                        Some(notification) => {
                            if queue.push(notification) {
                                debug!("notification queue full; dropped oldest");
                            }
                        }
                        None => break,
                    },
                }
            }
            queue.close();
        })
    };

    loop {
        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            batch = queue.take_latest() => batch,
        };
        let Some(batch) = batch else {
            info!("account feed for {} ended", pool.amm_id());
            break;
        };
        if batch.skipped > 0 {
            debug!("coalesced {} notifications up to slot {}", batch.skipped + 1, batch.latest.slot);
        }

        let started = Instant::now();
        let fetched = {
            let transport = Arc::clone(&transport);
            let (base, quote) = (*pool.base(), *pool.quote_side());
            task::spawn_blocking(move || fetch_reserves(transport.as_ref(), &base, &quote)).await
        };
        let refreshed = fetched
            .unwrap_or_else(|e| Err(SwapError::transient("refresh_balances", e)))
            .and_then(|reserves| {
                pool.set_reserves(reserves);
                reference_price(&pool, config.virtual_amount)
            });
        match refreshed {
            Ok(new_price) => {
                price.send_if_modified(|current| {
                    let changed = *current != new_price;
                    *current = new_price;
                    changed
                });
            }
            Err(e) => warn!("price refresh for {} failed: {}", pool.amm_id(), e),
        }

        let remaining = config.min_refresh_interval.saturating_sub(started.elapsed());
        if !remaining.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(remaining) => {}
            }
        }
    }

    producer_cancel.cancel();
    if let Err(e) = producer.await {
        warn!("notification producer task failed: {}", e);
    }
    match task::spawn_blocking(move || handle.unsubscribe()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("unsubscribe from {} failed: {}", pool.amm_id(), e),
        Err(e) => debug!("unsubscribe task for {} failed: {}", pool.amm_id(), e),
    }
    info!("stopped watching pool {}", pool.amm_id());
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, MockFeed, MockTransport};
    use crate::transport::TokenAmount;
    use solana_sdk::{
        hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
    };

    /// Delegates to the mock but, like the RPC client, only works where the
    /// runtime allows blocking
    struct BlockingOnly(Arc<MockTransport>);

    impl Transport for BlockingOnly {
        fn fetch_account_data(&self, address: &Pubkey) -> Result<Vec<u8>, SwapError> {
            task::block_in_place(|| self.0.fetch_account_data(address))
        }

        fn fetch_token_balance(&self, token_account: &Pubkey) -> Result<TokenAmount, SwapError> {
            task::block_in_place(|| self.0.fetch_token_balance(token_account))
        }

        fn fetch_latest_blockhash(&self) -> Result<Hash, SwapError> {
            task::block_in_place(|| self.0.fetch_latest_blockhash())
        }

        fn fetch_rent_exempt_minimum(&self, data_len: usize) -> Result<u64, SwapError> {
            task::block_in_place(|| self.0.fetch_rent_exempt_minimum(data_len))
        }

        fn token_account_exists(&self, owner: &Pubkey, mint: &Pubkey) -> Result<bool, SwapError> {
            task::block_in_place(|| self.0.token_account_exists(owner, mint))
        }

        fn submit_transaction(
            &self,
            transaction: &VersionedTransaction,
        ) -> Result<Signature, SwapError> {
            task::block_in_place(|| self.0.submit_transaction(transaction))
        }

        fn confirm_transaction(
            &self,
            signature: &Signature,
            timeout: Duration,
        ) -> Result<bool, SwapError> {
            task::block_in_place(|| self.0.confirm_transaction(signature, timeout))
        }

        fn simulate_transaction(
            &self,
            transaction: &VersionedTransaction,
        ) -> Result<Vec<String>, SwapError> {
            task::block_in_place(|| self.0.simulate_transaction(transaction))
        }

        fn fetch_token_supply(&self, mint: &Pubkey) -> Result<TokenAmount, SwapError> {
            task::block_in_place(|| self.0.fetch_token_supply(mint))
        }
    }

    fn reference() -> (Arc<MockTransport>, PoolHandle) {
        let transport = Arc::new(MockTransport::reference_pool());
        let pool =
            PoolHandle::load(transport.as_ref(), testing::programs(), testing::AMM_ID).unwrap();
        (transport, pool)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_refresh() {
        let (transport, pool) = reference();
        let feed = MockFeed::new();
        let baseline = transport.balance_fetches();

        let watcher = PriceWatcher::spawn(
            pool,
            transport.clone(),
            &feed,
            LiveConfig::default(),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(feed.subscribed(), vec![testing::AMM_ID]);

        for slot in 0..500 {
            feed.notify(slot);
        }
        sleep(Duration::from_millis(250)).await;
        watcher.stop().await.unwrap();

        // two vault reads per refresh
        let refreshes = (transport.balance_fetches() - baseline) / 2;
        assert!((1..=3).contains(&refreshes), "refreshes: {refreshes}");
        assert_eq!(feed.unsubscribe_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_rate_is_capped() {
        let (transport, pool) = reference();
        let feed = MockFeed::new();
        let baseline = transport.balance_fetches();

        let config = LiveConfig {
            min_refresh_interval: Duration::from_millis(100),
            ..LiveConfig::default()
        };
        let watcher =
            PriceWatcher::spawn(pool, transport.clone(), &feed, config, CancellationToken::new())
                .unwrap();

        // one notification every 10ms for 1s
        for slot in 0..100 {
            feed.notify(slot);
            sleep(Duration::from_millis(10)).await;
        }
        watcher.stop().await.unwrap();

        let refreshes = (transport.balance_fetches() - baseline) / 2;
        assert!(refreshes <= 11, "refreshes: {refreshes}");
        assert!(refreshes >= 9, "refreshes: {refreshes}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_follows_reserves() {
        let (transport, pool) = reference();
        let feed = MockFeed::new();

        let watcher = PriceWatcher::spawn(
            pool,
            transport.clone(),
            &feed,
            LiveConfig::default(),
            CancellationToken::new(),
        )
        .unwrap();
        let initial = watcher.price();
        assert!((initial - 113.6353067430545).abs() < 1e-9);

        let mut prices = watcher.subscribe();
        // quote reserve doubles, so base per quote halves
        transport.set_token_balance(testing::POOL_QUOTE_VAULT, 2 * testing::QUOTE_VAULT_AMOUNT, 9);
        feed.notify(1);
        prices.changed().await.unwrap();

        assert!((watcher.price() - initial / 2.0).abs() < 1e-9);
        let pool = watcher.stop().await.unwrap();
        assert_eq!(pool.reserves().quote, 2.0 * 41868.877422974);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_running() {
        let (transport, pool) = reference();
        let feed = MockFeed::new();

        let watcher = PriceWatcher::spawn(
            pool,
            transport.clone(),
            &feed,
            LiveConfig::default(),
            CancellationToken::new(),
        )
        .unwrap();
        let initial = watcher.price();

        transport.fail_balance_fetches(1);
        feed.notify(1);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(watcher.price(), initial);

        transport.set_token_balance(testing::POOL_BASE_VAULT, 2 * testing::BASE_VAULT_AMOUNT, 6);
        feed.notify(2);
        sleep(Duration::from_millis(150)).await;
        assert!((watcher.price() - 2.0 * initial).abs() < 1e-9);

        watcher.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_swallows_unsubscribe_failure() {
        let (transport, pool) = reference();
        let feed = MockFeed::failing_unsubscribe();
        let cancel = CancellationToken::new();

        let watcher =
            PriceWatcher::spawn(pool, transport, &feed, LiveConfig::default(), cancel.clone())
                .unwrap();
        cancel.cancel();

        assert!(watcher.join().await.is_some());
        assert_eq!(feed.unsubscribe_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_end_stops_loop() {
        let (transport, pool) = reference();
        let feed = MockFeed::new();

        let watcher =
            PriceWatcher::spawn(pool, transport, &feed, LiveConfig::default(), CancellationToken::new())
                .unwrap();
        feed.notify(1);
        feed.close();

        assert!(watcher.join().await.is_some());
        assert_eq!(feed.unsubscribe_calls(), 1);
    }

    #[tokio::test]
    async fn test_blocking_transport_on_current_thread_runtime() {
        let (transport, pool) = reference();
        let feed = MockFeed::new();
        let blocking: Arc<dyn Transport> = Arc::new(BlockingOnly(transport.clone()));

        let watcher =
            PriceWatcher::spawn(pool, blocking, &feed, LiveConfig::default(), CancellationToken::new())
                .unwrap();
        let initial = watcher.price();
        let mut prices = watcher.subscribe();

        transport.set_token_balance(testing::POOL_QUOTE_VAULT, 2 * testing::QUOTE_VAULT_AMOUNT, 9);
        feed.notify(1);
        tokio::time::timeout(Duration::from_secs(5), prices.changed())
            .await
            .expect("price published")
            .unwrap();
        assert!((watcher.price() - initial / 2.0).abs() < 1e-9);

        let pool = watcher.stop().await.expect("loop task survives");
        assert_eq!(pool.reserves().quote, 2.0 * 41868.877422974);
        assert_eq!(feed.unsubscribe_calls(), 1);
    }
}
