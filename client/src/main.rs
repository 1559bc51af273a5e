//! Pool price watcher
//!
//! Resolves the configured pool, reports its LP lock ratio, then follows
//! the pool account and logs every price change until interrupted.

use anyhow::{Context, Result};
use solana_sdk::signature::{Keypair, Signer};
use soldex_client::{
    rpc::{PubsubFeed, RpcTransport},
    Config, PoolHandle, PriceWatcher, Retried, Swapper, Transport,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({:#}), using mainnet defaults", e);
        Config::default_mainnet()
    });
    let commitment = config.commitment_config();

    log::info!("Connected to RPC: {}", config.rpc_url);
    log::info!("Watching pool: {}", config.pool_address);

    let transport: Arc<dyn Transport> =
        Arc::new(RpcTransport::new(config.rpc_url.clone(), commitment));
    let wallet = load_keypair(&config.keypair_path)?;
    log::info!("Wallet: {}", wallet.pubkey());

    let pool = PoolHandle::load(transport.as_ref(), config.programs, config.pool_address)
        .context("Failed to resolve pool")?;

    let swapper = Swapper::new(Arc::clone(&transport), pool.clone(), (&config).into());
    match swapper.lp_locked_ratio(&wallet, config.lp_probe_max_retries) {
        Retried::Succeeded(ratio) => log::info!("LP locked ratio: {:.4}", ratio),
        Retried::Exhausted { attempts } => {
            log::warn!("LP locked ratio unavailable after {} attempt(s)", attempts)
        }
    }

    let feed = PubsubFeed::new(config.ws_url.clone(), commitment);
    let cancel = CancellationToken::new();
    let watcher = PriceWatcher::spawn(pool, transport, &feed, config.live_config(), cancel.clone())?;

    let mut price = watcher.subscribe();
    log::info!("Price: {}", *price.borrow_and_update());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, shutting down");
                break;
            }
            changed = price.changed() => {
                if changed.is_err() {
                    break;
                }
                log::info!("Price: {}", *price.borrow_and_update());
            }
        }
    }

    if let Some(pool) = watcher.stop().await {
        let reserves = pool.reserves();
        log::info!("Final reserves: base {} quote {}", reserves.base, reserves.quote);
    }
    Ok(())
}

/// Load wallet keypair from a JSON byte array or raw 64-byte file
fn load_keypair(path: &str) -> Result<Keypair> {
    let expanded_path = shellexpand::tilde(path);
    let bytes = std::fs::read(expanded_path.as_ref())
        .context(format!("Failed to read keypair from {}", path))?;

    let keypair = if bytes.first() == Some(&b'[') {
        let json_data: Vec<u8> =
            serde_json::from_slice(&bytes).context("Failed to parse keypair JSON")?;
        Keypair::try_from(&json_data[..]).context("Failed to create keypair from bytes")?
    } else {
        Keypair::try_from(&bytes[..]).context("Failed to create keypair from bytes")?
    };

    Ok(keypair)
}
