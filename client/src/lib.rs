//! Swap client for AMM v4 liquidity pools
//!
//! Resolves a pool and its order-book market from chain state, quotes
//! trades against the vault reserves, and assembles the swap transaction.
//! Network access goes through the [`transport::Transport`] and
//! [`transport::AccountFeed`] traits; [`rpc`] implements them over the
//! Solana RPC and pubsub clients.

pub mod addresses;
pub mod config;
pub mod error;
pub mod instruction;
pub mod live;
pub mod plan;
pub mod pool;
pub mod queue;
pub mod retry;
pub mod rpc;
pub mod swap;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use addresses::ProgramAddresses;
pub use config::Config;
pub use error::SwapError;
pub use live::{LiveConfig, PriceWatcher};
pub use plan::{PlanBuilder, TransactionPlan};
pub use pool::PoolHandle;
pub use retry::Retried;
pub use swap::{LpSupply, SwapReceipt, SwapSettings, Swapper};
pub use transport::{AccountFeed, Transport};
