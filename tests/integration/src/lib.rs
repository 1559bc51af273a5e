//! Soldex Integration Tests
//!
//! End-to-end flows across the layout codec, pricing math and swap client,
//! run against the in-memory transport and account feed with the RAY/SOL
//! reference pool loaded.

use soldex_client::{
    testing::{self, MockTransport},
    PoolHandle, SwapSettings, Swapper,
};
use std::sync::Arc;
use std::time::Duration;

/// Reference pool loaded through a fresh mock transport
pub fn reference_swapper() -> (Arc<MockTransport>, Swapper) {
    let transport = Arc::new(MockTransport::reference_pool());
    let pool = PoolHandle::load(transport.as_ref(), testing::programs(), testing::AMM_ID)
        .expect("reference pool loads");
    let settings = SwapSettings {
        retry_backoff: Duration::ZERO,
        ..SwapSettings::default()
    };
    let swapper = Swapper::new(transport.clone(), pool, settings);
    (transport, swapper)
}
