//! End-to-end swap flows against the reference pool
//!
//! Each test drives the public client surface only: load, quote, plan,
//! sign, submit, probe and the live price loop.

use solana_sdk::{
    message::VersionedMessage,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
use soldex_client::{
    live::LiveConfig,
    testing::{self, MockFeed},
    PriceWatcher, Retried, SwapError, Transport,
};
use soldex_integration_tests::reference_swapper;
use soldex_layout::{decode, schemas::SWAP_BASE_IN_V4};
use soldex_pricing::from_raw_amount;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Decoded swap payload of a submitted transaction
fn swap_payload(tx: &VersionedTransaction) -> (u64, u64) {
    let VersionedMessage::V0(message) = &tx.message else {
        panic!("expected a v0 message");
    };
    let amm_program = testing::programs().amm_program;
    let swap = message
        .instructions
        .iter()
        .find(|ix| message.account_keys[ix.program_id_index as usize] == amm_program)
        .expect("swap instruction present");

    let record = decode(&SWAP_BASE_IN_V4, &swap.data).unwrap();
    assert_eq!(record.u64("instruction").unwrap(), 9);
    (
        record.u64("amount_in").unwrap(),
        record.u64("min_amount_out").unwrap(),
    )
}

#[test]
fn test_buy_flow_encodes_quoted_minimum() {
    let (transport, mut swapper) = reference_swapper();
    let payer = Keypair::new();

    let receipt = swapper.buy(1.0, 0.01, &payer).unwrap();
    println!("buy {} -> min out {}", receipt.amount_in, receipt.min_amount_out);

    let submitted = transport.submitted();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].verify_with_results().iter().all(|ok| *ok));
    assert_eq!(submitted[0].message.static_account_keys()[0], payer.pubkey());
    assert_eq!(
        swap_payload(&submitted[0]),
        (1_000_000_000, 112_215_032)
    );
}

#[test]
fn test_sell_flow_uses_refreshed_reserves() {
    let (transport, mut swapper) = reference_swapper();
    let before = transport.balance_fetches();

    // quote vault doubles between load and sell
    transport.set_token_balance(testing::POOL_QUOTE_VAULT, 2 * testing::QUOTE_VAULT_AMOUNT, 9);
    let receipt = swapper.sell(2.5, 0.0, &Keypair::new()).unwrap();

    assert_eq!(transport.balance_fetches() - before, 2);
    let expected = swapper
        .pool()
        .quote(2.5, soldex_pricing::Direction::SpendBase, soldex_pricing::Unit::Base)
        .unwrap();
    assert_eq!(
        receipt.min_amount_out,
        swapper.pool().to_quote_units(expected.amount_out)
    );
    // twice the quote reserve, roughly twice the proceeds of 21_945_192
    assert!(receipt.min_amount_out > 43_000_000 && receipt.min_amount_out < 44_000_000);
    assert_eq!(swap_payload(&transport.submitted()[0]).0, 2_500_000);
}

#[test]
fn test_lp_ratio_survives_transient_failures() {
    let (transport, swapper) = reference_swapper();
    let signer = Keypair::new();

    transport.push_simulation(Err(SwapError::transient("simulate_transaction", "429")));
    let ratio = swapper.lp_locked_ratio(&signer, 3);

    let locked = testing::PROBE_LP_SUPPLY - testing::LP_MINT_SUPPLY;
    assert_eq!(
        ratio,
        Retried::Succeeded(locked as f64 / testing::PROBE_LP_SUPPLY as f64)
    );
    assert_eq!(transport.simulate_calls(), 2);

    // nothing was submitted, the probe is simulation only
    assert!(transport.submitted().is_empty());
}

#[test]
fn test_lp_ratio_exhausted_without_retries() {
    let (transport, swapper) = reference_swapper();
    transport.push_simulation(Err(SwapError::transient("simulate_transaction", "429")));

    assert_eq!(
        swapper.lp_locked_ratio(&Keypair::new(), 0),
        Retried::Exhausted { attempts: 1 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_live_price_then_trade() {
    let (transport, swapper) = reference_swapper();
    let feed = MockFeed::new();
    let dyn_transport: Arc<dyn Transport> = transport.clone();

    let watcher = PriceWatcher::spawn(
        swapper.pool().clone(),
        dyn_transport,
        &feed,
        LiveConfig::default(),
        CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(watcher.price(), swapper.current_price().unwrap());

    let new_quote = 83_737_754_845_948;
    transport.set_token_balance(testing::POOL_QUOTE_VAULT, new_quote, 9);
    for slot in 1..=20 {
        feed.notify(slot);
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    let expected = from_raw_amount(testing::BASE_VAULT_AMOUNT, 6) / from_raw_amount(new_quote, 9);
    assert_eq!(watcher.price(), expected);

    let pool = watcher.stop().await.unwrap();
    assert_eq!(pool.reserves().quote, from_raw_amount(new_quote, 9));
    assert_eq!(feed.unsubscribe_calls(), 1);

    // the swapper keeps its own snapshot until it refreshes
    assert_ne!(swapper.current_price().unwrap(), expected);
}
