//! In-memory transport, account feed and reference pool fixtures
//!
//! The reference pool is the RAY/SOL AMM v4 pool with vault balances of
//! 4757782.728947 RAY and 41868.877422974 SOL.

use solana_sdk::{
    hash::Hash, program_pack::Pack, pubkey, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use soldex_layout::{
    encode,
    schemas::{MARKET_ACCOUNT_FLAGS, MARKET_V2, POOL_V4},
    Record, Value,
};
use spl_token::state::{Account as TokenAccount, AccountState};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::addresses::ProgramAddresses;
use crate::error::SwapError;
use crate::transport::{
    AccountFeed, AccountNotification, FeedSubscription, SubscriptionHandle, TokenAmount, Transport,
};

pub const AMM_ID: Pubkey = pubkey!("AVs9TA4nWDzfPJE9gGVNJMVhcQy3V9PGazuz33BfG2RA");
pub const BASE_MINT: Pubkey = pubkey!("4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R");
pub const OPEN_ORDERS: Pubkey = pubkey!("6Su6Ea97dBxecd5W92KcVvv6SzCurE2BXGgFe9LNGMpE");
pub const TARGET_ORDERS: Pubkey = pubkey!("5hATcCfvhVwAjNExvrg8rRkXmYyksHhVajWLa46iRsmE");
pub const POOL_BASE_VAULT: Pubkey = pubkey!("Em6rHi68trYgBFyJ5261A2nhwuQWfLcirgzZZYoRcrkX");
pub const POOL_QUOTE_VAULT: Pubkey = pubkey!("3mEFzHsJyu2Cpjrz6zPmTzP7uoLFj9SbbecGVzzkL1mJ");
pub const LP_MINT: Pubkey = pubkey!("89ZKE4aoyfLBe2RuV6jM3JGNhaV18Nxh8eNtjRcndBip");
pub const POOL_OWNER: Pubkey = pubkey!("GThUX1Atko4tqhN2NaiTazWSeFWMuiUvfFnyJyUghFMJ");
pub const MARKET_PROGRAM_ID: Pubkey = pubkey!("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
pub const MARKET_ID: Pubkey = pubkey!("C6tp2RVZnxBPFbnAsfTjis8BN9tycESAT4SgDQgbbrsA");
pub const MARKET_BIDS: Pubkey = pubkey!("C1nEbACFaHMUiKAUsXVYPWZsuxunJeBkqXHPFr8QgSj9");
pub const MARKET_ASKS: Pubkey = pubkey!("4DNBdnTw6wmrK4NmdSTTxs1kEz47yjqLGuoqsMeHvkMF");
pub const MARKET_EVENT_QUEUE: Pubkey = pubkey!("4HGvdannxvmAhszVVig9auH6HsqVH17qoavDiNcnm9nj");
pub const MARKET_REQUEST_QUEUE: Pubkey = pubkey!("5RvwcchZSYCYTUxA8kgbAWwZ9RsFGzVRELyHEQK9YwYz");
pub const MARKET_BASE_VAULT: Pubkey = pubkey!("6U6U59zmFWrPSzm9sLX7kVkaK78Kz7XJYkrhP1DjF3uF");
pub const MARKET_QUOTE_VAULT: Pubkey = pubkey!("4YEx21yeUAZxUL9Fs7YU9Gm3u45GWoPFs8vcJiHga2eQ");
pub const VAULT_SIGNER: Pubkey = pubkey!("7SdieGqwPJo5rMmSQM9JmntSEMoimM4dQn7NkGbNFcrd");

pub const BASE_VAULT_AMOUNT: u64 = 4_757_782_728_947;
pub const QUOTE_VAULT_AMOUNT: u64 = 41_868_877_422_974;

/// Total LP supply the reference probe log reports
pub const PROBE_LP_SUPPLY: u64 = 1_500_000_000_000;

/// Circulating LP supply of the reference LP mint
pub const LP_MINT_SUPPLY: u64 = 1_119_806_588_206;

/// Rent-exempt minimum for a 165-byte token account
pub const TOKEN_ACCOUNT_RENT: u64 = 2_039_280;

pub fn programs() -> ProgramAddresses {
    ProgramAddresses::mainnet()
}

fn with_unsigned(record: Record, fields: &[(&str, u128)]) -> Record {
    fields
        .iter()
        .fold(record, |r, (name, value)| r.with(name, Value::Unsigned(*value)))
}

fn with_addresses(record: Record, fields: &[(&str, Pubkey)]) -> Record {
    fields
        .iter()
        .fold(record, |r, (name, key)| r.with(name, Value::Bytes(key.to_bytes().to_vec())))
}

/// Reference pool-v4 record with the given mint order
pub fn pool_record(base_mint: Pubkey, quote_mint: Pubkey) -> Record {
    let record = with_unsigned(
        Record::new(),
        &[
            ("status", 6),
            ("nonce", 254),
            ("max_order", 7),
            ("depth", 3),
            ("base_decimal", 6),
            ("quote_decimal", 9),
            ("state", 2),
            ("reset_flag", 0),
            ("min_size", 100_000_000),
            ("vol_max_cut_ratio", 500),
            ("amount_wave_ratio", 0),
            ("base_lot_size", 100_000),
            ("quote_lot_size", 1_000_000),
            ("min_price_multiplier", 1),
            ("max_price_multiplier", 1_000_000_000),
            ("system_decimal_value", 1_000_000_000),
            ("min_separate_numerator", 5),
            ("min_separate_denominator", 10_000),
            ("trade_fee_numerator", 25),
            ("trade_fee_denominator", 10_000),
            ("pnl_numerator", 12),
            ("pnl_denominator", 100),
            ("swap_fee_numerator", 25),
            ("swap_fee_denominator", 10_000),
            ("base_need_take_pnl", 628_249),
            ("quote_need_take_pnl", 5_531_365),
            ("quote_total_pnl", 59_813_427_324_701),
            ("base_total_pnl", 2_165_806_762_233),
            ("pool_open_time", 0),
            ("punish_pc_amount", 0),
            ("punish_coin_amount", 0),
            ("orderbook_to_init_time", 0),
            ("swap_base_in_amount", 841_604_976_034_564),
            ("swap_quote_out_amount", 23_163_014_813_365_249),
            ("swap_base2_quote_fee", 57_163_480_188_951),
            ("swap_quote_in_amount", 22_850_931_937_005_121),
            ("swap_base_out_amount", 830_174_109_992_596),
            ("swap_quote2_base_fee", 2_104_716_679_842),
            ("lp_reserve", 1_119_806_588_206),
        ],
    );
    with_addresses(
        record,
        &[
            ("base_vault", POOL_BASE_VAULT),
            ("quote_vault", POOL_QUOTE_VAULT),
            ("base_mint", base_mint),
            ("quote_mint", quote_mint),
            ("lp_mint", LP_MINT),
            ("open_orders", OPEN_ORDERS),
            ("market_id", MARKET_ID),
            ("market_program_id", MARKET_PROGRAM_ID),
            ("target_orders", TARGET_ORDERS),
            ("withdraw_queue", Pubkey::default()),
            ("lp_vault", Pubkey::default()),
            ("owner", POOL_OWNER),
        ],
    )
}

/// Reference market-v2 record
pub fn market_record() -> Record {
    let flags = MARKET_ACCOUNT_FLAGS
        .iter()
        .map(|name| (*name, matches!(*name, "initialized" | "market")))
        .collect();

    let record = with_unsigned(
        Record::new().with("account_flags", Value::Flags(flags)),
        &[
            ("vault_signer_nonce", 1),
            ("base_deposits_total", 69_593_500_000),
            ("base_fees_accrued", 0),
            ("quote_deposits_total", 4_135_892_464_680),
            ("quote_fees_accrued", 8_679_765_412),
            ("quote_dust_threshold", 100),
            ("base_lot_size", 100_000),
            ("quote_lot_size", 100_000),
            ("fee_rate_bps", 0),
            ("referrer_rebates_accrued", 320_936_676_783),
        ],
    );
    with_addresses(
        record,
        &[
            ("own_address", MARKET_ID),
            ("base_mint", BASE_MINT),
            ("quote_mint", spl_token::native_mint::id()),
            ("base_vault", MARKET_BASE_VAULT),
            ("quote_vault", MARKET_QUOTE_VAULT),
            ("request_queue", MARKET_REQUEST_QUEUE),
            ("event_queue", MARKET_EVENT_QUEUE),
            ("bids", MARKET_BIDS),
            ("asks", MARKET_ASKS),
        ],
    )
}

/// Packed token account owned by `owner`
pub fn token_account_data(mint: Pubkey, owner: Pubkey, amount: u64) -> Vec<u8> {
    let account = TokenAccount {
        mint,
        owner,
        amount,
        state: AccountState::Initialized,
        ..TokenAccount::default()
    };
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(account, &mut data).expect("token account fits its own length");
    data
}

/// Log lines a pool data simulation produces
pub fn probe_logs(lp_supply: u64) -> Vec<String> {
    vec![
        format!("Program {} invoke [1]", programs().amm_program),
        "Program log: process_swap_base_in_with_user_account".to_string(),
        format!(
            "Program log: GetPoolData: {{\"status\":6,\"coin_decimals\":6,\"pc_decimals\":9,\"lp_decimals\":6,\"pool_pc_amount\":{},\"pool_coin_amount\":{},\"pool_lp_supply\":{},\"pool_open_time\":0,\"amm_id\":\"{}\"}}",
            QUOTE_VAULT_AMOUNT, BASE_VAULT_AMOUNT, lp_supply, AMM_ID
        ),
        format!("Program {} success", programs().amm_program),
    ]
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<Pubkey, Vec<u8>>,
    balances: HashMap<Pubkey, TokenAmount>,
    supplies: HashMap<Pubkey, TokenAmount>,
    token_accounts: HashSet<(Pubkey, Pubkey)>,
    simulations: VecDeque<Result<Vec<String>, SwapError>>,
    default_logs: Vec<String>,
    balance_failures: usize,
    balance_fetches: usize,
    simulate_calls: usize,
    submitted: Vec<VersionedTransaction>,
    confirms: bool,
}

/// In-memory [`Transport`] with call counters
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        let transport = Self::default();
        transport.state().confirms = true;
        transport
    }

    /// Accounts and balances of the reference pool
    pub fn reference_pool() -> Self {
        let transport = Self::new();
        transport.install_reference(
            pool_record(BASE_MINT, spl_token::native_mint::id()),
            (BASE_VAULT_AMOUNT, 6),
            (QUOTE_VAULT_AMOUNT, 9),
        );
        transport
    }

    /// Reference pool recorded with the settlement mint as base
    pub fn reversed_reference_pool() -> Self {
        let transport = Self::new();
        transport.install_reference(
            pool_record(spl_token::native_mint::id(), BASE_MINT),
            (QUOTE_VAULT_AMOUNT, 9),
            (BASE_VAULT_AMOUNT, 6),
        );
        transport
    }

    fn install_reference(&self, pool: Record, base: (u64, u8), quote: (u64, u8)) {
        let pool = encode(&POOL_V4, &pool).expect("reference pool encodes");
        let market = encode(&MARKET_V2, &market_record()).expect("reference market encodes");

        self.set_account(AMM_ID, pool);
        self.set_account(MARKET_ID, market);
        self.set_account(
            MARKET_BASE_VAULT,
            token_account_data(BASE_MINT, VAULT_SIGNER, 69_593_500_000),
        );
        self.set_token_balance(POOL_BASE_VAULT, base.0, base.1);
        self.set_token_balance(POOL_QUOTE_VAULT, quote.0, quote.1);
        self.set_token_supply(LP_MINT, LP_MINT_SUPPLY, 6);
        self.state().default_logs = probe_logs(PROBE_LP_SUPPLY);
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.state().accounts.insert(address, data);
    }

    pub fn set_token_balance(&self, account: Pubkey, amount: u64, decimals: u8) {
        self.state()
            .balances
            .insert(account, TokenAmount { amount, decimals });
    }

    pub fn set_token_supply(&self, mint: Pubkey, amount: u64, decimals: u8) {
        self.state()
            .supplies
            .insert(mint, TokenAmount { amount, decimals });
    }

    /// Record that `owner` holds a token account for `mint`
    pub fn add_token_account(&self, owner: Pubkey, mint: Pubkey) {
        self.state().token_accounts.insert((owner, mint));
    }

    /// Queue the outcome of the next simulation; falls back to the
    /// reference probe logs once the queue is empty
    pub fn push_simulation(&self, outcome: Result<Vec<String>, SwapError>) {
        self.state().simulations.push_back(outcome);
    }

    /// Fail the next `n` balance fetches with a transient error
    pub fn fail_balance_fetches(&self, n: usize) {
        self.state().balance_failures = n;
    }

    pub fn set_confirms(&self, confirms: bool) {
        self.state().confirms = confirms;
    }

    pub fn balance_fetches(&self) -> usize {
        self.state().balance_fetches
    }

    pub fn simulate_calls(&self) -> usize {
        self.state().simulate_calls
    }

    pub fn submitted(&self) -> Vec<VersionedTransaction> {
        self.state().submitted.clone()
    }
}

impl Transport for MockTransport {
    fn fetch_account_data(&self, address: &Pubkey) -> Result<Vec<u8>, SwapError> {
        self.state()
            .accounts
            .get(address)
            .cloned()
            .ok_or_else(|| SwapError::transient("get_account", format!("account {address} not found")))
    }

    fn fetch_token_balance(&self, token_account: &Pubkey) -> Result<TokenAmount, SwapError> {
        let mut state = self.state();
        state.balance_fetches += 1;
        if state.balance_failures > 0 {
            state.balance_failures -= 1;
            return Err(SwapError::transient("get_token_account_balance", "connection reset"));
        }
        state.balances.get(token_account).copied().ok_or_else(|| {
            SwapError::transient("get_token_account_balance", format!("{token_account} not found"))
        })
    }

    fn fetch_latest_blockhash(&self) -> Result<Hash, SwapError> {
        Ok(Hash::new_from_array([7u8; 32]))
    }

    fn fetch_rent_exempt_minimum(&self, _data_len: usize) -> Result<u64, SwapError> {
        Ok(TOKEN_ACCOUNT_RENT)
    }

    fn token_account_exists(&self, owner: &Pubkey, mint: &Pubkey) -> Result<bool, SwapError> {
        Ok(self.state().token_accounts.contains(&(*owner, *mint)))
    }

    fn submit_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, SwapError> {
        self.state().submitted.push(transaction.clone());
        Ok(transaction.signatures.first().cloned().unwrap_or_default())
    }

    fn confirm_transaction(
        &self,
        _signature: &Signature,
        _timeout: Duration,
    ) -> Result<bool, SwapError> {
        Ok(self.state().confirms)
    }

    fn simulate_transaction(
        &self,
        _transaction: &VersionedTransaction,
    ) -> Result<Vec<String>, SwapError> {
        let mut state = self.state();
        state.simulate_calls += 1;
        match state.simulations.pop_front() {
            Some(outcome) => outcome,
            None => Ok(state.default_logs.clone()),
        }
    }

    fn fetch_token_supply(&self, mint: &Pubkey) -> Result<TokenAmount, SwapError> {
        self.state()
            .supplies
            .get(mint)
            .copied()
            .ok_or_else(|| SwapError::transient("get_token_supply", format!("{mint} not found")))
    }
}

/// In-memory [`AccountFeed`]; notifications are pushed by the test
#[derive(Default)]
pub struct MockFeed {
    senders: Mutex<Vec<mpsc::UnboundedSender<AccountNotification>>>,
    subscribed: Mutex<Vec<Pubkey>>,
    unsubscribed: Arc<AtomicUsize>,
    fail_unsubscribe: bool,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed whose unsubscribe always errors
    pub fn failing_unsubscribe() -> Self {
        Self {
            fail_unsubscribe: true,
            ..Self::default()
        }
    }

    /// Deliver one change notification to every live subscriber
    pub fn notify(&self, slot: u64) {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(AccountNotification { slot }).is_ok());
    }

    /// End every subscription stream
    pub fn close(&self) {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn subscribed(&self) -> Vec<Pubkey> {
        self.subscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribed.load(Ordering::SeqCst)
    }
}

struct MockHandle {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl SubscriptionHandle for MockHandle {
    fn unsubscribe(self: Box<Self>) -> Result<(), SwapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SwapError::transient("account_unsubscribe", "socket closed"));
        }
        Ok(())
    }
}

impl AccountFeed for MockFeed {
    fn subscribe(&self, address: &Pubkey) -> Result<FeedSubscription, SwapError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        self.subscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*address);

        Ok(FeedSubscription {
            updates: rx,
            handle: Box::new(MockHandle {
                calls: Arc::clone(&self.unsubscribed),
                fail: self.fail_unsubscribe,
            }),
        })
    }
}
