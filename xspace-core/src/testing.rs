//! In-memory test doubles.
//!
//! Scripted stand-ins for the wallet providers and the ledger, plus fixture
//! tokens and networks. Each double records the calls it receives so tests can
//! assert what was (and was not) sent out.

use crate::ledger::{ApproveAmount, BridgeLedger};
use crate::provider::{ProviderError, WalletProvider};
use async_trait::async_trait;
use compact_str::CompactString;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;
use xspace_sdk::config::{
    ApprovalPolicy, CrossSpaceConfig, NetworksConfig, TokensConfig,
};
use xspace_sdk::objects::{NativeCurrency, Network, Space, Token, WalletStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// CallLatch
// ---------------------------------------------------------------------------

/// Holds a mocked call open until the test releases it.
#[derive(Default)]
pub struct CallLatch {
    armed: AtomicBool,
    started: Notify,
    release: Notify,
}

impl CallLatch {
    /// Make the next calls wait for [`release`](CallLatch::release).
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Let later calls through without waiting.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Wait until a held call has started.
    pub async fn started(&self) {
        self.started.notified().await;
    }

    /// Let one held call finish.
    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        if self.armed.load(Ordering::SeqCst) {
            self.started.notify_one();
            self.release.notified().await;
        }
    }
}

// ---------------------------------------------------------------------------
// MockWalletProvider
// ---------------------------------------------------------------------------

/// A call received by [`MockWalletProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderCall {
    Connect,
    SwitchChain(u64),
    AddChain(u64),
}

struct MockWalletState {
    status: WalletStatus,
    chain_id: Option<u64>,
    connect_results: VecDeque<Result<(), ProviderError>>,
    switch_results: VecDeque<Result<(), ProviderError>>,
    add_chain_results: VecDeque<Result<(), ProviderError>>,
    calls: Vec<ProviderCall>,
}

/// Scripted wallet provider.
///
/// Calls succeed unless a failure was queued. A successful connect makes the
/// wallet active, a successful switch moves it to the requested chain, a
/// successful add-chain changes nothing observable.
pub struct MockWalletProvider {
    state: Mutex<MockWalletState>,
    pub latch: CallLatch,
}

impl MockWalletProvider {
    pub fn new(status: WalletStatus, chain_id: Option<u64>) -> Self {
        Self {
            state: Mutex::new(MockWalletState {
                status,
                chain_id,
                connect_results: VecDeque::new(),
                switch_results: VecDeque::new(),
                add_chain_results: VecDeque::new(),
                calls: Vec::new(),
            }),
            latch: CallLatch::default(),
        }
    }

    /// Change what the wallet reports, as if the user acted in the wallet UI.
    pub fn set(&self, status: WalletStatus, chain_id: Option<u64>) {
        let mut state = lock(&self.state);
        state.status = status;
        state.chain_id = chain_id;
    }

    pub fn fail_connect(&self, error: ProviderError) {
        lock(&self.state).connect_results.push_back(Err(error));
    }

    pub fn fail_switch(&self, error: ProviderError) {
        lock(&self.state).switch_results.push_back(Err(error));
    }

    pub fn fail_add_chain(&self, error: ProviderError) {
        lock(&self.state).add_chain_results.push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        lock(&self.state).calls.clone()
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    async fn status(&self) -> WalletStatus {
        lock(&self.state).status
    }

    async fn chain_id(&self) -> Option<u64> {
        lock(&self.state).chain_id
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        lock(&self.state).calls.push(ProviderCall::Connect);
        self.latch.pass().await;
        let mut state = lock(&self.state);
        let result = state.connect_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            state.status = WalletStatus::Active;
        }
        result
    }

    async fn switch_chain(&self, network: &Network) -> Result<(), ProviderError> {
        lock(&self.state)
            .calls
            .push(ProviderCall::SwitchChain(network.network_id));
        self.latch.pass().await;
        let mut state = lock(&self.state);
        let result = state.switch_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            state.chain_id = Some(network.network_id);
        }
        result
    }

    async fn add_chain(&self, network: &Network) -> Result<(), ProviderError> {
        lock(&self.state)
            .calls
            .push(ProviderCall::AddChain(network.network_id));
        self.latch.pass().await;
        lock(&self.state)
            .add_chain_results
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

// ---------------------------------------------------------------------------
// MockLedger
// ---------------------------------------------------------------------------

/// A call received by [`MockLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    GetBalance(Space),
    GetAllowance,
    GetWithdrawable,
    GetMirrorAddress,
    Approve(ApproveAmount),
    TransferToBridge(Decimal),
    Withdraw(Decimal),
}

impl LedgerCall {
    /// Whether this call submits a transaction.
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            LedgerCall::Approve(_) | LedgerCall::TransferToBridge(_) | LedgerCall::Withdraw(_)
        )
    }
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<(CompactString, Space), Decimal>,
    allowances: HashMap<CompactString, Decimal>,
    withdrawable: HashMap<CompactString, Decimal>,
    mirror_address: CompactString,
    read_error: Option<ProviderError>,
    approve_results: VecDeque<Result<(), ProviderError>>,
    transfer_results: VecDeque<Result<(), ProviderError>>,
    withdraw_results: VecDeque<Result<(), ProviderError>>,
    ignore_approvals: bool,
    calls: Vec<LedgerCall>,
}

/// Scripted ledger.
///
/// Successful approvals set the allowance, transfers move the eSpace balance
/// into the withdrawable pool, withdrawals empty the pool.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    pub latch: CallLatch,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, token: &Token, space: Space, amount: Decimal) {
        lock(&self.state)
            .balances
            .insert((token.native_address.clone(), space), amount);
    }

    pub fn set_allowance(&self, token: &Token, amount: Decimal) {
        lock(&self.state)
            .allowances
            .insert(token.native_address.clone(), amount);
    }

    pub fn set_withdrawable(&self, token: &Token, amount: Decimal) {
        lock(&self.state)
            .withdrawable
            .insert(token.native_address.clone(), amount);
    }

    pub fn set_mirror_address(&self, address: &str) {
        lock(&self.state).mirror_address = address.into();
    }

    /// Make every read fail with `error`.
    pub fn fail_reads(&self, error: ProviderError) {
        lock(&self.state).read_error = Some(error);
    }

    pub fn fail_approve(&self, error: ProviderError) {
        lock(&self.state).approve_results.push_back(Err(error));
    }

    pub fn fail_transfer(&self, error: ProviderError) {
        lock(&self.state).transfer_results.push_back(Err(error));
    }

    pub fn fail_withdraw(&self, error: ProviderError) {
        lock(&self.state).withdraw_results.push_back(Err(error));
    }

    /// Report approvals as successful without raising the allowance.
    pub fn ignore_approvals(&self) {
        lock(&self.state).ignore_approvals = true;
    }

    pub fn allowance_of(&self, token: &Token) -> Decimal {
        lock(&self.state)
            .allowances
            .get(&token.native_address)
            .copied()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<LedgerCall> {
        lock(&self.state).calls.clone()
    }

    /// Calls that submit a transaction, in order.
    pub fn submissions(&self) -> Vec<LedgerCall> {
        self.calls()
            .into_iter()
            .filter(LedgerCall::is_submission)
            .collect()
    }

    fn read(&self, call: LedgerCall) -> Result<(), ProviderError> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        match &state.read_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BridgeLedger for MockLedger {
    async fn get_balance(&self, token: &Token, space: Space) -> Result<Decimal, ProviderError> {
        self.read(LedgerCall::GetBalance(space))?;
        Ok(lock(&self.state)
            .balances
            .get(&(token.native_address.clone(), space))
            .copied()
            .unwrap_or_default())
    }

    async fn get_allowance(&self, token: &Token, _spender: &str) -> Result<Decimal, ProviderError> {
        self.read(LedgerCall::GetAllowance)?;
        Ok(self.allowance_of(token))
    }

    async fn get_withdrawable(&self, token: &Token) -> Result<Decimal, ProviderError> {
        self.read(LedgerCall::GetWithdrawable)?;
        Ok(lock(&self.state)
            .withdrawable
            .get(&token.native_address)
            .copied()
            .unwrap_or_default())
    }

    async fn espace_mirror_address(&self) -> Result<CompactString, ProviderError> {
        self.read(LedgerCall::GetMirrorAddress)?;
        Ok(lock(&self.state).mirror_address.clone())
    }

    async fn approve(
        &self,
        token: &Token,
        _spender: &str,
        amount: ApproveAmount,
    ) -> Result<(), ProviderError> {
        lock(&self.state).calls.push(LedgerCall::Approve(amount));
        self.latch.pass().await;
        let mut state = lock(&self.state);
        let result = state.approve_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() && !state.ignore_approvals {
            let allowance = match amount {
                ApproveAmount::Exact(amount) => amount,
                ApproveAmount::Unlimited => Decimal::MAX,
            };
            state
                .allowances
                .insert(token.native_address.clone(), allowance);
        }
        result
    }

    async fn transfer_to_bridge(
        &self,
        token: &Token,
        amount: Decimal,
    ) -> Result<(), ProviderError> {
        lock(&self.state)
            .calls
            .push(LedgerCall::TransferToBridge(amount));
        self.latch.pass().await;
        let mut state = lock(&self.state);
        let result = state.transfer_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            let key = token.native_address.clone();
            let balance = state
                .balances
                .entry((key.clone(), Space::ESpace))
                .or_default();
            *balance -= amount;
            *state.withdrawable.entry(key).or_default() += amount;
        }
        result
    }

    async fn withdraw(&self, token: &Token, amount: Decimal) -> Result<(), ProviderError> {
        lock(&self.state).calls.push(LedgerCall::Withdraw(amount));
        self.latch.pass().await;
        let mut state = lock(&self.state);
        let result = state.withdraw_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            state.withdrawable.remove(&token.native_address);
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const CORE_CHAIN_ID: u64 = 1;
pub const ESPACE_CHAIN_ID: u64 = 71;

fn network(network_id: u64, name: &str, rpc: &str, explorer: &str) -> Network {
    Network {
        network_id,
        name: name.to_string(),
        rpc_url: Url::parse(rpc).unwrap_or_else(|_| unreachable!("fixture url")),
        explorer_url: Url::parse(explorer).unwrap_or_else(|_| unreachable!("fixture url")),
        native_currency: NativeCurrency::default(),
    }
}

pub fn networks() -> NetworksConfig {
    NetworksConfig::new(
        network(
            CORE_CHAIN_ID,
            "Conflux Core (Testnet)",
            "https://test.confluxrpc.com",
            "https://testnet.confluxscan.io",
        ),
        network(
            ESPACE_CHAIN_ID,
            "Conflux eSpace (Testnet)",
            "https://evmtestnet.confluxrpc.com",
            "https://evmtestnet.confluxscan.io",
        ),
    )
}

pub fn native_token() -> Token {
    Token {
        native_address: "CFX".into(),
        mapped_address: CompactString::default(),
        symbol: "CFX".into(),
        decimals: 18,
        is_native: true,
        is_bridge_managed: true,
        name: Some("Conflux Network".to_string()),
        icon: None,
        native_space: None,
    }
}

pub fn inner_token() -> Token {
    Token {
        native_address: "cfx:achc8nxj7r451c223m18w2dwjnmhkd6rxawrvkvsy2".into(),
        mapped_address: "0xba2289fee4673ef00ee8d8dae260965ab543b68f".into(),
        symbol: "FC".into(),
        decimals: 18,
        is_native: false,
        is_bridge_managed: true,
        name: Some("FansCoin".to_string()),
        icon: None,
        native_space: Some(Space::Core),
    }
}

/// A distinct ERC-20 token numbered `n`.
pub fn erc20_token(n: u32) -> Token {
    Token {
        native_address: format!("0x{n:040x}").into(),
        mapped_address: format!("cfx:mapped{n}").into(),
        symbol: format!("TK{n}").into(),
        decimals: 18,
        is_native: false,
        is_bridge_managed: false,
        name: None,
        icon: None,
        native_space: Some(Space::ESpace),
    }
}

pub fn tokens_config() -> TokensConfig {
    TokensConfig {
        native: native_token(),
        inner: inner_token(),
        bridge_spender: "0x0888000000000000000000000000000000000006".into(),
        native_gas_reserve: Decimal::ZERO,
    }
}

pub fn config() -> CrossSpaceConfig {
    CrossSpaceConfig {
        networks: networks(),
        tokens: tokens_config(),
        approval: ApprovalPolicy::Exact,
        withdrawable_poll_interval: Duration::from_millis(10),
        gate_poll_interval: Duration::from_millis(10),
    }
}
