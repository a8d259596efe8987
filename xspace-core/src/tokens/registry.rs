//! TokenRegistry.
//!
//! The TokenRegistry is responsible for:
//! - Owning the current-token pointer
//! - Keeping the pinned native and inner tokens plus a bounded set of recently
//!   used tokens
//! - Persisting both across restarts under the `cross-space` namespace
//!
//! In-memory state is authoritative. A failed write is logged and the call
//! still succeeds; a bad persisted value loads as the default. Mutations run
//! one at a time, each holding the writer lock until its records are stored,
//! so the store always ends up with the last in-memory state.

use super::recent::RecentTokenSet;
use super::store::{CROSS_SPACE_NAMESPACE, KeyValueStore};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use xspace_sdk::config::TokensConfig;
use xspace_sdk::objects::{Token, WalletStatus};

/// Store key of the current token record.
pub const CURRENT_TOKEN_KEY: &str = "current-token";
/// Store key of the recent token list.
pub const COMMON_TOKENS_KEY: &str = "common-tokens";

struct RegistryState {
    current: Token,
    recent: RecentTokenSet,
}

pub struct TokenRegistry {
    pinned: TokensConfig,
    store: Arc<dyn KeyValueStore>,
    state: RwLock<RegistryState>,
    writer: Mutex<()>,
}

impl TokenRegistry {
    /// Load the registry from `store`.
    ///
    /// Never fails. A missing or unreadable current token falls back to the
    /// inner token; an unreadable recent list loads empty. Recent entries that
    /// collide with a pinned token are dropped and the list is cut to capacity.
    ///
    /// # Arguments
    ///
    /// * `pinned` - The native and inner tokens
    /// * `store` - Where the selection and recent list are persisted
    pub async fn load(pinned: TokensConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let recent: Vec<Token> = read_or_default(store.as_ref(), COMMON_TOKENS_KEY).await;
        let recent = RecentTokenSet::from_recent_first(
            recent.into_iter().filter(|t| !pinned.is_pinned(t)),
        );

        let current = match read_or_default::<Option<Token>>(store.as_ref(), CURRENT_TOKEN_KEY)
            .await
        {
            Some(token) => pinned_record(&pinned, token),
            None => pinned.inner.clone(),
        };

        info!(
            current = %current.symbol,
            recent = recent.len(),
            "Token registry loaded"
        );

        Self {
            pinned,
            store,
            state: RwLock::new(RegistryState { current, recent }),
            writer: Mutex::new(()),
        }
    }

    /// The currently selected token.
    pub async fn current(&self) -> Token {
        self.state.read().await.current.clone()
    }

    /// Pinned tokens followed by recent tokens, most recent first.
    pub async fn list(&self) -> Vec<Token> {
        let state = self.state.read().await;
        let mut tokens = Vec::with_capacity(2 + state.recent.len());
        tokens.push(self.pinned.native.clone());
        tokens.push(self.pinned.inner.clone());
        tokens.extend(state.recent.iter().cloned());
        tokens
    }

    /// Look up a listed token by native address.
    pub async fn get(&self, native_address: &str) -> Option<Token> {
        if self.pinned.native.native_address == native_address {
            return Some(self.pinned.native.clone());
        }
        if self.pinned.inner.native_address == native_address {
            return Some(self.pinned.inner.clone());
        }
        self.state.read().await.recent.get(native_address).cloned()
    }

    /// Make `token` current.
    ///
    /// A pinned token leaves the recent set alone; any other token is inserted
    /// or promoted to most recent, evicting the least recently used entry on
    /// overflow.
    pub async fn set_current(&self, token: Token) {
        let _writer = self.writer.lock().await;
        let pinned = self.pinned.is_pinned(&token);
        let token = pinned_record(&self.pinned, token);
        let (current, recent) = {
            let mut state = self.state.write().await;
            let recent = if pinned {
                None
            } else {
                if let Some(evicted) = state.recent.touch(token.clone()) {
                    debug!(token = %evicted.symbol, "Evicted least recently used token");
                }
                Some(snapshot(&state.recent))
            };
            state.current = token;
            (state.current.clone(), recent)
        };

        info!(token = %current.symbol, address = %current.native_address, "Current token changed");
        self.persist(CURRENT_TOKEN_KEY, &current).await;
        if let Some(recent) = recent {
            self.persist(COMMON_TOKENS_KEY, &recent).await;
        }
    }

    /// Forget a recent token. Pinned tokens cannot be removed.
    ///
    /// Returns whether anything was removed.
    pub async fn remove(&self, native_address: &str) -> bool {
        let _writer = self.writer.lock().await;
        let recent = {
            let mut state = self.state.write().await;
            if !state.recent.remove(native_address) {
                return false;
            }
            snapshot(&state.recent)
        };
        debug!(address = native_address, "Removed recent token");
        self.persist(COMMON_TOKENS_KEY, &recent).await;
        true
    }

    /// React to a bridge wallet status change.
    ///
    /// With no bridge wallet installed only the inner token can be bridged, so
    /// the selection goes back to it.
    pub async fn on_bridge_wallet_status(&self, status: WalletStatus) {
        if status != WalletStatus::NotInstalled {
            return;
        }
        let _writer = self.writer.lock().await;
        {
            let mut state = self.state.write().await;
            if state.current.same_as(&self.pinned.inner) {
                return;
            }
            state.current = self.pinned.inner.clone();
        }
        info!(token = %self.pinned.inner.symbol, "Bridge wallet not installed, current token reset");
        self.persist(CURRENT_TOKEN_KEY, &self.pinned.inner).await;
    }

    async fn persist<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize token record");
                return;
            }
        };
        if let Err(e) = self.store.set(CROSS_SPACE_NAMESPACE, key, value).await {
            warn!(key, error = %e, "Failed to persist token record");
        }
    }
}

/// The configured record for a pinned token, or `token` itself.
fn pinned_record(pinned: &TokensConfig, token: Token) -> Token {
    if pinned.native.same_as(&token) {
        pinned.native.clone()
    } else if pinned.inner.same_as(&token) {
        pinned.inner.clone()
    } else {
        token
    }
}

fn snapshot(recent: &RecentTokenSet) -> Vec<Token> {
    recent.iter().cloned().collect()
}

async fn read_or_default<T: DeserializeOwned + Default>(
    store: &dyn KeyValueStore,
    key: &str,
) -> T {
    let value = match store.get(CROSS_SPACE_NAMESPACE, key).await {
        Ok(Some(value)) => value,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!(key, error = %e, "Failed to read token record, using default");
            return T::default();
        }
    };
    if value == Value::Null {
        return T::default();
    }
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(key, error = %e, "Unrecognized token record, using default");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::RECENT_TOKEN_CAPACITY;
    use crate::testing::{self, erc20_token, inner_token, native_token};
    use crate::tokens::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use serde_json::json;

    fn symbols(tokens: &[Token]) -> Vec<String> {
        tokens.iter().map(|t| t.symbol.to_string()).collect()
    }

    async fn registry(store: Arc<dyn KeyValueStore>) -> TokenRegistry {
        TokenRegistry::load(testing::tokens_config(), store).await
    }

    #[tokio::test]
    async fn test_defaults_to_inner_token() {
        let registry = registry(Arc::new(MemoryStore::new())).await;
        assert_eq!(registry.current().await, inner_token());
        assert_eq!(symbols(&registry.list().await), vec!["CFX", "FC"]);
    }

    #[tokio::test]
    async fn test_list_order_and_eviction() {
        let registry = registry(Arc::new(MemoryStore::new())).await;
        for n in 0..=RECENT_TOKEN_CAPACITY as u32 {
            registry.set_current(erc20_token(n)).await;
        }

        let list = registry.list().await;
        assert_eq!(list.len(), 2 + RECENT_TOKEN_CAPACITY);
        assert_eq!(list[0], native_token());
        assert_eq!(list[1], inner_token());
        assert_eq!(list[2], erc20_token(RECENT_TOKEN_CAPACITY as u32));
        assert!(!list.contains(&erc20_token(0)));
        assert_eq!(registry.get(&erc20_token(0).native_address).await, None);

        registry.set_current(erc20_token(3)).await;
        let list = registry.list().await;
        assert_eq!(list[2], erc20_token(3));
        assert_eq!(list.len(), 2 + RECENT_TOKEN_CAPACITY);
    }

    #[tokio::test]
    async fn test_pinned_tokens_never_enter_recent() {
        let registry = registry(Arc::new(MemoryStore::new())).await;
        registry.set_current(erc20_token(1)).await;
        registry.set_current(native_token()).await;
        assert_eq!(registry.current().await, native_token());
        assert_eq!(symbols(&registry.list().await), vec!["CFX", "FC", "TK1"]);

        assert!(!registry.remove(&native_token().native_address).await);
        assert!(!registry.remove(&inner_token().native_address).await);
        assert!(registry.remove(&erc20_token(1).native_address).await);
        assert!(!registry.remove(&erc20_token(1).native_address).await);
        assert_eq!(symbols(&registry.list().await), vec!["CFX", "FC"]);
    }

    #[tokio::test]
    async fn test_survives_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = registry(store.clone()).await;
        first.set_current(erc20_token(1)).await;
        first.set_current(erc20_token(2)).await;
        drop(first);

        let second = registry(store).await;
        assert_eq!(second.current().await, erc20_token(2));
        assert_eq!(
            symbols(&second.list().await),
            vec!["CFX", "FC", "TK2", "TK1"]
        );
    }

    #[tokio::test]
    async fn test_corrupt_records_fall_back() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(CROSS_SPACE_NAMESPACE, CURRENT_TOKEN_KEY, json!("garbage"))
            .await
            .unwrap();
        store
            .set(CROSS_SPACE_NAMESPACE, COMMON_TOKENS_KEY, json!({"not": "a list"}))
            .await
            .unwrap();

        let registry = registry(store).await;
        assert_eq!(registry.current().await, inner_token());
        assert_eq!(symbols(&registry.list().await), vec!["CFX", "FC"]);
    }

    #[tokio::test]
    async fn test_load_drops_pinned_and_truncates() {
        let store = Arc::new(MemoryStore::new());
        let mut recent: Vec<Token> = vec![inner_token(), native_token()];
        recent.extend((0..12).map(erc20_token));
        store
            .set(
                CROSS_SPACE_NAMESPACE,
                COMMON_TOKENS_KEY,
                serde_json::to_value(&recent).unwrap(),
            )
            .await
            .unwrap();

        let mut stale_native = native_token();
        stale_native.name = None;
        store
            .set(
                CROSS_SPACE_NAMESPACE,
                CURRENT_TOKEN_KEY,
                serde_json::to_value(&stale_native).unwrap(),
            )
            .await
            .unwrap();

        let registry = registry(store).await;
        // Pinned record comes from config, not from the store.
        assert_eq!(registry.current().await, native_token());
        let list = registry.list().await;
        assert_eq!(list.len(), 2 + RECENT_TOKEN_CAPACITY);
        assert_eq!(list[2], erc20_token(0));
    }

    #[tokio::test]
    async fn test_unknown_fields_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let mut record = serde_json::to_value(erc20_token(7)).unwrap();
        record["balance"] = json!("12.5");
        store
            .set(CROSS_SPACE_NAMESPACE, CURRENT_TOKEN_KEY, record)
            .await
            .unwrap();

        let registry = registry(store).await;
        assert_eq!(registry.current().await, erc20_token(7));
    }

    #[tokio::test]
    async fn test_bridge_wallet_uninstalled_resets_current() {
        let store = Arc::new(MemoryStore::new());
        let registry = registry(store.clone()).await;
        registry.set_current(erc20_token(1)).await;

        registry.on_bridge_wallet_status(WalletStatus::Active).await;
        assert_eq!(registry.current().await, erc20_token(1));

        registry
            .on_bridge_wallet_status(WalletStatus::NotInstalled)
            .await;
        assert_eq!(registry.current().await, inner_token());
        assert_eq!(
            store
                .get(CROSS_SPACE_NAMESPACE, CURRENT_TOKEN_KEY)
                .await
                .unwrap(),
            Some(serde_json::to_value(inner_token()).unwrap())
        );
        // The recent set is untouched.
        assert_eq!(symbols(&registry.list().await), vec!["CFX", "FC", "TK1"]);
    }

    /// Yields before every write so concurrent callers interleave.
    struct SlowStore(MemoryStore);

    #[async_trait]
    impl KeyValueStore for SlowStore {
        async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
            self.0.get(namespace, key).await
        }

        async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.0.set(namespace, key, value).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_selections_persist_last_state() {
        let store = Arc::new(SlowStore(MemoryStore::new()));
        let registry = registry(store.clone()).await;

        let removed_address = erc20_token(1).native_address;
        tokio::join!(
            registry.set_current(erc20_token(1)),
            registry.set_current(erc20_token(2)),
            registry.set_current(erc20_token(3)),
            registry.remove(&removed_address),
        );

        let stored_current = store
            .get(CROSS_SPACE_NAMESPACE, CURRENT_TOKEN_KEY)
            .await
            .unwrap();
        assert_eq!(
            stored_current,
            Some(serde_json::to_value(registry.current().await).unwrap())
        );
        let stored_recent = store
            .get(CROSS_SPACE_NAMESPACE, COMMON_TOKENS_KEY)
            .await
            .unwrap();
        let recent: Vec<Token> = registry.list().await.into_iter().skip(2).collect();
        assert_eq!(stored_recent, Some(serde_json::to_value(&recent).unwrap()));

        let reloaded = TokenRegistry::load(testing::tokens_config(), store).await;
        assert_eq!(reloaded.current().await, registry.current().await);
        assert_eq!(reloaded.list().await, registry.list().await);
    }

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _namespace: &str, _key: &str) -> Result<Option<Value>, StoreError> {
            Err(StoreError::NotAnObject("cross-space".to_string()))
        }

        async fn set(&self, _namespace: &str, _key: &str, _value: Value) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
    }

    #[tokio::test]
    async fn test_store_failures_do_not_fail_calls() {
        let registry = registry(Arc::new(FailingStore)).await;
        assert_eq!(registry.current().await, inner_token());

        registry.set_current(erc20_token(1)).await;
        assert_eq!(registry.current().await, erc20_token(1));
        assert!(registry.remove(&erc20_token(1).native_address).await);
    }
}
