//! Transfer mode of the eSpace to Core direction.
//!
//! In `Normal` mode the connected eSpace wallet sends the funds to the bridge.
//! In `Advanced` mode the user instead sends native CFX to the eSpace mirror
//! address of their Core account, from any eSpace wallet or exchange. Only the
//! native token can take the advanced route, so any other current token pins
//! the mode back to `Normal`.

use super::store::{CROSS_SPACE_NAMESPACE, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use xspace_sdk::objects::Token;

/// Store key of the transfer mode.
pub const TRANSFER_MODE_KEY: &str = "eSpace-transfer2bridge-mode";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Normal,
    Advanced,
}

/// The persisted transfer mode.
pub struct TransferModeSetting {
    store: Arc<dyn KeyValueStore>,
    mode: Mutex<TransferMode>,
}

impl TransferModeSetting {
    /// Load the mode from `store`.
    ///
    /// A missing or unrecognized value loads as `Normal`, which is written
    /// back.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let stored = match store.get(CROSS_SPACE_NAMESPACE, TRANSFER_MODE_KEY).await {
            Ok(value) => value.and_then(|v| serde_json::from_value::<TransferMode>(v).ok()),
            Err(e) => {
                warn!(key = TRANSFER_MODE_KEY, error = %e, "Failed to read transfer mode");
                None
            }
        };

        let setting = Self {
            store,
            mode: Mutex::new(stored.unwrap_or_default()),
        };
        if stored.is_none() {
            debug!("No valid transfer mode stored, resetting to normal");
            setting.persist(TransferMode::Normal).await;
        }
        setting
    }

    pub async fn current(&self) -> TransferMode {
        *self.mode.lock().await
    }

    /// Flip between `Normal` and `Advanced` while `token` is current.
    ///
    /// Only the native token has an advanced route. For anything else the mode
    /// stays `Normal`.
    pub async fn toggle(&self, token: &Token) -> TransferMode {
        let mut mode = self.mode.lock().await;
        let next = if !token.is_native {
            TransferMode::Normal
        } else {
            match *mode {
                TransferMode::Normal => TransferMode::Advanced,
                TransferMode::Advanced => TransferMode::Normal,
            }
        };
        if next != *mode {
            *mode = next;
            info!(mode = ?next, "Transfer mode changed");
            self.persist(next).await;
        }
        next
    }

    /// Pin the mode back to `Normal` when the current token has no advanced
    /// route.
    pub async fn on_token_changed(&self, token: &Token) {
        if token.is_native {
            return;
        }
        let mut mode = self.mode.lock().await;
        if *mode == TransferMode::Normal {
            return;
        }
        *mode = TransferMode::Normal;
        info!(token = %token.symbol, "Current token is not native, transfer mode reset");
        self.persist(TransferMode::Normal).await;
    }

    async fn persist(&self, mode: TransferMode) {
        let value = match serde_json::to_value(mode) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to serialize transfer mode");
                return;
            }
        };
        if let Err(e) = self
            .store
            .set(CROSS_SPACE_NAMESPACE, TRANSFER_MODE_KEY, value)
            .await
        {
            warn!(key = TRANSFER_MODE_KEY, error = %e, "Failed to persist transfer mode");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{erc20_token, inner_token, native_token};
    use crate::tokens::MemoryStore;
    use serde_json::json;

    async fn stored(store: &MemoryStore) -> Option<serde_json::Value> {
        store
            .get(CROSS_SPACE_NAMESPACE, TRANSFER_MODE_KEY)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_or_invalid_loads_normal_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let setting = TransferModeSetting::load(store.clone()).await;
        assert_eq!(setting.current().await, TransferMode::Normal);
        assert_eq!(stored(&store).await, Some(json!("normal")));

        store
            .set(CROSS_SPACE_NAMESPACE, TRANSFER_MODE_KEY, json!("turbo"))
            .await
            .unwrap();
        let setting = TransferModeSetting::load(store.clone()).await;
        assert_eq!(setting.current().await, TransferMode::Normal);
        assert_eq!(stored(&store).await, Some(json!("normal")));
    }

    #[tokio::test]
    async fn test_toggle_persists_and_survives_reload() {
        let store = Arc::new(MemoryStore::new());
        let setting = TransferModeSetting::load(store.clone()).await;

        assert_eq!(setting.toggle(&native_token()).await, TransferMode::Advanced);
        assert_eq!(stored(&store).await, Some(json!("advanced")));

        let reloaded = TransferModeSetting::load(store.clone()).await;
        assert_eq!(reloaded.current().await, TransferMode::Advanced);
        assert_eq!(reloaded.toggle(&native_token()).await, TransferMode::Normal);
        assert_eq!(stored(&store).await, Some(json!("normal")));
    }

    #[tokio::test]
    async fn test_non_native_token_pins_normal() {
        let store = Arc::new(MemoryStore::new());
        let setting = TransferModeSetting::load(store.clone()).await;

        assert_eq!(setting.toggle(&erc20_token(1)).await, TransferMode::Normal);

        setting.toggle(&native_token()).await;
        setting.on_token_changed(&native_token()).await;
        assert_eq!(setting.current().await, TransferMode::Advanced);

        setting.on_token_changed(&inner_token()).await;
        assert_eq!(setting.current().await, TransferMode::Normal);
        assert_eq!(stored(&store).await, Some(json!("normal")));
    }
}
