//! Token selection and persistence.

pub mod mode;
pub mod recent;
pub mod registry;
pub mod store;

pub use mode::{TRANSFER_MODE_KEY, TransferMode, TransferModeSetting};
pub use recent::{RECENT_TOKEN_CAPACITY, RecentTokenSet};
pub use registry::{COMMON_TOKENS_KEY, CURRENT_TOKEN_KEY, TokenRegistry};
pub use store::{CROSS_SPACE_NAMESPACE, FileStore, KeyValueStore, MemoryStore, StoreError};
