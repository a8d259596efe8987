//! Plain data objects shared between the core and its front-ends.

pub mod network;
pub mod token;
pub mod wallet;

pub use network::{AddChainParams, NativeCurrency, Network, parse_chain_id};
pub use token::{MAX_TOKEN_DECIMALS, Token};
pub use wallet::{RequiredWallet, Space, Wallet, WalletStatus};
