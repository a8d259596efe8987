//! Token configuration.

use crate::objects::Token;
use compact_str::CompactString;
use rust_decimal::Decimal;

/// Pinned tokens and bridge parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokensConfig {
    /// The native asset. Always listed first.
    pub native: Token,
    /// The designated inner token. Always listed second and used as the
    /// fallback current token.
    pub inner: Token,
    /// Spender address the bridge pulls approved tokens through.
    pub bridge_spender: CompactString,
    /// Amount of the native asset held back from the max transferable balance
    /// to pay for gas.
    pub native_gas_reserve: Decimal,
}

impl TokensConfig {
    /// Whether `token` is one of the two pinned tokens.
    pub fn is_pinned(&self, token: &Token) -> bool {
        self.native.same_as(token) || self.inner.same_as(token)
    }
}
