use crate::objects::wallet::Space;
use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Largest number of fractional digits a [`Decimal`] amount can carry.
pub const MAX_TOKEN_DECIMALS: u8 = 28;

/// A fungible asset that can cross between the two spaces.
///
/// Tokens are identified by `native_address`; two records with the same native
/// address are the same token even if their other fields differ. Records are
/// never mutated in place, a changed token is a new value with the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub native_address: CompactString,
    #[serde(default)]
    pub mapped_address: CompactString,
    pub symbol: CompactString,
    pub decimals: u8,
    #[serde(default)]
    pub is_native: bool,
    #[serde(default)]
    pub is_bridge_managed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_space: Option<Space>,
}

impl Token {
    /// Whether `other` is the same token (same native address).
    pub fn same_as(&self, other: &Token) -> bool {
        self.native_address == other.native_address
    }

    /// The smallest representable amount, `10^-decimals`.
    pub fn min_unit(&self) -> Decimal {
        Decimal::new(1, u32::from(self.decimals.min(MAX_TOKEN_DECIMALS)))
    }

    /// Whether `amount` has no more fractional digits than the token allows.
    pub fn fits_precision(&self, amount: Decimal) -> bool {
        amount.normalize().scale() <= u32::from(self.decimals)
    }
}
