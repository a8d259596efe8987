//! Bounded most-recently-used token set.

use compact_str::CompactString;
use std::collections::{HashSet, VecDeque};
use xspace_sdk::objects::Token;

/// Number of non-pinned tokens remembered.
pub const RECENT_TOKEN_CAPACITY: usize = 9;

/// Tokens the user picked recently, most recent first.
///
/// Keyed by `native_address`. Touching a token that is already present moves
/// it to the front and replaces the stored record; touching a new token when
/// the set is full evicts the least recently used one.
#[derive(Debug, Clone)]
pub struct RecentTokenSet {
    order: VecDeque<Token>,
    keys: HashSet<CompactString>,
    capacity: usize,
}

impl Default for RecentTokenSet {
    fn default() -> Self {
        Self::with_capacity(RECENT_TOKEN_CAPACITY)
    }
}

impl RecentTokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            keys: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Build a set from tokens ordered most recent first.
    ///
    /// Duplicate addresses keep their first (most recent) occurrence and
    /// anything past capacity is dropped.
    pub fn from_recent_first(tokens: impl IntoIterator<Item = Token>) -> Self {
        let mut set = Self::default();
        for token in tokens {
            if set.order.len() == set.capacity {
                break;
            }
            if set.keys.insert(token.native_address.clone()) {
                set.order.push_back(token);
            }
        }
        set
    }

    /// Insert or promote `token` to most recent.
    ///
    /// Returns the evicted token, if the set overflowed.
    pub fn touch(&mut self, token: Token) -> Option<Token> {
        if self.keys.contains(&token.native_address) {
            self.order.retain(|t| !t.same_as(&token));
            self.order.push_front(token);
            return None;
        }

        self.keys.insert(token.native_address.clone());
        self.order.push_front(token);
        if self.order.len() > self.capacity {
            let evicted = self.order.pop_back()?;
            self.keys.remove(&evicted.native_address);
            return Some(evicted);
        }
        None
    }

    /// Remove the token with `native_address`. Returns whether it was present.
    pub fn remove(&mut self, native_address: &str) -> bool {
        if !self.keys.remove(native_address) {
            return false;
        }
        self.order.retain(|t| t.native_address != native_address);
        true
    }

    pub fn contains(&self, native_address: &str) -> bool {
        self.keys.contains(native_address)
    }

    pub fn get(&self, native_address: &str) -> Option<&Token> {
        if !self.contains(native_address) {
            return None;
        }
        self.order.iter().find(|t| t.native_address == native_address)
    }

    /// Tokens, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::erc20_token;

    fn symbols(set: &RecentTokenSet) -> Vec<String> {
        set.iter().map(|t| t.symbol.to_string()).collect()
    }

    #[test]
    fn test_overflow_evicts_least_recently_used() {
        let mut set = RecentTokenSet::new();
        for n in 0..RECENT_TOKEN_CAPACITY as u32 {
            assert!(set.touch(erc20_token(n)).is_none());
        }
        assert_eq!(set.len(), RECENT_TOKEN_CAPACITY);

        let evicted = set.touch(erc20_token(100)).unwrap();
        assert_eq!(evicted, erc20_token(0));
        assert_eq!(set.len(), RECENT_TOKEN_CAPACITY);
        assert!(!set.contains(&erc20_token(0).native_address));
        assert_eq!(set.iter().next().unwrap(), &erc20_token(100));
    }

    #[test]
    fn test_touch_promotes_and_replaces_record() {
        let mut set = RecentTokenSet::new();
        set.touch(erc20_token(1));
        set.touch(erc20_token(2));
        set.touch(erc20_token(3));

        let mut renamed = erc20_token(1);
        renamed.name = Some("Renamed".to_string());
        assert!(set.touch(renamed.clone()).is_none());

        assert_eq!(symbols(&set), vec!["TK1", "TK3", "TK2"]);
        assert_eq!(set.get(&renamed.native_address), Some(&renamed));

        // Promotion saved TK1, so the next overflow loses TK2 first.
        let mut small = RecentTokenSet::with_capacity(3);
        for n in [1, 2, 3] {
            small.touch(erc20_token(n));
        }
        small.touch(erc20_token(1));
        assert_eq!(small.touch(erc20_token(4)), Some(erc20_token(2)));
    }

    #[test]
    fn test_remove() {
        let mut set = RecentTokenSet::new();
        set.touch(erc20_token(1));
        set.touch(erc20_token(2));
        assert!(set.remove(&erc20_token(1).native_address));
        assert!(!set.remove(&erc20_token(1).native_address));
        assert_eq!(symbols(&set), vec!["TK2"]);
    }

    #[test]
    fn test_from_recent_first_dedupes_and_truncates() {
        let tokens = (0..12).map(erc20_token).chain([erc20_token(0)]);
        let set = RecentTokenSet::from_recent_first(tokens);
        assert_eq!(set.len(), RECENT_TOKEN_CAPACITY);
        assert_eq!(set.iter().next().unwrap(), &erc20_token(0));
        assert!(!set.contains(&erc20_token(9).native_address));

        let set = RecentTokenSet::from_recent_first([erc20_token(5), erc20_token(5)]);
        assert_eq!(set.len(), 1);
    }
}
