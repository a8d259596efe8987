#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod events;
pub mod gate;
pub mod ledger;
pub mod orchestrators;
pub mod provider;
pub mod session;
pub mod tokens;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
