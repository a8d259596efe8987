//! Pure gate derivation.
//!
//! Given what the wallets currently report, decide which wallet an action has
//! to act on and which state that wallet is in. Nothing here remembers
//! anything between calls.

use crate::provider::{Observations, WalletObservation};
use xspace_sdk::config::NetworksConfig;
use xspace_sdk::objects::{Network, RequiredWallet, Wallet, WalletStatus};

/// State of the wallet an action is gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    /// Not connected (or not installed).
    Disconnected,
    /// A connection request is outstanding.
    Connecting,
    /// Connected, but pointed at another network.
    ConnectedWrongChain,
    /// A switch (or add) network request is outstanding.
    Switching,
    /// Connected and on the expected network. The action may run.
    Ready,
}

/// Pick the concrete wallet `required` resolves to.
///
/// For the `Either*` tags the preferred wallet is picked only while it is
/// active and on its network; otherwise the other wallet is picked, whether or
/// not it is ready.
pub fn resolve_wallet(
    required: RequiredWallet,
    observations: &Observations,
    networks: &NetworksConfig,
) -> Wallet {
    let preferred = match required {
        RequiredWallet::Core => return Wallet::Core,
        RequiredWallet::Bridge => return Wallet::Bridge,
        RequiredWallet::EitherCorePreferred => Wallet::Core,
        RequiredWallet::EitherBridgePreferred => Wallet::Bridge,
    };
    let ready = observations
        .get(preferred)
        .is_ready_for(networks.for_wallet(preferred));
    if ready { preferred } else { preferred.other() }
}

/// Derive the steady state of one wallet from its observation.
pub fn derive_state(observation: &WalletObservation, expected: &Network) -> GateState {
    match observation.status {
        WalletStatus::Active if observation.chain_id == Some(expected.network_id) => {
            GateState::Ready
        }
        WalletStatus::Active => GateState::ConnectedWrongChain,
        WalletStatus::InActivating => GateState::Connecting,
        WalletStatus::NotActive | WalletStatus::NotInstalled => GateState::Disconnected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, CORE_CHAIN_ID, ESPACE_CHAIN_ID};

    const STATUSES: [WalletStatus; 4] = [
        WalletStatus::NotInstalled,
        WalletStatus::NotActive,
        WalletStatus::InActivating,
        WalletStatus::Active,
    ];

    fn all_observations(expected: u64) -> Vec<WalletObservation> {
        let chains = [None, Some(expected), Some(expected + 1000)];
        STATUSES
            .iter()
            .flat_map(|status| {
                chains
                    .iter()
                    .map(move |chain| WalletObservation::new(*status, *chain))
            })
            .collect()
    }

    #[test]
    fn test_resolution_is_total_and_deterministic() {
        let networks = testing::networks();
        for core in all_observations(CORE_CHAIN_ID) {
            for bridge in all_observations(ESPACE_CHAIN_ID) {
                let observations = Observations { core, bridge };
                for required in RequiredWallet::ALL {
                    let wallet = resolve_wallet(required, &observations, &networks);
                    let state =
                        derive_state(&observations.get(wallet), networks.for_wallet(wallet));
                    assert_eq!(wallet, resolve_wallet(required, &observations, &networks));
                    assert_eq!(
                        state,
                        derive_state(&observations.get(wallet), networks.for_wallet(wallet))
                    );
                    assert!(!matches!(state, GateState::Switching));

                    match required {
                        RequiredWallet::Core => assert_eq!(wallet, Wallet::Core),
                        RequiredWallet::Bridge => assert_eq!(wallet, Wallet::Bridge),
                        RequiredWallet::EitherCorePreferred => {
                            let core_ready = core.is_ready_for(&networks.core);
                            assert_eq!(wallet == Wallet::Core, core_ready);
                        }
                        RequiredWallet::EitherBridgePreferred => {
                            let bridge_ready = bridge.is_ready_for(&networks.espace);
                            assert_eq!(wallet == Wallet::Bridge, bridge_ready);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_derive_state() {
        let expected = &testing::networks().core;
        let cases = [
            (WalletStatus::Active, Some(CORE_CHAIN_ID), GateState::Ready),
            (WalletStatus::Active, Some(ESPACE_CHAIN_ID), GateState::ConnectedWrongChain),
            (WalletStatus::Active, None, GateState::ConnectedWrongChain),
            (WalletStatus::InActivating, None, GateState::Connecting),
            (WalletStatus::NotActive, Some(CORE_CHAIN_ID), GateState::Disconnected),
            (WalletStatus::NotInstalled, None, GateState::Disconnected),
        ];
        for (status, chain_id, state) in cases {
            let observation = WalletObservation::new(status, chain_id);
            assert_eq!(derive_state(&observation, expected), state, "{status:?} {chain_id:?}");
        }
    }

    #[test]
    fn test_either_falls_back_to_other_wallet_even_if_not_ready() {
        let networks = testing::networks();
        let observations = Observations {
            core: WalletObservation::new(WalletStatus::NotActive, None),
            bridge: WalletObservation::new(WalletStatus::NotInstalled, None),
        };
        assert_eq!(
            resolve_wallet(RequiredWallet::EitherCorePreferred, &observations, &networks),
            Wallet::Bridge
        );
    }
}
