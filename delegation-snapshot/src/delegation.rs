use crate::address::{address_from_hex, address_to_hex};
use crate::ValidatorId;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type NetworkId = u64;

/// One bond of an account to a validator.
///
/// An account bonded to several validators shows up once per validator.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Delegator {
    #[serde(
        deserialize_with = "address_from_hex",
        serialize_with = "address_to_hex"
    )]
    pub address: Address,
    #[serde(rename = "bondedValidator", alias = "bonded_validator")]
    pub bonded_validator: ValidatorId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported network {0}")]
    UnsupportedNetwork(NetworkId),
}

/// Supplies the current set of delegation bonds for a network.
pub trait DelegationSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Checked before any network traffic happens.
    fn ensure_supported(&self, network: NetworkId) -> Result<(), ConfigError>;

    /// All known bonds, possibly with repeated addresses. An empty registry is
    /// not an error.
    fn fetch_all(&self, network: NetworkId) -> Result<Vec<Delegator>, Self::Error>;
}

impl<T: DelegationSource + ?Sized> DelegationSource for &T {
    type Error = T::Error;

    fn ensure_supported(&self, network: NetworkId) -> Result<(), ConfigError> {
        (**self).ensure_supported(network)
    }

    fn fetch_all(&self, network: NetworkId) -> Result<Vec<Delegator>, Self::Error> {
        (**self).fetch_all(network)
    }
}

#[cfg(any(test, feature = "proptest"))]
mod arbitrary {
    use super::*;
    use proptest::prelude::*;

    /// Validator ids stay small so that generated bonds overlap.
    pub const MAX_ARBITRARY_VALIDATOR: ValidatorId = 8;

    /// Number of distinct accounts generated delegators are drawn from.
    pub const ARBITRARY_ACCOUNTS: u8 = 16;

    pub fn arbitrary_account(index: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = 0xde;
        bytes[19] = index % ARBITRARY_ACCOUNTS;
        Address::from(bytes)
    }

    impl Arbitrary for Delegator {
        type Parameters = ();
        type Strategy = BoxedStrategy<Delegator>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            // few accounts and validators, so that multi-bonding and duplicates are frequent
            (0..ARBITRARY_ACCOUNTS, 1..=MAX_ARBITRARY_VALIDATOR)
                .prop_map(|(account, bonded_validator)| Delegator {
                    address: arbitrary_account(account),
                    bonded_validator,
                })
                .boxed()
        }
    }
}

#[cfg(any(test, feature = "proptest"))]
pub use arbitrary::{arbitrary_account, ARBITRARY_ACCOUNTS, MAX_ARBITRARY_VALIDATOR};
