pub mod address;
pub mod aggregate;
pub mod batch;
pub mod catalog;
pub mod contract;
pub mod delegation;
pub mod score;
#[cfg(any(test, feature = "test-api"))]
pub mod testing;

pub use aggregate::{StakeAggregator, StakeKey, StakeTotals};
pub use batch::{BatchCaller, BatchError, BlockRef, CallRequest};
pub use catalog::{
    read_counters, read_validators, RegistryCounters, ValidatorCatalog, ValidatorRecord,
};
pub use contract::{CallOutput, ContractCall, StakeBalance, ValidatorInfo};
pub use delegation::{ConfigError, DelegationSource, Delegator, NetworkId};
pub use score::{format_units, to_scores, VotingPower};

use alloy_primitives::Address;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

pub type ValidatorId = u64;
pub type Epoch = u64;

/// Stage of the snapshot computation that issued a batched read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Round {
    Counters,
    Validators,
    Stakes,
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Counters => "registry counters",
            Self::Validators => "validator records",
            Self::Stakes => "stake lookups",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("batched read failed during the {round} round")]
    Computation {
        round: Round,
        #[source]
        source: BatchError,
    },
    #[error("failed to fetch delegations")]
    DelegationSource(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Value overflowed its maximum value")]
    Overflow,
    #[error(transparent)]
    Units(#[from] alloy_primitives::utils::UnitsError),
    #[error("invalid voting power: {0}")]
    InvalidScore(#[from] std::num::ParseFloatError),
}

impl Error {
    pub(crate) fn in_round(round: Round) -> impl Fn(BatchError) -> Error + Copy {
        move |source| Error::Computation { round, source }
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub network: NetworkId,
    #[serde(deserialize_with = "address::address_from_hex")]
    pub stake_registry: Address,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub block: BlockRef,
}

fn default_decimals() -> u8 {
    18
}

/// Voting power of every registered delegator at one pinned block.
///
/// Nothing is kept between two computations: every call reads the registry and the
/// chain again.
pub struct VotingPowerSnapshot {
    config: SnapshotConfig,
}

impl VotingPowerSnapshot {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    pub fn compute<S, C>(&self, source: &S, caller: &C) -> Result<VotingPower, Error>
    where
        S: DelegationSource + Sync,
        C: BatchCaller,
    {
        let totals = self.compute_totals(source, caller)?;
        to_scores(&totals, self.config.decimals)
    }

    /// Same as [`compute`](Self::compute) but stops before converting to decimal units.
    pub fn compute_totals<S, C>(&self, source: &S, caller: &C) -> Result<StakeTotals, Error>
    where
        S: DelegationSource + Sync,
        C: BatchCaller,
    {
        let SnapshotConfig {
            network,
            stake_registry,
            block,
            ..
        } = self.config;

        source.ensure_supported(network)?;

        // the registry fetch does not depend on chain state, run it next to the catalog rounds
        let (delegators, catalog) = std::thread::scope(|scope| {
            let delegators = scope.spawn(|| source.fetch_all(network));
            let catalog = ValidatorCatalog::resolve(caller, stake_registry, block);
            let delegators = delegators
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (delegators, catalog)
        });
        let delegators = delegators.map_err(|e| Error::DelegationSource(Box::new(e)))?;
        let catalog = catalog?;
        tracing::info!(
            delegators = delegators.len(),
            validators = catalog.validators().len(),
            active_validators = catalog.active_validators().count(),
            "resolved delegations and validators"
        );

        let aggregator = StakeAggregator::new(&delegators, &catalog);
        let totals = aggregator.accumulate(caller, block)?;
        tracing::info!(
            addresses = totals.len(),
            lookups = aggregator.lookup_count(),
            "accumulated delegated stake"
        );
        Ok(totals)
    }
}
