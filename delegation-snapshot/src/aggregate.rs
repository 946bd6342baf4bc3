use crate::batch::{BatchCaller, BatchError, BlockRef, CallRequest};
use crate::catalog::ValidatorCatalog;
use crate::contract::{ContractCall, StakeBalance};
use crate::delegation::Delegator;
use crate::{Error, Round, ValidatorId};
use alloy_primitives::{Address, U256};
use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};

/// Stake accumulated per delegator, in base units.
pub type StakeTotals = BTreeMap<Address, U256>;

/// Identifies the stake of one delegator at one validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StakeKey {
    pub delegator: Address,
    pub validator: ValidatorId,
}

/// Sums the stake of every delegator over all the active validators it is bonded to.
///
/// Repeated `(address, validator)` bonds are looked up and counted once.
pub struct StakeAggregator<'a> {
    delegators: &'a [Delegator],
    // delegation contract to query for each distinct bond of an active validator
    lookups: BTreeMap<StakeKey, Address>,
}

impl<'a> StakeAggregator<'a> {
    pub fn new(delegators: &'a [Delegator], catalog: &ValidatorCatalog) -> Self {
        let bonded = delegators
            .iter()
            .into_group_map_by(|delegator| delegator.bonded_validator);

        let mut lookups = BTreeMap::new();
        for validator in catalog.active_validators() {
            let contract = match validator.contract_address {
                Some(contract) => contract,
                None => continue,
            };
            for delegator in bonded.get(&validator.id).into_iter().flatten() {
                let key = StakeKey {
                    delegator: delegator.address,
                    validator: validator.id,
                };
                lookups.insert(key, contract);
            }
        }

        Self {
            delegators,
            lookups,
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.len()
    }

    /// One `getTotalStake` read per distinct bond, against that validator's contract.
    pub fn requests(&self) -> Vec<CallRequest<StakeKey>> {
        self.lookups
            .iter()
            .map(|(key, contract)| {
                CallRequest::new(*key, *contract, ContractCall::TotalStake(key.delegator))
            })
            .collect()
    }

    /// Reads every stake of every active validator in a single batch and sums them.
    pub fn accumulate<C: BatchCaller>(
        &self,
        caller: &C,
        block: BlockRef,
    ) -> Result<StakeTotals, Error> {
        let fail = Error::in_round(Round::Stakes);
        let stakes = if self.lookups.is_empty() {
            HashMap::new()
        } else {
            tracing::debug!(lookups = self.lookups.len(), "reading delegated stakes");
            caller
                .execute(self.requests(), block)
                .map_err(fail)?
                .into_iter()
                .map(|(key, output)| {
                    output
                        .into_stake()
                        .map(|balance| (key, balance))
                        .ok_or_else(|| BatchError::UnexpectedOutput(format!("{:?}", key)))
                })
                .collect::<Result<HashMap<_, _>, _>>()
                .map_err(fail)?
        };
        self.totals(&stakes)
    }

    /// Every delegator address starts at zero. Each bond with a result adds the
    /// delegator's own stake; bonds without a result add nothing.
    pub fn totals(&self, stakes: &HashMap<StakeKey, StakeBalance>) -> Result<StakeTotals, Error> {
        let mut totals: StakeTotals = self
            .delegators
            .iter()
            .map(|delegator| (delegator.address, U256::ZERO))
            .collect();

        for key in self.lookups.keys() {
            if let Some(balance) = stakes.get(key) {
                let total = totals.entry(key.delegator).or_default();
                *total = total
                    .checked_add(balance.amount)
                    .ok_or(Error::Overflow)?;
            }
        }
        Ok(totals)
    }
}
