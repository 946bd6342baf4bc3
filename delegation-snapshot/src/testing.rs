//! In-memory stake registry and delegation registry, for exercising the
//! snapshot pipeline without a node or an HTTP endpoint.

use crate::batch::{BatchCaller, BatchError, BlockRef, CallRequest};
use crate::contract::{CallOutput, ContractCall, StakeBalance, ValidatorInfo};
use crate::delegation::{ConfigError, DelegationSource, Delegator, NetworkId};
use crate::{Epoch, ValidatorId};
use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug)]
struct MockValidator {
    contract: Address,
    info: ValidatorInfo,
}

/// Answers every [`ContractCall`] from in-memory state and records the batches it
/// receives. Unknown validator ids read as the zero address, like the registry does.
pub struct MockChain {
    registry: Address,
    current_epoch: Epoch,
    validators: Vec<MockValidator>,
    stakes: HashMap<(ValidatorId, Address), U256>,
    fail_on: Option<fn(&ContractCall) -> bool>,
    batches: Mutex<Vec<Vec<ContractCall>>>,
}

impl MockChain {
    pub fn new(registry: Address, current_epoch: Epoch) -> Self {
        Self {
            registry,
            current_epoch,
            validators: Vec::new(),
            stakes: HashMap::new(),
            fail_on: None,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> Address {
        self.registry
    }

    pub fn validator_count(&self) -> u64 {
        self.validators.len() as u64
    }

    pub fn add_validator(&mut self, contract: Address, deactivation_epoch: Epoch) -> ValidatorId {
        self.add_validator_record(ValidatorInfo {
            deactivation_epoch: U256::from(deactivation_epoch),
            contract_address: contract,
            status: 1,
            ..Default::default()
        })
    }

    /// Registers a validator with a full registry record; its delegation
    /// contract is `info.contract_address`.
    pub fn add_validator_record(&mut self, info: ValidatorInfo) -> ValidatorId {
        self.validators.push(MockValidator {
            contract: info.contract_address,
            info,
        });
        self.validator_count()
    }

    /// An issued id whose delegation contract is the zero address.
    pub fn add_unregistered_validator(&mut self, deactivation_epoch: Epoch) -> ValidatorId {
        self.add_validator(Address::ZERO, deactivation_epoch)
    }

    pub fn set_stake(&mut self, validator: ValidatorId, delegator: Address, amount: U256) {
        self.stakes.insert((validator, delegator), amount);
    }

    pub fn stake_of(&self, validator: ValidatorId, delegator: Address) -> U256 {
        self.stakes
            .get(&(validator, delegator))
            .copied()
            .unwrap_or_default()
    }

    /// Makes every batch containing a matching call fail.
    pub fn fail_on(&mut self, predicate: fn(&ContractCall) -> bool) {
        self.fail_on = Some(predicate);
    }

    /// Calls of every batch executed so far, in submission order.
    pub fn batches(&self) -> Vec<Vec<ContractCall>> {
        self.batches
            .lock()
            .expect("mock chain lock poisoned")
            .clone()
    }

    fn validator(&self, id: ValidatorId) -> Option<&MockValidator> {
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| self.validators.get(index))
    }

    fn answer(&self, target: Address, call: &ContractCall) -> Result<CallOutput, BatchError> {
        let registry_only = || {
            if target == self.registry {
                Ok(())
            } else {
                Err(BatchError::Call {
                    id: 0,
                    message: format!("{} is not the stake registry", target),
                })
            }
        };
        Ok(match call {
            ContractCall::CurrentEpoch => {
                registry_only()?;
                CallOutput::Counter(self.current_epoch)
            }
            ContractCall::ValidatorCount => {
                registry_only()?;
                CallOutput::Counter(self.validator_count())
            }
            ContractCall::ValidatorContract(id) => {
                registry_only()?;
                CallOutput::Address(self.validator(*id).map(|v| v.contract).unwrap_or_default())
            }
            ContractCall::Validator(id) => {
                registry_only()?;
                CallOutput::Validator(
                    self.validator(*id)
                        .map(|v| v.info.clone())
                        .unwrap_or_default(),
                )
            }
            ContractCall::TotalStake(delegator) => {
                let id = self
                    .validators
                    .iter()
                    .position(|v| v.contract == target && target != Address::ZERO)
                    .ok_or_else(|| BatchError::Call {
                        id: 0,
                        message: format!("{} is not a delegation contract", target),
                    })?;
                CallOutput::Stake(StakeBalance {
                    amount: self.stake_of(id as ValidatorId + 1, *delegator),
                    exchange_rate: U256::from(u64::MAX),
                })
            }
        })
    }
}

impl fmt::Debug for MockChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockChain")
            .field("registry", &self.registry)
            .field("current_epoch", &self.current_epoch)
            .field("validators", &self.validators)
            .field("stakes", &self.stakes)
            .finish_non_exhaustive()
    }
}

impl BatchCaller for MockChain {
    fn execute<K>(
        &self,
        requests: Vec<CallRequest<K>>,
        _block: BlockRef,
    ) -> Result<HashMap<K, CallOutput>, BatchError>
    where
        K: Eq + Hash + Clone,
    {
        self.batches
            .lock()
            .expect("mock chain lock poisoned")
            .push(requests.iter().map(|request| request.call).collect());

        if let Some(predicate) = self.fail_on {
            if requests.iter().any(|request| predicate(&request.call)) {
                return Err(BatchError::Transport("injected batch failure".into()));
            }
        }

        requests
            .into_iter()
            .map(|request| {
                let output = self.answer(request.target, &request.call)?;
                Ok::<_, BatchError>((request.key, output))
            })
            .collect()
    }
}

/// A fixed delegation registry serving a single network.
#[derive(Debug)]
pub struct StaticDelegations {
    network: NetworkId,
    delegators: Vec<Delegator>,
    fetches: AtomicUsize,
}

impl StaticDelegations {
    pub fn new(network: NetworkId, delegators: Vec<Delegator>) -> Self {
        Self {
            network,
            delegators,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DelegationSource for StaticDelegations {
    type Error = Infallible;

    fn ensure_supported(&self, network: NetworkId) -> Result<(), ConfigError> {
        if network == self.network {
            Ok(())
        } else {
            Err(ConfigError::UnsupportedNetwork(network))
        }
    }

    fn fetch_all(&self, _network: NetworkId) -> Result<Vec<Delegator>, Self::Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.delegators.clone())
    }
}

#[derive(Debug, Error)]
#[error("delegation registry unavailable")]
pub struct RegistryUnavailable;

/// A delegation registry that supports one network but never answers.
#[derive(Debug)]
pub struct FailingDelegations {
    network: NetworkId,
}

impl FailingDelegations {
    pub fn new(network: NetworkId) -> Self {
        Self { network }
    }
}

impl DelegationSource for FailingDelegations {
    type Error = RegistryUnavailable;

    fn ensure_supported(&self, network: NetworkId) -> Result<(), ConfigError> {
        if network == self.network {
            Ok(())
        } else {
            Err(ConfigError::UnsupportedNetwork(network))
        }
    }

    fn fetch_all(&self, _network: NetworkId) -> Result<Vec<Delegator>, Self::Error> {
        Err(RegistryUnavailable)
    }
}
