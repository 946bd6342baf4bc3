use crate::batch::{take_output, BatchCaller, BatchError, BlockRef, CallRequest};
use crate::contract::{CallOutput, ContractCall, ValidatorInfo};
use crate::{Epoch, Error, Round, ValidatorId};
use alloy_primitives::{Address, U256};

/// Registry counters read in the first round. `validator_count` decides how
/// many reads the second round issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryCounters {
    pub current_epoch: Epoch,
    pub validator_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorRecord {
    pub id: ValidatorId,
    /// Delegation contract, `None` when the registry reports the zero address.
    pub contract_address: Option<Address>,
    pub info: ValidatorInfo,
}

impl ValidatorRecord {
    pub fn new(id: ValidatorId, contract_address: Address, info: ValidatorInfo) -> Self {
        Self {
            id,
            contract_address: Some(contract_address).filter(|address| *address != Address::ZERO),
            info,
        }
    }

    pub fn is_active_at(&self, epoch: Epoch) -> bool {
        let deactivation_epoch = self.info.deactivation_epoch;
        let not_deactivated =
            deactivation_epoch.is_zero() || deactivation_epoch > U256::from(epoch);
        not_deactivated && self.contract_address.is_some()
    }
}

/// Every validator id ever issued by the stake registry, as seen at one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorCatalog {
    current_epoch: Epoch,
    validators: Vec<ValidatorRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum CounterKey {
    CurrentEpoch,
    ValidatorCount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum ValidatorKey {
    Contract(ValidatorId),
    Info(ValidatorId),
}

/// First round: the epoch counter and the number of issued validator ids.
pub fn read_counters<C: BatchCaller>(
    caller: &C,
    registry: Address,
    block: BlockRef,
) -> Result<RegistryCounters, Error> {
    let requests = vec![
        CallRequest::new(CounterKey::CurrentEpoch, registry, ContractCall::CurrentEpoch),
        CallRequest::new(CounterKey::ValidatorCount, registry, ContractCall::ValidatorCount),
    ];
    let fail = Error::in_round(Round::Counters);

    let mut results = caller.execute(requests, block).map_err(fail)?;
    let current_epoch = take_output(
        &mut results,
        &CounterKey::CurrentEpoch,
        CallOutput::into_counter,
    )
    .map_err(fail)?;
    let validator_count = take_output(
        &mut results,
        &CounterKey::ValidatorCount,
        CallOutput::into_counter,
    )
    .map_err(fail)?;

    Ok(RegistryCounters {
        current_epoch,
        validator_count,
    })
}

/// Second round: contract address and registry record of every id in
/// `1..=counters.validator_count`, all in one batch.
pub fn read_validators<C: BatchCaller>(
    caller: &C,
    registry: Address,
    block: BlockRef,
    counters: RegistryCounters,
) -> Result<ValidatorCatalog, Error> {
    let RegistryCounters {
        current_epoch,
        validator_count,
    } = counters;

    if validator_count == 0 {
        return Ok(ValidatorCatalog::from_records(current_epoch, Vec::new()));
    }

    let requests = (1..=validator_count)
        .flat_map(|id| {
            [
                CallRequest::new(
                    ValidatorKey::Contract(id),
                    registry,
                    ContractCall::ValidatorContract(id),
                ),
                CallRequest::new(ValidatorKey::Info(id), registry, ContractCall::Validator(id)),
            ]
        })
        .collect::<Vec<_>>();
    tracing::debug!(
        validator_count,
        requests = requests.len(),
        "reading validator records"
    );
    let fail = Error::in_round(Round::Validators);

    let mut results = caller.execute(requests, block).map_err(fail)?;
    let validators = (1..=validator_count)
        .map(|id| {
            let contract = take_output(
                &mut results,
                &ValidatorKey::Contract(id),
                CallOutput::into_address,
            )?;
            let info = take_output(
                &mut results,
                &ValidatorKey::Info(id),
                CallOutput::into_validator,
            )?;
            Ok::<_, BatchError>(ValidatorRecord::new(id, contract, info))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(fail)?;

    Ok(ValidatorCatalog::from_records(current_epoch, validators))
}

impl ValidatorCatalog {
    pub fn from_records(current_epoch: Epoch, validators: Vec<ValidatorRecord>) -> Self {
        Self {
            current_epoch,
            validators,
        }
    }

    pub fn resolve<C: BatchCaller>(
        caller: &C,
        registry: Address,
        block: BlockRef,
    ) -> Result<Self, Error> {
        let counters = read_counters(caller, registry, block)?;
        tracing::info!(
            current_epoch = counters.current_epoch,
            validator_count = counters.validator_count,
            %block,
            "read stake registry counters"
        );
        read_validators(caller, registry, block, counters)
    }

    pub fn current_epoch(&self) -> Epoch {
        self.current_epoch
    }

    pub fn validators(&self) -> &[ValidatorRecord] {
        &self.validators
    }

    pub fn is_active(&self, record: &ValidatorRecord) -> bool {
        record.is_active_at(self.current_epoch)
    }

    pub fn active_validators(&self) -> impl Iterator<Item = &ValidatorRecord> {
        self.validators.iter().filter(|record| self.is_active(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;

    fn record(id: ValidatorId, contract: Address, deactivation_epoch: Epoch) -> ValidatorRecord {
        ValidatorRecord::new(
            id,
            contract,
            ValidatorInfo {
                deactivation_epoch: U256::from(deactivation_epoch),
                ..Default::default()
            },
        )
    }

    fn contract(n: u8) -> Address {
        Address::from([n; 20])
    }

    #[test]
    fn never_deactivated_is_always_active() {
        for epoch in [0, 1, 1_000, u64::MAX] {
            assert!(record(1, contract(1), 0).is_active_at(epoch));
        }
    }

    #[test]
    fn deactivation_boundary() {
        let epoch = 500;
        assert!(!record(1, contract(1), epoch - 1).is_active_at(epoch));
        assert!(!record(1, contract(1), epoch).is_active_at(epoch));
        assert!(record(1, contract(1), epoch + 1).is_active_at(epoch));
    }

    #[test]
    fn wide_deactivation_epoch_is_active() {
        let record = ValidatorRecord::new(
            1,
            contract(1),
            ValidatorInfo {
                deactivation_epoch: U256::from(u64::MAX) + U256::from(1u64),
                jail_time: U256::MAX,
                ..Default::default()
            },
        );
        assert!(record.is_active_at(u64::MAX));
    }

    #[test]
    fn null_contract_is_never_active() {
        let unregistered = record(4, Address::ZERO, 0);
        assert_eq!(unregistered.contract_address, None);
        assert!(!unregistered.is_active_at(0));
        assert!(!record(4, Address::ZERO, 10_000).is_active_at(1));
    }

    #[test]
    fn resolve_reads_in_two_rounds() {
        let mut chain = MockChain::new(contract(0xaa), 100);
        chain.add_validator(contract(1), 0);
        chain.add_validator(contract(2), 100);
        chain.add_unregistered_validator(0);

        let catalog = ValidatorCatalog::resolve(&chain, chain.registry(), BlockRef::Latest).unwrap();

        let batches = chain.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(
            batches[0],
            vec![ContractCall::CurrentEpoch, ContractCall::ValidatorCount]
        );
        assert_eq!(batches[1].len(), 2 * 3);

        assert_eq!(catalog.current_epoch(), 100);
        assert_eq!(catalog.validators().len(), 3);
        let active = catalog.active_validators().map(|v| v.id).collect::<Vec<_>>();
        assert_eq!(active, vec![1]);
    }

    #[test]
    fn empty_registry_skips_second_round() {
        let chain = MockChain::new(contract(0xaa), 7);
        let catalog = ValidatorCatalog::resolve(&chain, chain.registry(), BlockRef::Number(1)).unwrap();
        assert_eq!(chain.batches().len(), 1);
        assert!(catalog.validators().is_empty());
        assert_eq!(catalog.active_validators().count(), 0);
    }

    #[test]
    fn failures_name_the_round() {
        let mut chain = MockChain::new(contract(0xaa), 1);
        chain.add_validator(contract(1), 0);

        chain.fail_on(|call| *call == ContractCall::ValidatorCount);
        let err = ValidatorCatalog::resolve(&chain, chain.registry(), BlockRef::Latest).unwrap_err();
        assert!(matches!(
            err,
            Error::Computation {
                round: Round::Counters,
                source: BatchError::Transport(_)
            }
        ));

        chain.fail_on(|call| matches!(call, ContractCall::Validator(_)));
        let err = ValidatorCatalog::resolve(&chain, chain.registry(), BlockRef::Latest).unwrap_err();
        assert!(matches!(
            err,
            Error::Computation {
                round: Round::Validators,
                ..
            }
        ));
        assert!(err.to_string().contains("validator records"));
    }
}
