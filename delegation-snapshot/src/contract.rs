//! Read-only calls issued against the stake registry and the per-validator
//! delegation contracts.

use crate::ValidatorId;
use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};
use thiserror::Error;

sol! {
    interface IStakeManager {
        function currentEpoch() external view returns (uint256);
        function NFTCounter() external view returns (uint256);
        function getValidatorContract(uint256 validatorId) external view returns (address);
        function validators(uint256 validatorId) external view returns (
            uint256 amount,
            uint256 reward,
            uint256 activationEpoch,
            uint256 deactivationEpoch,
            uint256 jailTime,
            address signer,
            address contractAddress,
            uint8 status,
            uint256 commissionRate,
            uint256 lastCommissionUpdate,
            uint256 delegatorsReward,
            uint256 delegatedAmount,
            uint256 initialRewardPerStake
        );
    }

    interface IValidatorShare {
        function getTotalStake(address user) external view returns (uint256 amount, uint256 exchangeRate);
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Abi(#[from] alloy_sol_types::Error),
    #[error("`{0}` does not fit in 64 bits")]
    Overflow(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContractCall {
    /// `currentEpoch()` on the stake registry
    CurrentEpoch,
    /// `NFTCounter()` on the stake registry: number of validator ids ever issued
    ValidatorCount,
    /// `getValidatorContract(uint256)` on the stake registry
    ValidatorContract(ValidatorId),
    /// `validators(uint256)` on the stake registry
    Validator(ValidatorId),
    /// `getTotalStake(address)` on a validator delegation contract
    TotalStake(Address),
}

impl ContractCall {
    pub fn signature(&self) -> &'static str {
        match self {
            Self::CurrentEpoch => IStakeManager::currentEpochCall::SIGNATURE,
            Self::ValidatorCount => IStakeManager::NFTCounterCall::SIGNATURE,
            Self::ValidatorContract(_) => IStakeManager::getValidatorContractCall::SIGNATURE,
            Self::Validator(_) => IStakeManager::validatorsCall::SIGNATURE,
            Self::TotalStake(_) => IValidatorShare::getTotalStakeCall::SIGNATURE,
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        match self {
            Self::CurrentEpoch => IStakeManager::currentEpochCall::SELECTOR,
            Self::ValidatorCount => IStakeManager::NFTCounterCall::SELECTOR,
            Self::ValidatorContract(_) => IStakeManager::getValidatorContractCall::SELECTOR,
            Self::Validator(_) => IStakeManager::validatorsCall::SELECTOR,
            Self::TotalStake(_) => IValidatorShare::getTotalStakeCall::SELECTOR,
        }
    }

    pub fn calldata(&self) -> Vec<u8> {
        match *self {
            Self::CurrentEpoch => IStakeManager::currentEpochCall {}.abi_encode(),
            Self::ValidatorCount => IStakeManager::NFTCounterCall {}.abi_encode(),
            Self::ValidatorContract(id) => IStakeManager::getValidatorContractCall {
                validatorId: U256::from(id),
            }
            .abi_encode(),
            Self::Validator(id) => IStakeManager::validatorsCall {
                validatorId: U256::from(id),
            }
            .abi_encode(),
            Self::TotalStake(user) => IValidatorShare::getTotalStakeCall { user }.abi_encode(),
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<CallOutput, DecodeError> {
        Ok(match self {
            Self::CurrentEpoch => {
                let epoch = IStakeManager::currentEpochCall::abi_decode_returns(data, true)?._0;
                CallOutput::Counter(narrow(epoch, "currentEpoch")?)
            }
            Self::ValidatorCount => {
                let count = IStakeManager::NFTCounterCall::abi_decode_returns(data, true)?._0;
                CallOutput::Counter(narrow(count, "NFTCounter")?)
            }
            Self::ValidatorContract(_) => CallOutput::Address(
                IStakeManager::getValidatorContractCall::abi_decode_returns(data, true)?._0,
            ),
            Self::Validator(_) => CallOutput::Validator(
                IStakeManager::validatorsCall::abi_decode_returns(data, true)?.into(),
            ),
            Self::TotalStake(_) => {
                let stake = IValidatorShare::getTotalStakeCall::abi_decode_returns(data, true)?;
                CallOutput::Stake(StakeBalance {
                    amount: stake.amount,
                    exchange_rate: stake.exchangeRate,
                })
            }
        })
    }
}

fn narrow(value: U256, name: &'static str) -> Result<u64, DecodeError> {
    u64::try_from(value).map_err(|_| DecodeError::Overflow(name))
}

/// Decoded result of a [`ContractCall`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutput {
    Counter(u64),
    Address(Address),
    Validator(ValidatorInfo),
    Stake(StakeBalance),
}

impl CallOutput {
    pub fn into_counter(self) -> Option<u64> {
        match self {
            Self::Counter(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_address(self) -> Option<Address> {
        match self {
            Self::Address(address) => Some(address),
            _ => None,
        }
    }

    pub fn into_validator(self) -> Option<ValidatorInfo> {
        match self {
            Self::Validator(info) => Some(info),
            _ => None,
        }
    }

    pub fn into_stake(self) -> Option<StakeBalance> {
        match self {
            Self::Stake(balance) => Some(balance),
            _ => None,
        }
    }
}

/// The `validators(uint256)` tuple as stored by the stake registry. Epochs and
/// timestamps keep their full width: only `deactivation_epoch` takes part in
/// the activity rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatorInfo {
    pub amount: U256,
    pub reward: U256,
    pub activation_epoch: U256,
    /// 0 if the validator was never deactivated
    pub deactivation_epoch: U256,
    pub jail_time: U256,
    pub signer: Address,
    pub contract_address: Address,
    pub status: u8,
    pub commission_rate: U256,
    pub last_commission_update: U256,
    pub delegators_reward: U256,
    pub delegated_amount: U256,
    pub initial_reward_per_stake: U256,
}

impl From<IStakeManager::validatorsReturn> for ValidatorInfo {
    fn from(record: IStakeManager::validatorsReturn) -> Self {
        Self {
            amount: record.amount,
            reward: record.reward,
            activation_epoch: record.activationEpoch,
            deactivation_epoch: record.deactivationEpoch,
            jail_time: record.jailTime,
            signer: record.signer,
            contract_address: record.contractAddress,
            status: record.status,
            commission_rate: record.commissionRate,
            last_commission_update: record.lastCommissionUpdate,
            delegators_reward: record.delegatorsReward,
            delegated_amount: record.delegatedAmount,
            initial_reward_per_stake: record.initialRewardPerStake,
        }
    }
}

/// Result of `getTotalStake(address)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StakeBalance {
    /// Stake owned by the delegator, in base units. This is what counts as voting power.
    pub amount: U256,
    /// Share exchange rate of the delegation contract; never added to voting power.
    pub exchange_rate: U256,
}
