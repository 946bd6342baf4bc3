use crate::contract::{CallOutput, ContractCall, DecodeError};
use alloy_primitives::Address;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// Point of chain history every read of a snapshot is pinned to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlockRef {
    #[default]
    Latest,
    Number(u64),
}

impl BlockRef {
    /// Block parameter as understood by `eth_call`.
    pub fn to_rpc_tag(&self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Number(height) => format!("{:#x}", height),
        }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Number(height) => write!(f, "{}", height),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid block reference {0:?}, expected `latest` or a block height")]
pub struct InvalidBlockRef(String);

impl FromStr for BlockRef {
    type Err = InvalidBlockRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        s.parse()
            .map(Self::Number)
            .map_err(|_| InvalidBlockRef(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for BlockRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum BlockRefInput {
            Height(u64),
            Tag(String),
        }

        match BlockRefInput::deserialize(deserializer)? {
            BlockRefInput::Height(height) => Ok(Self::Number(height)),
            BlockRefInput::Tag(tag) => tag.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// A single read, identified by a caller chosen key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRequest<K> {
    pub key: K,
    pub target: Address,
    pub call: ContractCall,
}

impl<K> CallRequest<K> {
    pub fn new(key: K, target: Address, call: ContractCall) -> Self {
        Self { key, target, call }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch transport failed")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("request {id} failed: {message}")]
    Call { id: usize, message: String },
    #[error("no response for request {0}")]
    MissingResponse(usize),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("no result for {0}")]
    MissingResult(String),
    #[error("unexpected result type for {0}")]
    UnexpectedOutput(String),
}

/// Executes a set of independent reads against contract state pinned to one block.
///
/// The whole batch either succeeds, returning one decoded output per request key,
/// or fails. Implementations are free to split, pipeline or parallelize the reads
/// internally.
pub trait BatchCaller {
    fn execute<K>(
        &self,
        requests: Vec<CallRequest<K>>,
        block: BlockRef,
    ) -> Result<HashMap<K, CallOutput>, BatchError>
    where
        K: Eq + Hash + Clone;
}

impl<T: BatchCaller + ?Sized> BatchCaller for &T {
    fn execute<K>(
        &self,
        requests: Vec<CallRequest<K>>,
        block: BlockRef,
    ) -> Result<HashMap<K, CallOutput>, BatchError>
    where
        K: Eq + Hash + Clone,
    {
        (**self).execute(requests, block)
    }
}

/// Removes the output for `key` and converts it to the expected type.
pub(crate) fn take_output<K, T>(
    results: &mut HashMap<K, CallOutput>,
    key: &K,
    extract: fn(CallOutput) -> Option<T>,
) -> Result<T, BatchError>
where
    K: Eq + Hash + fmt::Debug,
{
    let output = results
        .remove(key)
        .ok_or_else(|| BatchError::MissingResult(format!("{:?}", key)))?;
    extract(output).ok_or_else(|| BatchError::UnexpectedOutput(format!("{:?}", key)))
}
