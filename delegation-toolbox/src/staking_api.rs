//! Client for the off-chain delegation registry.
//!
//! Known limitation: a page that fails to load ends the pagination. The pages
//! fetched until then are returned as if they were the whole registry, and the
//! failure is only reported in the logs.

use crate::config::NetworksConfig;
use delegation_snapshot::address::parse_address;
use delegation_snapshot::{ConfigError, DelegationSource, Delegator, NetworkId, ValidatorId};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error("staking api reported a failure: {0}")]
    Api(String),
}

#[derive(Deserialize, Debug)]
struct PageResponse {
    success: bool,
    #[serde(default)]
    result: Vec<RawDelegator>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl PageResponse {
    fn into_result(self) -> Result<Vec<RawDelegator>, Error> {
        if self.success {
            Ok(self.result)
        } else {
            Err(Error::Api(
                self.error
                    .map(|error| error.to_string())
                    .unwrap_or_else(|| "no error description".to_string()),
            ))
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawDelegator {
    address: String,
    #[serde(rename = "bondedValidator", default)]
    bonded_validator: Option<ValidatorId>,
}

impl RawDelegator {
    fn into_delegator(self) -> Option<Delegator> {
        let bonded_validator = match self.bonded_validator {
            Some(id) => id,
            None => {
                tracing::debug!(address = %self.address, "skipping delegator without bonded validator");
                return None;
            }
        };
        match parse_address(&self.address) {
            Ok(address) => Some(Delegator {
                address,
                bonded_validator,
            }),
            Err(error) => {
                tracing::warn!(address = %self.address, %error, "skipping delegator with invalid address");
                None
            }
        }
    }
}

pub struct StakingApi {
    client: Client,
    endpoints: BTreeMap<NetworkId, String>,
    page_size: usize,
}

impl StakingApi {
    pub fn new(endpoints: BTreeMap<NetworkId, String>, page_size: usize) -> Self {
        Self {
            client: Client::new(),
            endpoints,
            page_size,
        }
    }

    pub fn from_config(config: &NetworksConfig) -> Self {
        Self::new(config.staking_api.clone(), config.page_size)
    }

    fn endpoint(&self, network: NetworkId) -> Result<&str, ConfigError> {
        self.endpoints
            .get(&network)
            .map(|base| base.trim_end_matches('/'))
            .ok_or(ConfigError::UnsupportedNetwork(network))
    }

    fn fetch_page(&self, base: &str, page: usize) -> Result<Vec<RawDelegator>, Error> {
        let response: PageResponse = self
            .client
            .get(format!("{}/delegators", base))
            .query(&[("offset", page), ("limit", self.page_size)])
            .send()?
            .error_for_status()?
            .json()?;
        response.into_result()
    }
}

impl DelegationSource for StakingApi {
    type Error = Error;

    fn ensure_supported(&self, network: NetworkId) -> Result<(), ConfigError> {
        self.endpoint(network).map(|_| ())
    }

    fn fetch_all(&self, network: NetworkId) -> Result<Vec<Delegator>, Error> {
        let base = self.endpoint(network)?;
        tracing::info!(network, base, "fetching delegators");
        let delegators = collect_pages(|page| self.fetch_page(base, page));
        tracing::info!(network, delegators = delegators.len(), "fetched delegators");
        Ok(delegators)
    }
}

/// Walks pages `0, 1, 2, ...` until an empty one. A failing page stops the walk
/// and keeps what was collected so far.
pub(crate) fn collect_pages<F>(mut fetch_page: F) -> Vec<Delegator>
where
    F: FnMut(usize) -> Result<Vec<RawDelegator>, Error>,
{
    let mut delegators = Vec::new();
    for page in 0.. {
        match fetch_page(page) {
            Ok(records) if records.is_empty() => break,
            Ok(records) => {
                tracing::debug!(page, records = records.len(), "fetched delegators page");
                delegators.extend(records.into_iter().filter_map(RawDelegator::into_delegator));
            }
            Err(error) => {
                tracing::error!(
                    page,
                    %error,
                    kept = delegators.len(),
                    "failed to fetch delegators page, the registry may be incomplete"
                );
                break;
            }
        }
    }
    delegators
}
