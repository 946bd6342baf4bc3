use delegation_snapshot::{ConfigError, NetworkId};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),
}

/// Endpoints for every network the toolbox can snapshot.
///
/// Adding a network is a matter of adding its endpoints to the configuration file.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NetworksConfig {
    /// JSON-RPC node url per network
    #[serde(default)]
    pub rpc: BTreeMap<NetworkId, String>,
    /// Base url of the delegation registry API per network
    #[serde(default)]
    pub staking_api: BTreeMap<NetworkId, String>,
    /// Maximum number of `eth_call` in a single JSON-RPC batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Number of delegators requested per registry page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl NetworksConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.max_batch_size == 0 {
            return Err(Error::Zero("max_batch_size"));
        }
        if self.page_size == 0 {
            return Err(Error::Zero("page_size"));
        }
        Ok(())
    }

    pub fn rpc_url(&self, network: NetworkId) -> Result<&str, ConfigError> {
        self.rpc
            .get(&network)
            .map(String::as_str)
            .ok_or(ConfigError::UnsupportedNetwork(network))
    }
}
