use delegation_snapshot::address::parse_address;
use delegation_snapshot::{BlockRef, NetworkId};
use delegation_toolbox::NetworksConfig;
use alloy_primitives::Address;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct NetworkArgs {
    /// Path to the json file listing the endpoints of every supported network
    #[structopt(long)]
    pub networks: PathBuf,

    /// Chain id of the network to read
    #[structopt(long)]
    pub network: NetworkId,
}

impl NetworkArgs {
    pub fn load(&self) -> Result<NetworksConfig, delegation_toolbox::config::Error> {
        NetworksConfig::load(&self.networks)
    }
}

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct RegistryArgs {
    /// Address of the stake registry contract
    #[structopt(long, parse(try_from_str = parse_address))]
    pub stake_registry: Address,

    /// Block every read is pinned to: `latest` or a block height
    #[structopt(long, default_value = "latest")]
    pub block: BlockRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown output format {0:?}, expected `json` or `csv`")]
pub struct UnknownFormat(String);

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct OutputArgs {
    /// Output file, stdout when missing
    #[structopt(long)]
    pub output: Option<PathBuf>,

    /// `json` or `csv`
    #[structopt(long, default_value = "json")]
    pub format: OutputFormat,
}

impl OutputArgs {
    pub fn open_output(&self) -> io::Result<Box<dyn Write>> {
        Ok(match &self.output {
            Some(path) => Box::new(BufWriter::new(File::create(path)?)),
            None => Box::new(io::stdout()),
        })
    }
}
