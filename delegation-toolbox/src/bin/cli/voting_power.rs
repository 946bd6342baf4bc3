use super::common::{NetworkArgs, OutputArgs, OutputFormat, RegistryArgs};
use color_eyre::Report;
use delegation_snapshot::{to_scores, SnapshotConfig, VotingPowerSnapshot};
use delegation_toolbox::output::{write_voting_power_csv, write_voting_power_json};
use delegation_toolbox::{RpcBatchCaller, StakingApi};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct VotingPowerCmd {
    #[structopt(flatten)]
    network: NetworkArgs,

    #[structopt(flatten)]
    registry: RegistryArgs,

    /// Decimals of the staked token
    #[structopt(long, default_value = "18")]
    decimals: u8,

    #[structopt(flatten)]
    output: OutputArgs,
}

impl VotingPowerCmd {
    pub fn exec(self) -> Result<(), Report> {
        let Self {
            network,
            registry,
            decimals,
            output,
        } = self;

        let networks = network.load()?;
        let source = StakingApi::from_config(&networks);
        let caller = RpcBatchCaller::from_config(&networks, network.network)?;
        let snapshot = VotingPowerSnapshot::new(SnapshotConfig {
            network: network.network,
            stake_registry: registry.stake_registry,
            decimals,
            block: registry.block,
        });

        let totals = snapshot.compute_totals(&source, &caller)?;
        let writer = output.open_output()?;
        match output.format {
            OutputFormat::Json => write_voting_power_json(writer, &to_scores(&totals, decimals)?)?,
            OutputFormat::Csv => write_voting_power_csv(writer, &totals, decimals)?,
        }

        Ok(())
    }
}
