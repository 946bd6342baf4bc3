use super::common::{NetworkArgs, OutputArgs, OutputFormat, RegistryArgs};
use color_eyre::Report;
use delegation_snapshot::ValidatorCatalog;
use delegation_toolbox::output::{write_validators_csv, write_validators_json};
use delegation_toolbox::RpcBatchCaller;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct ValidatorsCmd {
    #[structopt(flatten)]
    network: NetworkArgs,

    #[structopt(flatten)]
    registry: RegistryArgs,

    #[structopt(flatten)]
    output: OutputArgs,
}

impl ValidatorsCmd {
    pub fn exec(self) -> Result<(), Report> {
        let networks = self.network.load()?;
        let caller = RpcBatchCaller::from_config(&networks, self.network.network)?;
        let catalog =
            ValidatorCatalog::resolve(&caller, self.registry.stake_registry, self.registry.block)?;

        let writer = self.output.open_output()?;
        match self.output.format {
            OutputFormat::Json => write_validators_json(writer, &catalog)?,
            OutputFormat::Csv => write_validators_csv(writer, &catalog)?,
        }
        Ok(())
    }
}
