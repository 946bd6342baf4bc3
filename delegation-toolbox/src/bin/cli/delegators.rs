use super::common::{NetworkArgs, OutputArgs, OutputFormat};
use color_eyre::Report;
use delegation_snapshot::DelegationSource;
use delegation_toolbox::output::{write_delegators_csv, write_delegators_json};
use delegation_toolbox::StakingApi;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct DelegatorsCmd {
    #[structopt(flatten)]
    network: NetworkArgs,

    #[structopt(flatten)]
    output: OutputArgs,
}

impl DelegatorsCmd {
    pub fn exec(self) -> Result<(), Report> {
        let networks = self.network.load()?;
        let source = StakingApi::from_config(&networks);
        let delegators = source.fetch_all(self.network.network)?;

        let writer = self.output.open_output()?;
        match self.output.format {
            OutputFormat::Json => write_delegators_json(writer, &delegators)?,
            OutputFormat::Csv => write_delegators_csv(writer, &delegators)?,
        }
        Ok(())
    }
}
