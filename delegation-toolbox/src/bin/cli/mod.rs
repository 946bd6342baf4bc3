mod common;
mod delegators;
mod validators;
mod voting_power;

use color_eyre::Report;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub enum Cli {
    /// Compute the voting power of every delegator at a pinned block
    VotingPower(voting_power::VotingPowerCmd),
    /// List every validator known to the stake registry and whether it is active
    Validators(validators::ValidatorsCmd),
    /// Dump the delegation registry of a network
    Delegators(delegators::DelegatorsCmd),
}

impl Cli {
    pub fn exec(self) -> Result<(), Report> {
        match self {
            Self::VotingPower(cmd) => cmd.exec(),
            Self::Validators(cmd) => cmd.exec(),
            Self::Delegators(cmd) => cmd.exec(),
        }
    }
}
