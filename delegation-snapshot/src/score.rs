use crate::aggregate::StakeTotals;
use crate::Error;
use alloy_primitives::{utils, Address, U256};
use std::collections::BTreeMap;

/// Voting power per address, in whole token units.
pub type VotingPower = BTreeMap<Address, f64>;

/// Exact decimal rendering of `raw / 10^decimals`, without trailing zeros.
pub fn format_units(raw: U256, decimals: u8) -> Result<String, Error> {
    let formatted = utils::format_units(raw, decimals)?;
    Ok(match formatted.split_once('.') {
        Some((integer, fraction)) => match fraction.trim_end_matches('0') {
            "" => integer.to_string(),
            fraction => format!("{}.{}", integer, fraction),
        },
        None => formatted,
    })
}

/// Converts stake totals to voting power. Zero totals are kept.
pub fn to_scores(totals: &StakeTotals, decimals: u8) -> Result<VotingPower, Error> {
    totals
        .iter()
        .map(|(address, raw)| {
            let score = format_units(*raw, decimals)?.parse::<f64>()?;
            Ok::<_, Error>((*address, score))
        })
        .collect()
}
