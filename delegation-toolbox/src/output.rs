use delegation_snapshot::address::canonical;
use delegation_snapshot::{
    format_units, Delegator, StakeTotals, ValidatorCatalog, ValidatorId, VotingPower,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Snapshot(#[from] delegation_snapshot::Error),
}

/// `{ "0x...": 12.5, ... }` keyed by lower-case address.
pub fn write_voting_power_json<W: Write>(mut writer: W, power: &VotingPower) -> Result<(), Error> {
    let keyed = power
        .iter()
        .map(|(address, score)| (canonical(address), *score))
        .collect::<BTreeMap<_, _>>();
    serde_json::to_writer_pretty(&mut writer, &keyed)?;
    writeln!(writer)?;
    Ok(())
}

/// Exact rendering of the totals: the decimal value and the raw base units.
pub fn write_voting_power_csv<W: Write>(
    writer: W,
    totals: &StakeTotals,
    decimals: u8,
) -> Result<(), Error> {
    let header = ["Address", "Voting power", "Stake (base units)"];
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&header)?;

    for (address, total) in totals.iter() {
        let record = [
            canonical(address),
            format_units(*total, decimals)?,
            total.to_string(),
        ];
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;

    Ok(())
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ValidatorRow {
    pub id: ValidatorId,
    pub contract_address: Option<String>,
    /// decimal, the registry stores a full 256-bit word
    pub deactivation_epoch: String,
    pub status: u8,
    pub active: bool,
}

pub fn validator_rows(catalog: &ValidatorCatalog) -> Vec<ValidatorRow> {
    catalog
        .validators()
        .iter()
        .map(|record| ValidatorRow {
            id: record.id,
            contract_address: record.contract_address.as_ref().map(canonical),
            deactivation_epoch: record.info.deactivation_epoch.to_string(),
            status: record.info.status,
            active: catalog.is_active(record),
        })
        .collect()
}

pub fn write_validators_json<W: Write>(
    mut writer: W,
    catalog: &ValidatorCatalog,
) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut writer, &validator_rows(catalog))?;
    writeln!(writer)?;
    Ok(())
}

pub fn write_validators_csv<W: Write>(writer: W, catalog: &ValidatorCatalog) -> Result<(), Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    // serialized rows carry their own header
    for row in validator_rows(catalog) {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_delegators_json<W: Write>(mut writer: W, delegators: &[Delegator]) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut writer, delegators)?;
    writeln!(writer)?;
    Ok(())
}

pub fn write_delegators_csv<W: Write>(writer: W, delegators: &[Delegator]) -> Result<(), Error> {
    let header = ["Address", "Bonded validator"];
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&header)?;
    for delegator in delegators {
        csv_writer.write_record(&[
            canonical(&delegator.address),
            delegator.bonded_validator.to_string(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use delegation_snapshot::{ValidatorInfo, ValidatorRecord};

    fn totals() -> StakeTotals {
        StakeTotals::from([
            (Address::from([0xab; 20]), U256::from(1_500_000_000_000_000_000u128)),
            (Address::from([0x01; 20]), U256::ZERO),
        ])
    }

    #[test]
    fn voting_power_json() {
        let power = delegation_snapshot::to_scores(&totals(), 18).unwrap();
        let mut buffer = Vec::new();
        write_voting_power_json(&mut buffer, &power).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "0x0101010101010101010101010101010101010101": 0.0,
                "0xabababababababababababababababababababab": 1.5
            })
        );
    }

    #[test]
    fn voting_power_csv() {
        let mut buffer = Vec::new();
        write_voting_power_csv(&mut buffer, &totals(), 18).unwrap();

        let content = String::from_utf8(buffer).unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Address,Voting power,Stake (base units)");
        assert_eq!(lines[1], "0x0101010101010101010101010101010101010101,0,0");
        assert_eq!(
            lines[2],
            "0xabababababababababababababababababababab,1.5,1500000000000000000"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn validators_listing() {
        let catalog = ValidatorCatalog::from_records(
            10,
            vec![
                ValidatorRecord::new(
                    1,
                    Address::from([0xc1; 20]),
                    ValidatorInfo {
                        status: 1,
                        ..Default::default()
                    },
                ),
                ValidatorRecord::new(
                    2,
                    Address::ZERO,
                    ValidatorInfo {
                        deactivation_epoch: U256::from(4u64),
                        ..Default::default()
                    },
                ),
            ],
        );

        let rows = validator_rows(&catalog);
        assert_eq!(
            rows[0],
            ValidatorRow {
                id: 1,
                contract_address: Some("0xc1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1".to_string()),
                deactivation_epoch: "0".to_string(),
                status: 1,
                active: true,
            }
        );
        assert_eq!(rows[1].contract_address, None);
        assert!(!rows[1].active);

        let mut buffer = Vec::new();
        write_validators_csv(&mut buffer, &catalog).unwrap();
        let content = String::from_utf8(buffer).unwrap();
        assert_eq!(
            content.lines().next(),
            Some("id,contract_address,deactivation_epoch,status,active")
        );
        assert_eq!(content.lines().nth(2), Some("2,,4,0,false"));
    }

    #[test]
    fn delegators_csv() {
        let delegators = vec![Delegator {
            address: Address::from([0xde; 20]),
            bonded_validator: 9,
        }];
        let mut buffer = Vec::new();
        write_delegators_csv(&mut buffer, &delegators).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "Address,Bonded validator\n0xdededededededededededededededededededede,9\n"
        );
    }
}
