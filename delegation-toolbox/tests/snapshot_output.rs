use alloy_primitives::{Address, U256};
use delegation_snapshot::testing::{MockChain, StaticDelegations};
use delegation_snapshot::{BlockRef, Delegator, SnapshotConfig, ValidatorCatalog, VotingPowerSnapshot};
use delegation_toolbox::output::{validator_rows, write_voting_power_csv, write_voting_power_json};

const NETWORK: u64 = 11155111;

fn account(n: u8) -> Address {
    Address::from([n; 20])
}

fn chain() -> MockChain {
    let mut chain = MockChain::new(account(0xee), 120);
    let v1 = chain.add_validator(account(0xc1), 0);
    let v2 = chain.add_validator(account(0xc2), 121);
    let v3 = chain.add_validator(account(0xc3), 120);
    chain.add_unregistered_validator(0);
    chain.set_stake(v1, account(0xa), U256::from(2_000_000_000_000_000_000u128));
    chain.set_stake(v2, account(0xa), U256::from(250_000_000_000_000_000u128));
    chain.set_stake(v3, account(0xb), U256::from(9_000_000_000_000_000_000u128));
    chain
}

fn delegators() -> Vec<Delegator> {
    [(0xa, 1), (0xa, 2), (0xa, 2), (0xb, 3), (0xc, 4)]
        .into_iter()
        .map(|(n, bonded_validator)| Delegator {
            address: account(n),
            bonded_validator,
        })
        .collect()
}

#[test]
fn snapshot_to_csv_and_json() {
    let chain = chain();
    let source = StaticDelegations::new(NETWORK, delegators());
    let snapshot = VotingPowerSnapshot::new(SnapshotConfig {
        network: NETWORK,
        stake_registry: chain.registry(),
        decimals: 18,
        block: BlockRef::Number(5_000_000),
    });

    let totals = snapshot.compute_totals(&source, &chain).unwrap();
    let mut csv = Vec::new();
    write_voting_power_csv(&mut csv, &totals, 18).unwrap();
    assert_eq!(
        String::from_utf8(csv).unwrap(),
        "Address,Voting power,Stake (base units)\n\
         0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a,2.25,2250000000000000000\n\
         0x0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b,0,0\n\
         0x0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c,0,0\n"
    );

    let power = snapshot.compute(&source, &chain).unwrap();
    let mut json = Vec::new();
    write_voting_power_json(&mut json, &power).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(json["0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a"], 2.25);
    assert_eq!(json.as_object().map(|o| o.len()), Some(3));
}

#[test]
fn validators_activity_listing() {
    let chain = chain();
    let catalog = ValidatorCatalog::resolve(&chain, chain.registry(), BlockRef::Latest).unwrap();
    let active = validator_rows(&catalog)
        .into_iter()
        .map(|row| (row.id, row.active))
        .collect::<Vec<_>>();
    assert_eq!(active, vec![(1, true), (2, true), (3, false), (4, false)]);
}
