use alloy_primitives::Address;
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
use thiserror::Error;

const ADDRESS_LEN: usize = 20;

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("invalid hex string: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected a 20 bytes account, found {0} bytes")]
    Length(usize),
}

/// Parses an account from its hex form, with or without `0x` prefix and
/// regardless of letter case.
pub fn parse_address(s: &str) -> Result<Address, AddressError> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let bytes = hex::decode(digits)?;
    if bytes.len() != ADDRESS_LEN {
        return Err(AddressError::Length(bytes.len()));
    }
    Ok(Address::from_slice(&bytes))
}

/// Lower-case `0x` prefixed rendering, used as the key of every published result.
pub fn canonical(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

pub fn address_from_hex<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_address(&s).map_err(|e| D::Error::custom(format!("invalid address {}: {}", s, e)))
}

pub fn address_to_hex<S>(address: &Address, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&canonical(address))
}
