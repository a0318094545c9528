use alloy_primitives::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("invalid input - {0}")]
    InvalidInput(String),

    #[error("invalid address format - {0}")]
    InvalidAddressFormat(String),

    #[error("invalid init code - {0}")]
    InvalidInitCode(String),

    #[error("no salt found below {reference} after {attempts} attempts")]
    AddressMiningExhausted { reference: Address, attempts: u64 },

    #[error("address mining cancelled")]
    Cancelled,

    #[error("invalid launch config - {0}")]
    Config(String),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// Parses a 20-byte hex address, with or without `0x` prefix.
///
/// Checksums are not enforced: deploy scripts routinely carry lowercase
/// addresses.
pub(crate) fn parse_address(s: &str) -> Result<Address> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|e| Error::InvalidAddressFormat(format!("{s}: {e}")))?;
    if bytes.len() != 20 {
        return Err(Error::InvalidAddressFormat(format!(
            "{s}: expected 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// Decodes a hex byte string, with or without `0x` prefix.
pub(crate) fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let raw = s.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(raw).map_err(|e| Error::InvalidInput(format!("bad hex string: {e}")))
}

#[test]
fn test_parse_address_accepts_lowercase_and_prefixless() {
    let a = parse_address("0xbb4cdb9cbd36b01bd1cbaebf2de08d9173bc095c").unwrap();
    let b = parse_address("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_parse_address_rejects_wrong_length() {
    assert!(matches!(
        parse_address("0xbb4cdb9cbd36b01bd1cbaebf2de08d9173bc09"),
        Err(Error::InvalidAddressFormat(_))
    ));
    assert!(matches!(
        parse_address("0xzz4cdb9cbd36b01bd1cbaebf2de08d9173bc095c"),
        Err(Error::InvalidAddressFormat(_))
    ));
}
