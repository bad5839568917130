//! Parsing of hex identifiers used at the API boundary.
//!
//! Shop ids, payment ids and phone hashes are 32-byte values written as
//! `0x` followed by 64 hex digits. Accounts are ordinary 20-byte addresses.

use std::str::FromStr;

use alloy_primitives::{Address, B256, hex};

use crate::error::EncodingError;

/// Decodes a `0x`-prefixed, 64-digit hex string into 32 bytes.
///
/// # Errors
///
/// Returns [`EncodingError::InvalidHex`] if the prefix is missing, the length
/// is wrong, or a character is not a hex digit.
pub fn parse_bytes32(value: &str) -> Result<B256, EncodingError> {
    let invalid = || EncodingError::InvalidHex(value.to_owned());
    let digits = value.trim().strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 64 {
        return Err(invalid());
    }
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    Ok(B256::from_slice(&bytes))
}

/// Parses a 20-byte hex address, with or without the `0x` prefix.
///
/// Mixed-case input is accepted without checksum validation.
///
/// # Errors
///
/// Returns [`EncodingError::InvalidAddress`] on malformed input.
pub fn parse_address(value: &str) -> Result<Address, EncodingError> {
    Address::from_str(value.trim()).map_err(|_| EncodingError::InvalidAddress(value.to_owned()))
}

/// Parses an address, mapping an empty string to the zero address.
///
/// Purchases recorded without a wallet carry the zero address as user account.
///
/// # Errors
///
/// Returns [`EncodingError::InvalidAddress`] on malformed, non-empty input.
pub fn parse_address_or_zero(value: &str) -> Result<Address, EncodingError> {
    if value.trim().is_empty() {
        Ok(Address::ZERO)
    } else {
        parse_address(value)
    }
}

/// Renders a 32-byte id as lowercase `0x`-prefixed hex.
#[must_use]
pub fn bytes32_to_hex(value: &B256) -> String {
    hex::encode_prefixed(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP_ID: &str = "0x0001be96d74202df38fd21462ffcef10dfe0fcbd7caa3947689a3903e8b6b874";

    #[test]
    fn bytes32_roundtrip() {
        let id = parse_bytes32(SHOP_ID).unwrap();
        assert_eq!(bytes32_to_hex(&id), SHOP_ID);
    }

    #[test]
    fn bytes32_rejects_bad_input() {
        for value in [
            "",
            "0x",
            &SHOP_ID[2..],
            "0x0001be96d74202df38fd21462ffcef10dfe0fcbd7caa3947689a3903e8b6b8",
            "0x0001be96d74202df38fd21462ffcef10dfe0fcbd7caa3947689a3903e8b6b8zz",
        ] {
            assert_eq!(
                parse_bytes32(value),
                Err(EncodingError::InvalidHex(value.to_owned()))
            );
        }
    }

    #[test]
    fn empty_account_is_zero_address() {
        assert_eq!(parse_address_or_zero("  ").unwrap(), Address::ZERO);
        assert!(parse_address_or_zero("0x1234").is_err());
    }
}
