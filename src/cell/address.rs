//! Chain account addresses
//!
//! Two textual forms are accepted:
//! - raw: `<workchain>:<64 hex chars>`
//! - user-friendly: 48 chars of base64 or base64url over
//!   `[flags:1][workchain:1][hash:32][crc16:2]`

use crate::error::{LaunchError, LaunchResult};

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const FLAG_BOUNCEABLE: u8 = 0x11;
const FLAG_NON_BOUNCEABLE: u8 = 0x51;
const FLAG_TESTNET: u8 = 0x80;

const FRIENDLY_LEN: usize = 48;
const FRIENDLY_BYTES: usize = 36;

/// Standard internal address: workchain plus 256-bit account hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    workchain: i8,
    hash: [u8; 32],
}

impl Address {
    pub const fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    pub fn workchain(&self) -> i8 {
        self.workchain
    }

    pub fn hash_part(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Parse and validate either textual form
    pub fn parse(input: &str) -> LaunchResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(LaunchError::address(input, "address is empty"));
        }
        if input.contains(':') {
            Self::parse_raw(input)
        } else {
            Self::parse_friendly(input)
        }
    }

    fn parse_raw(input: &str) -> LaunchResult<Self> {
        let (wc, hash_hex) = input
            .split_once(':')
            .ok_or_else(|| LaunchError::address(input, "missing workchain separator"))?;

        let workchain: i8 = wc
            .parse()
            .map_err(|_| LaunchError::address(input, "workchain is not an integer"))?;
        check_workchain(input, workchain)?;

        if hash_hex.len() != 64 {
            return Err(LaunchError::address(input, "account hash must be 64 hex characters"));
        }
        let mut hash = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash)
            .map_err(|e| LaunchError::address(input, format!("invalid hex: {}", e)))?;

        Ok(Self { workchain, hash })
    }

    fn parse_friendly(input: &str) -> LaunchResult<Self> {
        if input.len() != FRIENDLY_LEN {
            return Err(LaunchError::address(
                input,
                format!("expected {} characters, got {}", FRIENDLY_LEN, input.len()),
            ));
        }

        let bytes = if input.contains(['-', '_']) {
            URL_SAFE.decode(input)
        } else {
            STANDARD.decode(input)
        }
        .map_err(|e| LaunchError::address(input, format!("invalid base64: {}", e)))?;

        if bytes.len() != FRIENDLY_BYTES {
            return Err(LaunchError::address(input, "decoded length is not 36 bytes"));
        }

        let expected = u16::from_be_bytes([bytes[34], bytes[35]]);
        if crc16(&bytes[..34]) != expected {
            return Err(LaunchError::address(input, "checksum mismatch"));
        }

        let flags = bytes[0] & !FLAG_TESTNET;
        if flags != FLAG_BOUNCEABLE && flags != FLAG_NON_BOUNCEABLE {
            return Err(LaunchError::address(input, format!("unknown flags 0x{:02x}", bytes[0])));
        }

        let workchain = bytes[1] as i8;
        check_workchain(input, workchain)?;

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok(Self { workchain, hash })
    }

    /// `<workchain>:<hex>` form
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// User-friendly url-safe form
    pub fn to_friendly(&self, bounceable: bool, testnet: bool) -> String {
        let mut bytes = Vec::with_capacity(FRIENDLY_BYTES);
        let mut flags = if bounceable {
            FLAG_BOUNCEABLE
        } else {
            FLAG_NON_BOUNCEABLE
        };
        if testnet {
            flags |= FLAG_TESTNET;
        }
        bytes.push(flags);
        bytes.push(self.workchain as u8);
        bytes.extend_from_slice(&self.hash);
        let crc = crc16(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());
        URL_SAFE.encode(bytes)
    }
}

fn check_workchain(input: &str, workchain: i8) -> LaunchResult<()> {
    if workchain != 0 && workchain != -1 {
        return Err(LaunchError::address(
            input,
            format!("unsupported workchain {}", workchain),
        ));
    }
    Ok(())
}

/// CRC16-XMODEM as used by the user-friendly address checksum
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

impl FromStr for Address {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_friendly(true, false))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";

    #[test]
    fn test_crc16_xmodem_check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_parse_raw() {
        let addr = Address::parse(RAW).unwrap();
        assert_eq!(addr.workchain(), 0);
        assert_eq!(addr.hash_part()[0], 0x83);
        assert_eq!(addr.to_raw(), RAW);
    }

    #[test]
    fn test_friendly_round_trip() {
        let addr = Address::parse(RAW).unwrap();
        for (bounceable, testnet) in [(true, false), (false, false), (true, true)] {
            let friendly = addr.to_friendly(bounceable, testnet);
            assert_eq!(friendly.len(), 48);
            assert_eq!(Address::parse(&friendly).unwrap(), addr);
        }
        assert!(addr.to_friendly(true, false).starts_with("EQ"));
        assert!(addr.to_friendly(false, false).starts_with("UQ"));
    }

    #[test]
    fn test_standard_base64_is_accepted() {
        let addr = Address::new(-1, [0xfb; 32]);
        let friendly = addr.to_friendly(true, false).replace('-', "+").replace('_', "/");
        assert_eq!(Address::parse(&friendly).unwrap(), addr);
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let addr = Address::parse(RAW).unwrap();
        let mut friendly: Vec<char> = addr.to_friendly(true, false).chars().collect();
        friendly[10] = if friendly[10] == 'A' { 'B' } else { 'A' };
        let tampered: String = friendly.into_iter().collect();

        let err = Address::parse(&tampered).unwrap_err();
        assert!(matches!(err, LaunchError::AddressFormat { .. }));
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        for input in [
            "",
            "0:abcd",
            "7:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8",
            "x:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8",
            "EQshort",
            "0:zzdfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8",
        ] {
            assert!(
                matches!(Address::parse(input), Err(LaunchError::AddressFormat { .. })),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn test_serde_uses_friendly_form() {
        let addr = Address::parse(RAW).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr.to_friendly(true, false)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
