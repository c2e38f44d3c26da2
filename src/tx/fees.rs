//! Protocol-fixed constants: contract addresses, opcodes, fees and
//! validity windows

use super::amount::Amount;
use crate::cell::Address;

/// Jetton minter contract that receives creation messages
pub const MINT_CONTRACT_ADDRESS: Address = Address::new(
    0,
    [
        0xdc, 0x6f, 0x17, 0xbb, 0xec, 0x82, 0x4f, 0xff,
        0x8f, 0x86, 0x58, 0x79, 0x66, 0xb2, 0x04, 0x7d,
        0xb6, 0xab, 0x73, 0x67, 0x85, 0x84, 0x01, 0x51,
        0xf1, 0x3d, 0x1d, 0xab, 0x12, 0x4e, 0x2a, 0x54,
    ],
);

/// DEX router that receives swap messages
pub const ROUTER_ADDRESS: Address = Address::new(
    0,
    [
        0x74, 0xc9, 0x56, 0x04, 0x04, 0x34, 0x27, 0xf0,
        0xbe, 0xe1, 0xd0, 0xe1, 0x6b, 0xfa, 0x53, 0xaf,
        0xd5, 0x37, 0xf7, 0x36, 0xad, 0x00, 0x73, 0xc4,
        0xcc, 0x4e, 0x1c, 0xcb, 0x3a, 0x82, 0xb5, 0xdc,
    ],
);

/// Value attached to a creation message (0.25 TON)
pub const DEPLOY_FEE: Amount = Amount::from_units(250_000_000);

/// Value attached to a swap message to cover forwarding (0.3 TON)
pub const SWAP_FORWARD_FEE: Amount = Amount::from_units(300_000_000);

/// Seconds a mint request stays signable
pub const MINT_VALIDITY_SECS: u64 = 360;

/// Seconds a swap request stays signable; also the swap deadline offset
pub const SWAP_VALIDITY_SECS: u64 = 600;

/// Message body operation codes
pub mod opcodes {
    pub const OP_MINT_JETTON: u32 = 21;
    pub const OP_SWAP: u32 = 0x7362d09c;
}

/// TEP-64 off-chain content layout marker
pub const OFF_CHAIN_CONTENT_PREFIX: u8 = 0x01;

/// Upper bound on cells in one outbound payload
pub const MAX_MESSAGE_CELLS: usize = crate::cell::MAX_BOC_CELLS;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_addresses_match_raw_form() {
        assert_eq!(
            MINT_CONTRACT_ADDRESS.to_raw(),
            "0:dc6f17bbec824fff8f86587966b2047db6ab736785840151f13d1dab124e2a54"
        );
        assert_eq!(
            ROUTER_ADDRESS.to_raw(),
            "0:74c95604043427f0bee1d0e16bfa53afd537f736ad0073c4cc4e1ccb3a82b5dc"
        );
    }
}
