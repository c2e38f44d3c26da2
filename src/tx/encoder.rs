//! Transaction payload encoder
//!
//! Pure functions from a validated draft (or swap parameters) to the
//! outbound message a wallet signs. Inputs are never mutated.
//!
//! Creation body:
//! ```text
//! [op = 21 : uint32][supply : coins][^metadata][owner : addr_std]
//! metadata = [0x01 : uint8][utf-8 JSON, snake]
//! ```
//!
//! Swap body:
//! ```text
//! [op = 0x7362d09c : uint32][amount_in : coins][token_in : addr_std]
//! [token_out : addr_std][min_amount_out : coins][trader : addr_std]
//! [deadline : uint32]
//! ```

use super::amount::{Amount, MAX_COINS, MAX_DECIMALS};
use super::fees::{
    DEPLOY_FEE, MAX_MESSAGE_CELLS, MINT_CONTRACT_ADDRESS, OFF_CHAIN_CONTENT_PREFIX,
    ROUTER_ADDRESS, SWAP_FORWARD_FEE,
};
use super::{OP_MINT_JETTON, OP_SWAP};
use crate::cell::{boc_to_base64, Address, Cell, CellBuilder, CellSlice};
use crate::error::{FieldError, LaunchError, LaunchResult};
use crate::wizard::TokenDraft;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A message ready to be handed to a wallet
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub destination: Address,
    pub value: Amount,
    pub payload: Cell,
}

impl OutboundMessage {
    /// Payload as base64 bag-of-cells
    pub fn payload_base64(&self) -> String {
        boc_to_base64(&self.payload)
    }

    /// Hex representation hash of the payload
    pub fn payload_hash(&self) -> String {
        self.payload.hash_hex()
    }
}

/// Off-chain token metadata embedded in the creation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JettonMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Decimal string, as wallets and explorers expect
    pub decimals: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub social_links: Vec<String>,
}

impl JettonMetadata {
    fn from_draft(draft: &TokenDraft, decimals: u32) -> Self {
        Self {
            name: draft.name.trim().to_string(),
            symbol: draft.ticker.trim().to_string(),
            description: draft.description.trim().to_string(),
            image: draft
                .icon_url
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            decimals: decimals.to_string(),
            social_links: draft.social_links().into_iter().map(String::from).collect(),
        }
    }
}

/// Creation message fields read back from a payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedCreation {
    pub supply: Amount,
    pub metadata: JettonMetadata,
    pub owner: Address,
}

/// Swap message fields read back from a payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedSwap {
    pub amount_in: Amount,
    pub token_in: Address,
    pub token_out: Address,
    pub min_amount_out: Amount,
    pub trader: Address,
    pub deadline: u32,
}

/// Encode the message that deploys a new jetton described by `draft`.
///
/// `total_supply_units` counts whole tokens. The coins field carries the
/// supply in the jetton's own smallest units, `units * 10^decimals` with the
/// draft's decimals (not the fixed 10^9 TON scale), and must not exceed
/// 2^120 - 1. Tonger with 9 decimals and 10^9 units encodes 10^18.
pub fn encode_token_creation(draft: &TokenDraft, owner: &Address) -> LaunchResult<OutboundMessage> {
    let (decimals, units) = check_creation_inputs(draft)?;

    let supply = Amount::scale_units("total_supply_units", units, decimals)?;
    if supply.units() > MAX_COINS {
        return Err(LaunchError::field(
            "total_supply_units",
            "exceeds the largest representable supply",
        ));
    }

    let metadata = JettonMetadata::from_draft(draft, decimals);
    let json = serde_json::to_vec(&metadata)
        .map_err(|e| LaunchError::Internal(format!("metadata serialization: {}", e)))?;

    let mut content = CellBuilder::new();
    content
        .store_u8(OFF_CHAIN_CONTENT_PREFIX)?
        .store_snake_bytes(&json)?;
    let content = content.build()?;

    let mut body = CellBuilder::new();
    body.store_u32(OP_MINT_JETTON)?
        .store_coins(supply.units())?
        .store_ref(content)?
        .store_address(owner)?;
    let payload = body.build()?;

    check_message_size(&payload)?;

    debug!(
        "Encoded creation of {} ({} bytes of metadata, {} cells)",
        metadata.symbol,
        json.len(),
        payload.tree_size()
    );

    Ok(OutboundMessage {
        destination: MINT_CONTRACT_ADDRESS,
        value: DEPLOY_FEE,
        payload,
    })
}

/// Encode a swap of `amount_in` of `token_in` for at least `min_amount_out`
/// of `token_out`, routed through the DEX router
pub fn encode_swap(
    amount_in: Amount,
    token_in: &Address,
    token_out: &Address,
    min_amount_out: Amount,
    trader: &Address,
    deadline: u64,
) -> LaunchResult<OutboundMessage> {
    let mut errors = Vec::new();
    if amount_in.is_zero() {
        errors.push(FieldError::new("amount_in", "must be positive"));
    }
    if amount_in.units() > MAX_COINS {
        errors.push(FieldError::new("amount_in", "is too large"));
    }
    if min_amount_out.units() > MAX_COINS {
        errors.push(FieldError::new("min_amount_out", "is too large"));
    }
    if token_in == token_out {
        errors.push(FieldError::new("token_out", "must differ from token_in"));
    }
    let deadline = u32::try_from(deadline)
        .map_err(|_| FieldError::new("deadline", "does not fit in 32 bits"));
    let deadline = match deadline {
        Ok(d) => d,
        Err(e) => {
            errors.push(e);
            0
        }
    };
    if !errors.is_empty() {
        return Err(LaunchError::Validation(errors));
    }

    let mut body = CellBuilder::new();
    body.store_u32(OP_SWAP)?
        .store_coins(amount_in.units())?
        .store_address(token_in)?
        .store_address(token_out)?
        .store_coins(min_amount_out.units())?
        .store_address(trader)?
        .store_u32(deadline)?;
    let payload = body.build()?;

    debug!(
        "Encoded swap {} -> {} ({} bits)",
        token_in,
        token_out,
        payload.bit_len()
    );

    Ok(OutboundMessage {
        destination: ROUTER_ADDRESS,
        value: SWAP_FORWARD_FEE,
        payload,
    })
}

/// Read a creation payload back into its fields
pub fn decode_token_creation(payload: &Cell) -> LaunchResult<DecodedCreation> {
    let mut slice = CellSlice::new(payload);
    let op = slice.load_u32()?;
    if op != OP_MINT_JETTON {
        return Err(LaunchError::Decode(format!("unexpected opcode {:#x}", op)));
    }
    let supply = Amount::from_units(slice.load_coins()?);

    let mut content = CellSlice::new(slice.load_ref()?);
    let prefix = content.load_u8()?;
    if prefix != OFF_CHAIN_CONTENT_PREFIX {
        return Err(LaunchError::Decode(format!(
            "unexpected content prefix {:#04x}",
            prefix
        )));
    }
    let json = content.load_snake_bytes()?;
    let metadata: JettonMetadata = serde_json::from_slice(&json)
        .map_err(|e| LaunchError::Decode(format!("metadata JSON: {}", e)))?;

    let owner = slice
        .load_address()?
        .ok_or_else(|| LaunchError::Decode("missing owner address".into()))?;

    Ok(DecodedCreation {
        supply,
        metadata,
        owner,
    })
}

/// Read a swap payload back into its fields
pub fn decode_swap(payload: &Cell) -> LaunchResult<DecodedSwap> {
    let mut slice = CellSlice::new(payload);
    let op = slice.load_u32()?;
    if op != OP_SWAP {
        return Err(LaunchError::Decode(format!("unexpected opcode {:#x}", op)));
    }

    let missing = |what: &str| LaunchError::Decode(format!("missing {} address", what));
    let amount_in = Amount::from_units(slice.load_coins()?);
    let token_in = slice.load_address()?.ok_or_else(|| missing("token_in"))?;
    let token_out = slice.load_address()?.ok_or_else(|| missing("token_out"))?;
    let min_amount_out = Amount::from_units(slice.load_coins()?);
    let trader = slice.load_address()?.ok_or_else(|| missing("trader"))?;
    let deadline = slice.load_u32()?;

    Ok(DecodedSwap {
        amount_in,
        token_in,
        token_out,
        min_amount_out,
        trader,
        deadline,
    })
}

/// Decimals and positive supply, or every field error at once
fn check_creation_inputs(draft: &TokenDraft) -> LaunchResult<(u32, u64)> {
    let mut errors = Vec::new();

    let decimals = match draft.decimals {
        Some(d) if (0..=MAX_DECIMALS as i64).contains(&d) => Some(d as u32),
        Some(_) => {
            errors.push(FieldError::new(
                "decimals",
                format!("must be between 0 and {}", MAX_DECIMALS),
            ));
            None
        }
        None => {
            errors.push(FieldError::new("decimals", "is required"));
            None
        }
    };

    let units = match draft.total_supply_units {
        Some(units) if units > 0 => Some(units),
        _ => {
            errors.push(FieldError::new("total_supply_units", "must be a positive integer"));
            None
        }
    };

    // The reserve is paid in TON, so it must resolve to whole nanotons
    if let Some(reserve) = draft.liquidity_reserve_amount {
        if let Err(e) = Amount::from_ton("liquidity_reserve_amount", reserve) {
            errors.extend(e.field_errors().iter().cloned());
        }
    }

    if draft.fee_enabled() {
        let recipient = draft
            .fee_config
            .as_ref()
            .and_then(|c| c.recipient_address.as_deref());
        match recipient {
            Some(recipient) => {
                if let Err(e) = Address::parse(recipient) {
                    errors.push(FieldError::new("fee_config.recipient_address", e.to_string()));
                }
            }
            None => errors.push(FieldError::new("fee_config.recipient_address", "is required")),
        }
    }

    match (decimals, units) {
        (Some(decimals), Some(units)) if errors.is_empty() => Ok((decimals, units)),
        _ => Err(LaunchError::Validation(errors)),
    }
}

fn check_message_size(payload: &Cell) -> LaunchResult<()> {
    let cells = payload.tree_size();
    if cells > MAX_MESSAGE_CELLS {
        return Err(LaunchError::CapacityExceeded {
            unit: "cells",
            needed: cells,
            available: MAX_MESSAGE_CELLS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::draft::FeeConfig;

    fn owner() -> Address {
        "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8"
            .parse()
            .unwrap()
    }

    fn tonger() -> TokenDraft {
        TokenDraft {
            name: "Tonger".into(),
            ticker: "TGR".into(),
            description: "The tonger token".into(),
            decimals: Some(9),
            total_supply_units: Some(1_000_000_000),
            website: Some("https://tonger.example".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_tonger_creation_message() {
        let draft = tonger();
        let message = encode_token_creation(&draft, &owner()).unwrap();

        assert_eq!(message.destination, MINT_CONTRACT_ADDRESS);
        assert_eq!(message.value, DEPLOY_FEE);

        let mut slice = CellSlice::new(&message.payload);
        assert_eq!(slice.load_u32().unwrap(), 21);
        assert_eq!(slice.load_coins().unwrap(), 1_000_000_000u128 * 1_000_000_000);

        let decoded = decode_token_creation(&message.payload).unwrap();
        assert_eq!(decoded.owner, owner());
        assert_eq!(decoded.metadata.name, "Tonger");
        assert_eq!(decoded.metadata.symbol, "TGR");
        assert_eq!(decoded.metadata.decimals, "9");
        assert_eq!(decoded.metadata.social_links, vec!["https://tonger.example"]);

        let json = String::from_utf8(
            CellSlice::new(message.payload.reference(0).unwrap())
                .load_snake_bytes()
                .unwrap()[1..]
                .to_vec(),
        )
        .unwrap();
        assert!(json.contains("\"decimals\":\"9\""));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let draft = tonger();
        let before = draft.clone();
        encode_token_creation(&draft, &owner()).unwrap();
        assert_eq!(draft, before);
    }

    #[test]
    fn test_same_draft_encodes_identically() {
        let a = encode_token_creation(&tonger(), &owner()).unwrap();
        let b = encode_token_creation(&tonger(), &owner()).unwrap();
        assert_eq!(a.payload_hash(), b.payload_hash());
        assert_eq!(a.payload_base64(), b.payload_base64());
    }

    #[test]
    fn test_zero_supply_rejected() {
        let draft = TokenDraft {
            total_supply_units: Some(0),
            ..tonger()
        };
        let err = encode_token_creation(&draft, &owner()).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "total_supply_units");
    }

    #[test]
    fn test_decimals_out_of_range_rejected() {
        for decimals in [19, -1] {
            let draft = TokenDraft {
                decimals: Some(decimals),
                ..tonger()
            };
            let err = encode_token_creation(&draft, &owner()).unwrap_err();
            assert_eq!(err.field_errors()[0].field, "decimals");
        }
    }

    #[test]
    fn test_supply_past_coins_range_rejected() {
        let draft = TokenDraft {
            decimals: Some(18),
            total_supply_units: Some(u64::MAX),
            ..tonger()
        };
        let err = encode_token_creation(&draft, &owner()).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "total_supply_units");
    }

    #[test]
    fn test_reserve_finer_than_nanoton_rejected() {
        let draft = TokenDraft {
            liquidity_reserve_amount: Some("0.1000000001".parse().unwrap()),
            ..tonger()
        };
        let err = encode_token_creation(&draft, &owner()).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "liquidity_reserve_amount");

        let draft = TokenDraft {
            liquidity_reserve_amount: Some("0.5".parse().unwrap()),
            ..tonger()
        };
        assert!(encode_token_creation(&draft, &owner()).is_ok());
    }

    #[test]
    fn test_enabled_fee_needs_valid_recipient() {
        let draft = TokenDraft {
            fee_config: Some(FeeConfig {
                enabled: true,
                percent: None,
                recipient_address: Some("0:nothex".into()),
            }),
            ..tonger()
        };
        let err = encode_token_creation(&draft, &owner()).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "fee_config.recipient_address");
    }

    #[test]
    fn test_large_icon_is_split_and_round_trips() {
        let icon = format!("data:image/png;base64,{}", "A".repeat(5000));
        let draft = TokenDraft {
            icon_url: Some(icon.clone()),
            ..tonger()
        };
        let message = encode_token_creation(&draft, &owner()).unwrap();

        assert!(message.payload.tree_size() > 40);
        let decoded = crate::cell::base64_to_boc(&message.payload_base64()).unwrap();
        let decoded = decode_token_creation(&decoded).unwrap();
        assert_eq!(decoded.metadata.image.as_deref(), Some(icon.as_str()));
    }

    #[test]
    fn test_oversized_icon_exceeds_message_capacity() {
        let icon = format!("data:image/png;base64,{}", "A".repeat(127 * MAX_MESSAGE_CELLS));
        let draft = TokenDraft {
            icon_url: Some(icon),
            ..tonger()
        };
        let err = encode_token_creation(&draft, &owner()).unwrap_err();
        assert!(matches!(err, LaunchError::CapacityExceeded { unit: "cells", .. }));
    }

    #[test]
    fn test_swap_layout() {
        let token_in = Address::new(0, [1; 32]);
        let token_out = Address::new(0, [2; 32]);
        let message = encode_swap(
            Amount::from_units(5_000_000_000),
            &token_in,
            &token_out,
            Amount::from_units(4_900_000),
            &owner(),
            1_700_000_600,
        )
        .unwrap();

        assert_eq!(message.destination, ROUTER_ADDRESS);
        assert_eq!(message.value, SWAP_FORWARD_FEE);
        assert!(message.payload.refs().is_empty());

        let decoded = decode_swap(&message.payload).unwrap();
        assert_eq!(decoded.amount_in.units(), 5_000_000_000);
        assert_eq!(decoded.token_in, token_in);
        assert_eq!(decoded.token_out, token_out);
        assert_eq!(decoded.min_amount_out.units(), 4_900_000);
        assert_eq!(decoded.trader, owner());
        assert_eq!(decoded.deadline, 1_700_000_600);
    }

    #[test]
    fn test_swap_rejects_zero_amount_and_wide_deadline() {
        let err = encode_swap(
            Amount::default(),
            &Address::new(0, [1; 32]),
            &Address::new(0, [2; 32]),
            Amount::default(),
            &owner(),
            u64::from(u32::MAX) + 1,
        )
        .unwrap_err();
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["amount_in", "deadline"]);
    }

    #[test]
    fn test_swap_with_oversized_amounts_exceeds_cell() {
        let err = encode_swap(
            Amount::from_units(1u128 << 100),
            &Address::new(0, [1; 32]),
            &Address::new(0, [2; 32]),
            Amount::from_units(1u128 << 100),
            &owner(),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::CapacityExceeded { unit: "bits", .. }));
    }
}
