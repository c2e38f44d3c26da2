//! Outbound transaction construction: amounts, protocol constants and the
//! payload encoder

pub mod amount;
pub mod encoder;
pub mod fees;

pub use amount::Amount;
pub use encoder::{encode_swap, encode_token_creation, OutboundMessage};
pub use fees::opcodes::{OP_MINT_JETTON, OP_SWAP};
