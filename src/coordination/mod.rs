//! Submission coordination
//!
//! The coordinator:
//! 1. Validates the whole draft (or resolves swap legs through the catalog)
//! 2. Encodes the outbound message
//! 3. Hands a dispatch request to the wallet signer and awaits the result
//! 4. Records created tokens and resets the wizard on success

pub mod engine;
pub mod signer;

pub use engine::{
    CoordinatorConfig, SessionSnapshot, SubmissionCoordinator, SubmissionKind, SubmissionPhase,
    SubmissionReceipt, SwapRequest,
};
pub use signer::{BridgeSigner, PendingDispatch, WalletResult};
