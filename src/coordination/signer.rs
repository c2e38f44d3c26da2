//! Wallet signer seam
//!
//! The coordinator hands a `DispatchRequest` to a `WalletSigner` and awaits
//! the signed result. `BridgeSigner` parks the request until the wallet UI
//! collects it over HTTP and posts the outcome back.

use crate::cell::Address;
use crate::error::{LaunchError, LaunchResult};
use crate::tx::{Amount, OutboundMessage};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One message inside a dispatch request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub address: Address,
    pub amount: Amount,
    /// Base64 bag-of-cells body
    pub payload: String,
}

/// What the wallet is asked to sign and send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Unix seconds after which the wallet must refuse to sign
    pub valid_until: u64,
    pub messages: Vec<DispatchMessage>,
}

impl DispatchRequest {
    pub fn single(message: &OutboundMessage, valid_until: u64) -> Self {
        Self {
            valid_until,
            messages: vec![DispatchMessage {
                address: message.destination,
                amount: message.value,
                payload: message.payload_base64(),
            }],
        }
    }
}

/// Wallet confirmation of a sent transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Base64 BOC of the external message the wallet sent
    pub boc: String,
}

#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Ask the wallet to sign and send; `UserRejected` when the user declines
    async fn send_transaction(&self, request: DispatchRequest) -> LaunchResult<SignedTransaction>;
}

/// Outcome reported by the wallet UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WalletResult {
    Signed { boc: String },
    Rejected { reason: Option<String> },
}

/// A request waiting for the wallet UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingDispatch {
    pub request_id: Uuid,
    pub request: DispatchRequest,
}

struct Slot {
    pending: PendingDispatch,
    reply: oneshot::Sender<WalletResult>,
}

/// Signer that relays requests to a browser wallet through the HTTP API
#[derive(Default)]
pub struct BridgeSigner {
    slot: Mutex<Option<Slot>>,
}

impl BridgeSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The request currently waiting for the wallet, if any
    pub fn pending(&self) -> Option<PendingDispatch> {
        self.lock().as_ref().map(|slot| slot.pending.clone())
    }

    /// Deliver the wallet's outcome. Returns false when `request_id` is not
    /// the pending request (already resolved, expired or unknown).
    pub fn resolve(&self, request_id: Uuid, result: WalletResult) -> bool {
        let slot = {
            let mut guard = self.lock();
            let is_pending = guard
                .as_ref()
                .is_some_and(|slot| slot.pending.request_id == request_id);
            if is_pending {
                guard.take()
            } else {
                None
            }
        };

        match slot {
            Some(slot) => {
                debug!("Wallet result for request {} delivered", request_id);
                if slot.reply.send(result).is_err() {
                    warn!("Request {} was abandoned before the wallet answered", request_id);
                }
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Slot>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the slot when the awaiting side goes away (timeout, cancel)
struct SlotGuard<'a> {
    signer: &'a BridgeSigner,
    request_id: Uuid,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut guard = self.signer.lock();
        if guard
            .as_ref()
            .is_some_and(|slot| slot.pending.request_id == self.request_id)
        {
            *guard = None;
        }
    }
}

#[async_trait]
impl WalletSigner for BridgeSigner {
    async fn send_transaction(&self, request: DispatchRequest) -> LaunchResult<SignedTransaction> {
        let request_id = Uuid::new_v4();
        let (reply, response) = oneshot::channel();

        {
            let mut guard = self.lock();
            if let Some(previous) = guard.take() {
                warn!(
                    "Replacing unanswered wallet request {}",
                    previous.pending.request_id
                );
            }
            *guard = Some(Slot {
                pending: PendingDispatch {
                    request_id,
                    request,
                },
                reply,
            });
        }
        let _guard = SlotGuard {
            signer: self,
            request_id,
        };

        info!("Wallet request {} waiting for signature", request_id);

        match response.await {
            Ok(WalletResult::Signed { boc }) => Ok(SignedTransaction { boc }),
            Ok(WalletResult::Rejected { reason }) => Err(LaunchError::UserRejected(
                reason.unwrap_or_else(|| "declined in wallet".to_string()),
            )),
            Err(_) => Err(LaunchError::UserRejected(
                "wallet request was replaced".to_string(),
            )),
        }
    }
}
