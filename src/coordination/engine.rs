//! Submission coordinator
//!
//! Owns the wizard session and drives a submission through
//! Idle -> Validating -> Encoding -> AwaitingWalletResult -> Succeeded | Failed.
//! At most one submission is in flight per session; the wallet await is the
//! only suspension point.

use super::signer::{DispatchRequest, SignedTransaction, WalletSigner};
use crate::catalog::TokenCatalog;
use crate::cell::Address;
use crate::config::LauncherConfig;
use crate::error::{ErrorReport, LaunchError, LaunchResult};
use crate::events::{EventBus, SubmissionEvent};
use crate::state::{CreatedToken, TokenRepository};
use crate::tx::amount::TON_DECIMALS;
use crate::tx::fees::{MINT_VALIDITY_SECS, SWAP_VALIDITY_SECS};
use crate::tx::{encode_swap, encode_token_creation, Amount, OutboundMessage};
use crate::wizard::{schema, DraftPatch, TokenDraft, WizardStateMachine, WizardStep};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Mint,
    Swap,
}

impl SubmissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionKind::Mint => "mint",
            SubmissionKind::Swap => "swap",
        }
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    Idle,
    Validating,
    Encoding,
    AwaitingWalletResult,
    Succeeded,
    Failed,
}

/// Returned to every caller awaiting a successful submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub submission_id: Uuid,
    pub kind: SubmissionKind,
    /// Repository id of the created token; absent for swaps and for results
    /// that arrived after a reset
    pub token_id: Option<Uuid>,
    pub destination: Address,
    pub payload_hash: String,
    pub transaction_boc: String,
}

/// Swap between two catalog tokens, amounts in whole-token decimals
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SwapRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    #[serde(default)]
    pub min_amount_out: Decimal,
    pub trader: String,
}

/// Point-in-time view of the session for the UI
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub step: WizardStep,
    pub step_index: u8,
    pub draft: TokenDraft,
    pub phase: SubmissionPhase,
    pub generation: u64,
    pub in_flight: Option<Uuid>,
    pub last_error: Option<ErrorReport>,
    pub last_receipt: Option<SubmissionReceipt>,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub signer_timeout: Duration,
    pub mint_validity_secs: u64,
    pub swap_validity_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            signer_timeout: Duration::from_secs(300),
            mint_validity_secs: MINT_VALIDITY_SECS,
            swap_validity_secs: SWAP_VALIDITY_SECS,
        }
    }
}

impl From<&LauncherConfig> for CoordinatorConfig {
    fn from(config: &LauncherConfig) -> Self {
        Self {
            signer_timeout: config.signer_timeout(),
            ..Self::default()
        }
    }
}

type SharedOutcome = Shared<BoxFuture<'static, LaunchResult<SubmissionReceipt>>>;

struct InFlight {
    id: Uuid,
    kind: SubmissionKind,
    outcome: SharedOutcome,
    cancel: Option<oneshot::Sender<()>>,
}

struct Session {
    wizard: WizardStateMachine,
    phase: SubmissionPhase,
    in_flight: Option<InFlight>,
    last_error: Option<LaunchError>,
    last_receipt: Option<SubmissionReceipt>,
}

/// Swap legs resolved through the catalog, in smallest units
struct ResolvedSwap {
    token_in: Address,
    token_out: Address,
    amount_in: Amount,
    min_amount_out: Amount,
    trader: Address,
}

/// What to record once the wallet confirms
enum Completion {
    Mint {
        draft: TokenDraft,
        owner: Address,
    },
    Swap,
}

/// A message handed to the wallet, plus what is needed to finish it
struct Dispatch {
    id: Uuid,
    kind: SubmissionKind,
    generation: u64,
    message: OutboundMessage,
    request: DispatchRequest,
    completion: Completion,
}

struct Inner {
    session: Mutex<Session>,
    signer: Arc<dyn WalletSigner>,
    repository: Arc<dyn TokenRepository>,
    catalog: Arc<dyn TokenCatalog>,
    events: EventBus,
    config: CoordinatorConfig,
}

/// Validate -> encode -> dispatch to wallet -> await -> surface result
#[derive(Clone)]
pub struct SubmissionCoordinator {
    inner: Arc<Inner>,
}

impl SubmissionCoordinator {
    pub fn new(
        signer: Arc<dyn WalletSigner>,
        repository: Arc<dyn TokenRepository>,
        catalog: Arc<dyn TokenCatalog>,
        events: EventBus,
        config: CoordinatorConfig,
    ) -> Self {
        let session = Session {
            wizard: WizardStateMachine::new(),
            phase: SubmissionPhase::Idle,
            in_flight: None,
            last_error: None,
            last_receipt: None,
        };

        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(session),
                signer,
                repository,
                catalog,
                events,
                config,
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.inner.session.lock().await;
        SessionSnapshot {
            step: session.wizard.step(),
            step_index: session.wizard.step().index(),
            draft: session.wizard.draft().clone(),
            phase: session.phase,
            generation: session.wizard.generation(),
            in_flight: session.in_flight.as_ref().map(|f| f.id),
            last_error: session.last_error.as_ref().map(ErrorReport::from),
            last_receipt: session.last_receipt.clone(),
        }
    }

    pub async fn next(&self, patch: DraftPatch) -> LaunchResult<WizardStep> {
        self.inner.session.lock().await.wizard.next(patch)
    }

    pub async fn back(&self, patch: Option<DraftPatch>) -> WizardStep {
        self.inner.session.lock().await.wizard.back(patch)
    }

    /// Clear the wizard. A submission already with the wallet keeps running,
    /// but its result will no longer touch this session.
    pub async fn reset(&self) {
        let mut session = self.inner.session.lock().await;
        session.wizard.reset();
        session.last_error = None;
        if session.in_flight.is_none() {
            session.phase = SubmissionPhase::Idle;
        }
        self.inner.events.publish(SubmissionEvent::WizardReset {
            generation: session.wizard.generation(),
        });
    }

    /// Submit the current draft. A second caller while a mint is in flight
    /// receives the same outcome; nothing is dispatched twice. A pending swap
    /// is never joined.
    pub async fn submit(&self, owner: &str) -> LaunchResult<SubmissionReceipt> {
        let outcome = {
            let mut session = self.inner.session.lock().await;
            let joined = session
                .in_flight
                .as_ref()
                .map(|f| (f.id, f.kind, f.outcome.clone()));
            match joined {
                Some((id, SubmissionKind::Mint, outcome)) => {
                    debug!("Joining in-flight submission {}", id);
                    outcome
                }
                Some(_) => return Err(LaunchError::SubmissionInProgress),
                None => self.begin_mint(&mut session, owner)?,
            }
        };
        outcome.await
    }

    /// Like `submit`, but refuses while another submission is in flight
    pub async fn try_submit(&self, owner: &str) -> LaunchResult<SubmissionReceipt> {
        let outcome = {
            let mut session = self.inner.session.lock().await;
            if session.in_flight.is_some() {
                return Err(LaunchError::SubmissionInProgress);
            }
            self.begin_mint(&mut session, owner)?
        };
        outcome.await
    }

    /// Swap through the DEX router. Shares the session's single in-flight slot.
    ///
    /// Catalog lookups run without the session lock; the slot is checked
    /// again once they finish.
    pub async fn submit_swap(&self, request: SwapRequest) -> LaunchResult<SubmissionReceipt> {
        if self.inner.session.lock().await.in_flight.is_some() {
            return Err(LaunchError::SubmissionInProgress);
        }

        let resolved = self.resolve_swap(&request).await;
        let outcome = {
            let mut session = self.inner.session.lock().await;
            if session.in_flight.is_some() {
                return Err(LaunchError::SubmissionInProgress);
            }
            self.begin_swap(&mut session, resolved)?
        };
        outcome.await
    }

    /// Abandon the in-flight submission; its callers see `UserRejected`.
    /// Returns false when there was nothing to cancel.
    pub async fn cancel(&self) -> bool {
        let mut session = self.inner.session.lock().await;
        let sender = session.in_flight.as_mut().and_then(|f| {
            info!("Cancelling submission {}", f.id);
            f.cancel.take()
        });
        match sender {
            Some(sender) => sender.send(()).is_ok(),
            None => false,
        }
    }

    fn begin_mint(&self, session: &mut Session, owner: &str) -> LaunchResult<SharedOutcome> {
        let id = Uuid::new_v4();
        let kind = SubmissionKind::Mint;
        self.inner.events.publish(SubmissionEvent::Started {
            submission_id: id,
            kind,
        });

        self.inner.set_phase(session, id, SubmissionPhase::Validating);
        let draft = session.wizard.draft().clone();
        let owner = match schema::validate_all(&draft).and_then(|_| Address::parse(owner)) {
            Ok(owner) => owner,
            Err(e) => return Err(self.inner.reject(session, id, kind, e)),
        };

        self.inner.set_phase(session, id, SubmissionPhase::Encoding);
        let message = match encode_token_creation(&draft, &owner) {
            Ok(message) => message,
            Err(e) => return Err(self.inner.reject(session, id, kind, e)),
        };

        let valid_until = now_secs() + self.inner.config.mint_validity_secs;
        let request = DispatchRequest::single(&message, valid_until);
        let generation = session.wizard.generation();
        Ok(self.dispatch(
            session,
            Dispatch {
                id,
                kind,
                generation,
                message,
                request,
                completion: Completion::Mint { draft, owner },
            },
        ))
    }

    fn begin_swap(
        &self,
        session: &mut Session,
        resolved: LaunchResult<ResolvedSwap>,
    ) -> LaunchResult<SharedOutcome> {
        let id = Uuid::new_v4();
        let kind = SubmissionKind::Swap;
        self.inner.events.publish(SubmissionEvent::Started {
            submission_id: id,
            kind,
        });

        self.inner.set_phase(session, id, SubmissionPhase::Validating);
        let swap = match resolved {
            Ok(swap) => swap,
            Err(e) => return Err(self.inner.reject(session, id, kind, e)),
        };

        self.inner.set_phase(session, id, SubmissionPhase::Encoding);
        let deadline = now_secs() + self.inner.config.swap_validity_secs;
        let message = match encode_swap(
            swap.amount_in,
            &swap.token_in,
            &swap.token_out,
            swap.min_amount_out,
            &swap.trader,
            deadline,
        ) {
            Ok(message) => message,
            Err(e) => return Err(self.inner.reject(session, id, kind, e)),
        };

        let request = DispatchRequest::single(&message, deadline);
        let generation = session.wizard.generation();
        Ok(self.dispatch(
            session,
            Dispatch {
                id,
                kind,
                generation,
                message,
                request,
                completion: Completion::Swap,
            },
        ))
    }

    /// Catalog lookups and amount scaling for both legs
    async fn resolve_swap(&self, request: &SwapRequest) -> LaunchResult<ResolvedSwap> {
        let token_in = self.inner.catalog.lookup_token(&request.token_in).await?;
        let token_out = self.inner.catalog.lookup_token(&request.token_out).await?;

        let amount_in =
            Amount::from_decimal("amount_in", request.amount_in, token_in.decimals as u32)?;
        let min_amount_out = Amount::from_decimal(
            "min_amount_out",
            request.min_amount_out,
            token_out.decimals as u32,
        )?;
        let trader = Address::parse(&request.trader)?;

        Ok(ResolvedSwap {
            token_in: token_in.address,
            token_out: token_out.address,
            amount_in,
            min_amount_out,
            trader,
        })
    }

    fn dispatch(&self, session: &mut Session, dispatch: Dispatch) -> SharedOutcome {
        let id = dispatch.id;
        let kind = dispatch.kind;
        let valid_until = dispatch.request.valid_until;
        let value = dispatch.message.value;
        let destination = dispatch.message.destination.to_raw();

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let outcome = run_dispatch(self.inner.clone(), dispatch, cancel_rx)
            .boxed()
            .shared();

        // Driven by its own task so callers may drop their handles freely
        tokio::spawn(outcome.clone());

        session.in_flight = Some(InFlight {
            id,
            kind,
            outcome: outcome.clone(),
            cancel: Some(cancel_tx),
        });
        self.inner
            .set_phase(session, id, SubmissionPhase::AwaitingWalletResult);
        self.inner.events.publish(SubmissionEvent::WalletRequested {
            submission_id: id,
            valid_until,
            value,
        });
        crate::metrics::record_submission_started(kind);
        let attached = value
            .to_decimal(TON_DECIMALS)
            .map(|ton| ton.to_string())
            .unwrap_or_else(|| value.to_string());
        info!(
            "Submission {} ({}) sent to wallet: {} TON to {}",
            id, kind, attached, destination
        );

        outcome
    }
}

async fn run_dispatch(
    inner: Arc<Inner>,
    dispatch: Dispatch,
    cancel: oneshot::Receiver<()>,
) -> LaunchResult<SubmissionReceipt> {
    let started = Instant::now();
    let request = dispatch.request.clone();

    let result = tokio::select! {
        result = tokio::time::timeout(
            inner.config.signer_timeout,
            inner.signer.send_transaction(request),
        ) => match result {
            Ok(result) => result,
            Err(_) => Err(LaunchError::Timeout {
                operation: "wallet signature".to_string(),
            }),
        },
        _ = cancel => Err(LaunchError::UserRejected("cancelled by caller".to_string())),
    };

    inner.finish(dispatch, result, started.elapsed()).await
}

impl Inner {
    fn set_phase(&self, session: &mut Session, id: Uuid, phase: SubmissionPhase) {
        session.phase = phase;
        self.events.publish(SubmissionEvent::PhaseChanged {
            submission_id: id,
            phase,
        });
    }

    /// Record a failure that happened before anything reached the wallet
    fn reject(
        &self,
        session: &mut Session,
        id: Uuid,
        kind: SubmissionKind,
        err: LaunchError,
    ) -> LaunchError {
        warn!("Submission {} ({}) rejected: {}", id, kind, err);
        self.set_phase(session, id, SubmissionPhase::Failed);
        self.publish_failure(id, kind, &err);
        session.phase = SubmissionPhase::Idle;
        session.last_error = Some(err.clone());
        crate::metrics::record_submission_rejected(kind, err.kind());
        err
    }

    fn publish_failure(&self, id: Uuid, kind: SubmissionKind, err: &LaunchError) {
        self.events.publish(SubmissionEvent::Failed {
            submission_id: id,
            kind,
            error_kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        });
    }

    async fn finish(
        &self,
        dispatch: Dispatch,
        result: LaunchResult<SignedTransaction>,
        waited: Duration,
    ) -> LaunchResult<SubmissionReceipt> {
        let mut session = self.session.lock().await;
        if session
            .in_flight
            .as_ref()
            .is_some_and(|f| f.id == dispatch.id)
        {
            session.in_flight = None;
        }

        let outcome = match &result {
            Ok(_) => "succeeded",
            Err(e) => e.kind(),
        };
        crate::metrics::record_submission_completed(dispatch.kind, outcome, waited.as_secs_f64());

        let Dispatch {
            id,
            kind,
            generation,
            message,
            completion,
            ..
        } = dispatch;

        if session.wizard.generation() != generation {
            warn!(
                "Ignoring wallet result for submission {} that arrived after a reset",
                id
            );
            self.events
                .publish(SubmissionEvent::StaleResultIgnored { submission_id: id });
            if session.in_flight.is_none() {
                session.phase = SubmissionPhase::Idle;
            }
            return result.map(|signed| SubmissionReceipt {
                submission_id: id,
                kind,
                token_id: None,
                destination: message.destination,
                payload_hash: message.payload_hash(),
                transaction_boc: signed.boc,
            });
        }

        let signed = match result {
            Ok(signed) => signed,
            Err(e) => {
                warn!("Submission {} ({}) failed: {}", id, kind, e);
                self.set_phase(&mut session, id, SubmissionPhase::Failed);
                self.publish_failure(id, kind, &e);
                session.phase = SubmissionPhase::Idle;
                session.last_error = Some(e.clone());
                return Err(e);
            }
        };

        let token_id = match completion {
            Completion::Mint { draft, owner } => {
                let token = CreatedToken {
                    id: Uuid::new_v4(),
                    name: draft.name.trim().to_string(),
                    ticker: draft.ticker.trim().to_string(),
                    decimals: draft
                        .decimals
                        .and_then(|d| u8::try_from(d).ok())
                        .unwrap_or_default(),
                    total_supply_units: draft.total_supply_units.unwrap_or_default(),
                    owner,
                    message_hash: message.payload_hash(),
                    transaction_boc: signed.boc.clone(),
                    created_at: Utc::now(),
                    jetton_address: None,
                };
                let token_id = token.id;
                if let Err(e) = self.repository.add(token).await {
                    error!("Failed to record created token {}: {}", token_id, e);
                }

                session.wizard.reset();
                self.events.publish(SubmissionEvent::WizardReset {
                    generation: session.wizard.generation(),
                });
                Some(token_id)
            }
            Completion::Swap => None,
        };

        let receipt = SubmissionReceipt {
            submission_id: id,
            kind,
            token_id,
            destination: message.destination,
            payload_hash: message.payload_hash(),
            transaction_boc: signed.boc,
        };

        self.set_phase(&mut session, id, SubmissionPhase::Succeeded);
        session.last_error = None;
        session.last_receipt = Some(receipt.clone());
        self.events.publish(SubmissionEvent::Succeeded {
            submission_id: id,
            kind,
            token_id,
        });
        info!("Submission {} ({}) succeeded", id, kind);

        Ok(receipt)
    }
}

fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
