//! Submission lifecycle events
//!
//! The coordinator publishes these on a broadcast channel; the API and logs
//! subscribe. Publishing never blocks and never fails when nobody listens.

use crate::coordination::{SubmissionKind, SubmissionPhase};
use crate::tx::Amount;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SubmissionEvent {
    /// Validation passed and a message is about to be encoded
    Started {
        submission_id: Uuid,
        kind: SubmissionKind,
    },

    PhaseChanged {
        submission_id: Uuid,
        phase: SubmissionPhase,
    },

    /// The wallet has a request to sign
    WalletRequested {
        submission_id: Uuid,
        valid_until: u64,
        value: Amount,
    },

    Succeeded {
        submission_id: Uuid,
        kind: SubmissionKind,
        token_id: Option<Uuid>,
    },

    Failed {
        submission_id: Uuid,
        kind: SubmissionKind,
        error_kind: &'static str,
        message: String,
        retryable: bool,
    },

    /// A wallet result arrived after the wizard was reset
    StaleResultIgnored { submission_id: Uuid },

    WizardReset { generation: u64 },
}

impl SubmissionEvent {
    /// Get event name for metrics and logs
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionEvent::Started { .. } => "started",
            SubmissionEvent::PhaseChanged { .. } => "phase_changed",
            SubmissionEvent::WalletRequested { .. } => "wallet_requested",
            SubmissionEvent::Succeeded { .. } => "succeeded",
            SubmissionEvent::Failed { .. } => "failed",
            SubmissionEvent::StaleResultIgnored { .. } => "stale_result_ignored",
            SubmissionEvent::WizardReset { .. } => "wizard_reset",
        }
    }

    pub fn submission_id(&self) -> Option<Uuid> {
        match self {
            SubmissionEvent::Started { submission_id, .. }
            | SubmissionEvent::PhaseChanged { submission_id, .. }
            | SubmissionEvent::WalletRequested { submission_id, .. }
            | SubmissionEvent::Succeeded { submission_id, .. }
            | SubmissionEvent::Failed { submission_id, .. }
            | SubmissionEvent::StaleResultIgnored { submission_id } => Some(*submission_id),
            SubmissionEvent::WizardReset { .. } => None,
        }
    }

    /// Check if this event ends a submission
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionEvent::Succeeded { .. }
                | SubmissionEvent::Failed { .. }
                | SubmissionEvent::StaleResultIgnored { .. }
        )
    }
}

/// Fan-out of submission events to any number of subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SubmissionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: SubmissionEvent) {
        trace!("Publishing {} event", event.name());
        crate::metrics::record_event(&event);
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubmissionEvent> {
        self.sender.subscribe()
    }
}
