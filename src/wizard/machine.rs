//! Wizard state machine
//!
//! Identity -> Social -> Liquidity -> Review. Moving forward validates the
//! fields owned by the step being left; moving back never validates and is
//! never blocked. The terminal "submitted" state is only reached through the
//! submission coordinator, which resets the machine on success.

use super::draft::{DraftPatch, TokenDraft};
use super::schema;
use crate::error::{LaunchError, LaunchResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Identity,
    Social,
    Liquidity,
    Review,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::Identity,
        WizardStep::Social,
        WizardStep::Liquidity,
        WizardStep::Review,
    ];

    /// 1-based position shown to the user
    pub fn index(&self) -> u8 {
        match self {
            WizardStep::Identity => 1,
            WizardStep::Social => 2,
            WizardStep::Liquidity => 3,
            WizardStep::Review => 4,
        }
    }

    pub fn next(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Identity => Some(WizardStep::Social),
            WizardStep::Social => Some(WizardStep::Liquidity),
            WizardStep::Liquidity => Some(WizardStep::Review),
            WizardStep::Review => None,
        }
    }

    pub fn previous(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Identity => None,
            WizardStep::Social => Some(WizardStep::Identity),
            WizardStep::Liquidity => Some(WizardStep::Social),
            WizardStep::Review => Some(WizardStep::Liquidity),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStep::Identity => "identity",
            WizardStep::Social => "social",
            WizardStep::Liquidity => "liquidity",
            WizardStep::Review => "review",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds the draft and the current step for one wizard session
#[derive(Debug, Clone)]
pub struct WizardStateMachine {
    step: WizardStep,
    draft: TokenDraft,
    /// Bumped on every reset so late submission results can be discarded
    generation: u64,
}

impl WizardStateMachine {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Identity,
            draft: TokenDraft::default(),
            generation: 0,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// The accumulated draft; the review step displays exactly this
    pub fn draft(&self) -> &TokenDraft {
        &self.draft
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Merge `patch`, validate the current step and advance.
    ///
    /// On validation failure the step does not change; the merged input is
    /// kept so the form still shows what the user typed.
    pub fn next(&mut self, patch: DraftPatch) -> LaunchResult<WizardStep> {
        let target = self
            .step
            .next()
            .ok_or_else(|| LaunchError::InvalidStateTransition {
                from: self.step.to_string(),
                to: "submitted".to_string(),
            })?;

        self.draft.merge(patch);

        if let Err(e) = schema::validate_step(self.step, &self.draft) {
            debug!("Step {} rejected: {}", self.step, e);
            crate::metrics::record_wizard_transition(self.step, "rejected");
            return Err(e);
        }

        debug!("Wizard advanced {} -> {}", self.step, target);
        crate::metrics::record_wizard_transition(self.step, "next");
        self.step = target;
        Ok(self.step)
    }

    /// Merge any in-progress edits and step back. Never validates.
    pub fn back(&mut self, patch: Option<DraftPatch>) -> WizardStep {
        if let Some(patch) = patch {
            self.draft.merge(patch);
        }
        if let Some(previous) = self.step.previous() {
            debug!("Wizard moved back {} -> {}", self.step, previous);
            crate::metrics::record_wizard_transition(self.step, "back");
            self.step = previous;
        }
        self.step
    }

    /// Start over with an empty draft
    pub fn reset(&mut self) {
        self.step = WizardStep::Identity;
        self.draft = TokenDraft::default();
        self.generation += 1;
        debug!("Wizard reset (generation {})", self.generation);
    }
}

impl Default for WizardStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::draft::FeeConfigPatch;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn identity_patch() -> DraftPatch {
        DraftPatch {
            name: Some("Tonger".into()),
            ticker: Some("TGR".into()),
            description: Some("The tonger token".into()),
            decimals: Some(9),
            total_supply_units: Some(1_000_000_000),
            ..Default::default()
        }
    }

    fn social_patch() -> DraftPatch {
        DraftPatch {
            telegram: Some("https://t.me/tonger".into()),
            website: Some("https://tonger.example".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_happy_path_reaches_review() {
        let mut wizard = WizardStateMachine::new();
        assert_eq!(wizard.next(identity_patch()).unwrap(), WizardStep::Social);
        assert_eq!(wizard.next(social_patch()).unwrap(), WizardStep::Liquidity);
        assert_eq!(
            wizard
                .next(DraftPatch {
                    liquidity_reserve_amount: Some(Decimal::from_str("1.5").unwrap()),
                    ..Default::default()
                })
                .unwrap(),
            WizardStep::Review
        );
        assert_eq!(wizard.step().index(), 4);
    }

    #[test]
    fn test_back_restores_everything_entered() {
        let mut wizard = WizardStateMachine::new();
        wizard.next(identity_patch()).unwrap();
        wizard.next(social_patch()).unwrap();
        assert_eq!(wizard.back(None), WizardStep::Social);
        assert_eq!(wizard.back(None), WizardStep::Identity);

        let mut expected = TokenDraft::default();
        expected.merge(identity_patch());
        expected.merge(social_patch());
        assert_eq!(wizard.draft(), &expected);
    }

    #[test]
    fn test_back_keeps_unvalidated_edits() {
        let mut wizard = WizardStateMachine::new();
        wizard.next(identity_patch()).unwrap();
        wizard.next(social_patch()).unwrap();

        // Invalid liquidity typed on step 3, then back: not lost, not blocked
        let step = wizard.back(Some(DraftPatch {
            liquidity_reserve_amount: Some(Decimal::from_str("0.01").unwrap()),
            ..Default::default()
        }));
        assert_eq!(step, WizardStep::Social);
        assert_eq!(
            wizard.draft().liquidity_reserve_amount,
            Some(Decimal::from_str("0.01").unwrap())
        );
    }

    #[test]
    fn test_back_on_first_step_is_a_no_op() {
        let mut wizard = WizardStateMachine::new();
        assert_eq!(wizard.back(None), WizardStep::Identity);
    }

    #[test]
    fn test_liquidity_below_minimum_stays_on_step_three() {
        let mut wizard = WizardStateMachine::new();
        wizard.next(identity_patch()).unwrap();
        wizard.next(social_patch()).unwrap();

        let err = wizard
            .next(DraftPatch {
                liquidity_reserve_amount: Some(Decimal::from_str("0.05").unwrap()),
                ..Default::default()
            })
            .unwrap_err();

        assert_eq!(err.field_errors()[0].field, "liquidity_reserve_amount");
        assert_eq!(wizard.step(), WizardStep::Liquidity);
        assert_eq!(wizard.step().index(), 3);
    }

    #[test]
    fn test_decimals_out_of_range_rejected_at_identity() {
        let mut wizard = WizardStateMachine::new();
        let err = wizard
            .next(DraftPatch {
                decimals: Some(19),
                ..identity_patch()
            })
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "decimals");
        assert_eq!(wizard.step(), WizardStep::Identity);
    }

    #[test]
    fn test_encoding_limits_checked_on_owning_steps() {
        let mut wizard = WizardStateMachine::new();
        let err = wizard
            .next(DraftPatch {
                decimals: Some(18),
                total_supply_units: Some(u64::MAX),
                ..identity_patch()
            })
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "total_supply_units");
        assert_eq!(wizard.step(), WizardStep::Identity);

        wizard.next(identity_patch()).unwrap();
        wizard.next(social_patch()).unwrap();
        let err = wizard
            .next(DraftPatch {
                liquidity_reserve_amount: Some(Decimal::from_str("0.1000000001").unwrap()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "liquidity_reserve_amount");
        assert_eq!(wizard.step(), WizardStep::Liquidity);
    }

    #[test]
    fn test_fee_toggle_validated_on_liquidity_step() {
        let mut wizard = WizardStateMachine::new();
        wizard.next(identity_patch()).unwrap();
        wizard.next(DraftPatch::default()).unwrap();

        let err = wizard
            .next(DraftPatch {
                liquidity_reserve_amount: Some(Decimal::ONE),
                fee_config: Some(FeeConfigPatch {
                    enabled: Some(true),
                    percent: Some(Decimal::from(2)),
                    recipient_address: None,
                }),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "fee_config.recipient_address");
        assert_eq!(wizard.step(), WizardStep::Liquidity);
    }

    #[test]
    fn test_next_on_review_is_invalid() {
        let mut wizard = WizardStateMachine::new();
        wizard.next(identity_patch()).unwrap();
        wizard.next(DraftPatch::default()).unwrap();
        wizard
            .next(DraftPatch {
                liquidity_reserve_amount: Some(Decimal::ONE),
                ..Default::default()
            })
            .unwrap();

        let before = wizard.draft().clone();
        let err = wizard
            .next(DraftPatch {
                name: Some("Changed".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, LaunchError::InvalidStateTransition { .. }));
        assert_eq!(wizard.draft(), &before);
    }

    #[test]
    fn test_reset_clears_draft_and_bumps_generation() {
        let mut wizard = WizardStateMachine::new();
        wizard.next(identity_patch()).unwrap();
        wizard.reset();

        assert_eq!(wizard.step(), WizardStep::Identity);
        assert_eq!(wizard.draft(), &TokenDraft::default());
        assert_eq!(wizard.generation(), 1);
    }
}
