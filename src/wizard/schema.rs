//! Static per-step validation schema
//!
//! Each wizard step owns a list of field rules. A rule may be gated on a
//! toggle field, in which case its checks only run while the toggle is on.

use super::draft::{Field, FieldValue, TokenDraft};
use super::machine::WizardStep;
use crate::cell::Address;
use crate::error::{FieldError, LaunchError, LaunchResult};
use crate::tx::amount::{MAX_COINS, TON_DECIMALS};

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub const MAX_NAME_CHARS: usize = 20;
pub const MAX_TICKER_CHARS: usize = 10;
pub const MAX_DESCRIPTION_CHARS: usize = 240;
pub const MAX_DECIMALS: i64 = 18;

/// Declarative check applied to one field
#[derive(Debug)]
pub enum Check {
    Required,
    Min(Decimal),
    Max(Decimal),
    MaxLength(usize),
    /// At most this many fractional digits
    MaxScale(u32),
    /// Whole units times 10^decimals must fit a coins field
    FitsCoins { decimals: Field },
    Pattern {
        regex: Regex,
        message: &'static str,
    },
    /// Must parse as a chain address
    Address,
}

#[derive(Debug)]
pub struct FieldRule {
    pub field: Field,
    /// Toggle that enables this rule
    pub when: Option<Field>,
    pub checks: Vec<Check>,
}

impl FieldRule {
    fn new(field: Field, checks: Vec<Check>) -> Self {
        Self {
            field,
            when: None,
            checks,
        }
    }

    fn when(mut self, toggle: Field) -> Self {
        self.when = Some(toggle);
        self
    }
}

fn pattern(expr: &str, message: &'static str) -> Check {
    Check::Pattern {
        regex: Regex::new(expr).expect("static validation pattern"),
        message,
    }
}

lazy_static! {
    static ref IDENTITY_RULES: Vec<FieldRule> = vec![
        FieldRule::new(
            Field::Name,
            vec![Check::Required, Check::MaxLength(MAX_NAME_CHARS)],
        ),
        FieldRule::new(
            Field::Ticker,
            vec![
                Check::Required,
                Check::MaxLength(MAX_TICKER_CHARS),
                pattern(r"^[A-Za-z0-9]+$", "must contain only letters and digits"),
            ],
        ),
        FieldRule::new(
            Field::Description,
            vec![Check::MaxLength(MAX_DESCRIPTION_CHARS)],
        ),
        FieldRule::new(
            Field::IconUrl,
            vec![pattern(
                r"^(data:image/[A-Za-z0-9.+-]+;base64,|https?://)\S+$",
                "must be an image data URI or an http(s) URL",
            )],
        ),
        FieldRule::new(
            Field::Decimals,
            vec![
                Check::Required,
                Check::Min(Decimal::ZERO),
                Check::Max(Decimal::from(MAX_DECIMALS)),
            ],
        ),
        FieldRule::new(
            Field::TotalSupplyUnits,
            vec![
                Check::Required,
                Check::Min(Decimal::ONE),
                Check::FitsCoins {
                    decimals: Field::Decimals,
                },
            ],
        ),
    ];

    static ref SOCIAL_RULES: Vec<FieldRule> = [Field::Telegram, Field::Twitter, Field::Website]
        .into_iter()
        .map(|field| {
            FieldRule::new(
                field,
                vec![pattern(r"^https?://\S+$", "must be an http(s) URL")],
            )
        })
        .collect();

    static ref LIQUIDITY_RULES: Vec<FieldRule> = vec![
        FieldRule::new(
            Field::LiquidityReserveAmount,
            vec![
                Check::Required,
                Check::Min(Decimal::new(1, 1)),
                Check::MaxScale(TON_DECIMALS),
            ],
        ),
        FieldRule::new(
            Field::FeePercent,
            vec![
                Check::Required,
                Check::Min(Decimal::ZERO),
                Check::Max(Decimal::from(10)),
            ],
        )
        .when(Field::FeeEnabled),
        FieldRule::new(
            Field::FeeRecipientAddress,
            vec![Check::Required, Check::Address],
        )
        .when(Field::FeeEnabled),
        FieldRule::new(
            Field::BurnPercent,
            vec![
                Check::Required,
                Check::Min(Decimal::ZERO),
                Check::Max(Decimal::from(5)),
            ],
        )
        .when(Field::BurnEnabled),
        FieldRule::new(
            Field::StakingApyPercent,
            vec![
                Check::Required,
                Check::Min(Decimal::ZERO),
                Check::Max(Decimal::from(100)),
            ],
        )
        .when(Field::StakingEnabled),
    ];
}

/// Rules owned by a step; the review step owns none
pub fn rules_for(step: WizardStep) -> &'static [FieldRule] {
    match step {
        WizardStep::Identity => IDENTITY_RULES.as_slice(),
        WizardStep::Social => SOCIAL_RULES.as_slice(),
        WizardStep::Liquidity => LIQUIDITY_RULES.as_slice(),
        WizardStep::Review => &[],
    }
}

/// Validate the fields owned by `step`
pub fn validate_step(step: WizardStep, draft: &TokenDraft) -> LaunchResult<()> {
    let errors: Vec<FieldError> = rules_for(step)
        .iter()
        .filter_map(|rule| evaluate(rule, draft))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LaunchError::Validation(errors))
    }
}

/// Validate every step's fields
pub fn validate_all(draft: &TokenDraft) -> LaunchResult<()> {
    let errors: Vec<FieldError> = WizardStep::ALL
        .iter()
        .flat_map(|step| rules_for(*step).iter())
        .filter_map(|rule| evaluate(rule, draft))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LaunchError::Validation(errors))
    }
}

/// First failing check of a rule, if any
fn evaluate(rule: &FieldRule, draft: &TokenDraft) -> Option<FieldError> {
    if let Some(toggle) = rule.when {
        if draft.value(toggle) != FieldValue::Flag(true) {
            return None;
        }
    }

    let value = draft.value(rule.field);
    let present = !matches!(value, FieldValue::Text(None) | FieldValue::Number(None));

    for check in &rule.checks {
        let failure = match (check, value) {
            (Check::Required, _) if !present => Some("is required".to_string()),
            // Optional and absent: nothing else to check
            (_, _) if !present => return None,
            (Check::Min(min), FieldValue::Number(Some(n))) if n < *min => {
                Some(format!("must be at least {}", min))
            }
            (Check::Max(max), FieldValue::Number(Some(n))) if n > *max => {
                Some(format!("must be at most {}", max))
            }
            (Check::MaxLength(max), FieldValue::Text(Some(s))) if s.chars().count() > *max => {
                Some(format!("must be at most {} characters", max))
            }
            (Check::MaxScale(max), FieldValue::Number(Some(n))) if n.normalize().scale() > *max => {
                Some(format!("must have at most {} decimal places", max))
            }
            (Check::FitsCoins { decimals }, FieldValue::Number(Some(n))) => {
                match draft.value(*decimals) {
                    FieldValue::Number(Some(d)) if exceeds_coins(n, d) => Some(
                        "exceeds the largest representable supply for these decimals".to_string(),
                    ),
                    _ => None,
                }
            }
            (Check::Pattern { regex, message }, FieldValue::Text(Some(s)))
                if !regex.is_match(s) =>
            {
                Some(message.to_string())
            }
            (Check::Address, FieldValue::Text(Some(s))) => match Address::parse(s) {
                Ok(_) => None,
                Err(LaunchError::AddressFormat { reason, .. }) => {
                    Some(format!("is not a valid address: {}", reason))
                }
                Err(e) => Some(e.to_string()),
            },
            _ => None,
        };

        if let Some(message) = failure {
            return Some(FieldError::new(rule.field.as_str(), message));
        }
    }

    None
}

/// Decimals outside 0..=18 are reported by their own rule
fn exceeds_coins(units: Decimal, decimals: Decimal) -> bool {
    let (Some(units), Some(decimals)) = (units.to_u128(), decimals.to_u32()) else {
        return false;
    };
    if decimals > MAX_DECIMALS as u32 {
        return false;
    }
    10u128
        .checked_pow(decimals)
        .and_then(|factor| units.checked_mul(factor))
        .map_or(true, |scaled| scaled > MAX_COINS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::draft::{BurnConfig, FeeConfig, StakingConfig};
    use std::str::FromStr;

    fn identity_draft() -> TokenDraft {
        TokenDraft {
            name: "Tonger".into(),
            ticker: "TGR".into(),
            decimals: Some(9),
            total_supply_units: Some(1_000_000_000),
            ..Default::default()
        }
    }

    fn fields(result: LaunchResult<()>) -> Vec<String> {
        result
            .unwrap_err()
            .field_errors()
            .iter()
            .map(|e| e.field.clone())
            .collect()
    }

    #[test]
    fn test_identity_accepts_valid_draft() {
        assert!(validate_step(WizardStep::Identity, &identity_draft()).is_ok());
    }

    #[test]
    fn test_identity_requires_name_and_ticker() {
        let draft = TokenDraft {
            name: "   ".into(),
            ..identity_draft()
        };
        let draft = TokenDraft {
            ticker: String::new(),
            ..draft
        };
        assert_eq!(
            fields(validate_step(WizardStep::Identity, &draft)),
            vec!["name", "ticker"]
        );
    }

    #[test]
    fn test_length_caps_count_characters() {
        let draft = TokenDraft {
            // 20 multi-byte characters is still within the cap
            name: "ё".repeat(20),
            ..identity_draft()
        };
        assert!(validate_step(WizardStep::Identity, &draft).is_ok());

        let draft = TokenDraft {
            name: "a".repeat(21),
            ticker: "ABCDEFGHIJK".into(),
            description: "d".repeat(241),
            ..identity_draft()
        };
        assert_eq!(
            fields(validate_step(WizardStep::Identity, &draft)),
            vec!["name", "ticker", "description"]
        );
    }

    #[test]
    fn test_decimals_bounds() {
        for decimals in [19, -1] {
            let draft = TokenDraft {
                decimals: Some(decimals),
                ..identity_draft()
            };
            let err = validate_step(WizardStep::Identity, &draft).unwrap_err();
            assert_eq!(err.field_errors()[0].field, "decimals");
        }
        for decimals in [0, 18] {
            let draft = TokenDraft {
                decimals: Some(decimals),
                ..identity_draft()
            };
            assert!(validate_step(WizardStep::Identity, &draft).is_ok());
        }
    }

    #[test]
    fn test_icon_must_be_data_uri_or_url() {
        let mut draft = identity_draft();
        draft.icon_url = Some("data:image/png;base64,iVBORw0KGgo=".into());
        assert!(validate_step(WizardStep::Identity, &draft).is_ok());

        draft.icon_url = Some("ftp://example.com/icon.png".into());
        assert_eq!(
            fields(validate_step(WizardStep::Identity, &draft)),
            vec!["icon_url"]
        );
    }

    #[test]
    fn test_social_links_are_optional_urls() {
        let mut draft = TokenDraft::default();
        assert!(validate_step(WizardStep::Social, &draft).is_ok());

        draft.twitter = Some("not a url".into());
        assert_eq!(fields(validate_step(WizardStep::Social, &draft)), vec!["twitter"]);
    }

    #[test]
    fn test_liquidity_minimum() {
        let mut draft = TokenDraft {
            liquidity_reserve_amount: Some(Decimal::from_str("0.05").unwrap()),
            ..Default::default()
        };
        let err = validate_step(WizardStep::Liquidity, &draft).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "liquidity_reserve_amount");
        assert_eq!(err.field_errors()[0].message, "must be at least 0.1");

        draft.liquidity_reserve_amount = Some(Decimal::from_str("0.1").unwrap());
        assert!(validate_step(WizardStep::Liquidity, &draft).is_ok());
    }

    #[test]
    fn test_liquidity_reserve_limited_to_nanotons() {
        let mut draft = TokenDraft {
            liquidity_reserve_amount: Some(Decimal::from_str("0.1000000001").unwrap()),
            ..Default::default()
        };
        let err = validate_step(WizardStep::Liquidity, &draft).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "liquidity_reserve_amount");
        assert_eq!(err.field_errors()[0].message, "must have at most 9 decimal places");

        // Trailing zeros do not count
        draft.liquidity_reserve_amount = Some(Decimal::from_str("0.100000000000").unwrap());
        assert!(validate_step(WizardStep::Liquidity, &draft).is_ok());
    }

    #[test]
    fn test_supply_must_fit_coins_at_chosen_decimals() {
        let draft = TokenDraft {
            decimals: Some(18),
            total_supply_units: Some(u64::MAX),
            ..identity_draft()
        };
        assert_eq!(
            fields(validate_step(WizardStep::Identity, &draft)),
            vec!["total_supply_units"]
        );

        let draft = TokenDraft {
            decimals: Some(9),
            total_supply_units: Some(u64::MAX),
            ..identity_draft()
        };
        assert!(validate_step(WizardStep::Identity, &draft).is_ok());
    }

    #[test]
    fn test_toggle_gates_dependent_fields() {
        let mut draft = TokenDraft {
            liquidity_reserve_amount: Some(Decimal::ONE),
            fee_config: Some(FeeConfig {
                enabled: false,
                percent: Some(Decimal::from(50)),
                recipient_address: None,
            }),
            ..Default::default()
        };
        assert!(validate_step(WizardStep::Liquidity, &draft).is_ok());

        draft.fee_config.as_mut().unwrap().enabled = true;
        assert_eq!(
            fields(validate_step(WizardStep::Liquidity, &draft)),
            vec!["fee_config.percent", "fee_config.recipient_address"]
        );

        draft.fee_config = Some(FeeConfig {
            enabled: true,
            percent: Some(Decimal::from(3)),
            recipient_address: Some("not-an-address".into()),
        });
        let err = validate_step(WizardStep::Liquidity, &draft).unwrap_err();
        assert!(err.field_errors()[0].message.starts_with("is not a valid address"));
    }

    #[test]
    fn test_burn_and_staking_bounds() {
        let draft = TokenDraft {
            liquidity_reserve_amount: Some(Decimal::ONE),
            burn_config: Some(BurnConfig {
                enabled: true,
                percent: Some(Decimal::from(6)),
            }),
            staking_config: Some(StakingConfig {
                enabled: true,
                apy_percent: Some(Decimal::from(101)),
            }),
            ..Default::default()
        };
        assert_eq!(
            fields(validate_step(WizardStep::Liquidity, &draft)),
            vec!["burn_config.percent", "staking_config.apy_percent"]
        );
    }

    #[test]
    fn test_review_has_no_rules() {
        assert!(rules_for(WizardStep::Review).is_empty());
        assert!(validate_step(WizardStep::Review, &TokenDraft::default()).is_ok());
    }

    #[test]
    fn test_validate_all_collects_across_steps() {
        let draft = TokenDraft {
            decimals: Some(19),
            ..identity_draft()
        };
        assert_eq!(
            fields(validate_all(&draft)),
            vec!["decimals", "liquidity_reserve_amount"]
        );
    }
}
