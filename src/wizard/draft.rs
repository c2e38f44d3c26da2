//! Token draft accumulated across wizard steps

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Everything the user has entered so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenDraft {
    pub name: String,
    pub ticker: String,
    pub description: String,
    pub icon_url: Option<String>,
    pub telegram: Option<String>,
    pub twitter: Option<String>,
    pub website: Option<String>,
    pub decimals: Option<i64>,
    pub total_supply_units: Option<u64>,
    pub liquidity_reserve_amount: Option<Decimal>,
    pub fee_config: Option<FeeConfig>,
    pub burn_config: Option<BurnConfig>,
    pub staking_config: Option<StakingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub enabled: bool,
    pub percent: Option<Decimal>,
    pub recipient_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurnConfig {
    pub enabled: bool,
    pub percent: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StakingConfig {
    pub enabled: bool,
    pub apy_percent: Option<Decimal>,
}

/// Partial input carried by Next/Back.
///
/// Absent fields leave the draft untouched. An empty string clears an
/// optional text field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftPatch {
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub telegram: Option<String>,
    pub twitter: Option<String>,
    pub website: Option<String>,
    pub decimals: Option<i64>,
    pub total_supply_units: Option<u64>,
    pub liquidity_reserve_amount: Option<Decimal>,
    pub fee_config: Option<FeeConfigPatch>,
    pub burn_config: Option<BurnConfigPatch>,
    pub staking_config: Option<StakingConfigPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfigPatch {
    pub enabled: Option<bool>,
    pub percent: Option<Decimal>,
    pub recipient_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnConfigPatch {
    pub enabled: Option<bool>,
    pub percent: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfigPatch {
    pub enabled: Option<bool>,
    pub apy_percent: Option<Decimal>,
}

/// Draft fields addressable by the validation schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Ticker,
    Description,
    IconUrl,
    Telegram,
    Twitter,
    Website,
    Decimals,
    TotalSupplyUnits,
    LiquidityReserveAmount,
    FeeEnabled,
    FeePercent,
    FeeRecipientAddress,
    BurnEnabled,
    BurnPercent,
    StakingEnabled,
    StakingApyPercent,
}

impl Field {
    /// Name used in field errors (matches the JSON shape of the draft)
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Ticker => "ticker",
            Field::Description => "description",
            Field::IconUrl => "icon_url",
            Field::Telegram => "telegram",
            Field::Twitter => "twitter",
            Field::Website => "website",
            Field::Decimals => "decimals",
            Field::TotalSupplyUnits => "total_supply_units",
            Field::LiquidityReserveAmount => "liquidity_reserve_amount",
            Field::FeeEnabled => "fee_config.enabled",
            Field::FeePercent => "fee_config.percent",
            Field::FeeRecipientAddress => "fee_config.recipient_address",
            Field::BurnEnabled => "burn_config.enabled",
            Field::BurnPercent => "burn_config.percent",
            Field::StakingEnabled => "staking_config.enabled",
            Field::StakingApyPercent => "staking_config.apy_percent",
        }
    }
}

/// Uniform view of a field's current value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// Blank text is reported as `None`
    Text(Option<&'a str>),
    Number(Option<Decimal>),
    Flag(bool),
}

fn text(value: &str) -> FieldValue<'_> {
    let trimmed = value.trim();
    FieldValue::Text((!trimmed.is_empty()).then_some(trimmed))
}

fn opt_text(value: &Option<String>) -> FieldValue<'_> {
    match value {
        Some(v) => text(v),
        None => FieldValue::Text(None),
    }
}

fn merge_text(target: &mut Option<String>, patch: Option<String>) {
    if let Some(value) = patch {
        *target = if value.trim().is_empty() {
            None
        } else {
            Some(value)
        };
    }
}

impl TokenDraft {
    pub fn value(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::Name => text(&self.name),
            Field::Ticker => text(&self.ticker),
            Field::Description => text(&self.description),
            Field::IconUrl => opt_text(&self.icon_url),
            Field::Telegram => opt_text(&self.telegram),
            Field::Twitter => opt_text(&self.twitter),
            Field::Website => opt_text(&self.website),
            Field::Decimals => FieldValue::Number(self.decimals.map(Decimal::from)),
            Field::TotalSupplyUnits => {
                FieldValue::Number(self.total_supply_units.map(Decimal::from))
            }
            Field::LiquidityReserveAmount => FieldValue::Number(self.liquidity_reserve_amount),
            Field::FeeEnabled => FieldValue::Flag(self.fee_enabled()),
            Field::FeePercent => {
                FieldValue::Number(self.fee_config.as_ref().and_then(|c| c.percent))
            }
            Field::FeeRecipientAddress => match &self.fee_config {
                Some(c) => opt_text(&c.recipient_address),
                None => FieldValue::Text(None),
            },
            Field::BurnEnabled => {
                FieldValue::Flag(self.burn_config.as_ref().is_some_and(|c| c.enabled))
            }
            Field::BurnPercent => {
                FieldValue::Number(self.burn_config.as_ref().and_then(|c| c.percent))
            }
            Field::StakingEnabled => {
                FieldValue::Flag(self.staking_config.as_ref().is_some_and(|c| c.enabled))
            }
            Field::StakingApyPercent => {
                FieldValue::Number(self.staking_config.as_ref().and_then(|c| c.apy_percent))
            }
        }
    }

    pub fn fee_enabled(&self) -> bool {
        self.fee_config.as_ref().is_some_and(|c| c.enabled)
    }

    /// Social links in display order, skipping blanks
    pub fn social_links(&self) -> Vec<&str> {
        [&self.telegram, &self.twitter, &self.website]
            .into_iter()
            .filter_map(|link| link.as_deref())
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .collect()
    }

    /// Apply a patch; later values overwrite earlier ones
    pub fn merge(&mut self, patch: DraftPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(ticker) = patch.ticker {
            self.ticker = ticker;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        merge_text(&mut self.icon_url, patch.icon_url);
        merge_text(&mut self.telegram, patch.telegram);
        merge_text(&mut self.twitter, patch.twitter);
        merge_text(&mut self.website, patch.website);

        if patch.decimals.is_some() {
            self.decimals = patch.decimals;
        }
        if patch.total_supply_units.is_some() {
            self.total_supply_units = patch.total_supply_units;
        }
        if patch.liquidity_reserve_amount.is_some() {
            self.liquidity_reserve_amount = patch.liquidity_reserve_amount;
        }

        if let Some(fee) = patch.fee_config {
            let config = self.fee_config.get_or_insert_with(FeeConfig::default);
            if let Some(enabled) = fee.enabled {
                config.enabled = enabled;
            }
            if fee.percent.is_some() {
                config.percent = fee.percent;
            }
            merge_text(&mut config.recipient_address, fee.recipient_address);
        }
        if let Some(burn) = patch.burn_config {
            let config = self.burn_config.get_or_insert_with(BurnConfig::default);
            if let Some(enabled) = burn.enabled {
                config.enabled = enabled;
            }
            if burn.percent.is_some() {
                config.percent = burn.percent;
            }
        }
        if let Some(staking) = patch.staking_config {
            let config = self.staking_config.get_or_insert_with(StakingConfig::default);
            if let Some(enabled) = staking.enabled {
                config.enabled = enabled;
            }
            if staking.apy_percent.is_some() {
                config.apy_percent = staking.apy_percent;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_merge_overwrites_only_supplied_fields() {
        let mut draft = TokenDraft::default();
        draft.merge(DraftPatch {
            name: Some("Tonger".into()),
            ticker: Some("TGR".into()),
            decimals: Some(9),
            ..Default::default()
        });
        draft.merge(DraftPatch {
            ticker: Some("TNG".into()),
            website: Some("https://tonger.example".into()),
            ..Default::default()
        });

        assert_eq!(draft.name, "Tonger");
        assert_eq!(draft.ticker, "TNG");
        assert_eq!(draft.decimals, Some(9));
        assert_eq!(draft.website.as_deref(), Some("https://tonger.example"));
    }

    #[test]
    fn test_empty_string_clears_optional_text() {
        let mut draft = TokenDraft {
            telegram: Some("https://t.me/tonger".into()),
            ..Default::default()
        };
        draft.merge(DraftPatch {
            telegram: Some("  ".into()),
            ..Default::default()
        });
        assert_eq!(draft.telegram, None);
    }

    #[test]
    fn test_toggle_patches_merge_field_by_field() {
        let mut draft = TokenDraft::default();
        draft.merge(DraftPatch {
            fee_config: Some(FeeConfigPatch {
                enabled: Some(true),
                percent: Some(Decimal::from(2)),
                ..Default::default()
            }),
            ..Default::default()
        });
        draft.merge(DraftPatch {
            fee_config: Some(FeeConfigPatch {
                recipient_address: Some("0:abc".into()),
                ..Default::default()
            }),
            ..Default::default()
        });

        let fee = draft.fee_config.as_ref().unwrap();
        assert!(fee.enabled);
        assert_eq!(fee.percent, Some(Decimal::from(2)));
        assert_eq!(fee.recipient_address.as_deref(), Some("0:abc"));
        assert_eq!(draft.value(Field::FeeEnabled), FieldValue::Flag(true));
    }

    #[test]
    fn test_field_values() {
        let draft = TokenDraft {
            name: "  ".into(),
            liquidity_reserve_amount: Some(Decimal::from_str("0.5").unwrap()),
            ..Default::default()
        };
        assert_eq!(draft.value(Field::Name), FieldValue::Text(None));
        assert_eq!(
            draft.value(Field::LiquidityReserveAmount),
            FieldValue::Number(Some(Decimal::from_str("0.5").unwrap()))
        );
        assert_eq!(draft.value(Field::BurnEnabled), FieldValue::Flag(false));
    }

    #[test]
    fn test_patch_deserializes_from_partial_json() {
        let patch: DraftPatch =
            serde_json::from_str(r#"{"name":"Tonger","liquidity_reserve_amount":"0.25"}"#)
                .unwrap();
        assert_eq!(patch.name.as_deref(), Some("Tonger"));
        assert_eq!(
            patch.liquidity_reserve_amount,
            Some(Decimal::from_str("0.25").unwrap())
        );
        assert!(patch.ticker.is_none());
    }
}
