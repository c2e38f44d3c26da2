//! Non-negative amounts in smallest units
//!
//! Conversions from user-entered decimals never go through floating point.

use crate::error::{LaunchError, LaunchResult};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Decimals of the native coin
pub const TON_DECIMALS: u32 = 9;

/// Largest decimals value a jetton may declare
/// Largest value a coins (VarUInteger 16) field can carry
pub const MAX_COINS: u128 = (1u128 << 120) - 1;

pub const MAX_DECIMALS: u32 = 18;

/// Integer amount in the smallest unit of some token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub const fn from_units(units: u128) -> Self {
        Amount(units)
    }

    pub fn units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Convert a decimal quantity into smallest units at `decimals` places.
    ///
    /// Negative values, and values with more fractional digits than the
    /// token supports, are rejected rather than rounded.
    pub fn from_decimal(field: &str, value: Decimal, decimals: u32) -> LaunchResult<Self> {
        if decimals > MAX_DECIMALS {
            return Err(LaunchError::field(
                "decimals",
                format!("must be at most {}", MAX_DECIMALS),
            ));
        }
        if value.is_sign_negative() && !value.is_zero() {
            return Err(LaunchError::field(field, "must not be negative"));
        }

        let value = value.normalize();
        if value.scale() > decimals {
            return Err(LaunchError::field(
                field,
                format!("has more than {} decimal places", decimals),
            ));
        }

        // mantissa * 10^(decimals - scale), exact
        let mantissa = value.mantissa() as u128;
        let factor = 10u128
            .checked_pow(decimals - value.scale())
            .ok_or_else(|| LaunchError::field(field, "is too large"))?;
        mantissa
            .checked_mul(factor)
            .map(Amount)
            .ok_or_else(|| LaunchError::field(field, "is too large"))
    }

    /// Native coin amount from a decimal TON value
    pub fn from_ton(field: &str, value: Decimal) -> LaunchResult<Self> {
        Self::from_decimal(field, value, TON_DECIMALS)
    }

    /// Whole token units scaled to smallest units (`units * 10^decimals`)
    pub fn scale_units(field: &str, units: u64, decimals: u32) -> LaunchResult<Self> {
        if decimals > MAX_DECIMALS {
            return Err(LaunchError::field(
                "decimals",
                format!("must be at most {}", MAX_DECIMALS),
            ));
        }
        10u128
            .checked_pow(decimals)
            .and_then(|factor| (units as u128).checked_mul(factor))
            .map(Amount)
            .ok_or_else(|| LaunchError::field(field, "is too large"))
    }

    /// Back to a human decimal at `decimals` places, when representable
    pub fn to_decimal(&self, decimals: u32) -> Option<Decimal> {
        let mantissa = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(mantissa, decimals).ok()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Wallet protocols carry amounts as decimal strings
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>()
            .map(Amount)
            .map_err(serde::de::Error::custom)
    }
}
