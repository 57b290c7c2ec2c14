//! Domain models and business logic for PII pattern matching.
//!
//! The registry is a fixed, ordered catalog of categories. Each category is a
//! list of small rules (pattern, optional nearby label, optional validator)
//! rather than one monolithic expression.

pub mod checks;
pub mod registry;
pub mod rule;

pub use registry::{all_categories, category, list_categories, PiiCategory};
pub use rule::{Check, ContextRequirement, Rule, RuleOutcome};

use crate::error::RedactorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Trait for anything that finds candidate spans in page text.
pub trait PatternMatcher: Send + Sync {
    /// Accepted byte ranges, in text order.
    fn find_spans(&self, text: &str) -> Vec<Range<usize>>;
}

/// Entitlement level controlling which categories are scanned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => f.write_str("free"),
            Self::Premium => f.write_str("premium"),
        }
    }
}

impl FromStr for Tier {
    type Err = RedactorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => Err(RedactorError::InvalidInput {
                parameter: "tier".to_string(),
                reason: format!("unknown tier '{}', expected 'free' or 'premium'", other),
            }),
        }
    }
}

/// Identifier of a PII category, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiKind {
    SsnFull,
    SsnPartial,
    DateOfBirth,
    PhoneNumber,
    EmailAddress,
    DriversLicense,
    AccountNumber,
    StreetAddress,
    ZipCode,
    CreditCard,
}

impl PiiKind {
    pub const ALL: [PiiKind; 10] = [
        PiiKind::SsnFull,
        PiiKind::SsnPartial,
        PiiKind::DateOfBirth,
        PiiKind::PhoneNumber,
        PiiKind::EmailAddress,
        PiiKind::DriversLicense,
        PiiKind::AccountNumber,
        PiiKind::StreetAddress,
        PiiKind::ZipCode,
        PiiKind::CreditCard,
    ];

    /// Stable string identifier, e.g. `SSN_FULL`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SsnFull => "SSN_FULL",
            Self::SsnPartial => "SSN_PARTIAL",
            Self::DateOfBirth => "DATE_OF_BIRTH",
            Self::PhoneNumber => "PHONE_NUMBER",
            Self::EmailAddress => "EMAIL_ADDRESS",
            Self::DriversLicense => "DRIVERS_LICENSE",
            Self::AccountNumber => "ACCOUNT_NUMBER",
            Self::StreetAddress => "STREET_ADDRESS",
            Self::ZipCode => "ZIP_CODE",
            Self::CreditCard => "CREDIT_CARD",
        }
    }
}

impl fmt::Display for PiiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PiiKind {
    type Err = RedactorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| RedactorError::InvalidInput {
                parameter: "category".to_string(),
                reason: format!("unknown category '{}'", s),
            })
    }
}
