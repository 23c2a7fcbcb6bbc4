//! Parsing and validation of job criteria
//!
//! Criteria reach jobs as strings from the dispatcher and are validated
//! before any selection or mutation happens.

use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;
use validator::{Validate, ValidationError};

static WHOLE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// Parse a non-negative whole number, ignoring surrounding whitespace.
/// Digit strings too large for `u64` saturate to `u64::MAX`.
pub fn parse_whole_number(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if WHOLE_NUMBER.is_match(trimmed) {
        Some(trimmed.parse().unwrap_or(u64::MAX))
    } else {
        None
    }
}

/// Parse a whole-number percentage in `0..=100`.
pub fn parse_percentage(raw: &str) -> Option<u64> {
    parse_whole_number(raw).filter(|p| *p <= 100)
}

fn validate_count(raw: &str) -> Result<(), ValidationError> {
    match parse_whole_number(raw) {
        Some(_) => Ok(()),
        None => {
            let mut error = ValidationError::new("whole_number");
            error.message = Some("Count needs to be a valid number".into());
            error.add_param("value".into(), &raw);
            Err(error)
        }
    }
}

fn validate_percentage(raw: &str) -> Result<(), ValidationError> {
    match parse_percentage(raw) {
        Some(_) => Ok(()),
        None => {
            let mut error = ValidationError::new("percentage");
            error.message = Some("Count needs to be an integer from 0 to 100".into());
            error.add_param("value".into(), &raw);
            Err(error)
        }
    }
}

fn validate_disable_scope(raw: &str) -> Result<(), ValidationError> {
    match raw.parse::<DisableScope>() {
        Ok(_) => Ok(()),
        Err(()) => {
            let mut error = ValidationError::new("disable_scope");
            error.message = Some(
                "Criteria must be one of on, pre_enabled, on_or_pre_enabled, prelive_or_live"
                    .into(),
            );
            error.add_param("value".into(), &raw);
            Err(error)
        }
    }
}

/// Explicit number of TLOs to enable.
#[derive(Debug, Clone, Validate)]
pub struct CountCriteria {
    #[validate(custom = "validate_count")]
    pub count: String,
}

impl CountCriteria {
    pub fn new(raw: &str) -> Self {
        Self {
            count: raw.to_owned(),
        }
    }

    pub fn value(&self) -> Option<u64> {
        parse_whole_number(&self.count)
    }
}

/// Share of the eligible pool to enable.
#[derive(Debug, Clone, Validate)]
pub struct PercentageCriteria {
    #[validate(custom = "validate_percentage")]
    pub percentage: String,
}

impl PercentageCriteria {
    pub fn new(raw: &str) -> Self {
        Self {
            percentage: raw.to_owned(),
        }
    }

    pub fn value(&self) -> Option<u64> {
        parse_percentage(&self.percentage)
    }

    /// `round(pool_size * percentage / 100)`, rounding halves up.
    pub fn count_for_pool(&self, pool_size: u64) -> Option<u64> {
        self.value()
            .map(|percentage| ((pool_size as f64 * percentage as f64) / 100.0).round() as u64)
    }
}

/// Which TLOs a disabler visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableScope {
    /// TLOs with the feature `ENABLED`
    On,
    /// TLOs with the feature `PRE_ENABLED`
    PreEnabled,
    /// TLOs with any row for the feature
    OnOrPreEnabled,
    /// Every live or prelive TLO; those without a row are skipped
    PreliveOrLive,
}

impl FromStr for DisableScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "on" => Ok(DisableScope::On),
            "pre_enabled" => Ok(DisableScope::PreEnabled),
            "on_or_pre_enabled" => Ok(DisableScope::OnOrPreEnabled),
            "prelive_or_live" => Ok(DisableScope::PreliveOrLive),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct DisableCriteria {
    #[validate(custom = "validate_disable_scope")]
    pub criteria: String,
}

impl DisableCriteria {
    pub fn new(raw: &str) -> Self {
        Self {
            criteria: raw.to_owned(),
        }
    }

    pub fn scope(&self) -> Option<DisableScope> {
        self.criteria.parse().ok()
    }
}
