#![forbid(unsafe_code)]

//! Cross-field invariants checked on create and update payloads.
//!
//! Rules are configured per record type (see [`crate::config::GateConfig`]):
//! required-one-of groups, ordered field pairs and fields that must not lie
//! in the future. Every rule is evaluated; violations are returned together.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use tracing::debug;

use crate::error::ValidationError;
use crate::query::Value;
use crate::store::Record;
use crate::types::YearMonth;

/// Value-group rules of one record type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueGroupRules {
    /// Groups in which at least one field must be non-null.
    #[serde(default)]
    pub required_one_of: Vec<RequiredOneOf>,
    /// Field pairs whose values must be non-decreasing.
    #[serde(default)]
    pub ordered: Vec<OrderedPair>,
    /// Date or year-month fields that must not be after the current month.
    #[serde(default)]
    pub no_future: Vec<String>,
}

/// A named required-one-of group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredOneOf {
    /// Group identity, used in logs.
    pub name: String,
    /// Member fields in reporting order.
    pub fields: Vec<String>,
}

/// `lower` must not be greater than `higher`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedPair {
    /// Field holding the earlier value.
    pub lower: String,
    /// Field holding the later value.
    pub higher: String,
}

/// Applies [`ValueGroupRules`] to payloads.
#[derive(Debug, Clone)]
pub struct ValueGroupValidator<'a> {
    rules: &'a ValueGroupRules,
    today: Date,
    skipped: BTreeSet<String>,
}

impl<'a> ValueGroupValidator<'a> {
    /// Creates a validator that treats the current UTC date as today.
    pub fn new(rules: &'a ValueGroupRules) -> Self {
        Self {
            rules,
            today: OffsetDateTime::now_utc().date(),
            skipped: BTreeSet::new(),
        }
    }

    /// Overrides the reference date for no-future checks.
    pub fn with_today(mut self, today: Date) -> Self {
        self.today = today;
        self
    }

    /// Leaves out every rule that mentions one of `fields`, typically
    /// fields whose payload value already failed coercion.
    pub fn skip_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skipped.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Checks a payload for a record that does not exist yet.
    pub fn validate_create(&self, payload: &Record) -> Vec<ValidationError> {
        self.check(payload, None)
    }

    /// Checks a partial update against the record it modifies.
    ///
    /// Fields absent from `payload` keep their `existing` value; fields the
    /// payload sets to null count as cleared.
    pub fn validate_update(&self, payload: &Record, existing: &Record) -> Vec<ValidationError> {
        self.check(payload, Some(existing))
    }

    fn check(&self, payload: &Record, existing: Option<&Record>) -> Vec<ValidationError> {
        let lookup = |field: &str| -> Option<&Value> {
            payload
                .get(field)
                .or_else(|| existing.and_then(|record| record.get(field)))
                .filter(|value| !value.is_null())
        };

        let mut errors = Vec::new();
        for group in &self.rules.required_one_of {
            if group.fields.iter().any(|field| self.skipped.contains(field)) {
                continue;
            }
            let mut populated = false;
            for field in &group.fields {
                if lookup(field).is_some() {
                    populated = true;
                    break;
                }
            }
            if !populated {
                debug!(group = %group.name, "value_groups.required_one_of.violated");
                errors.push(ValidationError::ValueGroupViolation {
                    fields: group.fields.clone(),
                });
            }
        }

        for pair in &self.rules.ordered {
            if self.skipped.contains(&pair.lower) || self.skipped.contains(&pair.higher) {
                continue;
            }
            let (Some(lower), Some(higher)) = (lookup(&pair.lower), lookup(&pair.higher)) else {
                continue;
            };
            if temporal(lower).compare(&temporal(higher)) == Some(Ordering::Greater) {
                errors.push(ValidationError::OrderViolation {
                    lower: pair.lower.clone(),
                    higher: pair.higher.clone(),
                });
            }
        }

        let this_month = YearMonth::of_date(self.today);
        for field in &self.rules.no_future {
            if self.skipped.contains(field) {
                continue;
            }
            let Some(value) = payload.get(field) else {
                continue;
            };
            let in_future = match temporal(value) {
                Value::YearMonth(ym) => ym > this_month,
                Value::Date(date) => date > self.today,
                _ => false,
            };
            if in_future {
                errors.push(ValidationError::FutureDateViolation {
                    field: field.clone(),
                });
            }
        }
        errors
    }
}

/// Reads year-month and date strings as their typed values so that
/// ordering is chronological; anything else is returned unchanged.
fn temporal(value: &Value) -> Value {
    if let Value::Text(text) = value {
        if let Ok(ym) = text.parse::<YearMonth>() {
            return Value::YearMonth(ym);
        }
        if let Ok(date) = Date::parse(text, crate::query::validate::DATE_FORMAT) {
            return Value::Date(date);
        }
    }
    value.clone()
}
