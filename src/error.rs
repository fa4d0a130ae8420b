//! Crate-wide error types and the structured error payload returned to
//! clients.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::query::errors::MalformedQuery;
use crate::store::StoreError;

/// Result alias for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;

/// Payload key listing fields the record type does not expose.
pub const UNKNOWN_FIELDS: &str = "unknown_fields";
/// Payload key for required-one-of violations.
pub const AT_LEAST_ONE_REQUIRED: &str = "at_least_one_required";
/// Payload key for errors not tied to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// A single accumulated validation failure.
///
/// Unlike [`MalformedQuery`], these never abort validation early; the
/// pipeline collects every one of them before answering.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is not declared on the record type or is not viewable.
    #[error("unknown field '{field}'")]
    UnknownField { field: String },
    /// Value could not be coerced to the field's declared kind.
    #[error("{key}: {message}")]
    InvalidValue { key: String, message: String },
    /// None of the fields in a required-one-of group is populated.
    #[error("at least one of {fields:?} is required")]
    ValueGroupViolation { fields: Vec<String> },
    /// A lower-bound field holds a value greater than its paired field.
    #[error("'{lower}' must not be later than '{higher}'")]
    OrderViolation { lower: String, higher: String },
    /// A year-month lies after the current month.
    #[error("'{field}' cannot be in the future")]
    FutureDateViolation { field: String },
    /// The record collides with an existing one on a unique key.
    #[error("{message}")]
    IntegrityConflict { message: String },
}

impl ValidationError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnknownField { .. } => "UnknownField",
            ValidationError::InvalidValue { .. } => "InvalidValue",
            ValidationError::ValueGroupViolation { .. } => "ValueGroupViolation",
            ValidationError::OrderViolation { .. } => "OrderViolation",
            ValidationError::FutureDateViolation { .. } => "FutureDateViolation",
            ValidationError::IntegrityConflict { .. } => "IntegrityConflict",
        }
    }
}

/// One entry in an [`ErrorMap`] list: either prose or a group of field names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    /// Human-readable message.
    Message(String),
    /// Field names that belong together, e.g. a required-one-of group.
    Fields(Vec<String>),
}

/// Error payload keyed by field name or category.
///
/// Serializes to `{"<key>": [<detail>, ...], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorMap(BTreeMap<String, Vec<ErrorDetail>>);

impl ErrorMap {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when no error has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Routes a validation error to its payload key.
    pub fn push(&mut self, err: ValidationError) {
        match err {
            ValidationError::UnknownField { field } => {
                self.push_unique(UNKNOWN_FIELDS, ErrorDetail::Message(field));
            }
            ValidationError::InvalidValue { key, message } => {
                self.push_unique(&key, ErrorDetail::Message(message));
            }
            ValidationError::ValueGroupViolation { fields } => {
                self.push_unique(AT_LEAST_ONE_REQUIRED, ErrorDetail::Fields(fields));
            }
            err @ ValidationError::OrderViolation { .. } => {
                self.push_unique(NON_FIELD_ERRORS, ErrorDetail::Message(err.to_string()));
            }
            ValidationError::FutureDateViolation { field } => {
                let message = format!("'{field}' cannot be in the future");
                self.push_unique(&field, ErrorDetail::Message(message));
            }
            ValidationError::IntegrityConflict { message } => {
                self.push_unique(NON_FIELD_ERRORS, ErrorDetail::Message(message));
            }
        }
    }

    /// Folds every error of an iterator into the payload.
    pub fn extend(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        for err in errors {
            self.push(err);
        }
    }

    /// Moves all entries of `other` into `self`.
    pub fn merge(&mut self, other: ErrorMap) {
        for (key, details) in other.0 {
            for detail in details {
                self.push_unique(&key, detail);
            }
        }
    }

    /// Entries recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&[ErrorDetail]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Iterates keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Renders the payload as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn push_unique(&mut self, key: &str, detail: ErrorDetail) {
        let entry = self.0.entry(key.to_owned()).or_default();
        if !entry.contains(&detail) {
            entry.push(detail);
        }
    }
}

impl fmt::Display for ErrorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl FromIterator<ValidationError> for ErrorMap {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        let mut map = ErrorMap::new();
        map.extend(iter);
        map
    }
}

/// Top-level error surfaced by [`crate::gate::Gate`].
#[derive(Debug, Error)]
pub enum GateError {
    /// Query structure is invalid; nothing was validated.
    #[error(transparent)]
    Malformed(#[from] MalformedQuery),
    /// Unknown fields or invalid values; the store was not queried.
    #[error("validation failed: {0}")]
    Invalid(ErrorMap),
    /// Caller lacks the listed permissions; `errors` carries any validation
    /// problems found alongside.
    #[error("forbidden: missing {missing:?}")]
    Forbidden {
        /// Exact permission identifiers the caller does not hold.
        missing: BTreeSet<String>,
        /// Validation errors detected in the same pass.
        errors: ErrorMap,
    },
    /// Record type name was not found in the schema.
    #[error("unknown record type '{0}'")]
    UnknownType(String),
    /// Storage collaborator failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GateError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::Malformed(_) => "MalformedQuery",
            GateError::Invalid(_) => "ValidationFailed",
            GateError::Forbidden { .. } => "Forbidden",
            GateError::UnknownType(_) => "UnknownType",
            GateError::Store(_) => "StoreError",
            GateError::Config(_) => "ConfigError",
        }
    }

    /// Client-facing payload for the error.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            GateError::Invalid(errors) => errors.to_json(),
            GateError::Forbidden { missing, errors } => {
                let mut payload = errors.to_json();
                if let serde_json::Value::Object(map) = &mut payload {
                    map.insert(
                        "missing_permissions".to_owned(),
                        serde_json::Value::from(missing.iter().cloned().collect::<Vec<_>>()),
                    );
                }
                payload
            }
            other => serde_json::json!({ NON_FIELD_ERRORS: [other.to_string()] }),
        }
    }
}
