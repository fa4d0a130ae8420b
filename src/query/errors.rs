#![allow(missing_docs)]

use thiserror::Error;

/// Structural problems in a query expression.
///
/// Raised before any field is validated; the `path` names the offending node
/// in `$.<op>[<index>]` notation so clients can locate it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedQuery {
    /// Node is not a JSON object.
    #[error("node at {path} must be an object")]
    NotAnObject { path: String },
    /// Node object does not have exactly one key.
    #[error("node at {path} must have exactly one key (got {count})")]
    KeyCount { path: String, count: usize },
    /// Operator value is not an array.
    #[error("operator '{op}' at {path} expects an array of nodes")]
    OperandsNotArray { path: String, op: &'static str },
    /// `&`, `|`, or `^` with no operands.
    #[error("operator '{op}' at {path} requires at least one operand")]
    EmptyOperands { path: String, op: &'static str },
    /// `~` with anything but one operand.
    #[error("operator '~' at {path} requires exactly one operand (got {count})")]
    NotArity { path: String, count: usize },
    /// Nesting exceeds the configured limit.
    #[error("query exceeds depth {max} at {path}")]
    TooDeep { path: String, max: usize },
    /// Node count exceeds the configured limit.
    #[error("query exceeds {max} nodes")]
    TooManyNodes { max: usize },
    /// List-query parameter is not `field=value`.
    #[error("query parameter '{param}' is not of the form field=value")]
    BadParameter { param: String },
}

impl MalformedQuery {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            MalformedQuery::NotAnObject { .. } => "NotAnObject",
            MalformedQuery::KeyCount { .. } => "KeyCount",
            MalformedQuery::OperandsNotArray { .. } => "OperandsNotArray",
            MalformedQuery::EmptyOperands { .. } => "EmptyOperands",
            MalformedQuery::NotArity { .. } => "NotArity",
            MalformedQuery::TooDeep { .. } => "TooDeep",
            MalformedQuery::TooManyNodes { .. } => "TooManyNodes",
            MalformedQuery::BadParameter { .. } => "BadParameter",
        }
    }

    /// Path of the offending node, when the error is tied to one.
    pub fn path(&self) -> Option<&str> {
        match self {
            MalformedQuery::NotAnObject { path }
            | MalformedQuery::KeyCount { path, .. }
            | MalformedQuery::OperandsNotArray { path, .. }
            | MalformedQuery::EmptyOperands { path, .. }
            | MalformedQuery::NotArity { path, .. }
            | MalformedQuery::TooDeep { path, .. } => Some(path.as_str()),
            MalformedQuery::TooManyNodes { .. } | MalformedQuery::BadParameter { .. } => None,
        }
    }
}
