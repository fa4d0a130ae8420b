//! Canonical value representation shared by the parser, validators, and the
//! storage boundary.
//!
//! Values enter the crate loosely typed (straight from JSON or from query
//! string text) and are narrowed to the declared field kind during
//! validation, which overwrites the predicate cell in place.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Number, Value as Json};
use time::Date;

use crate::types::YearMonth;

/// Loosely or strictly typed literal attached to a predicate or record field.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// 64-bit floating point literal.
    Float(f64),
    /// UTF-8 text literal.
    Text(String),
    /// Calendar date (`YYYY-MM-DD`).
    Date(Date),
    /// Calendar month (`YYYY-MM`).
    YearMonth(YearMonth),
    /// Sequence literal used by membership and range lookups.
    List(Vec<Value>),
    /// Nested object; never valid as a filter value but kept so the
    /// validator can report it instead of the parser.
    Object(Map<String, Json>),
}

impl Value {
    /// Lifts a JSON value without applying any schema knowledge.
    pub fn from_json(value: &Json) -> Self {
        match value {
            Json::Null => Value::Null,
            Json::Bool(v) => Value::Bool(*v),
            Json::Number(num) => match num.as_i64() {
                Some(v) => Value::Int(v),
                None => Value::Float(num.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(v) => Value::Text(v.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Object(map.clone()),
        }
    }

    /// Lowers the value back into JSON; dates render as ISO strings.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::Int(v) => Json::Number((*v).into()),
            Value::Float(v) => Number::from_f64(*v).map(Json::Number).unwrap_or(Json::Null),
            Value::Text(v) => Json::String(v.clone()),
            Value::Date(d) => Json::String(format_date(*d)),
            Value::YearMonth(ym) => Json::String(ym.to_string()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => Json::Object(map.clone()),
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "number",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::YearMonth(_) => "year-month",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Equality with numeric widening (`Int(1) == Float(1.0)`).
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }

    /// Ordering between two values of compatible kinds; `None` otherwise.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::YearMonth(a), Value::YearMonth(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

pub(crate) fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Date(d) => write!(f, "\"{}\"", format_date(*d)),
            Value::YearMonth(ym) => write!(f, "\"{ym}\""),
            Value::List(items) => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::Object(map) => write!(f, "{}", Json::Object(map.clone())),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Date> for Value {
    fn from(value: Date) -> Self {
        Value::Date(value)
    }
}

impl From<YearMonth> for Value {
    fn from(value: YearMonth) -> Self {
        Value::YearMonth(value)
    }
}
