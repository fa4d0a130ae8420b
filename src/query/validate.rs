//! Field-level validation and normalization of predicate values.
//!
//! Validation runs one [`ConjunctionGroup`] at a time. Within a group every
//! key is distinct, so each predicate can be checked against its field's
//! declared kind independently; all errors are collected before returning.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

use super::partition::ConjunctionGroup;
use super::predicate::{Lookup, PredicateTable};
use super::value::Value;
use crate::config::QueryLimits;
use crate::error::ValidationError;
use crate::schema::{CompiledType, FieldDef, FieldKind};
use crate::types::YearMonth;

pub(crate) const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Validates predicate groups against one compiled record type.
pub struct PredicateValidator<'a> {
    compiled: &'a CompiledType,
    limits: &'a QueryLimits,
}

impl<'a> PredicateValidator<'a> {
    /// Creates a validator for `compiled`.
    pub fn new(compiled: &'a CompiledType, limits: &'a QueryLimits) -> Self {
        Self { compiled, limits }
    }

    /// Validates every group of a batch.
    ///
    /// Unknown-field detection runs on the first group only (unless
    /// `check_unknown_in_all_groups` is set); fields of later groups are
    /// assumed known and undeclared ones are left untouched.
    pub fn validate_batch(
        &self,
        groups: &[ConjunctionGroup],
        table: &mut PredicateTable,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for (idx, group) in groups.iter().enumerate() {
            let check_unknown = idx == 0 || self.limits.check_unknown_in_all_groups;
            errors.extend(self.validate_group(group, table, check_unknown));
        }
        errors
    }

    /// Validates one group, rewriting each accepted value in place.
    pub fn validate_group(
        &self,
        group: &ConjunctionGroup,
        table: &mut PredicateTable,
        check_unknown: bool,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for id in group.ids() {
            let Some(predicate) = table.get(id) else {
                continue;
            };
            let def = if check_unknown {
                match self.compiled.field(&predicate.field) {
                    Some(def) => def,
                    None => {
                        errors.push(ValidationError::UnknownField {
                            field: predicate.field.clone(),
                        });
                        continue;
                    }
                }
            } else {
                match self.compiled.ownership.get(&predicate.field) {
                    Some(owned) => &owned.def,
                    None => continue,
                }
            };
            let outcome =
                coerce_lookup(def, predicate.lookup, &predicate.value, self.limits.max_in_values)
                    .map_err(|message| ValidationError::InvalidValue {
                        key: predicate.key.clone(),
                        message,
                    });
            match outcome {
                Ok(clean) => table.set_clean(id, clean),
                Err(err) => errors.push(err),
            }
        }
        errors
    }
}

/// Coerces `value` for use with `lookup` on a field declared as `def`.
pub fn coerce_lookup(
    def: &FieldDef,
    lookup: Lookup,
    value: &Value,
    max_in_values: usize,
) -> Result<Value, String> {
    match lookup {
        Lookup::Exact | Lookup::Ne => coerce_scalar(def, value),
        Lookup::IsNull => coerce_bool(value).map(Value::Bool),
        Lookup::Contains => {
            if !def.kind.is_textual() {
                return Err(unsupported(lookup, &def.kind));
            }
            match value {
                Value::Text(text) => Ok(Value::Text(text.clone())),
                other => Err(format!("expected text, got {}", other.type_name())),
            }
        }
        Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte => {
            if !def.kind.is_ordered() {
                return Err(unsupported(lookup, &def.kind));
            }
            coerce_non_null(def, value)
        }
        Lookup::In => {
            let items = as_items(value);
            if items.is_empty() {
                return Err("expected at least one value".into());
            }
            if items.len() > max_in_values {
                return Err(format!("expected at most {max_in_values} values"));
            }
            items
                .iter()
                .map(|item| coerce_scalar(def, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }
        Lookup::Range => {
            if !def.kind.is_ordered() {
                return Err(unsupported(lookup, &def.kind));
            }
            let items = as_items(value);
            let [low, high] = items.as_slice() else {
                return Err(format!("expected exactly two values, got {}", items.len()));
            };
            let low = coerce_non_null(def, low)?;
            let high = coerce_non_null(def, high)?;
            if low.compare(&high).is_some_and(|ord| ord.is_gt()) {
                return Err("range lower bound must not exceed upper bound".into());
            }
            Ok(Value::List(vec![low, high]))
        }
    }
}

/// Coerces a single value to the kind declared by `def`.
pub fn coerce_scalar(def: &FieldDef, value: &Value) -> Result<Value, String> {
    match value {
        Value::Null if def.nullable => return Ok(Value::Null),
        Value::Null => return Err("this field may not be null".into()),
        Value::List(_) => return Err("expected a single value, got a list".into()),
        Value::Object(_) => return Err("nested objects are not supported".into()),
        _ => {}
    }
    match &def.kind {
        FieldKind::Text => match value {
            Value::Text(text) => Ok(Value::Text(text.clone())),
            Value::Int(v) => Ok(Value::Text(v.to_string())),
            Value::Float(v) => Ok(Value::Text(v.to_string())),
            other => Err(format!("expected text, got {}", other.type_name())),
        },
        FieldKind::Integer => match value {
            Value::Int(v) => Ok(Value::Int(*v)),
            Value::Float(v) => exact_int(*v)
                .map(Value::Int)
                .ok_or_else(|| "a valid integer is required".into()),
            Value::Text(text) => text
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| "a valid integer is required".into()),
            _ => Err("a valid integer is required".into()),
        },
        FieldKind::Float => match value {
            Value::Int(v) => Ok(Value::Float(*v as f64)),
            Value::Float(v) if v.is_finite() => Ok(Value::Float(*v)),
            Value::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Float)
                .ok_or_else(|| "a valid number is required".into()),
            _ => Err("a valid number is required".into()),
        },
        FieldKind::Date => match value {
            Value::Date(date) => Ok(Value::Date(*date)),
            Value::Text(text) => Date::parse(text.trim(), DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| "date has wrong format, use YYYY-MM-DD".into()),
            _ => Err("date has wrong format, use YYYY-MM-DD".into()),
        },
        FieldKind::YearMonth => match value {
            Value::YearMonth(ym) => Ok(Value::YearMonth(*ym)),
            Value::Text(text) => text
                .parse::<YearMonth>()
                .map(Value::YearMonth)
                .map_err(|_| "year-month has wrong format, use YYYY-MM".into()),
            _ => Err("year-month has wrong format, use YYYY-MM".into()),
        },
        FieldKind::Choice(options) => {
            let text = match value {
                Value::Text(text) => text.trim().to_owned(),
                Value::Int(v) => v.to_string(),
                other => return Err(format!("\"{other}\" is not a valid choice")),
            };
            if options.iter().any(|option| *option == text) {
                Ok(Value::Text(text))
            } else {
                Err(format!("\"{text}\" is not a valid choice"))
            }
        }
        FieldKind::Boolean => coerce_bool(value).map(Value::Bool),
    }
}

/// Whole floats inside the `i64` range; `i64::MAX as f64` rounds up to 2^63
/// and is therefore excluded.
fn exact_int(v: f64) -> Option<i64> {
    if v.fract() != 0.0 || !(i64::MIN as f64..i64::MAX as f64).contains(&v) {
        return None;
    }
    let int = v as i64;
    (int as f64 == v).then_some(int)
}

fn coerce_non_null(def: &FieldDef, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return Err("this lookup does not accept null".into());
    }
    coerce_scalar(def, value)
}

fn coerce_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(v) => Ok(*v),
        Value::Int(0) => Ok(false),
        Value::Int(1) => Ok(true),
        Value::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err("must be a valid boolean".into()),
        },
        _ => Err("must be a valid boolean".into()),
    }
}

/// List operands arrive as JSON arrays or, from query strings, as
/// comma-separated text.
fn as_items(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.clone(),
        Value::Text(text) => text
            .split(',')
            .map(|part| Value::Text(part.trim().to_owned()))
            .collect(),
        other => vec![other.clone()],
    }
}

fn unsupported(lookup: Lookup, kind: &FieldKind) -> String {
    format!("lookup '{lookup}' is not supported for {kind} fields")
}
