use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use super::{PredicateAlgebra, Record, RecordStore, StoreError};
use crate::query::{Lookup, Value};

/// Predicate tree understood by [`MemoryStore`].
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// Single field comparison.
    Cmp {
        /// Field name.
        field: String,
        /// Comparison.
        lookup: Lookup,
        /// Cleaned operand.
        value: Value,
    },
    /// Conjunction.
    And(Box<Filter>, Box<Filter>),
    /// Disjunction.
    Or(Box<Filter>, Box<Filter>),
    /// Exclusive or.
    Xor(Box<Filter>, Box<Filter>),
    /// Negation.
    Not(Box<Filter>),
}

impl Filter {
    /// Evaluates the filter against one record; absent fields read as null.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Cmp {
                field,
                lookup,
                value,
            } => compare(record.get(field).unwrap_or(&Value::Null), *lookup, value),
            Filter::And(lhs, rhs) => lhs.matches(record) && rhs.matches(record),
            Filter::Or(lhs, rhs) => lhs.matches(record) || rhs.matches(record),
            Filter::Xor(lhs, rhs) => lhs.matches(record) != rhs.matches(record),
            Filter::Not(inner) => !inner.matches(record),
        }
    }

    fn keyword(&self) -> Option<&'static str> {
        match self {
            Filter::And(..) => Some("AND"),
            Filter::Or(..) => Some("OR"),
            Filter::Xor(..) => Some("XOR"),
            Filter::Cmp { .. } | Filter::Not(_) => None,
        }
    }

    fn fmt_operand(&self, parent: &'static str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.keyword() {
            Some(keyword) if keyword != parent => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

fn compare(actual: &Value, lookup: Lookup, expected: &Value) -> bool {
    match lookup {
        Lookup::Exact => actual.loose_eq(expected),
        Lookup::Ne => !actual.loose_eq(expected),
        Lookup::IsNull => matches!(expected, Value::Bool(flag) if actual.is_null() == *flag),
        Lookup::In => match expected {
            Value::List(items) => items.iter().any(|item| actual.loose_eq(item)),
            _ => false,
        },
        Lookup::Range => match expected {
            Value::List(bounds) if bounds.len() == 2 => {
                actual.compare(&bounds[0]).is_some_and(|ord| ord.is_ge())
                    && actual.compare(&bounds[1]).is_some_and(|ord| ord.is_le())
            }
            _ => false,
        },
        Lookup::Gt => actual.compare(expected).is_some_and(|ord| ord.is_gt()),
        Lookup::Gte => actual.compare(expected).is_some_and(|ord| ord.is_ge()),
        Lookup::Lt => actual.compare(expected).is_some_and(|ord| ord.is_lt()),
        Lookup::Lte => actual.compare(expected).is_some_and(|ord| ord.is_le()),
        Lookup::Contains => match (actual, expected) {
            (Value::Text(haystack), Value::Text(needle)) => haystack.contains(needle.as_str()),
            _ => false,
        },
    }
}

impl PredicateAlgebra for Filter {
    fn and(self, rhs: Self) -> Self {
        Filter::And(Box::new(self), Box::new(rhs))
    }

    fn or(self, rhs: Self) -> Self {
        Filter::Or(Box::new(self), Box::new(rhs))
    }

    fn xor(self, rhs: Self) -> Self {
        Filter::Xor(Box::new(self), Box::new(rhs))
    }

    fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Cmp {
                field,
                lookup,
                value,
            } => match (lookup, value) {
                (Lookup::Exact, Value::Null) => write!(f, "{field} IS NULL"),
                (Lookup::Ne, Value::Null) => write!(f, "{field} IS NOT NULL"),
                (Lookup::IsNull, Value::Bool(true)) => write!(f, "{field} IS NULL"),
                (Lookup::IsNull, _) => write!(f, "{field} IS NOT NULL"),
                (Lookup::Range, Value::List(bounds)) if bounds.len() == 2 => {
                    write!(f, "{field} BETWEEN {} AND {}", bounds[0], bounds[1])
                }
                _ => {
                    let op = match lookup {
                        Lookup::Exact => "=",
                        Lookup::Ne => "!=",
                        Lookup::In => "IN",
                        Lookup::Range => "BETWEEN",
                        Lookup::Gt => ">",
                        Lookup::Gte => ">=",
                        Lookup::Lt => "<",
                        Lookup::Lte => "<=",
                        Lookup::Contains => "CONTAINS",
                        Lookup::IsNull => "IS NULL",
                    };
                    write!(f, "{field} {op} {value}")
                }
            },
            Filter::And(lhs, rhs) | Filter::Or(lhs, rhs) | Filter::Xor(lhs, rhs) => {
                let keyword = self.keyword().unwrap_or("AND");
                lhs.fmt_operand(keyword, f)?;
                write!(f, " {keyword} ")?;
                rhs.fmt_operand(keyword, f)
            }
            Filter::Not(inner) => match **inner {
                Filter::Cmp { .. } => write!(f, "NOT {inner}"),
                _ => write!(f, "NOT ({inner})"),
            },
        }
    }
}

/// Thread-safe in-memory record store.
///
/// Records are grouped by type name. Optional unique keys reject inserts
/// that repeat an existing key, mirroring a database unique constraint.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    unique_keys: HashMap<String, Vec<String>>,
    executions: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `fields` as a unique key of `record_type`.
    pub fn with_unique_key<I, S>(mut self, record_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_keys.insert(
            record_type.into(),
            fields.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Appends records without any uniqueness check.
    pub fn seed(&self, record_type: &str, records: impl IntoIterator<Item = Record>) {
        self.tables
            .write()
            .entry(record_type.to_owned())
            .or_default()
            .extend(records);
    }

    /// Number of [`RecordStore::execute`] calls served so far.
    pub fn execution_count(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Number of records stored for `record_type`.
    pub fn len(&self, record_type: &str) -> usize {
        self.tables.read().get(record_type).map_or(0, Vec::len)
    }

    fn collides(&self, record_type: &str, existing: &[Record], record: &Record) -> Option<Vec<String>> {
        let fields = self.unique_keys.get(record_type)?;
        let key: Vec<&Value> = fields
            .iter()
            .map(|field| record.get(field).unwrap_or(&Value::Null))
            .collect();
        if key.iter().any(|value| value.is_null()) {
            return None;
        }
        existing
            .iter()
            .any(|other| {
                fields
                    .iter()
                    .zip(&key)
                    .all(|(field, value)| other.get(field).is_some_and(|v| v.loose_eq(value)))
            })
            .then(|| fields.clone())
    }
}

impl RecordStore for MemoryStore {
    type Predicate = Filter;

    fn leaf(&self, field: &str, lookup: Lookup, value: &Value) -> Filter {
        Filter::Cmp {
            field: field.to_owned(),
            lookup,
            value: value.clone(),
        }
    }

    fn execute(
        &self,
        record_type: &str,
        predicate: Option<&Filter>,
    ) -> Result<Vec<Record>, StoreError> {
        self.executions.fetch_add(1, Ordering::Relaxed);
        let tables = self.tables.read();
        let rows: Vec<Record> = tables
            .get(record_type)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| predicate.map_or(true, |filter| filter.matches(record)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        debug!(record_type, rows = rows.len(), "store.memory.execute");
        Ok(rows)
    }

    fn insert(&self, record_type: &str, record: Record) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let existing = tables.entry(record_type.to_owned()).or_default();
        if let Some(fields) = self.collides(record_type, existing, &record) {
            return Err(StoreError::DuplicateKey {
                record_type: record_type.to_owned(),
                fields,
            });
        }
        existing.push(record);
        Ok(())
    }
}
