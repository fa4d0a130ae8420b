//! Leaf predicates and the per-query table that owns them.
//!
//! Tree leaves and conjunction groups both refer to predicates by
//! [`PredicateId`]. Validation rewrites values through the table, so the
//! tree observes cleaned values without being walked again.

use std::fmt;

use super::value::Value;

/// Separator between a field name and its lookup suffix.
pub const LOOKUP_SEPARATOR: &str = "__";

/// Index of a predicate inside a [`PredicateTable`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PredicateId(pub u32);

/// Comparison applied by a leaf predicate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Lookup {
    /// Equality (no suffix, or `__exact`).
    Exact,
    /// Inequality (`__ne`).
    Ne,
    /// Membership in a list (`__in`).
    In,
    /// Inclusive two-element range (`__range`).
    Range,
    /// Strictly greater (`__gt`).
    Gt,
    /// Greater or equal (`__gte`).
    Gte,
    /// Strictly less (`__lt`).
    Lt,
    /// Less or equal (`__lte`).
    Lte,
    /// Substring match on text (`__contains`).
    Contains,
    /// Null test with a boolean operand (`__isnull`).
    IsNull,
}

impl Lookup {
    const SUFFIXES: [(&'static str, Lookup); 10] = [
        ("exact", Lookup::Exact),
        ("ne", Lookup::Ne),
        ("in", Lookup::In),
        ("range", Lookup::Range),
        ("gt", Lookup::Gt),
        ("gte", Lookup::Gte),
        ("lt", Lookup::Lt),
        ("lte", Lookup::Lte),
        ("contains", Lookup::Contains),
        ("isnull", Lookup::IsNull),
    ];

    /// Parses a lookup suffix such as `gte`.
    pub fn from_suffix(suffix: &str) -> Option<Lookup> {
        Self::SUFFIXES
            .iter()
            .find(|(name, _)| *name == suffix)
            .map(|(_, lookup)| *lookup)
    }

    /// Suffix name of the lookup.
    pub fn suffix(self) -> &'static str {
        Self::SUFFIXES
            .iter()
            .find(|(_, lookup)| *lookup == self)
            .map(|(name, _)| *name)
            .unwrap_or("exact")
    }

    /// Splits a client key into `(field, lookup)`.
    ///
    /// Only a recognised trailing suffix is treated as a lookup, so
    /// `age__gte` is `(age, Gte)` while `age__foo` stays a single (unknown)
    /// field name.
    pub fn split_key(key: &str) -> (&str, Lookup) {
        if let Some((field, suffix)) = key.rsplit_once(LOOKUP_SEPARATOR) {
            if !field.is_empty() {
                if let Some(lookup) = Lookup::from_suffix(suffix) {
                    return (field, lookup);
                }
            }
        }
        (key, Lookup::Exact)
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Mutable field/value cell referenced by tree leaves and groups.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    /// Key exactly as the client wrote it (`age__gte`).
    pub key: String,
    /// Field part of the key (`age`).
    pub field: String,
    /// Lookup part of the key.
    pub lookup: Lookup,
    /// Current value; raw until validated, normalized afterwards.
    pub value: Value,
    /// Set once a validator has normalized the value.
    pub cleaned: bool,
}

impl Predicate {
    /// Builds a raw predicate from a client key.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        let (field, lookup) = Lookup::split_key(&key);
        Self {
            field: field.to_owned(),
            lookup,
            key,
            value,
            cleaned: false,
        }
    }
}

/// Arena of predicates for a single request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PredicateTable {
    entries: Vec<Predicate>,
}

impl PredicateTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a predicate and returns its handle.
    pub fn push(&mut self, predicate: Predicate) -> PredicateId {
        let id = PredicateId(self.entries.len() as u32);
        self.entries.push(predicate);
        id
    }

    /// Predicate behind `id`.
    pub fn get(&self, id: PredicateId) -> Option<&Predicate> {
        self.entries.get(id.0 as usize)
    }

    /// Overwrites the value behind `id` with its normalized form.
    pub fn set_clean(&mut self, id: PredicateId, value: Value) {
        if let Some(entry) = self.entries.get_mut(id.0 as usize) {
            entry.value = value;
            entry.cleaned = true;
        }
    }

    /// Handles of every predicate, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = PredicateId> + '_ {
        (0..self.entries.len()).map(|idx| PredicateId(idx as u32))
    }

    /// Iterates `(id, predicate)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (PredicateId, &Predicate)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (PredicateId(idx as u32), entry))
    }

    /// Number of predicates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the table holds no predicate.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
