//! Flat query-string mode: `?field=value&field__lookup=value`.
//!
//! Parameters are an implicit conjunction. Repeated keys are spread over
//! several [`ConjunctionGroup`]s so each group can be validated as one form.

use super::errors::MalformedQuery;
use super::partition::{partition, ConjunctionGroup};
use super::predicate::{Predicate, PredicateId, PredicateTable};
use super::value::Value;

/// Parsed list-mode parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    /// One predicate per parameter, in request order.
    pub predicates: PredicateTable,
    /// Partition of the predicates into key-unique groups.
    pub groups: Vec<ConjunctionGroup>,
}

impl ListQuery {
    /// Builds a list query from raw `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, MalformedQuery>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut predicates = PredicateTable::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            if key.is_empty() {
                return Err(MalformedQuery::BadParameter {
                    param: format!("={}", value.into()),
                });
            }
            predicates.push(Predicate::new(key, Value::Text(value.into())));
        }
        let groups = partition(&predicates, predicates.ids());
        Ok(Self { predicates, groups })
    }

    /// Returns `true` when no parameter was supplied.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Distinct base field names across every group.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self
            .predicates
            .iter()
            .map(|(_, predicate)| predicate.field.as_str())
            .collect();
        fields.sort_unstable();
        fields.dedup();
        fields
    }

    /// Predicate handles of the first group; the only ones checked for
    /// unknown fields by default.
    pub fn first_group(&self) -> impl Iterator<Item = PredicateId> + '_ {
        self.groups.iter().take(1).flat_map(ConjunctionGroup::ids)
    }
}
