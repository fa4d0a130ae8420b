//! Greedy split of a flat predicate list into field-unique groups.
//!
//! The field validator accepts one value per key at a time, so a list in
//! which a key repeats is spread over as many groups as that key's
//! multiplicity. Placement is first-fit in input order, which yields exactly
//! `max multiplicity` groups.

use smallvec::SmallVec;

use super::predicate::{PredicateId, PredicateTable};

/// Predicates with pairwise distinct keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConjunctionGroup {
    members: SmallVec<[(String, PredicateId); 8]>,
}

impl ConjunctionGroup {
    /// Whether the group already holds a predicate for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.members.iter().any(|(member, _)| member == key)
    }

    /// Predicate held for `key`.
    pub fn get(&self, key: &str) -> Option<PredicateId> {
        self.members
            .iter()
            .find(|(member, _)| member == key)
            .map(|(_, id)| *id)
    }

    /// Predicate handles in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = PredicateId> + '_ {
        self.members.iter().map(|(_, id)| *id)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(key, _)| key.as_str())
    }

    /// Number of predicates.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` for an empty group.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn insert(&mut self, key: String, id: PredicateId) {
        self.members.push((key, id));
    }
}

/// Places each predicate into the first group lacking its key, opening a
/// new group when none qualifies.
pub fn partition<I>(table: &PredicateTable, ids: I) -> Vec<ConjunctionGroup>
where
    I: IntoIterator<Item = PredicateId>,
{
    let mut groups: Vec<ConjunctionGroup> = Vec::new();
    for id in ids {
        let Some(predicate) = table.get(id) else {
            continue;
        };
        let key = predicate.key.as_str();
        match groups.iter_mut().find(|group| !group.contains(key)) {
            Some(group) => group.insert(key.to_owned(), id),
            None => {
                let mut group = ConjunctionGroup::default();
                group.insert(key.to_owned(), id);
                groups.push(group);
            }
        }
    }
    groups
}
