#![forbid(unsafe_code)]

//! Storage collaborator interface.
//!
//! The gate never interprets records itself. It asks the store for leaf
//! predicates, combines them through [`PredicateAlgebra`], and hands the
//! single resulting predicate to [`RecordStore::execute`].

use std::collections::BTreeMap;

use thiserror::Error;

use crate::query::{Lookup, Value};

/// In-memory store used by tests and embedders without a database.
pub mod memory;

pub use memory::{Filter, MemoryStore};

/// A stored record: field name → value.
pub type Record = BTreeMap<String, Value>;

/// Boolean combinators of a store's predicate type.
pub trait PredicateAlgebra: Sized {
    /// Both sides hold.
    fn and(self, rhs: Self) -> Self;
    /// Either side holds.
    fn or(self, rhs: Self) -> Self;
    /// Exactly one side holds.
    fn xor(self, rhs: Self) -> Self;
    /// The predicate does not hold.
    fn negate(self) -> Self;
}

/// Storage collaborator consumed by [`crate::gate::Gate`].
pub trait RecordStore {
    /// Store-native predicate.
    type Predicate: PredicateAlgebra;

    /// Builds the predicate for one cleaned leaf.
    fn leaf(&self, field: &str, lookup: Lookup, value: &Value) -> Self::Predicate;

    /// Runs `predicate` over records of `record_type`; `None` matches all.
    fn execute(
        &self,
        record_type: &str,
        predicate: Option<&Self::Predicate>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Inserts a new record.
    fn insert(&self, record_type: &str, record: Record) -> Result<(), StoreError>;
}

/// Failures reported by a [`RecordStore`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Insert collided with an existing record on a unique key.
    #[error("{record_type} with this {} already exists", .fields.join(", "))]
    DuplicateKey {
        /// Record type written to.
        record_type: String,
        /// Fields forming the unique key.
        fields: Vec<String>,
    },
    /// Backend is not reachable or refused the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
