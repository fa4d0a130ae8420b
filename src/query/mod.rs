#![forbid(unsafe_code)]

//! Query compilation.
//!
//! This module turns client filters into store predicates: parsing the
//! expression grammar or flat query-string parameters, partitioning leaves
//! into key-unique groups, validating each group against a record type and
//! folding the validated tree into the store's predicate algebra.

/// Expression tree representation.
///
/// Boolean nodes over leaf handles into a predicate table.
pub mod ast;

/// Structural query errors.
pub mod errors;

/// Lowering of validated queries into store predicates.
pub mod evaluate;

/// Flat query-string parameters.
pub mod list;

/// JSON expression parser.
///
/// Enforces operator arity along with the configured depth and node limits.
pub mod parse;

/// Grouping of predicates into key-unique conjunctions.
pub mod partition;

/// Leaf predicates and lookups.
pub mod predicate;

/// Field-kind validation of predicate values.
pub mod validate;

/// Dynamically typed filter values.
pub mod value;

pub use ast::{Operator, Query, QueryNode};
pub use errors::MalformedQuery;
pub use evaluate::{evaluate, evaluate_groups};
pub use list::ListQuery;
pub use parse::{parse, parse_filter};
pub use partition::{partition, ConjunctionGroup};
pub use predicate::{Lookup, Predicate, PredicateId, PredicateTable, LOOKUP_SEPARATOR};
pub use validate::PredicateValidator;
pub use value::Value;
