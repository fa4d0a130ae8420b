//! Lowering of validated queries into a store's predicate type.
//!
//! Evaluation is a single bottom-up fold. Leaves are read from the
//! predicate table after validation, so they carry normalized values.

use super::ast::QueryNode;
use super::partition::ConjunctionGroup;
use super::predicate::PredicateTable;
use crate::store::{PredicateAlgebra, RecordStore};

/// Folds `node` into one store predicate.
///
/// N-ary operators fold left to right, so `^` over three operands is
/// `(a XOR b) XOR c`. Returns `None` only when a leaf handle is dangling.
pub fn evaluate<S>(node: &QueryNode, table: &PredicateTable, store: &S) -> Option<S::Predicate>
where
    S: RecordStore + ?Sized,
{
    match node {
        QueryNode::Leaf(id) => {
            let predicate = table.get(*id)?;
            Some(store.leaf(&predicate.field, predicate.lookup, &predicate.value))
        }
        QueryNode::Not(child) => evaluate(child, table, store).map(PredicateAlgebra::negate),
        QueryNode::And(children) => fold(children, table, store, PredicateAlgebra::and),
        QueryNode::Or(children) => fold(children, table, store, PredicateAlgebra::or),
        QueryNode::Xor(children) => fold(children, table, store, PredicateAlgebra::xor),
    }
}

/// Conjoins every predicate of every group; `None` for an empty batch.
pub fn evaluate_groups<S>(
    groups: &[ConjunctionGroup],
    table: &PredicateTable,
    store: &S,
) -> Option<S::Predicate>
where
    S: RecordStore + ?Sized,
{
    groups
        .iter()
        .flat_map(ConjunctionGroup::ids)
        .filter_map(|id| table.get(id))
        .map(|predicate| store.leaf(&predicate.field, predicate.lookup, &predicate.value))
        .reduce(PredicateAlgebra::and)
}

fn fold<S>(
    children: &[QueryNode],
    table: &PredicateTable,
    store: &S,
    combine: fn(S::Predicate, S::Predicate) -> S::Predicate,
) -> Option<S::Predicate>
where
    S: RecordStore + ?Sized,
{
    let mut acc: Option<S::Predicate> = None;
    for child in children {
        let next = evaluate(child, table, store)?;
        acc = Some(match acc {
            Some(prev) => combine(prev, next),
            None => next,
        });
    }
    acc
}
