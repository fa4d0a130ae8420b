//! Recursive parser from the JSON wire grammar to [`Query`].
//!
//! ```text
//! node := {"&": [node, ...]} | {"|": [node, ...]} | {"^": [node, ...]}
//!       | {"~": [node]}       | {"<field>[__<lookup>]": <value>}
//! ```
//!
//! Any shape or arity violation aborts the parse with [`MalformedQuery`];
//! there is no partial tree.

use serde_json::{Map, Value as Json};
use tracing::debug;

use super::ast::{Operator, Query, QueryNode};
use super::errors::MalformedQuery;
use super::predicate::{Predicate, PredicateTable};
use super::value::Value;
use crate::config::QueryLimits;

/// Parses an optional filter. `None` and JSON `null` mean "no filter".
pub fn parse_filter(filter: Option<&Json>, limits: &QueryLimits) -> Result<Query, MalformedQuery> {
    match filter {
        None | Some(Json::Null) => Ok(Query::default()),
        Some(node) => parse(node, limits),
    }
}

/// Parses a filter expression, registering every leaf in a fresh table.
pub fn parse(node: &Json, limits: &QueryLimits) -> Result<Query, MalformedQuery> {
    let mut parser = Parser {
        limits,
        predicates: PredicateTable::new(),
        nodes: 0,
    };
    let root = parser.node(node, "$".to_owned(), 1).inspect_err(|err| {
        debug!(code = err.code(), error = %err, "query.parse.malformed");
    })?;
    Ok(Query {
        root: Some(root),
        predicates: parser.predicates,
    })
}

struct Parser<'a> {
    limits: &'a QueryLimits,
    predicates: PredicateTable,
    nodes: usize,
}

impl Parser<'_> {
    fn node(&mut self, node: &Json, path: String, depth: usize) -> Result<QueryNode, MalformedQuery> {
        if depth > self.limits.max_depth {
            return Err(MalformedQuery::TooDeep {
                path,
                max: self.limits.max_depth,
            });
        }
        self.nodes += 1;
        if self.nodes > self.limits.max_nodes {
            return Err(MalformedQuery::TooManyNodes {
                max: self.limits.max_nodes,
            });
        }

        let map = node
            .as_object()
            .ok_or_else(|| MalformedQuery::NotAnObject { path: path.clone() })?;
        let (key, value) = single_entry(map).ok_or(MalformedQuery::KeyCount {
            path: path.clone(),
            count: map.len(),
        })?;

        match Operator::from_symbol(key) {
            Some(Operator::Not) => {
                let operands = operands(value, Operator::Not, &path)?;
                if operands.len() != 1 {
                    return Err(MalformedQuery::NotArity {
                        path,
                        count: operands.len(),
                    });
                }
                let child = self.node(&operands[0], format!("{path}.~[0]"), depth + 1)?;
                Ok(QueryNode::Not(Box::new(child)))
            }
            Some(op) => {
                let operands = operands(value, op, &path)?;
                if operands.is_empty() {
                    return Err(MalformedQuery::EmptyOperands {
                        path,
                        op: op.symbol(),
                    });
                }
                let mut children = Vec::with_capacity(operands.len());
                for (idx, operand) in operands.iter().enumerate() {
                    let child_path = format!("{path}.{}[{idx}]", op.symbol());
                    children.push(self.node(operand, child_path, depth + 1)?);
                }
                Ok(match op {
                    Operator::And => QueryNode::And(children),
                    Operator::Or => QueryNode::Or(children),
                    _ => QueryNode::Xor(children),
                })
            }
            None => {
                let id = self
                    .predicates
                    .push(Predicate::new(key, Value::from_json(value)));
                Ok(QueryNode::Leaf(id))
            }
        }
    }
}

fn single_entry(map: &Map<String, Json>) -> Option<(&str, &Json)> {
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((key, value)), None) => Some((key.as_str(), value)),
        _ => None,
    }
}

fn operands<'j>(value: &'j Json, op: Operator, path: &str) -> Result<&'j [Json], MalformedQuery> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| MalformedQuery::OperandsNotArray {
            path: path.to_owned(),
            op: op.symbol(),
        })
}
