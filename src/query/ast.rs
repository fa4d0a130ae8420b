//! Boolean expression tree produced by the parser.
//!
//! The tree owns no field values: each leaf is a [`PredicateId`] into the
//! [`PredicateTable`] carried next to it in [`Query`].

use serde_json::{Map, Value as Json};

use super::predicate::{PredicateId, PredicateTable};

/// Boolean operator of an interior node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operator {
    /// Conjunction (`&`).
    And,
    /// Disjunction (`|`).
    Or,
    /// Exclusive or (`^`).
    Xor,
    /// Negation (`~`).
    Not,
}

impl Operator {
    /// Wire symbol of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::And => "&",
            Operator::Or => "|",
            Operator::Xor => "^",
            Operator::Not => "~",
        }
    }

    /// Operator for a wire key, if the key is one.
    pub fn from_symbol(key: &str) -> Option<Operator> {
        match key {
            "&" => Some(Operator::And),
            "|" => Some(Operator::Or),
            "^" => Some(Operator::Xor),
            "~" => Some(Operator::Not),
            _ => None,
        }
    }
}

/// Parsed expression node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryNode {
    /// All children hold (≥1 child).
    And(Vec<QueryNode>),
    /// Any child holds (≥1 child).
    Or(Vec<QueryNode>),
    /// Pairwise left-to-right exclusive or (≥1 child).
    Xor(Vec<QueryNode>),
    /// Child does not hold.
    Not(Box<QueryNode>),
    /// Single field predicate.
    Leaf(PredicateId),
}

impl QueryNode {
    /// Operator of an interior node; `None` for leaves.
    pub fn operator(&self) -> Option<Operator> {
        match self {
            QueryNode::And(_) => Some(Operator::And),
            QueryNode::Or(_) => Some(Operator::Or),
            QueryNode::Xor(_) => Some(Operator::Xor),
            QueryNode::Not(_) => Some(Operator::Not),
            QueryNode::Leaf(_) => None,
        }
    }

    /// Nesting depth; a lone leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            QueryNode::Leaf(_) => 1,
            QueryNode::Not(child) => 1 + child.depth(),
            QueryNode::And(children) | QueryNode::Or(children) | QueryNode::Xor(children) => {
                1 + children.iter().map(QueryNode::depth).max().unwrap_or(0)
            }
        }
    }

    /// Leaf handles in left-to-right order.
    pub fn leaves(&self) -> Vec<PredicateId> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<PredicateId>) {
        match self {
            QueryNode::Leaf(id) => out.push(*id),
            QueryNode::Not(child) => child.collect_leaves(out),
            QueryNode::And(children) | QueryNode::Or(children) | QueryNode::Xor(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Serializes the node back to wire form, reading leaf values from
    /// `table` (so cleaned values appear once validation has run).
    pub fn to_json(&self, table: &PredicateTable) -> Json {
        let (key, value) = match self {
            QueryNode::Leaf(id) => match table.get(*id) {
                Some(predicate) => (predicate.key.clone(), predicate.value.to_json()),
                None => return Json::Null,
            },
            QueryNode::Not(child) => ("~".to_owned(), Json::Array(vec![child.to_json(table)])),
            QueryNode::And(children) | QueryNode::Or(children) | QueryNode::Xor(children) => {
                let symbol = self.operator().map_or("&", Operator::symbol);
                let operands = children.iter().map(|child| child.to_json(table)).collect();
                (symbol.to_owned(), Json::Array(operands))
            }
        };
        let mut map = Map::new();
        map.insert(key, value);
        Json::Object(map)
    }
}

/// A parsed expression-mode query: the tree plus its predicate table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Root node; `None` when the client supplied no filter.
    pub root: Option<QueryNode>,
    /// Predicates referenced by the tree's leaves.
    pub predicates: PredicateTable,
}

impl Query {
    /// Serializes the query back to wire form; `null` when unfiltered.
    pub fn to_json(&self) -> Json {
        self.root
            .as_ref()
            .map_or(Json::Null, |root| root.to_json(&self.predicates))
    }

    /// Returns `true` when the query matches everything.
    pub fn is_unfiltered(&self) -> bool {
        self.root.is_none()
    }
}
