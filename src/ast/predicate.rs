//! Predicates and search conditions.

use super::expr::Precedence;
use super::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    NotGreater,
    Less,
    LessOrEqual,
    NotLess,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::NotGreater => "!>",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::NotLess => "!<",
        }
    }
}

/// `left op right`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprExpr {
    pub left: NodeId,
    pub op: Operator,
    pub right: NodeId,
}

/// `expr [NOT] LIKE pattern [ESCAPE escape]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Like {
    pub expr: NodeId,
    pub is_not: bool,
    pub pattern: NodeId,
    pub escape: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Between {
    pub expr: NodeId,
    pub is_not: bool,
    pub lower: NodeId,
    pub upper: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsNull {
    pub expr: NodeId,
    pub is_not: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InSubQuery {
    pub expr: NodeId,
    pub is_not: bool,
    pub sub_query: NodeId,
}

/// `expr [NOT] IN (values…)`. A single non-query parameter value holds the whole list
/// until parameters are processed.
#[derive(Debug, Clone, PartialEq)]
pub struct InList {
    pub expr: NodeId,
    pub is_not: bool,
    pub values: Vec<NodeId>,
}

/// A boolean expression used as a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprPredicate {
    pub expr: NodeId,
    pub precedence: Precedence,
}

impl ExprPredicate {
    pub fn new(expr: NodeId, precedence: Precedence) -> Self {
        Self { expr, precedence }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotExpr {
    pub expr: NodeId,
    pub is_not: bool,
    pub precedence: Precedence,
}

/// A boolean function such as `CONTAINS(…)` used as a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncLike {
    pub function: NodeId,
}

/// One entry of a [`SearchCondition`]; `is_or` joins it to the next entry with OR.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub is_not: bool,
    pub predicate: NodeId,
    pub is_or: bool,
}

impl Condition {
    pub fn and(predicate: NodeId) -> Self {
        Self {
            is_not: false,
            predicate,
            is_or: false,
        }
    }

    pub fn or(predicate: NodeId) -> Self {
        Self {
            is_not: false,
            predicate,
            is_or: true,
        }
    }

    pub fn not(predicate: NodeId) -> Self {
        Self {
            is_not: true,
            predicate,
            is_or: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchCondition {
    pub conditions: Vec<Condition>,
}

impl SearchCondition {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn precedence(&self) -> Precedence {
        match self.conditions.as_slice() {
            [] => Precedence::Unknown,
            [single] if single.is_not => Precedence::LogicalNegation,
            [_] => Precedence::Primary,
            [init @ .., _] if init.iter().any(|c| c.is_or) => Precedence::LogicalDisjunction,
            _ => Precedence::LogicalConjunction,
        }
    }
}
