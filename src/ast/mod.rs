//! SQL abstract syntax tree.
//!
//! Nodes live in an arena ([`SqlTree`]) and refer to each other by [`NodeId`].
//! Ownership edges are the ids returned by [`Node::children`]; navigation
//! edges (a query's parent select, a column's owning query, a field's table)
//! are ids too but are never followed by traversal or clone.

pub mod alias;
pub mod clone;
pub mod display;
pub mod expr;
pub mod node;
pub mod params;
pub mod predicate;
pub mod query;
pub mod reserved;
pub mod traverse;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{QueryError, QueryResult};
use crate::mapping::EntityDescriptor;
use crate::value::{ScalarType, Value};

pub use alias::AliasSet;
pub use expr::{
    Precedence, SqlBinaryExpression, SqlExpression, SqlField, SqlFunction, SqlParameter, SqlTable,
    SqlValue, ValueTransform,
};
pub use node::{ElementType, Node};
pub use predicate::{
    Between, Condition, ExprExpr, ExprPredicate, FuncLike, InList, InSubQuery, IsNull, Like,
    NotExpr, Operator, SearchCondition,
};
pub use query::{
    Column, CreateTableStatement, DeleteClause, FromClause, InsertClause, JoinType, JoinedTable,
    OrderByItem, QueryType, SelectClause, SelectQuery, SetExpression, TableSource, Union,
    UpdateClause,
};
pub use reserved::ReservedWords;

/// Index of a node inside its [`SqlTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a table-valued source (table or query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Arena holding every node of one compilation.
#[derive(Debug, Clone, Default)]
pub struct SqlTree {
    nodes: Vec<Node>,
}

impl SqlTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add(&mut self, node: impl Into<Node>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node.into());
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn element_type(&self, id: NodeId) -> ElementType {
        self.node(id).element_type()
    }

    pub fn query(&self, id: NodeId) -> QueryResult<&SelectQuery> {
        match self.node(id) {
            Node::Query(q) => Ok(q),
            other => Err(mismatch(id, ElementType::SelectQuery, other)),
        }
    }

    pub fn query_mut(&mut self, id: NodeId) -> QueryResult<&mut SelectQuery> {
        match self.node_mut(id) {
            Node::Query(q) => Ok(q),
            other => Err(mismatch(id, ElementType::SelectQuery, other)),
        }
    }

    pub fn table(&self, id: NodeId) -> QueryResult<&SqlTable> {
        match self.node(id) {
            Node::Table(t) => Ok(t),
            other => Err(mismatch(id, ElementType::SqlTable, other)),
        }
    }

    pub fn field(&self, id: NodeId) -> QueryResult<&SqlField> {
        match self.node(id) {
            Node::Field(f) => Ok(f),
            other => Err(mismatch(id, ElementType::SqlField, other)),
        }
    }

    pub fn column(&self, id: NodeId) -> QueryResult<&Column> {
        match self.node(id) {
            Node::Column(c) => Ok(c),
            other => Err(mismatch(id, ElementType::Column, other)),
        }
    }

    pub fn table_source(&self, id: NodeId) -> QueryResult<&TableSource> {
        match self.node(id) {
            Node::TableSource(ts) => Ok(ts),
            other => Err(mismatch(id, ElementType::TableSource, other)),
        }
    }

    pub fn table_source_mut(&mut self, id: NodeId) -> QueryResult<&mut TableSource> {
        match self.node_mut(id) {
            Node::TableSource(ts) => Ok(ts),
            other => Err(mismatch(id, ElementType::TableSource, other)),
        }
    }

    pub fn parameter(&self, id: NodeId) -> QueryResult<&SqlParameter> {
        match self.node(id) {
            Node::Parameter(p) => Ok(p),
            other => Err(mismatch(id, ElementType::SqlParameter, other)),
        }
    }

    pub fn parameter_mut(&mut self, id: NodeId) -> QueryResult<&mut SqlParameter> {
        match self.node_mut(id) {
            Node::Parameter(p) => Ok(p),
            other => Err(mismatch(id, ElementType::SqlParameter, other)),
        }
    }

    pub fn search_condition_mut(&mut self, id: NodeId) -> QueryResult<&mut SearchCondition> {
        match self.node_mut(id) {
            Node::SearchCondition(sc) => Ok(sc),
            other => Err(mismatch(id, ElementType::SearchCondition, other)),
        }
    }

    // Node constructors.

    /// A new empty SELECT query with its WHERE and HAVING conditions allocated.
    pub fn new_query(&mut self) -> NodeId {
        let where_clause = self.add(SearchCondition::default());
        let having = self.add(SearchCondition::default());
        self.add(SelectQuery::new(where_clause, having))
    }

    /// A new query nested under `parent` for correlated references.
    pub fn new_sub_query(&mut self, parent: NodeId) -> NodeId {
        let id = self.new_query();
        if let Node::Query(q) = self.node_mut(id) {
            q.parent_select = Some(parent);
        }
        id
    }

    pub fn value(&mut self, value: impl Into<Value>) -> NodeId {
        self.add(SqlValue::new(value.into()))
    }

    pub fn binary(
        &mut self,
        left: NodeId,
        operation: &str,
        right: NodeId,
        system_type: ScalarType,
        precedence: Precedence,
    ) -> NodeId {
        self.add(SqlBinaryExpression {
            left,
            operation: operation.to_string(),
            right,
            system_type,
            precedence,
        })
    }

    /// A table node with one field per mapped column plus the `*` field.
    pub fn table_from_entity(&mut self, entity: &EntityDescriptor) -> NodeId {
        let table = NodeId(self.nodes.len() as u32);
        let all = table + 1;
        self.nodes.push(Node::Table(SqlTable::new(entity, all)));
        self.nodes.push(Node::Field(SqlField::all(table)));
        let fields: Vec<NodeId> = entity
            .columns
            .iter()
            .map(|column| self.add(SqlField::from_column(column, table)))
            .collect();
        if let Node::Table(t) = self.node_mut(table) {
            t.fields = fields;
        }
        table
    }

    /// Field of `table` for an entity member.
    pub fn table_field(&self, table: NodeId, member: &str) -> QueryResult<NodeId> {
        let t = self.table(table)?;
        t.fields
            .iter()
            .copied()
            .find(|&f| matches!(self.node(f), Node::Field(field) if field.name == member))
            .ok_or_else(|| QueryError::UnknownMember {
                entity: t.name.clone(),
                member: member.to_string(),
            })
    }

    /// Source identity of a table or query node.
    pub fn source_id(&self, id: NodeId) -> Option<SourceId> {
        match self.node(id) {
            Node::Table(t) => Some(t.source_id),
            Node::Query(q) => Some(q.source_id),
            _ => None,
        }
    }

    /// Scalar type of an expression node.
    pub fn system_type(&self, mut id: NodeId) -> ScalarType {
        let mut seen = 0;
        loop {
            let next = match self.node(id) {
                Node::Field(f) => return f.system_type,
                Node::Function(f) => return f.system_type,
                Node::Parameter(p) => return p.system_type,
                Node::Expression(e) => return e.system_type,
                Node::Binary(b) => return b.system_type,
                Node::Value(v) => return v.system_type,
                Node::Column(c) => c.expr,
                Node::Query(q) => match q.select.columns.as_slice() {
                    [single] => *single,
                    _ => return ScalarType::Object,
                },
                Node::SearchCondition(_)
                | Node::ExprExpr(_)
                | Node::Like(_)
                | Node::Between(_)
                | Node::IsNull(_)
                | Node::InList(_)
                | Node::InSubQuery(_)
                | Node::NotExpr(_)
                | Node::ExprPredicate(_)
                | Node::FuncLike(_) => return ScalarType::Bool,
                Node::Table(_) | Node::TableSource(_) => return ScalarType::Object,
            };
            // A query projecting itself has no type of its own.
            seen += 1;
            if seen > self.len() {
                return ScalarType::Object;
            }
            id = next;
        }
    }

    pub fn precedence(&self, id: NodeId) -> Precedence {
        match self.node(id) {
            Node::Expression(e) => e.precedence,
            Node::Binary(b) => b.precedence,
            Node::Function(f) => f.precedence,
            Node::NotExpr(n) => n.precedence,
            Node::ExprPredicate(e) => e.precedence,
            Node::SearchCondition(sc) => sc.precedence(),
            Node::ExprExpr(_)
            | Node::Like(_)
            | Node::Between(_)
            | Node::IsNull(_)
            | Node::InList(_)
            | Node::InSubQuery(_)
            | Node::FuncLike(_) => Precedence::Comparison,
            _ => Precedence::Primary,
        }
    }
}

impl std::ops::Add<u32> for NodeId {
    type Output = NodeId;

    fn add(self, rhs: u32) -> NodeId {
        NodeId(self.0 + rhs)
    }
}

fn mismatch(id: NodeId, expected: ElementType, found: &Node) -> QueryError {
    QueryError::internal(format!(
        "node {} is {:?}, expected {:?}",
        id,
        found.element_type(),
        expected
    ))
}
