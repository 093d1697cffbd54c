//! Compiled queries and how their result rows map back to values.

use crate::ast::{NodeId, SqlTree};
use crate::error::{QueryError, QueryResult};
use crate::sql_provider::{DataProvider, SqlStatement};
use crate::value::{ScalarType, Value};

/// How one value is read from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// A column of the row.
    Column { index: usize, system_type: ScalarType },
    /// An entity or anonymous object assembled from member projections.
    Record(Vec<(String, Projection)>),
    /// A value known at compile time.
    Value(Value),
}

impl Projection {
    /// Materialize one row.
    pub fn read(&self, row: &[Value]) -> QueryResult<Value> {
        match self {
            Projection::Column { index, system_type } => {
                let value = row.get(*index).cloned().ok_or_else(|| {
                    QueryError::internal(format!(
                        "row has {} column(s), projection reads column {}",
                        row.len(),
                        index
                    ))
                })?;
                Ok(coerce(value, *system_type))
            }
            Projection::Record(members) => {
                let mut fields = Vec::with_capacity(members.len());
                for (name, member) in members {
                    fields.push((name.as_str(), member.read(row)?));
                }
                Ok(Value::record(fields))
            }
            Projection::Value(value) => Ok(value.clone()),
        }
    }

    /// Same shape with every column index passed through `f`.
    pub fn try_map_index(
        self,
        f: &mut impl FnMut(usize) -> QueryResult<usize>,
    ) -> QueryResult<Projection> {
        Ok(match self {
            Projection::Column { index, system_type } => Projection::Column {
                index: f(index)?,
                system_type,
            },
            Projection::Record(members) => {
                let mut mapped = Vec::with_capacity(members.len());
                for (name, member) in members {
                    mapped.push((name, member.try_map_index(&mut *f)?));
                }
                Projection::Record(mapped)
            }
            value @ Projection::Value(_) => value,
        })
    }

    /// Column indices read, in member order.
    pub fn columns(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<usize>) {
        match self {
            Projection::Column { index, .. } => out.push(*index),
            Projection::Record(members) => {
                for (_, member) in members {
                    member.collect_columns(out);
                }
            }
            Projection::Value(_) => {}
        }
    }
}

/// Conditions come back as integers from engines without a boolean column type.
fn coerce(value: Value, system_type: ScalarType) -> Value {
    match (system_type, value) {
        (ScalarType::Bool, Value::Int(n)) => Value::Bool(n != 0),
        (ScalarType::Bool, Value::UInt(n)) => Value::Bool(n != 0),
        (_, value) => value,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    /// No result set: DDL, DELETE, UPDATE and plain INSERT.
    NonQuery,
    /// One projected value per row.
    Rows(Projection),
    /// A single value, such as a generated identity.
    Scalar(Projection),
}

/// A compiled query: its SQL tree, root statement and result shape.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    tree: SqlTree,
    query: NodeId,
    kind: QueryKind,
}

impl QueryPlan {
    pub fn new(tree: SqlTree, query: NodeId, kind: QueryKind) -> Self {
        Self { tree, query, kind }
    }

    pub fn tree(&self) -> &SqlTree {
        &self.tree
    }

    pub fn query(&self) -> NodeId {
        self.query
    }

    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// Render for `provider`. The plan is left untouched and can be rendered again.
    pub fn sql(&self, provider: &DataProvider) -> QueryResult<SqlStatement> {
        let mut tree = self.tree.clone();
        provider.build_sql(&mut tree, self.query)
    }

    /// Debug text of the statement.
    pub fn text(&self) -> String {
        self.tree.to_text(self.query)
    }
}
