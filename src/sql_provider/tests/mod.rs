//! Renderer tests over hand-built statements.

mod generic;
mod paging;

use crate::ast::{ExprExpr, NodeId, Operator, SqlParameter, SqlTree};
use crate::mapping::{ColumnDescriptor, DataType, EntityDescriptor, SqlDataType, MAX_LENGTH};
use crate::value::Value;

pub(super) fn person() -> EntityDescriptor {
    EntityDescriptor::new("Person")
        .with_column(ColumnDescriptor::new("PersonID", DataType::Int32).key(1).identity())
        .with_column(ColumnDescriptor::new(
            "FirstName",
            SqlDataType::with_length(DataType::NVarChar, 50),
        ))
        .with_column(
            ColumnDescriptor::new("LastName", SqlDataType::with_length(DataType::NVarChar, MAX_LENGTH))
                .nullable(),
        )
}

/// `SELECT FirstName FROM Person`, returning the query and the table.
pub(super) fn select_first_names(tree: &mut SqlTree) -> (NodeId, NodeId) {
    let query = tree.new_query();
    let table = tree.table_from_entity(&person());
    tree.add_from(query, table, None).unwrap();
    let first_name = tree.table_field(table, "FirstName").unwrap();
    tree.select_add(query, first_name).unwrap();
    (query, table)
}

pub(super) fn where_id_equals(tree: &mut SqlTree, query: NodeId, table: NodeId, id: NodeId) {
    let person_id = tree.table_field(table, "PersonID").unwrap();
    let eq = tree.add(ExprExpr {
        left: person_id,
        op: Operator::Equal,
        right: id,
    });
    tree.where_add(query, eq).unwrap();
}

pub(super) fn parameter(tree: &mut SqlTree, name: &str, value: impl Into<Value>) -> NodeId {
    tree.add(SqlParameter::new(name, value.into()))
}
