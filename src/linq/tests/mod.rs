//! Compiler tests: query trees in, rendered statements and projections out.

mod paging;
mod queries;

use super::{compile, Expr, QueryPlan};
use crate::mapping::{ColumnDescriptor, DataType, EntityDescriptor, MappingSchema, SqlDataType, MAX_LENGTH};
use crate::sql_provider::{DataProvider, SqlStatement};

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

/// No key columns.
pub(super) fn audit() -> EntityDescriptor {
    EntityDescriptor::new("Audit")
        .with_column(ColumnDescriptor::new("Message", DataType::NVarChar))
        .with_column(ColumnDescriptor::new("Level", DataType::Int32))
}

pub(super) fn schema() -> MappingSchema {
    MappingSchema::from_entities([person(), audit()])
}

pub(super) fn people() -> Expr {
    Expr::table("Person")
}

/// `p.member`.
pub(super) fn p(member: &str) -> Expr {
    Expr::param("p").member(member)
}

/// `p => body`.
pub(super) fn lambda(body: Expr) -> Expr {
    Expr::lambda(["p"], body)
}

/// `() => body`.
pub(super) fn thunk(body: Expr) -> Expr {
    Expr::lambda(Vec::<&str>::new(), body)
}

pub(super) fn call(method: &str, args: Vec<Expr>) -> Expr {
    Expr::call(method, args)
}

pub(super) fn plan(expr: &Expr) -> QueryPlan {
    compile(&DataProvider::generic(), &schema(), expr).unwrap()
}

pub(super) fn render(provider: &DataProvider, expr: &Expr) -> SqlStatement {
    compile(provider, &schema(), expr)
        .unwrap()
        .sql(provider)
        .unwrap()
}

pub(super) fn sql_server(expr: &Expr) -> String {
    render(&DataProvider::sql_server("2008"), expr).sql
}

pub(super) fn generic(expr: &Expr) -> String {
    render(&DataProvider::generic(), expr).sql
}
