//! Compilation of declarative query trees into SQL trees.
//!
//! ```text
//! Expr ─▶ ExpressionBuilder ─▶ SequenceBuilder chain ─▶ BuildContext arena
//!                                                           │
//!                                   QueryPlan { SqlTree, Projection } ◀─┘
//! ```

pub mod builder;
pub mod context;
pub mod convert;
pub mod expr;
pub mod plan;
pub mod sequence;

#[cfg(test)]
mod tests;

pub use builder::ExpressionBuilder;
pub use context::{BuildContext, Capabilities, ContextId, ContextKind, ConvertFlags, SqlInfo};
pub use expr::{BinaryOp, Expr, MemberBinding, NewMember, UnaryOp};
pub use plan::{Projection, QueryKind, QueryPlan};
pub use sequence::{default_builders, BuildInfo, SequenceBuilder, SequenceConvertInfo};

use crate::error::QueryResult;
use crate::mapping::MappingSchema;
use crate::sql_provider::DataProvider;

/// Compile `expr` against `schema` for `provider`.
pub fn compile(provider: &DataProvider, schema: &MappingSchema, expr: &Expr) -> QueryResult<QueryPlan> {
    ExpressionBuilder::new(provider, schema).compile(expr)
}
