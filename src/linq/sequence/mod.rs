//! Sequence transformers: one per query operator shape.
//!
//! Registration order matters. The driver commits to the first transformer
//! whose [`SequenceBuilder::can_build`] accepts, with no backtracking, so
//! predicates reject anything they would not fully handle.

mod distinct;
mod filter;
mod insert;
mod modify;
mod order_by;
mod scalar_select;
mod select;
mod table;
mod table_ddl;
mod take_skip;

use std::sync::Arc;

use crate::ast::NodeId;
use crate::error::{QueryError, QueryResult};

use super::builder::ExpressionBuilder;
use super::context::ContextId;
use super::expr::Expr;

pub use distinct::DistinctBuilder;
pub use filter::WhereBuilder;
pub use insert::{InsertBuilder, InsertOrUpdateBuilder};
pub use modify::{DeleteBuilder, UpdateBuilder};
pub use order_by::OrderByBuilder;
pub use scalar_select::ScalarSelectBuilder;
pub use select::SelectBuilder;
pub use table::TableBuilder;
pub use table_ddl::{CreateTableBuilder, DropBuilder};
pub use take_skip::TakeSkipBuilder;

/// The call site being built.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo<'e> {
    pub expr: &'e Expr,
    /// Query the sequence adds its clauses to.
    pub query: NodeId,
    pub parent: Option<ContextId>,
}

impl<'e> BuildInfo<'e> {
    pub fn new(expr: &'e Expr, query: NodeId) -> Self {
        Self {
            expr,
            query,
            parent: None,
        }
    }

    /// The same build position for another expression.
    pub fn with_expr<'x>(&self, expr: &'x Expr) -> BuildInfo<'x> {
        BuildInfo {
            expr,
            query: self.query,
            parent: self.parent,
        }
    }

    /// Arguments of a call to one of `methods`, when it has `arity` of them.
    pub fn call_args(&self, methods: &[&str], arity: &[usize]) -> Option<(&'e str, &'e [Expr])> {
        self.expr
            .as_call(methods)
            .filter(|(_, args)| arity.contains(&args.len()))
    }
}

/// Projection shape of a sequence, known without building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceConvertInfo {
    /// Projected member names, in declaration order.
    pub members: Vec<String>,
}

pub trait SequenceBuilder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Structural match of the call site. May fail for a recognized operator
    /// with an argument shape that cannot be translated.
    fn can_build(&self, builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool>;

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId>;

    /// Whether a matched call produces a sequence.
    fn is_sequence(&self) -> bool {
        true
    }

    fn convert(
        &self,
        _builder: &ExpressionBuilder<'_>,
        _info: &BuildInfo<'_>,
    ) -> Option<SequenceConvertInfo> {
        None
    }
}

/// The shipped transformers, in match order.
pub fn default_builders() -> Arc<[Box<dyn SequenceBuilder>]> {
    let builders: Vec<Box<dyn SequenceBuilder>> = vec![
        Box::new(TableBuilder),
        Box::new(ScalarSelectBuilder),
        Box::new(SelectBuilder),
        Box::new(WhereBuilder),
        Box::new(OrderByBuilder),
        Box::new(TakeSkipBuilder),
        Box::new(DistinctBuilder),
        Box::new(DeleteBuilder),
        Box::new(UpdateBuilder),
        Box::new(InsertBuilder),
        Box::new(InsertOrUpdateBuilder),
        Box::new(CreateTableBuilder),
        Box::new(DropBuilder),
    ];
    builders.into()
}

/// Parameter and body of a one-parameter lambda argument.
pub(crate) fn single_param_lambda<'e>(
    expr: &'e Expr,
    operator: &str,
) -> QueryResult<(&'e str, &'e Expr)> {
    match expr.as_lambda() {
        Some(([param], body)) => Ok((param.as_str(), body)),
        Some((params, _)) => Err(QueryError::unsupported(format!(
            "'{}' expects a lambda with one parameter, got {}",
            operator,
            params.len()
        ))),
        None => Err(QueryError::unsupported(format!(
            "'{}' expects a lambda, got {}",
            operator,
            expr.unquote().kind()
        ))),
    }
}

/// `member = value` pairs of a setter body, which must be an entity initializer.
pub(crate) fn setter_assignments(body: &Expr, operator: &str) -> QueryResult<Vec<(String, Expr)>> {
    match body {
        Expr::MemberInit { type_name, args, .. } if !args.is_empty() => {
            Err(QueryError::unsupported(format!(
                "'{}' setter cannot pass constructor arguments to '{}'",
                operator, type_name
            )))
        }
        Expr::MemberInit { .. } => Ok(super::context::projected_members(body)?.unwrap_or_default()),
        other => Err(QueryError::unsupported(format!(
            "'{}' setter must initialize an entity, got {}",
            operator,
            other.kind()
        ))),
    }
}
