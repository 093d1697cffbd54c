use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::linq::builder::ExpressionBuilder;
use crate::linq::context::{ContextId, ContextKind};
use crate::linq::expr::Expr;

use super::{BuildInfo, SequenceBuilder, SequenceConvertInfo};

/// All rows of a mapped entity.
pub struct TableBuilder;

impl SequenceBuilder for TableBuilder {
    fn name(&self) -> &'static str {
        "Table"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(matches!(info.expr.unquote(), Expr::Table(_)))
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let Expr::Table(entity) = info.expr.unquote() else {
            return Err(QueryError::internal("table builder applied to a non-table"));
        };
        let descriptor = builder.schema().entity(entity)?;
        let table = builder.tree.table_from_entity(descriptor);
        builder.tree.add_from(info.query, table, None)?;
        debug!(entity = %entity, table = %table, "added table source");
        Ok(builder.add_context(info.query, ContextKind::Table { table }))
    }

    fn convert(
        &self,
        builder: &ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> Option<SequenceConvertInfo> {
        let Expr::Table(entity) = info.expr.unquote() else {
            return None;
        };
        let descriptor = builder.schema().entity(entity).ok()?;
        Some(SequenceConvertInfo {
            members: descriptor.columns.iter().map(|c| c.member.clone()).collect(),
        })
    }
}
