use crate::ast::QueryType;
use crate::error::{QueryError, QueryResult};
use crate::linq::builder::ExpressionBuilder;
use crate::linq::context::{ContextId, ContextKind};

use super::{BuildInfo, SequenceBuilder};

/// `CreateTable(table)`.
pub struct CreateTableBuilder;

impl SequenceBuilder for CreateTableBuilder {
    fn name(&self) -> &'static str {
        "CreateTable"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info.call_args(&["CreateTable"], &[1]).is_some())
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let sequence = build_table_statement(builder, info, "CreateTable", false)?;
        let query = builder.query_of(sequence)?;
        Ok(builder.add_context(
            query,
            ContextKind::Statement {
                sequence,
                returns_identity: false,
            },
        ))
    }

    fn is_sequence(&self) -> bool {
        false
    }
}

/// `DropTable(table)`.
pub struct DropBuilder;

impl SequenceBuilder for DropBuilder {
    fn name(&self) -> &'static str {
        "Drop"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info.call_args(&["DropTable"], &[1]).is_some())
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let sequence = build_table_statement(builder, info, "DropTable", true)?;
        let query = builder.query_of(sequence)?;
        Ok(builder.add_context(query, ContextKind::Drop { sequence }))
    }

    fn is_sequence(&self) -> bool {
        false
    }
}

/// Build the table operand and mark its query as a table statement.
fn build_table_statement(
    builder: &mut ExpressionBuilder<'_>,
    info: &BuildInfo<'_>,
    method: &str,
    is_drop: bool,
) -> QueryResult<ContextId> {
    let (_, args) = info
        .call_args(&[method], &[1])
        .ok_or_else(|| QueryError::internal(format!("{} without a table", method)))?;
    let sequence = builder.build_source(info, &args[0])?;
    let table = match builder.context(sequence)?.kind {
        ContextKind::Table { table } => table,
        ref other => {
            return Err(QueryError::unsupported(format!(
                "'{}' needs a table, got a {}",
                method,
                other.name()
            )));
        }
    };
    let query = builder.query_of(sequence)?;
    let q = builder.tree.query_mut(query)?;
    q.query_type = QueryType::CreateTable;
    q.create_table.table = Some(table);
    q.create_table.is_drop = is_drop;
    Ok(sequence)
}
