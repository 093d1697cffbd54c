use crate::ast::{QueryType, SetExpression};
use crate::error::{QueryError, QueryResult};
use crate::linq::builder::ExpressionBuilder;
use crate::linq::context::{ContextId, ContextKind};

use super::{setter_assignments, single_param_lambda, BuildInfo, SequenceBuilder};

/// `Delete(source)` and `Delete(source, p => predicate)`.
pub struct DeleteBuilder;

impl SequenceBuilder for DeleteBuilder {
    fn name(&self) -> &'static str {
        "Delete"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info.call_args(&["Delete"], &[1, 2]).is_some())
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let (_, args) = info
            .call_args(&["Delete"], &[1, 2])
            .ok_or_else(|| QueryError::internal("delete without a source"))?;
        let mut sequence = builder.build_source(info, &args[0])?;
        if let Some(predicate) = args.get(1) {
            sequence = builder.apply_filter(sequence, predicate, "Delete")?;
        }

        let table = builder.find_table(sequence)?;
        let query = builder.query_of(sequence)?;
        let q = builder.tree.query_mut(query)?;
        q.query_type = QueryType::Delete;
        q.delete.table = Some(table);
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

/// `Update(source, p => new T { … })` and `Update(source, p => predicate, p => new T { … })`.
pub struct UpdateBuilder;

impl SequenceBuilder for UpdateBuilder {
    fn name(&self) -> &'static str {
        "Update"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info.call_args(&["Update"], &[2, 3]).is_some())
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let (_, args) = info
            .call_args(&["Update"], &[2, 3])
            .ok_or_else(|| QueryError::internal("update without arguments"))?;
        let mut sequence = builder.build_source(info, &args[0])?;
        let setter = match args {
            [_, predicate, setter] => {
                sequence = builder.apply_filter(sequence, predicate, "Update")?;
                setter
            }
            [_, setter] => setter,
            _ => return Err(QueryError::internal("update arity")),
        };
        let (param, body) = single_param_lambda(setter, "Update")?;
        let table = builder.find_table(sequence)?;
        builder.set_alias(sequence, param)?;

        let scope = [(param.to_string(), sequence)];
        let mut items = Vec::new();
        for (member, expr) in setter_assignments(body, "Update")? {
            let column = builder.tree.table_field(table, &member)?;
            let expr = builder.in_scope(&scope, |b| b.convert_scalar(&expr))?;
            items.push(SetExpression { column, expr });
        }

        let query = builder.query_of(sequence)?;
        let q = builder.tree.query_mut(query)?;
        q.query_type = QueryType::Update;
        q.update.table = Some(table);
        q.update.items = items;
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
