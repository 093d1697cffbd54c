use crate::error::{QueryError, QueryResult};
use crate::linq::builder::ExpressionBuilder;
use crate::linq::context::{projected_members, ContextId, ContextKind};
use crate::linq::expr::Expr;

use super::{single_param_lambda, BuildInfo, SequenceBuilder, SequenceConvertInfo};

/// `Select(source, p => …)`.
pub struct SelectBuilder;

impl SequenceBuilder for SelectBuilder {
    fn name(&self) -> &'static str {
        "Select"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info.call_args(&["Select"], &[2]).is_some())
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let (_, args) = info
            .call_args(&["Select"], &[2])
            .ok_or_else(|| QueryError::internal("select without arguments"))?;
        let (param, body) = single_param_lambda(&args[1], "Select")?;

        let mut sequence = builder.build_source(info, &args[0])?;
        // Identity projection.
        if matches!(body, Expr::Parameter(p) if p == param) {
            return Ok(sequence);
        }
        if builder.tree.query(builder.query_of(sequence)?)?.select.is_distinct {
            sequence = builder.wrap_in_sub_query(sequence)?;
        }
        builder.set_alias(sequence, param)?;

        let query = builder.query_of(sequence)?;
        let parent = builder.context(sequence)?.parent;
        let ctx = builder.add_context(
            query,
            ContextKind::Select {
                sequence,
                param: param.to_string(),
                body: body.clone(),
            },
        );
        builder.contexts[ctx.0].parent = parent;
        builder.contexts[sequence.0].parent = Some(ctx);
        Ok(ctx)
    }

    fn convert(
        &self,
        _builder: &ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> Option<SequenceConvertInfo> {
        let (_, args) = info.call_args(&["Select"], &[2])?;
        let (_, body) = args[1].as_lambda()?;
        let members = projected_members(body).ok()??;
        Some(SequenceConvertInfo {
            members: members.into_iter().map(|(name, _)| name).collect(),
        })
    }
}
