use crate::error::{QueryError, QueryResult};
use crate::linq::builder::ExpressionBuilder;
use crate::linq::context::{ContextId, ContextKind};

use super::{BuildInfo, SequenceBuilder};

/// `Select(() => …)`: a query without a source, such as `SELECT 1`.
pub struct ScalarSelectBuilder;

impl SequenceBuilder for ScalarSelectBuilder {
    fn name(&self) -> &'static str {
        "ScalarSelect"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info
            .call_args(&["Select"], &[1])
            .and_then(|(_, args)| args[0].as_lambda())
            .is_some_and(|(params, _)| params.is_empty()))
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let body = info
            .call_args(&["Select"], &[1])
            .and_then(|(_, args)| args[0].as_lambda())
            .map(|(_, body)| body.clone())
            .ok_or_else(|| QueryError::internal("scalar select without a lambda"))?;
        Ok(builder.add_context(info.query, ContextKind::ScalarSelect { body }))
    }
}
