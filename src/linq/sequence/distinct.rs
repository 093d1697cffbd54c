use crate::error::{QueryError, QueryResult};
use crate::linq::builder::ExpressionBuilder;
use crate::linq::context::ContextId;

use super::{BuildInfo, SequenceBuilder};

/// `Distinct(source)`.
pub struct DistinctBuilder;

impl SequenceBuilder for DistinctBuilder {
    fn name(&self) -> &'static str {
        "Distinct"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info.call_args(&["Distinct"], &[1]).is_some())
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let (_, args) = info
            .call_args(&["Distinct"], &[1])
            .ok_or_else(|| QueryError::internal("distinct without a source"))?;
        let mut sequence = builder.build_source(info, &args[0])?;
        if builder.has_paging(builder.query_of(sequence)?)? {
            sequence = builder.wrap_in_sub_query(sequence)?;
        }
        let query = builder.query_of(sequence)?;
        builder.tree.query_mut(query)?.select.is_distinct = true;
        Ok(sequence)
    }
}
