use crate::ast::{Condition, Node};
use crate::error::{QueryError, QueryResult};
use crate::linq::builder::ExpressionBuilder;
use crate::linq::context::ContextId;
use crate::linq::expr::Expr;

use super::{single_param_lambda, BuildInfo, SequenceBuilder};

/// `Where(source, p => predicate)`.
pub struct WhereBuilder;

impl SequenceBuilder for WhereBuilder {
    fn name(&self) -> &'static str {
        "Where"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info.call_args(&["Where"], &[2]).is_some())
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let (_, args) = info
            .call_args(&["Where"], &[2])
            .ok_or_else(|| QueryError::internal("where without arguments"))?;
        let sequence = builder.build_source(info, &args[0])?;
        builder.apply_filter(sequence, &args[1], "Where")
    }
}

impl ExpressionBuilder<'_> {
    /// Add `lambda` as a WHERE condition over `sequence`, wrapping it first when
    /// it is already paged. Returns the context the rows now come from.
    pub(crate) fn apply_filter(
        &mut self,
        sequence: ContextId,
        lambda: &Expr,
        operator: &str,
    ) -> QueryResult<ContextId> {
        let (param, body) = single_param_lambda(lambda, operator)?;

        let mut sequence = sequence;
        if self.has_paging(self.query_of(sequence)?)? {
            sequence = self.wrap_in_sub_query(sequence)?;
        }
        self.set_alias(sequence, param)?;

        let predicate =
            self.in_scope(&[(param.to_string(), sequence)], |b| b.convert_predicate(body))?;
        let query = self.query_of(sequence)?;
        let where_clause = self.tree.query(query)?.where_clause;

        // Top-level conjunctions become separate WHERE conditions.
        let conjuncts = match self.tree.node(predicate) {
            Node::SearchCondition(sc) if !sc.conditions.iter().any(|c| c.is_or) => {
                Some(sc.conditions.clone())
            }
            _ => None,
        };
        match conjuncts {
            Some(conditions) => {
                for condition in conditions {
                    self.tree.add_condition(where_clause, condition)?;
                }
            }
            None => self.tree.add_condition(where_clause, Condition::and(predicate))?,
        }
        Ok(sequence)
    }
}
