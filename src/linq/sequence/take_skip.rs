use crate::ast::{Node, NodeId, Precedence, SqlParameter};
use crate::error::{QueryError, QueryResult};
use crate::linq::builder::ExpressionBuilder;
use crate::linq::context::ContextId;
use crate::linq::expr::Expr;
use crate::value::ScalarType;

use super::{BuildInfo, SequenceBuilder};

/// `Take(source, n)` and `Skip(source, n)`.
pub struct TakeSkipBuilder;

impl SequenceBuilder for TakeSkipBuilder {
    fn name(&self) -> &'static str {
        "TakeSkip"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info.call_args(&["Take", "Skip"], &[2]).is_some())
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let (method, args) = info
            .call_args(&["Take", "Skip"], &[2])
            .ok_or_else(|| QueryError::internal("take/skip without arguments"))?;
        let flags = builder.flags();
        let supported = match method {
            "Take" => flags.is_take_supported,
            _ => flags.is_skip_supported,
        };
        if !supported {
            return Err(QueryError::unsupported(format!(
                "'{}' is not supported by {}",
                method,
                builder.provider().name()
            )));
        }

        let sequence = builder.build_source(info, &args[0])?;
        let count = builder.convert_count(&args[1], flags.accepts_take_as_parameter)?;
        match method {
            "Take" => builder.build_take(sequence, count),
            _ => builder.build_skip(sequence, count),
        }
    }
}

impl ExpressionBuilder<'_> {
    /// A row count; captured values stay parameters only where the dialect accepts them.
    fn convert_count(&mut self, expr: &Expr, as_parameter: bool) -> QueryResult<NodeId> {
        match expr.unquote() {
            Expr::QueryParam { name, value } if as_parameter => {
                Ok(self.tree.add(SqlParameter::new(name.clone(), value.clone())))
            }
            Expr::QueryParam { value, .. } => Ok(self.tree.value(value.clone())),
            other => self.convert_scalar(other),
        }
    }

    fn literal_count(&self, id: NodeId) -> Option<i64> {
        match self.tree.node(id) {
            Node::Value(v) => v.value.as_i64(),
            _ => None,
        }
    }

    fn is_parameter(&self, id: NodeId) -> bool {
        matches!(self.tree.node(id), Node::Parameter(_))
    }

    fn build_take(&mut self, sequence: ContextId, count: NodeId) -> QueryResult<ContextId> {
        let mut sequence = sequence;
        let existing = self.tree.query(self.query_of(sequence)?)?.select.take;
        let take = match existing {
            None => count,
            Some(prev) => match (self.literal_count(prev), self.literal_count(count)) {
                (Some(a), Some(b)) => self.tree.value(a.min(b)),
                _ => {
                    sequence = self.wrap_in_sub_query(sequence)?;
                    count
                }
            },
        };
        let query = self.query_of(sequence)?;
        self.tree.query_mut(query)?.select.take = Some(take);
        Ok(sequence)
    }

    fn build_skip(&mut self, sequence: ContextId, count: NodeId) -> QueryResult<ContextId> {
        let query = self.query_of(sequence)?;
        let select = self.tree.query(query)?.select.clone();

        // Rows skipped after a take come out of that take.
        if let Some(take) = select.take {
            let take = match (self.literal_count(take), self.literal_count(count)) {
                (Some(t), Some(s)) => self.tree.value(t.saturating_sub(s).max(0)),
                _ => self
                    .tree
                    .binary(take, "-", count, ScalarType::Int, Precedence::Subtraction),
            };
            self.tree.query_mut(query)?.select.take = Some(take);
        }

        let skip = match select.skip {
            None => count,
            Some(prev) => self.combine_skip(prev, count)?,
        };
        self.tree.query_mut(query)?.select.skip = Some(skip);
        Ok(sequence)
    }

    fn combine_skip(&mut self, prev: NodeId, count: NodeId) -> QueryResult<NodeId> {
        match (self.literal_count(prev), self.literal_count(count)) {
            (Some(a), Some(b)) => {
                let skip = a.checked_add(b).ok_or_else(|| {
                    QueryError::unsupported(format!("skipping {} then {} rows overflows", a, b))
                })?;
                Ok(self.tree.value(skip))
            }
            (None, Some(n)) if self.is_parameter(prev) => {
                self.tree.parameter_mut(prev)?.set_take_converter(n);
                Ok(prev)
            }
            (Some(n), None) if self.is_parameter(count) => {
                self.tree.parameter_mut(count)?.set_take_converter(n);
                Ok(count)
            }
            _ => Ok(self
                .tree
                .binary(prev, "+", count, ScalarType::Int, Precedence::Additive)),
        }
    }
}
