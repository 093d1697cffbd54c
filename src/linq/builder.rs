//! The compilation driver.
//!
//! [`ExpressionBuilder`] owns the SQL tree of one compilation and the arena of
//! build contexts over it. Operators are realized by the registered
//! [`SequenceBuilder`]s, tried in registration order; the first whose
//! `can_build` accepts is committed to.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::ast::{NodeId, SqlTree};
use crate::error::{QueryError, QueryResult};
use crate::mapping::MappingSchema;
use crate::sql_provider::{DataProvider, SqlProviderFlags};

use super::context::{BuildContext, ContextId};
use super::expr::Expr;
use super::plan::QueryPlan;
use super::sequence::{default_builders, BuildInfo, SequenceBuilder, SequenceConvertInfo};

pub struct ExpressionBuilder<'a> {
    provider: &'a DataProvider,
    schema: &'a MappingSchema,
    pub(crate) tree: SqlTree,
    pub(crate) contexts: Vec<BuildContext>,
    /// Lambda parameters in scope, innermost last.
    scopes: Vec<(String, ContextId)>,
    builders: Arc<[Box<dyn SequenceBuilder>]>,
}

impl<'a> ExpressionBuilder<'a> {
    pub fn new(provider: &'a DataProvider, schema: &'a MappingSchema) -> Self {
        Self {
            provider,
            schema,
            tree: SqlTree::new(),
            contexts: Vec::new(),
            scopes: Vec::new(),
            builders: default_builders(),
        }
    }

    /// Replace the transformer registry.
    pub fn with_builders(mut self, builders: Vec<Box<dyn SequenceBuilder>>) -> Self {
        self.builders = builders.into();
        self
    }

    pub fn provider(&self) -> &'a DataProvider {
        self.provider
    }

    pub fn schema(&self) -> &'a MappingSchema {
        self.schema
    }

    pub fn flags(&self) -> SqlProviderFlags {
        self.provider.flags()
    }

    pub fn tree(&self) -> &SqlTree {
        &self.tree
    }

    /// Compile a query tree into an executable plan.
    #[instrument(skip_all, fields(provider = %self.provider.name(), root = expr.kind()))]
    pub fn compile(mut self, expr: &Expr) -> QueryResult<QueryPlan> {
        let query = self.tree.new_query();
        let ctx = self.build_sequence(&BuildInfo::new(expr, query))?;
        let kind = self.build_query(ctx)?;
        let root = self.query_of(ctx)?;
        debug!(contexts = self.contexts.len(), nodes = self.tree.len(), "compiled query");
        Ok(QueryPlan::new(self.tree, root, kind))
    }

    /// Realize `info.expr` with the first transformer that accepts it.
    pub fn build_sequence(&mut self, info: &BuildInfo<'_>) -> QueryResult<ContextId> {
        let builders = Arc::clone(&self.builders);
        for builder in builders.iter() {
            if builder.can_build(self, info)? {
                debug!(builder = builder.name(), expr = info.expr.kind(), "building sequence");
                return builder.build_sequence(self, info);
            }
        }
        Err(unsupported_sequence(info.expr))
    }

    /// Whether some transformer would realize `info.expr` as a sequence.
    pub fn is_sequence(&self, info: &BuildInfo<'_>) -> QueryResult<bool> {
        for builder in self.builders.iter() {
            if builder.can_build(self, info)? {
                return Ok(builder.is_sequence());
            }
        }
        Ok(false)
    }

    /// Projection shape of `info.expr`, without building it.
    pub fn convert_sequence(&self, info: &BuildInfo<'_>) -> QueryResult<Option<SequenceConvertInfo>> {
        for builder in self.builders.iter() {
            if builder.can_build(self, info)? {
                return Ok(builder.convert(self, info));
            }
        }
        Ok(None)
    }

    /// Build the source operand `expr` of an operator into the same query as `info`.
    pub fn build_source(&mut self, info: &BuildInfo<'_>, expr: &Expr) -> QueryResult<ContextId> {
        self.build_sequence(&info.with_expr(expr))
    }

    /// Run `f` with `bindings` added to the lambda scope.
    pub fn in_scope<T>(
        &mut self,
        bindings: &[(String, ContextId)],
        f: impl FnOnce(&mut Self) -> QueryResult<T>,
    ) -> QueryResult<T> {
        let depth = self.scopes.len();
        self.scopes.extend(bindings.iter().cloned());
        let result = f(self);
        self.scopes.truncate(depth);
        result
    }

    pub(crate) fn find_scope(&self, name: &str) -> Option<ContextId> {
        self.scopes
            .iter()
            .rev()
            .find(|(param, _)| param == name)
            .map(|&(_, ctx)| ctx)
    }

    /// Context bound to the lambda parameter `name`.
    pub fn lookup(&self, name: &str) -> QueryResult<ContextId> {
        self.find_scope(name)
            .ok_or_else(|| QueryError::unsupported(format!("parameter '{}' is not in scope", name)))
    }

    /// The modifiers on a context's query that a following operator would change the meaning of.
    pub(crate) fn has_paging(&self, query: NodeId) -> QueryResult<bool> {
        let select = &self.tree.query(query)?.select;
        Ok(select.take.is_some() || select.skip.is_some())
    }
}

fn unsupported_sequence(expr: &Expr) -> QueryError {
    match expr.unquote() {
        Expr::Call { method, args } => QueryError::unsupported(format!(
            "'{}' with {} argument(s) is not supported",
            method,
            args.len()
        )),
        other => QueryError::unsupported(format!("{} is not a query", other.kind())),
    }
}
