use tracing::debug;

use crate::ast::{NodeId, QueryType, SetExpression};
use crate::error::{QueryError, QueryResult};
use crate::linq::builder::ExpressionBuilder;
use crate::linq::context::{ContextId, ContextKind};
use crate::linq::expr::Expr;

use super::{setter_assignments, single_param_lambda, BuildInfo, SequenceBuilder};

const METHODS: &[&str] = &["Insert", "InsertWithIdentity"];

/// `Insert(table, () => new T { … })` and the insert-from-select form
/// `Insert(source, table, p => new T { … })`, each optionally returning the identity.
pub struct InsertBuilder;

impl SequenceBuilder for InsertBuilder {
    fn name(&self) -> &'static str {
        "Insert"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info.call_args(METHODS, &[2, 3]).is_some())
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let (method, args) = info
            .call_args(METHODS, &[2, 3])
            .ok_or_else(|| QueryError::internal("insert without arguments"))?;
        let with_identity = method == "InsertWithIdentity";

        let (query, table, items) = match args {
            [target, setter] => {
                let body = match setter.as_lambda() {
                    Some(([], body)) => body,
                    _ => {
                        return Err(QueryError::unsupported(format!(
                            "'{}' expects a parameterless setter",
                            method
                        )));
                    }
                };
                let table = builder.target_table(target)?;
                let items = builder.setter_items(table, body, method, &[])?;
                (info.query, table, items)
            }
            [source, target, setter] => {
                let source = builder.build_source(info, source)?;
                let (param, body) = single_param_lambda(setter, method)?;
                builder.set_alias(source, param)?;
                let table = builder.target_table(target)?;
                let items =
                    builder.setter_items(table, body, method, &[(param.to_string(), source)])?;
                debug!(source = %source, "insert from select");
                (builder.query_of(source)?, table, items)
            }
            _ => return Err(QueryError::internal("insert arity")),
        };

        let q = builder.tree.query_mut(query)?;
        q.query_type = QueryType::Insert;
        q.insert.into = Some(table);
        q.insert.items = items;
        q.insert.with_identity = with_identity;

        let target = builder.add_context(query, ContextKind::Table { table });
        Ok(builder.add_context(
            query,
            ContextKind::Statement {
                sequence: target,
                returns_identity: with_identity,
            },
        ))
    }

    fn is_sequence(&self) -> bool {
        false
    }
}

/// `InsertOrUpdate(table, () => new T { … }, p => new T { … })`, keyed on the table's primary key.
pub struct InsertOrUpdateBuilder;

impl SequenceBuilder for InsertOrUpdateBuilder {
    fn name(&self) -> &'static str {
        "InsertOrUpdate"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        Ok(info.call_args(&["InsertOrUpdate"], &[3]).is_some())
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let (method, args) = info
            .call_args(&["InsertOrUpdate"], &[3])
            .ok_or_else(|| QueryError::internal("insert-or-update without arguments"))?;
        let [target, insert_setter, update_setter] = args else {
            return Err(QueryError::internal("insert-or-update arity"));
        };

        let sequence = builder.build_source(info, target)?;
        let table = match builder.context(sequence)?.kind {
            ContextKind::Table { table } => table,
            ref other => {
                return Err(QueryError::unsupported(format!(
                    "'{}' target must be a table, got a {}",
                    method,
                    other.name()
                )));
            }
        };

        let insert_body = match insert_setter.as_lambda() {
            Some(([], body)) => body,
            _ => {
                return Err(QueryError::unsupported(format!(
                    "'{}' expects a parameterless insert setter",
                    method
                )));
            }
        };
        let (param, update_body) = single_param_lambda(update_setter, method)?;
        builder.set_alias(sequence, param)?;

        let insert_items = builder.setter_items(table, insert_body, method, &[])?;
        let update_items =
            builder.setter_items(table, update_body, method, &[(param.to_string(), sequence)])?;

        let keys = builder.tree.table_keys(table)?;
        if keys.is_empty() {
            return Err(QueryError::unsupported(format!(
                "'{}' requires a primary key on '{}'",
                method,
                builder.tree.table(table)?.name
            )));
        }
        let mut key_items = Vec::with_capacity(keys.len());
        for key in keys {
            let item = insert_items
                .iter()
                .find(|item| item.column == key)
                .ok_or_else(|| {
                    let member = builder
                        .tree
                        .field(key)
                        .map(|f| f.name.clone())
                        .unwrap_or_default();
                    QueryError::unsupported(format!(
                        "'{}' insert setter must assign key member '{}'",
                        method, member
                    ))
                })?;
            key_items.push(*item);
        }

        let query = builder.query_of(sequence)?;
        let q = builder.tree.query_mut(query)?;
        q.query_type = QueryType::InsertOrUpdate;
        q.insert.into = Some(table);
        q.insert.items = insert_items;
        q.update.table = Some(table);
        q.update.items = update_items;
        q.update.keys = key_items;
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

impl ExpressionBuilder<'_> {
    /// A fresh table node for a modification target, outside any FROM clause.
    fn target_table(&mut self, target: &Expr) -> QueryResult<NodeId> {
        match target.unquote() {
            Expr::Table(entity) => {
                let descriptor = self.schema().entity(entity)?;
                Ok(self.tree.table_from_entity(descriptor))
            }
            other => Err(QueryError::unsupported(format!(
                "insert target must be a table, got {}",
                other.kind()
            ))),
        }
    }

    /// `column = value` items of a setter over `table`, converted with `scope` bound.
    fn setter_items(
        &mut self,
        table: NodeId,
        body: &Expr,
        operator: &str,
        scope: &[(String, ContextId)],
    ) -> QueryResult<Vec<SetExpression>> {
        let mut items = Vec::new();
        for (member, expr) in setter_assignments(body, operator)? {
            let column = self.tree.table_field(table, &member)?;
            let expr = self.in_scope(scope, |b| b.convert_scalar(&expr))?;
            items.push(SetExpression { column, expr });
        }
        Ok(items)
    }
}
