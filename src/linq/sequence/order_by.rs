use crate::error::{QueryError, QueryResult};
use crate::linq::builder::ExpressionBuilder;
use crate::linq::context::{projected_members, ContextId, ConvertFlags, SqlInfo};
use crate::linq::expr::{Expr, MemberBinding};

use super::{single_param_lambda, BuildInfo, SequenceBuilder};

const METHODS: &[&str] = &["OrderBy", "OrderByDescending", "ThenBy", "ThenByDescending"];

/// `OrderBy`, `OrderByDescending`, `ThenBy` and `ThenByDescending`.
pub struct OrderByBuilder;

impl SequenceBuilder for OrderByBuilder {
    fn name(&self) -> &'static str {
        "OrderBy"
    }

    fn can_build(&self, _builder: &ExpressionBuilder<'_>, info: &BuildInfo<'_>) -> QueryResult<bool> {
        let Some((_, args)) = info.call_args(METHODS, &[2]) else {
            return Ok(false);
        };
        if let Some((
            _,
            Expr::MemberInit {
                type_name,
                args,
                bindings,
            },
        )) = args[1].as_lambda()
        {
            let explicit = !args.is_empty()
                || bindings.is_empty()
                || bindings
                    .iter()
                    .any(|b| !matches!(b, MemberBinding::Assignment { .. }));
            if explicit {
                return Err(QueryError::unsupported(format!(
                    "Explicit construction of entity type '{}' in order by is not allowed.",
                    type_name
                )));
            }
        }
        Ok(true)
    }

    fn build_sequence(
        &self,
        builder: &mut ExpressionBuilder<'_>,
        info: &BuildInfo<'_>,
    ) -> QueryResult<ContextId> {
        let (method, args) = info
            .call_args(METHODS, &[2])
            .ok_or_else(|| QueryError::internal("order by without arguments"))?;
        let (param, body) = single_param_lambda(&args[1], method)?;

        let mut sequence = builder.build_source(info, &args[0])?;
        let wrap = {
            let select = &builder.tree.query(builder.query_of(sequence)?)?.select;
            select.take.is_some()
                || select.skip.is_some()
                || (select.is_distinct && !builder.flags().is_distinct_order_by_supported)
        };
        if wrap {
            sequence = builder.wrap_in_sub_query(sequence)?;
        }
        builder.set_alias(sequence, param)?;

        let query = builder.query_of(sequence)?;
        if !method.starts_with("ThenBy") {
            builder.tree.query_mut(query)?.order_by.clear();
        }
        let is_descending = method.ends_with("Descending");

        let keys = builder.in_scope(&[(param.to_string(), sequence)], |b| b.order_keys(body))?;
        for key in keys {
            builder.tree.order_by_add(query, key.sql, is_descending)?;
        }
        Ok(sequence)
    }
}

impl ExpressionBuilder<'_> {
    /// Key expressions of an ordering lambda body; an entity orders by its keys.
    fn order_keys(&mut self, body: &Expr) -> QueryResult<Vec<SqlInfo>> {
        let Some(members) = projected_members(body)? else {
            return self.convert_expr_infos(body, ConvertFlags::Key);
        };
        let mut keys = Vec::new();
        for (_, member) in members {
            keys.extend(self.convert_expr_infos(&member, ConvertFlags::Key)?);
        }
        Ok(keys)
    }
}
