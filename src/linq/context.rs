//! Build contexts: the pieces of a query being compiled, each mapped onto a
//! slice of the SQL tree.
//!
//! Contexts live in the [`ExpressionBuilder`]'s arena and are addressed by
//! [`ContextId`]. What a context can do is described by its variant and
//! summarized by [`Capabilities`]; read operations on a context that produces
//! no rows are contract violations and fail with an internal error.

use tracing::debug;

use crate::ast::{Node, NodeId};
use crate::error::{QueryError, QueryResult};
use crate::value::ScalarType;

use super::builder::ExpressionBuilder;
use super::expr::{Expr, MemberBinding};
use super::plan::{Projection, QueryKind};

/// Marker of compiler-generated lambda parameter names, which never become aliases.
const SYNTHETIC_ALIAS_MARKER: char = '<';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) usize);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

/// What a context can answer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Executing the context yields rows.
    pub returns_rows: bool,
    /// The context is a physical table.
    pub is_table: bool,
    /// The context wraps another one in a nested query.
    pub is_sub_query: bool,
    /// The projection is a single value rather than an entity or record.
    pub is_scalar: bool,
    /// The context is a bare expression with no source.
    pub is_expression: bool,
}

/// How much of an entity a member reference expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertFlags {
    /// The referenced expression itself; an entity stays a table.
    Field,
    /// Key columns of an entity.
    Key,
    /// Every mapped column of an entity.
    All,
}

/// One SQL expression a reference resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlInfo {
    pub sql: NodeId,
    /// Member the expression was reached through.
    pub member: Option<String>,
    /// Position in the owning context's select list.
    pub index: Option<usize>,
}

impl SqlInfo {
    pub fn new(sql: NodeId) -> Self {
        Self {
            sql,
            member: None,
            index: None,
        }
    }

    fn with_member(mut self, member: &str) -> Self {
        if self.member.is_none() {
            self.member = Some(member.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContextKind {
    /// Rows of a physical table.
    Table { table: NodeId },
    /// A projection over `sequence`, with `param` bound to its rows.
    Select {
        sequence: ContextId,
        param: String,
        body: Expr,
    },
    /// `sub` wrapped in the context's own query.
    SubQuery { sub: ContextId },
    /// A query without source, such as `SELECT 1`.
    ScalarSelect { body: Expr },
    /// `DROP TABLE` over the table of `sequence`.
    Drop { sequence: ContextId },
    /// INSERT, UPDATE, DELETE or CREATE TABLE over `sequence`.
    Statement {
        sequence: ContextId,
        returns_identity: bool,
    },
}

impl ContextKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContextKind::Table { .. } => "table",
            ContextKind::Select { .. } => "select",
            ContextKind::SubQuery { .. } => "sub-query",
            ContextKind::ScalarSelect { .. } => "scalar select",
            ContextKind::Drop { .. } => "drop",
            ContextKind::Statement { .. } => "statement",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildContext {
    pub parent: Option<ContextId>,
    /// The query this context adds its clauses to.
    pub query: NodeId,
    pub kind: ContextKind,
}

/// Members of an anonymous or entity projection, with the expressions they are bound to.
pub(crate) fn projected_members(body: &Expr) -> QueryResult<Option<Vec<(String, Expr)>>> {
    match body {
        Expr::New { members } => Ok(Some(
            members
                .iter()
                .map(|m| (m.name.clone(), m.expr.clone()))
                .collect(),
        )),
        Expr::MemberInit { bindings, .. } => {
            let mut members = Vec::with_capacity(bindings.len());
            for binding in bindings {
                match binding {
                    MemberBinding::Assignment { member, expr } => {
                        members.push((member.clone(), expr.clone()));
                    }
                    other => {
                        return Err(QueryError::unsupported(format!(
                            "binding of member '{}' is not an assignment",
                            other.member()
                        )));
                    }
                }
            }
            Ok(Some(members))
        }
        _ => Ok(None),
    }
}

impl ExpressionBuilder<'_> {
    pub fn context(&self, ctx: ContextId) -> QueryResult<&BuildContext> {
        self.contexts
            .get(ctx.0)
            .ok_or_else(|| QueryError::internal(format!("unknown context {}", ctx)))
    }

    pub fn query_of(&self, ctx: ContextId) -> QueryResult<NodeId> {
        Ok(self.context(ctx)?.query)
    }

    pub(crate) fn add_context(&mut self, query: NodeId, kind: ContextKind) -> ContextId {
        let id = ContextId(self.contexts.len());
        self.contexts.push(BuildContext {
            parent: None,
            query,
            kind,
        });
        id
    }

    fn kind_of(&self, ctx: ContextId) -> QueryResult<ContextKind> {
        Ok(self.context(ctx)?.kind.clone())
    }

    fn not_readable(&self, ctx: ContextId, operation: &str) -> QueryError {
        let name = self
            .context(ctx)
            .map(|c| c.kind.name())
            .unwrap_or("unknown");
        QueryError::internal(format!("{} context does not support {}", name, operation))
    }

    /// Wrap `ctx` into a new query that selects from its query.
    pub fn wrap_in_sub_query(&mut self, ctx: ContextId) -> QueryResult<ContextId> {
        let inner = self.query_of(ctx)?;
        let parent_select = self.tree.query(inner)?.parent_select;
        let outer = self.tree.new_query();
        self.tree.query_mut(outer)?.parent_select = parent_select;
        self.tree.add_from(outer, inner, None)?;

        let parent = self.context(ctx)?.parent;
        let id = self.add_context(outer, ContextKind::SubQuery { sub: ctx });
        self.contexts[id.0].parent = parent;
        self.contexts[ctx.0].parent = Some(id);
        debug!(context = %ctx, inner = %inner, outer = %outer, "wrapped sequence in a sub-query");
        Ok(id)
    }

    pub fn capabilities(&self, ctx: ContextId) -> QueryResult<Capabilities> {
        Ok(match &self.context(ctx)?.kind {
            ContextKind::Table { .. } => Capabilities {
                returns_rows: true,
                is_table: true,
                ..Default::default()
            },
            ContextKind::Select { body, .. } => Capabilities {
                returns_rows: true,
                is_scalar: !matches!(
                    body,
                    Expr::New { .. } | Expr::MemberInit { .. } | Expr::Parameter(_)
                ),
                ..Default::default()
            },
            ContextKind::SubQuery { sub } => Capabilities {
                returns_rows: true,
                is_sub_query: true,
                is_scalar: self.capabilities(*sub)?.is_scalar,
                ..Default::default()
            },
            ContextKind::ScalarSelect { body } => Capabilities {
                returns_rows: true,
                is_scalar: projected_members(body)?.is_none(),
                is_expression: true,
                ..Default::default()
            },
            ContextKind::Drop { .. } | ContextKind::Statement { .. } => Capabilities::default(),
        })
    }

    /// Resolve the member `path` of `ctx`'s rows to SQL expressions.
    pub fn convert_to_sql(
        &mut self,
        ctx: ContextId,
        path: &[String],
        flags: ConvertFlags,
    ) -> QueryResult<Vec<SqlInfo>> {
        match self.kind_of(ctx)? {
            ContextKind::Table { table } => self.convert_table_member(table, path, flags),
            ContextKind::Select {
                sequence,
                param,
                body,
            } => {
                let bindings = [(param, sequence)];
                match (projected_members(&body)?, path) {
                    (Some(members), []) => {
                        let mut infos = Vec::new();
                        for (name, expr) in members {
                            let converted =
                                self.in_scope(&bindings, |b| b.convert_expr_infos(&expr, flags))?;
                            infos.extend(converted.into_iter().map(|info| info.with_member(&name)));
                        }
                        Ok(infos)
                    }
                    (Some(members), [first, rest @ ..]) => {
                        let (_, expr) = members
                            .into_iter()
                            .find(|(name, _)| name == first)
                            .ok_or_else(|| QueryError::UnknownMember {
                                entity: "projection".to_string(),
                                member: first.clone(),
                            })?;
                        let expr = expr.with_path(rest);
                        self.in_scope(&bindings, |b| b.convert_expr_infos(&expr, flags))
                    }
                    (None, path) => {
                        let expr = body.with_path(path);
                        self.in_scope(&bindings, |b| b.convert_expr_infos(&expr, flags))
                    }
                }
            }
            ContextKind::SubQuery { sub } => {
                let infos = self.convert_to_index(sub, path, flags)?;
                let sub_query = self.query_of(sub)?;
                let columns = self.tree.query(sub_query)?.select.columns.clone();
                infos
                    .into_iter()
                    .map(|info| {
                        let index = info
                            .index
                            .ok_or_else(|| QueryError::internal("sub-query column has no index"))?;
                        let column = *columns.get(index).ok_or_else(|| {
                            QueryError::internal(format!("sub-query has no column {}", index))
                        })?;
                        Ok(SqlInfo {
                            sql: column,
                            member: info.member,
                            index: None,
                        })
                    })
                    .collect()
            }
            ContextKind::ScalarSelect { .. }
            | ContextKind::Drop { .. }
            | ContextKind::Statement { .. } => Err(self.not_readable(ctx, "member conversion")),
        }
    }

    fn convert_table_member(
        &mut self,
        table: NodeId,
        path: &[String],
        flags: ConvertFlags,
    ) -> QueryResult<Vec<SqlInfo>> {
        match path {
            [] => {
                let fields = match flags {
                    ConvertFlags::Field => return Ok(vec![SqlInfo::new(table)]),
                    ConvertFlags::Key => {
                        let keys = self.tree.table_keys(table)?;
                        if keys.is_empty() {
                            self.tree.table(table)?.fields.clone()
                        } else {
                            keys
                        }
                    }
                    ConvertFlags::All => self.tree.table(table)?.fields.clone(),
                };
                fields
                    .into_iter()
                    .map(|f| Ok(SqlInfo::new(f).with_member(&self.tree.field(f)?.name)))
                    .collect()
            }
            [member] => {
                let field = self.tree.table_field(table, member)?;
                Ok(vec![SqlInfo::new(field).with_member(member)])
            }
            [member, ..] => Err(QueryError::unsupported(format!(
                "association '{}' of '{}' cannot be navigated",
                member,
                self.tree.table(table)?.name
            ))),
        }
    }

    /// [`convert_to_sql`](Self::convert_to_sql), with every expression projected
    /// in `ctx`'s query and its column index recorded.
    pub fn convert_to_index(
        &mut self,
        ctx: ContextId,
        path: &[String],
        flags: ConvertFlags,
    ) -> QueryResult<Vec<SqlInfo>> {
        let query = self.query_of(ctx)?;
        // A whole entity is projected column by column.
        let flags = match (flags, path) {
            (ConvertFlags::Field, []) => ConvertFlags::All,
            (flags, _) => flags,
        };
        let infos = self.convert_to_sql(ctx, path, flags)?;
        infos
            .into_iter()
            .map(|mut info| {
                info.index = Some(self.tree.select_add(query, info.sql)?);
                Ok(info)
            })
            .collect()
    }

    /// Index of `sub`'s column `index` within the select list of the sub-query `ctx` wrapping it.
    fn sub_query_index(&mut self, ctx: ContextId, sub: ContextId, index: usize) -> QueryResult<usize> {
        let sub_query = self.query_of(sub)?;
        let column = *self
            .tree
            .query(sub_query)?
            .select
            .columns
            .get(index)
            .ok_or_else(|| QueryError::internal(format!("sub-query has no column {}", index)))?;
        let query = self.query_of(ctx)?;
        self.tree.select_add(query, column)
    }

    /// Carry column `index` of `from`'s query outwards through every enclosing
    /// context up to `to`, re-indexing it at each sub-query wrap on the way.
    pub fn convert_to_parent_index(
        &mut self,
        from: ContextId,
        index: usize,
        to: ContextId,
    ) -> QueryResult<usize> {
        let mut child = from;
        let mut index = index;
        while child != to {
            let parent = self.context(child)?.parent.ok_or_else(|| {
                QueryError::internal(format!("context {} is not nested in {}", from, to))
            })?;
            if let ContextKind::SubQuery { sub } = self.context(parent)?.kind {
                if sub == child {
                    index = self.sub_query_index(parent, child, index)?;
                }
            }
            child = parent;
        }
        Ok(index)
    }

    /// Innermost context of a chain of directly nested sub-queries.
    fn innermost(&self, ctx: ContextId) -> QueryResult<ContextId> {
        let mut ctx = ctx;
        while let ContextKind::SubQuery { sub } = self.context(ctx)?.kind {
            ctx = sub;
        }
        Ok(ctx)
    }

    /// The context the member `path` of `ctx` refers to, when it is a whole row.
    pub fn get_context(&self, ctx: ContextId, path: &[String]) -> QueryResult<Option<ContextId>> {
        match &self.context(ctx)?.kind {
            ContextKind::Table { .. }
            | ContextKind::SubQuery { .. }
            | ContextKind::ScalarSelect { .. } => Ok(path.is_empty().then_some(ctx)),
            ContextKind::Select {
                sequence,
                param,
                body,
            } => {
                let target = match (projected_members(body)?, path) {
                    (Some(_), []) => return Ok(Some(ctx)),
                    (Some(members), [first, rest @ ..]) => {
                        match members.into_iter().find(|(name, _)| name == first) {
                            Some((_, expr)) => expr.with_path(rest),
                            None => return Ok(None),
                        }
                    }
                    (None, path) => body.clone().with_path(path),
                };
                match target.member_path() {
                    Some((root, inner)) if root == param.as_str() => self.get_context(*sequence, &inner),
                    _ => Ok(None),
                }
            }
            ContextKind::Drop { .. } | ContextKind::Statement { .. } => {
                Err(self.not_readable(ctx, "context navigation"))
            }
        }
    }

    /// Name the rows of `ctx` after a lambda parameter.
    pub fn set_alias(&mut self, ctx: ContextId, alias: &str) -> QueryResult<()> {
        if alias.contains(SYNTHETIC_ALIAS_MARKER) {
            return Ok(());
        }
        match self.kind_of(ctx)? {
            ContextKind::Table { table } => {
                if let Node::Table(t) = self.tree.node_mut(table) {
                    if t.alias.is_none() {
                        t.alias = Some(alias.to_string());
                    }
                }
            }
            ContextKind::SubQuery { .. } => {
                let query = self.query_of(ctx)?;
                if let Some(&ts) = self.tree.query(query)?.from.tables.first() {
                    let source = self.tree.table_source_mut(ts)?;
                    if source.alias.is_none() {
                        source.alias = Some(alias.to_string());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Projection reading one row of `ctx`, projecting every column it needs.
    pub fn build_expression(&mut self, ctx: ContextId) -> QueryResult<Projection> {
        let query = self.query_of(ctx)?;
        match self.kind_of(ctx)? {
            ContextKind::Table { table } => {
                let fields = self.tree.table(table)?.fields.clone();
                let mut members = Vec::with_capacity(fields.len());
                for field in fields {
                    let (name, system_type) = {
                        let f = self.tree.field(field)?;
                        (f.name.clone(), f.system_type)
                    };
                    let index = self.tree.select_add(query, field)?;
                    members.push((name, Projection::Column { index, system_type }));
                }
                Ok(Projection::Record(members))
            }
            ContextKind::Select {
                sequence,
                param,
                body,
            } => self.in_scope(&[(param, sequence)], |b| b.project(&body, query)),
            ContextKind::SubQuery { .. } => {
                let inner = self.innermost(ctx)?;
                let projection = self.build_expression(inner)?;
                projection.try_map_index(&mut |index| self.convert_to_parent_index(inner, index, ctx))
            }
            ContextKind::ScalarSelect { body } => {
                if projected_members(&body)?.is_none() {
                    let sql = self.convert_scalar(&body)?;
                    let system_type = self.tree.system_type(sql);
                    let index = self.tree.select_add(query, sql)?;
                    return Ok(Projection::Column { index, system_type });
                }
                let projection = self.project(&body, query)?;
                if self.tree.query(query)?.select.columns.is_empty() {
                    let one = self.tree.value(1);
                    self.tree.select_add_new(query, one, None)?;
                }
                Ok(projection)
            }
            ContextKind::Drop { .. } | ContextKind::Statement { .. } => {
                Err(self.not_readable(ctx, "projection"))
            }
        }
    }

    /// Projection of a lambda body, in the current scope.
    pub(crate) fn project(&mut self, expr: &Expr, query: NodeId) -> QueryResult<Projection> {
        let expr = expr.unquote();
        if let Expr::MemberInit { type_name, args, .. } = expr {
            if !args.is_empty() {
                return Err(QueryError::unsupported(format!(
                    "constructor arguments of '{}' cannot be projected",
                    type_name
                )));
            }
        }
        if let Some(members) = projected_members(expr)? {
            let mut record = Vec::with_capacity(members.len());
            for (name, member) in members {
                record.push((name, self.project(&member, query)?));
            }
            return Ok(Projection::Record(record));
        }
        if let Expr::Constant(value) = expr {
            return Ok(Projection::Value(value.clone()));
        }
        if let Some((root, path)) = expr.member_path() {
            let ctx = self.lookup(root)?;
            if let Some(target) = self.get_context(ctx, &path)? {
                return self.build_expression(target);
            }
        }

        let sql = self.convert_scalar(expr)?;
        let system_type = match self.tree.node(sql) {
            node if node.is_predicate() => ScalarType::Bool,
            _ => self.tree.system_type(sql),
        };
        let index = self.tree.select_add(query, sql)?;
        Ok(Projection::Column { index, system_type })
    }

    /// Plan kind for a finished top-level context.
    pub fn build_query(&mut self, ctx: ContextId) -> QueryResult<QueryKind> {
        match self.kind_of(ctx)? {
            ContextKind::Drop { .. } => Ok(QueryKind::NonQuery),
            ContextKind::Statement {
                sequence,
                returns_identity: true,
            } => {
                let system_type = self.identity_type(sequence)?;
                Ok(QueryKind::Scalar(Projection::Column {
                    index: 0,
                    system_type,
                }))
            }
            ContextKind::Statement { .. } => Ok(QueryKind::NonQuery),
            ContextKind::ScalarSelect { .. } => Ok(QueryKind::Scalar(self.build_expression(ctx)?)),
            _ => Ok(QueryKind::Rows(self.build_expression(ctx)?)),
        }
    }

    fn identity_type(&self, sequence: ContextId) -> QueryResult<ScalarType> {
        let table = self.find_table(sequence)?;
        for &field in &self.tree.table(table)?.fields {
            let f = self.tree.field(field)?;
            if f.is_identity {
                return Ok(f.system_type);
            }
        }
        Err(QueryError::unsupported(format!(
            "table '{}' has no identity column",
            self.tree.table(table)?.name
        )))
    }

    /// The physical table a modification statement over `ctx` targets.
    pub fn find_table(&self, ctx: ContextId) -> QueryResult<NodeId> {
        match &self.context(ctx)?.kind {
            ContextKind::Table { table } => Ok(*table),
            ContextKind::Select { sequence, .. } => self.find_table(*sequence),
            ContextKind::Drop { sequence } | ContextKind::Statement { sequence, .. } => {
                self.find_table(*sequence)
            }
            other => Err(QueryError::unsupported(format!(
                "a {} cannot be the target of a data modification",
                other.name()
            ))),
        }
    }
}
