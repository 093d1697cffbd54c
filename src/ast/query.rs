//! `SelectQuery` and its clauses.

use crate::error::{QueryError, QueryResult};

use super::alias::AliasSet;
use super::node::Node;
use super::predicate::{Condition, SearchCondition};
use super::{NodeId, SourceId, SqlTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryType {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    InsertOrUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    CrossApply,
    OuterApply,
}

impl JoinType {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::CrossApply => "CROSS APPLY",
            JoinType::OuterApply => "OUTER APPLY",
        }
    }

    pub fn is_apply(self) -> bool {
        matches!(self, JoinType::CrossApply | JoinType::OuterApply)
    }
}

/// A projected expression, owned by one query's select clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Owning query (navigation).
    pub parent: NodeId,
    pub expr: NodeId,
    pub alias: Option<String>,
}

/// A table-valued source in FROM with its joins.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSource {
    /// A table or a query.
    pub source: NodeId,
    pub alias: Option<String>,
    pub joins: Vec<JoinedTable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedTable {
    pub join_type: JoinType,
    /// The joined [`TableSource`].
    pub table: NodeId,
    /// A [`SearchCondition`]; empty for apply joins.
    pub condition: NodeId,
    /// Eliminable when nothing downstream references the joined table.
    pub is_weak: bool,
}

impl JoinedTable {
    fn new(join_type: JoinType, table: NodeId, condition: NodeId, is_weak: bool) -> Self {
        Self {
            join_type,
            table,
            condition,
            is_weak,
        }
    }

    pub fn inner(table: NodeId, condition: NodeId) -> Self {
        Self::new(JoinType::Inner, table, condition, false)
    }

    pub fn left(table: NodeId, condition: NodeId) -> Self {
        Self::new(JoinType::Left, table, condition, false)
    }

    pub fn cross_apply(table: NodeId, condition: NodeId) -> Self {
        Self::new(JoinType::CrossApply, table, condition, false)
    }

    pub fn outer_apply(table: NodeId, condition: NodeId) -> Self {
        Self::new(JoinType::OuterApply, table, condition, false)
    }

    pub fn weak_inner(table: NodeId, condition: NodeId) -> Self {
        Self::new(JoinType::Inner, table, condition, true)
    }

    pub fn weak_left(table: NodeId, condition: NodeId) -> Self {
        Self::new(JoinType::Left, table, condition, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderByItem {
    pub expr: NodeId,
    pub is_descending: bool,
}

/// `column = expr` in INSERT and UPDATE.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetExpression {
    pub column: NodeId,
    pub expr: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Union {
    pub query: NodeId,
    pub is_all: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectClause {
    pub columns: Vec<NodeId>,
    pub is_distinct: bool,
    pub take: Option<NodeId>,
    pub skip: Option<NodeId>,
}

impl SelectClause {
    pub fn has_modifier(&self) -> bool {
        self.is_distinct || self.take.is_some() || self.skip.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FromClause {
    /// [`TableSource`] nodes.
    pub tables: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertClause {
    pub into: Option<NodeId>,
    pub items: Vec<SetExpression>,
    pub with_identity: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateClause {
    pub table: Option<NodeId>,
    pub items: Vec<SetExpression>,
    /// Key assignments identifying the row for insert-or-update.
    pub keys: Vec<SetExpression>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteClause {
    pub table: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateTableStatement {
    pub table: Option<NodeId>,
    pub is_drop: bool,
}

/// A complete statement or a nested query.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub source_id: SourceId,
    pub query_type: QueryType,
    /// Enclosing query for correlated references (navigation).
    pub parent_select: Option<NodeId>,
    pub select: SelectClause,
    pub from: FromClause,
    /// A [`SearchCondition`] node.
    pub where_clause: NodeId,
    pub group_by: Vec<NodeId>,
    /// A [`SearchCondition`] node.
    pub having: NodeId,
    pub order_by: Vec<OrderByItem>,
    pub insert: InsertClause,
    pub update: UpdateClause,
    pub delete: DeleteClause,
    pub create_table: CreateTableStatement,
    pub unions: Vec<Union>,
    /// Filled by alias finalization.
    pub parameters: Vec<NodeId>,
    pub is_parameter_dependent: bool,
    pub aliases: Option<AliasSet>,
}

impl SelectQuery {
    pub fn new(where_clause: NodeId, having: NodeId) -> Self {
        Self {
            source_id: SourceId::next(),
            query_type: QueryType::Select,
            parent_select: None,
            select: SelectClause::default(),
            from: FromClause::default(),
            where_clause,
            group_by: Vec::new(),
            having,
            order_by: Vec::new(),
            insert: InsertClause::default(),
            update: UpdateClause::default(),
            delete: DeleteClause::default(),
            create_table: CreateTableStatement::default(),
            unions: Vec::new(),
            parameters: Vec::new(),
            is_parameter_dependent: false,
            aliases: None,
        }
    }

    pub fn is_select(&self) -> bool {
        self.query_type == QueryType::Select
    }

    pub fn has_union(&self) -> bool {
        !self.unions.is_empty()
    }
}

impl SqlTree {
    /// Add `source` to the query's FROM, or return the table source already holding it.
    ///
    /// Asking for an explicit alias that differs from the registered one fails.
    pub fn add_from(
        &mut self,
        query: NodeId,
        source: NodeId,
        alias: Option<&str>,
    ) -> QueryResult<NodeId> {
        if let Some(ts) = self.find_table_source(query, source)? {
            let registered = self.table_source(ts)?.alias.clone();
            return match (alias, registered.as_deref()) {
                (Some(wanted), Some(current)) if wanted != current => Err(QueryError::AliasConflict {
                    alias: wanted.to_string(),
                    source_id: self.source_id(source).map(SourceId::value).unwrap_or_default(),
                }),
                (Some(wanted), None) => {
                    self.table_source_mut(ts)?.alias = Some(wanted.to_string());
                    Ok(ts)
                }
                _ => Ok(ts),
            };
        }

        let ts = self.add(TableSource {
            source,
            alias: alias.map(str::to_string),
            joins: Vec::new(),
        });
        self.query_mut(query)?.from.tables.push(ts);
        Ok(ts)
    }

    /// Join `source` onto `parent`, returning the joined table source and its empty condition.
    pub fn add_join(
        &mut self,
        parent: NodeId,
        source: NodeId,
        alias: Option<&str>,
        make: fn(NodeId, NodeId) -> JoinedTable,
    ) -> QueryResult<(NodeId, NodeId)> {
        let ts = self.add(TableSource {
            source,
            alias: alias.map(str::to_string),
            joins: Vec::new(),
        });
        let condition = self.add(SearchCondition::default());
        self.table_source_mut(parent)?.joins.push(make(ts, condition));
        Ok((ts, condition))
    }

    /// All table sources of a query's FROM, joins included, in declaration order.
    pub fn from_table_sources(&self, query: NodeId) -> QueryResult<Vec<NodeId>> {
        let q = self.query(query)?;
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = q.from.tables.iter().rev().copied().collect();
        while let Some(ts) = stack.pop() {
            result.push(ts);
            let source = self.table_source(ts)?;
            stack.extend(source.joins.iter().rev().map(|j| j.table));
        }
        Ok(result)
    }

    /// The table source in this query's FROM (joins included) that wraps `source`.
    pub fn find_table_source(&self, query: NodeId, source: NodeId) -> QueryResult<Option<NodeId>> {
        for ts in self.from_table_sources(query)? {
            if self.table_source(ts)?.source == source {
                return Ok(Some(ts));
            }
        }
        Ok(None)
    }

    /// Resolve a source by identity: this query's FROM, then nested queries in FROM,
    /// then the enclosing queries through the parent-select edge.
    pub fn get_table_source(&self, query: NodeId, source_id: SourceId) -> QueryResult<Option<NodeId>> {
        let mut current = Some(query);
        while let Some(q) = current {
            if let Some(ts) = self.find_in_from(q, source_id)? {
                return Ok(Some(ts));
            }
            current = self.query(q)?.parent_select;
        }
        Ok(None)
    }

    fn find_in_from(&self, query: NodeId, source_id: SourceId) -> QueryResult<Option<NodeId>> {
        let mut pending = vec![query];
        let mut seen = std::collections::HashSet::new();
        while let Some(q) = pending.pop() {
            if !seen.insert(q) {
                continue;
            }
            let sources = self.from_table_sources(q)?;
            for &ts in &sources {
                if self.source_id(self.table_source(ts)?.source) == Some(source_id) {
                    return Ok(Some(ts));
                }
            }
            for &ts in sources.iter().rev() {
                let source = self.table_source(ts)?.source;
                if matches!(self.node(source), Node::Query(_)) {
                    pending.push(source);
                }
            }
        }
        Ok(None)
    }

    /// True when `source` is registered in this query's FROM.
    pub fn is_child(&self, query: NodeId, source: NodeId) -> QueryResult<bool> {
        Ok(self.find_table_source(query, source)?.is_some())
    }

    /// Physical tables referenced from FROM, joins included.
    pub fn physical_tables(&self, query: NodeId) -> QueryResult<Vec<NodeId>> {
        self.from_sources_matching(query, |node| matches!(node, Node::Table(_)))
    }

    /// Queries nested in FROM, joins included.
    pub fn nested_queries(&self, query: NodeId) -> QueryResult<Vec<NodeId>> {
        self.from_sources_matching(query, |node| matches!(node, Node::Query(_)))
    }

    fn from_sources_matching(
        &self,
        query: NodeId,
        predicate: impl Fn(&Node) -> bool,
    ) -> QueryResult<Vec<NodeId>> {
        let mut result = Vec::new();
        for ts in self.from_table_sources(query)? {
            let source = self.table_source(ts)?.source;
            if predicate(self.node(source)) {
                result.push(source);
            }
        }
        Ok(result)
    }

    /// Index of `expr` in the select list, adding a column when it is not projected yet.
    pub fn select_add(&mut self, query: NodeId, expr: NodeId) -> QueryResult<usize> {
        let columns = &self.query(query)?.select.columns;
        for (index, &column) in columns.iter().enumerate() {
            if column == expr || self.column(column)?.expr == expr {
                return Ok(index);
            }
        }
        self.select_add_new(query, expr, None)
    }

    /// Always add a new column.
    pub fn select_add_new(
        &mut self,
        query: NodeId,
        expr: NodeId,
        alias: Option<&str>,
    ) -> QueryResult<usize> {
        let column = self.add(Column {
            parent: query,
            expr,
            alias: alias.map(str::to_string),
        });
        let columns = &mut self.query_mut(query)?.select.columns;
        columns.push(column);
        Ok(columns.len() - 1)
    }

    /// Add a GROUP BY expression; adding the same node twice is a no-op.
    pub fn group_by_add(&mut self, query: NodeId, expr: NodeId) -> QueryResult<()> {
        let group_by = &mut self.query_mut(query)?.group_by;
        if !group_by.contains(&expr) {
            group_by.push(expr);
        }
        Ok(())
    }

    pub fn order_by_add(&mut self, query: NodeId, expr: NodeId, is_descending: bool) -> QueryResult<()> {
        let order_by = &mut self.query_mut(query)?.order_by;
        if !order_by.iter().any(|item| item.expr == expr) {
            order_by.push(OrderByItem { expr, is_descending });
        }
        Ok(())
    }

    /// AND a predicate onto a search condition node.
    pub fn add_condition(&mut self, search: NodeId, condition: Condition) -> QueryResult<()> {
        self.search_condition_mut(search)?.conditions.push(condition);
        Ok(())
    }

    pub fn where_add(&mut self, query: NodeId, predicate: NodeId) -> QueryResult<()> {
        let where_clause = self.query(query)?.where_clause;
        self.add_condition(where_clause, Condition::and(predicate))
    }

    /// Primary-key fields of a table, by key ordinal.
    pub fn table_keys(&self, table: NodeId) -> QueryResult<Vec<NodeId>> {
        let mut keys = Vec::new();
        for &f in &self.table(table)?.fields {
            if let Some(order) = self.field(f)?.primary_key_order {
                keys.push((order, f));
            }
        }
        keys.sort_by_key(|(order, _)| *order);
        Ok(keys.into_iter().map(|(_, f)| f).collect())
    }

    /// Key columns of a single-table query without joins: projected columns whose
    /// expression is one of the table's key fields.
    pub fn query_keys(&self, query: NodeId) -> QueryResult<Vec<NodeId>> {
        let q = self.query(query)?;
        let [ts] = q.from.tables.as_slice() else {
            return Ok(Vec::new());
        };
        let ts = self.table_source(*ts)?;
        if !ts.joins.is_empty() || !matches!(self.node(ts.source), Node::Table(_)) {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for key in self.table_keys(ts.source)? {
            for &column in &q.select.columns {
                if self.column(column)?.expr == key {
                    keys.push(column);
                }
            }
        }
        Ok(keys)
    }

    /// Keys of any table-valued expression: fields for tables, key columns for queries.
    pub fn source_keys(&self, source: NodeId) -> QueryResult<Vec<NodeId>> {
        match self.node(source) {
            Node::Table(_) => self.table_keys(source),
            Node::Query(_) => self.query_keys(source),
            _ => Ok(Vec::new()),
        }
    }

    /// The physical field under a key column or field.
    pub fn underlying_field(&self, mut expr: NodeId) -> QueryResult<NodeId> {
        loop {
            match self.node(expr) {
                Node::Field(_) => return Ok(expr),
                Node::Column(c) => expr = c.expr,
                other => {
                    return Err(QueryError::internal(format!(
                        "{:?} has no underlying field",
                        other.element_type()
                    )));
                }
            }
        }
    }
}
