//! The dialect-neutral statement builder.
//!
//! [`SqlGenerator`] carries the whole rendering algorithm as default methods.
//! A dialect implements the three required methods and overrides whichever
//! clause builders its engine spells differently.

use crate::ast::{
    Like, Node, NodeId, Operator, Precedence, QueryType, SelectQuery, SetExpression, SqlField,
    SqlTable, SqlTree,
};
use crate::error::{QueryError, QueryResult};
use crate::mapping::{DataType, SqlDataType};
use crate::value::Value;

use super::flags::SqlProviderFlags;
use super::value_to_sql::ValueToSqlConverter;
use super::writer::{RenderTask, SqlWriter};

/// What kind of name is being converted to its SQL spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvertType {
    NameToQueryParameter,
    NameToCommandParameter,
    NameToSprocParameter,
    SprocParameterToName,
    NameToQueryField,
    NameToQueryFieldAlias,
    NameToQueryTable,
    NameToQueryTableAlias,
    NameToDatabase,
    NameToOwner,
}

/// Adjustments for rendering one SELECT.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Expressions projected after the query's own columns, with their aliases.
    pub extra_columns: Vec<(NodeId, String)>,
    pub suppress_order_by: bool,
    /// Drop TOP/LIMIT/OFFSET; paging is applied by an enclosing query.
    pub suppress_paging: bool,
}

/// Dialect-specific SQL generation.
pub trait SqlGenerator {
    fn name(&self) -> &'static str;

    fn flags(&self) -> SqlProviderFlags;

    fn convert_name(&self, name: &str, kind: ConvertType) -> String;

    fn value_converter(&self) -> ValueToSqlConverter {
        ValueToSqlConverter::with_defaults()
    }

    /// Last-moment AST adjustments before rendering.
    fn prepare(&self, _tree: &mut SqlTree, _root: NodeId) -> QueryResult<()> {
        Ok(())
    }

    /// Format of the take modifier placed right after SELECT, e.g. `TOP ({0})`.
    fn first_format(&self, _query: &SelectQuery) -> Option<&'static str> {
        None
    }

    fn limit_format(&self, _query: &SelectQuery) -> Option<&'static str> {
        Some("LIMIT {0}")
    }

    fn offset_format(&self, _query: &SelectQuery) -> Option<&'static str> {
        Some("OFFSET {0}")
    }

    fn offset_first(&self) -> bool {
        false
    }

    /// Statement appended after an INSERT to read back the generated identity.
    fn identity_query(&self) -> Option<&'static str> {
        None
    }

    /// UPDATE and DELETE reference their target through a FROM clause.
    fn update_from_clause(&self) -> bool {
        false
    }

    fn identity_attribute(&self) -> &'static str {
        "GENERATED BY DEFAULT AS IDENTITY"
    }

    // Statements.

    fn build_statement(&self, w: &mut SqlWriter<'_>, root: NodeId) -> QueryResult<()> {
        let tree = w.tree;
        let q = tree.query(root)?;
        let floor = w.pending_len();
        if !w.enter(root) {
            return Err(QueryError::internal("statement is already being rendered"));
        }
        match q.query_type {
            QueryType::Select => self.build_sql(w, root),
            QueryType::Insert => self.build_insert_query(w, q),
            QueryType::Update => self.build_update_query(w, q),
            QueryType::Delete => self.build_delete_query(w, q),
            QueryType::InsertOrUpdate => self.build_insert_or_update_query(w, q),
            QueryType::CreateTable if q.create_table.is_drop => self.build_drop_table(w, q),
            QueryType::CreateTable => self.build_create_table(w, q),
        }?;
        self.render_pending(w, floor)
    }

    /// Run queued tasks until only `floor` remain.
    fn render_pending(&self, w: &mut SqlWriter<'_>, floor: usize) -> QueryResult<()> {
        while let Some(task) = w.next_task(floor) {
            match task {
                RenderTask::Expression(id) => self.build_expression_node(w, id)?,
                RenderTask::Query(id) => {
                    if w.enter(id) {
                        self.build_sql(w, id)?;
                    } else {
                        w.line("...");
                    }
                }
            }
        }
        Ok(())
    }

    /// What `f` writes, fully rendered, instead of keeping it in the output.
    fn capture(
        &self,
        w: &mut SqlWriter<'_>,
        f: &mut dyn FnMut(&mut SqlWriter<'_>) -> QueryResult<()>,
    ) -> QueryResult<String> {
        let capture = w.begin_capture();
        f(w)?;
        self.render_pending(w, capture.floor())?;
        w.end_capture(capture)
    }

    /// Render one SELECT, nested or top-level.
    fn build_sql(&self, w: &mut SqlWriter<'_>, query: NodeId) -> QueryResult<()> {
        self.build_select_query(w, query, &SelectOptions::default())
    }

    /// Render a query nested in another; one already on the render path prints `...`.
    fn build_nested(&self, w: &mut SqlWriter<'_>, query: NodeId) -> QueryResult<()> {
        w.defer(RenderTask::Query(query));
        Ok(())
    }

    fn build_select_query(
        &self,
        w: &mut SqlWriter<'_>,
        query: NodeId,
        options: &SelectOptions,
    ) -> QueryResult<()> {
        let tree = w.tree;
        let q = tree.query(query)?;
        self.build_select_clause(w, q, options)?;
        self.build_from_clause(w, q)?;
        self.build_where_clause(w, q)?;
        self.build_group_by_clause(w, q)?;
        self.build_having_clause(w, q)?;
        if !options.suppress_order_by {
            self.build_order_by_clause(w, q)?;
        }
        if !options.suppress_paging {
            self.build_offset_limit(w, q)?;
        }
        self.build_unions(w, q)
    }

    // SELECT clauses.

    fn build_select_clause(
        &self,
        w: &mut SqlWriter<'_>,
        q: &SelectQuery,
        options: &SelectOptions,
    ) -> QueryResult<()> {
        w.push_indent().push("SELECT");
        if q.select.is_distinct {
            w.push(" DISTINCT");
        }
        if let (false, Some(take), Some(format)) =
            (options.suppress_paging, q.select.take, self.first_format(q))
        {
            let take = self.capture(w, &mut |w| self.build_expression(w, take))?;
            w.push(" ").push(&format.replace("{0}", &take));
        }
        w.newline();
        w.indent();

        if q.select.columns.is_empty() && options.extra_columns.is_empty() {
            w.line("*");
        } else {
            let mut first = true;
            for &column in &q.select.columns {
                if !first {
                    w.push(",").newline();
                }
                first = false;
                w.push_indent();
                self.build_column(w, column)?;
            }
            for (expr, alias) in &options.extra_columns {
                if !first {
                    w.push(",").newline();
                }
                first = false;
                w.push_indent();
                self.build_column_expression(w, *expr)?;
                w.push(" as ")
                    .push(&self.convert_name(alias, ConvertType::NameToQueryFieldAlias));
            }
            w.newline();
        }

        w.outdent();
        Ok(())
    }

    /// A projected column with its alias when it differs from the natural name.
    fn build_column(&self, w: &mut SqlWriter<'_>, column: NodeId) -> QueryResult<()> {
        let tree = w.tree;
        let c = tree.column(column)?;
        self.build_column_expression(w, c.expr)?;

        if let Some(alias) = &c.alias {
            let natural = match tree.node(c.expr) {
                Node::Field(f) => Some(f.physical_name.as_str()),
                Node::Column(inner) => inner.alias.as_deref(),
                _ => None,
            };
            if natural != Some(alias.as_str()) {
                w.push(" as ")
                    .push(&self.convert_name(alias, ConvertType::NameToQueryFieldAlias));
            }
        }
        Ok(())
    }

    fn build_column_expression(&self, w: &mut SqlWriter<'_>, expr: NodeId) -> QueryResult<()> {
        self.build_expression(w, expr)
    }

    fn build_from_clause(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        if q.from.tables.is_empty() {
            return Ok(());
        }
        w.line("FROM");
        w.indent();
        for (i, &ts) in q.from.tables.iter().enumerate() {
            if i > 0 {
                w.push(",").newline();
            }
            w.push_indent();
            self.build_table_source(w, ts)?;
        }
        w.newline();
        w.outdent();
        Ok(())
    }

    fn build_table_source(&self, w: &mut SqlWriter<'_>, ts: NodeId) -> QueryResult<()> {
        let tree = w.tree;
        let source = tree.table_source(ts)?;

        match tree.node(source.source) {
            Node::Query(_) => {
                w.push("(").newline();
                w.indent();
                self.build_nested(w, source.source)?;
                w.outdent();
                w.push_indent().push(")");
            }
            Node::Table(table) => {
                let name = self.physical_table_name(table);
                w.push(&name);
            }
            other => {
                return Err(QueryError::internal(format!(
                    "{:?} cannot be a table source",
                    other.element_type()
                )));
            }
        }

        if let Some(alias) = &source.alias {
            w.push(" ")
                .push(&self.convert_name(alias, ConvertType::NameToQueryTableAlias));
        }

        for join in &source.joins {
            if join.join_type.is_apply() && !w.flags.is_apply_join_supported {
                return Err(QueryError::render(format!(
                    "{} is not supported by {}",
                    join.join_type.as_sql(),
                    self.name()
                )));
            }
            w.newline();
            w.indent();
            w.push_indent().push(join.join_type.as_sql()).push(" ");
            self.build_table_source(w, join.table)?;
            if !join.join_type.is_apply() {
                w.push(" ON ");
                self.build_search_condition(w, join.condition)?;
            }
            w.outdent();
        }
        Ok(())
    }

    fn physical_table_name(&self, table: &SqlTable) -> String {
        let name = self.convert_name(&table.physical_name, ConvertType::NameToQueryTable);
        let database = table
            .database
            .as_deref()
            .map(|db| self.convert_name(db, ConvertType::NameToDatabase));
        let owner = table
            .owner
            .as_deref()
            .map(|owner| self.convert_name(owner, ConvertType::NameToOwner));
        match (database, owner) {
            (Some(db), Some(owner)) => format!("{}.{}.{}", db, owner, name),
            (Some(db), None) => format!("{}..{}", db, name),
            (None, Some(owner)) => format!("{}.{}", owner, name),
            (None, None) => name,
        }
    }

    fn build_where_clause(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        self.build_condition_clause(w, "WHERE", q.where_clause)
    }

    fn build_having_clause(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        self.build_condition_clause(w, "HAVING", q.having)
    }

    fn build_condition_clause(
        &self,
        w: &mut SqlWriter<'_>,
        keyword: &str,
        search: NodeId,
    ) -> QueryResult<()> {
        if matches!(w.tree.node(search), Node::SearchCondition(sc) if sc.is_empty()) {
            return Ok(());
        }
        w.line(keyword);
        w.indent();
        w.push_indent();
        self.build_search_condition(w, search)?;
        w.newline();
        w.outdent();
        Ok(())
    }

    fn build_group_by_clause(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        if q.group_by.is_empty() {
            return Ok(());
        }
        w.line("GROUP BY");
        w.indent();
        for (i, &expr) in q.group_by.iter().enumerate() {
            if i > 0 {
                w.push(",").newline();
            }
            w.push_indent();
            self.build_expression(w, expr)?;
        }
        w.newline();
        w.outdent();
        Ok(())
    }

    fn build_order_by_clause(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        if q.order_by.is_empty() {
            return Ok(());
        }
        w.line("ORDER BY");
        w.indent();
        for (i, item) in q.order_by.iter().enumerate() {
            if i > 0 {
                w.push(",").newline();
            }
            w.push_indent();
            self.build_expression(w, item.expr)?;
            if item.is_descending {
                w.push(" DESC");
            }
        }
        w.newline();
        w.outdent();
        Ok(())
    }

    fn build_offset_limit(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        let skip = q.select.skip.zip(self.offset_format(q));
        let take = match self.first_format(q) {
            Some(_) => None,
            None => q.select.take.zip(self.limit_format(q)),
        };
        if skip.is_none() && take.is_none() {
            return Ok(());
        }

        let mut parts = Vec::with_capacity(2);
        for (expr, format) in [skip, take].into_iter().flatten() {
            let value = self.capture(w, &mut |w| self.build_expression(w, expr))?;
            parts.push(format.replace("{0}", &value));
        }
        if !self.offset_first() {
            parts.reverse();
        }
        w.line(&parts.join(" "));
        Ok(())
    }

    fn build_unions(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        for union in &q.unions {
            w.line(if union.is_all { "UNION ALL" } else { "UNION" });
            self.build_nested(w, union.query)?;
        }
        Ok(())
    }

    // INSERT, UPDATE, DELETE.

    fn build_insert_query(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        self.build_insert(w, q, !q.from.tables.is_empty())
    }

    /// INSERT with a VALUES list, or with a SELECT over the query's FROM.
    fn build_insert(&self, w: &mut SqlWriter<'_>, q: &SelectQuery, from_select: bool) -> QueryResult<()> {
        let tree = w.tree;
        let into = q
            .insert
            .into
            .ok_or_else(|| QueryError::internal("insert without a target table"))?;
        let table = tree.table(into)?;

        w.push_indent()
            .push("INSERT INTO ")
            .push(&self.physical_table_name(table))
            .newline();
        w.line("(");
        w.indent();
        for (i, item) in q.insert.items.iter().enumerate() {
            if i > 0 {
                w.push(",").newline();
            }
            w.push_indent();
            self.build_field_name(w, item.column)?;
        }
        w.newline();
        w.outdent();
        w.line(")");

        self.build_output_subclause(w, q)?;

        if !from_select {
            w.line("VALUES");
            w.line("(");
            w.indent();
            self.build_value_list(w, &q.insert.items)?;
            w.outdent();
            w.line(")");
        } else {
            w.line("SELECT");
            w.indent();
            self.build_value_list(w, &q.insert.items)?;
            w.outdent();
            self.build_from_clause(w, q)?;
            self.build_where_clause(w, q)?;
        }

        if q.insert.with_identity {
            if let Some(identity) = self.identity_query() {
                w.newline();
                w.line(identity);
            }
        }
        Ok(())
    }

    fn build_value_list(&self, w: &mut SqlWriter<'_>, items: &[SetExpression]) -> QueryResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                w.push(",").newline();
            }
            w.push_indent();
            self.build_expression(w, item.expr)?;
        }
        w.newline();
        Ok(())
    }

    /// Clause between the column list and VALUES returning generated values.
    fn build_output_subclause(&self, _w: &mut SqlWriter<'_>, _q: &SelectQuery) -> QueryResult<()> {
        Ok(())
    }

    fn build_update_query(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        self.build_update_statement(w, q)?;
        self.build_where_clause(w, q)
    }

    /// UPDATE, SET and (where the dialect needs one) FROM; the caller adds WHERE.
    fn build_update_statement(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        w.line("UPDATE");
        w.indent();
        w.push_indent();
        self.build_update_table_name(w, q)?;
        w.newline();
        w.outdent();

        w.line("SET");
        w.indent();
        for (i, item) in q.update.items.iter().enumerate() {
            if i > 0 {
                w.push(",").newline();
            }
            w.push_indent();
            self.build_field_name(w, item.column)?;
            w.push(" = ");
            self.build_expression(w, item.expr)?;
        }
        w.newline();
        w.outdent();

        if self.update_from_clause() {
            self.build_from_clause(w, q)?;
        }
        Ok(())
    }

    fn build_update_table_name(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        let tree = w.tree;
        match (q.from.tables.first(), q.update.table) {
            (Some(&ts), _) => {
                let source = tree.table_source(ts)?;
                let table = tree.table(source.source)?;
                w.push(&self.physical_table_name(table));
                if let Some(alias) = &source.alias {
                    w.push(" ")
                        .push(&self.convert_name(alias, ConvertType::NameToQueryTableAlias));
                }
                Ok(())
            }
            (None, Some(table)) => {
                let name = self.physical_table_name(tree.table(table)?);
                w.push(&name);
                Ok(())
            }
            (None, None) => Err(QueryError::internal("update without a target table")),
        }
    }

    fn build_delete_query(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        self.build_delete_clause(w, q)?;
        self.build_from_clause(w, q)?;
        self.build_where_clause(w, q)
    }

    fn build_delete_clause(&self, w: &mut SqlWriter<'_>, _q: &SelectQuery) -> QueryResult<()> {
        w.line("DELETE");
        Ok(())
    }

    fn build_insert_or_update_query(
        &self,
        _w: &mut SqlWriter<'_>,
        _q: &SelectQuery,
    ) -> QueryResult<()> {
        Err(QueryError::render(format!(
            "insert-or-update is not supported by {}",
            self.name()
        )))
    }

    /// Update keyed on `update.keys`, then insert when no row was touched.
    fn build_update_then_insert(
        &self,
        w: &mut SqlWriter<'_>,
        q: &SelectQuery,
        row_count_check: &str,
    ) -> QueryResult<()> {
        self.build_update_statement(w, q)?;
        w.line("WHERE");
        w.indent();
        w.push_indent();
        for (i, key) in q.update.keys.iter().enumerate() {
            if i > 0 {
                w.push(" AND ");
            }
            self.build_expression(w, key.column)?;
            w.push(" = ");
            self.build_expression(w, key.expr)?;
        }
        w.newline();
        w.outdent();

        w.newline();
        w.line(row_count_check);
        w.line("BEGIN");
        w.indent();
        self.build_insert(w, q, false)?;
        w.outdent();
        w.line("END");
        Ok(())
    }

    /// Unqualified column name of a field.
    fn build_field_name(&self, w: &mut SqlWriter<'_>, field: NodeId) -> QueryResult<()> {
        let tree = w.tree;
        let f = tree.field(tree.underlying_field(field)?)?;
        w.push(&self.convert_name(&f.physical_name, ConvertType::NameToQueryField));
        Ok(())
    }

    // DDL.

    fn build_create_table(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        let tree = w.tree;
        let table = self.create_table_target(tree, q)?;

        let mut lines = Vec::with_capacity(table.fields.len() + 1);
        for &field in &table.fields {
            let f = tree.field(field)?;
            let mut line = format!(
                "{} {} {}",
                self.convert_name(&f.physical_name, ConvertType::NameToQueryField),
                self.build_data_type(f)?,
                if f.can_be_null { "NULL" } else { "NOT NULL" }
            );
            if f.is_identity {
                line.push(' ');
                line.push_str(self.identity_attribute());
            }
            lines.push(line);
        }

        let keys = q
            .create_table
            .table
            .map(|t| tree.table_keys(t))
            .transpose()?
            .unwrap_or_default();
        if !keys.is_empty() {
            let key_names = keys
                .iter()
                .map(|&k| {
                    let f = tree.field(k)?;
                    Ok(self.convert_name(&f.physical_name, ConvertType::NameToQueryField))
                })
                .collect::<QueryResult<Vec<_>>>()?;
            let pk_name = self.convert_name(
                &format!("PK_{}", table.physical_name),
                ConvertType::NameToQueryTable,
            );
            lines.push(self.capture(w, &mut |w| {
                self.build_create_table_primary_key(w, &pk_name, &key_names)
            })?);
        }

        w.push_indent()
            .push("CREATE TABLE ")
            .push(&self.physical_table_name(table))
            .newline();
        w.line("(");
        w.indent();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                w.push(",").newline();
            }
            w.push_indent().push(line);
        }
        w.newline();
        w.outdent();
        w.line(")");
        Ok(())
    }

    fn build_create_table_primary_key(
        &self,
        w: &mut SqlWriter<'_>,
        pk_name: &str,
        fields: &[String],
    ) -> QueryResult<()> {
        w.push("CONSTRAINT ")
            .push(pk_name)
            .push(" PRIMARY KEY (")
            .push(&fields.join(", "))
            .push(")");
        Ok(())
    }

    fn build_data_type(&self, field: &SqlField) -> QueryResult<String> {
        base_data_type(&field.data_type)
    }

    fn build_drop_table(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        let table = self.create_table_target(w.tree, q)?;
        let name = self.physical_table_name(table);
        w.push_indent().push("DROP TABLE ").push(&name).newline();
        Ok(())
    }

    fn create_table_target<'t>(&self, tree: &'t SqlTree, q: &SelectQuery) -> QueryResult<&'t SqlTable> {
        let table = q
            .create_table
            .table
            .ok_or_else(|| QueryError::internal("table statement without a table"))?;
        tree.table(table)
    }

    // Expressions and predicates.

    /// Render `id` here. Leaves are written at once; anything with operands is queued.
    fn build_expression(&self, w: &mut SqlWriter<'_>, id: NodeId) -> QueryResult<()> {
        match w.tree.node(id) {
            Node::Field(_) | Node::Value(_) | Node::Parameter(_) => self.build_expression_node(w, id),
            _ => {
                w.defer(RenderTask::Expression(id));
                Ok(())
            }
        }
    }

    fn build_expression_node(&self, w: &mut SqlWriter<'_>, id: NodeId) -> QueryResult<()> {
        let tree = w.tree;
        match tree.node(id) {
            Node::Field(f) => {
                if let Some(alias) = f.table.and_then(|t| w.source_alias(t)) {
                    let alias = self.convert_name(alias, ConvertType::NameToQueryTableAlias);
                    w.push(&alias).push(".");
                }
                if f.is_all() {
                    w.push("*");
                } else {
                    w.push(&self.convert_name(&f.physical_name, ConvertType::NameToQueryField));
                }
            }
            Node::Column(c) => {
                let own = w.current_query() == Some(c.parent);
                match (own, w.source_alias(c.parent), &c.alias) {
                    (false, Some(source), Some(alias)) => {
                        let source = self.convert_name(source, ConvertType::NameToQueryTableAlias);
                        let alias = self.convert_name(alias, ConvertType::NameToQueryField);
                        w.push(&source).push(".").push(&alias);
                    }
                    _ => self.build_expression(w, c.expr)?,
                }
            }
            Node::Parameter(p) => {
                if p.is_query_parameter {
                    let name = p
                        .name
                        .as_deref()
                        .ok_or_else(|| QueryError::internal("parameter has no name"))?;
                    w.push(&self.convert_name(name, ConvertType::NameToQueryParameter));
                } else {
                    w.literal(&p.value())?;
                }
            }
            Node::Value(v) => w.literal(&v.value)?,
            Node::Function(f) => {
                w.push(&f.name).push("(");
                if f.params.is_empty() && f.name.eq_ignore_ascii_case("COUNT") {
                    w.push("*");
                }
                for (i, &param) in f.params.iter().enumerate() {
                    if i > 0 {
                        w.push(", ");
                    }
                    self.build_expression(w, param)?;
                }
                w.push(")");
            }
            Node::Expression(e) => {
                let mut rest = e.expr.as_str();
                while let Some(open) = rest.find('{') {
                    let Some(close) = rest[open..].find('}').map(|c| open + c) else {
                        break;
                    };
                    match rest[open + 1..close].parse::<usize>().ok().and_then(|i| e.params.get(i)) {
                        Some(&param) => {
                            w.push(&rest[..open]);
                            self.build_operand(w, param, e.precedence, false)?;
                        }
                        None => {
                            w.push(&rest[..=close]);
                        }
                    }
                    rest = &rest[close + 1..];
                }
                w.push(rest);
            }
            Node::Binary(b) => {
                self.build_operand(w, b.left, b.precedence, false)?;
                w.push(" ").push(&b.operation).push(" ");
                self.build_operand(w, b.right, b.precedence, true)?;
            }
            Node::Query(_) => {
                w.push("(").newline();
                w.indent();
                self.build_nested(w, id)?;
                w.outdent();
                w.push_indent().push(")");
            }
            Node::Table(t) => {
                return Err(QueryError::render(format!(
                    "table '{}' cannot be used as a value",
                    t.name
                )));
            }
            Node::TableSource(_) => {
                return Err(QueryError::internal("table source used as an expression"));
            }
            _ => self.build_predicate(w, id)?,
        }
        Ok(())
    }

    /// Render `id` as an operand of an operator with `parent` precedence.
    fn build_operand(
        &self,
        w: &mut SqlWriter<'_>,
        id: NodeId,
        parent: Precedence,
        is_right: bool,
    ) -> QueryResult<()> {
        let precedence = w.tree.precedence(id);
        let wrap = precedence < parent
            || (is_right
                && precedence == parent
                && matches!(parent, Precedence::Subtraction | Precedence::LogicalNegation));
        if wrap {
            w.push("(");
        }
        self.build_expression(w, id)?;
        if wrap {
            w.push(")");
        }
        Ok(())
    }

    fn build_predicate(&self, w: &mut SqlWriter<'_>, id: NodeId) -> QueryResult<()> {
        let tree = w.tree;
        match tree.node(id) {
            Node::ExprExpr(p) => {
                self.build_operand(w, p.left, Precedence::Comparison, false)?;
                let right_is_null = matches!(tree.node(p.right), Node::Value(v) if v.value.is_null());
                match (p.op, right_is_null) {
                    (Operator::Equal, true) => {
                        w.push(" IS NULL");
                    }
                    (Operator::NotEqual, true) => {
                        w.push(" IS NOT NULL");
                    }
                    (op, _) => {
                        w.push(" ").push(op.as_sql()).push(" ");
                        self.build_operand(w, p.right, Precedence::Comparison, false)?;
                    }
                }
            }
            Node::Like(p) => self.build_like_predicate(w, p)?,
            Node::Between(p) => {
                self.build_operand(w, p.expr, Precedence::Comparison, false)?;
                w.push(if p.is_not { " NOT BETWEEN " } else { " BETWEEN " });
                self.build_operand(w, p.lower, Precedence::Comparison, false)?;
                w.push(" AND ");
                self.build_operand(w, p.upper, Precedence::Comparison, false)?;
            }
            Node::IsNull(p) => {
                self.build_operand(w, p.expr, Precedence::Comparison, false)?;
                w.push(if p.is_not { " IS NOT NULL" } else { " IS NULL" });
            }
            Node::InSubQuery(p) => {
                self.build_operand(w, p.expr, Precedence::Comparison, false)?;
                w.push(if p.is_not { " NOT IN " } else { " IN " });
                self.build_expression(w, p.sub_query)?;
            }
            Node::InList(p) => {
                if p.values.is_empty() {
                    w.push(if p.is_not { "1 = 1" } else { "1 = 0" });
                    return Ok(());
                }
                self.build_operand(w, p.expr, Precedence::Comparison, false)?;
                w.push(if p.is_not { " NOT IN (" } else { " IN (" });
                for (i, &value) in p.values.iter().enumerate() {
                    if i > 0 {
                        w.push(", ");
                    }
                    self.build_expression(w, value)?;
                }
                w.push(")");
            }
            Node::ExprPredicate(p) => match tree.node(p.expr) {
                Node::Value(v) => match v.value {
                    Value::Bool(b) => {
                        w.push(if b { "1 = 1" } else { "1 = 0" });
                    }
                    _ => w.literal(&v.value)?,
                },
                _ => self.build_condition_operand(w, p.expr)?,
            },
            Node::NotExpr(p) => {
                if p.is_not {
                    w.push("NOT (");
                    self.build_expression(w, p.expr)?;
                    w.push(")");
                } else {
                    self.build_expression(w, p.expr)?;
                }
            }
            Node::FuncLike(p) => self.build_expression(w, p.function)?,
            Node::SearchCondition(_) => self.build_search_condition(w, id)?,
            other => {
                return Err(QueryError::internal(format!(
                    "{:?} is not an expression",
                    other.element_type()
                )));
            }
        }
        Ok(())
    }

    fn build_like_predicate(&self, w: &mut SqlWriter<'_>, like: &Like) -> QueryResult<()> {
        self.build_like(w, like, None)
    }

    /// `expr [NOT] LIKE pattern [ESCAPE e]`, with `pattern` replacing the node's own.
    fn build_like(&self, w: &mut SqlWriter<'_>, like: &Like, pattern: Option<&Value>) -> QueryResult<()> {
        self.build_operand(w, like.expr, Precedence::Comparison, false)?;
        w.push(if like.is_not { " NOT LIKE " } else { " LIKE " });
        match pattern {
            Some(value) => w.literal(value)?,
            None => self.build_operand(w, like.pattern, Precedence::Comparison, false)?,
        }
        if let Some(escape) = like.escape {
            w.push(" ESCAPE ");
            self.build_expression(w, escape)?;
        }
        Ok(())
    }

    fn build_search_condition(&self, w: &mut SqlWriter<'_>, id: NodeId) -> QueryResult<()> {
        let tree = w.tree;
        let Node::SearchCondition(sc) = tree.node(id) else {
            return self.build_predicate(w, id);
        };
        if sc.is_empty() {
            w.push("1 = 1");
            return Ok(());
        }
        for (i, condition) in sc.conditions.iter().enumerate() {
            if i > 0 {
                w.push(if sc.conditions[i - 1].is_or { " OR " } else { " AND " });
            }
            if condition.is_not {
                w.push("NOT ");
            }
            self.build_condition_operand(w, condition.predicate)?;
        }
        Ok(())
    }

    /// A predicate inside a condition list; compound conditions get parentheses.
    fn build_condition_operand(&self, w: &mut SqlWriter<'_>, id: NodeId) -> QueryResult<()> {
        let compound = matches!(w.tree.node(id), Node::SearchCondition(sc) if sc.conditions.len() > 1);
        if compound {
            w.push("(");
        }
        self.build_expression(w, id)?;
        if compound {
            w.push(")");
        }
        Ok(())
    }
}

/// Dialect-neutral spelling of a data type.
pub fn base_data_type(ty: &SqlDataType) -> QueryResult<String> {
    let name = match ty.data_type {
        DataType::Undefined => {
            return Err(QueryError::render("column has no data type"));
        }
        DataType::Double => "Float".to_string(),
        DataType::Single => "Real".to_string(),
        DataType::SByte | DataType::Byte => "TinyInt".to_string(),
        DataType::UInt16 | DataType::Int32 => "Int".to_string(),
        DataType::Int16 => "SmallInt".to_string(),
        DataType::UInt32 | DataType::Int64 => "BigInt".to_string(),
        DataType::UInt64 => "Decimal".to_string(),
        DataType::Boolean => "Bit".to_string(),
        other => other.to_string(),
    };

    Ok(match (ty.length, ty.precision) {
        (Some(length), _) if length > 0 => format!("{}({})", name, length),
        (_, Some(precision)) if precision > 0 => {
            format!("{}({},{})", name, precision, ty.scale.unwrap_or_default())
        }
        _ => name,
    })
}
