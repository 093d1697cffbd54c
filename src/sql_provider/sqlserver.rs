//! SQL Server family: 2000, 2005, 2008 and 2012.

use std::fmt::Write as _;

use tracing::debug;

use crate::ast::{ElementType, Like, Node, NodeId, SelectQuery, SqlField, SqlTree, SqlValue};
use crate::error::{QueryError, QueryResult};
use crate::mapping::DataType;
use crate::value::{ScalarType, Value};

use super::flags::SqlProviderFlags;
use super::generator::{base_data_type, ConvertType, SelectOptions, SqlGenerator};
use super::paging::RowNumberWindow;
use super::value_to_sql::{quote_string, ValueToSqlConverter};
use super::writer::SqlWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SqlServerVersion {
    V2000,
    V2005,
    V2008,
    V2012,
}

impl SqlServerVersion {
    /// Version for a configured version string; unknown strings select 2008.
    pub fn from_config(version: &str) -> Self {
        match version.trim() {
            "2000" => Self::V2000,
            "2005" => Self::V2005,
            "2012" | "2014" => Self::V2012,
            _ => Self::V2008,
        }
    }
}

pub struct SqlServerGenerator {
    version: SqlServerVersion,
}

impl SqlServerGenerator {
    pub fn new(version: SqlServerVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> SqlServerVersion {
        self.version
    }

    /// Paging as a `ROW_NUMBER()` window over the unpaged query.
    ///
    /// The outer statement filters on the row number only and carries no
    /// `ORDER BY`, so callers must not rely on the order of the returned rows.
    fn build_row_number_paging(&self, w: &mut SqlWriter<'_>, query: NodeId) -> QueryResult<()> {
        let tree = w.tree;
        let q = tree.query(query)?;
        let skip = q
            .select
            .skip
            .ok_or_else(|| QueryError::internal("row-number paging without skip"))?;

        let tables = w.temp_aliases(2, "t");
        let row_number = w.temp_aliases(1, "rn").concat();
        let order_aliases = w.temp_aliases(q.order_by.len(), "oby");
        debug!(skip = %skip, take = ?q.select.take, "paging through ROW_NUMBER window");

        let inner = self.convert_name(&tables[0], ConvertType::NameToQueryTableAlias);
        let outer = self.convert_name(&tables[1], ConvertType::NameToQueryTableAlias);
        let rn = self.convert_name(&row_number, ConvertType::NameToQueryFieldAlias);

        w.line("SELECT *");
        w.line("FROM");
        w.line("(");
        w.indent();
        w.line("SELECT");
        w.indent();
        w.line(&format!("{}.*,", inner));
        w.line("ROW_NUMBER() OVER");
        w.line("(");
        w.indent();
        w.line("ORDER BY");
        w.indent();
        if q.order_by.is_empty() {
            let first = match q.select.columns.first() {
                Some(&column) => tree.column(column)?.alias.clone(),
                None => None,
            };
            match first {
                Some(alias) => {
                    let alias = self.convert_name(&alias, ConvertType::NameToQueryField);
                    w.line(&format!("{}.{}", inner, alias));
                }
                None => {
                    w.line("(SELECT NULL)");
                }
            }
        } else {
            for (i, (item, alias)) in q.order_by.iter().zip(&order_aliases).enumerate() {
                if i > 0 {
                    w.push(",").newline();
                }
                let alias = self.convert_name(alias, ConvertType::NameToQueryField);
                w.push_indent().push(&inner).push(".").push(&alias);
                if item.is_descending {
                    w.push(" DESC");
                }
            }
            w.newline();
        }
        w.outdent();
        w.outdent();
        w.line(&format!(") as {}", rn));
        w.outdent();
        w.line("FROM");
        w.line("(");
        w.indent();

        let options = SelectOptions {
            extra_columns: q
                .order_by
                .iter()
                .map(|item| item.expr)
                .zip(order_aliases)
                .collect(),
            suppress_order_by: true,
            suppress_paging: true,
        };
        self.build_select_query(w, query, &options)?;

        w.outdent();
        w.line(&format!(") {}", inner));
        w.outdent();
        w.line(&format!(") {}", outer));

        let column = format!("{}.{}", outer, rn);
        let condition = match (literal_int(tree, skip), q.select.take.map(|t| literal_int(tree, t))) {
            (Some(skip), None) => RowNumberWindow::from_paging(skip, None)?.condition(&column),
            (Some(skip), Some(Some(take))) => {
                RowNumberWindow::from_paging(skip, Some(take))?.condition(&column)
            }
            _ => {
                let skip_sql = self.capture(w, &mut |w| self.build_expression(w, skip))?;
                match q.select.take {
                    None => format!("{} > {}", column, skip_sql),
                    Some(take) => {
                        let take_sql = self.capture(w, &mut |w| self.build_expression(w, take))?;
                        format!(
                            "{} BETWEEN {} + 1 AND {} + {}",
                            column, skip_sql, skip_sql, take_sql
                        )
                    }
                }
            }
        };
        w.line("WHERE");
        w.indent();
        w.line(&condition);
        w.outdent();
        Ok(())
    }

    fn identity_field<'t>(&self, tree: &'t SqlTree, q: &SelectQuery) -> QueryResult<&'t SqlField> {
        let into = q
            .insert
            .into
            .ok_or_else(|| QueryError::internal("insert without a target table"))?;
        let table = tree.table(into)?;
        for &field in &table.fields {
            let f = tree.field(field)?;
            if f.is_identity {
                return Ok(f);
            }
        }
        Err(QueryError::render(format!(
            "table '{}' has no identity field",
            table.name
        )))
    }
}

fn literal_int(tree: &SqlTree, id: NodeId) -> Option<i64> {
    match tree.node(id) {
        Node::Value(SqlValue { value, .. }) => value.as_i64(),
        _ => None,
    }
}

/// Brackets each dotted segment unless the name is bracketed already.
fn bracket(name: &str) -> String {
    if name.starts_with('[') {
        return name.to_string();
    }
    format!("[{}]", name.split('.').collect::<Vec<_>>().join("].["))
}

fn convert_unicode_string(sb: &mut String, value: &Value) {
    match value {
        Value::String(s) => quote_string(sb, "N", s),
        Value::Char(c) => quote_string(sb, "N", &c.to_string()),
        _ => {}
    }
}

fn convert_binary(sb: &mut String, value: &Value) {
    if let Value::Bytes(bytes) = value {
        sb.push_str("0x");
        for byte in bytes {
            let _ = write!(sb, "{:02X}", byte);
        }
    }
}

impl SqlGenerator for SqlServerGenerator {
    fn name(&self) -> &'static str {
        match self.version {
            SqlServerVersion::V2000 => "SqlServer.2000",
            SqlServerVersion::V2005 => "SqlServer.2005",
            SqlServerVersion::V2008 => "SqlServer.2008",
            SqlServerVersion::V2012 => "SqlServer.2012",
        }
    }

    fn flags(&self) -> SqlProviderFlags {
        let is_2000 = self.version == SqlServerVersion::V2000;
        SqlProviderFlags {
            is_skip_supported: !is_2000,
            is_take_supported: true,
            accepts_take_as_parameter: !is_2000,
            is_distinct_order_by_supported: false,
            is_insert_or_update_supported: true,
            is_apply_join_supported: !is_2000,
        }
    }

    fn convert_name(&self, name: &str, kind: ConvertType) -> String {
        match kind {
            ConvertType::NameToQueryParameter
            | ConvertType::NameToCommandParameter
            | ConvertType::NameToSprocParameter => format!("@{}", name),
            ConvertType::SprocParameterToName => name.strip_prefix('@').unwrap_or(name).to_string(),
            ConvertType::NameToQueryField
            | ConvertType::NameToQueryFieldAlias
            | ConvertType::NameToQueryTableAlias => {
                if name.starts_with('[') {
                    name.to_string()
                } else {
                    format!("[{}]", name)
                }
            }
            ConvertType::NameToDatabase | ConvertType::NameToOwner | ConvertType::NameToQueryTable => {
                bracket(name)
            }
        }
    }

    fn value_converter(&self) -> ValueToSqlConverter {
        let mut converter = ValueToSqlConverter::new(vec![ValueToSqlConverter::with_defaults()]);
        converter.set_converter(ScalarType::String, convert_unicode_string);
        converter.set_converter(ScalarType::Char, convert_unicode_string);
        converter.set_converter(ScalarType::Bytes, convert_binary);
        converter
    }

    /// Parameterized LIKE patterns get their brackets escaped when bound.
    fn prepare(&self, tree: &mut SqlTree, root: NodeId) -> QueryResult<()> {
        for like in tree.find_parent_first(root, &[ElementType::LikePredicate]) {
            let Node::Like(Like { pattern, .. }) = tree.node(like) else {
                continue;
            };
            let pattern = *pattern;
            if let Node::Parameter(p) = tree.node_mut(pattern) {
                p.replace_like = true;
            }
        }
        Ok(())
    }

    fn first_format(&self, query: &SelectQuery) -> Option<&'static str> {
        if query.select.skip.is_some() {
            return None;
        }
        Some(match self.version {
            SqlServerVersion::V2000 => "TOP {0}",
            _ => "TOP ({0})",
        })
    }

    fn limit_format(&self, query: &SelectQuery) -> Option<&'static str> {
        (self.version == SqlServerVersion::V2012 && query.select.skip.is_some())
            .then_some("FETCH NEXT {0} ROWS ONLY")
    }

    fn offset_format(&self, _query: &SelectQuery) -> Option<&'static str> {
        (self.version == SqlServerVersion::V2012).then_some("OFFSET {0} ROWS")
    }

    fn offset_first(&self) -> bool {
        true
    }

    fn identity_query(&self) -> Option<&'static str> {
        (self.version == SqlServerVersion::V2000).then_some("SELECT SCOPE_IDENTITY()")
    }

    fn update_from_clause(&self) -> bool {
        true
    }

    fn identity_attribute(&self) -> &'static str {
        "IDENTITY"
    }

    fn build_sql(&self, w: &mut SqlWriter<'_>, query: NodeId) -> QueryResult<()> {
        let tree = w.tree;
        let q = tree.query(query)?;
        if q.select.skip.is_none() || !q.is_select() {
            return self.build_select_query(w, query, &SelectOptions::default());
        }
        match self.version {
            SqlServerVersion::V2000 => Err(QueryError::render(
                "SqlServer.2000 cannot skip rows",
            )),
            SqlServerVersion::V2005 | SqlServerVersion::V2008 => {
                self.build_row_number_paging(w, query)
            }
            SqlServerVersion::V2012 => {
                self.build_select_query(w, query, &SelectOptions::default())
            }
        }
    }

    fn build_order_by_clause(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        if q.order_by.is_empty() && q.select.skip.is_some() && self.version == SqlServerVersion::V2012 {
            w.line("ORDER BY");
            w.indent();
            w.line("(SELECT NULL)");
            w.outdent();
            return Ok(());
        }
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

    /// Conditions projected as values become `CASE WHEN … THEN 1 ELSE 0 END`.
    fn build_column_expression(&self, w: &mut SqlWriter<'_>, expr: NodeId) -> QueryResult<()> {
        let tree = w.tree;
        let is_condition = match tree.node(expr) {
            Node::Expression(e) if e.is_wrapper() => tree.node(e.params[0]).is_predicate(),
            node => node.is_predicate(),
        };
        if !is_condition {
            return self.build_expression(w, expr);
        }
        w.push("CASE WHEN ");
        self.build_expression(w, expr)?;
        w.push(" THEN 1 ELSE 0 END");
        Ok(())
    }

    fn build_like_predicate(&self, w: &mut SqlWriter<'_>, like: &Like) -> QueryResult<()> {
        let tree = w.tree;
        match tree.node(like.pattern) {
            Node::Value(SqlValue {
                value: Value::String(pattern),
                ..
            }) if pattern.contains('[') => {
                let escaped = Value::String(pattern.replace('[', "[[]"));
                self.build_like(w, like, Some(&escaped))
            }
            _ => self.build_like(w, like, None),
        }
    }

    fn build_output_subclause(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        if !q.insert.with_identity || self.version == SqlServerVersion::V2000 {
            return Ok(());
        }
        let field = self.identity_field(w.tree, q)?;
        let name = self.convert_name(&field.physical_name, ConvertType::NameToQueryField);
        w.line(&format!("OUTPUT [INSERTED].{}", name));
        Ok(())
    }

    fn build_update_table_name(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        let tree = w.tree;
        match q.from.tables.first() {
            Some(&ts) => {
                let alias = tree
                    .table_source(ts)?
                    .alias
                    .as_deref()
                    .ok_or_else(|| QueryError::internal("update source has no alias"))?;
                w.push(&self.convert_name(alias, ConvertType::NameToQueryTableAlias));
                Ok(())
            }
            None => {
                let table = q
                    .update
                    .table
                    .ok_or_else(|| QueryError::internal("update without a target table"))?;
                let name = self.physical_table_name(tree.table(table)?);
                w.push(&name);
                Ok(())
            }
        }
    }

    fn build_delete_clause(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        let tree = w.tree;
        let alias = match q.from.tables.first() {
            Some(&ts) => tree.table_source(ts)?.alias.clone(),
            None => None,
        };
        match alias {
            Some(alias) => {
                let alias = self.convert_name(&alias, ConvertType::NameToQueryTableAlias);
                w.line(&format!("DELETE {}", alias));
            }
            None => {
                w.line("DELETE");
            }
        }
        Ok(())
    }

    fn build_insert_or_update_query(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        self.build_update_then_insert(w, q, "IF @@ROWCOUNT = 0")
    }

    fn build_create_table_primary_key(
        &self,
        w: &mut SqlWriter<'_>,
        pk_name: &str,
        fields: &[String],
    ) -> QueryResult<()> {
        if !pk_name.starts_with("[PK_#") {
            w.push("CONSTRAINT ").push(pk_name).push(" ");
        }
        w.push("PRIMARY KEY CLUSTERED (")
            .push(&fields.join(", "))
            .push(")");
        Ok(())
    }

    fn build_data_type(&self, field: &SqlField) -> QueryResult<String> {
        let ty = &field.data_type;
        let unbounded = ty.is_max_length();
        Ok(match ty.data_type {
            DataType::Guid => "UniqueIdentifier".to_string(),
            DataType::Variant => "Sql_Variant".to_string(),
            DataType::NVarChar | DataType::VarChar | DataType::VarBinary if unbounded => {
                format!("{}(Max)", ty.data_type)
            }
            _ => base_data_type(ty)?,
        })
    }

    fn build_drop_table(&self, w: &mut SqlWriter<'_>, q: &SelectQuery) -> QueryResult<()> {
        let table = self.create_table_target(w.tree, q)?;
        let name = self.physical_table_name(table);
        if table.is_temporary() {
            w.line(&format!("DROP TABLE {}", name));
            return Ok(());
        }
        w.line(&format!(
            "IF EXISTS (SELECT 1 FROM sys.objects WHERE object_id = OBJECT_ID(N'{}') AND type in (N'U'))",
            name
        ));
        w.line(&format!("BEGIN DROP TABLE {} END", name));
        Ok(())
    }
}
