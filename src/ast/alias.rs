//! Alias allocation and statement finalization.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::QueryResult;

use super::node::{ElementType, Node};
use super::reserved::ReservedWords;
use super::{NodeId, SqlTree};

/// Longest alias kept as requested before falling back to the default prefix.
const MAX_ALIAS_LENGTH: usize = 25;

/// Aliases allocated within one statement, compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasSet {
    allocated: HashSet<String>,
    /// Per alias stem: every suffix from 2 up to (not including) this one is allocated.
    next_suffix: HashMap<String, u64>,
}

impl AliasSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.allocated.contains(&alias.to_uppercase())
    }

    pub fn remove(&mut self, alias: &str) {
        let upper = alias.to_uppercase();
        self.next_suffix.remove(stem(&upper));
        self.allocated.remove(&upper);
    }

    /// Allocate an alias close to `desired`.
    ///
    /// An empty or overlong request becomes `{default}1`. On collision with an
    /// allocated alias or a reserved word, the trailing number is incremented
    /// (starting from 1 when there is none) until a free alias is found.
    pub fn get_alias(&mut self, desired: Option<&str>, default: &str, reserved: &ReservedWords) -> String {
        let mut alias = match desired {
            Some(d) if !d.is_empty() && d.len() <= MAX_ALIAS_LENGTH => d.to_string(),
            _ => format!("{}1", default),
        };

        let text = stem(&alias).to_string();
        let mut digit: u64 = alias[text.len()..].parse().unwrap_or(1);
        let key = text.to_uppercase();

        loop {
            let upper = alias.to_uppercase();
            if !self.allocated.contains(&upper) && !reserved.is_reserved(&upper) {
                self.allocated.insert(upper);
                break;
            }
            let floor = self.next_suffix.get(&key).copied().unwrap_or(2);
            digit = match digit {
                0 => 1,
                d => d.saturating_add(1).max(floor),
            };
            alias = format!("{}{}", text, digit);
        }

        let next = self.next_suffix.entry(key).or_insert(2);
        if *next == digit {
            *next += 1;
        }

        trace!(alias = %alias, "allocated alias");
        alias
    }

    /// `n` aliases that are free right now, allocated as `{default}1`, `{default}2`…
    /// probing, without keeping them allocated.
    pub fn get_temp_aliases(&self, n: usize, default: &str, reserved: &ReservedWords) -> Vec<String> {
        let mut scratch = self.clone();
        (0..n)
            .map(|_| scratch.get_alias(None, default, reserved))
            .collect()
    }
}

/// `alias` without its trailing number.
fn stem(alias: &str) -> &str {
    alias.trim_end_matches(|c: char| c.is_ascii_digit())
}

impl SqlTree {
    /// Assign final aliases across the statement rooted at `root`.
    ///
    /// Query parameters get unique names and are collected into the root's
    /// parameter list; a non-query parameter marks the statement
    /// parameter-dependent. Columns (except `*`) and table sources get unique
    /// aliases. Union branches then take over the anchor's column aliases.
    pub fn set_aliases(&mut self, root: NodeId, reserved: &ReservedWords) -> QueryResult<()> {
        let mut aliases = AliasSet::new();
        let mut parameters = Vec::new();
        let mut parameter_dependent = false;

        let elements = self.find_parent_first(
            root,
            &[
                ElementType::SqlParameter,
                ElementType::Column,
                ElementType::TableSource,
                ElementType::SelectQuery,
            ],
        );

        for &id in &elements {
            match self.element_type(id) {
                ElementType::SqlParameter => {
                    let desired = self.parameter(id)?.name.clone();
                    if self.parameter(id)?.is_query_parameter {
                        let name = aliases.get_alias(desired.as_deref(), "p", reserved);
                        self.parameter_mut(id)?.name = Some(name);
                        parameters.push(id);
                    } else {
                        parameter_dependent = true;
                    }
                }
                ElementType::Column => {
                    let desired = self.column_alias(id)?;
                    if desired.as_deref() != Some("*") {
                        let alias = aliases.get_alias(desired.as_deref(), "c", reserved);
                        if let Node::Column(c) = self.node_mut(id) {
                            c.alias = Some(alias);
                        }
                    }
                }
                ElementType::TableSource => {
                    let desired = self.table_source_alias(id)?;
                    let alias = aliases.get_alias(desired.as_deref(), "t", reserved);
                    self.table_source_mut(id)?.alias = Some(alias);
                }
                _ => {}
            }
        }

        for &id in elements.iter().chain(std::iter::once(&root)) {
            if matches!(self.node(id), Node::Query(q) if q.has_union()) {
                self.sync_union_aliases(id)?;
            }
        }

        let q = self.query_mut(root)?;
        q.parameters = parameters;
        q.is_parameter_dependent |= parameter_dependent;
        q.aliases = Some(aliases);
        Ok(())
    }

    fn sync_union_aliases(&mut self, query: NodeId) -> QueryResult<()> {
        let q = self.query(query)?;
        let anchor: Vec<Option<String>> = q
            .select
            .columns
            .iter()
            .map(|&c| self.column(c).map(|c| c.alias.clone()))
            .collect::<QueryResult<_>>()?;
        let branches: Vec<NodeId> = q.unions.iter().map(|u| u.query).collect();

        for branch in branches {
            let columns = self.query(branch)?.select.columns.clone();
            for (column, alias) in columns.into_iter().zip(&anchor) {
                if let Node::Column(c) = self.node_mut(column) {
                    c.alias = alias.clone();
                }
            }
        }
        Ok(())
    }

    /// Requested alias of a column: explicit, else the projected field or column's own.
    pub fn column_alias(&self, column: NodeId) -> QueryResult<Option<String>> {
        let mut current = self.column(column)?;
        loop {
            if current.alias.is_some() {
                return Ok(current.alias.clone());
            }
            match self.node(current.expr) {
                Node::Field(f) => {
                    return Ok(Some(f.alias.clone().unwrap_or_else(|| f.physical_name.clone())));
                }
                Node::Column(inner) => current = inner,
                _ => return Ok(None),
            }
        }
    }

    /// Alias of a table source, falling back to its table's alias.
    pub fn table_source_alias(&self, ts: NodeId) -> QueryResult<Option<String>> {
        let source = self.table_source(ts)?;
        if source.alias.is_some() {
            return Ok(source.alias.clone());
        }
        Ok(match self.node(source.source) {
            Node::Table(t) => t.alias.clone(),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SqlParameter;
    use crate::mapping::{ColumnDescriptor, DataType, EntityDescriptor};
    use crate::value::Value;

    #[test]
    fn test_get_alias_probing() {
        let reserved = ReservedWords::builtin();
        let mut aliases = AliasSet::new();
        assert_eq!(aliases.get_alias(None, "t", &reserved), "t1");
        assert_eq!(aliases.get_alias(Some("T1"), "t", &reserved), "T2");
        assert_eq!(aliases.get_alias(Some("Name"), "c", &reserved), "Name");
        assert_eq!(aliases.get_alias(Some("name"), "c", &reserved), "name2");
        assert_eq!(aliases.get_alias(Some(&"x".repeat(26)), "c", &reserved), "c1");
    }

    #[test]
    fn test_reserved_words_skipped() {
        let reserved = ReservedWords::builtin();
        let mut aliases = AliasSet::new();
        assert_eq!(aliases.get_alias(Some("Order"), "c", &reserved), "Order2");
        assert_eq!(aliases.get_alias(Some("select"), "c", &reserved), "select2");
    }

    #[test]
    fn test_many_collisions_take_consecutive_suffixes() {
        let reserved = ReservedWords::builtin();
        let mut aliases = AliasSet::new();
        assert_eq!(aliases.get_alias(Some("FirstName"), "c", &reserved), "FirstName");
        for n in 2..=10_000 {
            assert_eq!(
                aliases.get_alias(Some("FirstName"), "c", &reserved),
                format!("FirstName{}", n)
            );
        }
        assert_eq!(aliases.get_alias(Some("FirstName5"), "c", &reserved), "FirstName10001");
    }

    #[test]
    fn test_removed_alias_is_reused() {
        let reserved = ReservedWords::builtin();
        let mut aliases = AliasSet::new();
        for _ in 0..4 {
            aliases.get_alias(Some("c"), "c", &reserved);
        }
        aliases.remove("c3");
        assert_eq!(aliases.get_alias(Some("c"), "c", &reserved), "c3");
        assert_eq!(aliases.get_alias(Some("c"), "c", &reserved), "c5");
    }

    #[test]
    fn test_temp_aliases_not_kept() {
        let reserved = ReservedWords::builtin();
        let mut aliases = AliasSet::new();
        aliases.get_alias(None, "t", &reserved);
        assert_eq!(aliases.get_temp_aliases(2, "t", &reserved), vec!["t2", "t3"]);
        assert!(!aliases.contains("t2"));
    }

    #[test]
    fn test_set_aliases_unique_per_statement() {
        let reserved = ReservedWords::builtin();
        let entity = EntityDescriptor::new("Person")
            .with_column(ColumnDescriptor::new("Id", DataType::Int32))
            .with_column(ColumnDescriptor::new("Order", DataType::Int32));

        let mut tree = SqlTree::new();
        let outer = tree.new_query();
        let inner = tree.new_query();
        let table = tree.table_from_entity(&entity);
        tree.add_from(inner, table, None).unwrap();
        tree.add_from(outer, inner, None).unwrap();
        for member in ["Id", "Order"] {
            let field = tree.table_field(table, member).unwrap();
            let index = tree.select_add(inner, field).unwrap();
            let column = tree.query(inner).unwrap().select.columns[index];
            tree.select_add(outer, column).unwrap();
        }
        let p1 = tree.add(SqlParameter::new("id", Value::Int(1)));
        let p2 = tree.add(SqlParameter::new("id", Value::Int(2)));
        let eq = tree.add(crate::ast::ExprExpr { left: p1, op: crate::ast::Operator::Equal, right: p2 });
        tree.where_add(outer, eq).unwrap();

        tree.set_aliases(outer, &reserved).unwrap();

        let mut seen = HashSet::new();
        for id in tree.find_parent_first(outer, &[ElementType::Column, ElementType::TableSource]) {
            let alias = match tree.node(id) {
                Node::Column(c) => c.alias.clone().unwrap(),
                Node::TableSource(ts) => ts.alias.clone().unwrap(),
                _ => unreachable!(),
            };
            assert!(!reserved.is_reserved(&alias), "{} is reserved", alias);
            assert!(seen.insert(alias.to_uppercase()), "{} is duplicated", alias);
        }
        let q = tree.query(outer).unwrap();
        assert_eq!(q.parameters, vec![p1, p2]);
        assert_eq!(tree.parameter(p1).unwrap().name.as_deref(), Some("id"));
        assert_eq!(tree.parameter(p2).unwrap().name.as_deref(), Some("id2"));
    }

    #[test]
    fn test_non_query_parameter_marks_dependent() {
        let reserved = ReservedWords::builtin();
        let mut tree = SqlTree::new();
        let query = tree.new_query();
        let mut list = SqlParameter::new("ids", Value::List(vec![Value::Int(1)]));
        list.is_query_parameter = false;
        let list = tree.add(list);
        let one = tree.value(1);
        let pred = tree.add(crate::ast::InList { expr: one, is_not: false, values: vec![list] });
        tree.where_add(query, pred).unwrap();

        tree.set_aliases(query, &reserved).unwrap();
        let q = tree.query(query).unwrap();
        assert!(q.is_parameter_dependent);
        assert!(q.parameters.is_empty());
    }
}
