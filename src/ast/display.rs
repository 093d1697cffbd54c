//! Debug text of AST nodes.
//!
//! Rendering runs on an explicit task stack. A query that is reached again
//! while it is still being rendered (a self-referencing sub-query) prints as
//! `...`.

use std::collections::HashSet;

use super::node::Node;
use super::query::{QueryType, SelectQuery};
use super::{NodeId, SqlTree};
use crate::value::Value;

enum Task {
    Node(NodeId),
    Text(String),
    Leave(NodeId),
}

struct Plan(Vec<Task>);

impl Plan {
    fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.0.push(Task::Text(text.into()));
        self
    }

    fn node(&mut self, id: NodeId) -> &mut Self {
        self.0.push(Task::Node(id));
        self
    }

    fn list(&mut self, ids: &[NodeId], separator: &str) -> &mut Self {
        for (i, &id) in ids.iter().enumerate() {
            if i > 0 {
                self.text(separator);
            }
            self.node(id);
        }
        self
    }
}

impl SqlTree {
    /// Debug text of the subtree at `id`.
    pub fn to_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_text(id, &mut out, &mut HashSet::new());
        out
    }

    /// Append the debug text of `id` to `out`; `rendering` holds the queries on the
    /// current render path.
    pub fn write_text(&self, id: NodeId, out: &mut String, rendering: &mut HashSet<NodeId>) {
        let mut stack = vec![Task::Node(id)];

        while let Some(task) = stack.pop() {
            match task {
                Task::Text(text) => out.push_str(&text),
                Task::Leave(id) => {
                    rendering.remove(&id);
                }
                Task::Node(id) => {
                    if matches!(self.node(id), Node::Query(_)) && !rendering.insert(id) {
                        out.push_str("...");
                        continue;
                    }
                    let mut plan = Plan(Vec::new());
                    self.plan_node(id, &mut plan);
                    if matches!(self.node(id), Node::Query(_)) {
                        plan.0.push(Task::Leave(id));
                    }
                    stack.extend(plan.0.into_iter().rev());
                }
            }
        }
    }

    fn plan_node(&self, id: NodeId, plan: &mut Plan) {
        match self.node(id) {
            Node::Field(f) => {
                if let Some(Node::Table(t)) = f.table.map(|t| self.node(t)) {
                    plan.text(format!("{}.", t.physical_name));
                }
                plan.text(f.physical_name.clone());
            }
            Node::Parameter(p) => {
                plan.text(format!(
                    "@{}[{}]",
                    p.name.as_deref().unwrap_or("parameter"),
                    p.value()
                ));
            }
            Node::Value(v) => {
                plan.text(match &v.value {
                    Value::String(s) => format!("'{}'", s.replace('\'', "''")),
                    other => other.to_string(),
                });
            }
            Node::Function(f) => {
                plan.text(format!("{}(", f.name)).list(&f.params, ", ").text(")");
            }
            Node::Expression(e) => self.plan_expression(&e.expr, &e.params, plan),
            Node::Binary(b) => {
                plan.node(b.left)
                    .text(format!(" {} ", b.operation))
                    .node(b.right);
            }
            Node::Table(t) => {
                plan.text(t.physical_name.clone());
            }
            Node::ExprExpr(p) => {
                plan.node(p.left)
                    .text(format!(" {} ", p.op.as_sql()))
                    .node(p.right);
            }
            Node::Like(p) => {
                plan.node(p.expr)
                    .text(if p.is_not { " NOT LIKE " } else { " LIKE " })
                    .node(p.pattern);
                if let Some(escape) = p.escape {
                    plan.text(" ESCAPE ").node(escape);
                }
            }
            Node::Between(p) => {
                plan.node(p.expr)
                    .text(if p.is_not { " NOT BETWEEN " } else { " BETWEEN " })
                    .node(p.lower)
                    .text(" AND ")
                    .node(p.upper);
            }
            Node::IsNull(p) => {
                plan.node(p.expr)
                    .text(if p.is_not { " IS NOT NULL" } else { " IS NULL" });
            }
            Node::InSubQuery(p) => {
                plan.node(p.expr)
                    .text(if p.is_not { " NOT IN (" } else { " IN (" })
                    .node(p.sub_query)
                    .text(")");
            }
            Node::InList(p) => {
                plan.node(p.expr)
                    .text(if p.is_not { " NOT IN (" } else { " IN (" })
                    .list(&p.values, ", ")
                    .text(")");
            }
            Node::ExprPredicate(p) => {
                if matches!(self.node(p.expr), Node::SearchCondition(_)) {
                    plan.text("(").node(p.expr).text(")");
                } else {
                    plan.node(p.expr);
                }
            }
            Node::NotExpr(p) => {
                if p.is_not {
                    plan.text("NOT (").node(p.expr).text(")");
                } else {
                    plan.node(p.expr);
                }
            }
            Node::FuncLike(p) => {
                plan.node(p.function);
            }
            Node::SearchCondition(sc) => {
                for (i, c) in sc.conditions.iter().enumerate() {
                    if i > 0 {
                        plan.text(if sc.conditions[i - 1].is_or { " OR " } else { " AND " });
                    }
                    if c.is_not {
                        plan.text("NOT ");
                    }
                    let nested = matches!(self.node(c.predicate), Node::SearchCondition(_));
                    if nested {
                        plan.text("(");
                    }
                    plan.node(c.predicate);
                    if nested {
                        plan.text(")");
                    }
                }
            }
            Node::Column(c) => {
                plan.node(c.expr);
                if let Some(alias) = &c.alias {
                    plan.text(format!(" as {}", alias));
                }
            }
            Node::TableSource(ts) => {
                let is_query = matches!(self.node(ts.source), Node::Query(_));
                if is_query {
                    plan.text("(");
                }
                plan.node(ts.source);
                if is_query {
                    plan.text(")");
                }
                if let Some(alias) = &ts.alias {
                    plan.text(format!(" {}", alias));
                }
                for join in &ts.joins {
                    plan.text(format!(" {} ", join.join_type.as_sql()))
                        .node(join.table);
                    if !join.join_type.is_apply() {
                        plan.text(" ON ").node(join.condition);
                    }
                }
            }
            Node::Query(q) => self.plan_query(q, plan),
        }
    }

    fn plan_expression(&self, format: &str, params: &[NodeId], plan: &mut Plan) {
        let mut rest = format;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|c| open + c) else {
                break;
            };
            match rest[open + 1..close].parse::<usize>().ok().and_then(|i| params.get(i)) {
                Some(&param) => {
                    plan.text(&rest[..open]).node(param);
                }
                None => {
                    plan.text(&rest[..=close]);
                }
            }
            rest = &rest[close + 1..];
        }
        plan.text(rest);
    }

    fn plan_query(&self, q: &SelectQuery, plan: &mut Plan) {
        match q.query_type {
            QueryType::Insert | QueryType::InsertOrUpdate => {
                plan.text("INSERT INTO ");
                if let Some(into) = q.insert.into {
                    plan.node(into);
                }
                plan.text(" (");
                for (i, item) in q.insert.items.iter().enumerate() {
                    if i > 0 {
                        plan.text(", ");
                    }
                    plan.node(item.column).text(" = ").node(item.expr);
                }
                plan.text(")");
                if q.query_type == QueryType::Insert {
                    return;
                }
                plan.text(" OR ");
                self.plan_update(q, plan);
                return;
            }
            QueryType::Update => {
                self.plan_update(q, plan);
                plan.text(" ");
            }
            QueryType::Delete => {
                plan.text("DELETE ");
                if let Some(table) = q.delete.table {
                    plan.node(table).text(" ");
                }
            }
            QueryType::CreateTable => {
                plan.text(if q.create_table.is_drop { "DROP TABLE " } else { "CREATE TABLE " });
                if let Some(table) = q.create_table.table {
                    plan.node(table);
                }
                return;
            }
            QueryType::Select => {}
        }

        plan.text("SELECT ");
        if q.select.is_distinct {
            plan.text("DISTINCT ");
        }
        if let Some(skip) = q.select.skip {
            plan.text("SKIP ").node(skip).text(" ");
        }
        if let Some(take) = q.select.take {
            plan.text("TAKE ").node(take).text(" ");
        }
        plan.list(&q.select.columns, ", ");

        if !q.from.tables.is_empty() {
            plan.text(" FROM ").list(&q.from.tables, ", ");
        }
        if self.has_conditions(q.where_clause) {
            plan.text(" WHERE ").node(q.where_clause);
        }
        if !q.group_by.is_empty() {
            plan.text(" GROUP BY ").list(&q.group_by, ", ");
        }
        if self.has_conditions(q.having) {
            plan.text(" HAVING ").node(q.having);
        }
        if !q.order_by.is_empty() {
            plan.text(" ORDER BY ");
            for (i, item) in q.order_by.iter().enumerate() {
                if i > 0 {
                    plan.text(", ");
                }
                plan.node(item.expr);
                if item.is_descending {
                    plan.text(" DESC");
                }
            }
        }
        for union in &q.unions {
            plan.text(if union.is_all { " UNION ALL " } else { " UNION " })
                .node(union.query);
        }
    }

    fn plan_update(&self, q: &SelectQuery, plan: &mut Plan) {
        plan.text("UPDATE ");
        if let Some(table) = q.update.table {
            plan.node(table);
        }
        plan.text(" SET ");
        for (i, item) in q.update.items.iter().enumerate() {
            if i > 0 {
                plan.text(", ");
            }
            plan.node(item.column).text(" = ").node(item.expr);
        }
    }

    fn has_conditions(&self, search: NodeId) -> bool {
        !matches!(self.node(search), Node::SearchCondition(sc) if sc.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{InSubQuery, Precedence, TableSource};
    use crate::value::ScalarType;

    #[test]
    fn test_simple_select_text() {
        let mut tree = SqlTree::new();
        let query = tree.new_query();
        let one = tree.value(1);
        let name = tree.value("a'b");
        let eq = tree.add(crate::ast::ExprExpr {
            left: one,
            op: crate::ast::Operator::Equal,
            right: name,
        });
        tree.select_add(query, one).unwrap();
        tree.where_add(query, eq).unwrap();
        assert_eq!(tree.to_text(query), "SELECT 1 WHERE 1 = 'a''b'");
    }

    #[test]
    fn test_self_reference_prints_placeholder() {
        let mut tree = SqlTree::new();
        let query = tree.new_query();
        let one = tree.value(1);
        tree.select_add(query, one).unwrap();
        let pred = tree.add(InSubQuery {
            expr: one,
            is_not: false,
            sub_query: query,
        });
        tree.where_add(query, pred).unwrap();
        assert_eq!(tree.to_text(query), "SELECT 1 WHERE 1 IN (...)");
    }

    #[test]
    fn test_deep_expression_chain() {
        let mut tree = SqlTree::new();
        let mut expr = tree.value(0);
        for _ in 0..10_000 {
            let one = tree.value(1);
            expr = tree.binary(expr, "+", one, ScalarType::Int, Precedence::Additive);
        }
        let text = tree.to_text(expr);
        assert!(text.starts_with("0 + 1 + 1"));
        assert_eq!(text.matches('+').count(), 10_000);
    }

    #[test]
    fn test_deep_query_chain() {
        let mut tree = SqlTree::new();
        let mut inner = tree.new_query();
        let one = tree.value(1);
        tree.select_add(inner, one).unwrap();
        for _ in 0..10_000 {
            let outer = tree.new_query();
            let ts = tree.add(TableSource {
                source: inner,
                alias: None,
                joins: Vec::new(),
            });
            tree.query_mut(outer).unwrap().from.tables.push(ts);
            inner = outer;
        }
        let text = tree.to_text(inner);
        assert_eq!(text.matches("SELECT").count(), 10_001);
        assert!(!text.contains("..."));
    }
}
