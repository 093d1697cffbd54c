//! The closed node set and its structural edges.

use super::expr::{
    SqlBinaryExpression, SqlExpression, SqlField, SqlFunction, SqlParameter, SqlTable, SqlValue,
};
use super::predicate::{
    Between, ExprExpr, ExprPredicate, FuncLike, InList, InSubQuery, IsNull, Like, NotExpr,
    SearchCondition,
};
use super::query::{Column, SelectQuery, TableSource};
use super::NodeId;

/// Discriminator of a node's concrete kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    SqlField,
    SqlFunction,
    SqlParameter,
    SqlExpression,
    SqlBinaryExpression,
    SqlValue,
    SqlTable,
    ExprExprPredicate,
    LikePredicate,
    BetweenPredicate,
    IsNullPredicate,
    InSubQueryPredicate,
    InListPredicate,
    ExprPredicate,
    NotExprPredicate,
    FuncLikePredicate,
    SearchCondition,
    Column,
    TableSource,
    SelectQuery,
}

/// Every AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Field(SqlField),
    Function(SqlFunction),
    Parameter(SqlParameter),
    Expression(SqlExpression),
    Binary(SqlBinaryExpression),
    Value(SqlValue),
    Table(SqlTable),
    ExprExpr(ExprExpr),
    Like(Like),
    Between(Between),
    IsNull(IsNull),
    InSubQuery(InSubQuery),
    InList(InList),
    ExprPredicate(ExprPredicate),
    NotExpr(NotExpr),
    FuncLike(FuncLike),
    SearchCondition(SearchCondition),
    Column(Column),
    TableSource(TableSource),
    Query(SelectQuery),
}

impl Node {
    pub fn element_type(&self) -> ElementType {
        match self {
            Node::Field(_) => ElementType::SqlField,
            Node::Function(_) => ElementType::SqlFunction,
            Node::Parameter(_) => ElementType::SqlParameter,
            Node::Expression(_) => ElementType::SqlExpression,
            Node::Binary(_) => ElementType::SqlBinaryExpression,
            Node::Value(_) => ElementType::SqlValue,
            Node::Table(_) => ElementType::SqlTable,
            Node::ExprExpr(_) => ElementType::ExprExprPredicate,
            Node::Like(_) => ElementType::LikePredicate,
            Node::Between(_) => ElementType::BetweenPredicate,
            Node::IsNull(_) => ElementType::IsNullPredicate,
            Node::InSubQuery(_) => ElementType::InSubQueryPredicate,
            Node::InList(_) => ElementType::InListPredicate,
            Node::ExprPredicate(_) => ElementType::ExprPredicate,
            Node::NotExpr(_) => ElementType::NotExprPredicate,
            Node::FuncLike(_) => ElementType::FuncLikePredicate,
            Node::SearchCondition(_) => ElementType::SearchCondition,
            Node::Column(_) => ElementType::Column,
            Node::TableSource(_) => ElementType::TableSource,
            Node::Query(_) => ElementType::SelectQuery,
        }
    }

    /// Append the immediate structural children to `out`, in clause order.
    pub fn children(&self, out: &mut Vec<NodeId>) {
        match self {
            Node::Field(_) | Node::Parameter(_) | Node::Value(_) => {}
            Node::Function(f) => out.extend(&f.params),
            Node::Expression(e) => out.extend(&e.params),
            Node::Binary(b) => out.extend([b.left, b.right]),
            Node::Table(t) => {
                out.push(t.all);
                out.extend(&t.fields);
            }
            Node::ExprExpr(p) => out.extend([p.left, p.right]),
            Node::Like(p) => {
                out.extend([p.expr, p.pattern]);
                out.extend(p.escape);
            }
            Node::Between(p) => out.extend([p.expr, p.lower, p.upper]),
            Node::IsNull(p) => out.push(p.expr),
            Node::InSubQuery(p) => out.extend([p.expr, p.sub_query]),
            Node::InList(p) => {
                out.push(p.expr);
                out.extend(&p.values);
            }
            Node::ExprPredicate(p) => out.push(p.expr),
            Node::NotExpr(p) => out.push(p.expr),
            Node::FuncLike(p) => out.push(p.function),
            Node::SearchCondition(sc) => out.extend(sc.conditions.iter().map(|c| c.predicate)),
            Node::Column(c) => out.push(c.expr),
            Node::TableSource(ts) => {
                out.push(ts.source);
                for join in &ts.joins {
                    out.extend([join.table, join.condition]);
                }
            }
            Node::Query(q) => {
                out.extend(&q.select.columns);
                out.extend(q.select.take);
                out.extend(q.select.skip);
                out.extend(&q.from.tables);
                out.push(q.where_clause);
                out.extend(&q.group_by);
                out.push(q.having);
                out.extend(q.order_by.iter().map(|item| item.expr));
                out.extend(q.insert.into);
                for item in &q.insert.items {
                    out.extend([item.column, item.expr]);
                }
                out.extend(q.update.table);
                for item in q.update.items.iter().chain(&q.update.keys) {
                    out.extend([item.column, item.expr]);
                }
                out.extend(q.delete.table);
                out.extend(q.create_table.table);
                out.extend(q.unions.iter().map(|u| u.query));
            }
        }
    }

    /// Rewrite every ownership edge through `f`, in the same order as [`Node::children`].
    pub fn remap_children(&mut self, mut f: impl FnMut(NodeId) -> NodeId) {
        fn each(ids: &mut [NodeId], f: &mut impl FnMut(NodeId) -> NodeId) {
            for id in ids {
                *id = f(*id);
            }
        }
        fn opt(id: &mut Option<NodeId>, f: &mut impl FnMut(NodeId) -> NodeId) {
            if let Some(id) = id {
                *id = f(*id);
            }
        }

        match self {
            Node::Field(_) | Node::Parameter(_) | Node::Value(_) => {}
            Node::Function(x) => each(&mut x.params, &mut f),
            Node::Expression(x) => each(&mut x.params, &mut f),
            Node::Binary(x) => {
                x.left = f(x.left);
                x.right = f(x.right);
            }
            Node::Table(t) => {
                t.all = f(t.all);
                each(&mut t.fields, &mut f);
            }
            Node::ExprExpr(p) => {
                p.left = f(p.left);
                p.right = f(p.right);
            }
            Node::Like(p) => {
                p.expr = f(p.expr);
                p.pattern = f(p.pattern);
                opt(&mut p.escape, &mut f);
            }
            Node::Between(p) => {
                p.expr = f(p.expr);
                p.lower = f(p.lower);
                p.upper = f(p.upper);
            }
            Node::IsNull(p) => p.expr = f(p.expr),
            Node::InSubQuery(p) => {
                p.expr = f(p.expr);
                p.sub_query = f(p.sub_query);
            }
            Node::InList(p) => {
                p.expr = f(p.expr);
                each(&mut p.values, &mut f);
            }
            Node::ExprPredicate(p) => p.expr = f(p.expr),
            Node::NotExpr(p) => p.expr = f(p.expr),
            Node::FuncLike(p) => p.function = f(p.function),
            Node::SearchCondition(sc) => {
                for c in &mut sc.conditions {
                    c.predicate = f(c.predicate);
                }
            }
            Node::Column(c) => c.expr = f(c.expr),
            Node::TableSource(ts) => {
                ts.source = f(ts.source);
                for join in &mut ts.joins {
                    join.table = f(join.table);
                    join.condition = f(join.condition);
                }
            }
            Node::Query(q) => {
                each(&mut q.select.columns, &mut f);
                opt(&mut q.select.take, &mut f);
                opt(&mut q.select.skip, &mut f);
                each(&mut q.from.tables, &mut f);
                q.where_clause = f(q.where_clause);
                each(&mut q.group_by, &mut f);
                q.having = f(q.having);
                for item in &mut q.order_by {
                    item.expr = f(item.expr);
                }
                opt(&mut q.insert.into, &mut f);
                for item in &mut q.insert.items {
                    item.column = f(item.column);
                    item.expr = f(item.expr);
                }
                opt(&mut q.update.table, &mut f);
                for item in q.update.items.iter_mut().chain(q.update.keys.iter_mut()) {
                    item.column = f(item.column);
                    item.expr = f(item.expr);
                }
                opt(&mut q.delete.table, &mut f);
                opt(&mut q.create_table.table, &mut f);
                for union in &mut q.unions {
                    union.query = f(union.query);
                }
            }
        }
    }

    /// Rewrite navigation-only edges and side lists that are not ownership edges.
    pub fn remap_navigation(&mut self, mut f: impl FnMut(NodeId) -> NodeId) {
        match self {
            Node::Field(field) => field.table = field.table.map(&mut f),
            Node::Column(c) => c.parent = f(c.parent),
            Node::Query(q) => {
                q.parent_select = q.parent_select.map(&mut f);
                for p in &mut q.parameters {
                    *p = f(*p);
                }
            }
            _ => {}
        }
    }

    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Node::ExprExpr(_)
                | Node::Like(_)
                | Node::Between(_)
                | Node::IsNull(_)
                | Node::InSubQuery(_)
                | Node::InList(_)
                | Node::ExprPredicate(_)
                | Node::NotExpr(_)
                | Node::FuncLike(_)
                | Node::SearchCondition(_)
        )
    }
}

macro_rules! impl_into_node {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    Node::$variant(value)
                }
            }
        )*
    };
}

impl_into_node! {
    SqlField => Field,
    SqlFunction => Function,
    SqlParameter => Parameter,
    SqlExpression => Expression,
    SqlBinaryExpression => Binary,
    SqlValue => Value,
    SqlTable => Table,
    ExprExpr => ExprExpr,
    Like => Like,
    Between => Between,
    IsNull => IsNull,
    InSubQuery => InSubQuery,
    InList => InList,
    ExprPredicate => ExprPredicate,
    NotExpr => NotExpr,
    FuncLike => FuncLike,
    SearchCondition => SearchCondition,
    Column => Column,
    TableSource => TableSource,
    SelectQuery => Query,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SqlTree;
    use crate::value::Value;

    #[test]
    fn test_element_type_matches_variant() {
        let mut tree = SqlTree::new();
        let query = tree.new_query();
        let value = tree.value(1);
        assert_eq!(tree.element_type(query), ElementType::SelectQuery);
        assert_eq!(tree.element_type(value), ElementType::SqlValue);
        assert_eq!(
            Node::from(SqlParameter::new("p", Value::Null)).element_type(),
            ElementType::SqlParameter
        );
    }

    #[test]
    fn test_remap_follows_children_order() {
        let mut tree = SqlTree::new();
        let a = tree.value(1);
        let b = tree.value(2);
        let mut node = Node::from(ExprExpr {
            left: a,
            op: super::super::Operator::Equal,
            right: b,
        });
        node.remap_children(|id| if id == a { b } else { a });
        let mut children = Vec::new();
        node.children(&mut children);
        assert_eq!(children, vec![b, a]);
    }
}
