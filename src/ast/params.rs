//! Parameter substitution for parameter-dependent statements.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::value::Value;

use super::expr::{Precedence, SqlValue};
use super::node::{ElementType, Node};
use super::predicate::{
    Condition, ExprExpr, ExprPredicate, InList, IsNull, NotExpr, Operator, SearchCondition,
};
use super::{NodeId, SqlTree};

impl SqlTree {
    /// Copy the statement at `root` with parameter values folded in.
    ///
    /// Null parameters become null literals, equality between two known values
    /// becomes a boolean literal, and `IN` over a single list-valued parameter
    /// is expanded into literal values (or per-row key conditions for
    /// composite keys). Query parameters are shared with the original
    /// statement. Returns the new root.
    pub fn process_parameters(&mut self, root: NodeId) -> QueryResult<NodeId> {
        let copy = self.clone_with(root, &mut HashMap::new(), |tree, id| {
            !matches!(tree.node(id), Node::Parameter(p) if p.is_query_parameter)
        });

        // A list parameter that is the whole of an IN list stays a parameter
        // until its predicate is expanded, null or not.
        let lists: HashSet<NodeId> = self
            .find_parent_first(copy, &[ElementType::InListPredicate])
            .into_iter()
            .filter_map(|id| match self.node(id) {
                Node::InList(p) => match p.values.as_slice() {
                    [single] if matches!(self.node(*single), Node::Parameter(_)) => Some(*single),
                    _ => None,
                },
                _ => None,
            })
            .collect();

        let copy = self.walk(copy, false, |tree, id| tree.fold_parameters(id, &lists))?;

        let parameters: Vec<NodeId> = self
            .find_parent_first(copy, &[ElementType::SqlParameter])
            .into_iter()
            .filter(|&id| matches!(self.node(id), Node::Parameter(p) if p.is_query_parameter))
            .collect();
        self.query_mut(copy)?.parameters = parameters;
        Ok(copy)
    }

    fn fold_parameters(&mut self, id: NodeId, lists: &HashSet<NodeId>) -> QueryResult<NodeId> {
        match self.node(id) {
            Node::Parameter(p) if p.value().is_null() && !lists.contains(&id) => {
                let system_type = p.system_type;
                Ok(self.add(SqlValue {
                    value: Value::Null,
                    system_type,
                }))
            }
            Node::ExprExpr(ee) if matches!(ee.op, Operator::Equal | Operator::NotEqual) => {
                let (Some(left), Some(right)) = (self.known_value(ee.left), self.known_value(ee.right))
                else {
                    return Ok(id);
                };
                let equal = (left == right) == (ee.op == Operator::Equal);
                Ok(self.literal_predicate(equal, Precedence::Comparison))
            }
            Node::InList(p) => {
                let p = p.clone();
                self.expand_in_list(id, p)
            }
            _ => Ok(id),
        }
    }

    fn known_value(&self, id: NodeId) -> Option<Value> {
        match self.node(id) {
            Node::Value(v) => Some(v.value.clone()),
            Node::Parameter(p) => Some(p.value()),
            _ => None,
        }
    }

    fn literal_predicate(&mut self, value: bool, precedence: Precedence) -> NodeId {
        let literal = self.value(value);
        self.add(ExprPredicate::new(literal, precedence))
    }

    fn expand_in_list(&mut self, id: NodeId, p: InList) -> QueryResult<NodeId> {
        let single = match p.values.as_slice() {
            [] => return Ok(self.literal_predicate(p.is_not, Precedence::Primary)),
            [single] => *single,
            _ => return Ok(id),
        };
        let Node::Parameter(param) = self.node(single) else {
            return Ok(id);
        };
        let items = match param.value() {
            Value::Null => return Ok(self.literal_predicate(p.is_not, Precedence::Primary)),
            Value::List(items) => items,
            _ => return Ok(id),
        };
        debug!(items = items.len(), negated = p.is_not, "expanding parameterized IN list");

        if !matches!(self.node(p.expr), Node::Table(_) | Node::Query(_)) {
            if items.is_empty() {
                return Ok(self.literal_predicate(p.is_not, Precedence::Primary));
            }
            let values = items.into_iter().map(|v| self.value(v)).collect();
            return Ok(self.add(InList {
                expr: p.expr,
                is_not: p.is_not,
                values,
            }));
        }

        let keys = self.source_keys(p.expr)?;
        let members = keys
            .iter()
            .map(|&key| Ok(self.field(self.underlying_field(key)?)?.name.clone()))
            .collect::<QueryResult<Vec<String>>>()?;

        match keys.as_slice() {
            [] => Err(QueryError::MembershipExpression(
                "the source has no key columns to compare against".to_string(),
            )),
            [key] => {
                if items.is_empty() {
                    return Ok(self.literal_predicate(p.is_not, Precedence::Primary));
                }
                let values = items
                    .iter()
                    .map(|item| {
                        let value = key_value(item, &members[0]);
                        self.value(value)
                    })
                    .collect();
                Ok(self.add(InList {
                    expr: *key,
                    is_not: p.is_not,
                    values,
                }))
            }
            keys => {
                if items.is_empty() {
                    return Ok(self.literal_predicate(p.is_not, Precedence::Primary));
                }
                let mut rows = Vec::with_capacity(items.len());
                for item in &items {
                    let mut conditions = Vec::with_capacity(keys.len());
                    for (&key, member) in keys.iter().zip(&members) {
                        let predicate = match key_value(item, member) {
                            Value::Null => self.add(IsNull {
                                expr: key,
                                is_not: false,
                            }),
                            value => {
                                let value = self.value(value);
                                self.add(ExprExpr {
                                    left: key,
                                    op: Operator::Equal,
                                    right: value,
                                })
                            }
                        };
                        conditions.push(Condition::and(predicate));
                    }
                    let row = self.add(SearchCondition::new(conditions));
                    let row = self.add(ExprPredicate::new(row, Precedence::LogicalConjunction));
                    rows.push(Condition::or(row));
                }
                let any_row = self.add(SearchCondition::new(rows));
                if p.is_not {
                    Ok(self.add(NotExpr {
                        expr: any_row,
                        is_not: true,
                        precedence: Precedence::LogicalNegation,
                    }))
                } else {
                    Ok(self.add(ExprPredicate::new(any_row, Precedence::LogicalDisjunction)))
                }
            }
        }
    }
}

/// Key member of a list item; scalar items are their own key.
fn key_value(item: &Value, member: &str) -> Value {
    match item {
        Value::Record(_) => item.member(member).cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SqlParameter;
    use crate::mapping::{ColumnDescriptor, DataType, EntityDescriptor};

    fn list_parameter(tree: &mut SqlTree, items: Vec<Value>) -> NodeId {
        let mut p = SqlParameter::new("list", Value::List(items));
        p.is_query_parameter = false;
        tree.add(p)
    }

    fn where_predicate(tree: &SqlTree, query: NodeId) -> NodeId {
        let where_clause = tree.query(query).unwrap().where_clause;
        match tree.node(where_clause) {
            Node::SearchCondition(sc) => sc.conditions[0].predicate,
            other => panic!("unexpected {:?}", other),
        }
    }

    fn literal_of(tree: &SqlTree, predicate: NodeId) -> Option<bool> {
        match tree.node(predicate) {
            Node::ExprPredicate(e) => match tree.node(e.expr) {
                Node::Value(SqlValue { value: Value::Bool(b), .. }) => Some(*b),
                _ => None,
            },
            _ => None,
        }
    }

    fn in_list_query(tree: &mut SqlTree, is_not: bool, items: Vec<Value>) -> NodeId {
        let query = tree.new_query();
        let x = tree.value(5);
        let list = list_parameter(tree, items);
        let pred = tree.add(InList { expr: x, is_not, values: vec![list] });
        tree.where_add(query, pred).unwrap();
        query
    }

    #[test]
    fn test_empty_in_list_is_false_and_not_in_is_true() {
        let mut tree = SqlTree::new();
        let query = in_list_query(&mut tree, false, vec![]);
        let processed = tree.process_parameters(query).unwrap();
        assert_eq!(literal_of(&tree, where_predicate(&tree, processed)), Some(false));

        let query = in_list_query(&mut tree, true, vec![]);
        let processed = tree.process_parameters(query).unwrap();
        assert_eq!(literal_of(&tree, where_predicate(&tree, processed)), Some(true));
    }

    #[test]
    fn test_null_list_is_false_and_not_in_is_true() {
        let mut tree = SqlTree::new();
        for is_not in [false, true] {
            let query = tree.new_query();
            let x = tree.value(5);
            let mut list = SqlParameter::new("list", Value::Null);
            list.is_query_parameter = false;
            let list = tree.add(list);
            let pred = tree.add(InList { expr: x, is_not, values: vec![list] });
            tree.where_add(query, pred).unwrap();

            let processed = tree.process_parameters(query).unwrap();
            let predicate = where_predicate(&tree, processed);
            assert_eq!(literal_of(&tree, predicate), Some(is_not), "{}", tree.to_text(processed));
        }
    }

    #[test]
    fn test_null_parameter_among_list_values_becomes_literal() {
        let mut tree = SqlTree::new();
        let query = tree.new_query();
        let x = tree.value(5);
        let one = tree.value(1);
        let p = tree.add(SqlParameter::new("p", Value::Null));
        let pred = tree.add(InList { expr: x, is_not: false, values: vec![one, p] });
        tree.where_add(query, pred).unwrap();

        let processed = tree.process_parameters(query).unwrap();
        assert_eq!(tree.to_text(where_predicate(&tree, processed)), "5 IN (1, NULL)");
    }

    #[test]
    fn test_original_left_untouched() {
        let mut tree = SqlTree::new();
        let query = in_list_query(&mut tree, false, vec![Value::Int(1), Value::Int(2)]);
        let before = tree.to_text(query);
        let processed = tree.process_parameters(query).unwrap();
        assert_ne!(processed, query);
        assert_eq!(tree.to_text(query), before);
        assert_eq!(tree.to_text(processed), "SELECT  WHERE 5 IN (1, 2)");
    }

    #[test]
    fn test_known_equality_folds() {
        let mut tree = SqlTree::new();
        let query = tree.new_query();
        let p = tree.add(SqlParameter::new("p", Value::Int(3)));
        let three = tree.value(3);
        let ne = tree.add(ExprExpr { left: p, op: Operator::NotEqual, right: three });
        tree.where_add(query, ne).unwrap();

        let processed = tree.process_parameters(query).unwrap();
        assert_eq!(literal_of(&tree, where_predicate(&tree, processed)), Some(false));
    }

    #[test]
    fn test_null_parameter_becomes_literal() {
        let mut tree = SqlTree::new();
        let query = tree.new_query();
        let p = tree.add(SqlParameter::new("p", Value::Null));
        tree.select_add(query, p).unwrap();

        let processed = tree.process_parameters(query).unwrap();
        let column = tree.query(processed).unwrap().select.columns[0];
        let expr = tree.column(column).unwrap().expr;
        assert!(matches!(tree.node(expr), Node::Value(v) if v.value.is_null()));
        assert!(tree.query(processed).unwrap().parameters.is_empty());
    }

    fn keyed_table(tree: &mut SqlTree, keys: u32) -> NodeId {
        let mut entity = EntityDescriptor::new("Line")
            .with_column(ColumnDescriptor::new("OrderId", DataType::Int32))
            .with_column(ColumnDescriptor::new("LineNo", DataType::Int32));
        for (i, column) in entity.columns.iter_mut().take(keys as usize).enumerate() {
            column.primary_key = Some(i as u32 + 1);
        }
        tree.table_from_entity(&entity)
    }

    #[test]
    fn test_single_key_table_membership() {
        let mut tree = SqlTree::new();
        let table = keyed_table(&mut tree, 1);
        let query = tree.new_query();
        let list = list_parameter(
            &mut tree,
            vec![Value::record([("OrderId", Value::Int(7))]), Value::record([("OrderId", Value::Int(9))])],
        );
        let pred = tree.add(InList { expr: table, is_not: false, values: vec![list] });
        tree.where_add(query, pred).unwrap();

        let processed = tree.process_parameters(query).unwrap();
        assert_eq!(tree.to_text(where_predicate(&tree, processed)), "Line.OrderId IN (7, 9)");
    }

    #[test]
    fn test_composite_key_membership() {
        let mut tree = SqlTree::new();
        let table = keyed_table(&mut tree, 2);
        let query = tree.new_query();
        let list = list_parameter(
            &mut tree,
            vec![
                Value::record([("OrderId", Value::Int(1)), ("LineNo", Value::Int(2))]),
                Value::record([("OrderId", Value::Int(3)), ("LineNo", Value::Null)]),
            ],
        );
        let pred = tree.add(InList { expr: table, is_not: true, values: vec![list] });
        tree.where_add(query, pred).unwrap();

        let processed = tree.process_parameters(query).unwrap();
        assert_eq!(
            tree.to_text(where_predicate(&tree, processed)),
            "NOT ((Line.OrderId = 1 AND Line.LineNo = 2) OR (Line.OrderId = 3 AND Line.LineNo IS NULL))"
        );
    }

    #[test]
    fn test_keyless_table_membership_fails() {
        let mut tree = SqlTree::new();
        let table = keyed_table(&mut tree, 0);
        let query = tree.new_query();
        let list = list_parameter(&mut tree, vec![Value::record([("OrderId", Value::Int(1))])]);
        let pred = tree.add(InList { expr: table, is_not: false, values: vec![list] });
        tree.where_add(query, pred).unwrap();

        assert!(matches!(
            tree.process_parameters(query),
            Err(QueryError::MembershipExpression(_))
        ));
    }
}
