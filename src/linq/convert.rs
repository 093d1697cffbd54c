//! Lambda bodies to SQL expressions and predicates.

use crate::ast::expr::escape_like_text;
use crate::ast::{
    Condition, ExprExpr, InList, IsNull, Like, Node, NodeId, NotExpr, Operator, Precedence,
    SearchCondition, SqlExpression, SqlFunction, SqlParameter,
};
use crate::error::{QueryError, QueryResult};
use crate::value::{ScalarType, Value};

use super::builder::ExpressionBuilder;
use super::context::{ConvertFlags, SqlInfo};
use super::expr::{BinaryOp, Expr, UnaryOp};

const LIKE_ESCAPE: char = '~';

fn comparison_operator(op: BinaryOp) -> Option<Operator> {
    Some(match op {
        BinaryOp::Equal => Operator::Equal,
        BinaryOp::NotEqual => Operator::NotEqual,
        BinaryOp::Less => Operator::Less,
        BinaryOp::LessOrEqual => Operator::LessOrEqual,
        BinaryOp::Greater => Operator::Greater,
        BinaryOp::GreaterOrEqual => Operator::GreaterOrEqual,
        _ => return None,
    })
}

fn arithmetic_operator(op: BinaryOp) -> Option<(&'static str, Precedence)> {
    Some(match op {
        BinaryOp::Add => ("+", Precedence::Additive),
        BinaryOp::Subtract => ("-", Precedence::Subtraction),
        BinaryOp::Multiply => ("*", Precedence::Multiplicative),
        BinaryOp::Divide => ("/", Precedence::Multiplicative),
        BinaryOp::Modulo => ("%", Precedence::Multiplicative),
        _ => return None,
    })
}

fn is_null_constant(expr: &Expr) -> bool {
    matches!(expr.unquote(), Expr::Constant(Value::Null))
}

/// A list-valued constant or captured value: the collection side of `Contains`.
fn is_list(expr: &Expr) -> bool {
    matches!(
        expr.unquote(),
        Expr::Constant(Value::List(_)) | Expr::QueryParam { value: Value::List(_), .. }
    )
}

impl ExpressionBuilder<'_> {
    /// All SQL expressions `expr` stands for. Member paths over a scoped lambda
    /// parameter are resolved by its context; anything else is one scalar.
    pub fn convert_expr_infos(&mut self, expr: &Expr, flags: ConvertFlags) -> QueryResult<Vec<SqlInfo>> {
        if let Some((root, path)) = expr.member_path() {
            if let Some(ctx) = self.find_scope(root) {
                return self.convert_to_sql(ctx, &path, flags);
            }
        }
        Ok(vec![SqlInfo::new(self.convert_scalar(expr)?)])
    }

    fn convert_single(&mut self, expr: &Expr) -> QueryResult<NodeId> {
        let infos = self.convert_expr_infos(expr, ConvertFlags::Field)?;
        match infos.as_slice() {
            [info] => Ok(info.sql),
            infos => Err(QueryError::unsupported(format!(
                "{} maps to {} columns where a single value is expected",
                expr.kind(),
                infos.len()
            ))),
        }
    }

    /// `expr` as one scalar SQL expression.
    pub fn convert_scalar(&mut self, expr: &Expr) -> QueryResult<NodeId> {
        let expr = expr.unquote();
        match expr {
            Expr::Constant(value @ (Value::List(_) | Value::Record(_))) => Err(QueryError::unsupported(
                format!("constant of type {:?} cannot be used as a value", value.scalar_type()),
            )),
            Expr::Constant(value) => Ok(self.tree.value(value.clone())),
            Expr::QueryParam { name, value } => {
                Ok(self.tree.add(SqlParameter::new(name.clone(), value.clone())))
            }
            Expr::Parameter(_) | Expr::Member { .. } => {
                let sql = self.convert_single(expr)?;
                if let Node::Table(table) = self.tree.node(sql) {
                    return Err(QueryError::unsupported(format!(
                        "entity '{}' cannot be used as a scalar value",
                        table.name
                    )));
                }
                Ok(sql)
            }
            Expr::Binary { op, left, right } => self.convert_binary(*op, left, right),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                let predicate = self.convert_predicate(operand)?;
                Ok(self.tree.add(NotExpr {
                    expr: predicate,
                    is_not: true,
                    precedence: Precedence::LogicalNegation,
                }))
            }
            Expr::Unary {
                op: UnaryOp::Negate,
                operand,
            } => {
                let operand = self.convert_scalar(operand)?;
                let system_type = self.tree.system_type(operand);
                Ok(self.tree.add(SqlExpression {
                    expr: "-{0}".to_string(),
                    params: vec![operand],
                    system_type,
                    precedence: Precedence::Multiplicative,
                }))
            }
            Expr::Function { name, args } => self.convert_function(name, args),
            other => Err(QueryError::unsupported(format!(
                "{} cannot be translated to SQL",
                other.kind()
            ))),
        }
    }

    /// `expr` as a condition; boolean values are compared with `true`.
    pub fn convert_predicate(&mut self, expr: &Expr) -> QueryResult<NodeId> {
        let sql = self.convert_scalar(expr)?;
        if self.tree.node(sql).is_predicate() {
            return Ok(sql);
        }
        if self.tree.system_type(sql) == ScalarType::Bool {
            let yes = self.tree.value(true);
            return Ok(self.tree.add(ExprExpr {
                left: sql,
                op: Operator::Equal,
                right: yes,
            }));
        }
        Err(QueryError::unsupported(format!(
            "{} is not a condition",
            expr.unquote().kind()
        )))
    }

    fn convert_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> QueryResult<NodeId> {
        if op.is_logical() {
            return self.convert_logical(op, left, right);
        }

        if let Some(operator) = comparison_operator(op) {
            let null_check = match (is_null_constant(left), is_null_constant(right)) {
                (false, true) => Some(left),
                (true, false) => Some(right),
                _ => None,
            };
            if let (Some(operand), BinaryOp::Equal | BinaryOp::NotEqual) = (null_check, op) {
                let expr = self.convert_scalar(operand)?;
                return Ok(self.tree.add(IsNull {
                    expr,
                    is_not: op == BinaryOp::NotEqual,
                }));
            }
            let left = self.convert_scalar(left)?;
            let right = self.convert_scalar(right)?;
            return Ok(self.tree.add(ExprExpr {
                left,
                op: operator,
                right,
            }));
        }

        let left = self.convert_scalar(left)?;
        let right = self.convert_scalar(right)?;
        let system_type = match self.tree.system_type(left) {
            ScalarType::Unknown => self.tree.system_type(right),
            ty => ty,
        };
        if op == BinaryOp::Coalesce {
            return Ok(self
                .tree
                .add(SqlFunction::new("Coalesce", vec![left, right], system_type)));
        }
        let (operation, precedence) = arithmetic_operator(op)
            .ok_or_else(|| QueryError::internal(format!("unhandled operator {:?}", op)))?;
        Ok(self.tree.binary(left, operation, right, system_type, precedence))
    }

    /// A chain of the same logical operator becomes one flat search condition.
    fn convert_logical(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> QueryResult<NodeId> {
        let mut operands = Vec::new();
        collect_operands(op, left, &mut operands);
        collect_operands(op, right, &mut operands);

        let last = operands.len() - 1;
        let mut conditions = Vec::with_capacity(operands.len());
        for (i, operand) in operands.into_iter().enumerate() {
            let predicate = self.convert_predicate(operand)?;
            conditions.push(if op == BinaryOp::Or && i < last {
                Condition::or(predicate)
            } else {
                Condition::and(predicate)
            });
        }
        Ok(self.tree.add(SearchCondition::new(conditions)))
    }

    fn convert_function(&mut self, name: &str, args: &[Expr]) -> QueryResult<NodeId> {
        match (name, args) {
            ("Contains", [list, item]) if is_list(list) => self.convert_in_list(list, item),
            ("StartsWith", [expr, pattern]) => self.convert_like(expr, pattern, "", "%"),
            ("EndsWith", [expr, pattern]) => self.convert_like(expr, pattern, "%", ""),
            ("Contains", [expr, pattern]) => self.convert_like(expr, pattern, "%", "%"),
            ("Like", [expr, pattern]) => {
                let expr = self.convert_scalar(expr)?;
                let pattern = self.convert_scalar(pattern)?;
                Ok(self.tree.add(Like {
                    expr,
                    is_not: false,
                    pattern,
                    escape: None,
                }))
            }
            _ => Err(QueryError::unsupported(format!(
                "function '{}' with {} argument(s) cannot be translated to SQL",
                name,
                args.len()
            ))),
        }
    }

    /// `StartsWith`, `EndsWith` and `Contains` over text, as `LIKE` with `~` escaping.
    fn convert_like(&mut self, expr: &Expr, pattern: &Expr, start: &str, end: &str) -> QueryResult<NodeId> {
        let expr = self.convert_scalar(expr)?;
        let (pattern, escape) = match pattern.unquote() {
            Expr::Constant(Value::String(text)) => {
                let escaped = escape_like_text(text);
                let escape = (escaped != *text).then(|| self.tree.value(LIKE_ESCAPE));
                let pattern = self.tree.value(format!("{}{}{}", start, escaped, end));
                (pattern, escape)
            }
            Expr::QueryParam { name, value } => {
                let mut parameter = SqlParameter::new(name.clone(), value.clone());
                parameter.like_start = Some(start.to_string());
                parameter.like_end = Some(end.to_string());
                let pattern = self.tree.add(parameter);
                (pattern, Some(self.tree.value(LIKE_ESCAPE)))
            }
            other => {
                return Err(QueryError::unsupported(format!(
                    "pattern {} must be a string constant or a captured value",
                    other.kind()
                )));
            }
        };
        Ok(self.tree.add(Like {
            expr,
            is_not: false,
            pattern,
            escape,
        }))
    }

    /// `list.Contains(item)`. The list stays one value until parameters are
    /// folded in; an entity item is compared on its keys.
    fn convert_in_list(&mut self, list: &Expr, item: &Expr) -> QueryResult<NodeId> {
        let expr = self.convert_single(item)?;
        let (name, value) = match list.unquote() {
            Expr::QueryParam { name, value } => (name.clone(), value.clone()),
            Expr::Constant(value) => ("list".to_string(), value.clone()),
            other => {
                return Err(QueryError::internal(format!(
                    "{} is not a membership list",
                    other.kind()
                )));
            }
        };
        let mut parameter = SqlParameter::new(name, value);
        parameter.is_query_parameter = false;
        let values = vec![self.tree.add(parameter)];
        Ok(self.tree.add(InList {
            expr,
            is_not: false,
            values,
        }))
    }
}

/// Operands of a chain of `op`, left to right.
fn collect_operands<'e>(op: BinaryOp, expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    let mut stack = vec![expr];
    while let Some(expr) = stack.pop() {
        match expr.unquote() {
            Expr::Binary {
                op: inner,
                left,
                right,
            } if *inner == op => {
                stack.push(right);
                stack.push(left);
            }
            other => out.push(other),
        }
    }
}
