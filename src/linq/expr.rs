//! Declarative query tree.
//!
//! A query is a chain of [`Expr::Call`]s over a [`Expr::Table`] root, the way
//! an in-memory collection query composes operators:
//!
//! ```text
//! Select(Where(Table(Person), p => p.Age > 18), p => p.Name)
//! ```
//!
//! The tree is serde-serializable so queries can be read from JSON.

use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessOrEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
    /// Marks a lambda passed as an expression rather than a delegate.
    Quote,
    /// Type conversion; transparent to translation.
    Convert,
}

/// One `member = value` style binding of a [`Expr::MemberInit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberBinding {
    Assignment { member: String, expr: Expr },
    /// Nested initializer of a member's own members.
    Member { member: String, bindings: Vec<MemberBinding> },
    /// Collection initializer.
    List { member: String, items: Vec<Expr> },
}

impl MemberBinding {
    pub fn member(&self) -> &str {
        match self {
            MemberBinding::Assignment { member, .. }
            | MemberBinding::Member { member, .. }
            | MemberBinding::List { member, .. } => member,
        }
    }
}

/// A named member of an anonymous projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// All rows of a mapped entity.
    Table(String),
    /// A query operator applied to its source and arguments.
    Call { method: String, args: Vec<Expr> },
    Lambda { params: Vec<String>, body: Box<Expr> },
    /// Reference to a lambda parameter.
    Parameter(String),
    Member { expr: Box<Expr>, member: String },
    Constant(Value),
    /// A captured value, bound as a statement parameter.
    QueryParam { name: String, value: Value },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Anonymous projection.
    New { members: Vec<NewMember> },
    /// Entity construction: constructor arguments plus member bindings.
    MemberInit {
        type_name: String,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        bindings: Vec<MemberBinding>,
    },
    /// `StartsWith`, `EndsWith`, `Contains` and `Like`.
    Function { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn table(entity: impl Into<String>) -> Self {
        Expr::Table(entity.into())
    }

    pub fn call(method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            method: method.into(),
            args,
        }
    }

    pub fn lambda<S: Into<String>>(params: impl IntoIterator<Item = S>, body: Expr) -> Self {
        Expr::Lambda {
            params: params.into_iter().map(Into::into).collect(),
            body: Box::new(body),
        }
    }

    pub fn param(name: impl Into<String>) -> Self {
        Expr::Parameter(name.into())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn query_param(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::QueryParam {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn new_object<S: Into<String>>(members: impl IntoIterator<Item = (S, Expr)>) -> Self {
        Expr::New {
            members: members
                .into_iter()
                .map(|(name, expr)| NewMember {
                    name: name.into(),
                    expr,
                })
                .collect(),
        }
    }

    pub fn member_init<S: Into<String>>(
        type_name: impl Into<String>,
        assignments: impl IntoIterator<Item = (S, Expr)>,
    ) -> Self {
        Expr::MemberInit {
            type_name: type_name.into(),
            args: Vec::new(),
            bindings: assignments
                .into_iter()
                .map(|(member, expr)| MemberBinding::Assignment {
                    member: member.into(),
                    expr,
                })
                .collect(),
        }
    }

    /// `self.member`.
    pub fn member(self, member: impl Into<String>) -> Self {
        Expr::Member {
            expr: Box::new(self),
            member: member.into(),
        }
    }

    pub fn equal(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Equal, self, other)
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::And, self, other)
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Or, self, other)
    }

    /// Strip quote and conversion wrappers.
    pub fn unquote(&self) -> &Expr {
        let mut expr = self;
        while let Expr::Unary {
            op: UnaryOp::Quote | UnaryOp::Convert,
            operand,
        } = expr
        {
            expr = operand;
        }
        expr
    }

    /// Parameters and body of a (possibly quoted) lambda.
    pub fn as_lambda(&self) -> Option<(&[String], &Expr)> {
        match self.unquote() {
            Expr::Lambda { params, body } => Some((params, body.unquote())),
            _ => None,
        }
    }

    /// Arguments of a call to one of `methods`.
    pub fn as_call(&self, methods: &[&str]) -> Option<(&str, &[Expr])> {
        match self.unquote() {
            Expr::Call { method, args } if methods.contains(&method.as_str()) => {
                Some((method, args))
            }
            _ => None,
        }
    }

    /// Root parameter and member path of `p.a.b`.
    pub fn member_path(&self) -> Option<(&str, Vec<String>)> {
        let mut path = Vec::new();
        let mut expr = self.unquote();
        loop {
            match expr {
                Expr::Parameter(name) => {
                    path.reverse();
                    return Some((name, path));
                }
                Expr::Member { expr: inner, member } => {
                    path.push(member.clone());
                    expr = inner.unquote();
                }
                _ => return None,
            }
        }
    }

    /// `self.p1.p2…` for each member of `path`.
    pub fn with_path(self, path: &[String]) -> Expr {
        path.iter().fold(self, |expr, member| expr.member(member.clone()))
    }

    /// Short name of the node kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Table(_) => "Table",
            Expr::Call { .. } => "Call",
            Expr::Lambda { .. } => "Lambda",
            Expr::Parameter(_) => "Parameter",
            Expr::Member { .. } => "Member",
            Expr::Constant(_) => "Constant",
            Expr::QueryParam { .. } => "QueryParam",
            Expr::Binary { .. } => "Binary",
            Expr::Unary { .. } => "Unary",
            Expr::New { .. } => "New",
            Expr::MemberInit { .. } => "MemberInit",
            Expr::Function { .. } => "Function",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_strips_quote_and_convert() {
        let lambda = Expr::lambda(["p"], Expr::param("p"));
        let quoted = Expr::unary(UnaryOp::Quote, Expr::unary(UnaryOp::Convert, lambda.clone()));
        assert_eq!(quoted.unquote(), &lambda);
        assert!(quoted.as_lambda().is_some());
    }

    #[test]
    fn test_member_path() {
        let expr = Expr::param("p").member("Address").member("City");
        let (root, path) = expr.member_path().unwrap();
        assert_eq!(root, "p");
        assert_eq!(path, vec!["Address", "City"]);
        assert!(Expr::constant(1).member("x").member_path().is_none());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"Call":{"method":"Where","args":[
            {"Table":"Person"},
            {"Lambda":{"params":["p"],"body":
                {"Binary":{"op":"Equal",
                    "left":{"Member":{"expr":{"Parameter":"p"},"member":"Id"}},
                    "right":{"Constant":{"Int":1}}}}}}
        ]}}"#;
        let expr: Expr = serde_json::from_str(json).unwrap();
        let expected = Expr::call(
            "Where",
            vec![
                Expr::table("Person"),
                Expr::lambda(["p"], Expr::param("p").member("Id").equal(Expr::constant(1))),
            ],
        );
        assert_eq!(expr, expected);
    }
}
