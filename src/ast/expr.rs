//! Scalar leaves and table nodes.

use crate::mapping::{ColumnDescriptor, EntityDescriptor, SqlDataType};
use crate::value::{ScalarType, Value};

use super::{NodeId, SourceId};

/// Operator binding strength, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Precedence {
    Unknown,
    LogicalDisjunction,
    LogicalConjunction,
    LogicalNegation,
    Bitwise,
    Comparison,
    Additive,
    Subtraction,
    Multiplicative,
    Concatenate,
    #[default]
    Primary,
}

/// A column of a physical table.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlField {
    /// Entity member name; `*` for the all-columns field.
    pub name: String,
    pub physical_name: String,
    pub alias: Option<String>,
    /// Owning table (navigation).
    pub table: Option<NodeId>,
    pub can_be_null: bool,
    pub data_type: SqlDataType,
    pub system_type: ScalarType,
    pub primary_key_order: Option<u32>,
    pub is_identity: bool,
}

impl SqlField {
    pub fn from_column(column: &ColumnDescriptor, table: NodeId) -> Self {
        Self {
            name: column.member.clone(),
            physical_name: column.column_name().to_string(),
            alias: None,
            table: Some(table),
            can_be_null: column.can_be_null,
            data_type: column.data_type,
            system_type: column.data_type.data_type.scalar_type(),
            primary_key_order: column.primary_key,
            is_identity: column.identity,
        }
    }

    pub fn all(table: NodeId) -> Self {
        Self {
            name: "*".to_string(),
            physical_name: "*".to_string(),
            alias: None,
            table: Some(table),
            can_be_null: false,
            data_type: SqlDataType::default(),
            system_type: ScalarType::Object,
            primary_key_order: None,
            is_identity: false,
        }
    }

    pub fn is_all(&self) -> bool {
        self.name == "*"
    }
}

/// A physical table with its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlTable {
    pub source_id: SourceId,
    /// Entity name.
    pub name: String,
    pub physical_name: String,
    pub alias: Option<String>,
    pub database: Option<String>,
    pub owner: Option<String>,
    pub fields: Vec<NodeId>,
    /// The `*` field.
    pub all: NodeId,
}

impl SqlTable {
    pub fn new(entity: &EntityDescriptor, all: NodeId) -> Self {
        Self {
            source_id: SourceId::next(),
            name: entity.name.clone(),
            physical_name: entity.table_name().to_string(),
            alias: None,
            database: entity.database.clone(),
            owner: entity.schema.clone(),
            fields: Vec::new(),
            all,
        }
    }

    /// `#`-prefixed tables are session-scoped temporaries.
    pub fn is_temporary(&self) -> bool {
        self.physical_name.starts_with('#')
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlValue {
    pub value: Value,
    pub system_type: ScalarType,
}

impl SqlValue {
    pub fn new(value: Value) -> Self {
        let system_type = value.scalar_type();
        Self { value, system_type }
    }
}

/// A function call such as `COUNT(*)` or `Coalesce(a, b)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFunction {
    pub name: String,
    pub params: Vec<NodeId>,
    pub system_type: ScalarType,
    pub precedence: Precedence,
}

impl SqlFunction {
    pub fn new(name: impl Into<String>, params: Vec<NodeId>, system_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            params,
            system_type,
            precedence: Precedence::Primary,
        }
    }
}

/// A raw SQL fragment with `{0}`, `{1}`… placeholders for its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlExpression {
    pub expr: String,
    pub params: Vec<NodeId>,
    pub system_type: ScalarType,
    pub precedence: Precedence,
}

impl SqlExpression {
    /// `{0}` around a single argument, used to carry a type or precedence.
    pub fn is_wrapper(&self) -> bool {
        self.expr == "{0}" && self.params.len() == 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlBinaryExpression {
    pub left: NodeId,
    pub operation: String,
    pub right: NodeId,
    pub system_type: ScalarType,
    pub precedence: Precedence,
}

/// Transform applied to a parameter value when it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTransform {
    /// Add a constant to an integer; nulls pass through.
    Shift(i64),
}

impl ValueTransform {
    pub fn apply(self, value: Value) -> Value {
        match self {
            ValueTransform::Shift(n) => value.shifted(n),
        }
    }
}

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    pub name: Option<String>,
    pub system_type: ScalarType,
    pub data_type: SqlDataType,
    /// False for values only used to expand membership lists.
    pub is_query_parameter: bool,
    pub like_start: Option<String>,
    pub like_end: Option<String>,
    pub replace_like: bool,
    raw_value: Value,
    transforms: Vec<ValueTransform>,
}

impl SqlParameter {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: Some(name.into()),
            system_type: value.scalar_type(),
            data_type: SqlDataType::default(),
            is_query_parameter: true,
            like_start: None,
            like_end: None,
            replace_like: false,
            raw_value: value,
            transforms: Vec::new(),
        }
    }

    pub fn raw_value(&self) -> &Value {
        &self.raw_value
    }

    pub fn set_value(&mut self, value: Value) {
        self.raw_value = value;
    }

    /// Value as bound: LIKE escaping or the stacked transforms applied.
    pub fn value(&self) -> Value {
        let mut value = self.raw_value.clone();

        if self.replace_like && !value.is_null() {
            value = Value::String(value.to_string().replace('[', "[[]"));
        }

        if let Some(start) = &self.like_start {
            if !value.is_null() {
                let text = value.to_string();
                let end = self.like_end.as_deref().unwrap_or_default();
                return Value::String(format!("{}{}{}", start, escape_like_text(&text), end));
            }
        }

        self.transforms
            .iter()
            .fold(value, |value, transform| transform.apply(value))
    }

    /// Stack a "shift by `take`" transform on top of the existing ones.
    pub fn set_take_converter(&mut self, take: i64) {
        self.transforms.push(ValueTransform::Shift(take));
    }

    pub fn transforms(&self) -> &[ValueTransform] {
        &self.transforms
    }
}

/// Escape `%`, `_` and `~` with `~`, only when the text contains a wildcard.
pub fn escape_like_text(text: &str) -> String {
    if !text.contains(['%', '_']) {
        return text.to_string();
    }

    let mut escaped = String::with_capacity(text.len() + 4);
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '~') {
            escaped.push('~');
        }
        escaped.push(ch);
    }
    escaped
}
