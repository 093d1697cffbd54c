//! Literal rendering of runtime values.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{NaiveDateTime, NaiveTime, Timelike};

use crate::value::{ScalarType, Value};

/// Appends the literal for one value kind.
pub type ConvertFn = fn(&mut String, &Value);

/// Converts values to SQL literals.
///
/// Own converters are keyed by scalar kind; when none matches, the base
/// converters are tried in order. Nulls always render as `NULL`.
#[derive(Clone, Default)]
pub struct ValueToSqlConverter {
    converters: HashMap<ScalarType, ConvertFn>,
    base: Vec<ValueToSqlConverter>,
}

impl std::fmt::Debug for ValueToSqlConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueToSqlConverter")
            .field("kinds", &self.converters.keys().collect::<Vec<_>>())
            .field("base", &self.base)
            .finish()
    }
}

impl ValueToSqlConverter {
    /// A converter with no own rules that falls back to `base`.
    pub fn new(base: Vec<ValueToSqlConverter>) -> Self {
        Self {
            converters: HashMap::new(),
            base,
        }
    }

    /// Dialect-neutral literal rules.
    pub fn with_defaults() -> Self {
        let mut converter = Self::default();
        converter.set_converter(ScalarType::Bool, convert_bool);
        converter.set_converter(ScalarType::Char, convert_char);
        converter.set_converter(ScalarType::Int, convert_number);
        converter.set_converter(ScalarType::UInt, convert_number);
        converter.set_converter(ScalarType::Float, convert_number);
        converter.set_converter(ScalarType::Decimal, convert_number);
        converter.set_converter(ScalarType::String, convert_string);
        converter.set_converter(ScalarType::DateTime, convert_date_time);
        converter.set_converter(ScalarType::Guid, convert_guid);
        converter
    }

    pub fn set_converter(&mut self, kind: ScalarType, convert: ConvertFn) {
        self.converters.insert(kind, convert);
    }

    pub fn can_convert(&self, kind: ScalarType) -> bool {
        self.converters.contains_key(&kind) || self.base.iter().any(|b| b.can_convert(kind))
    }

    /// Append the literal for `value`; false when no rule applies.
    pub fn try_convert(&self, sb: &mut String, value: &Value) -> bool {
        if value.is_null() {
            sb.push_str("NULL");
            return true;
        }
        if let Some(convert) = self.converters.get(&value.scalar_type()) {
            convert(sb, value);
            return true;
        }
        self.base.iter().any(|base| base.try_convert(sb, value))
    }
}

/// `'text'` with embedded quotes doubled.
pub fn quote_string(sb: &mut String, prefix: &str, text: &str) {
    sb.push_str(prefix);
    sb.push('\'');
    sb.push_str(&text.replace('\'', "''"));
    sb.push('\'');
}

fn convert_bool(sb: &mut String, value: &Value) {
    if let Value::Bool(b) = value {
        sb.push(if *b { '1' } else { '0' });
    }
}

fn convert_char(sb: &mut String, value: &Value) {
    if let Value::Char(c) = value {
        quote_string(sb, "", &c.to_string());
    }
}

fn convert_number(sb: &mut String, value: &Value) {
    let _ = match value {
        Value::Int(n) => write!(sb, "{}", n),
        Value::UInt(n) => write!(sb, "{}", n),
        Value::Float(n) => write!(sb, "{}", n),
        Value::Decimal(d) => write!(sb, "{}", d),
        _ => Ok(()),
    };
}

fn convert_string(sb: &mut String, value: &Value) {
    if let Value::String(s) = value {
        quote_string(sb, "", s);
    }
}

fn convert_guid(sb: &mut String, value: &Value) {
    if let Value::Guid(g) = value {
        let _ = write!(sb, "'{}'", g);
    }
}

fn convert_date_time(sb: &mut String, value: &Value) {
    if let Value::DateTime(dt) = value {
        sb.push('\'');
        sb.push_str(&format_date_time(dt));
        sb.push('\'');
    }
}

/// Date only at midnight, seconds precision when there are no milliseconds.
fn format_date_time(dt: &NaiveDateTime) -> String {
    let format = if dt.time() == NaiveTime::MIN {
        "%Y-%m-%d"
    } else if dt.nanosecond() / 1_000_000 == 0 {
        "%Y-%m-%d %H:%M:%S"
    } else {
        "%Y-%m-%d %H:%M:%S%.3f"
    };
    dt.format(format).to_string()
}
