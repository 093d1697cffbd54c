//! Abstract SQL data types and the textual descriptor parser.
//!
//! Descriptors are written the way column types appear in DDL:
//!
//! ```text
//! int
//! nvarchar(50)
//! nvarchar(max)
//! decimal(18, 2)
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{alpha1, alphanumeric0, char, digit1, multispace0},
    combinator::{map, map_res, opt, recognize, value},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::value::ScalarType;

/// Length marker for unbounded text and binary types.
pub const MAX_LENGTH: i64 = -1;

/// Abstract data type kind, independent of any dialect spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Undefined,
    Char,
    VarChar,
    Text,
    NChar,
    NVarChar,
    NText,
    Binary,
    VarBinary,
    Blob,
    Image,
    Boolean,
    Guid,
    SByte,
    Int16,
    Int32,
    Int64,
    Byte,
    UInt16,
    UInt32,
    UInt64,
    Single,
    Double,
    Decimal,
    Money,
    SmallMoney,
    Date,
    Time,
    DateTime,
    DateTime2,
    SmallDateTime,
    DateTimeOffset,
    Timestamp,
    Xml,
    Variant,
    VarNumeric,
}

impl DataType {
    /// Scalar kind values of this type materialize into.
    pub fn scalar_type(self) -> ScalarType {
        match self {
            DataType::Undefined | DataType::Variant => ScalarType::Unknown,
            DataType::Char
            | DataType::VarChar
            | DataType::Text
            | DataType::NChar
            | DataType::NVarChar
            | DataType::NText
            | DataType::Xml => ScalarType::String,
            DataType::Binary
            | DataType::VarBinary
            | DataType::Blob
            | DataType::Image
            | DataType::Timestamp => ScalarType::Bytes,
            DataType::Boolean => ScalarType::Bool,
            DataType::Guid => ScalarType::Guid,
            DataType::SByte | DataType::Int16 | DataType::Int32 | DataType::Int64 => ScalarType::Int,
            DataType::Byte | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                ScalarType::UInt
            }
            DataType::Single | DataType::Double => ScalarType::Float,
            DataType::Decimal | DataType::Money | DataType::SmallMoney | DataType::VarNumeric => {
                ScalarType::Decimal
            }
            DataType::Date
            | DataType::Time
            | DataType::DateTime
            | DataType::DateTime2
            | DataType::SmallDateTime
            | DataType::DateTimeOffset => ScalarType::DateTime,
        }
    }

    /// Default abstract type for a scalar kind.
    pub fn for_scalar(ty: ScalarType) -> Self {
        match ty {
            ScalarType::Bool => DataType::Boolean,
            ScalarType::Char => DataType::NChar,
            ScalarType::Int => DataType::Int32,
            ScalarType::UInt => DataType::Int64,
            ScalarType::Float => DataType::Double,
            ScalarType::Decimal => DataType::Decimal,
            ScalarType::String => DataType::NVarChar,
            ScalarType::DateTime => DataType::DateTime,
            ScalarType::Guid => DataType::Guid,
            ScalarType::Bytes => DataType::VarBinary,
            ScalarType::Object | ScalarType::Unknown => DataType::Undefined,
        }
    }

    fn takes_precision(self) -> bool {
        matches!(
            self,
            DataType::Decimal | DataType::VarNumeric | DataType::Money | DataType::SmallMoney
        )
    }

    fn from_name(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "char" => DataType::Char,
            "varchar" => DataType::VarChar,
            "text" => DataType::Text,
            "nchar" => DataType::NChar,
            "nvarchar" | "string" => DataType::NVarChar,
            "ntext" => DataType::NText,
            "binary" => DataType::Binary,
            "varbinary" => DataType::VarBinary,
            "blob" => DataType::Blob,
            "image" => DataType::Image,
            "bit" | "bool" | "boolean" => DataType::Boolean,
            "uniqueidentifier" | "guid" | "uuid" => DataType::Guid,
            "sbyte" => DataType::SByte,
            "smallint" | "int16" => DataType::Int16,
            "int" | "integer" | "int32" => DataType::Int32,
            "bigint" | "int64" => DataType::Int64,
            "tinyint" | "byte" => DataType::Byte,
            "uint16" => DataType::UInt16,
            "uint32" => DataType::UInt32,
            "uint64" => DataType::UInt64,
            "real" | "single" => DataType::Single,
            "float" | "double" => DataType::Double,
            "decimal" | "numeric" => DataType::Decimal,
            "money" => DataType::Money,
            "smallmoney" => DataType::SmallMoney,
            "date" => DataType::Date,
            "time" => DataType::Time,
            "datetime" => DataType::DateTime,
            "datetime2" => DataType::DateTime2,
            "smalldatetime" => DataType::SmallDateTime,
            "datetimeoffset" => DataType::DateTimeOffset,
            "timestamp" | "rowversion" => DataType::Timestamp,
            "xml" => DataType::Xml,
            "sql_variant" | "variant" => DataType::Variant,
            "varnumeric" => DataType::VarNumeric,
            _ => return None,
        };
        Some(ty)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A data type descriptor: kind plus optional length or precision/scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SqlDataType {
    pub data_type: DataType,
    #[serde(default)]
    pub length: Option<i64>,
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub scale: Option<u8>,
}

impl SqlDataType {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            ..Default::default()
        }
    }

    pub fn with_length(data_type: DataType, length: i64) -> Self {
        Self {
            data_type,
            length: Some(length),
            ..Default::default()
        }
    }

    pub fn with_precision(data_type: DataType, precision: u8, scale: u8) -> Self {
        Self {
            data_type,
            precision: Some(precision),
            scale: Some(scale),
            ..Default::default()
        }
    }

    /// Unbounded length (`max`).
    pub fn is_max_length(&self) -> bool {
        matches!(self.length, Some(len) if len < 0 || len == i32::MAX as i64)
    }

    /// Parse a descriptor such as `nvarchar(max)` or `decimal(18, 2)`.
    pub fn parse(input: &str) -> QueryResult<Self> {
        let trimmed = input.trim();
        match parse_descriptor(trimmed) {
            Ok(("", (name, args))) => {
                let data_type = DataType::from_name(name).ok_or_else(|| {
                    QueryError::type_descriptor(0, format!("unknown type name '{}'", name))
                })?;
                Ok(Self::from_args(data_type, args))
            }
            Ok((remaining, _)) => Err(QueryError::type_descriptor(
                trimmed.len() - remaining.len(),
                format!("unexpected trailing content: '{}'", remaining),
            )),
            Err(e) => Err(QueryError::type_descriptor(0, format!("parse failed: {:?}", e))),
        }
    }

    fn from_args(data_type: DataType, args: Option<TypeArgs>) -> Self {
        match args {
            None => Self::new(data_type),
            Some(TypeArgs::Max) => Self::with_length(data_type, MAX_LENGTH),
            Some(TypeArgs::One(n)) if data_type.takes_precision() => {
                Self::with_precision(data_type, n.min(u8::MAX as i64) as u8, 0)
            }
            Some(TypeArgs::One(n)) => Self::with_length(data_type, n),
            Some(TypeArgs::Two(p, s)) => Self::with_precision(
                data_type,
                p.min(u8::MAX as i64) as u8,
                s.min(u8::MAX as i64) as u8,
            ),
        }
    }
}

impl From<DataType> for SqlDataType {
    fn from(data_type: DataType) -> Self {
        Self::new(data_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeArgs {
    Max,
    One(i64),
    Two(i64, i64),
}

fn parse_descriptor(input: &str) -> IResult<&str, (&str, Option<TypeArgs>)> {
    pair(parse_type_name, opt(parse_type_args))(input)
}

fn parse_type_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(alpha1, opt(pair(alphanumeric0, opt(pair(tag("_"), alphanumeric0))))))(input)
}

fn parse_number(input: &str) -> IResult<&str, i64> {
    map_res(delimited(multispace0, digit1, multispace0), str::parse::<i64>)(input)
}

fn parse_type_args(input: &str) -> IResult<&str, TypeArgs> {
    preceded(
        multispace0,
        delimited(
            char('('),
            alt((
                value(
                    TypeArgs::Max,
                    delimited(multispace0, tag_no_case("max"), multispace0),
                ),
                map(
                    tuple((parse_number, char(','), parse_number)),
                    |(p, _, s)| TypeArgs::Two(p, s),
                ),
                map(parse_number, TypeArgs::One),
            )),
            char(')'),
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        let ty = SqlDataType::parse("int").unwrap();
        assert_eq!(ty, SqlDataType::new(DataType::Int32));
    }

    #[test]
    fn test_length_and_max() {
        let ty = SqlDataType::parse("NVarChar(50)").unwrap();
        assert_eq!(ty.length, Some(50));
        assert!(!ty.is_max_length());

        let ty = SqlDataType::parse("nvarchar( MAX )").unwrap();
        assert!(ty.is_max_length());
    }

    #[test]
    fn test_precision_scale() {
        let ty = SqlDataType::parse("decimal(18, 2)").unwrap();
        assert_eq!(ty, SqlDataType::with_precision(DataType::Decimal, 18, 2));

        let ty = SqlDataType::parse("numeric(10)").unwrap();
        assert_eq!(ty.precision, Some(10));
        assert_eq!(ty.length, None);
    }

    #[test]
    fn test_sql_variant_name() {
        let ty = SqlDataType::parse("sql_variant").unwrap();
        assert_eq!(ty.data_type, DataType::Variant);
    }

    #[test]
    fn test_rejects_unknown_and_trailing() {
        assert!(matches!(
            SqlDataType::parse("frobnicate"),
            Err(QueryError::TypeDescriptor { .. })
        ));
        assert!(matches!(
            SqlDataType::parse("int(4) extra"),
            Err(QueryError::TypeDescriptor { .. })
        ));
    }
}
