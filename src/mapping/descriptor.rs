//! Entity and column descriptors.

use serde::{Deserialize, Deserializer};

use super::data_type::{DataType, SqlDataType};

/// How one entity member maps onto a physical column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnDescriptor {
    /// Member name on the entity.
    pub member: String,
    /// Physical column name; defaults to the member name.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub can_be_null: bool,
    #[serde(rename = "type", default, deserialize_with = "deserialize_type")]
    pub data_type: SqlDataType,
    /// Ordinal within the primary key, when part of it.
    #[serde(default)]
    pub primary_key: Option<u32>,
    #[serde(default)]
    pub identity: bool,
}

impl ColumnDescriptor {
    pub fn new(member: impl Into<String>, data_type: impl Into<SqlDataType>) -> Self {
        Self {
            member: member.into(),
            column: None,
            can_be_null: false,
            data_type: data_type.into(),
            primary_key: None,
            identity: false,
        }
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column = Some(name.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.can_be_null = true;
        self
    }

    pub fn key(mut self, ordinal: u32) -> Self {
        self.primary_key = Some(ordinal);
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.member)
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key.is_some()
    }
}

/// Table-level mapping of one entity type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            schema: None,
            database: None,
            columns: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    pub fn find_member(&self, member: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.member == member)
    }

    /// Primary key columns in key-ordinal order.
    pub fn key_columns(&self) -> Vec<&ColumnDescriptor> {
        let mut keys: Vec<_> = self.columns.iter().filter(|c| c.is_primary_key()).collect();
        keys.sort_by_key(|c| c.primary_key);
        keys
    }

    pub fn identity_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.identity)
    }
}

fn deserialize_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SqlDataType, D::Error> {
    let text = Option::<String>::deserialize(deserializer)?;
    match text {
        Some(text) => SqlDataType::parse(&text).map_err(serde::de::Error::custom),
        None => Ok(SqlDataType::new(DataType::Undefined)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_columns_ordered() {
        let entity = EntityDescriptor::new("OrderLine")
            .with_column(ColumnDescriptor::new("LineNo", DataType::Int32).key(2))
            .with_column(ColumnDescriptor::new("Note", DataType::NVarChar))
            .with_column(ColumnDescriptor::new("OrderId", DataType::Int32).key(1));
        let keys: Vec<_> = entity.key_columns().iter().map(|c| c.member.as_str()).collect();
        assert_eq!(keys, vec!["OrderId", "LineNo"]);
    }

    #[test]
    fn test_names_default_to_member() {
        let entity = EntityDescriptor::new("Person")
            .with_column(ColumnDescriptor::new("Id", DataType::Int32).column("PersonID"))
            .with_column(ColumnDescriptor::new("Name", DataType::NVarChar));
        assert_eq!(entity.table_name(), "Person");
        assert_eq!(entity.find_member("Id").map(|c| c.column_name()), Some("PersonID"));
        assert_eq!(entity.find_member("Name").map(|c| c.column_name()), Some("Name"));
    }
}
