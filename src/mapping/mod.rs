//! Entity-to-table mapping: descriptors, the schema registry and data types.

pub mod data_type;
pub mod descriptor;
pub mod schema;

pub use data_type::{DataType, SqlDataType, MAX_LENGTH};
pub use descriptor::{ColumnDescriptor, EntityDescriptor};
pub use schema::MappingSchema;
