//! # querygen
//!
//! Compiles declarative query trees into dialect-correct SQL.
//!
//! A query is an [`Expr`](linq::Expr) tree of operator calls (`Where`,
//! `Select`, `OrderBy`, `Take`, `Insert`, …) over mapped entities. The
//! compiler turns it into a [`SqlTree`](ast::SqlTree), which a
//! [`DataProvider`](sql_provider::DataProvider) renders for its dialect.
//!
//! ## Quick Example
//!
//! ```
//! use querygen::prelude::*;
//!
//! let schema = MappingSchema::from_entities([EntityDescriptor::new("Person")
//!     .with_column(ColumnDescriptor::new("Id", DataType::Int32).key(1))
//!     .with_column(ColumnDescriptor::new("Name", DataType::NVarChar))]);
//!
//! let query = Expr::call(
//!     "Where",
//!     vec![
//!         Expr::table("Person"),
//!         Expr::lambda(["p"], Expr::param("p").member("Id").equal(Expr::query_param("id", 7))),
//!     ],
//! );
//!
//! let provider = DataProvider::sql_server("2008");
//! let plan = compile(&provider, &schema, &query).unwrap();
//! let statement = plan.sql(&provider).unwrap();
//! assert!(statement.sql.ends_with("WHERE\n\t[p].[Id] = @id"));
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod linq;
pub mod mapping;
pub mod sql_provider;
pub mod value;

pub use linq::compile;

pub mod prelude {
    pub use crate::ast::{NodeId, ReservedWords, SqlTree};
    pub use crate::config::CompilerConfig;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::linq::{compile, Expr, ExpressionBuilder, Projection, QueryKind, QueryPlan};
    pub use crate::mapping::{ColumnDescriptor, DataType, EntityDescriptor, MappingSchema, SqlDataType};
    pub use crate::sql_provider::{BoundParameter, DataProvider, SqlStatement, PROVIDER_NAMES};
    pub use crate::value::{ScalarType, Value};
}
