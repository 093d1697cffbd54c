//! SQL rendering per dialect.
//!
//! A [`DataProvider`] finalizes a statement's aliases and parameters and hands
//! it to its dialect's [`SqlGenerator`]:
//!
//! ```text
//! SqlTree ─▶ set_aliases ─▶ process_parameters? ─▶ SqlGenerator ─▶ SqlStatement
//! ```

pub mod flags;
pub mod generator;
pub mod generic;
pub mod paging;
pub mod provider;
pub mod sqlserver;
pub mod value_to_sql;
pub mod writer;

#[cfg(test)]
mod tests;

pub use flags::SqlProviderFlags;
pub use generator::{ConvertType, SelectOptions, SqlGenerator};
pub use generic::GenericGenerator;
pub use paging::RowNumberWindow;
pub use provider::{BoundParameter, DataProvider, Dialect, SqlStatement, PROVIDER_NAMES};
pub use sqlserver::{SqlServerGenerator, SqlServerVersion};
pub use value_to_sql::ValueToSqlConverter;
pub use writer::{RenderTask, SqlWriter};
