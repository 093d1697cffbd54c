//! Data providers: a dialect plus the state needed to render statements for it.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::ast::{NodeId, ReservedWords, SqlTree};
use crate::error::{QueryError, QueryResult};
use crate::value::Value;

use super::flags::SqlProviderFlags;
use super::generator::{ConvertType, SqlGenerator};
use super::generic::GenericGenerator;
use super::sqlserver::{SqlServerGenerator, SqlServerVersion};
use super::value_to_sql::ValueToSqlConverter;
use super::writer::SqlWriter;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Generic,
    SqlServer(SqlServerVersion),
}

impl Dialect {
    pub fn generator(self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::Generic => Box::new(GenericGenerator::new()),
            Dialect::SqlServer(version) => Box::new(SqlServerGenerator::new(version)),
        }
    }
}

/// A bound parameter of a rendered statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundParameter {
    pub name: String,
    pub value: Value,
}

/// Rendered SQL text and the parameters it references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlStatement {
    pub sql: String,
    pub parameters: Vec<BoundParameter>,
}

/// A named dialect with its literal converter and reserved words.
pub struct DataProvider {
    name: String,
    dialect: Dialect,
    generator: Box<dyn SqlGenerator>,
    converter: ValueToSqlConverter,
    reserved: ReservedWords,
}

impl std::fmt::Debug for DataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProvider")
            .field("name", &self.name)
            .field("dialect", &self.dialect)
            .finish()
    }
}

/// Provider names accepted by [`DataProvider::from_name`].
pub const PROVIDER_NAMES: &[&str] = &[
    "Generic",
    "SqlServer",
    "SqlServer.2000",
    "SqlServer.2005",
    "SqlServer.2008",
    "SqlServer.2012",
    "SqlServer.2014",
];

impl DataProvider {
    pub fn new(name: impl Into<String>, dialect: Dialect, reserved: ReservedWords) -> Self {
        let generator = dialect.generator();
        let converter = generator.value_converter();
        Self {
            name: name.into(),
            dialect,
            generator,
            converter,
            reserved,
        }
    }

    pub fn generic() -> Self {
        Self::new("Generic", Dialect::Generic, ReservedWords::builtin())
    }

    /// SQL Server provider for a version string such as `"2005"`.
    pub fn sql_server(version: &str) -> Self {
        let dialect = Dialect::SqlServer(SqlServerVersion::from_config(version));
        let name = match version.trim() {
            "2014" => "SqlServer.2014".to_string(),
            _ => dialect.generator().name().to_string(),
        };
        Self::new(name, dialect, ReservedWords::builtin())
    }

    /// Provider by name: `Generic`, `SqlServer` (2008) or `SqlServer.<version>`.
    pub fn from_name(name: &str) -> QueryResult<Self> {
        match name {
            "Generic" => Ok(Self::generic()),
            "SqlServer" => Ok(Self::sql_server("2008")),
            _ => match name.strip_prefix("SqlServer.") {
                Some(version) => Ok(Self::sql_server(version)),
                None => Err(QueryError::Config(format!(
                    "unknown provider '{}' (expected one of {})",
                    name,
                    PROVIDER_NAMES.join(", ")
                ))),
            },
        }
    }

    pub fn with_reserved_words(mut self, reserved: ReservedWords) -> Self {
        self.reserved = reserved;
        self
    }

    /// Replace the literal converter, keeping the current one as its base.
    pub fn with_converter(mut self, configure: impl FnOnce(&mut ValueToSqlConverter)) -> Self {
        let mut converter = ValueToSqlConverter::new(vec![self.converter]);
        configure(&mut converter);
        self.converter = converter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn flags(&self) -> SqlProviderFlags {
        self.generator.flags()
    }

    pub fn reserved_words(&self) -> &ReservedWords {
        &self.reserved
    }

    pub fn convert_name(&self, name: &str, kind: ConvertType) -> String {
        self.generator.convert_name(name, kind)
    }

    /// Finalize aliases, fold parameters when needed, and render the statement at `root`.
    #[instrument(skip(self, tree), fields(provider = %self.name))]
    pub fn build_sql(&self, tree: &mut SqlTree, root: NodeId) -> QueryResult<SqlStatement> {
        tree.set_aliases(root, &self.reserved)?;

        let mut root = root;
        if tree.query(root)?.is_parameter_dependent {
            debug!("statement depends on parameter values; folding them in");
            root = tree.process_parameters(root)?;
            tree.set_aliases(root, &self.reserved)?;
        }

        self.generator.prepare(tree, root)?;

        let mut writer = SqlWriter::new(tree, root, self.flags(), &self.converter, &self.reserved)?;
        self.generator.build_statement(&mut writer, root)?;
        let sql = writer.finish();

        let mut parameters = Vec::new();
        for &p in &tree.query(root)?.parameters {
            let p = tree.parameter(p)?;
            let name = p
                .name
                .as_deref()
                .ok_or_else(|| QueryError::internal("parameter has no name"))?;
            parameters.push(BoundParameter {
                name: self.convert_name(name, ConvertType::NameToCommandParameter),
                value: p.value(),
            });
        }
        debug!(length = sql.len(), parameters = parameters.len(), "rendered statement");
        Ok(SqlStatement { sql, parameters })
    }
}
